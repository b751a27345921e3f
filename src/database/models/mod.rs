// 数据库实体定义

pub mod proximity;

pub use proximity::{
    ProximitySession, ProximityStats, RelatedUser, RelationChange, RelationScore,
    ScoreComponents, UserProximityTotal,
};
