mod proximity;

pub use proximity::{NearbyUser, PairKey, ProximityEvent};
