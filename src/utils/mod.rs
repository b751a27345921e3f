use chrono::Utc;

/// 地球半径（米）
const EARTH_RADIUS_M: f64 = 6371000.0;

/// 计算球面距离（Haversine 公式），返回米
pub fn calculate_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// 当前 Unix 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 毫秒转小时，仅用于日志
pub fn ms_to_hours(ms: i64) -> i64 {
    (ms as f64 / 3_600_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_point_is_zero() {
        assert_eq!(calculate_distance(31.23, 121.47, 31.23, 121.47), 0.0);
    }

    #[test]
    fn test_distance_small_offset() {
        // 纬度 0.001 度约 111 米
        let d = calculate_distance(31.0, 121.0, 31.001, 121.0);
        assert!((d - 111.19).abs() < 0.5, "distance was {}", d);
    }

    #[test]
    fn test_ms_to_hours() {
        assert_eq!(ms_to_hours(21_600_000), 6);
        assert_eq!(ms_to_hours(0), 0);
    }
}
