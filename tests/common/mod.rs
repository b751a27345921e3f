#![allow(dead_code)]

use geotrack::config::TrackerConfig;
use geotrack::store::LocationStore;
use geotrack::store::memory::MemoryBackend;
use geotrack::tracker::ProximityTracker;

pub const T0: i64 = 1_700_000_000_000;
pub const BASE_LON: f64 = 121.47;
pub const BASE_LAT: f64 = 31.23;
pub const SIX_HOURS_MS: i64 = 21_600_000;

pub fn setup() -> (MemoryBackend, ProximityTracker) {
    let backend = MemoryBackend::new(T0);
    let tracker = ProximityTracker::new(backend.stores(), TrackerConfig::default());
    (backend, tracker)
}

/// 把用户放在基准点以北 `meters` 米处
pub async fn place(backend: &MemoryBackend, user_id: &str, meters: f64) {
    // 纬度 1 度约 111195 米
    let lat = BASE_LAT + meters / 111_195.0;
    backend
        .locations
        .set_position(user_id, BASE_LON, lat)
        .await
        .unwrap();
}
