// Explanation cache module
// Author: kelexine (https://github.com/kelexine)

pub mod clock;
pub mod key;
pub mod manager;
pub mod models;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{derive_key, normalize};
pub use manager::ExplanationCache;
pub use models::{
    CacheConfig, CacheEntry, CacheStatistics, CachedResult, ClearResult, StatisticsReport,
};
