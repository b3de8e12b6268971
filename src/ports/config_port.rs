//! Configuration access port trait.

use std::time::Duration;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// Non-negative count; negative values clamp to zero.
    fn get_count(&self, section: &str, key: &str, default: usize) -> usize {
        self.get_int(section, key, default as i64).max(0) as usize
    }

    /// Millisecond duration; negative values clamp to zero.
    fn get_millis(&self, section: &str, key: &str, default_ms: u64) -> Duration {
        Duration::from_millis(self.get_int(section, key, default_ms as i64).max(0) as u64)
    }
}
