//! Timeline configuration

/// Default retention window in seconds
pub const DEFAULT_CAPACITY: f64 = 10.0;

/// Timeline configuration options
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineConfig {
    /// Maximum timestamp span kept per component
    pub capacity: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl TimelineConfig {
    /// Set the retention window
    ///
    /// Negative or non-finite values are replaced by the default.
    pub fn capacity(mut self, capacity: f64) -> Self {
        self.capacity = if capacity.is_finite() && capacity >= 0.0 {
            capacity
        } else {
            DEFAULT_CAPACITY
        };
        self
    }
}
