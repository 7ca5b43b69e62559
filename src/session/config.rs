//! Session configuration

use crate::coding::MAX_STRING_LENGTH;

/// Session configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Namespace announced by a publisher
    pub namespace: String,

    /// Objects buffered per subscribed track before the router waits
    pub track_queue: usize,

    /// Publisher events buffered before the control loop waits
    pub event_queue: usize,

    /// Longest string field accepted from the peer
    pub max_string_length: usize,

    /// Priority given to objects opened by track writers
    pub default_priority: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            track_queue: 64,
            event_queue: 256,
            max_string_length: MAX_STRING_LENGTH,
            default_priority: 0,
        }
    }
}

impl SessionConfig {
    /// Create a config announcing `namespace`
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Set the namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the per-track object queue (at least 1)
    pub fn track_queue(mut self, size: usize) -> Self {
        self.track_queue = size.max(1);
        self
    }

    /// Set the event queue (at least 1)
    pub fn event_queue(mut self, size: usize) -> Self {
        self.event_queue = size.max(1);
        self
    }

    /// Set the string length limit
    pub fn max_string_length(mut self, len: usize) -> Self {
        self.max_string_length = len;
        self
    }

    /// Set the default object priority
    pub fn default_priority(mut self, priority: u32) -> Self {
        self.default_priority = priority;
        self
    }
}
