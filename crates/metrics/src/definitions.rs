//! Metric name and label definitions.
//!
//! Centralizing these keeps names consistent between the crates that record
//! them and whoever scrapes them.

/// Message dispatch metrics
pub mod dispatch {
    /// Messages accepted and delivered (labels: channel)
    pub const MESSAGES_TOTAL: &str = "huddle_dispatch_messages_total";
    /// Messages vetoed by a listener (labels: channel)
    pub const CANCELLED_TOTAL: &str = "huddle_dispatch_cancelled_total";
    /// Messages dropped because the resolved channel was invalid for the sender
    pub const INVALID_CHANNEL_TOTAL: &str = "huddle_dispatch_invalid_channel_total";
    /// Deliveries that returned an error (labels: channel)
    pub const DELIVERY_FAILURES_TOTAL: &str = "huddle_dispatch_delivery_failures_total";
    /// Time from resolution to logging, in seconds
    pub const PROCESSING_DURATION_SECONDS: &str = "huddle_dispatch_processing_duration_seconds";
}

/// Listener metrics
pub mod listeners {
    /// Listener invocations that returned an error (labels: listener)
    pub const FAILURES_TOTAL: &str = "huddle_listener_failures_total";
    /// Listeners disabled by the circuit breaker (labels: listener)
    pub const CIRCUIT_OPEN_TOTAL: &str = "huddle_listener_circuit_open_total";
}

/// Channel registry metrics
pub mod channels {
    /// Number of registered channels
    pub const REGISTERED: &str = "huddle_channels_registered";
    /// Active-channel selections made by priority (labels: channel)
    pub const ACTIVE_SELECTED_TOTAL: &str = "huddle_channels_active_selected_total";
}

/// Common label keys
pub mod labels {
    pub const CHANNEL: &str = "channel";
    pub const LISTENER: &str = "listener";
}
