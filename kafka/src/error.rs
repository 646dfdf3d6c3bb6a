//! Error type for bus operations.

use thiserror::Error;

/// Errors that can occur while talking to the broker.
#[derive(Error, Debug, Clone)]
pub enum BusError {
    /// Failed to create a client or connect to any broker
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a record to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe a consumer
    #[error("Subscription failed for '{pattern}': {reason}")]
    SubscriptionFailed {
        /// The topic pattern that failed
        pattern: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to provision a concert's topics
    #[error("Provisioning failed for topic '{topic}': {reason}")]
    ProvisionFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to encode a payload before sending
    #[error("Failed to encode payload: {0}")]
    Encode(String),
}
