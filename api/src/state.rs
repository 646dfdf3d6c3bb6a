//! Application state shared across HTTP handlers.

use crate::correlator::PendingResults;
use encore_core::cache::TtlCache;
use encore_core::store::EntityStore;
use encore_kafka::{TicketProducer, TopicManager};
use std::sync::Arc;
use std::time::Duration;

/// Shared resources for the API process, cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    /// Entity store (PostgreSQL in production)
    pub store: Arc<dyn EntityStore>,

    /// TTL cache (Redis in production)
    pub cache: Arc<dyn TtlCache>,

    /// Producer for order events
    pub producer: Arc<TicketProducer>,

    /// Lazy provisioning of concert topic pairs
    pub topics: Arc<TopicManager>,

    /// Pending-result correlator
    pub pending: Arc<PendingResults>,

    /// How long a handler waits for the worker's verdict
    pub order_timeout: Duration,

    /// TTL for cache writes done by the handlers
    pub cache_ttl: Duration,
}
