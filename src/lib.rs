/// Engine configuration loading.
pub mod config;
/// Common error types for engine operations.
pub mod error;
/// Console logging initialization.
pub mod logging;
/// Pub/Sub: engine, subscriptions, filters, staleness policy.
pub mod pubsub;
/// Shard backing stores: trait, in-memory implementation, pool.
pub mod store;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Settings and per-shard addresses.
pub use config::{Settings, ShardAddr, RECEIVE_TIMEOUT_SECS};
/// Operation errors and result type.
pub use error::{PubSubError, PubSubResult};
/// Logging configuration and init.
pub use logging::{init_logging, LoggingConfig};
/// Pub/Sub API: engine, events, filters, subscriptions.
pub use pubsub::{
    Event, Filter, FilterOp, PubSubEngine, PublishReport, RandomAssigner, ShardAssigner,
    Subscription, SubscriptionDescriptor,
};
/// Shard store abstraction and pool.
pub use store::{MemoryConnector, MemoryShard, ShardConnector, ShardPool, ShardStore};
