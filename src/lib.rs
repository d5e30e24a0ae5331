/// Hub configuration loading.
pub mod config;
/// Common error types: lifecycle misuse, subscriber failures.
pub mod error;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Pub/Sub: OrderedQueue, SubscriptionRegistry, Hub.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use self::config::HubConfig;
/// Operation errors and result types.
pub use error::{HubError, HubResult, SubscriberError, SubscriberFailure};
/// Logging bootstrap.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
/// Pub/Sub API.
pub use pubsub::{
    BoxError, Callback, CallbackResult, Envelope, Hub, HubState, HubStats, OrderedQueue, Priority,
    Subscription, SubscriptionRegistry, DEFAULT_PRIORITY,
};
