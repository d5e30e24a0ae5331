pub mod hub;

pub use hub::{HubError, HubResult, SubscriberError, SubscriberFailure};
