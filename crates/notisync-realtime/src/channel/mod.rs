//! Topic subscriptions on the push channel.

pub mod subscription;

pub use subscription::{ActiveSubscription, TopicSubscriptionManager};
