//! NATS trigger source.

mod subscriber;

pub use subscriber::TriggerSubscriber;
