//! Application layer - use cases that coordinate ports.

mod publisher;

pub use publisher::MessagePublisher;
