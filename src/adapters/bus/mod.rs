//! Message bus adapters.
//!
//! - `redis` - Redis pub/sub (production)
//! - `in_memory` - Shared in-process bus for tests and single-process runs
//! - `disabled` - Stand-in when no broker is configured

mod disabled;
mod in_memory;
mod redis;

pub use disabled::DisabledMessageBus;
pub use in_memory::{pattern_matches, InMemoryMessageBus};
pub use self::redis::RedisMessageBus;
