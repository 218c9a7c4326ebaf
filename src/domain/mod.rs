//! Domain layer containing the fan-out vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, auth identity, errors)
//! - `messaging` - Message/typing events and bus channel naming

pub mod foundation;
pub mod messaging;
