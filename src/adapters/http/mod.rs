//! HTTP adapters - the process's HTTP surface.
//!
//! Only two routes: `/health` and the `/ws` upgrade. Everything else is a
//! JSON 404.

pub mod health;
pub mod router;

pub use health::{health_router, DatabaseStatus, HealthResponse, HealthState, HealthStatus};
pub use router::{app_router, cors_layer};
