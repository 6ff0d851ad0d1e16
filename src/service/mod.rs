//! Service layer for the room-swarm bot fleet
//!
//! This module contains the application state (the process context object),
//! background task management and health checks.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
