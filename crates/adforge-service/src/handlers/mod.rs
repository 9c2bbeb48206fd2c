//! API handlers.

pub mod credits;
pub mod generations;
pub mod health;
pub mod users;
pub mod webhooks;
