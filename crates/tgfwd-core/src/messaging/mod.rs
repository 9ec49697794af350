//! Platform-facing abstractions: the message model, the platform port, the
//! update hub that fans events out to runners, and the throttling decorator.

pub mod hub;
pub mod port;
pub mod throttled;
pub mod types;
