pub mod arbiter;
pub mod config;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod slot;
pub mod transport;
pub mod wander;
pub mod watchdog;
