/// Catalog access
pub mod client;
/// Domain objects
pub mod domain;
/// Crate error type
pub mod error;
/// Stock correlation and notification
pub mod mediator;
/// Periodic stock polling
pub mod poller;
/// Subscription stores
pub mod repo;
/// Application settings
pub mod settings;
/// Application telemetry for tracing and logging
pub mod telemetry;
