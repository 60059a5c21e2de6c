// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod field;
pub mod metrics;
pub mod scenario;
pub mod submit;
pub mod telemetry;
pub mod validation;
