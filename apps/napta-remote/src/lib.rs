pub mod config;
pub mod orchestrator;
pub mod session;
pub mod telemetry;
pub mod terminal;
pub mod transport;
