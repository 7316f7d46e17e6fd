mod routes;

pub mod app;
pub mod config;
pub mod detection;
pub mod detection_backend;
pub mod error;
pub mod server;
pub mod telemetry;

pub use app::start_app;
