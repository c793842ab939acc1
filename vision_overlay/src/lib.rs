mod capture;
mod overlay;
mod routes;
mod server;
mod source;
mod stream;
mod telemetry;

pub mod app;
pub mod config;

pub use app::start_app;
