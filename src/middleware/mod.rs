// Middleware modules
pub mod traffic_log;

pub use traffic_log::traffic_log_middleware;
