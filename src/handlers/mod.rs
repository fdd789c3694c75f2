mod health;
mod metrics;
mod submit;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use submit::{client_ip, submit_booking_handler};
