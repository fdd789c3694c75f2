use std::sync::Arc;
use crate::forwarder::SheetsForwarder;
use crate::rate_limit::RateLimiter;

// app's shared state

pub struct AppState {
    pub limiter: Arc<RateLimiter>, // also held by the sweeper task
    pub forwarder: SheetsForwarder,
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, forwarder: SheetsForwarder) -> Arc<Self> {
        Arc::new(Self { limiter, forwarder })
    }
}
