use crate::auth::{AuthService, RateLimiter};

/// Shared by every worker through `web::Data<AppState>`.
pub struct AppState {
    pub service: AuthService,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(service: AuthService, limiter: RateLimiter) -> Self {
        Self { service, limiter }
    }
}
