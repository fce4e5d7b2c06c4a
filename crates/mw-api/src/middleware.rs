//! Middleware for request logging, CORS, and security headers.

use actix_cors::Cors;
use actix_web::http::Method;
use actix_web::middleware::{DefaultHeaders, Logger};

/// remote-ip "request-line" status-code response-size "referrer" "user-agent", plus latency.
pub fn standard_middleware() -> Logger {
    Logger::new(r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#)
}

/// CORS for the wall's browser clients. An empty origin list allows any origin.
pub fn cors_policy(origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec![Method::GET, Method::POST, Method::DELETE])
        .allow_any_header()
        .supports_credentials()
        .max_age(3600);
    if origins.is_empty() {
        return cors.allow_any_origin();
    }
    origins.iter().fold(cors, |cors, origin| cors.allowed_origin(origin))
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("X-Frame-Options", "DENY"))
}
