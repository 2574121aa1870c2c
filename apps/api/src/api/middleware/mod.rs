// Request extractors and tower layers

pub mod auth;
pub mod rate_limit;
