// Infrastructure layer module
// Database adapters and external service integrations
// Follows Hexagonal Architecture

pub mod email;
pub mod payments;
pub mod repositories;
pub mod shipping;
pub mod storage;
