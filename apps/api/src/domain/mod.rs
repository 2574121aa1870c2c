// Domain layer module exports
// Following Hexagonal Architecture and DDD principles
// Domain is independent of infrastructure concerns

pub mod catalog;
pub mod customer;
pub mod errors;
pub mod order;
pub mod pagination;
pub mod repositories;
pub mod review;
pub mod user;
pub mod validation;
