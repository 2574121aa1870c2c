// Request handlers, one module per resource

pub mod addresses;
pub mod auth;
pub mod categories;
pub mod common;
pub mod customers;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod shipping;
pub mod suppliers;
pub mod uploads;
pub mod users;
