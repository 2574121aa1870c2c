//! Online Store API Library
//!
//! REST backend for a Vietnamese online store: catalog, customers and
//! addresses, orders with stock reservation, reviews, VNPAY payments and
//! GHN shipping quotes.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod state;
