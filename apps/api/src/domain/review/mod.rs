#![allow(clippy::module_inception)]

pub mod review;

pub use review::Review;
