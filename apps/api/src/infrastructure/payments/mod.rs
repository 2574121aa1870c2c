// Payment gateway adapters

pub mod vnpay;

pub use vnpay::{VnpayCallback, VnpayGateway};

use thiserror::Error;

/// Errors raised while building or verifying gateway messages
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Invalid payment signature")]
    InvalidSignature,
    #[error("Missing payment parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid payment parameter {0}: {1}")]
    InvalidParameter(&'static str, String),
}
