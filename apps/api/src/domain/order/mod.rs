// Order domain module
// Contains the order aggregate root and its value objects

#![allow(clippy::module_inception)]

pub mod order;
pub mod value_objects;

pub use order::{NewOrder, Order, OrderItem, OrderSnapshot, OrderState, ShippingAddress};
pub use value_objects::{OrderStatus, PaymentMethod, PaymentStatus};
