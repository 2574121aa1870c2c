// Customer domain module: customers, their addresses and phone numbers

pub mod address;
pub mod customer;
pub mod value_objects;

pub use address::{Address, Location};
pub use customer::{Customer, CustomerContact};
pub use value_objects::PhoneNumber;
