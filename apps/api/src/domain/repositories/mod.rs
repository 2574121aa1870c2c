// Repository interfaces (ports)
// Implementations live in the infrastructure layer

pub mod address_repository;
pub mod category_repository;
pub mod customer_repository;
pub mod order_repository;
pub mod product_repository;
pub mod review_repository;
pub mod supplier_repository;
pub mod user_repository;

pub use address_repository::AddressRepository;
pub use category_repository::CategoryRepository;
pub use customer_repository::CustomerRepository;
pub use order_repository::{OrderFilter, OrderRepository};
pub use product_repository::ProductRepository;
pub use review_repository::{ReviewFilter, ReviewRepository};
pub use supplier_repository::SupplierRepository;
pub use user_repository::{UserFilter, UserRepository};
