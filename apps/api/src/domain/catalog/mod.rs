// Catalog domain module: categories, suppliers and products

pub mod category;
pub mod product;
pub mod supplier;

pub use category::{Category, CategoryDraft};
pub use product::{Product, ProductDraft, ProductFilter, ProductSort, RatingSummary};
pub use supplier::{Supplier, SupplierDraft};
