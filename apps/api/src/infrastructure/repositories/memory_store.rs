use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::catalog::{
    Category, Product, ProductFilter, ProductSort, RatingSummary, Supplier,
};
use crate::domain::customer::{Address, Customer, CustomerContact, PhoneNumber};
use crate::domain::errors::{RepositoryError, RepositoryResult};
use crate::domain::order::value_objects::OrderStatus;
use crate::domain::order::Order;
use crate::domain::pagination::{paginate, PageRequest, RecordScope};
use crate::domain::repositories::{
    AddressRepository, CategoryRepository, CustomerRepository, OrderFilter, OrderRepository,
    ProductRepository, ReviewFilter, ReviewRepository, SupplierRepository, UserFilter,
    UserRepository,
};
use crate::domain::review::Review;
use crate::domain::user::value_objects::Email;
use crate::domain::user::User;

/// In-process implementation of every repository
///
/// Mirrors the constraints of the PostgreSQL schema (unique keys,
/// restricting foreign keys, atomic stock reservation) so handlers behave
/// the same against either store. Used by the HTTP tests and for running
/// the API without a database.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    categories: RwLock<HashMap<Uuid, Category>>,
    suppliers: RwLock<HashMap<Uuid, Supplier>>,
    products: RwLock<HashMap<Uuid, Product>>,
    customers: RwLock<HashMap<Uuid, Customer>>,
    addresses: RwLock<HashMap<Uuid, Address>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    reviews: RwLock<HashMap<Uuid, Review>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn keyword_matches(keyword: Option<&str>, fields: &[&str]) -> bool {
    match keyword.map(str::trim) {
        None | Some("") => true,
        Some(keyword) => {
            let keyword = keyword.to_lowercase();
            fields
                .iter()
                .any(|field| field.to_lowercase().contains(&keyword))
        }
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn save(&self, user: &User) -> RepositoryResult<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(RepositoryError::Duplicate(format!(
                "email {}",
                user.email
            )));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .get(&id)
            .filter(|u| scope.includes(u.is_deleted))
            .cloned())
    }

    async fn find_by_email(&self, email: &Email) -> RepositoryResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| &u.email == email).cloned())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<User>, u64)> {
        let users = self.users.read().await;
        let mut rows: Vec<User> = users
            .values()
            .filter(|u| scope.includes(u.is_deleted) && filter.matches(u))
            .cloned()
            .collect();
        rows.sort_by_key(|u| (Reverse(u.created_at), u.id));
        Ok(paginate(rows, page))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            for customer in self.customers.write().await.values_mut() {
                if customer.user_id == Some(id) {
                    customer.user_id = None;
                }
            }
            self.reviews.write().await.retain(|_, r| r.user_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn save(&self, category: &Category) -> RepositoryResult<()> {
        let mut categories = self.categories.write().await;
        let name = category.name.to_lowercase();
        if categories
            .values()
            .any(|c| c.id != category.id && c.name.to_lowercase() == name)
        {
            return Err(RepositoryError::Duplicate(format!(
                "category name {}",
                category.name
            )));
        }
        categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> RepositoryResult<Option<Category>> {
        let categories = self.categories.read().await;
        Ok(categories
            .get(&id)
            .filter(|c| scope.includes(c.is_deleted))
            .cloned())
    }

    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Category>, u64)> {
        let categories = self.categories.read().await;
        let mut rows: Vec<Category> = categories
            .values()
            .filter(|c| scope.includes(c.is_deleted) && keyword_matches(keyword, &[&c.name]))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(rows, page))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        if self
            .products
            .read()
            .await
            .values()
            .any(|p| p.category_id == Some(id))
        {
            return Err(RepositoryError::Conflict(format!(
                "category {} has products",
                id
            )));
        }
        Ok(self.categories.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl SupplierRepository for MemoryStore {
    async fn save(&self, supplier: &Supplier) -> RepositoryResult<()> {
        let mut suppliers = self.suppliers.write().await;
        let name = supplier.name.to_lowercase();
        if suppliers
            .values()
            .any(|s| s.id != supplier.id && s.name.to_lowercase() == name)
        {
            return Err(RepositoryError::Duplicate(format!(
                "supplier name {}",
                supplier.name
            )));
        }
        suppliers.insert(supplier.id, supplier.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> RepositoryResult<Option<Supplier>> {
        let suppliers = self.suppliers.read().await;
        Ok(suppliers
            .get(&id)
            .filter(|s| scope.includes(s.is_deleted))
            .cloned())
    }

    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Supplier>, u64)> {
        let suppliers = self.suppliers.read().await;
        let mut rows: Vec<Supplier> = suppliers
            .values()
            .filter(|s| scope.includes(s.is_deleted) && keyword_matches(keyword, &[&s.name]))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(paginate(rows, page))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        if self
            .products
            .read()
            .await
            .values()
            .any(|p| p.supplier_id == Some(id))
        {
            return Err(RepositoryError::Conflict(format!(
                "supplier {} has products",
                id
            )));
        }
        Ok(self.suppliers.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn save(&self, product: &Product) -> RepositoryResult<()> {
        let mut products = self.products.write().await;
        let mut stored = product.clone();
        if let Some(current) = products.get(&product.id) {
            stored.rating = current.rating;
            stored.num_reviews = current.num_reviews;
        }
        products.insert(product.id, stored);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Product>> {
        let products = self.products.read().await;
        Ok(products
            .get(&id)
            .filter(|p| scope.includes(p.is_deleted))
            .cloned())
    }

    async fn set_rating(&self, id: Uuid, summary: RatingSummary) -> RepositoryResult<()> {
        if let Some(product) = self.products.write().await.get_mut(&id) {
            product.set_rating(summary);
        }
        Ok(())
    }

    async fn set_deleted(&self, id: Uuid, deleted: bool) -> RepositoryResult<bool> {
        let mut products = self.products.write().await;
        match products.get_mut(&id) {
            Some(product) if product.is_deleted != deleted => {
                if deleted {
                    product.soft_delete();
                } else {
                    product.restore();
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_many(&self, ids: &[Uuid]) -> RepositoryResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.get(id))
            .filter(|p| !p.is_deleted)
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        filter: &ProductFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Product>, u64)> {
        let products = self.products.read().await;
        let mut rows: Vec<Product> = products
            .values()
            .filter(|p| scope.includes(p.is_deleted) && filter.matches(p))
            .cloned()
            .collect();
        match filter.sort {
            ProductSort::Newest => rows.sort_by_key(|p| (Reverse(p.created_at), p.id)),
            ProductSort::PriceAsc => rows.sort_by_key(|p| (p.price, p.id)),
            ProductSort::PriceDesc => rows.sort_by_key(|p| (Reverse(p.price), p.id)),
            ProductSort::Rating => rows.sort_by(|a, b| {
                b.rating
                    .total_cmp(&a.rating)
                    .then(b.num_reviews.cmp(&a.num_reviews))
                    .then(a.id.cmp(&b.id))
            }),
        }
        Ok(paginate(rows, page))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        if self
            .orders
            .read()
            .await
            .values()
            .any(|o| o.items().iter().any(|i| i.product_id == id))
        {
            return Err(RepositoryError::Conflict(format!(
                "product {} appears on orders",
                id
            )));
        }
        let removed = self.products.write().await.remove(&id).is_some();
        if removed {
            self.reviews.write().await.retain(|_, r| r.product_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn save(&self, customer: &Customer) -> RepositoryResult<()> {
        let mut customers = self.customers.write().await;
        if customers
            .values()
            .any(|c| c.id != customer.id && c.phone == customer.phone)
        {
            return Err(RepositoryError::Duplicate(format!(
                "phone {}",
                customer.phone
            )));
        }
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        scope: RecordScope,
    ) -> RepositoryResult<Option<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers
            .get(&id)
            .filter(|c| scope.includes(c.is_deleted))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &PhoneNumber) -> RepositoryResult<Option<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers.values().find(|c| &c.phone == phone).cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> RepositoryResult<Option<Customer>> {
        let customers = self.customers.read().await;
        Ok(customers
            .values()
            .find(|c| !c.is_deleted && c.user_id == Some(user_id))
            .cloned())
    }

    async fn upsert_by_phone(&self, contact: CustomerContact) -> RepositoryResult<Customer> {
        // one write lock for the whole read-modify-write
        let mut customers = self.customers.write().await;
        if let Some(existing) = customers.values_mut().find(|c| c.phone == contact.phone) {
            existing.merge_contact(contact);
            return Ok(existing.clone());
        }
        let customer = Customer::new(contact);
        customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn list(
        &self,
        keyword: Option<&str>,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Customer>, u64)> {
        let customers = self.customers.read().await;
        let mut rows: Vec<Customer> = customers
            .values()
            .filter(|c| {
                scope.includes(c.is_deleted)
                    && keyword_matches(keyword, &[&c.name, c.phone.as_str()])
            })
            .cloned()
            .collect();
        rows.sort_by_key(|c| (Reverse(c.created_at), c.id));
        Ok(paginate(rows, page))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        if self
            .orders
            .read()
            .await
            .values()
            .any(|o| o.customer_id() == id)
        {
            return Err(RepositoryError::Conflict(format!(
                "customer {} has orders",
                id
            )));
        }
        let removed = self.customers.write().await.remove(&id).is_some();
        if removed {
            self.addresses
                .write()
                .await
                .retain(|_, a| a.customer_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl AddressRepository for MemoryStore {
    async fn save(&self, address: &Address) -> RepositoryResult<()> {
        let mut addresses = self.addresses.write().await;
        if address.is_default && !address.is_deleted {
            for other in addresses.values_mut() {
                if other.customer_id == address.customer_id && other.id != address.id {
                    other.is_default = false;
                }
            }
        }
        addresses.insert(address.id, address.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Address>> {
        let addresses = self.addresses.read().await;
        Ok(addresses
            .get(&id)
            .filter(|a| scope.includes(a.is_deleted))
            .cloned())
    }

    async fn list_by_customer(
        &self,
        customer_id: Uuid,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Address>, u64)> {
        let addresses = self.addresses.read().await;
        let mut rows: Vec<Address> = addresses
            .values()
            .filter(|a| a.customer_id == customer_id && scope.includes(a.is_deleted))
            .cloned()
            .collect();
        rows.sort_by_key(|a| (Reverse(a.is_default), Reverse(a.created_at), a.id));
        Ok(paginate(rows, page))
    }

    async fn list(
        &self,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Address>, u64)> {
        let addresses = self.addresses.read().await;
        let mut rows: Vec<Address> = addresses
            .values()
            .filter(|a| scope.includes(a.is_deleted))
            .cloned()
            .collect();
        rows.sort_by_key(|a| (Reverse(a.updated_at), a.id));
        Ok(paginate(rows, page))
    }

    async fn count_live(&self, customer_id: Uuid) -> RepositoryResult<u64> {
        let addresses = self.addresses.read().await;
        Ok(addresses
            .values()
            .filter(|a| a.customer_id == customer_id && !a.is_deleted)
            .count() as u64)
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.addresses.write().await.remove(&id).is_some())
    }
}

/// Same guard as the conditional UPDATE in the Postgres repository
fn check_order_state(current: Option<&Order>, order: &Order) -> RepositoryResult<()> {
    match current {
        None => Err(RepositoryError::NotFound(order.id())),
        Some(current) if current.state() != order.persisted_state() => {
            Err(RepositoryError::Stale(order.id()))
        }
        Some(_) => Ok(()),
    }
}

fn persisted(order: &Order) -> Order {
    let mut stored = order.clone();
    stored.mark_persisted();
    stored
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn place(&self, order: &Order) -> RepositoryResult<()> {
        // lock order: products before orders, same as cancel()
        let mut products = self.products.write().await;

        for item in order.items() {
            let available = products
                .get(&item.product_id)
                .is_some_and(|p| p.is_available(item.quantity));
            if !available {
                return Err(RepositoryError::InsufficientStock(item.product_id));
            }
        }
        for item in order.items() {
            if let Some(product) = products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
            }
        }

        self.orders.write().await.insert(order.id(), order.clone());
        Ok(())
    }

    async fn save(&self, order: &Order) -> RepositoryResult<()> {
        let mut orders = self.orders.write().await;
        check_order_state(orders.get(&order.id()), order)?;
        orders.insert(order.id(), persisted(order));
        Ok(())
    }

    async fn cancel(&self, order: &Order) -> RepositoryResult<()> {
        let mut products = self.products.write().await;
        let mut orders = self.orders.write().await;
        let current = orders.get(&order.id());
        if current.is_some_and(|o| o.status() == OrderStatus::Cancelled) {
            return Err(RepositoryError::Stale(order.id()));
        }
        check_order_state(current, order)?;

        for item in order.items() {
            if let Some(product) = products.get_mut(&item.product_id) {
                product.stock += item.quantity;
            }
        }
        orders.insert(order.id(), persisted(order));
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .get(&id)
            .filter(|o| scope.includes(o.is_deleted()))
            .cloned())
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Order>, u64)> {
        let orders = self.orders.read().await;
        let mut rows: Vec<Order> = orders
            .values()
            .filter(|o| scope.includes(o.is_deleted()) && filter.matches(o))
            .cloned()
            .collect();
        rows.sort_by_key(|o| (Reverse(o.created_at()), o.id()));
        Ok(paginate(rows, page))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.orders.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn save(&self, review: &Review) -> RepositoryResult<()> {
        let mut reviews = self.reviews.write().await;
        if !review.is_deleted
            && reviews.values().any(|r| {
                r.id != review.id
                    && !r.is_deleted
                    && r.product_id == review.product_id
                    && r.user_id == review.user_id
            })
        {
            return Err(RepositoryError::Duplicate(format!(
                "review of product {} by user {}",
                review.product_id, review.user_id
            )));
        }
        reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid, scope: RecordScope) -> RepositoryResult<Option<Review>> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .get(&id)
            .filter(|r| scope.includes(r.is_deleted))
            .cloned())
    }

    async fn list(
        &self,
        filter: &ReviewFilter,
        scope: RecordScope,
        page: &PageRequest,
    ) -> RepositoryResult<(Vec<Review>, u64)> {
        let reviews = self.reviews.read().await;
        let mut rows: Vec<Review> = reviews
            .values()
            .filter(|r| scope.includes(r.is_deleted) && filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| (Reverse(r.created_at), r.id));
        Ok(paginate(rows, page))
    }

    async fn live_ratings(&self, product_id: Uuid) -> RepositoryResult<Vec<i16>> {
        let reviews = self.reviews.read().await;
        Ok(reviews
            .values()
            .filter(|r| r.product_id == product_id && !r.is_deleted)
            .map(|r| r.rating)
            .collect())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.reviews.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::{CategoryDraft, ProductDraft};
    use crate::domain::customer::Location;
    use crate::domain::order::{NewOrder, OrderItem, PaymentMethod, ShippingAddress};
    use rust_decimal::Decimal;

    fn phone(raw: &str) -> PhoneNumber {
        PhoneNumber::new(raw).unwrap()
    }

    fn location() -> Location {
        Location::new("1 Lê Lợi", (202, "HCM"), (1442, "Quận 1"), ("20109", "Bến Nghé")).unwrap()
    }

    async fn product_with_stock(store: &MemoryStore, stock: i32) -> Product {
        let product = Product::new(ProductDraft {
            name: "Sạc dự phòng".into(),
            price: Decimal::new(300_000, 0),
            stock,
            ..Default::default()
        })
        .unwrap();
        ProductRepository::save(store, &product).await.unwrap();
        product
    }

    fn order_for(product: &Product, quantity: i32) -> Order {
        Order::place(NewOrder {
            customer_id: Uuid::new_v4(),
            user_id: None,
            items: vec![OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                quantity,
                unit_price: product.price,
            }],
            shipping_address: ShippingAddress::new("Lan", phone("0912345678"), location())
                .unwrap(),
            shipping_fee: Decimal::ZERO,
            payment_method: PaymentMethod::Cod,
            note: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_category_name_is_case_insensitive() {
        let store = MemoryStore::new();
        let first = Category::new(CategoryDraft {
            name: "Laptop".into(),
            ..Default::default()
        })
        .unwrap();
        let second = Category::new(CategoryDraft {
            name: "LAPTOP".into(),
            ..Default::default()
        })
        .unwrap();

        CategoryRepository::save(&store, &first).await.unwrap();
        let err = CategoryRepository::save(&store, &second).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn upsert_by_phone_reuses_existing_customer() {
        let store = MemoryStore::new();
        let first = store
            .upsert_by_phone(CustomerContact::new("Lan", phone("0912345678"), None, None).unwrap())
            .await
            .unwrap();
        let second = store
            .upsert_by_phone(
                CustomerContact::new("Trần Lan", phone("+84 912 345 678"), None, None).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Trần Lan");
        let (all, total) = CustomerRepository::list(&store, None, RecordScope::Any, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn saving_default_address_clears_previous_default() {
        let store = MemoryStore::new();
        let customer_id = Uuid::new_v4();
        let first = Address::new(customer_id, "Lan", phone("0912345678"), location(), true).unwrap();
        let second =
            Address::new(customer_id, "Lan", phone("0912345678"), location(), true).unwrap();

        AddressRepository::save(&store, &first).await.unwrap();
        AddressRepository::save(&store, &second).await.unwrap();

        let first = AddressRepository::find_by_id(&store, first.id, RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        assert!(!first.is_default);

        let (rows, _) = store
            .list_by_customer(customer_id, RecordScope::Active, &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(rows.iter().filter(|a| a.is_default).count(), 1);
        assert_eq!(rows[0].id, second.id);
    }

    #[tokio::test]
    async fn place_reserves_stock_and_cancel_releases_it() {
        let store = MemoryStore::new();
        let product = product_with_stock(&store, 5).await;
        let mut order = order_for(&product, 3);

        store.place(&order).await.unwrap();
        let after_place = ProductRepository::find_by_id(&store, product.id, RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_place.stock, 2);

        order.cancel().unwrap();
        store.cancel(&order).await.unwrap();
        let after_cancel = ProductRepository::find_by_id(&store, product.id, RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_cancel.stock, 5);
    }

    async fn stock_of(store: &MemoryStore, id: Uuid) -> i32 {
        ProductRepository::find_by_id(store, id, RecordScope::Any)
            .await
            .unwrap()
            .unwrap()
            .stock
    }

    #[tokio::test]
    async fn stale_order_copy_cannot_overwrite_a_cancellation() {
        let store = MemoryStore::new();
        let product = product_with_stock(&store, 5).await;
        let order = order_for(&product, 2);
        store.place(&order).await.unwrap();

        // two requests read the same pending order
        let mut cancelled = OrderRepository::find_by_id(&store, order.id(), RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        let mut confirmed = cancelled.clone();

        cancelled.cancel().unwrap();
        store.cancel(&cancelled).await.unwrap();
        assert_eq!(stock_of(&store, product.id).await, 5);

        confirmed.transition_to(OrderStatus::Confirmed).unwrap();
        let err = OrderRepository::save(&store, &confirmed).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Stale(id) if id == order.id()));

        let stored = OrderRepository::find_by_id(&store, order.id(), RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);
        assert_eq!(stock_of(&store, product.id).await, 5);
    }

    #[tokio::test]
    async fn stale_cancel_does_not_restock() {
        let store = MemoryStore::new();
        let product = product_with_stock(&store, 5).await;
        let order = order_for(&product, 2);
        store.place(&order).await.unwrap();

        let mut shipped = order.clone();
        shipped.transition_to(OrderStatus::Confirmed).unwrap();
        OrderRepository::save(&store, &shipped).await.unwrap();

        let mut stale = order.clone();
        stale.cancel().unwrap();
        let err = store.cancel(&stale).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Stale(_)));
        assert_eq!(stock_of(&store, product.id).await, 3);

        // a fresh read can still be cancelled
        let mut fresh = OrderRepository::find_by_id(&store, order.id(), RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        fresh.cancel().unwrap();
        store.cancel(&fresh).await.unwrap();
        assert_eq!(stock_of(&store, product.id).await, 5);
    }

    #[tokio::test]
    async fn trashing_a_product_keeps_stock_and_rating() {
        let store = MemoryStore::new();
        let product = product_with_stock(&store, 5).await;
        let stale = product.clone();

        store.place(&order_for(&product, 2)).await.unwrap();
        assert!(store.set_deleted(product.id, true).await.unwrap());
        assert!(!store.set_deleted(product.id, true).await.unwrap());
        assert!(store.set_deleted(product.id, false).await.unwrap());
        assert_eq!(stock_of(&store, product.id).await, 3);

        store
            .set_rating(product.id, RatingSummary::from_ratings(&[4, 5]))
            .await
            .unwrap();
        ProductRepository::save(&store, &stale).await.unwrap();
        let stored = ProductRepository::find_by_id(&store, product.id, RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.num_reviews, 2);
    }

    #[tokio::test]
    async fn place_with_insufficient_stock_writes_nothing() {
        let store = MemoryStore::new();
        let product = product_with_stock(&store, 1).await;
        let order = order_for(&product, 2);

        let err = store.place(&order).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InsufficientStock(id) if id == product.id));

        let unchanged = ProductRepository::find_by_id(&store, product.id, RecordScope::Active)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.stock, 1);
        assert!(OrderRepository::find_by_id(&store, order.id(), RecordScope::Any)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn category_with_products_cannot_be_hard_deleted() {
        let store = MemoryStore::new();
        let category = Category::new(CategoryDraft {
            name: "Tablet".into(),
            ..Default::default()
        })
        .unwrap();
        CategoryRepository::save(&store, &category).await.unwrap();

        let product = Product::new(ProductDraft {
            name: "iPad".into(),
            category_id: Some(category.id),
            ..Default::default()
        })
        .unwrap();
        ProductRepository::save(&store, &product).await.unwrap();

        let err = CategoryRepository::delete(&store, category.id)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
