//! Integration tests for the PostgreSQL repositories
//!
//! These run against the database in `DATABASE_URL` and are skipped when it
//! is unset. Every test creates uniquely named rows and removes them again.

use online_store_api::auth::password::hash_password;
use online_store_api::domain::catalog::{Category, CategoryDraft, Product, ProductDraft, RatingSummary};
use online_store_api::domain::customer::{CustomerContact, Location, PhoneNumber};
use online_store_api::domain::errors::RepositoryError;
use online_store_api::domain::order::{
    NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress,
};
use online_store_api::domain::pagination::{PageRequest, RecordScope};
use online_store_api::domain::repositories::{
    CategoryRepository, CustomerRepository, OrderRepository, ProductRepository,
    ReviewRepository, UserRepository,
};
use online_store_api::domain::review::Review;
use online_store_api::domain::user::{Email, User};
use online_store_api::infrastructure::repositories::{
    PostgresCategoryRepository, PostgresCustomerRepository, PostgresOrderRepository,
    PostgresProductRepository, PostgresReviewRepository, PostgresUserRepository,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Connects and migrates, or returns `None` when no database is configured
async fn setup_test_db() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping repository test");
        return None;
    };

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

/// Suffix that keeps names unique across test runs
fn unique() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// A random, valid mobile number
fn random_phone() -> PhoneNumber {
    let digits = Uuid::new_v4().as_u128() % 100_000_000;
    PhoneNumber::new(format!("09{:08}", digits)).expect("valid phone")
}

async fn create_product(pool: &PgPool, category_id: Option<Uuid>, stock: i32) -> Product {
    let product = Product::new(ProductDraft {
        name: format!("Sản phẩm {}", unique()),
        description: None,
        price: Decimal::new(150_000, 0),
        stock,
        image: None,
        category_id,
        supplier_id: None,
    })
    .expect("valid product");
    PostgresProductRepository::new(pool.clone())
        .save(&product)
        .await
        .expect("save product");
    product
}

fn order_for(customer_id: Uuid, product: &Product, quantity: i32) -> Order {
    let location = Location::new(
        "12 Nguyễn Huệ",
        (202, "Hồ Chí Minh"),
        (1442, "Quận 1"),
        ("20109", "Phường Bến Nghé"),
    )
    .expect("valid location");

    Order::place(NewOrder {
        customer_id,
        user_id: None,
        items: vec![OrderItem {
            product_id: product.id,
            name: product.name.clone(),
            quantity,
            unit_price: product.price,
        }],
        shipping_address: ShippingAddress::new("Trần Thị B", random_phone(), location)
            .expect("valid address"),
        shipping_fee: Decimal::new(30_000, 0),
        payment_method: PaymentMethod::Cod,
        note: None,
    })
    .expect("valid order")
}

async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    PostgresProductRepository::new(pool.clone())
        .find_by_id(product_id, RecordScope::Any)
        .await
        .expect("find product")
        .expect("product exists")
        .stock
}

#[tokio::test]
async fn test_user_repository_save_and_find_by_email() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let repo = PostgresUserRepository::new(pool.clone());

    let email = Email::new(format!("user-{}@example.com", unique())).unwrap();
    let hash = hash_password("matkhau123", 4).unwrap();
    let user = User::register("Nguyễn Văn A", email.clone(), hash.clone(), None).unwrap();
    repo.save(&user).await.expect("save user");

    let found = repo
        .find_by_email(&email)
        .await
        .expect("find by email")
        .expect("user exists");
    assert_eq!(found.id, user.id);
    assert_eq!(found.name, "Nguyễn Văn A");

    // same email, different account
    let twin = User::register("B", email.clone(), hash, None).unwrap();
    let err = repo.save(&twin).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Duplicate(_)));

    assert!(repo.delete(user.id).await.unwrap());
    assert!(repo.find_by_email(&email).await.unwrap().is_none());
}

#[tokio::test]
async fn test_category_scopes_and_references() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let categories = PostgresCategoryRepository::new(pool.clone());
    let products = PostgresProductRepository::new(pool.clone());

    let mut category = Category::new(CategoryDraft {
        name: format!("Danh mục {}", unique()),
        description: None,
        image: None,
    })
    .unwrap();
    categories.save(&category).await.expect("save category");

    category.soft_delete();
    categories.save(&category).await.expect("soft delete");

    assert!(categories
        .find_by_id(category.id, RecordScope::Active)
        .await
        .unwrap()
        .is_none());
    assert!(categories
        .find_by_id(category.id, RecordScope::Deleted)
        .await
        .unwrap()
        .is_some());

    let (deleted, total) = categories
        .list(Some(&category.name), RecordScope::Deleted, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(deleted[0].id, category.id);

    // a product still points at it
    let product = create_product(&pool, Some(category.id), 1).await;
    let err = categories.delete(category.id).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));

    assert!(products.delete(product.id).await.unwrap());
    assert!(categories.delete(category.id).await.unwrap());
    assert!(!categories.delete(category.id).await.unwrap());
}

#[tokio::test]
async fn test_customer_upsert_by_phone() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let repo = PostgresCustomerRepository::new(pool.clone());
    let phone = random_phone();

    let first = repo
        .upsert_by_phone(CustomerContact::new("Lan", phone.clone(), None, None).unwrap())
        .await
        .unwrap();
    let email = Email::new(format!("lan-{}@example.com", unique())).unwrap();
    let second = repo
        .upsert_by_phone(
            CustomerContact::new("Trần Thị Lan", phone.clone(), Some(email.clone()), None)
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "Trần Thị Lan");
    assert_eq!(second.email, Some(email));

    let found = repo.find_by_phone(&phone).await.unwrap().unwrap();
    assert_eq!(found.id, first.id);

    assert!(repo.delete(first.id).await.unwrap());
}

#[tokio::test]
async fn test_order_place_reserves_and_cancel_releases_stock() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let orders = PostgresOrderRepository::new(pool.clone());
    let customers = PostgresCustomerRepository::new(pool.clone());
    let products = PostgresProductRepository::new(pool.clone());

    let customer = customers
        .upsert_by_phone(CustomerContact::new("Khách", random_phone(), None, None).unwrap())
        .await
        .unwrap();
    let product = create_product(&pool, None, 5).await;

    let mut order = order_for(customer.id, &product, 2);
    orders.place(&order).await.expect("place order");
    assert_eq!(stock_of(&pool, product.id).await, 3);

    let stored = orders
        .find_by_id(order.id(), RecordScope::Active)
        .await
        .unwrap()
        .expect("order stored");
    assert_eq!(stored.items().len(), 1);
    assert_eq!(stored.total_price(), Decimal::new(330_000, 0));
    assert_eq!(stored.status(), OrderStatus::Pending);

    // more than what is left: nothing is reserved, nothing is stored
    let greedy = order_for(customer.id, &product, 4);
    let err = orders.place(&greedy).await.unwrap_err();
    assert!(matches!(err, RepositoryError::InsufficientStock(id) if id == product.id));
    assert_eq!(stock_of(&pool, product.id).await, 3);
    assert!(orders
        .find_by_id(greedy.id(), RecordScope::Any)
        .await
        .unwrap()
        .is_none());

    order.cancel().unwrap();
    orders.cancel(&order).await.expect("cancel order");
    assert_eq!(stock_of(&pool, product.id).await, 5);

    // cancelling twice must not release stock again
    let err = orders.cancel(&order).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Stale(id) if id == order.id()));
    assert_eq!(stock_of(&pool, product.id).await, 5);

    // a copy read before the cancellation cannot bring the order back
    let mut stale = stored;
    stale.transition_to(OrderStatus::Confirmed).unwrap();
    let err = orders.save(&stale).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Stale(_)));
    let current = orders
        .find_by_id(order.id(), RecordScope::Any)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status(), OrderStatus::Cancelled);

    assert!(orders.delete(order.id()).await.unwrap());
    assert!(products.delete(product.id).await.unwrap());
    assert!(customers.delete(customer.id).await.unwrap());
}

#[tokio::test]
async fn test_product_trash_touches_only_the_flag() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let products = PostgresProductRepository::new(pool.clone());
    let product = create_product(&pool, None, 7).await;

    products
        .set_rating(product.id, RatingSummary::from_ratings(&[5, 3]))
        .await
        .unwrap();
    assert!(products.set_deleted(product.id, true).await.unwrap());
    assert!(!products.set_deleted(product.id, true).await.unwrap());

    // an older copy does not reset the rating
    products.save(&product).await.unwrap();
    let stored = products
        .find_by_id(product.id, RecordScope::Any)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.num_reviews, 2);
    assert_eq!(stored.stock, 7);

    assert!(products.delete(product.id).await.unwrap());
}

#[tokio::test]
async fn test_review_one_live_per_user() {
    let Some(pool) = setup_test_db().await else {
        return;
    };
    let reviews = PostgresReviewRepository::new(pool.clone());
    let users = PostgresUserRepository::new(pool.clone());
    let products = PostgresProductRepository::new(pool.clone());

    let email = Email::new(format!("reviewer-{}@example.com", unique())).unwrap();
    let user = User::register("Reviewer", email, "hash".to_string(), None).unwrap();
    users.save(&user).await.unwrap();
    let product = create_product(&pool, None, 1).await;

    let mut first = Review::new(product.id, user.id, &user.name, 4, Some("Tốt")).unwrap();
    reviews.save(&first).await.expect("save review");

    let second = Review::new(product.id, user.id, &user.name, 2, None).unwrap();
    let err = reviews.save(&second).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Duplicate(_)));

    assert_eq!(reviews.live_ratings(product.id).await.unwrap(), vec![4]);

    // once the first is trashed the user may review again
    first.soft_delete();
    reviews.save(&first).await.unwrap();
    reviews.save(&second).await.expect("second review");
    assert_eq!(reviews.live_ratings(product.id).await.unwrap(), vec![2]);

    assert!(products.delete(product.id).await.unwrap());
    assert!(users.delete(user.id).await.unwrap());
}
