//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

use crate::config::AppConfig;
use crate::domain::repositories::{
    AddressRepository, CategoryRepository, CustomerRepository, OrderRepository,
    ProductRepository, ReviewRepository, SupplierRepository, UserRepository,
};
use crate::infrastructure::email::{EmailError, LogMailer, Mailer, SmtpMailer};
use crate::infrastructure::payments::VnpayGateway;
use crate::infrastructure::repositories::{
    MemoryStore, PostgresAddressRepository, PostgresCategoryRepository,
    PostgresCustomerRepository, PostgresOrderRepository, PostgresProductRepository,
    PostgresReviewRepository, PostgresSupplierRepository, PostgresUserRepository,
};
use crate::infrastructure::shipping::{GhnClient, ShippingError, ShippingProvider};
use crate::infrastructure::storage::ImageStorage;

/// A configured provider could not be set up
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Shipping(#[from] ShippingError),
}

/// Everything a handler can reach
///
/// Cloning is cheap: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub suppliers: Arc<dyn SupplierRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub addresses: Arc<dyn AddressRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when GHN is not configured
    pub shipping: Option<Arc<dyn ShippingProvider>>,
    /// `None` when VNPAY is not configured
    pub vnpay: Option<Arc<VnpayGateway>>,
    pub storage: Arc<ImageStorage>,
}

impl AppState {
    /// State backed by PostgreSQL, with providers built from `config`
    pub fn postgres(config: AppConfig, pool: PgPool) -> Result<Self, ProviderError> {
        let mut state = Self::with_store(
            config,
            Stores {
                users: Arc::new(PostgresUserRepository::new(pool.clone())),
                categories: Arc::new(PostgresCategoryRepository::new(pool.clone())),
                suppliers: Arc::new(PostgresSupplierRepository::new(pool.clone())),
                products: Arc::new(PostgresProductRepository::new(pool.clone())),
                customers: Arc::new(PostgresCustomerRepository::new(pool.clone())),
                addresses: Arc::new(PostgresAddressRepository::new(pool.clone())),
                orders: Arc::new(PostgresOrderRepository::new(pool.clone())),
                reviews: Arc::new(PostgresReviewRepository::new(pool)),
            },
        );
        state.connect_providers()?;
        Ok(state)
    }

    /// State backed by a fresh in-memory store, with providers built from `config`
    pub fn in_memory(config: AppConfig) -> Result<Self, ProviderError> {
        let mut state = Self::with_store(config, Stores::memory(Arc::new(MemoryStore::new())));
        state.connect_providers()?;
        Ok(state)
    }

    /// Swaps the mailer (tests record outgoing mail this way)
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Swaps the shipping provider
    pub fn with_shipping(mut self, shipping: Arc<dyn ShippingProvider>) -> Self {
        self.shipping = Some(shipping);
        self
    }

    fn with_store(config: AppConfig, stores: Stores) -> Self {
        let storage = ImageStorage::new(config.upload_dir.clone(), config.max_upload_bytes);
        Self {
            config: Arc::new(config),
            users: stores.users,
            categories: stores.categories,
            suppliers: stores.suppliers,
            products: stores.products,
            customers: stores.customers,
            addresses: stores.addresses,
            orders: stores.orders,
            reviews: stores.reviews,
            mailer: Arc::new(LogMailer),
            shipping: None,
            vnpay: None,
            storage: Arc::new(storage),
        }
    }

    fn connect_providers(&mut self) -> Result<(), ProviderError> {
        if let Some(email) = &self.config.email {
            self.mailer = Arc::new(SmtpMailer::new(email)?);
            tracing::info!(host = %email.smtp_host, "SMTP email enabled");
        } else {
            tracing::info!("SMTP not configured, emails will be logged");
        }

        if let Some(ghn) = &self.config.ghn {
            self.shipping = Some(Arc::new(GhnClient::new(ghn.clone())?));
            tracing::info!(api = %ghn.api_url, "GHN shipping enabled");
        }

        if let Some(vnpay) = &self.config.vnpay {
            self.vnpay = Some(Arc::new(VnpayGateway::new(vnpay.clone())));
            tracing::info!(tmn_code = %vnpay.tmn_code, "VNPAY payments enabled");
        }

        Ok(())
    }
}

struct Stores {
    users: Arc<dyn UserRepository>,
    categories: Arc<dyn CategoryRepository>,
    suppliers: Arc<dyn SupplierRepository>,
    products: Arc<dyn ProductRepository>,
    customers: Arc<dyn CustomerRepository>,
    addresses: Arc<dyn AddressRepository>,
    orders: Arc<dyn OrderRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl Stores {
    fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            categories: store.clone(),
            suppliers: store.clone(),
            products: store.clone(),
            customers: store.clone(),
            addresses: store.clone(),
            orders: store.clone(),
            reviews: store,
        }
    }
}
