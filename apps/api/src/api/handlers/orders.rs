use std::collections::HashMap;

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::addresses::{build_location, LocationInput};
use super::common::{message, non_blank, notify, MessageResponse, PageQuery};
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::{CurrentUser, MaybeUser};
use crate::domain::customer::{CustomerContact, PhoneNumber};
use crate::domain::order::{
    NewOrder, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
};
use crate::domain::pagination::{Page, PageRequest, RecordScope};
use crate::domain::repositories::OrderFilter;
use crate::domain::user::{Email, Role};
use crate::infrastructure::email::{order_confirmation_email, order_status_email};
use crate::infrastructure::shipping::FeeRequest;
use crate::state::AppState;

/// Parcel weight quoted to the carrier per unit ordered, in grams
const GRAMS_PER_UNIT: u32 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressRequest {
    pub recipient_name: String,
    pub phone: String,
    #[serde(flatten)]
    pub location: LocationInput,
}

/// Checkout form
///
/// The buyer is identified by `phone`; `addressId` picks one of the
/// buyer's saved addresses instead of an inline `shippingAddress`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address_id: Option<Uuid>,
    pub shipping_address: Option<ShippingAddressRequest>,
    pub items: Vec<OrderItemRequest>,
    #[serde(default = "default_payment_method")]
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::Cod
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressResponse {
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub province_id: i32,
    pub province_name: String,
    pub district_id: i32,
    pub district_name: String,
    pub ward_code: String,
    pub ward_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub user_id: Option<Uuid>,
    pub items: Vec<OrderItemResponse>,
    pub shipping_address: ShippingAddressResponse,
    pub items_price: Decimal,
    pub shipping_fee: Decimal,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let address = order.shipping_address();
        let location = &address.location;
        Self {
            id: order.id(),
            customer_id: order.customer_id(),
            user_id: order.user_id(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
            shipping_address: ShippingAddressResponse {
                recipient_name: address.recipient_name.clone(),
                phone: address.phone.to_string(),
                street: location.street.clone(),
                province_id: location.province_id,
                province_name: location.province_name.clone(),
                district_id: location.district_id,
                district_name: location.district_name.clone(),
                ward_code: location.ward_code.clone(),
                ward_name: location.ward_name.clone(),
            },
            items_price: order.items_price(),
            shipping_fee: order.shipping_fee(),
            total_price: order.total_price(),
            payment_method: order.payment_method(),
            payment_status: order.payment_status(),
            paid_at: order.paid_at(),
            status: order.status(),
            note: order.note().map(str::to_string),
            is_deleted: order.is_deleted(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

pub(crate) async fn load(
    state: &AppState,
    id: Uuid,
    scope: RecordScope,
) -> Result<Order, ApiError> {
    state
        .orders
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))
}

/// Staff see every order; shoppers only the ones they placed
async fn load_visible(state: &AppState, user: &CurrentUser, id: Uuid) -> Result<Order, ApiError> {
    let order = load(state, id, RecordScope::Active).await?;
    if user.is_staff() || order.is_placed_by(user.id()) {
        Ok(order)
    } else {
        Err(ApiError::forbidden("You cannot access this order"))
    }
}

/// Snapshots names and current prices of the requested products
async fn order_items(state: &AppState, requested: &[OrderItemRequest]) -> Result<Vec<OrderItem>, ApiError> {
    let ids: Vec<Uuid> = requested.iter().map(|item| item.product_id).collect();
    let products: HashMap<Uuid, _> = state
        .products
        .find_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    requested
        .iter()
        .map(|item| {
            let product = products.get(&item.product_id).ok_or_else(|| {
                ApiError::bad_request(format!("Product {} is not available", item.product_id))
            })?;
            Ok(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.price,
            })
        })
        .collect()
}

async fn shipping_fee(
    state: &AppState,
    address: &ShippingAddress,
    items: &[OrderItem],
) -> Result<Decimal, ApiError> {
    let Some(provider) = &state.shipping else {
        return Ok(state.config.flat_shipping_fee);
    };

    let units: i64 = items.iter().map(|item| i64::from(item.quantity.max(0))).sum();
    let weight = u32::try_from(units)
        .unwrap_or(u32::MAX)
        .saturating_mul(GRAMS_PER_UNIT);
    let request = FeeRequest {
        to_district_id: address.location.district_id,
        to_ward_code: address.location.ward_code.clone(),
        weight,
        insurance_value: items.iter().map(OrderItem::line_total).sum(),
    };
    Ok(provider.fee(&request).await?)
}

async fn customer_email(state: &AppState, order: &Order) -> Option<String> {
    match state
        .customers
        .find_by_id(order.customer_id(), RecordScope::Any)
        .await
    {
        Ok(customer) => customer.and_then(|c| c.email).map(String::from),
        Err(e) => {
            tracing::warn!(order_id = %order.id(), error = %e, "Failed to look up customer email");
            None
        }
    }
}

async fn notify_status(state: &AppState, order: &Order) {
    if let Some(to) = customer_email(state, order).await {
        notify(state, order_status_email(&to, order)).await;
    }
}

async fn list_scoped(
    state: &AppState,
    filter: &OrderFilter,
    scope: RecordScope,
    page: &PageRequest,
) -> Result<Page<OrderResponse>, ApiError> {
    let (items, total) = state.orders.list(filter, scope, page).await?;
    Ok(Page::new(items, total, page).map(OrderResponse::from))
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    AppJson(req): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, AppJson<OrderResponse>), ApiError> {
    let phone = PhoneNumber::new(&req.phone)?;
    let email = non_blank(req.email.clone()).map(Email::new).transpose()?;
    let user_id = user.as_ref().map(|u| u.id);

    if req.items.is_empty() {
        return Err(ApiError::bad_request("Order must contain at least one item"));
    }
    let items = order_items(&state, &req.items).await?;

    let shipping_address = match (req.address_id, &req.shipping_address) {
        (_, Some(inline)) => {
            let location = build_location(&state, &inline.location).await?;
            ShippingAddress::new(&inline.recipient_name, PhoneNumber::new(&inline.phone)?, location)?
        }
        (Some(address_id), None) => {
            let address = state
                .addresses
                .find_by_id(address_id, RecordScope::Active)
                .await?
                .ok_or_else(|| ApiError::bad_request("Address not found"))?;
            let is_staff = user.as_ref().is_some_and(|u| u.role.is_staff());
            let usable = state
                .customers
                .find_by_id(address.customer_id, RecordScope::Active)
                .await?
                .is_some_and(|owner| {
                    owner.phone == phone
                        && (is_staff || owner.user_id.is_none() || owner.user_id == user_id)
                });
            if !usable {
                return Err(ApiError::bad_request("Address does not belong to this customer"));
            }
            ShippingAddress::new(&address.recipient_name, address.phone, address.location)?
        }
        (None, None) => return Err(ApiError::bad_request("A shipping address is required")),
    };

    let fee = shipping_fee(&state, &shipping_address, &items).await?;

    let contact = CustomerContact::new(&req.name, phone, email, user_id)?;
    let customer = state.customers.upsert_by_phone(contact).await?;

    let order = Order::place(NewOrder {
        customer_id: customer.id,
        user_id,
        items,
        shipping_address,
        shipping_fee: fee,
        payment_method: req.payment_method,
        note: non_blank(req.note),
    })?;
    state.orders.place(&order).await?;

    tracing::info!(
        order_id = %order.id(),
        customer_id = %customer.id,
        total = %order.total_price(),
        "Order placed"
    );

    if let Some(to) = customer.email.as_ref() {
        notify(&state, order_confirmation_email(to.as_str(), &order)).await;
    }

    Ok((StatusCode::CREATED, AppJson(order.into())))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> Result<AppJson<Page<OrderResponse>>, ApiError> {
    user.require(Role::Staff)?;
    let filter = OrderFilter {
        status: query.status,
        customer_id: query.customer_id,
        user_id: None,
    };
    let page = PageRequest::new(query.page_size, query.page_number);
    list_scoped(&state, &filter, RecordScope::Active, &page).await.map(AppJson)
}

/// GET /api/orders/mine
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<OrderListQuery>,
) -> Result<AppJson<Page<OrderResponse>>, ApiError> {
    let filter = OrderFilter {
        status: query.status,
        customer_id: None,
        user_id: Some(user.id()),
    };
    let page = PageRequest::new(query.page_size, query.page_number);
    list_scoped(&state, &filter, RecordScope::Active, &page).await.map(AppJson)
}

/// GET /api/orders/deleted/list
pub async fn list_deleted_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<OrderResponse>>, ApiError> {
    user.require(Role::Admin)?;
    list_scoped(&state, &OrderFilter::default(), RecordScope::Deleted, &query.page())
        .await
        .map(AppJson)
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<OrderResponse>, ApiError> {
    let order = load_visible(&state, &user, id).await?;
    Ok(AppJson(order.into()))
}

/// PUT /api/orders/{id}/status
pub async fn update_order_status(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<StatusRequest>,
) -> Result<AppJson<OrderResponse>, ApiError> {
    user.require(Role::Staff)?;

    let mut order = load(&state, id, RecordScope::Active).await?;
    order.transition_to(req.status)?;
    if req.status == OrderStatus::Cancelled {
        state.orders.cancel(&order).await?;
    } else {
        state.orders.save(&order).await?;
    }

    tracing::info!(order_id = %id, status = %req.status, "Order status updated");
    notify_status(&state, &order).await;
    Ok(AppJson(order.into()))
}

/// PUT /api/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<OrderResponse>, ApiError> {
    let mut order = load_visible(&state, &user, id).await?;
    order.cancel()?;
    state.orders.cancel(&order).await?;

    tracing::info!(order_id = %id, cancelled_by = %user.id(), "Order cancelled");
    notify_status(&state, &order).await;
    Ok(AppJson(order.into()))
}

/// DELETE /api/orders/{id} (soft)
pub async fn delete_order(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut order = load(&state, id, RecordScope::Active).await?;
    order.soft_delete();
    state.orders.save(&order).await?;

    Ok(message("Order moved to trash"))
}

/// PUT /api/orders/{id}/restore
pub async fn restore_order(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<OrderResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut order = load(&state, id, RecordScope::Deleted).await?;
    order.restore();
    state.orders.save(&order).await?;

    Ok(AppJson(order.into()))
}

/// DELETE /api/orders/{id}/hard
pub async fn hard_delete_order(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    if !state.orders.delete(id).await? {
        return Err(ApiError::not_found("Order not found"));
    }

    tracing::info!(order_id = %id, "Order permanently deleted");
    Ok(message("Order permanently deleted"))
}
