use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::orders;
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppQuery};
use crate::api::middleware::auth::MaybeUser;
use crate::api::middleware::rate_limit::ClientIp;
use crate::domain::errors::RepositoryError;
use crate::domain::order::{Order, PaymentStatus};
use crate::domain::pagination::RecordScope;
use crate::infrastructure::payments::{PaymentError, VnpayCallback, VnpayGateway};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentResponse {
    pub payment_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReturnResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub response_code: String,
}

/// Acknowledgement VNPAY expects from the IPN endpoint
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct IpnResponse {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnResponse {
    const fn new(rsp_code: &'static str, message: &'static str) -> Self {
        Self { rsp_code, message }
    }

    pub const CONFIRMED: Self = Self::new("00", "Confirm Success");
    pub const ORDER_NOT_FOUND: Self = Self::new("01", "Order not found");
    pub const ALREADY_CONFIRMED: Self = Self::new("02", "Order already confirmed");
    pub const INVALID_AMOUNT: Self = Self::new("04", "Invalid amount");
    pub const INVALID_SIGNATURE: Self = Self::new("97", "Invalid signature");
    pub const UNKNOWN_ERROR: Self = Self::new("99", "Unknown error");
}

fn gateway(state: &AppState) -> Result<Arc<VnpayGateway>, ApiError> {
    state
        .vnpay
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("VNPAY payments are not configured"))
}

/// POST /api/payments/vnpay/create
pub async fn create_vnpay_payment(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ClientIp(ip): ClientIp,
    AppJson(req): AppJson<CreatePaymentRequest>,
) -> Result<AppJson<CreatePaymentResponse>, ApiError> {
    let gateway = gateway(&state)?;
    let order = orders::load(&state, req.order_id, RecordScope::Active).await?;

    // guest orders can be paid by whoever holds the id
    if let Some(owner) = order.user_id() {
        let allowed = user
            .as_ref()
            .is_some_and(|u| u.id == owner || u.role.is_staff());
        if !allowed {
            return Err(ApiError::forbidden("You cannot pay for this order"));
        }
    }

    if !order.awaits_online_payment() {
        return Err(ApiError::bad_request(
            "Order is not awaiting a VNPAY payment",
        ));
    }

    let payment_url =
        gateway.payment_url(order.id(), order.total_price(), &ip.to_string(), Utc::now())?;

    tracing::info!(order_id = %order.id(), amount = %order.total_price(), "VNPAY payment started");
    Ok(AppJson(CreatePaymentResponse { payment_url }))
}

/// GET /api/payments/vnpay/return
///
/// Where the shopper's browser lands after paying. Only reports the
/// outcome; the order itself is updated by the IPN call.
pub async fn vnpay_return(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<BTreeMap<String, String>>,
) -> Result<AppJson<PaymentReturnResponse>, ApiError> {
    let callback = gateway(&state)?.verify(&params)?;

    Ok(AppJson(PaymentReturnResponse {
        success: callback.is_success(),
        order_id: callback.order_id,
        response_code: callback.response_code,
    }))
}

/// GET /api/payments/vnpay/ipn
///
/// Server-to-server notification. Always answers 200 with a VNPAY
/// acknowledgement code.
pub async fn vnpay_ipn(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<BTreeMap<String, String>>,
) -> AppJson<IpnResponse> {
    let Some(gateway) = state.vnpay.clone() else {
        return AppJson(IpnResponse::UNKNOWN_ERROR);
    };

    let callback = match gateway.verify(&params) {
        Ok(callback) => callback,
        Err(PaymentError::InvalidSignature) => {
            tracing::warn!("VNPAY IPN with invalid signature");
            return AppJson(IpnResponse::INVALID_SIGNATURE);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Malformed VNPAY IPN");
            return AppJson(IpnResponse::UNKNOWN_ERROR);
        }
    };

    match apply_ipn(&state, &callback).await {
        Ok(response) => AppJson(response),
        Err(e) => {
            tracing::error!(order_id = %callback.order_id, error = %e.message, "Failed to apply VNPAY IPN");
            AppJson(IpnResponse::UNKNOWN_ERROR)
        }
    }
}

/// Attempts made when the order changes between reading and writing it
const IPN_ATTEMPTS: usize = 3;

async fn apply_ipn(state: &AppState, callback: &VnpayCallback) -> Result<IpnResponse, ApiError> {
    let mut attempt = 1;
    loop {
        match apply_ipn_once(state, callback).await {
            Err(RepositoryError::Stale(order_id)) if attempt < IPN_ATTEMPTS => {
                tracing::debug!(order_id = %order_id, attempt, "Order changed during IPN, retrying");
                attempt += 1;
            }
            result => return result.map_err(ApiError::from),
        }
    }
}

async fn apply_ipn_once(
    state: &AppState,
    callback: &VnpayCallback,
) -> Result<IpnResponse, RepositoryError> {
    let Some(mut order) = state
        .orders
        .find_by_id(callback.order_id, RecordScope::Active)
        .await?
    else {
        return Ok(IpnResponse::ORDER_NOT_FOUND);
    };

    if callback.amount != order.total_price() {
        return Ok(IpnResponse::INVALID_AMOUNT);
    }

    if is_settled(&order) {
        return Ok(IpnResponse::ALREADY_CONFIRMED);
    }

    if callback.is_success() {
        if order.mark_paid(Utc::now()).is_err() {
            return Ok(IpnResponse::ALREADY_CONFIRMED);
        }
    } else {
        order.mark_payment_failed();
    }
    state.orders.save(&order).await?;

    tracing::info!(
        order_id = %order.id(),
        response_code = %callback.response_code,
        transaction_no = callback.transaction_no.as_deref().unwrap_or(""),
        payment_status = ?order.payment_status(),
        "VNPAY IPN applied"
    );
    Ok(IpnResponse::CONFIRMED)
}

/// Paid or refunded orders no longer accept gateway updates
fn is_settled(order: &Order) -> bool {
    matches!(
        order.payment_status(),
        PaymentStatus::Paid | PaymentStatus::Refunded
    )
}
