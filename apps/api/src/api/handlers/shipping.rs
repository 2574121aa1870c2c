use std::sync::Arc;

use axum::extract::State;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppQuery};
use crate::infrastructure::shipping::{District, FeeRequest, Province, ShippingProvider, Ward};
use crate::state::AppState;

/// Parcel weight assumed when the client does not send one, in grams
const DEFAULT_WEIGHT_GRAMS: u32 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistrictQuery {
    pub province_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WardQuery {
    pub district_id: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuoteRequest {
    pub to_district_id: i32,
    pub to_ward_code: String,
    pub weight: Option<u32>,
    pub insurance_value: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct FeeQuoteResponse {
    pub fee: Decimal,
}

fn provider(state: &AppState) -> Result<Arc<dyn ShippingProvider>, ApiError> {
    state
        .shipping
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("GHN shipping is not configured"))
}

/// GET /api/shipping/provinces
pub async fn list_provinces(
    State(state): State<AppState>,
) -> Result<AppJson<Vec<Province>>, ApiError> {
    Ok(AppJson(provider(&state)?.provinces().await?))
}

/// GET /api/shipping/districts?provinceId=
pub async fn list_districts(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DistrictQuery>,
) -> Result<AppJson<Vec<District>>, ApiError> {
    Ok(AppJson(provider(&state)?.districts(query.province_id).await?))
}

/// GET /api/shipping/wards?districtId=
pub async fn list_wards(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<WardQuery>,
) -> Result<AppJson<Vec<Ward>>, ApiError> {
    Ok(AppJson(provider(&state)?.wards(query.district_id).await?))
}

/// POST /api/shipping/fee
pub async fn quote_fee(
    State(state): State<AppState>,
    AppJson(req): AppJson<FeeQuoteRequest>,
) -> Result<AppJson<FeeQuoteResponse>, ApiError> {
    let provider = provider(&state)?;
    let request = FeeRequest {
        to_district_id: req.to_district_id,
        to_ward_code: req.to_ward_code,
        weight: req.weight.unwrap_or(DEFAULT_WEIGHT_GRAMS).max(1),
        insurance_value: req.insurance_value.unwrap_or(Decimal::ZERO),
    };
    let fee = provider.fee(&request).await?;
    Ok(AppJson(FeeQuoteResponse { fee }))
}
