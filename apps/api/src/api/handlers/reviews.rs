use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{message, MessageResponse, PageQuery};
use super::products;
use crate::api::errors::ApiError;
use crate::api::extract::{AppJson, AppPath, AppQuery};
use crate::api::middleware::auth::CurrentUser;
use crate::domain::catalog::RatingSummary;
use crate::domain::pagination::{Page, PageRequest, RecordScope};
use crate::domain::repositories::ReviewFilter;
use crate::domain::review::Review;
use crate::domain::user::Role;
use crate::state::AppState;

const DUPLICATE_REVIEW: &str = "You have already reviewed this product";

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListQuery {
    pub page_size: Option<u32>,
    pub page_number: Option<u32>,
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i16,
    pub comment: Option<String>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            user_id: r.user_id,
            user_name: r.user_name,
            rating: r.rating,
            comment: r.comment,
            is_deleted: r.is_deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

async fn load(state: &AppState, id: Uuid, scope: RecordScope) -> Result<Review, ApiError> {
    state
        .reviews
        .find_by_id(id, scope)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))
}

/// Recomputes `rating` and `numReviews` of a product from its live reviews
async fn refresh_rating(state: &AppState, product_id: Uuid) -> Result<(), ApiError> {
    let ratings = state.reviews.live_ratings(product_id).await?;
    state
        .products
        .set_rating(product_id, RatingSummary::from_ratings(&ratings))
        .await?;
    Ok(())
}

async fn list_scoped(
    state: &AppState,
    filter: &ReviewFilter,
    scope: RecordScope,
    page: &PageRequest,
) -> Result<Page<ReviewResponse>, ApiError> {
    let (items, total) = state.reviews.list(filter, scope, page).await?;
    Ok(Page::new(items, total, page).map(ReviewResponse::from))
}

/// GET /api/products/{id}/reviews
pub async fn list_product_reviews(
    State(state): State<AppState>,
    AppPath(product_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<ReviewResponse>>, ApiError> {
    products::load(&state, product_id, RecordScope::Active).await?;
    let filter = ReviewFilter {
        product_id: Some(product_id),
        user_id: None,
    };
    list_scoped(&state, &filter, RecordScope::Active, &query.page())
        .await
        .map(AppJson)
}

/// POST /api/products/{id}/reviews
pub async fn create_review(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(product_id): AppPath<Uuid>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<(StatusCode, AppJson<ReviewResponse>), ApiError> {
    products::load(&state, product_id, RecordScope::Active).await?;

    let review = Review::new(
        product_id,
        user.id(),
        &user.0.name,
        req.rating,
        req.comment.as_deref(),
    )?;
    state
        .reviews
        .save(&review)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_REVIEW))?;
    refresh_rating(&state, product_id).await?;

    tracing::info!(review_id = %review.id, product_id = %product_id, "Review created");
    Ok((StatusCode::CREATED, AppJson(review.into())))
}

/// GET /api/reviews (admin)
pub async fn list_reviews(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<ReviewListQuery>,
) -> Result<AppJson<Page<ReviewResponse>>, ApiError> {
    user.require(Role::Admin)?;
    let filter = ReviewFilter {
        product_id: query.product_id,
        user_id: query.user_id,
    };
    let page = PageRequest::new(query.page_size, query.page_number);
    list_scoped(&state, &filter, RecordScope::Active, &page).await.map(AppJson)
}

/// GET /api/reviews/deleted/list
pub async fn list_deleted_reviews(
    State(state): State<AppState>,
    user: CurrentUser,
    AppQuery(query): AppQuery<PageQuery>,
) -> Result<AppJson<Page<ReviewResponse>>, ApiError> {
    user.require(Role::Admin)?;
    list_scoped(&state, &ReviewFilter::default(), RecordScope::Deleted, &query.page())
        .await
        .map(AppJson)
}

/// PUT /api/reviews/{id}
pub async fn update_review(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<AppJson<ReviewResponse>, ApiError> {
    let mut review = load(&state, id, RecordScope::Active).await?;
    if review.user_id != user.id() {
        return Err(ApiError::forbidden("Only the author can edit a review"));
    }

    review.edit(req.rating, req.comment.as_deref())?;
    state.reviews.save(&review).await?;
    refresh_rating(&state, review.product_id).await?;

    Ok(AppJson(review.into()))
}

/// DELETE /api/reviews/{id} (soft)
pub async fn delete_review(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    let mut review = load(&state, id, RecordScope::Active).await?;
    if review.user_id != user.id() {
        user.require(Role::Admin)?;
    }

    review.soft_delete();
    state.reviews.save(&review).await?;
    refresh_rating(&state, review.product_id).await?;

    Ok(message("Review deleted"))
}

/// PUT /api/reviews/{id}/restore
pub async fn restore_review(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<ReviewResponse>, ApiError> {
    user.require(Role::Admin)?;

    let mut review = load(&state, id, RecordScope::Deleted).await?;
    review.restore();
    state
        .reviews
        .save(&review)
        .await
        .map_err(|e| ApiError::duplicate_as(e, DUPLICATE_REVIEW))?;
    refresh_rating(&state, review.product_id).await?;

    Ok(AppJson(review.into()))
}

/// DELETE /api/reviews/{id}/hard
pub async fn hard_delete_review(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<AppJson<MessageResponse>, ApiError> {
    user.require(Role::Admin)?;

    let review = load(&state, id, RecordScope::Any).await?;
    if !state.reviews.delete(id).await? {
        return Err(ApiError::not_found("Review not found"));
    }
    refresh_rating(&state, review.product_id).await?;

    Ok(message("Review permanently deleted"))
}
