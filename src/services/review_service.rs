use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::reviews::{
        CreateReviewRequest, ProductReviews, ReviewList, ReviewStats, UpdateReviewRequest,
    },
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProductCol, Entity as Products},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{OrderStatus, Review},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Average and per-star histogram for a set of ratings. The average is
/// rounded to two decimal places; an empty set yields zero across the board.
pub fn rating_stats(ratings: &[i32]) -> ReviewStats {
    let total = ratings.len() as i64;
    let mut distribution = vec![0i64; 5];
    let mut sum = 0i64;
    for &r in ratings {
        if (1..=5).contains(&r) {
            distribution[(r - 1) as usize] += 1;
        }
        sum += r as i64;
    }

    let average_rating = if total == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(sum) / Decimal::from(total)).round_dp(2)
    };

    ReviewStats {
        average_rating,
        total_reviews: total,
        rating_distribution: distribution,
    }
}

fn check_rating(rating: i32) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::BadRequest("Rating must be between 1 and 5".into()));
    }
    Ok(())
}

async fn has_delivered_purchase(
    state: &AppState,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<bool> {
    let count = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(product_id))
        .inner_join(Orders)
        .filter(OrderCol::UserId.eq(user_id))
        .filter(OrderCol::Status.eq(OrderStatus::Delivered.as_str()))
        .count(&state.orm)
        .await?;
    Ok(count > 0)
}

/// One active review per user per product, and only after the product was
/// actually delivered to them.
pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    check_rating(payload.rating)?;

    let product = Products::find_by_id(payload.product_id)
        .filter(ProductCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    if !has_delivered_purchase(state, user.user_id, payload.product_id).await? {
        return Err(AppError::Forbidden);
    }

    let existing = Reviews::find()
        .filter(ReviewCol::ProductId.eq(payload.product_id))
        .filter(ReviewCol::UserId.eq(user.user_id))
        .filter(ReviewCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(
            "You have already reviewed this product".into(),
        ));
    }

    let review = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(payload.product_id),
        user_id: Set(user.user_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "product_id": review.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review created",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_product_reviews(
    state: &AppState,
    product_id: Uuid,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductReviews>> {
    let product = Products::find_by_id(product_id)
        .filter(ProductCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    let (page, limit, offset) = pagination.normalize();

    let finder = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .filter(ReviewCol::IsActive.eq(true))
        .order_by_desc(ReviewCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items: Vec<Review> = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    // Stats run over every active review, not just the current page.
    let ratings: Vec<i32> = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .filter(ReviewCol::IsActive.eq(true))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();
    let stats = rating_stats(&ratings);

    let meta = Meta::new(page, limit, total);
    let data = ProductReviews { items, stats };
    Ok(ApiResponse::success("Reviews", data, Some(meta)))
}

pub async fn list_my_reviews(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ReviewList>> {
    let (page, limit, offset) = pagination.normalize();

    let finder = Reviews::find()
        .filter(ReviewCol::UserId.eq(user.user_id))
        .filter(ReviewCol::IsActive.eq(true))
        .order_by_desc(ReviewCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(review_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(meta)))
}

pub async fn update_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let existing = Reviews::find_by_id(id)
        .filter(ReviewCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_admin(user, existing.user_id)?;

    if let Some(rating) = payload.rating {
        check_rating(rating)?;
    }

    let mut active: ReviewActive = existing.into();
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    if let Some(comment) = payload.comment {
        active.comment = Set(Some(comment));
    }
    active.updated_at = Set(Utc::now().into());
    let review = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Review updated",
        review_from_entity(review),
        Some(Meta::empty()),
    ))
}

/// Soft delete. Frees the (product, user) slot so the user may review again.
pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = Reviews::find_by_id(id)
        .filter(ReviewCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    let existing = match existing {
        Some(r) => r,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_admin(user, existing.user_id)?;

    let review_id = existing.id;
    let mut active: ReviewActive = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_delete",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review removed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        id: model.id,
        product_id: model.product_id,
        user_id: model.user_id,
        rating: model.rating,
        comment: model.comment,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
