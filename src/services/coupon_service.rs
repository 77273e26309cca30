use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::coupons::{
        CouponList, CouponValidation, CreateCouponRequest, UpdateCouponRequest,
        ValidateCouponRequest,
    },
    entity::coupons::{ActiveModel as CouponActive, Column as CouponCol, Entity as Coupons, Model as CouponModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Coupon, DiscountType},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

const INVALID_COUPON: &str = "Invalid or expired coupon code";

/// Discount for a given order total. Percentage discounts are capped by
/// `max_discount` when set; either kind never exceeds the total itself, so
/// the final amount cannot go negative.
pub fn compute_discount(
    discount_type: DiscountType,
    value: Decimal,
    max_discount: Option<Decimal>,
    total: Decimal,
) -> Decimal {
    let raw = match discount_type {
        DiscountType::Percentage => total * value / Decimal::from(100),
        DiscountType::FixedAmount => value,
    };
    let capped = match (discount_type, max_discount) {
        (DiscountType::Percentage, Some(max)) => raw.min(max),
        _ => raw,
    };
    capped.min(total)
}

/// Look up a coupon that is active, inside its activity window and still has
/// usage remaining, then price the discount against `total`. The not-found
/// message is deliberately generic so callers cannot probe which codes exist.
pub async fn apply_coupon<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    total: Decimal,
) -> AppResult<(CouponModel, Decimal)> {
    let now = Utc::now();
    let coupon = Coupons::find()
        .filter(CouponCol::Code.eq(code))
        .filter(CouponCol::IsActive.eq(true))
        .filter(CouponCol::StartDate.lte(now))
        .filter(CouponCol::EndDate.gte(now))
        .filter(
            Condition::any()
                .add(CouponCol::UsageLimit.is_null())
                .add(Expr::col(CouponCol::UsedCount).lt(Expr::col(CouponCol::UsageLimit))),
        )
        .one(conn)
        .await?;

    let coupon = match coupon {
        Some(c) => c,
        None => return Err(AppError::BadRequest(INVALID_COUPON.into())),
    };

    if let Some(min) = coupon.min_purchase {
        if total < min {
            return Err(AppError::BadRequest(format!(
                "Minimum purchase of {min} required for this coupon"
            )));
        }
    }

    let discount_type = DiscountType::parse(&coupon.discount_type)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt discount type")))?;
    let discount = compute_discount(discount_type, coupon.value, coupon.max_discount, total);

    Ok((coupon, discount))
}

/// Burn one use of the coupon. The usage cap is enforced by the conditional
/// update itself, so two concurrent checkouts cannot both take the last slot.
pub async fn consume_coupon<C: ConnectionTrait>(conn: &C, coupon_id: Uuid) -> AppResult<()> {
    let result = Coupons::update_many()
        .col_expr(CouponCol::UsedCount, Expr::col(CouponCol::UsedCount).add(1))
        .filter(CouponCol::Id.eq(coupon_id))
        .filter(
            Condition::any()
                .add(CouponCol::UsageLimit.is_null())
                .add(Expr::col(CouponCol::UsedCount).lt(Expr::col(CouponCol::UsageLimit))),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::BadRequest(INVALID_COUPON.into()));
    }
    Ok(())
}

pub async fn validate_coupon(
    state: &AppState,
    payload: ValidateCouponRequest,
) -> AppResult<ApiResponse<CouponValidation>> {
    let (coupon, discount) = apply_coupon(&state.orm, &payload.code, payload.total_amount).await?;

    let data = CouponValidation {
        code: coupon.code,
        discount_type: coupon.discount_type,
        discount_amount: discount,
        final_amount: payload.total_amount - discount,
    };
    Ok(ApiResponse::success("Coupon valid", data, Some(Meta::empty())))
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    if DiscountType::parse(&payload.discount_type).is_none() {
        return Err(AppError::BadRequest("Invalid discount type".into()));
    }
    if payload.start_date >= payload.end_date {
        return Err(AppError::BadRequest(
            "start_date must be before end_date".into(),
        ));
    }

    let existing = Coupons::find()
        .filter(CouponCol::Code.eq(payload.code.as_str()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Coupon code already exists".into()));
    }

    let coupon = CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(payload.code),
        description: Set(payload.description),
        discount_type: Set(payload.discount_type),
        value: Set(payload.value),
        min_purchase: Set(payload.min_purchase),
        max_discount: Set(payload.max_discount),
        start_date: Set(payload.start_date.into()),
        end_date: Set(payload.end_date.into()),
        usage_limit: Set(payload.usage_limit),
        used_count: Set(0),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_create",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon created",
        coupon_from_entity(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn update_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;

    let existing = Coupons::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    if let Some(code) = payload.code.as_ref() {
        if *code != existing.code {
            let collision = Coupons::find()
                .filter(CouponCol::Code.eq(code.as_str()))
                .one(&state.orm)
                .await?;
            if collision.is_some() {
                return Err(AppError::Conflict("Coupon code already exists".into()));
            }
        }
    }
    if let Some(discount_type) = payload.discount_type.as_ref() {
        if DiscountType::parse(discount_type).is_none() {
            return Err(AppError::BadRequest("Invalid discount type".into()));
        }
    }

    // Validate the window that would result from the update.
    let start = payload
        .start_date
        .map(Into::into)
        .unwrap_or(existing.start_date);
    let end = payload.end_date.map(Into::into).unwrap_or(existing.end_date);
    if start >= end {
        return Err(AppError::BadRequest(
            "start_date must be before end_date".into(),
        ));
    }

    let mut active: CouponActive = existing.into();
    if let Some(code) = payload.code {
        active.code = Set(code);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(discount_type) = payload.discount_type {
        active.discount_type = Set(discount_type);
    }
    if let Some(value) = payload.value {
        active.value = Set(value);
    }
    if let Some(min_purchase) = payload.min_purchase {
        active.min_purchase = Set(Some(min_purchase));
    }
    if let Some(max_discount) = payload.max_discount {
        active.max_discount = Set(Some(max_discount));
    }
    if let Some(start_date) = payload.start_date {
        active.start_date = Set(start_date.into());
    }
    if let Some(end_date) = payload.end_date {
        active.end_date = Set(end_date.into());
    }
    if let Some(usage_limit) = payload.usage_limit {
        active.usage_limit = Set(Some(usage_limit));
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }

    let coupon = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_update",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": coupon.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon updated",
        coupon_from_entity(coupon),
        Some(Meta::empty()),
    ))
}

/// Soft delete: past orders keep their association with the code.
pub async fn remove_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let existing = Coupons::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let mut active: CouponActive = existing.into();
    active.is_active = Set(false);
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "coupon_remove",
        Some("coupons"),
        Some(serde_json::json!({ "coupon_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Coupon deactivated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Coupons::find().order_by_desc(CouponCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(coupon_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Coupons", CouponList { items }, Some(meta)))
}

pub async fn get_coupon_by_code(state: &AppState, code: &str) -> AppResult<ApiResponse<Coupon>> {
    let coupon = Coupons::find()
        .filter(CouponCol::Code.eq(code))
        .filter(CouponCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;

    let coupon = match coupon {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::success(
        "Coupon",
        coupon_from_entity(coupon),
        Some(Meta::empty()),
    ))
}

fn coupon_from_entity(model: CouponModel) -> Coupon {
    Coupon {
        id: model.id,
        code: model.code,
        description: model.description,
        discount_type: model.discount_type,
        value: model.value,
        min_purchase: model.min_purchase,
        max_discount: model.max_discount,
        start_date: model.start_date.with_timezone(&chrono::Utc),
        end_date: model.end_date.with_timezone(&chrono::Utc),
        usage_limit: model.usage_limit,
        used_count: model.used_count,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&chrono::Utc),
    }
}
