use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::admin::{AdjustStockRequest, LowStockList, UserList},
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{Column as ProductCol, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{OrderStatus, Product, User},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, Pagination},
    services::product_service::product_from_entity,
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

/// Soft delete of an account. Refused while the user still has orders in
/// flight, so fulfilment is never left without an owner.
pub async fn deactivate_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    if id == user.user_id {
        return Err(AppError::BadRequest(
            "Cannot deactivate your own account".into(),
        ));
    }

    let target = Users::find_by_id(id).one(&state.orm).await?;
    let target = match target {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let open_orders = Orders::find()
        .filter(OrderCol::UserId.eq(id))
        .filter(
            Condition::all()
                .add(OrderCol::Status.ne(OrderStatus::Delivered.as_str()))
                .add(OrderCol::Status.ne(OrderStatus::Cancelled.as_str())),
        )
        .count(&state.orm)
        .await?;
    if open_orders > 0 {
        return Err(AppError::BadRequest(
            "User has orders in progress and cannot be deactivated".into(),
        ));
    }

    let mut active: UserActive = target.into();
    active.is_active = Set(false);
    let target = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "user_deactivate",
        Some("users"),
        Some(serde_json::json!({ "target_user_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User deactivated",
        user_from_entity(target),
        Some(Meta::empty()),
    ))
}

pub async fn low_stock_products(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<LowStockList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProductCol::IsActive.eq(true))
        .filter(ProductCol::Stock.lte(threshold))
        .order_by_asc(ProductCol::Stock);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Low stock products",
        LowStockList { items },
        Some(meta),
    ))
}

/// Manual stock correction. The conditional update keeps the count from ever
/// dipping below zero under concurrent adjustments.
pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: AdjustStockRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must be non-zero".into()));
    }

    let mut update = Products::update_many()
        .col_expr(
            ProductCol::Stock,
            Expr::col(ProductCol::Stock).add(payload.delta),
        )
        .col_expr(ProductCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(ProductCol::Id.eq(id));
    if payload.delta < 0 {
        update = update.filter(ProductCol::Stock.gte(-payload.delta));
    }
    let result = update.exec(&state.orm).await?;

    if result.rows_affected == 0 {
        let exists = Products::find_by_id(id).one(&state.orm).await?;
        return match exists {
            Some(_) => Err(AppError::BadRequest(
                "Adjustment would make stock negative".into(),
            )),
            None => Err(AppError::NotFound),
        };
    }

    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "stock_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": id, "delta": payload.delta })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Stock adjusted",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        password_hash: model.password_hash,
        role: model.role,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
