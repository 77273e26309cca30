use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{
        CheckoutCartRequest, CreateOrderRequest, OrderList, OrderStats, OrderWithItems,
        StatusCount, UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProductCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_owner_or_admin},
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::coupon_service,
    state::AppState,
};

fn build_order_number() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ORD-{stamp}-{}", &suffix[..8])
}

/// Atomically take `qty` units off the shelf. The filter doubles as the stock
/// check, so concurrent orders cannot oversell.
async fn reserve_stock<C: ConnectionTrait>(conn: &C, product_id: Uuid, qty: i32) -> AppResult<()> {
    let result = Products::update_many()
        .col_expr(ProductCol::Stock, Expr::col(ProductCol::Stock).sub(qty))
        .filter(ProductCol::Id.eq(product_id))
        .filter(ProductCol::IsActive.eq(true))
        .filter(ProductCol::Stock.gte(qty))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::BadRequest(format!(
            "Insufficient stock for product {product_id}"
        )));
    }
    Ok(())
}

async fn restore_stock<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?;

    for item in items {
        Products::update_many()
            .col_expr(
                ProductCol::Stock,
                Expr::col(ProductCol::Stock).add(item.quantity),
            )
            .filter(ProductCol::Id.eq(item.product_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}

/// Direct order from an explicit item list. Stock is reserved per line inside
/// the transaction; any failure rolls the whole order back.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order must contain items".into()));
    }
    for item in &payload.items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest("Quantity must be positive".into()));
        }
    }

    let txn = state.orm.begin().await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(build_order_number()),
        user_id: Set(user.user_id),
        total_amount: Set(payload.total_amount),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        shipping_address: Set(payload.shipping_address),
        notes: Set(payload.notes),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut lines = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = Products::find_by_id(item.product_id)
            .filter(ProductCol::IsActive.eq(true))
            .one(&txn)
            .await?;
        let product = match product {
            Some(p) => p,
            None => return Err(AppError::NotFound),
        };

        reserve_stock(&txn, product.id, item.quantity).await?;

        let line = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(item.quantity),
            price: Set(product.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        lines.push(line);
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "order_number": order.order_number })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = OrderWithItems {
        order: order_from_entity(order),
        items: lines.into_iter().map(order_item_from_entity).collect(),
    };
    Ok(ApiResponse::success("Order created", data, Some(Meta::empty())))
}

/// Cart checkout: price every line at the current product price, apply an
/// optional coupon to the subtotal, then empty the cart. All inside one
/// transaction so stock, coupon usage and the cart stay consistent.
pub async fn checkout_cart(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutCartRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::BadRequest("Cart is empty".into())),
    };

    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .all(&txn)
        .await?;
    if rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let mut subtotal = Decimal::ZERO;
    let mut priced = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        let product = match product {
            Some(p) if p.is_active => p,
            _ => {
                return Err(AppError::BadRequest(
                    "Cart contains a product that is no longer available".into(),
                ));
            }
        };

        reserve_stock(&txn, product.id, item.quantity).await?;
        subtotal += product.price * Decimal::from(item.quantity);
        priced.push((product, item.quantity));
    }

    let mut discount = Decimal::ZERO;
    let mut coupon_id = None;
    if let Some(code) = payload.coupon_code.as_deref() {
        let (coupon, amount) = coupon_service::apply_coupon(&txn, code, subtotal).await?;
        coupon_service::consume_coupon(&txn, coupon.id).await?;
        discount = amount;
        coupon_id = Some(coupon.id);
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        order_number: Set(build_order_number()),
        user_id: Set(user.user_id),
        total_amount: Set(subtotal - discount),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        shipping_address: Set(payload.shipping_address),
        notes: Set(payload.notes),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut lines = Vec::with_capacity(priced.len());
    for (product, quantity) in priced {
        let line = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(quantity),
            price: Set(product.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        lines.push(line);
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "coupon_id": coupon_id,
            "discount": discount,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = OrderWithItems {
        order: order_from_entity(order),
        items: lines.into_iter().map(order_item_from_entity).collect(),
    };
    Ok(ApiResponse::success("Checkout complete", data, Some(Meta::empty())))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_admin(user, order.user_id)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let data = OrderWithItems {
        order: order_from_entity(order),
        items: items.into_iter().map(order_item_from_entity).collect(),
    };
    Ok(ApiResponse::success("Order", data, None))
}

/// Customers see their own orders; admins see everyone's.
pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut finder = Orders::find().order_by_desc(OrderCol::CreatedAt);
    if !user.is_admin() {
        finder = finder.filter(OrderCol::UserId.eq(user.user_id));
    }
    if let Some(status) = query.status.as_deref() {
        if OrderStatus::parse(status).is_none() {
            return Err(AppError::BadRequest("Unknown order status".into()));
        }
        finder = finder.filter(OrderCol::Status.eq(status));
    }

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let next = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest("Unknown order status".into()))?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id).one(&txn).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    let current = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;

    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order from {} to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    if next == OrderStatus::Cancelled {
        restore_stock(&txn, order.id).await?;
    }

    let mut active: OrderActive = order.into();
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Cancellation by the customer (or an admin on their behalf). Reserved stock
/// goes back on the shelf in the same transaction.
pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id).one(&txn).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_admin(user, order.user_id)?;

    let current = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;
    if !current.is_cancellable() {
        return Err(AppError::BadRequest(format!(
            "Order in status {} cannot be cancelled",
            current.as_str()
        )));
    }

    restore_stock(&txn, order.id).await?;

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Dashboard numbers. Revenue counts every non-cancelled order.
pub async fn order_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderStats>> {
    ensure_admin(user)?;

    let total_orders = Orders::find().count(&state.orm).await? as i64;

    let mut by_status = Vec::with_capacity(OrderStatus::ALL.len());
    for status in OrderStatus::ALL {
        let count = Orders::find()
            .filter(OrderCol::Status.eq(status.as_str()))
            .count(&state.orm)
            .await? as i64;
        by_status.push(StatusCount {
            status: status.as_str().to_string(),
            count,
        });
    }

    // SUM over zero matching rows is NULL.
    let total_revenue = Orders::find()
        .select_only()
        .column_as(OrderCol::TotalAmount.sum(), "revenue")
        .filter(OrderCol::Status.ne(OrderStatus::Cancelled.as_str()))
        .into_tuple::<Option<Decimal>>()
        .one(&state.orm)
        .await?
        .flatten()
        .unwrap_or(Decimal::ZERO);

    let data = OrderStats {
        total_orders,
        total_revenue,
        by_status,
    };
    Ok(ApiResponse::success("Order stats", data, Some(Meta::empty())))
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_number: model.order_number,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        shipping_address: model.shipping_address,
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
