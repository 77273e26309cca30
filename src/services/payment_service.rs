use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{CreateInvoiceRequest, CreateVirtualAccountRequest, PaymentCharge, WebhookPayload},
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        payments::{
            ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
        users::{Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_owner_or_admin},
    models::{OrderStatus, Payment, PaymentStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const METHOD_INVOICE: &str = "invoice";
pub const METHOD_VIRTUAL_ACCOUNT: &str = "virtual_account";

async fn load_payable_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<(crate::entity::orders::Model, String)> {
    let order = Orders::find_by_id(order_id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_admin(user, order.user_id)?;

    let status = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;
    if status != OrderStatus::Pending {
        return Err(AppError::BadRequest(format!(
            "Order in status {} cannot be paid",
            status.as_str()
        )));
    }

    // One live charge per order at a time.
    let open = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .filter(
            Condition::any()
                .add(PaymentCol::Status.eq(PaymentStatus::Pending.as_str()))
                .add(PaymentCol::Status.eq(PaymentStatus::Paid.as_str())),
        )
        .one(&state.orm)
        .await?;
    if open.is_some() {
        return Err(AppError::Conflict(
            "Payment already initiated for this order".into(),
        ));
    }

    let account = Users::find_by_id(order.user_id)
        .filter(UserCol::IsActive.eq(true))
        .one(&state.orm)
        .await?;
    let account = match account {
        Some(a) => a,
        None => return Err(AppError::NotFound),
    };

    Ok((order, account.email))
}

pub async fn create_invoice(
    state: &AppState,
    user: &AuthUser,
    payload: CreateInvoiceRequest,
) -> AppResult<ApiResponse<PaymentCharge>> {
    let (order, email) = load_payable_order(state, user, payload.order_id).await?;

    let charge = state
        .gateway
        .create_invoice(&order.order_number, order.total_amount, &email, &email)
        .await
        .map_err(AppError::Internal)?;

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        user_id: Set(order.user_id),
        amount: Set(order.total_amount),
        method: Set(METHOD_INVOICE.to_string()),
        status: Set(PaymentStatus::Pending.as_str().to_string()),
        external_id: Set(charge.external_id),
        paid_at: Set(None),
        metadata: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_invoice_create",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id, "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = PaymentCharge {
        payment: payment_from_entity(payment),
        payment_url: charge.payment_url,
        account_number: charge.account_number,
    };
    Ok(ApiResponse::success("Invoice created", data, Some(Meta::empty())))
}

pub async fn create_virtual_account(
    state: &AppState,
    user: &AuthUser,
    payload: CreateVirtualAccountRequest,
) -> AppResult<ApiResponse<PaymentCharge>> {
    let (order, email) = load_payable_order(state, user, payload.order_id).await?;

    let charge = state
        .gateway
        .create_virtual_account(
            &order.order_number,
            order.total_amount,
            &payload.bank_code,
            &email,
        )
        .await
        .map_err(AppError::Internal)?;

    let payment = PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        user_id: Set(order.user_id),
        amount: Set(order.total_amount),
        method: Set(METHOD_VIRTUAL_ACCOUNT.to_string()),
        status: Set(PaymentStatus::Pending.as_str().to_string()),
        external_id: Set(charge.external_id),
        paid_at: Set(None),
        metadata: Set(Some(serde_json::json!({ "bank_code": payload.bank_code }))),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "payment_va_create",
        Some("payments"),
        Some(serde_json::json!({ "payment_id": payment.id, "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let data = PaymentCharge {
        payment: payment_from_entity(payment),
        payment_url: charge.payment_url,
        account_number: charge.account_number,
    };
    Ok(ApiResponse::success(
        "Virtual account created",
        data,
        Some(Meta::empty()),
    ))
}

/// Provider callback. Replays are tolerated: a payment that is already in the
/// reported state is acknowledged without touching the order again.
pub async fn handle_webhook(
    state: &AppState,
    payload: WebhookPayload,
) -> AppResult<ApiResponse<Payment>> {
    let next = PaymentStatus::from_gateway(&payload.status);

    let txn = state.orm.begin().await?;

    let payment = Payments::find()
        .filter(PaymentCol::ExternalId.eq(payload.external_id.as_str()))
        .one(&txn)
        .await?;
    let payment = match payment {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if payment.status == next.as_str() {
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "Already processed",
            payment_from_entity(payment),
            Some(Meta::empty()),
        ));
    }
    if payment.status == PaymentStatus::Paid.as_str() {
        // A settled charge never moves backwards.
        txn.commit().await?;
        return Ok(ApiResponse::success(
            "Already processed",
            payment_from_entity(payment),
            Some(Meta::empty()),
        ));
    }

    let order_id = payment.order_id;
    let mut active: PaymentActive = payment.into();
    active.status = Set(next.as_str().to_string());
    if next == PaymentStatus::Paid {
        active.paid_at = Set(Some(Utc::now().into()));
    }
    if !payload.extra.is_empty() {
        active.metadata = Set(Some(serde_json::Value::Object(payload.extra.clone())));
    }
    active.updated_at = Set(Utc::now().into());
    let payment = active.update(&txn).await?;

    if next == PaymentStatus::Paid {
        let order = Orders::find_by_id(order_id).one(&txn).await?;
        if let Some(order) = order {
            if order.status == OrderStatus::Pending.as_str() {
                let mut active: OrderActive = order.into();
                active.status = Set(OrderStatus::Processing.as_str().to_string());
                active.updated_at = Set(Utc::now().into());
                active.update(&txn).await?;
            }
        }
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        None,
        "payment_webhook",
        Some("payments"),
        Some(serde_json::json!({
            "external_id": payload.external_id,
            "status": next.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Webhook processed",
        payment_from_entity(payment),
        Some(Meta::empty()),
    ))
}

pub async fn list_order_payments(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<Vec<Payment>>> {
    let order = Orders::find_by_id(order_id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };
    ensure_owner_or_admin(user, order.user_id)?;

    let items = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .order_by_desc(PaymentCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    Ok(ApiResponse::success("Payments", items, Some(Meta::empty())))
}

pub fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        user_id: model.user_id,
        amount: model.amount,
        method: model.method,
        status: model.status,
        external_id: model.external_id,
        paid_at: model.paid_at.map(|t| t.with_timezone(&Utc)),
        metadata: model.metadata,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
