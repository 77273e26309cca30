use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::ShippingAddress,
    response::{ApiResponse, Meta},
};

/// Invariant maintained by every write here: whenever a user has any
/// addresses, exactly one of them is primary. All clear-then-set sequences
/// run inside a single transaction.
pub async fn create_address(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<ShippingAddress>> {
    let mut tx = pool.begin().await?;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shipping_addresses WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;

    // The first address is always primary.
    let is_primary = payload.is_primary.unwrap_or(false) || count.0 == 0;

    if is_primary {
        sqlx::query("UPDATE shipping_addresses SET is_primary = FALSE WHERE user_id = $1")
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
    }

    let address: ShippingAddress = sqlx::query_as(
        r#"
        INSERT INTO shipping_addresses
            (id, user_id, label, recipient, phone, street, city, province, postal_code, is_primary)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(&payload.label)
    .bind(&payload.recipient)
    .bind(&payload.phone)
    .bind(&payload.street)
    .bind(&payload.city)
    .bind(&payload.province)
    .bind(&payload.postal_code)
    .bind(is_primary)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_create",
        Some("shipping_addresses"),
        Some(serde_json::json!({ "address_id": address.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Address created",
        address,
        Some(Meta::empty()),
    ))
}

pub async fn list_addresses(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items = sqlx::query_as::<_, ShippingAddress>(
        "SELECT * FROM shipping_addresses WHERE user_id = $1 ORDER BY is_primary DESC, created_at DESC",
    )
    .bind(user.user_id)
    .fetch_all(pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        AddressList { items },
        Some(Meta::empty()),
    ))
}

/// Primary row when one is marked, otherwise the most recently created.
pub async fn get_primary_address(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<ShippingAddress>> {
    let primary: Option<ShippingAddress> = sqlx::query_as(
        "SELECT * FROM shipping_addresses WHERE user_id = $1 AND is_primary = TRUE",
    )
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    let address = match primary {
        Some(a) => a,
        None => sqlx::query_as(
            "SELECT * FROM shipping_addresses WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?,
    };

    Ok(ApiResponse::success("OK", address, Some(Meta::empty())))
}

pub async fn update_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<ShippingAddress>> {
    let existing: Option<ShippingAddress> =
        sqlx::query_as("SELECT * FROM shipping_addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.user_id)
            .fetch_optional(pool)
            .await?;
    let existing = match existing {
        Some(a) => a,
        None => return Err(AppError::NotFound),
    };

    let address: ShippingAddress = sqlx::query_as(
        r#"
        UPDATE shipping_addresses
        SET label = $2, recipient = $3, phone = $4, street = $5,
            city = $6, province = $7, postal_code = $8
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.label.unwrap_or(existing.label))
    .bind(payload.recipient.unwrap_or(existing.recipient))
    .bind(payload.phone.unwrap_or(existing.phone))
    .bind(payload.street.unwrap_or(existing.street))
    .bind(payload.city.unwrap_or(existing.city))
    .bind(payload.province.unwrap_or(existing.province))
    .bind(payload.postal_code.unwrap_or(existing.postal_code))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(
        "Address updated",
        address,
        Some(Meta::empty()),
    ))
}

pub async fn set_primary_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ShippingAddress>> {
    let mut tx = pool.begin().await?;

    let exists: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM shipping_addresses WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    if exists.is_none() {
        return Err(AppError::NotFound);
    }

    sqlx::query("UPDATE shipping_addresses SET is_primary = FALSE WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;

    let address: ShippingAddress = sqlx::query_as(
        "UPDATE shipping_addresses SET is_primary = TRUE WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_set_primary",
        Some("shipping_addresses"),
        Some(serde_json::json!({ "address_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Primary address set",
        address,
        Some(Meta::empty()),
    ))
}

pub async fn remove_address(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let mut tx = pool.begin().await?;

    let target: Option<(bool,)> = sqlx::query_as(
        "SELECT is_primary FROM shipping_addresses WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (was_primary,) = match target {
        Some(t) => t,
        None => return Err(AppError::NotFound),
    };

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shipping_addresses WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&mut *tx)
        .await?;
    if count.0 <= 1 {
        return Err(AppError::BadRequest(
            "Cannot remove the only shipping address".into(),
        ));
    }

    sqlx::query("DELETE FROM shipping_addresses WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if was_primary {
        // Promote the most recent remaining address.
        sqlx::query(
            r#"
            UPDATE shipping_addresses SET is_primary = TRUE
            WHERE id = (
                SELECT id FROM shipping_addresses
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT 1
            )
            "#,
        )
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(user.user_id),
        "address_remove",
        Some("shipping_addresses"),
        Some(serde_json::json!({ "address_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Address removed",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
