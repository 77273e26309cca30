use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use mobilku_api::{
    db::{DbPool, create_orm_conn, create_pool},
    dto::{
        addresses::{CreateAddressRequest, UpdateAddressRequest},
        cart::{AddToCartRequest, UpdateCartItemRequest},
        coupons::ValidateCouponRequest,
        orders::{CheckoutCartRequest, CreateOrderRequest, OrderItemRequest, UpdateOrderStatusRequest},
        payments::{CreateInvoiceRequest, WebhookPayload},
        reviews::CreateReviewRequest,
    },
    error::AppError,
    gateway::MockGateway,
    middleware::auth::AuthUser,
    models::{ROLE_ADMIN, ROLE_CUSTOMER},
    services::{
        address_service, cart_service, coupon_service, order_service, payment_service,
        review_service,
    },
    state::AppState,
};

// Full storefront pass: cart -> coupon checkout -> invoice -> webhook ->
// fulfilment -> review, plus cancellation restoring stock.
#[tokio::test]
async fn checkout_payment_and_review_flow() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let customer = create_user(&state.pool, "buyer@example.com", ROLE_CUSTOMER).await?;
    let admin = create_user(&state.pool, "admin@example.com", ROLE_ADMIN).await?;
    let product_id = create_product(&state.pool, "city-hatchback", dec!(300000000), 5).await?;
    create_coupon(&state.pool, "CARDEAL10", dec!(10), dec!(5000000), None).await?;

    // A single add beyond the available stock is refused outright.
    let over_stock = cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id,
            quantity: 6,
        },
    )
    .await;
    assert!(matches!(over_stock, Err(AppError::BadRequest(_))));

    // Stock is 5. Each add checks the requested quantity against stock in
    // isolation, so two adds of 3 both pass even though the line totals 6.
    let first = cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state.pool,
        &customer,
        AddToCartRequest {
            product_id,
            quantity: 3,
        },
    )
    .await?;

    let item = first.data.expect("cart item");
    let summary = cart_service::cart_summary(&state.pool, &customer).await?;
    assert_eq!(summary.data.as_ref().unwrap().total_items, 6);

    // Trim the line back down so checkout fits the stock.
    cart_service::update_cart_item(
        &state.pool,
        &customer,
        item.id,
        UpdateCartItemRequest { quantity: 2 },
    )
    .await?;

    // A coupon whose minimum purchase exceeds the cart total is priced out.
    create_coupon(
        &state.pool,
        "FLEET25",
        dec!(25),
        dec!(50000000),
        Some(dec!(1000000000)),
    )
    .await?;
    let below_minimum = coupon_service::validate_coupon(
        &state,
        ValidateCouponRequest {
            code: "FLEET25".into(),
            total_amount: dec!(600000000),
        },
    )
    .await;
    match below_minimum {
        Err(AppError::BadRequest(message)) => {
            assert!(message.starts_with("Minimum purchase"), "{message}");
        }
        other => panic!("expected a minimum purchase rejection, got {other:?}"),
    }

    let checkout = order_service::checkout_cart(
        &state,
        &customer,
        CheckoutCartRequest {
            shipping_address: "Jl. Sudirman 1, Jakarta".into(),
            notes: None,
            coupon_code: Some("CARDEAL10".into()),
        },
    )
    .await?;
    let order = checkout.data.expect("order").order;

    // 2 x 300,000,000 minus the 10% discount capped at 5,000,000.
    assert_eq!(order.total_amount, dec!(595000000));
    assert_eq!(order.status, "pending");
    assert_eq!(product_stock(&state.pool, product_id).await?, 3);

    // Cart is emptied by checkout.
    let summary = cart_service::cart_summary(&state.pool, &customer).await?;
    assert_eq!(summary.data.as_ref().unwrap().total_items, 0);

    // Charge the order and confirm it via the provider callback.
    let charge = payment_service::create_invoice(
        &state,
        &customer,
        CreateInvoiceRequest { order_id: order.id },
    )
    .await?;
    let charge = charge.data.expect("charge");
    assert!(charge.payment_url.is_some());

    let external_id = charge.payment.external_id.clone();
    let confirmed = payment_service::handle_webhook(
        &state,
        WebhookPayload {
            external_id: external_id.clone(),
            status: "paid".into(),
            extra: serde_json::Map::new(),
        },
    )
    .await?;
    assert_eq!(confirmed.data.as_ref().unwrap().status, "paid");

    let after_payment = order_service::get_order(&state, &customer, order.id).await?;
    assert_eq!(after_payment.data.as_ref().unwrap().order.status, "processing");

    // Replays are acknowledged without another transition.
    let replay = payment_service::handle_webhook(
        &state,
        WebhookPayload {
            external_id,
            status: "paid".into(),
            extra: serde_json::Map::new(),
        },
    )
    .await?;
    assert_eq!(replay.message, "Already processed");

    // Fulfil the order so the customer may review.
    order_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await?;
    order_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "delivered".into(),
        },
    )
    .await?;

    let review = review_service::create_review(
        &state,
        &customer,
        CreateReviewRequest {
            product_id,
            rating: 5,
            comment: Some("Great car, smooth handover".into()),
        },
    )
    .await?;
    assert_eq!(review.data.as_ref().unwrap().rating, 5);

    // Second active review for the same pair is refused.
    let duplicate = review_service::create_review(
        &state,
        &customer,
        CreateReviewRequest {
            product_id,
            rating: 4,
            comment: None,
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::BadRequest(_))));

    // The admin never bought the car.
    let unpurchased = review_service::create_review(
        &state,
        &admin,
        CreateReviewRequest {
            product_id,
            rating: 1,
            comment: None,
        },
    )
    .await;
    assert!(matches!(unpurchased, Err(AppError::Forbidden)));

    Ok(())
}

#[tokio::test]
async fn cancelling_an_order_restores_stock() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let customer = create_user(&state.pool, "canceller@example.com", ROLE_CUSTOMER).await?;
    let product_id = create_product(&state.pool, "family-mpv", dec!(255000000), 4).await?;

    let created = order_service::create_order(
        &state,
        &customer,
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id,
                quantity: 3,
            }],
            total_amount: dec!(765000000),
            shipping_address: "Jl. Gatot Subroto 12, Bandung".into(),
            notes: None,
        },
    )
    .await?;
    let order = created.data.expect("order").order;
    assert_eq!(product_stock(&state.pool, product_id).await?, 1);

    // A fourth unit is still orderable, a fifth is not.
    let too_many = order_service::create_order(
        &state,
        &customer,
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id,
                quantity: 2,
            }],
            total_amount: dec!(510000000),
            shipping_address: "Jl. Gatot Subroto 12, Bandung".into(),
            notes: None,
        },
    )
    .await;
    assert!(matches!(too_many, Err(AppError::BadRequest(_))));

    let cancelled = order_service::cancel_order(&state, &customer, order.id).await?;
    assert_eq!(cancelled.data.as_ref().unwrap().status, "cancelled");
    assert_eq!(product_stock(&state.pool, product_id).await?, 4);

    // Terminal: cancelling again is rejected.
    let again = order_service::cancel_order(&state, &customer, order.id).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn address_book_keeps_exactly_one_primary() -> anyhow::Result<()> {
    let state = match setup_state().await? {
        Some(state) => state,
        None => return Ok(()),
    };

    let customer = create_user(&state.pool, "mover@example.com", ROLE_CUSTOMER).await?;

    // First address becomes primary even without asking.
    let home = address_service::create_address(
        &state.pool,
        &customer,
        address_payload("Home", None),
    )
    .await?
    .data
    .expect("address");
    assert!(home.is_primary);

    // Requesting primary moves the flag.
    let office = address_service::create_address(
        &state.pool,
        &customer,
        address_payload("Office", Some(true)),
    )
    .await?
    .data
    .expect("address");
    assert!(office.is_primary);

    let list = address_service::list_addresses(&state.pool, &customer).await?;
    let items = list.data.expect("addresses").items;
    assert_eq!(items.len(), 2);
    assert_eq!(items.iter().filter(|a| a.is_primary).count(), 1);

    // Field updates do not disturb the flag.
    address_service::update_address(
        &state.pool,
        &customer,
        home.id,
        UpdateAddressRequest {
            label: Some("Parents".into()),
            recipient: None,
            phone: None,
            street: None,
            city: None,
            province: None,
            postal_code: None,
        },
    )
    .await?;

    // Deleting the primary promotes the survivor.
    address_service::remove_address(&state.pool, &customer, office.id).await?;
    let primary = address_service::get_primary_address(&state.pool, &customer).await?;
    assert_eq!(primary.data.expect("primary").id, home.id);

    // The last remaining address cannot be removed.
    let sole = address_service::remove_address(&state.pool, &customer, home.id).await;
    assert!(matches!(sole, Err(AppError::BadRequest(_))));

    Ok(())
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Clean tables between runs.
    sqlx::query(
        "TRUNCATE TABLE audit_logs, reviews, payments, order_items, orders, shipping_addresses, \
         wishlist_items, wishlists, cart_items, carts, coupons, products, categories, users \
         RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    Ok(Some(AppState {
        pool,
        orm,
        gateway: Arc::new(MockGateway),
    }))
}

async fn create_user(pool: &DbPool, email: &str, role: &str) -> anyhow::Result<AuthUser> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind("not-a-real-hash")
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(AuthUser {
        user_id: row.0,
        role: role.to_string(),
    })
}

async fn create_product(
    pool: &DbPool,
    slug: &str,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let category: (Uuid,) = sqlx::query_as(
        "INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3) \
         ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind("Test cars")
    .bind("test-cars")
    .fetch_one(pool)
    .await?;

    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO products (id, category_id, name, slug, price, stock) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(category.0)
    .bind(slug)
    .bind(slug)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

async fn create_coupon(
    pool: &DbPool,
    code: &str,
    percent: Decimal,
    max_discount: Decimal,
    min_purchase: Option<Decimal>,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO coupons (id, code, discount_type, value, max_discount, min_purchase, start_date, end_date) \
         VALUES ($1, $2, 'percentage', $3, $4, $5, NOW() - INTERVAL '1 day', NOW() + INTERVAL '30 days')",
    )
    .bind(Uuid::new_v4())
    .bind(code)
    .bind(percent)
    .bind(max_discount)
    .bind(min_purchase)
    .execute(pool)
    .await?;
    Ok(())
}

async fn product_stock(pool: &DbPool, product_id: Uuid) -> anyhow::Result<i32> {
    let row: (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

fn address_payload(label: &str, is_primary: Option<bool>) -> CreateAddressRequest {
    CreateAddressRequest {
        label: label.to_string(),
        recipient: "Rina Wijaya".to_string(),
        phone: "+62-811-000-111".to_string(),
        street: "Jl. Melati 5".to_string(),
        city: "Jakarta".to_string(),
        province: "DKI Jakarta".to_string(),
        postal_code: "10110".to_string(),
        is_primary,
    }
}
