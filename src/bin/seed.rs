use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use mobilku_api::{config::AppConfig, db::create_pool, services::auth_service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@mobilku.test", "admin123", "admin").await?;
    let user_id = ensure_user(&pool, "buyer@mobilku.test", "buyer123", "customer").await?;
    seed_catalog(&pool).await?;
    seed_coupon(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = auth_service::hash_password(password)?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str, slug: &str) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT (slug) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(slug)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((id,)) => Ok(id),
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM categories WHERE slug = $1")
                .bind(slug)
                .fetch_one(pool)
                .await?;
            Ok(existing.0)
        }
    }
}

async fn seed_catalog(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let suv = ensure_category(pool, "SUV", "suv").await?;
    let mpv = ensure_category(pool, "MPV", "mpv").await?;
    let sedan = ensure_category(pool, "Sedan", "sedan").await?;

    let cars: Vec<(Uuid, &str, &str, &str, i64, i32)> = vec![
        (
            suv,
            "Toyota Fortuner 2.8 GR Sport",
            "toyota-fortuner-gr-sport",
            "Seven-seat diesel SUV, 4x4, factory warranty until 2028",
            615_000_000,
            3,
        ),
        (
            suv,
            "Honda CR-V 1.5 Turbo Prestige",
            "honda-crv-turbo-prestige",
            "Turbocharged compact SUV with Honda Sensing",
            749_000_000,
            2,
        ),
        (
            mpv,
            "Toyota Avanza 1.5 G CVT",
            "toyota-avanza-g-cvt",
            "The family workhorse, CVT, low running costs",
            255_000_000,
            8,
        ),
        (
            mpv,
            "Mitsubishi Xpander Ultimate",
            "mitsubishi-xpander-ultimate",
            "Spacious seven seater with cruise control",
            305_000_000,
            5,
        ),
        (
            sedan,
            "Honda Civic RS",
            "honda-civic-rs",
            "1.5 VTEC Turbo sedan, RS trim",
            616_000_000,
            2,
        ),
    ];

    for (category_id, name, slug, desc, price, stock) in cars {
        sqlx::query(
            r#"
            INSERT INTO products (id, category_id, name, slug, description, price, stock, images)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category_id)
        .bind(name)
        .bind(slug)
        .bind(desc)
        .bind(Decimal::from(price))
        .bind(stock)
        .bind(serde_json::json!([format!("https://cdn.mobilku.test/{slug}/front.jpg")]))
        .execute(pool)
        .await?;
    }

    println!("Seeded categories and cars");
    Ok(())
}

async fn seed_coupon(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO coupons
            (id, code, description, discount_type, value, min_purchase, max_discount,
             start_date, end_date, usage_limit)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("WELCOME10")
    .bind("10% off your first car, capped at 5 million")
    .bind("percentage")
    .bind(Decimal::from(10))
    .bind(Option::<Decimal>::None)
    .bind(Decimal::from(5_000_000))
    .bind(now)
    .bind(now + Duration::days(90))
    .bind(100)
    .execute(pool)
    .await?;

    println!("Seeded coupons");
    Ok(())
}
