use ftrade_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(&config.database_url).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", "admin", 0).await?;
    let buyer_id = ensure_user(&pool, "buyer@example.com", "Budi Pembeli", "buyer", 100).await?;
    let farmer_id = ensure_user(&pool, "farmer@example.com", "Sari Petani", "seller", 0).await?;

    let seller_id = ensure_seller(&pool, farmer_id, "Tani Makmur").await?;
    ensure_approved(&pool, farmer_id, seller_id, admin_id).await?;
    seed_products(&pool, seller_id).await?;
    seed_vouchers(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Buyer ID: {buyer_id}, Seller ID: {seller_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    full_name: &str,
    role: &str,
    points: i64,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, full_name, role, points)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(full_name)
    .bind(role)
    .bind(points)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn ensure_seller(pool: &sqlx::PgPool, user_id: Uuid, business_name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO sellers (id, user_id, business_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE SET business_name = EXCLUDED.business_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(business_name)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_approved(
    pool: &sqlx::PgPool,
    user_id: Uuid,
    seller_id: Uuid,
    admin_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO farmer_verifications
            (id, user_id, seller_id, farmer_card_number, farmer_card_name,
             organization_name, organization_id, verification_status, reviewed_by, reviewed_at)
        SELECT $1, $2, $3, 'KTA-0001', 'Sari Petani', 'Gapoktan Subur', 'GPK-17', 'approved', $4, now()
        WHERE NOT EXISTS (
            SELECT 1 FROM farmer_verifications
            WHERE seller_id = $3 AND verification_status = 'approved'
        )
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(seller_id)
    .bind(admin_id)
    .execute(pool)
    .await?;

    println!("Seller {seller_id} verified");
    Ok(())
}

async fn seed_products(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        ("Beras Pandan Wangi 5kg", "Beras organik panen terbaru", 75_000_i64, 40),
        ("Cabai Merah 1kg", "Petik langsung dari kebun", 45_000, 25),
        ("Tomat 1kg", "Tomat segar dataran tinggi", 12_000, 60),
        ("Madu Hutan 500ml", "Madu murni tanpa campuran", 95_000, 15),
    ];

    for (name, desc, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, name, description, price, quantity_available)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE seller_id = $2 AND name = $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}

async fn seed_vouchers(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let vouchers = vec![
        ("SAVE10", "Potongan Rp 5.000", "fixed", 5_000_i64, None::<i64>, None::<i64>),
        ("PANEN20", "Diskon 20% hingga Rp 20.000", "percentage", 20, Some(20_000), Some(50_000)),
    ];

    for (code, desc, kind, value, cap, minimum) in vouchers {
        sqlx::query(
            r#"
            INSERT INTO vouchers
                (id, code, description, discount_type, discount_value,
                 max_discount_amount, minimum_purchase_amount, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now() + interval '90 days')
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(desc)
        .bind(kind)
        .bind(value)
        .bind(cap)
        .bind(minimum)
        .execute(pool)
        .await?;
    }

    println!("Seeded vouchers");
    Ok(())
}
