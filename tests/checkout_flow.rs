use std::sync::Arc;

use chrono::{Duration, Utc};
use ftrade_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        orders::{CheckoutItem, CheckoutRequest, UpdateOrderStatusRequest},
        verifications::{ReviewVerificationRequest, SubmitVerificationRequest},
    },
    entity::{
        farmer_verifications::{
            ActiveModel as VerificationActive, Column as VerificationCol,
            Entity as FarmerVerifications,
        },
        orders::{Column as OrderCol, Entity as Orders},
        products::ActiveModel as ProductActive,
        sellers::ActiveModel as SellerActive,
        users::ActiveModel as UserActive,
        voucher_usages::{Column as UsageCol, Entity as VoucherUsages},
        vouchers::{ActiveModel as VoucherActive, Entity as Vouchers},
    },
    error::{AppError, CheckoutError},
    middleware::auth::AuthUser,
    notify::LogNotifier,
    services::{
        order_service, points_service, product_service, verification_service,
        voucher_service::{VoucherOutcome, VoucherRejection},
    },
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

// These tests need Postgres. They are skipped when no database is configured.
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run checkout tests.");
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(&database_url).await?;
    let config = AppConfig {
        database_url,
        jwt_secret: "test".into(),
        host: "127.0.0.1".into(),
        port: 0,
        max_concurrent_requests: 10,
        max_body_bytes: 1024 * 1024,
    };

    Ok(Some(AppState {
        pool,
        orm,
        config: Arc::new(config),
        notifier: Arc::new(LogNotifier),
    }))
}

async fn create_user(state: &AppState, role: &str, points: i64) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        full_name: Set("Test User".into()),
        role: Set(role.into()),
        points: Set(points),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(AuthUser {
        user_id: id,
        role: role.into(),
    })
}

/// A seller account with a shop and no verification history.
async fn create_shop(state: &AppState) -> anyhow::Result<(AuthUser, Uuid)> {
    let user = create_user(state, "seller", 0).await?;
    let seller = SellerActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        business_name: Set("Kebun Test".into()),
        bank_account_name: Set(None),
        bank_account_number: Set(None),
        bank_name: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok((user, seller.id))
}

async fn add_verification(
    state: &AppState,
    user: &AuthUser,
    seller_id: Uuid,
    status: &str,
) -> anyhow::Result<()> {
    VerificationActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        seller_id: Set(seller_id),
        farmer_card_number: Set("KTA-1".into()),
        farmer_card_name: Set("Test Farmer".into()),
        organization_name: Set("Gapoktan".into()),
        organization_id: Set("G-1".into()),
        verification_status: Set(status.into()),
        review_notes: Set(None),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(())
}

async fn create_seller(state: &AppState, approved: bool) -> anyhow::Result<(AuthUser, Uuid)> {
    let (user, seller_id) = create_shop(state).await?;
    let status = if approved { "approved" } else { "pending" };
    add_verification(state, &user, seller_id, status).await?;
    Ok((user, seller_id))
}

async fn create_product(
    state: &AppState,
    seller_id: Uuid,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        name: Set("Beras".into()),
        description: Set(None),
        price: Set(price),
        quantity_available: Set(stock),
        total_sold: Set(0),
        is_active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

async fn create_fixed_voucher(state: &AppState, amount: i64) -> anyhow::Result<String> {
    let code = format!("T{}", &Uuid::new_v4().simple().to_string()[..10]).to_uppercase();
    VoucherActive {
        id: Set(Uuid::new_v4()),
        code: Set(code.clone()),
        description: Set(None),
        discount_type: Set("fixed".into()),
        discount_value: Set(amount),
        max_discount_amount: Set(None),
        minimum_purchase_amount: Set(None),
        usage_limit: Set(Some(10)),
        used_count: Set(0),
        per_user_limit: Set(Some(1)),
        is_active: Set(true),
        starts_at: Set(None),
        expires_at: Set((Utc::now() + Duration::days(1)).into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(code)
}

fn request(product_id: Uuid, quantity: i32) -> CheckoutRequest {
    CheckoutRequest {
        items: vec![CheckoutItem {
            product_id,
            quantity,
        }],
        shipping_address: "Jl. Sawah 1, Bogor".into(),
        shipping_method: Some("JNE".into()),
        payment_method: Some("transfer".into()),
        voucher_code: None,
        points_to_redeem: 0,
    }
}

fn documents() -> SubmitVerificationRequest {
    SubmitVerificationRequest {
        farmer_card_number: "KTA-99".into(),
        farmer_card_name: "Pak Tani".into(),
        organization_name: "Gapoktan Maju".into(),
        organization_id: "GM-2".into(),
    }
}

async fn orders_of(state: &AppState, buyer: &AuthUser) -> anyhow::Result<u64> {
    Ok(Orders::find()
        .filter(OrderCol::BuyerId.eq(buyer.user_id))
        .count(&state.orm)
        .await?)
}

#[tokio::test]
async fn checkout_settles_points_and_voucher() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, "buyer", 100).await?;
    let (_, seller_id) = create_seller(&state, true).await?;
    let product_id = create_product(&state, seller_id, 25_000, 5).await?;
    let code = create_fixed_voucher(&state, 5_000).await?;

    let mut payload = request(product_id, 2);
    payload.points_to_redeem = 100;
    payload.voucher_code = Some(code.clone());

    let receipt = order_service::checkout(&state, &buyer, payload)
        .await?
        .data
        .expect("receipt");

    assert_eq!(receipt.subtotal_amount, 50_000);
    assert_eq!(receipt.points_discount, 20_000);
    assert_eq!(receipt.voucher_discount, 5_000);
    assert_eq!(receipt.discount_amount, 25_000);
    assert_eq!(receipt.total_amount, 25_000);
    assert_eq!(receipt.points_earned, 25);
    assert_eq!(receipt.points_balance, 25);
    assert!(receipt.order_number.starts_with("ORD-"));
    assert_eq!(receipt.items.len(), 1);
    assert_eq!(receipt.items[0].unit_price, 25_000);
    assert_eq!(receipt.items[0].subtotal, 50_000);
    assert_eq!(
        receipt.voucher,
        Some(VoucherOutcome::Applied {
            code: code.clone(),
            discount: 5_000
        })
    );

    assert_eq!(points_service::get_balance(&state.orm, buyer.user_id).await?, 25);

    let product = product_service::get_product(&state.orm, product_id)
        .await?
        .expect("product");
    assert_eq!(product.quantity_available, 3);
    assert_eq!(product.total_sold, 2);

    let voucher = Vouchers::find()
        .filter(ftrade_api::entity::vouchers::Column::Code.eq(code.as_str()))
        .one(&state.orm)
        .await?
        .expect("voucher");
    assert_eq!(voucher.used_count, 1);
    let usages = VoucherUsages::find()
        .filter(UsageCol::VoucherId.eq(voucher.id))
        .filter(UsageCol::UserId.eq(buyer.user_id))
        .count(&state.orm)
        .await?;
    assert_eq!(usages, 1);

    // Same buyer, same voucher: per-buyer limit is reached, the order still goes through.
    let mut again = request(product_id, 1);
    again.voucher_code = Some(code.clone());
    let second = order_service::checkout(&state, &buyer, again)
        .await?
        .data
        .expect("receipt");
    assert_eq!(second.voucher_discount, 0);
    assert_eq!(
        second.voucher,
        Some(VoucherOutcome::NotApplied {
            code,
            reason: VoucherRejection::PerUserLimitReached
        })
    );
    Ok(())
}

#[tokio::test]
async fn unverified_seller_blocks_checkout_without_side_effects() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, "buyer", 50).await?;
    let (_, seller_id) = create_seller(&state, false).await?;
    let product_id = create_product(&state, seller_id, 10_000, 4).await?;

    let mut payload = request(product_id, 1);
    payload.points_to_redeem = 10;
    let result = order_service::checkout(&state, &buyer, payload).await;

    assert!(matches!(
        result,
        Err(AppError::Checkout(CheckoutError::SellerNotVerified(id))) if id == seller_id
    ));
    assert_eq!(orders_of(&state, &buyer).await?, 0);
    assert_eq!(points_service::get_balance(&state.orm, buyer.user_id).await?, 50);
    let product = product_service::get_product(&state.orm, product_id)
        .await?
        .expect("product");
    assert_eq!(product.quantity_available, 4);
    Ok(())
}

#[tokio::test]
async fn newer_verification_overrides_an_earlier_approval() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, "buyer", 0).await?;
    let (seller, seller_id) = create_seller(&state, true).await?;
    let product_id = create_product(&state, seller_id, 10_000, 4).await?;
    assert!(verification_service::is_seller_approved(&state.orm, seller_id).await?);

    add_verification(&state, &seller, seller_id, "rejected").await?;
    assert!(!verification_service::is_seller_approved(&state.orm, seller_id).await?);

    let result = order_service::checkout(&state, &buyer, request(product_id, 1)).await;
    assert!(matches!(
        result,
        Err(AppError::Checkout(CheckoutError::SellerNotVerified(id))) if id == seller_id
    ));
    assert_eq!(orders_of(&state, &buyer).await?, 0);

    add_verification(&state, &seller, seller_id, "pending").await?;
    assert!(!verification_service::is_seller_approved(&state.orm, seller_id).await?);
    Ok(())
}

#[tokio::test]
async fn over_redeeming_points_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, "buyer", 5).await?;
    let (_, seller_id) = create_seller(&state, true).await?;
    let product_id = create_product(&state, seller_id, 10_000, 4).await?;

    let mut payload = request(product_id, 1);
    payload.points_to_redeem = 6;
    let result = order_service::checkout(&state, &buyer, payload).await;

    assert!(matches!(
        result,
        Err(AppError::Checkout(CheckoutError::InsufficientPoints {
            requested: 6,
            available: 5
        }))
    ));
    assert_eq!(orders_of(&state, &buyer).await?, 0);
    Ok(())
}

#[tokio::test]
async fn stock_shortfall_is_a_conflict() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, "buyer", 0).await?;
    let (_, seller_id) = create_seller(&state, true).await?;
    let product_id = create_product(&state, seller_id, 10_000, 2).await?;

    let err = order_service::checkout(&state, &buyer, request(product_id, 3))
        .await
        .unwrap_err();
    assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
    assert_eq!(orders_of(&state, &buyer).await?, 0);
    Ok(())
}

#[tokio::test]
async fn last_unit_is_sold_exactly_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let first = create_user(&state, "buyer", 0).await?;
    let second = create_user(&state, "buyer", 0).await?;
    let (_, seller_id) = create_seller(&state, true).await?;
    let product_id = create_product(&state, seller_id, 10_000, 1).await?;

    let (a, b) = tokio::join!(
        order_service::checkout(&state, &first, request(product_id, 1)),
        order_service::checkout(&state, &second, request(product_id, 1)),
    );

    let successes = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    let failure = if a.is_err() { a.err() } else { b.err() };
    assert!(matches!(
        failure,
        Some(AppError::Checkout(
            CheckoutError::InsufficientStock { .. } | CheckoutError::StockConflict(_)
        ))
    ));

    let product = product_service::get_product(&state.orm, product_id)
        .await?
        .expect("product");
    assert_eq!(product.quantity_available, 0);
    assert_eq!(product.total_sold, 1);
    Ok(())
}

#[tokio::test]
async fn points_are_spent_once_across_concurrent_checkouts() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, "buyer", 100).await?;
    let (_, seller_id) = create_seller(&state, true).await?;
    let rice = create_product(&state, seller_id, 25_000, 5).await?;
    let chili = create_product(&state, seller_id, 25_000, 5).await?;

    let mut first = request(rice, 2);
    first.points_to_redeem = 100;
    let mut second = request(chili, 2);
    second.points_to_redeem = 100;

    let (a, b) = tokio::join!(
        order_service::checkout(&state, &buyer, first),
        order_service::checkout(&state, &buyer, second),
    );

    let successes = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    let (receipt, failure) = match (a, b) {
        (Ok(receipt), Err(err)) | (Err(err), Ok(receipt)) => (receipt, err),
        _ => unreachable!("exactly one checkout succeeded"),
    };
    assert!(matches!(
        failure,
        AppError::Checkout(CheckoutError::InsufficientPoints { requested: 100, .. })
    ));

    let receipt = receipt.data.expect("receipt");
    assert_eq!(receipt.points_redeemed, 100);
    assert_eq!(
        points_service::get_balance(&state.orm, buyer.user_id).await?,
        100 - 100 + receipt.points_earned
    );
    assert_eq!(orders_of(&state, &buyer).await?, 1);
    Ok(())
}

#[tokio::test]
async fn seller_ships_own_order_only() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, "buyer", 0).await?;
    let (seller, seller_id) = create_seller(&state, true).await?;
    let (other_seller, _) = create_seller(&state, true).await?;
    let product_id = create_product(&state, seller_id, 40_000, 3).await?;

    let receipt = order_service::checkout(&state, &buyer, request(product_id, 1))
        .await?
        .data
        .expect("receipt");

    let denied = order_service::update_order_status(
        &state,
        &other_seller,
        receipt.order_id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
            tracking_number: Some("JNE-1".into()),
        },
    )
    .await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    let shipped = order_service::update_order_status(
        &state,
        &seller,
        receipt.order_id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
            tracking_number: Some("JNE-1".into()),
        },
    )
    .await?
    .data
    .expect("order");
    assert_eq!(shipped.status, "shipped");
    assert_eq!(shipped.tracking_number.as_deref(), Some("JNE-1"));

    let bad = order_service::update_order_status(
        &state,
        &seller,
        receipt.order_id,
        UpdateOrderStatusRequest {
            status: "lost".into(),
            tracking_number: None,
        },
    )
    .await;
    assert!(matches!(bad, Err(AppError::BadRequest(_))));
    Ok(())
}

#[tokio::test]
async fn review_opens_the_gate_once() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let admin = create_user(&state, "admin", 0).await?;
    let (seller_user, seller_id) = create_shop(&state).await?;

    assert!(!verification_service::is_seller_approved(&state.orm, seller_id).await?);

    let submitted = verification_service::submit_verification(&state, &seller_user, documents())
        .await?
    .data
    .expect("verification");
    assert_eq!(submitted.verification_status, "pending");
    assert!(!verification_service::is_seller_approved(&state.orm, seller_id).await?);

    let review = || ReviewVerificationRequest {
        status: "approved".into(),
        notes: Some("documents ok".into()),
    };
    let reviewed =
        verification_service::review_verification(&state, &admin, submitted.id, review())
            .await?
            .data
            .expect("verification");
    assert_eq!(reviewed.verification_status, "approved");
    assert_eq!(reviewed.reviewed_by, Some(admin.user_id));
    assert!(verification_service::is_seller_approved(&state.orm, seller_id).await?);

    let again =
        verification_service::review_verification(&state, &admin, submitted.id, review()).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn concurrent_submissions_leave_one_pending_row() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let (seller_user, seller_id) = create_shop(&state).await?;

    let (a, b) = tokio::join!(
        verification_service::submit_verification(&state, &seller_user, documents()),
        verification_service::submit_verification(&state, &seller_user, documents()),
    );

    let successes = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(successes, 1);
    let failure = if a.is_err() { a.err() } else { b.err() };
    assert!(matches!(failure, Some(AppError::Conflict(_))));

    let rows = FarmerVerifications::find()
        .filter(VerificationCol::SellerId.eq(seller_id))
        .count(&state.orm)
        .await?;
    assert_eq!(rows, 1);
    Ok(())
}
