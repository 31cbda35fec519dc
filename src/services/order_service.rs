use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    cart::{Cart, CartLine},
    dto::orders::{
        CheckoutReceipt, CheckoutRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest,
    },
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Model as ProductModel,
    },
    error::{AppError, AppResult, CheckoutError},
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_SELLER, ensure_any_role},
    models::{Order, OrderItem, OrderStatus, PaymentStatus},
    notify::{self, Notice},
    pricing::{self, PricedLine},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        mapping::{order_from_entity, order_item_from_entity},
        points_service, product_service,
        seller_service::seller_for_user,
        verification_service::is_seller_approved,
        voucher_service::{self, VoucherOutcome},
    },
    state::AppState,
};

const DEFAULT_PAYMENT_METHOD: &str = "pending";

/// Places an order for the caller's cart and settles its discounts.
///
/// Stock, points, and voucher usage are all written in one transaction.
/// Any refusal, including a lost race on stock, rolls the whole order back.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutReceipt>> {
    payload.validate()?;
    let cart = Cart::new(payload.items.iter().map(CartLine::from))?;

    let shipping_address = payload.shipping_address.trim().to_string();
    if shipping_address.is_empty() {
        return Err(AppError::BadRequest("Shipping address is required".into()));
    }
    let voucher_code = payload
        .voucher_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    let points_to_redeem = payload.points_to_redeem;
    let now = Utc::now();

    let txn = state.orm.begin().await?;

    let products = product_service::lock_products(&txn, &cart.product_ids()).await?;
    let lines = match_products(&cart, &products)?;

    let seller_id = single_seller(&lines)?;
    if !is_seller_approved(&txn, seller_id).await? {
        return Err(CheckoutError::SellerNotVerified(seller_id).into());
    }

    for (line, product) in &lines {
        if product.quantity_available < line.quantity {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                requested: line.quantity,
                available: product.quantity_available,
            }
            .into());
        }
    }

    let buyer = points_service::lock_buyer(&txn, user.user_id).await?;
    if points_to_redeem > buyer.points {
        return Err(CheckoutError::InsufficientPoints {
            requested: points_to_redeem,
            available: buyer.points,
        }
        .into());
    }

    let priced: Vec<PricedLine> = lines
        .iter()
        .map(|(line, product)| PricedLine {
            unit_price: product.price,
            quantity: line.quantity,
        })
        .collect();
    let subtotal = pricing::subtotal(&priced)?;

    let mut applied_voucher = None;
    let mut rejected_voucher = None;
    if let Some(code) = voucher_code.as_deref() {
        let lookup =
            voucher_service::find_active_voucher(&txn, code, user.user_id, subtotal, now, true)
                .await?;
        match (lookup.voucher, lookup.evaluation) {
            (Some(voucher), Ok(quote)) => applied_voucher = Some((voucher, quote)),
            (_, Err(reason)) => {
                tracing::info!(code, ?reason, "voucher not applied");
                rejected_voucher = Some(VoucherOutcome::rejected(code, reason));
            }
            (None, Ok(_)) => {
                rejected_voucher = Some(VoucherOutcome::rejected(
                    code,
                    voucher_service::VoucherRejection::NotFound,
                ))
            }
        }
    }

    let settlement = pricing::settle(
        subtotal,
        points_to_redeem,
        applied_voucher
            .as_ref()
            .map(|(_, quote)| quote.discount)
            .unwrap_or(0),
    );

    let order_id = Uuid::new_v4();
    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id, now)),
        buyer_id: Set(user.user_id),
        seller_id: Set(seller_id),
        subtotal_amount: Set(settlement.subtotal),
        discount_amount: Set(settlement.discount_amount),
        points_redeemed: Set(settlement.points_redeemed),
        points_earned: Set(settlement.points_earned),
        total_amount: Set(settlement.total),
        voucher_code: Set(applied_voucher.as_ref().map(|(v, _)| v.code.clone())),
        shipping_address: Set(shipping_address),
        shipping_method: Set(payload.shipping_method.clone()),
        payment_method: Set(payload
            .payment_method
            .clone()
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string())),
        tracking_number: Set(None),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_status: Set(PaymentStatus::Pending.as_str().into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for (line, product) in &lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(line.quantity),
            unit_price: Set(product.price),
            subtotal: Set(pricing::line_subtotal(product.price, line.quantity)?),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item));

        product_service::decrement_stock(&txn, product.id, line.quantity).await?;
        product_service::increment_sold(&txn, product.id, line.quantity).await?;
    }

    if let Some((voucher, _)) = &applied_voucher {
        voucher_service::increment_usage(&txn, voucher).await?;
        voucher_service::record_usage(
            &txn,
            voucher.id,
            user.user_id,
            order.id,
            settlement.voucher_discount,
        )
        .await?;
    }

    points_service::apply_delta(
        &txn,
        user.user_id,
        settlement.points_earned - settlement.points_redeemed,
    )
    .await?;

    txn.commit().await?;

    tracing::info!(
        order_number = %order.order_number,
        buyer_id = %user.user_id,
        seller_id = %seller_id,
        total_amount = settlement.total,
        "order placed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "total_amount": settlement.total,
        }),
    )
    .await;

    let voucher = match applied_voucher {
        Some((voucher, _)) => Some(VoucherOutcome::Applied {
            code: voucher.code,
            discount: settlement.voucher_discount,
        }),
        None => rejected_voucher,
    };
    let receipt = CheckoutReceipt {
        order_id: order.id,
        order_number: order.order_number.clone(),
        subtotal_amount: settlement.subtotal,
        points_discount: settlement.points_discount,
        voucher_discount: settlement.voucher_discount,
        discount_amount: settlement.discount_amount,
        total_amount: settlement.total,
        points_redeemed: settlement.points_redeemed,
        points_earned: settlement.points_earned,
        points_balance: pricing::points_balance_after(
            buyer.points,
            settlement.points_redeemed,
            settlement.points_earned,
        ),
        voucher,
        items,
    };

    notify::dispatch(
        state.notifier.clone(),
        order_from_entity(order),
        Notice::Confirmed,
    );

    Ok(ApiResponse::success("Checkout success", receipt, Some(Meta::empty())))
}

/// Pairs each cart line with its locked product row.
fn match_products<'a>(
    cart: &'a Cart,
    products: &'a [ProductModel],
) -> Result<Vec<(&'a CartLine, &'a ProductModel)>, CheckoutError> {
    cart.lines()
        .iter()
        .map(|line| {
            let product = products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or(CheckoutError::ProductNotFound(line.product_id))?;
            if !product.is_active {
                return Err(CheckoutError::ProductUnavailable(product.id));
            }
            Ok((line, product))
        })
        .collect()
}

fn single_seller(lines: &[(&CartLine, &ProductModel)]) -> Result<Uuid, CheckoutError> {
    let mut sellers = lines.iter().map(|(_, product)| product.seller_id);
    let first = sellers.next().ok_or(CheckoutError::EmptyCart)?;
    if sellers.any(|seller| seller != first) {
        return Err(CheckoutError::MultipleSellers);
    }
    Ok(first)
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let condition = Condition::all().add(OrderCol::BuyerId.eq(user.user_id));
    list_orders_where(&state.orm, condition, query).await
}

pub async fn list_seller_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_any_role(user, &[ROLE_SELLER])?;
    let seller = seller_for_user(&state.orm, user.user_id)
        .await?
        .ok_or_else(|| AppError::Missing("Seller profile".into()))?;
    let condition = Condition::all().add(OrderCol::SellerId.eq(seller.id));
    list_orders_where(&state.orm, condition, query).await
}

pub(crate) async fn list_orders_where<C: ConnectionTrait>(
    conn: &C,
    mut condition: Condition,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = parse_status(status)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(conn).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::new(page, limit, total)),
    ))
}

/// Returns an order to its buyer or to the seller it was placed with.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.buyer_id != user.user_id && !user.is_admin() {
        let owns = seller_for_user(&state.orm, user.user_id)
            .await?
            .is_some_and(|seller| seller.id == order.seller_id);
        if !owns {
            return Err(AppError::NotFound);
        }
    }

    let items = load_items(&state.orm, order.id).await?;
    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub(crate) async fn load_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<OrderItem>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();
    Ok(items)
}

/// Moves an order to a new status. Sellers may only touch their own orders;
/// admins may touch any.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_any_role(user, &[ROLE_SELLER, ROLE_ADMIN])?;
    payload.validate()?;
    let status = parse_status(&payload.status)?;
    let tracking_number = payload
        .tracking_number
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !user.is_admin() {
        let owns = seller_for_user(&txn, user.user_id)
            .await?
            .is_some_and(|seller| seller.id == order.seller_id);
        if !owns {
            return Err(AppError::Forbidden);
        }
    }

    let previous = order.status.clone();
    let mut active: OrderActive = order.into();
    active.status = Set(status.as_str().into());
    if let Some(tracking) = tracking_number {
        active.tracking_number = Set(Some(tracking));
    }
    active.updated_at = Set(Utc::now().into());
    let order: OrderModel = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        order_number = %order.order_number,
        from = %previous,
        to = status.as_str(),
        "order status updated"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "order_status_updated",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "to": status.as_str() }),
    )
    .await;

    if let Some(notice) = Notice::for_status(status, order.tracking_number.as_deref()) {
        notify::dispatch(state.notifier.clone(), order_from_entity(order.clone()), notice);
    }

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

fn parse_status(raw: &str) -> AppResult<OrderStatus> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown order status {raw}")))
}

/// `ORD-YYYYMMDD-XXXXXXXX` with the first eight hex digits of `order_id`.
pub fn build_order_number(order_id: Uuid, at: DateTime<Utc>) -> String {
    let date = at.format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("ORD-{}-{}", date, suffix[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn product(seller_id: Uuid, active: bool) -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            seller_id,
            name: "Beras".into(),
            description: None,
            price: 10_000,
            quantity_available: 10,
            total_sold: 0,
            is_active: active,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn order_number_has_date_and_uppercase_suffix() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        assert_eq!(build_order_number(id, at), "ORD-20250309-A1B2C3D4");
    }

    #[test]
    fn unknown_product_rejects_the_whole_cart() {
        let seller = Uuid::new_v4();
        let known = product(seller, true);
        let missing = Uuid::new_v4();
        let cart = Cart::new([
            CartLine { product_id: known.id, quantity: 1 },
            CartLine { product_id: missing, quantity: 1 },
        ])
        .unwrap();

        let products = [known];
        let err = match_products(&cart, &products).unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound(id) if id == missing));
    }

    #[test]
    fn inactive_product_is_unavailable() {
        let p = product(Uuid::new_v4(), false);
        let cart = Cart::new([CartLine { product_id: p.id, quantity: 1 }]).unwrap();
        let products = [p];
        assert!(matches!(
            match_products(&cart, &products),
            Err(CheckoutError::ProductUnavailable(_))
        ));
    }

    #[test]
    fn carts_must_come_from_one_seller() {
        let a = product(Uuid::new_v4(), true);
        let b = product(Uuid::new_v4(), true);
        let cart = Cart::new([
            CartLine { product_id: a.id, quantity: 1 },
            CartLine { product_id: b.id, quantity: 2 },
        ])
        .unwrap();
        let products = [a, b];
        let lines = match_products(&cart, &products).unwrap();
        assert!(matches!(single_seller(&lines), Err(CheckoutError::MultipleSellers)));

        let seller = Uuid::new_v4();
        let c = product(seller, true);
        let d = product(seller, true);
        let cart = Cart::new([
            CartLine { product_id: c.id, quantity: 1 },
            CartLine { product_id: d.id, quantity: 1 },
        ])
        .unwrap();
        let products = [c, d];
        let lines = match_products(&cart, &products).unwrap();
        assert_eq!(single_seller(&lines).unwrap(), seller);
    }

    #[test]
    fn unknown_status_is_a_bad_request() {
        assert!(matches!(parse_status("paid"), Err(AppError::BadRequest(_))));
        assert_eq!(parse_status("shipped").unwrap(), OrderStatus::Shipped);
    }
}
