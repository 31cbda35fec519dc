//! Product store: price and stock reads plus the two stock mutations made
//! by checkout. Every function runs on the caller's connection so checkout
//! can keep them inside its transaction.

use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    entity::products::{Column, Entity as Products, Model as ProductModel},
    error::{AppResult, CheckoutError},
};

pub async fn get_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> AppResult<Option<ProductModel>> {
    Ok(Products::find_by_id(product_id).one(conn).await?)
}

/// Loads and row-locks `product_ids`. Locks are taken in id order so two
/// checkouts sharing products cannot deadlock each other.
pub async fn lock_products<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<Vec<ProductModel>> {
    let products = Products::find()
        .filter(Column::Id.is_in(product_ids.iter().copied()))
        .order_by_asc(Column::Id)
        .lock(LockType::Update)
        .all(conn)
        .await?;
    Ok(products)
}

/// Takes `quantity` units out of stock. The update only matches while enough
/// stock remains, so `quantity_available` can never go below zero.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    let result = Products::update_many()
        .col_expr(
            Column::QuantityAvailable,
            Expr::col(Column::QuantityAvailable).sub(quantity),
        )
        .filter(Column::Id.eq(product_id))
        .filter(Column::QuantityAvailable.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(CheckoutError::StockConflict(product_id).into());
    }
    Ok(())
}

pub async fn increment_sold<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    Products::update_many()
        .col_expr(Column::TotalSold, Expr::col(Column::TotalSold).add(quantity))
        .filter(Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}
