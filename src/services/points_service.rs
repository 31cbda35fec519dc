use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

use crate::{
    dto::points::PointsBalance,
    entity::users::{Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult, CheckoutError},
    middleware::auth::AuthUser,
    pricing::POINT_REDEMPTION_VALUE,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Loads the buyer row under an update lock for the rest of the transaction.
pub async fn lock_buyer<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(user_id)
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or_else(|| CheckoutError::BuyerNotFound.into())
}

pub async fn get_balance<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<i64> {
    let user = Users::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::Missing("User".into()))?;
    Ok(user.points)
}

/// Adds `delta` (negative to debit) to the user's points in one statement.
/// The update is skipped when it would leave the balance below zero.
pub async fn apply_delta<C: ConnectionTrait>(conn: &C, user_id: Uuid, delta: i64) -> AppResult<()> {
    if delta == 0 {
        return Ok(());
    }

    let result = Users::update_many()
        .col_expr(UserCol::Points, Expr::col(UserCol::Points).add(delta))
        .filter(UserCol::Id.eq(user_id))
        .filter(UserCol::Points.gte(-delta))
        .exec(conn)
        .await?;

    if result.rows_affected != 1 {
        return Err(CheckoutError::PointsConflict.into());
    }
    Ok(())
}

pub async fn points_balance(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PointsBalance>> {
    let points = get_balance(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success(
        "Points balance",
        PointsBalance {
            user_id: user.user_id,
            points,
            redemption_value: points.saturating_mul(POINT_REDEMPTION_VALUE),
        },
        Some(Meta::empty()),
    ))
}
