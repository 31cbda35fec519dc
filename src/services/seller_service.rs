use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::sellers::{RegisterSellerRequest, SellerProfile},
    entity::{
        sellers::{ActiveModel as SellerActive, Column as SellerCol, Entity as Sellers, Model as SellerModel},
        users::{ActiveModel as UserActive, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_BUYER, ROLE_SELLER},
    response::{ApiResponse, Meta},
    services::{mapping::seller_from_entity, verification_service::is_seller_approved},
    state::AppState,
};

pub async fn seller_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<Option<SellerModel>> {
    let seller = Sellers::find()
        .filter(SellerCol::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(seller)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Creates the caller's seller profile. A buyer becomes a seller; other
/// roles keep theirs.
pub async fn register_seller(
    state: &AppState,
    user: &AuthUser,
    payload: RegisterSellerRequest,
) -> AppResult<ApiResponse<SellerProfile>> {
    payload.validate()?;
    let business_name = payload.business_name.trim().to_string();
    if business_name.is_empty() {
        return Err(AppError::BadRequest("Business name is required".into()));
    }

    let txn = state.orm.begin().await?;

    let account = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Missing("User".into()))?;

    if seller_for_user(&txn, user.user_id).await?.is_some() {
        return Err(AppError::Conflict("Seller profile already exists".into()));
    }

    let seller = SellerActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        business_name: Set(business_name),
        bank_account_name: Set(non_blank(payload.bank_account_name)),
        bank_account_number: Set(non_blank(payload.bank_account_number)),
        bank_name: Set(non_blank(payload.bank_name)),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    if account.role == ROLE_BUYER {
        let mut active: UserActive = account.into();
        active.role = Set(ROLE_SELLER.into());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "seller_registered",
        "sellers",
        serde_json::json!({ "seller_id": seller.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Seller registered",
        SellerProfile {
            seller: seller_from_entity(seller),
            is_verified: false,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_seller(state: &AppState, id: Uuid) -> AppResult<ApiResponse<SellerProfile>> {
    let seller = Sellers::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let is_verified = is_seller_approved(&state.orm, seller.id).await?;

    Ok(ApiResponse::success(
        "OK",
        SellerProfile {
            seller: seller_from_entity(seller),
            is_verified,
        },
        Some(Meta::empty()),
    ))
}
