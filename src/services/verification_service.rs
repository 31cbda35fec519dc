//! Farmer verification records and the gate checkout asks before selling.
//!
//! A seller may have many verification rows over time. Only the most recent
//! one counts.

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::verifications::{
        ReviewVerificationRequest, SubmitVerificationRequest, VerificationList,
        VerificationListQuery,
    },
    entity::farmer_verifications::{
        ActiveModel as VerificationActive, Column as VerificationCol,
        Entity as FarmerVerifications, Model as VerificationModel,
    },
    entity::sellers::Entity as Sellers,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_SELLER, ensure_admin, ensure_role},
    models::{FarmerVerification, VerificationStatus},
    response::{ApiResponse, Meta},
    services::{mapping::verification_from_entity, seller_service::seller_for_user},
    state::AppState,
};

pub async fn latest_for_seller<C: ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
) -> AppResult<Option<VerificationModel>> {
    let latest = FarmerVerifications::find()
        .filter(VerificationCol::SellerId.eq(seller_id))
        .order_by_desc(VerificationCol::CreatedAt)
        .order_by_desc(VerificationCol::Id)
        .one(conn)
        .await?;
    Ok(latest)
}

/// True when the seller's most recent verification was approved.
pub async fn is_seller_approved<C: ConnectionTrait>(conn: &C, seller_id: Uuid) -> AppResult<bool> {
    let approved = latest_for_seller(conn, seller_id)
        .await?
        .is_some_and(|v| v.verification_status == VerificationStatus::Approved.as_str());
    Ok(approved)
}

pub async fn submit_verification(
    state: &AppState,
    user: &AuthUser,
    payload: SubmitVerificationRequest,
) -> AppResult<ApiResponse<FarmerVerification>> {
    ensure_role(user, ROLE_SELLER)?;
    payload.validate()?;
    let txn = state.orm.begin().await?;

    let seller = seller_for_user(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::Missing("Seller profile".into()))?;
    // Serializes submissions for one seller.
    let seller = Sellers::find_by_id(seller.id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::Missing("Seller profile".into()))?;

    if let Some(latest) = latest_for_seller(&txn, seller.id).await? {
        if latest.verification_status != VerificationStatus::Rejected.as_str() {
            return Err(AppError::Conflict(format!(
                "Verification already {}",
                latest.verification_status
            )));
        }
    }

    let verification = VerificationActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        seller_id: Set(seller.id),
        farmer_card_number: Set(payload.farmer_card_number.trim().to_string()),
        farmer_card_name: Set(payload.farmer_card_name.trim().to_string()),
        organization_name: Set(payload.organization_name.trim().to_string()),
        organization_id: Set(payload.organization_id.trim().to_string()),
        verification_status: Set(VerificationStatus::Pending.as_str().into()),
        review_notes: Set(None),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "verification_submitted",
        "farmer_verifications",
        serde_json::json!({ "verification_id": verification.id, "seller_id": seller.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Verification submitted",
        verification_from_entity(verification),
        Some(Meta::empty()),
    ))
}

pub async fn latest_verification(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FarmerVerification>> {
    let seller = seller_for_user(&state.orm, user.user_id)
        .await?
        .ok_or_else(|| AppError::Missing("Seller profile".into()))?;
    let latest = latest_for_seller(&state.orm, seller.id)
        .await?
        .ok_or_else(|| AppError::Missing("Verification".into()))?;

    Ok(ApiResponse::success(
        "OK",
        verification_from_entity(latest),
        Some(Meta::empty()),
    ))
}

pub async fn review_verification(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: ReviewVerificationRequest,
) -> AppResult<ApiResponse<FarmerVerification>> {
    ensure_admin(user)?;
    payload.validate()?;
    let decision: VerificationStatus = payload
        .status
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Unknown verification status {}", payload.status)))?;
    if decision == VerificationStatus::Pending {
        return Err(AppError::BadRequest(
            "Review must approve or reject".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let verification = FarmerVerifications::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if verification.verification_status != VerificationStatus::Pending.as_str() {
        return Err(AppError::Conflict(format!(
            "Verification already {}",
            verification.verification_status
        )));
    }

    let mut active: VerificationActive = verification.into();
    active.verification_status = Set(decision.as_str().into());
    active.review_notes = Set(payload.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()));
    active.reviewed_by = Set(Some(user.user_id));
    active.reviewed_at = Set(Some(Utc::now().into()));
    let verification = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        verification_id = %verification.id,
        seller_id = %verification.seller_id,
        status = decision.as_str(),
        "verification reviewed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "verification_reviewed",
        "farmer_verifications",
        serde_json::json!({ "verification_id": verification.id, "status": decision.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Verification reviewed",
        verification_from_entity(verification),
        Some(Meta::empty()),
    ))
}

pub async fn list_verifications(
    state: &AppState,
    user: &AuthUser,
    query: VerificationListQuery,
) -> AppResult<ApiResponse<VerificationList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status: VerificationStatus = status
            .parse()
            .map_err(|_| AppError::BadRequest(format!("Unknown verification status {status}")))?;
        condition = condition.add(VerificationCol::VerificationStatus.eq(status.as_str()));
    }

    let finder = FarmerVerifications::find()
        .filter(condition)
        .order_by_desc(VerificationCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(verification_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Verifications",
        VerificationList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
