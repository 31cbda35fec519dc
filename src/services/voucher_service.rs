//! Voucher store and voucher evaluation.
//!
//! A voucher that cannot be used never fails a checkout. Callers get a
//! [`VoucherOutcome`] telling them whether the discount was applied and, if
//! not, why.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set,
};
use sea_orm::ActiveValue::NotSet;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::vouchers::{VoucherCheck, VoucherList, VoucherValidateQuery},
    entity::{
        voucher_usages::{ActiveModel as UsageActive, Column as UsageCol, Entity as VoucherUsages},
        vouchers::{Column as VoucherCol, Entity as Vouchers, Model as VoucherModel},
    },
    error::{AppError, AppResult, CheckoutError},
    middleware::auth::AuthUser,
    models::{DiscountType, Voucher},
    pricing::{self, VoucherTerms},
    response::{ApiResponse, Meta},
    services::mapping::voucher_from_entity,
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VoucherRejection {
    NotFound,
    Inactive,
    NotStarted,
    Expired,
    UsageLimitReached,
    PerUserLimitReached,
    BelowMinimumPurchase,
    UnknownDiscountType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VoucherOutcome {
    Applied { code: String, discount: i64 },
    NotApplied { code: String, reason: VoucherRejection },
}

/// A voucher that passed every check, priced against a subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoucherQuote {
    pub voucher_id: Uuid,
    pub code: String,
    pub discount: i64,
}

#[derive(Debug)]
pub struct VoucherLookup {
    pub voucher: Option<VoucherModel>,
    pub evaluation: Result<VoucherQuote, VoucherRejection>,
}

/// Checks `voucher` against the redemption rules at `now` and prices it.
pub fn evaluate_voucher(
    voucher: Option<&VoucherModel>,
    subtotal: i64,
    now: DateTime<Utc>,
    uses_by_buyer: u64,
) -> Result<VoucherQuote, VoucherRejection> {
    let voucher = voucher.ok_or(VoucherRejection::NotFound)?;

    if !voucher.is_active {
        return Err(VoucherRejection::Inactive);
    }
    if voucher.starts_at.is_some_and(|starts| starts > now) {
        return Err(VoucherRejection::NotStarted);
    }
    if voucher.expires_at <= now {
        return Err(VoucherRejection::Expired);
    }
    if voucher
        .usage_limit
        .is_some_and(|limit| voucher.used_count >= limit)
    {
        return Err(VoucherRejection::UsageLimitReached);
    }
    if voucher
        .per_user_limit
        .is_some_and(|limit| uses_by_buyer >= u64::try_from(limit.max(0)).unwrap_or(0))
    {
        return Err(VoucherRejection::PerUserLimitReached);
    }
    if voucher
        .minimum_purchase_amount
        .is_some_and(|minimum| subtotal < minimum)
    {
        return Err(VoucherRejection::BelowMinimumPurchase);
    }

    let discount_type: DiscountType = voucher
        .discount_type
        .parse()
        .map_err(|_| VoucherRejection::UnknownDiscountType)?;
    let terms = VoucherTerms {
        discount_type,
        discount_value: voucher.discount_value,
        max_discount_amount: voucher.max_discount_amount,
    };

    Ok(VoucherQuote {
        voucher_id: voucher.id,
        code: voucher.code.clone(),
        discount: pricing::voucher_discount(&terms, subtotal),
    })
}

impl VoucherOutcome {
    pub fn rejected(code: &str, reason: VoucherRejection) -> Self {
        VoucherOutcome::NotApplied {
            code: code.to_string(),
            reason,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, VoucherOutcome::Applied { .. })
    }
}

pub async fn find_voucher<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    lock: bool,
) -> AppResult<Option<VoucherModel>> {
    let mut finder = Vouchers::find().filter(VoucherCol::Code.eq(code));
    if lock {
        finder = finder.lock(LockType::Update);
    }
    Ok(finder.one(conn).await?)
}

pub async fn count_uses_by<C: ConnectionTrait>(
    conn: &C,
    voucher_id: Uuid,
    user_id: Uuid,
) -> AppResult<u64> {
    let uses = VoucherUsages::find()
        .filter(UsageCol::VoucherId.eq(voucher_id))
        .filter(UsageCol::UserId.eq(user_id))
        .count(conn)
        .await?;
    Ok(uses)
}

/// Looks up `code` and evaluates it for `buyer_id`. With `lock` set the
/// voucher row stays locked until the surrounding transaction ends.
pub async fn find_active_voucher<C: ConnectionTrait>(
    conn: &C,
    code: &str,
    buyer_id: Uuid,
    subtotal: i64,
    now: DateTime<Utc>,
    lock: bool,
) -> AppResult<VoucherLookup> {
    let voucher = find_voucher(conn, code, lock).await?;
    let uses_by_buyer = match &voucher {
        Some(v) if v.per_user_limit.is_some() => count_uses_by(conn, v.id, buyer_id).await?,
        _ => 0,
    };
    let evaluation = evaluate_voucher(voucher.as_ref(), subtotal, now, uses_by_buyer);
    Ok(VoucherLookup {
        voucher,
        evaluation,
    })
}

/// Bumps `used_count`, refusing to go past the voucher's usage limit.
pub async fn increment_usage<C: ConnectionTrait>(conn: &C, voucher: &VoucherModel) -> AppResult<()> {
    let mut update = Vouchers::update_many()
        .col_expr(VoucherCol::UsedCount, Expr::col(VoucherCol::UsedCount).add(1))
        .filter(VoucherCol::Id.eq(voucher.id));
    if let Some(limit) = voucher.usage_limit {
        update = update.filter(VoucherCol::UsedCount.lt(limit));
    }

    let result = update.exec(conn).await?;
    if result.rows_affected != 1 {
        return Err(CheckoutError::VoucherConflict(voucher.code.clone()).into());
    }
    Ok(())
}

pub async fn record_usage<C: ConnectionTrait>(
    conn: &C,
    voucher_id: Uuid,
    user_id: Uuid,
    order_id: Uuid,
    discount_amount: i64,
) -> AppResult<()> {
    UsageActive {
        id: Set(Uuid::new_v4()),
        voucher_id: Set(voucher_id),
        user_id: Set(user_id),
        order_id: Set(order_id),
        discount_amount: Set(discount_amount),
        created_at: NotSet,
    }
    .insert(conn)
    .await?;
    Ok(())
}

pub async fn list_active_vouchers(pool: &DbPool) -> AppResult<ApiResponse<VoucherList>> {
    let items = sqlx::query_as::<_, Voucher>(
        r#"
        SELECT id, code, description, discount_type, discount_value, max_discount_amount,
               minimum_purchase_amount, usage_limit, used_count, per_user_limit, is_active,
               starts_at, expires_at
        FROM vouchers
        WHERE is_active
          AND expires_at > now()
          AND (starts_at IS NULL OR starts_at <= now())
          AND (usage_limit IS NULL OR used_count < usage_limit)
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Vouchers retrieved",
        VoucherList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn validate_voucher(
    state: &AppState,
    user: &AuthUser,
    query: VoucherValidateQuery,
) -> AppResult<ApiResponse<VoucherCheck>> {
    let code = query.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("Missing voucher code".into()));
    }
    let subtotal = query.subtotal.unwrap_or(0).max(0);

    let lookup =
        find_active_voucher(&state.orm, code, user.user_id, subtotal, Utc::now(), false).await?;
    let outcome = match lookup.evaluation {
        Ok(quote) => VoucherOutcome::Applied {
            code: quote.code,
            discount: quote.discount,
        },
        Err(reason) => VoucherOutcome::rejected(code, reason),
    };
    let message = if outcome.is_applied() {
        "Voucher valid"
    } else {
        "Voucher cannot be applied"
    };

    Ok(ApiResponse::success(
        message,
        VoucherCheck {
            voucher: lookup.voucher.map(voucher_from_entity),
            outcome,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn voucher(discount_type: &str, value: i64) -> VoucherModel {
        let now = Utc::now();
        VoucherModel {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            description: None,
            discount_type: discount_type.into(),
            discount_value: value,
            max_discount_amount: None,
            minimum_purchase_amount: None,
            usage_limit: None,
            used_count: 0,
            per_user_limit: None,
            is_active: true,
            starts_at: None,
            expires_at: (now + Duration::days(7)).into(),
            created_at: now.into(),
        }
    }

    #[test]
    fn missing_voucher_is_not_found() {
        assert_eq!(
            evaluate_voucher(None, 50_000, Utc::now(), 0),
            Err(VoucherRejection::NotFound)
        );
    }

    #[test]
    fn fixed_voucher_is_priced() {
        let v = voucher("fixed", 5_000);
        let quote = evaluate_voucher(Some(&v), 50_000, Utc::now(), 0).unwrap();
        assert_eq!(quote.discount, 5_000);
        assert_eq!(quote.code, "SAVE10");
        assert_eq!(quote.voucher_id, v.id);
    }

    #[test]
    fn percentage_voucher_respects_cap() {
        let mut v = voucher("percentage", 50);
        v.max_discount_amount = Some(20_000);
        let quote = evaluate_voucher(Some(&v), 100_000, Utc::now(), 0).unwrap();
        assert_eq!(quote.discount, 20_000);
    }

    #[test]
    fn inactive_and_expired_vouchers_are_rejected() {
        let now = Utc::now();

        let mut inactive = voucher("fixed", 5_000);
        inactive.is_active = false;
        assert_eq!(
            evaluate_voucher(Some(&inactive), 50_000, now, 0),
            Err(VoucherRejection::Inactive)
        );

        let mut expired = voucher("fixed", 5_000);
        expired.expires_at = (now - Duration::minutes(1)).into();
        assert_eq!(
            evaluate_voucher(Some(&expired), 50_000, now, 0),
            Err(VoucherRejection::Expired)
        );

        let mut future = voucher("fixed", 5_000);
        future.starts_at = Some((now + Duration::days(1)).into());
        assert_eq!(
            evaluate_voucher(Some(&future), 50_000, now, 0),
            Err(VoucherRejection::NotStarted)
        );
    }

    #[test]
    fn usage_limits_are_enforced() {
        let now = Utc::now();

        let mut exhausted = voucher("fixed", 5_000);
        exhausted.usage_limit = Some(3);
        exhausted.used_count = 3;
        assert_eq!(
            evaluate_voucher(Some(&exhausted), 50_000, now, 0),
            Err(VoucherRejection::UsageLimitReached)
        );

        let mut once_per_buyer = voucher("fixed", 5_000);
        once_per_buyer.per_user_limit = Some(1);
        assert!(evaluate_voucher(Some(&once_per_buyer), 50_000, now, 0).is_ok());
        assert_eq!(
            evaluate_voucher(Some(&once_per_buyer), 50_000, now, 1),
            Err(VoucherRejection::PerUserLimitReached)
        );
    }

    #[test]
    fn minimum_purchase_is_enforced() {
        let mut v = voucher("fixed", 5_000);
        v.minimum_purchase_amount = Some(100_000);
        assert_eq!(
            evaluate_voucher(Some(&v), 99_999, Utc::now(), 0),
            Err(VoucherRejection::BelowMinimumPurchase)
        );
        assert!(evaluate_voucher(Some(&v), 100_000, Utc::now(), 0).is_ok());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = VoucherOutcome::rejected("OLD", VoucherRejection::Expired);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "not_applied", "code": "OLD", "reason": "expired" })
        );
    }
}
