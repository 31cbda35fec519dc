//! Settlement arithmetic for checkout.
//!
//! Amounts are whole Rupiah. Nothing in here touches storage; the order
//! service feeds it prices read under row locks and persists the result.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::CheckoutError, models::DiscountType};

/// Rupiah value of a single redeemed point (10 points = Rp 2000).
pub const POINT_REDEMPTION_VALUE: i64 = 200;

/// Rupiah of payable total per earned point.
pub const SPEND_PER_EARNED_POINT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: i64,
    pub quantity: i32,
}

/// Discount parameters of a voucher that has already passed its validity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoucherTerms {
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub max_discount_amount: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Settlement {
    pub subtotal: i64,
    pub points_redeemed: i64,
    pub points_discount: i64,
    pub voucher_discount: i64,
    pub discount_amount: i64,
    pub total: i64,
    pub points_earned: i64,
}

pub fn line_subtotal(unit_price: i64, quantity: i32) -> Result<i64, CheckoutError> {
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or(CheckoutError::AmountOverflow)
}

pub fn subtotal(lines: &[PricedLine]) -> Result<i64, CheckoutError> {
    lines.iter().try_fold(0_i64, |acc, line| {
        acc.checked_add(line_subtotal(line.unit_price, line.quantity)?)
            .ok_or(CheckoutError::AmountOverflow)
    })
}

pub fn points_discount(points: i64, subtotal: i64) -> i64 {
    points
        .max(0)
        .saturating_mul(POINT_REDEMPTION_VALUE)
        .min(subtotal)
}

pub fn voucher_discount(terms: &VoucherTerms, subtotal: i64) -> i64 {
    let value = terms.discount_value.max(0);
    let discount = match terms.discount_type {
        DiscountType::Percentage => {
            let raw = i128::from(subtotal) * i128::from(value) / 100;
            let raw = i64::try_from(raw).unwrap_or(i64::MAX);
            // A zero or negative cap is stored as "no cap".
            match terms.max_discount_amount {
                Some(cap) if cap > 0 => raw.min(cap),
                _ => raw,
            }
        }
        DiscountType::Fixed => value,
    };
    discount.min(subtotal)
}

pub fn points_earned(total: i64) -> i64 {
    total.max(0) / SPEND_PER_EARNED_POINT
}

/// Stacks the points and voucher discounts on top of `subtotal`.
///
/// Points are applied first; the voucher share is whatever still fits under
/// the subtotal, so `discount_amount` never exceeds `subtotal`.
pub fn settle(subtotal: i64, points_redeemed: i64, voucher_discount: i64) -> Settlement {
    let points_discount = points_discount(points_redeemed, subtotal);
    let voucher_discount = voucher_discount.max(0).min(subtotal - points_discount);
    let discount_amount = points_discount + voucher_discount;
    let total = subtotal - discount_amount;

    Settlement {
        subtotal,
        points_redeemed: points_redeemed.max(0),
        points_discount,
        voucher_discount,
        discount_amount,
        total,
        points_earned: points_earned(total),
    }
}

pub fn points_balance_after(before: i64, redeemed: i64, earned: i64) -> i64 {
    before - redeemed + earned
}
