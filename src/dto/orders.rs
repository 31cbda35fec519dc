use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    cart::CartLine,
    models::{Order, OrderItem},
    services::voucher_service::VoucherOutcome,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
}

impl From<&CheckoutItem> for CartLine {
    fn from(item: &CheckoutItem) -> Self {
        CartLine {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 100))]
    pub items: Vec<CheckoutItem>,
    #[validate(length(min = 1, max = 500))]
    pub shipping_address: String,
    #[validate(length(max = 50))]
    pub shipping_method: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: Option<String>,
    #[validate(length(max = 64))]
    pub voucher_code: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub points_to_redeem: i64,
}

/// What the buyer needs to reconcile client state after a successful checkout.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order_id: Uuid,
    pub order_number: String,
    pub subtotal_amount: i64,
    pub points_discount: i64,
    pub voucher_discount: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub points_redeemed: i64,
    pub points_earned: i64,
    pub points_balance: i64,
    pub voucher: Option<VoucherOutcome>,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    #[validate(length(min = 1, max = 100))]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(items: Vec<CheckoutItem>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            shipping_address: "Jl. Sawah 1".into(),
            shipping_method: None,
            payment_method: None,
            voucher_code: None,
            points_to_redeem: 0,
        }
    }

    #[test]
    fn item_count_is_bounded() {
        let item = CheckoutItem {
            product_id: Uuid::new_v4(),
            quantity: 1,
        };

        assert!(request(vec![item.clone()]).validate().is_ok());

        let errors = request(Vec::new()).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));

        let errors = request(vec![item; 101]).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("items"));
    }

    #[test]
    fn checkout_item_serializes_with_its_wire_names() {
        let id = Uuid::new_v4();
        let body = serde_json::to_value(CheckoutItem {
            product_id: id,
            quantity: 3,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "product_id": id, "quantity": 3 }));
    }
}
