use chrono::Utc;

use crate::{
    entity::{
        farmer_verifications::Model as VerificationModel, order_items::Model as OrderItemModel,
        orders::Model as OrderModel,
        sellers::Model as SellerModel, vouchers::Model as VoucherModel,
    },
    models::{FarmerVerification, Order, OrderItem, Seller, Voucher},
};

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_number: model.order_number,
        buyer_id: model.buyer_id,
        seller_id: model.seller_id,
        subtotal_amount: model.subtotal_amount,
        discount_amount: model.discount_amount,
        points_redeemed: model.points_redeemed,
        points_earned: model.points_earned,
        total_amount: model.total_amount,
        voucher_code: model.voucher_code,
        shipping_address: model.shipping_address,
        shipping_method: model.shipping_method,
        payment_method: model.payment_method,
        tracking_number: model.tracking_number,
        status: model.status,
        payment_status: model.payment_status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        subtotal: model.subtotal,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn seller_from_entity(model: SellerModel) -> Seller {
    Seller {
        id: model.id,
        user_id: model.user_id,
        business_name: model.business_name,
        bank_account_name: model.bank_account_name,
        bank_account_number: model.bank_account_number,
        bank_name: model.bank_name,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn verification_from_entity(model: VerificationModel) -> FarmerVerification {
    FarmerVerification {
        id: model.id,
        user_id: model.user_id,
        seller_id: model.seller_id,
        farmer_card_number: model.farmer_card_number,
        farmer_card_name: model.farmer_card_name,
        organization_name: model.organization_name,
        organization_id: model.organization_id,
        verification_status: model.verification_status,
        review_notes: model.review_notes,
        reviewed_by: model.reviewed_by,
        reviewed_at: model.reviewed_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn voucher_from_entity(model: VoucherModel) -> Voucher {
    Voucher {
        id: model.id,
        code: model.code,
        description: model.description,
        discount_type: model.discount_type,
        discount_value: model.discount_value,
        max_discount_amount: model.max_discount_amount,
        minimum_purchase_amount: model.minimum_purchase_amount,
        usage_limit: model.usage_limit,
        used_count: model.used_count,
        per_user_limit: model.per_user_limit,
        is_active: model.is_active,
        starts_at: model.starts_at.map(|dt| dt.with_timezone(&Utc)),
        expires_at: model.expires_at.with_timezone(&Utc),
    }
}
