use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        orders::{
            CheckoutItem, CheckoutReceipt, CheckoutRequest, OrderList, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        points::PointsBalance,
        sellers::{RegisterSellerRequest, SellerProfile},
        verifications::{ReviewVerificationRequest, SubmitVerificationRequest, VerificationList},
        vouchers::{VoucherCheck, VoucherList},
    },
    models::{
        DiscountType, FarmerVerification, Order, OrderItem, OrderStatus, PaymentStatus, Seller,
        VerificationStatus, Voucher,
    },
    pricing::Settlement,
    response::{ApiResponse, Meta},
    routes::{admin, health, orders, params, sellers, users, verifications, vouchers},
    services::voucher_service::{VoucherOutcome, VoucherRejection},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::list_orders,
        orders::checkout,
        orders::list_seller_orders,
        orders::get_order,
        orders::update_order_status,
        vouchers::list_vouchers,
        vouchers::validate_voucher,
        sellers::register_seller,
        sellers::get_seller,
        verifications::submit_verification,
        verifications::my_verification,
        users::my_points,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::list_verifications,
        admin::review_verification
    ),
    components(
        schemas(
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            Seller,
            Voucher,
            DiscountType,
            FarmerVerification,
            VerificationStatus,
            Settlement,
            CheckoutItem,
            CheckoutRequest,
            CheckoutReceipt,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            VoucherOutcome,
            VoucherRejection,
            VoucherList,
            VoucherCheck,
            RegisterSellerRequest,
            SellerProfile,
            SubmitVerificationRequest,
            ReviewVerificationRequest,
            VerificationList,
            PointsBalance,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<CheckoutReceipt>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Order>,
            ApiResponse<VoucherList>,
            ApiResponse<VoucherCheck>,
            ApiResponse<SellerProfile>,
            ApiResponse<FarmerVerification>,
            ApiResponse<VerificationList>,
            ApiResponse<PointsBalance>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Checkout and order endpoints"),
        (name = "Vouchers", description = "Voucher endpoints"),
        (name = "Sellers", description = "Seller profile endpoints"),
        (name = "Verifications", description = "Farmer verification endpoints"),
        (name = "Points", description = "Loyalty point endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_checkout_path() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/orders/checkout"));
        assert!(doc.paths.paths.contains_key("/api/admin/verifications/{id}"));
    }
}
