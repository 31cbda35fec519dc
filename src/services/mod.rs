pub mod admin_service;
pub mod mapping;
pub mod order_service;
pub mod points_service;
pub mod product_service;
pub mod seller_service;
pub mod verification_service;
pub mod voucher_service;
