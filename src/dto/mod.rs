pub mod auth;
pub mod orders;
pub mod points;
pub mod sellers;
pub mod verifications;
pub mod vouchers;
