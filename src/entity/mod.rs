pub mod farmer_verifications;
pub mod order_items;
pub mod orders;
pub mod products;
pub mod sellers;
pub mod users;
pub mod voucher_usages;
pub mod vouchers;

pub use farmer_verifications::Entity as FarmerVerifications;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use sellers::Entity as Sellers;
pub use users::Entity as Users;
pub use voucher_usages::Entity as VoucherUsages;
pub use vouchers::Entity as Vouchers;
