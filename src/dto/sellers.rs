use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Seller;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterSellerRequest {
    #[validate(length(min = 1, max = 200))]
    pub business_name: String,
    pub bank_account_name: Option<String>,
    pub bank_account_number: Option<String>,
    pub bank_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SellerProfile {
    pub seller: Seller,
    pub is_verified: bool,
}
