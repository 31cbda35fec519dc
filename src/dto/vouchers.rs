use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{models::Voucher, services::voucher_service::VoucherOutcome};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VoucherValidateQuery {
    pub code: String,
    /// Cart subtotal to price the voucher against; 0 when omitted.
    pub subtotal: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherList {
    pub items: Vec<Voucher>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoucherCheck {
    pub voucher: Option<Voucher>,
    pub outcome: VoucherOutcome,
}
