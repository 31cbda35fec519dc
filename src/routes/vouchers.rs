use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::vouchers::{VoucherCheck, VoucherList, VoucherValidateQuery},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::voucher_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_vouchers))
        .route("/validate", get(validate_voucher))
}

#[utoipa::path(
    get,
    path = "/api/vouchers",
    responses(
        (status = 200, description = "Vouchers that can currently be redeemed", body = ApiResponse<VoucherList>),
    ),
    tag = "Vouchers"
)]
pub async fn list_vouchers(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<VoucherList>>> {
    let resp = voucher_service::list_active_vouchers(&state.pool).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/vouchers/validate",
    params(VoucherValidateQuery),
    responses(
        (status = 200, description = "Whether the voucher would apply, and its discount", body = ApiResponse<VoucherCheck>),
        (status = 400, description = "Missing voucher code"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vouchers"
)]
pub async fn validate_voucher(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<VoucherValidateQuery>,
) -> AppResult<Json<ApiResponse<VoucherCheck>>> {
    let resp = voucher_service::validate_voucher(&state, &user, query).await?;
    Ok(Json(resp))
}
