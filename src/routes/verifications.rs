use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::verifications::SubmitVerificationRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::FarmerVerification,
    response::ApiResponse,
    services::verification_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_verification))
        .route("/me", get(my_verification))
}

#[utoipa::path(
    post,
    path = "/api/verifications",
    request_body = SubmitVerificationRequest,
    responses(
        (status = 200, description = "Verification submitted for review", body = ApiResponse<FarmerVerification>),
        (status = 403, description = "Caller is not a seller"),
        (status = 404, description = "No seller profile"),
        (status = 409, description = "A verification is already pending or approved"),
    ),
    security(("bearer_auth" = [])),
    tag = "Verifications"
)]
pub async fn submit_verification(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SubmitVerificationRequest>,
) -> AppResult<Json<ApiResponse<FarmerVerification>>> {
    let resp = verification_service::submit_verification(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/verifications/me",
    responses(
        (status = 200, description = "Latest verification of the caller's shop", body = ApiResponse<FarmerVerification>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Verifications"
)]
pub async fn my_verification(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FarmerVerification>>> {
    let resp = verification_service::latest_verification(&state, &user).await?;
    Ok(Json(resp))
}
