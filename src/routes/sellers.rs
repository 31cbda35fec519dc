use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::sellers::{RegisterSellerRequest, SellerProfile},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::seller_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register_seller))
        .route("/{id}", get(get_seller))
}

#[utoipa::path(
    post,
    path = "/api/sellers",
    request_body = RegisterSellerRequest,
    responses(
        (status = 200, description = "Seller profile created", body = ApiResponse<SellerProfile>),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Seller profile already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Sellers"
)]
pub async fn register_seller(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RegisterSellerRequest>,
) -> AppResult<Json<ApiResponse<SellerProfile>>> {
    let resp = seller_service::register_seller(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/sellers/{id}",
    params(("id" = Uuid, Path, description = "Seller ID")),
    responses(
        (status = 200, description = "Seller profile", body = ApiResponse<SellerProfile>),
        (status = 404, description = "Not Found"),
    ),
    tag = "Sellers"
)]
pub async fn get_seller(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SellerProfile>>> {
    let resp = seller_service::get_seller(&state, id).await?;
    Ok(Json(resp))
}
