use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::points::PointsBalance, error::AppResult, middleware::auth::AuthUser,
    response::ApiResponse, services::points_service, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/me/points", get(my_points))
}

#[utoipa::path(
    get,
    path = "/api/users/me/points",
    responses(
        (status = 200, description = "Loyalty point balance", body = ApiResponse<PointsBalance>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Points"
)]
pub async fn my_points(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PointsBalance>>> {
    let resp = points_service::points_balance(&state, &user).await?;
    Ok(Json(resp))
}
