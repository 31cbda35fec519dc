use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct PointsBalance {
    pub user_id: Uuid,
    pub points: i64,
    /// Rupiah the whole balance would take off an order.
    pub redemption_value: i64,
}
