//! Buyer notifications for order milestones.
//!
//! Delivery is fire-and-forget: a notifier failure is logged and never
//! touches the order that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Order, OrderStatus};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_order_confirmed(&self, order: &Order) -> Result<(), NotifyError>;

    async fn notify_order_shipped(&self, order: &Order, tracking: &str)
    -> Result<(), NotifyError>;

    async fn notify_order_delivered(&self, order: &Order) -> Result<(), NotifyError>;
}

/// Writes each notification as a structured log event.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_order_confirmed(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order_number,
            buyer_id = %order.buyer_id,
            total_amount = order.total_amount,
            "order confirmation notice"
        );
        Ok(())
    }

    async fn notify_order_shipped(
        &self,
        order: &Order,
        tracking: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order_number,
            buyer_id = %order.buyer_id,
            tracking_number = %tracking,
            "order shipped notice"
        );
        Ok(())
    }

    async fn notify_order_delivered(&self, order: &Order) -> Result<(), NotifyError> {
        tracing::info!(
            order_number = %order.order_number,
            buyer_id = %order.buyer_id,
            "order delivered notice"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Confirmed,
    Shipped { tracking: String },
    Delivered,
}

impl Notice {
    /// Notice owed to the buyer after an order moves to `status`.
    ///
    /// Shipping notices need a tracking number to be useful, so a shipped
    /// transition without one sends nothing.
    pub fn for_status(status: OrderStatus, tracking: Option<&str>) -> Option<Notice> {
        match status {
            OrderStatus::Shipped => tracking
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| Notice::Shipped {
                    tracking: t.to_string(),
                }),
            OrderStatus::Delivered => Some(Notice::Delivered),
            _ => None,
        }
    }
}

pub async fn deliver(notifier: &dyn Notifier, order: &Order, notice: &Notice) {
    let result = match notice {
        Notice::Confirmed => notifier.notify_order_confirmed(order).await,
        Notice::Shipped { tracking } => notifier.notify_order_shipped(order, tracking).await,
        Notice::Delivered => notifier.notify_order_delivered(order).await,
    };

    if let Err(err) = result {
        tracing::warn!(
            error = %err,
            order_number = %order.order_number,
            "notification failed"
        );
    }
}

/// Sends `notice` on a background task; the caller does not wait for it.
pub fn dispatch(notifier: Arc<dyn Notifier>, order: Order, notice: Notice) {
    tokio::spawn(async move {
        deliver(notifier.as_ref(), &order, &notice).await;
    });
}
