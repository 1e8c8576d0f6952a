//! Mailbox consumers for the `communications` and `logistics` components

use crate::capabilities::{LogisticsPlanner, LogisticsRequest, Notification, Notifier};
use crate::error::DispatchResult;
use aegis_bridge::{BridgeMessage, Mailbox};
use std::sync::Arc;
use tracing::{debug, warn};

pub const COMMUNICATIONS: &str = "communications";
pub const LOGISTICS: &str = "logistics";
pub const DISPATCHER: &str = "dispatcher";

pub const TOPIC_NOTIFY: &str = "notify";
pub const TOPIC_PLAN: &str = "plan";

/// Drain the communications mailbox until the transport closes it
pub async fn run_communications(mut mailbox: Mailbox, notifier: Arc<dyn Notifier>) {
    while let Some(message) = mailbox.recv().await {
        if let Err(e) = handle_notify(&message, notifier.as_ref()).await {
            warn!(message_id = %message.id, topic = %message.topic, error = %e, "Notification failed");
        }
    }
    debug!("Communications mailbox closed");
}

/// Drain the logistics mailbox until the transport closes it
pub async fn run_logistics(mut mailbox: Mailbox, planner: Arc<dyn LogisticsPlanner>) {
    while let Some(message) = mailbox.recv().await {
        if let Err(e) = handle_plan(&message, planner.as_ref()).await {
            warn!(message_id = %message.id, topic = %message.topic, error = %e, "Logistics planning failed");
        }
    }
    debug!("Logistics mailbox closed");
}

async fn handle_notify(message: &BridgeMessage, notifier: &dyn Notifier) -> DispatchResult<()> {
    if message.topic != TOPIC_NOTIFY {
        debug!(topic = %message.topic, "Ignoring message");
        return Ok(());
    }
    let notification: Notification = serde_json::from_value(message.payload.clone())?;
    notifier.notify(&notification).await
}

async fn handle_plan(message: &BridgeMessage, planner: &dyn LogisticsPlanner) -> DispatchResult<()> {
    if message.topic != TOPIC_PLAN {
        debug!(topic = %message.topic, "Ignoring message");
        return Ok(());
    }
    let request: LogisticsRequest = serde_json::from_value(message.payload.clone())?;
    planner.plan(&request).await.map(|_| ())
}
