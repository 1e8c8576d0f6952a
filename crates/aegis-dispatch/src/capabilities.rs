//! Injected notification and logistics capabilities
//!
//! The dispatcher only puts `notify` / `plan` messages on the bridge. The
//! consumers in [`crate::consumers`] turn them into calls on these traits.

use crate::error::DispatchResult;
use aegis_types::{AlertLevel, Amount, EventId, GeoPoint, ResponseId, SignalKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Payload of a `notify` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub response_id: ResponseId,
    pub event_id: EventId,
    pub kind: SignalKind,
    pub location: GeoPoint,
    pub severity: AlertLevel,
    pub treasury_balance: Amount,
}

/// Payload of a `plan` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsRequest {
    pub response_id: ResponseId,
    pub event_id: EventId,
    pub kind: SignalKind,
    pub location: GeoPoint,
    pub severity: AlertLevel,
    pub required_supplies: Vec<String>,
    pub evacuation_needed: bool,
}

impl LogisticsRequest {
    /// Supplies by hazard; evacuation from critical severity up
    pub fn for_response(
        response_id: ResponseId,
        event_id: EventId,
        kind: SignalKind,
        location: GeoPoint,
        severity: AlertLevel,
    ) -> Self {
        let mut supplies = vec!["medical_kits", "food", "water"];
        match kind {
            SignalKind::Seismic => supplies.extend(["tents", "search_and_rescue"]),
            SignalKind::Flood => supplies.extend(["boats", "water_purification"]),
            SignalKind::Fire => supplies.extend(["respirators", "firefighting"]),
            SignalKind::Social => {}
        }
        Self {
            response_id,
            event_id,
            kind,
            location,
            severity,
            required_supplies: supplies.into_iter().map(String::from).collect(),
            evacuation_needed: severity >= AlertLevel::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyRoute {
    pub route_id: String,
    pub destination: GeoPoint,
    pub supplies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsPlan {
    pub response_id: ResponseId,
    pub supply_routes: Vec<SupplyRoute>,
    pub evacuation_zones: Vec<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> DispatchResult<()>;
}

#[async_trait]
pub trait LogisticsPlanner: Send + Sync {
    async fn plan(&self, request: &LogisticsRequest) -> DispatchResult<LogisticsPlan>;
}

/// Default notifier: writes the alert to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: &Notification) -> DispatchResult<()> {
        info!(
            response_id = %n.response_id,
            kind = %n.kind,
            location = %n.location,
            severity = %n.severity,
            treasury = %n.treasury_balance,
            "Disaster alert broadcast"
        );
        Ok(())
    }
}

/// Default planner: one supply route to the event location, plus an
/// evacuation zone when evacuation is needed
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPlanner;

#[async_trait]
impl LogisticsPlanner for LogPlanner {
    async fn plan(&self, request: &LogisticsRequest) -> DispatchResult<LogisticsPlan> {
        let plan = LogisticsPlan {
            response_id: request.response_id.clone(),
            supply_routes: vec![SupplyRoute {
                route_id: format!("supply_{}", request.event_id),
                destination: request.location,
                supplies: request.required_supplies.clone(),
            }],
            evacuation_zones: if request.evacuation_needed {
                vec![format!("{} high-risk zone", request.location)]
            } else {
                Vec::new()
            },
        };
        info!(
            response_id = %plan.response_id,
            routes = plan.supply_routes.len(),
            evacuation = request.evacuation_needed,
            "Logistics plan generated"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn evacuation_follows_severity() {
        let request = LogisticsRequest::for_response(
            ResponseId::new("dao_evt_1"),
            EventId::new("evt_1"),
            SignalKind::Flood,
            GeoPoint::new(-6.2, 106.8),
            AlertLevel::Critical,
        );
        assert!(request.evacuation_needed);
        assert!(request.required_supplies.contains(&"boats".to_string()));

        let plan = LogPlanner.plan(&request).await.unwrap();
        assert_eq!(plan.evacuation_zones.len(), 1);
        assert_eq!(plan.supply_routes[0].supplies, request.required_supplies);
    }
}
