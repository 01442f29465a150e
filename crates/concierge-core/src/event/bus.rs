//! Deployment progress fan-out.
//!
//! Every unit task of a deployment holds a clone of the bus and publishes
//! into one `tokio::sync::broadcast` channel; each event carries the id of
//! the deployment it belongs to. Events from one task arrive in publish
//! order. A subscriber that falls more than the capacity behind sees
//! `RecvError::Lagged` instead of the dropped events.

use concierge_types::event::DeploymentEvent;
use tokio::sync::broadcast;

/// Multi-consumer event bus for deployment progress.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers (the orchestrator publishes from spawned unit tasks).
pub struct EventBus {
    sender: broadcast::Sender<DeploymentEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: DeploymentEvent) {
        let deployment_id = event.deployment_id();
        if let Ok(receivers) = self.sender.send(event) {
            tracing::trace!(deployment_id = %deployment_id, receivers, "event published");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_types::resource::ResourceKind;
    use concierge_types::unit::UnitId;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};
    use tokio::task::JoinSet;
    use uuid::Uuid;

    fn sample_event() -> DeploymentEvent {
        DeploymentEvent::UnitStarted {
            deployment_id: Uuid::now_v7(),
            unit: UnitId::from("HotelBedrockKBStack"),
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(sample_event());

        let received = rx.recv().await.unwrap();
        assert!(matches!(received, DeploymentEvent::UnitStarted { .. }));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.publish(sample_event());
        bus.publish(sample_event());
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        // Publish via clone, receive via original's subscriber
        bus2.publish(sample_event());

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn debug_impl() {
        let bus = EventBus::new(16);
        let _rx = bus.subscribe();
        let debug = format!("{bus:?}");
        assert!(debug.contains("receiver_count"));
    }

    #[tokio::test]
    async fn concurrent_unit_tasks_share_one_deployment_stream() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let deployment_id = Uuid::now_v7();
        let units = ["HotelBedrockKBStack", "HotelLexStack", "HotelAuditStack"];

        let mut tasks = JoinSet::new();
        for unit in units {
            let bus = bus.clone();
            tasks.spawn(async move {
                let unit = UnitId::from(unit);
                for resource in ["Role", "RolePolicy"] {
                    bus.publish(DeploymentEvent::ResourceBuilt {
                        deployment_id,
                        unit: unit.clone(),
                        resource: resource.to_string(),
                        kind: ResourceKind::Role,
                        duration_ms: 1,
                    });
                    tokio::task::yield_now().await;
                }
                bus.publish(DeploymentEvent::UnitBuilt {
                    deployment_id,
                    unit,
                    outputs: vec![],
                });
            });
        }
        while tasks.join_next().await.is_some() {}

        let mut per_unit: std::collections::BTreeMap<String, Vec<String>> = Default::default();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.deployment_id(), deployment_id);
            match event {
                DeploymentEvent::ResourceBuilt { unit, resource, .. } => {
                    per_unit.entry(unit.to_string()).or_default().push(resource);
                }
                DeploymentEvent::UnitBuilt { unit, .. } => {
                    per_unit.entry(unit.to_string()).or_default().push("done".to_string());
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        assert_eq!(per_unit.len(), units.len());
        for sequence in per_unit.values() {
            assert_eq!(sequence, &["Role", "RolePolicy", "done"]);
        }
    }

    #[tokio::test]
    async fn slow_subscriber_is_told_how_many_events_it_missed() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        let deployment_id = Uuid::now_v7();

        for unit in ["a", "b", "c", "d"] {
            bus.publish(DeploymentEvent::UnitStarted {
                deployment_id,
                unit: UnitId::from(unit),
            });
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(2))));
        let next = rx.recv().await.unwrap();
        assert!(matches!(next, DeploymentEvent::UnitStarted { ref unit, .. } if unit.as_str() == "c"));
        assert!(matches!(rx.try_recv(), Ok(DeploymentEvent::UnitStarted { .. })));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
