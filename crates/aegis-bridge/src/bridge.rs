//! Bounded-retry send primitive

use crate::dead_letter::{DeadLetter, DeadLetterLog};
use crate::lifecycle::LifecycleBus;
use crate::transport::{BridgeMessage, Transport};
use aegis_types::{ComponentId, LifecycleEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy applied to every send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Result of one send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered { attempts: u32 },
    DeadLettered { attempts: u32 },
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }
}

/// Retrying bridge over a [`Transport`].
pub struct Bridge {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    dead_letters: Arc<DeadLetterLog>,
    lifecycle: Option<LifecycleBus>,
}

impl Bridge {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            dead_letters: Arc::new(DeadLetterLog::new()),
            lifecycle: None,
        }
    }

    /// Publish `DeliveryFailed` on this bus whenever a message is dead-lettered
    pub fn with_lifecycle(mut self, lifecycle: LifecycleBus) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn dead_letters(&self) -> Arc<DeadLetterLog> {
        self.dead_letters.clone()
    }

    /// Send a message, retrying up to the policy limit.
    ///
    /// Never fails: exhaustion is logged, dead-lettered and reported in the
    /// returned [`Delivery`], and the caller carries on.
    pub async fn send(
        &self,
        from: ComponentId,
        to: ComponentId,
        topic: impl Into<String>,
        payload: serde_json::Value,
    ) -> Delivery {
        self.send_message(BridgeMessage::new(from, to, topic, payload))
            .await
    }

    pub async fn send_message(&self, message: BridgeMessage) -> Delivery {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.transport.deliver(&message).await {
                Ok(()) => {
                    debug!(
                        message_id = %message.id,
                        to = %message.to,
                        topic = %message.topic,
                        attempt,
                        "Message delivered"
                    );
                    return Delivery::Delivered { attempts: attempt };
                }
                Err(err) if attempt < max_attempts => {
                    debug!(
                        message_id = %message.id,
                        to = %message.to,
                        attempt,
                        error = %err,
                        "Delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(err) => {
                    warn!(
                        message_id = %message.id,
                        to = %message.to,
                        topic = %message.topic,
                        attempts = attempt,
                        error = %err,
                        "Delivery failed, message dead-lettered"
                    );
                    if let Some(lifecycle) = &self.lifecycle {
                        lifecycle.publish(LifecycleEvent::DeliveryFailed {
                            to: message.to.clone(),
                            topic: message.topic.clone(),
                            attempts: attempt,
                        });
                    }
                    self.dead_letters.record(DeadLetter {
                        message,
                        attempts: attempt,
                        last_error: err.to_string(),
                        failed_at: chrono::Utc::now(),
                    });
                    return Delivery::DeadLettered { attempts: attempt };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, TransportResult};
    use crate::transport::InMemoryTransport;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn deliver(&self, _message: &BridgeMessage) -> TransportResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(TransportError::DeliveryFailed(format!("attempt {call}")))
            } else {
                Ok(())
            }
        }
    }

    fn flaky(failures: u32) -> Arc<FlakyTransport> {
        Arc::new(FlakyTransport {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_delivered() {
        let transport = flaky(2);
        let bridge = Bridge::new(transport.clone(), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let delivery = bridge
            .send(
                ComponentId::new("dispatcher"),
                ComponentId::new("communications"),
                "notify",
                json!({}),
            )
            .await;

        assert_eq!(delivery, Delivery::Delivered { attempts: 3 });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert!(bridge.dead_letters().is_empty());
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_dead_letters_and_publishes() {
        let transport = flaky(u32::MAX);
        let bus = LifecycleBus::new(8);
        let mut rx = bus.subscribe();
        let bridge = Bridge::new(transport.clone(), RetryPolicy::default()).with_lifecycle(bus);

        let delivery = bridge
            .send(
                ComponentId::new("dispatcher"),
                ComponentId::new("logistics"),
                "plan",
                json!({ "supplies": ["water"] }),
            )
            .await;

        assert_eq!(delivery, Delivery::DeadLettered { attempts: 3 });
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);

        let letters = bridge.dead_letters().entries();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 3);
        assert_eq!(letters[0].message.topic, "plan");
        assert!(letters[0].last_error.contains("attempt 3"));

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(
            envelope.event,
            LifecycleEvent::DeliveryFailed { attempts: 3, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_component_is_dead_lettered() {
        let transport = Arc::new(InMemoryTransport::new(4));
        let bridge = Bridge::new(
            transport,
            RetryPolicy {
                max_attempts: 2,
                delay: Duration::from_millis(10),
            },
        );

        let delivery = bridge
            .send(
                ComponentId::new("dispatcher"),
                ComponentId::new("ghost"),
                "notify",
                json!({}),
            )
            .await;

        assert!(!delivery.is_delivered());
        assert!(bridge.dead_letters().entries()[0]
            .last_error
            .contains("No mailbox registered"));
    }
}
