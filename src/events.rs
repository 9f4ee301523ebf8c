//! Observability channel for solver runs.
//!
//! Every classified event (model switch, rate-limit wait, compile failure,
//! per-sample result, task status change) is published on a broadcast
//! channel so an operator UI can follow a run. Publishing never blocks and
//! never fails the caller; with no subscribers events are simply dropped.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::task::TaskStatus;

/// Why a model was taken out of the candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Daily quota signature in a 429 body
    QuotaExhausted,
    /// 404: model removed or renamed
    NotFound,
    /// Success status but no usable text payload
    Unparseable,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExhausted => write!(f, "quota_exhausted"),
            Self::NotFound => write!(f, "not_found"),
            Self::Unparseable => write!(f, "unparseable"),
        }
    }
}

/// Events published while solving tasks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolverEvent {
    RunStarted {
        run_id: uuid::Uuid,
        tasks: usize,
    },
    RunFinished {
        run_id: uuid::Uuid,
        cancelled: bool,
    },
    TaskStatusChanged {
        task: String,
        status: TaskStatus,
    },
    ModelSelected {
        model: String,
        attempt: u32,
    },
    ModelExcluded {
        model: String,
        reason: ExclusionReason,
    },
    RateLimitWait {
        model: String,
        wait_secs: f64,
    },
    TransportRetry {
        model: String,
        message: String,
    },
    GenerationSucceeded {
        model: String,
        attempts: u32,
    },
    CompileFailed {
        output: String,
    },
    SamplePassed {
        index: usize,
    },
    SampleFailed {
        index: usize,
        detail: String,
    },
    VerificationSkipped {
        reason: String,
    },
    Submitted {
        task: String,
    },
}

/// Cloneable handle on the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SolverEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: SolverEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SolverEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn rate_limit_wait(&self, model: &str, wait: Duration) {
        self.publish(SolverEvent::RateLimitWait {
            model: model.to_string(),
            wait_secs: wait.as_secs_f64(),
        });
    }
}

/// Feed every event from `rx` to `handle` until the bus is dropped. A lagging
/// receiver skips what it missed and keeps going.
pub async fn forward_events(
    mut rx: broadcast::Receiver<SolverEvent>,
    mut handle: impl FnMut(SolverEvent),
) {
    loop {
        match rx.recv().await {
            Ok(event) => handle(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event subscriber lagged; events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.publish(SolverEvent::SamplePassed { index: 1 });
    }

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(SolverEvent::SamplePassed { index: 1 });
        bus.rate_limit_wait("gemini-x", Duration::from_secs(12));

        assert!(matches!(rx.recv().await, Ok(SolverEvent::SamplePassed { index: 1 })));
        match rx.recv().await {
            Ok(SolverEvent::RateLimitWait { model, wait_secs }) => {
                assert_eq!(model, "gemini-x");
                assert_eq!(wait_secs, 12.0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn forwarding_survives_a_lagged_receiver() {
        let bus = EventBus::new(2);
        let rx = bus.subscribe();
        for index in 1..=5 {
            bus.publish(SolverEvent::SamplePassed { index });
        }
        drop(bus);

        let mut seen = Vec::new();
        forward_events(rx, |event| {
            if let SolverEvent::SamplePassed { index } = event {
                seen.push(index);
            }
        })
        .await;

        assert_eq!(seen, vec![4, 5]);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(SolverEvent::ModelExcluded {
            model: "m".to_string(),
            reason: ExclusionReason::QuotaExhausted,
        })
        .unwrap();
        assert_eq!(json["type"], "model_excluded");
        assert_eq!(json["reason"], "quota_exhausted");
    }
}
