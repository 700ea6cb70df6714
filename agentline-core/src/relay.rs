// ABOUTME: Notification relay pushing periodic incoming-call events to each connected client
// ABOUTME: One cancellable emitter task per subscription; dropping the handle stops it

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::metrics;

/// Payload of an `incoming-call` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingCallEvent {
    pub caller: String,
    pub name: String,
}

/// Supplies the event emitted on each tick
#[async_trait]
pub trait CallEventSource: Send + Sync {
    async fn next_event(&self) -> anyhow::Result<IncomingCallEvent>;
}

/// Event source returning the same sample call every time
#[derive(Debug, Clone)]
pub struct SampleCallSource {
    event: IncomingCallEvent,
}

impl SampleCallSource {
    pub fn new(caller: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            event: IncomingCallEvent {
                caller: caller.into(),
                name: name.into(),
            },
        }
    }
}

impl Default for SampleCallSource {
    fn default() -> Self {
        Self::new("+1234567890", "John Doe")
    }
}

#[async_trait]
impl CallEventSource for SampleCallSource {
    async fn next_event(&self) -> anyhow::Result<IncomingCallEvent> {
        Ok(self.event.clone())
    }
}

/// Destination for one connection's events.
///
/// An error means the connection is gone; the emitter stops on the first one.
#[async_trait]
pub trait EventSink: Send + 'static {
    async fn deliver(&mut self, event: IncomingCallEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl EventSink for mpsc::Sender<IncomingCallEvent> {
    async fn deliver(&mut self, event: IncomingCallEvent) -> anyhow::Result<()> {
        self.send(event)
            .await
            .map_err(|_| anyhow::anyhow!("connection receiver closed"))
    }
}

/// Hands out subscriptions that each emit on their own fixed interval
pub struct NotificationRelay {
    interval: Duration,
    source: Arc<dyn CallEventSource>,
    active: Arc<AtomicUsize>,
}

impl std::fmt::Debug for NotificationRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRelay")
            .field("interval", &self.interval)
            .field("source", &"<CallEventSource>")
            .field("active", &self.active_subscriptions())
            .finish()
    }
}

impl NotificationRelay {
    pub fn new(interval: Duration, source: Arc<dyn CallEventSource>) -> Self {
        Self {
            interval,
            source,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of subscriptions whose handles are still alive
    pub fn active_subscriptions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Start emitting to `sink`. The first event arrives one interval from now.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe<S: EventSink>(&self, sink: S) -> Subscription {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_emitter(
            id,
            self.interval,
            Arc::clone(&self.source),
            sink,
            cancel.clone(),
        ));

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_subscription_opened();
        tracing::debug!(subscription = %id, active, "Subscription opened");

        Subscription {
            id,
            cancel,
            task,
            active: Arc::clone(&self.active),
        }
    }
}

/// Per-connection emitter handle. Dropping it cancels the emitter.
pub struct Subscription {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    active: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("emitting", &self.is_emitting())
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// False once the emitter has stopped, either cancelled or after a failed delivery
    pub fn is_emitting(&self) -> bool {
        !self.task.is_finished()
    }

    /// Close explicitly; equivalent to dropping the handle
    pub fn close(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();

        let remaining = self.active.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::record_subscription_closed();
        tracing::debug!(subscription = %self.id, active = remaining, "Subscription closed");
    }
}

async fn run_emitter<S: EventSink>(
    id: Uuid,
    period: Duration,
    source: Arc<dyn CallEventSource>,
    mut sink: S,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let event = match source.next_event().await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(subscription = %id, error = %e, "Event source failed, skipping tick");
                metrics::record_error("relay_source");
                continue;
            }
        };

        tracing::debug!(subscription = %id, caller = %event.caller, "Emitting incoming call");
        if let Err(e) = sink.deliver(event).await {
            tracing::warn!(subscription = %id, error = %e, "Delivery failed, stopping emitter");
            metrics::record_transport_error();
            break;
        }
        metrics::record_event_emitted();
    }
}
