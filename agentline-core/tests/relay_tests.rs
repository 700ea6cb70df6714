// ABOUTME: Timing tests for the notification relay using a paused tokio clock
// ABOUTME: Covers emission cadence, cancellation on close, isolation, and failure handling

use agentline_core::relay::{
    CallEventSource, EventSink, IncomingCallEvent, NotificationRelay, SampleCallSource,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const INTERVAL: Duration = Duration::from_secs(30);

/// Sink that records when each event arrived
#[derive(Clone, Default)]
struct RecordingSink {
    arrivals: Arc<Mutex<Vec<(Instant, IncomingCallEvent)>>>,
}

impl RecordingSink {
    fn count(&self) -> usize {
        self.arrivals.lock().unwrap().len()
    }

    fn times(&self) -> Vec<Instant> {
        self.arrivals.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn deliver(&mut self, event: IncomingCallEvent) -> anyhow::Result<()> {
        self.arrivals.lock().unwrap().push((Instant::now(), event));
        Ok(())
    }
}

/// Sink whose connection is already broken
struct BrokenSink {
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl EventSink for BrokenSink {
    async fn deliver(&mut self, _event: IncomingCallEvent) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("connection reset by peer")
    }
}

/// Source producing a numbered caller per event
#[derive(Default)]
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl CallEventSource for CountingSource {
    async fn next_event(&self) -> anyhow::Result<IncomingCallEvent> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IncomingCallEvent {
            caller: format!("+1555000{:04}", n),
            name: format!("Caller {}", n),
        })
    }
}

/// Source that fails on every other call
#[derive(Default)]
struct FlakySource {
    calls: AtomicUsize,
}

#[async_trait]
impl CallEventSource for FlakySource {
    async fn next_event(&self) -> anyhow::Result<IncomingCallEvent> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            anyhow::bail!("call data unavailable");
        }
        Ok(IncomingCallEvent {
            caller: "+15550000000".to_string(),
            name: "Flaky".to_string(),
        })
    }
}

fn sample_relay() -> NotificationRelay {
    NotificationRelay::new(INTERVAL, Arc::new(SampleCallSource::default()))
}

#[tokio::test(start_paused = true)]
async fn test_connection_open_ninety_seconds_gets_three_events() {
    let relay = sample_relay();
    let sink = RecordingSink::default();
    let start = Instant::now();

    let subscription = relay.subscribe(sink.clone());
    tokio::time::sleep(Duration::from_secs(95)).await;

    assert_eq!(sink.count(), 3);
    let offsets: Vec<Duration> = sink.times().iter().map(|t| *t - start).collect();
    assert_eq!(
        offsets,
        vec![
            Duration::from_secs(30),
            Duration::from_secs(60),
            Duration::from_secs(90)
        ]
    );

    {
        let arrivals = sink.arrivals.lock().unwrap();
        assert_eq!(arrivals[0].1.caller, "+1234567890");
        assert_eq!(arrivals[0].1.name, "John Doe");
    }

    assert!(subscription.is_emitting());
}

#[tokio::test(start_paused = true)]
async fn test_connection_closed_after_ten_seconds_gets_nothing() {
    let relay = sample_relay();
    let (tx, mut rx) = mpsc::channel(8);

    let subscription = relay.subscribe(tx);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(relay.active_subscriptions(), 1);
    subscription.close();
    assert_eq!(relay.active_subscriptions(), 0);

    tokio::time::sleep(Duration::from_secs(120)).await;

    // The emitter owned the only sender; once it is gone the channel reports closed
    match rx.try_recv() {
        Err(mpsc::error::TryRecvError::Disconnected) => {}
        other => panic!("expected closed channel with no events, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_cancels_emitter() {
    let relay = sample_relay();
    let sink = RecordingSink::default();

    {
        let _subscription = relay.subscribe(sink.clone());
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(sink.count(), 1);
    }

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(sink.count(), 1);
    assert_eq!(relay.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_subscriptions_are_independent() {
    let relay = sample_relay();
    let sink_a = RecordingSink::default();
    let sink_b = RecordingSink::default();
    let start = Instant::now();

    let sub_a = relay.subscribe(sink_a.clone());
    tokio::time::sleep(Duration::from_secs(15)).await;
    let sub_b = relay.subscribe(sink_b.clone());

    // t = 70: A fired at 30 and 60, B at 45
    tokio::time::sleep(Duration::from_secs(55)).await;
    assert_eq!(sink_a.count(), 2);
    assert_eq!(sink_b.count(), 1);

    drop(sub_a);

    // t = 140: B continues at 75, 105, 135
    tokio::time::sleep(Duration::from_secs(70)).await;
    assert_eq!(sink_a.count(), 2);
    assert_eq!(sink_b.count(), 4);

    let offsets: Vec<u64> = sink_b
        .times()
        .iter()
        .map(|t| (*t - start).as_secs())
        .collect();
    assert_eq!(offsets, vec![45, 75, 105, 135]);
    assert!(sub_b.is_emitting());
}

#[tokio::test(start_paused = true)]
async fn test_failed_delivery_stops_only_that_subscription() {
    let relay = sample_relay();
    let attempts = Arc::new(AtomicUsize::new(0));
    let healthy = RecordingSink::default();

    let broken = relay.subscribe(BrokenSink {
        attempts: Arc::clone(&attempts),
    });
    let ok = relay.subscribe(healthy.clone());

    tokio::time::sleep(Duration::from_secs(125)).await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(!broken.is_emitting());
    assert!(ok.is_emitting());
    assert_eq!(healthy.count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_injected_source_supplies_each_event() {
    let relay = NotificationRelay::new(INTERVAL, Arc::new(CountingSource::default()));
    let sink = RecordingSink::default();

    let _subscription = relay.subscribe(sink.clone());
    tokio::time::sleep(Duration::from_secs(65)).await;

    let arrivals = sink.arrivals.lock().unwrap();
    assert_eq!(arrivals.len(), 2);
    assert_eq!(arrivals[0].1.name, "Caller 1");
    assert_eq!(arrivals[1].1.name, "Caller 2");
}

#[tokio::test(start_paused = true)]
async fn test_source_errors_skip_tick_without_stopping() {
    let relay = NotificationRelay::new(INTERVAL, Arc::new(FlakySource::default()));
    let sink = RecordingSink::default();

    let subscription = relay.subscribe(sink.clone());
    tokio::time::sleep(Duration::from_secs(125)).await;

    // Ticks at 30/60/90/120; the 1st and 3rd source calls fail
    assert_eq!(sink.count(), 2);
    assert!(subscription.is_emitting());
}

#[tokio::test(start_paused = true)]
async fn test_no_subscribers_means_no_events() {
    let source = Arc::new(CountingSource::default());
    let relay = NotificationRelay::new(INTERVAL, source.clone());

    tokio::time::sleep(Duration::from_secs(300)).await;

    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert_eq!(relay.active_subscriptions(), 0);
}
