//! In-memory message bus.
//!
//! Stands in for Redis in tests and single-process runs. Several hubs can
//! share one instance to simulate a multi-process deployment.
//!
//! Besides the port itself it offers fault injection (failed connects, a
//! full outage, dropped subscriptions), raw payload injection and a record
//! of everything published.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{broadcast, watch};

use crate::ports::{BusDelivery, BusError, BusStream, MessageBus};

/// Per-subscription backlog before a slow subscriber starts lagging.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast-backed bus with Redis-style glob pattern subscriptions.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryMessageBus::new());
/// bus.fail_next_connects(4);
///
/// // ... run a relay against it, then assert
/// assert_eq!(bus.connect_attempts(), 4);
/// assert_eq!(bus.published_on("conversation:c1").len(), 1);
/// ```
pub struct InMemoryMessageBus {
    sender: broadcast::Sender<BusDelivery>,
    /// Bumped to terminate every open subscription stream.
    generation: watch::Sender<u64>,
    failing_connects: AtomicU32,
    connect_attempts: AtomicU32,
    unavailable: AtomicBool,
    published: Mutex<Vec<BusDelivery>>,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (generation, _) = watch::channel(0);
        Self {
            sender,
            generation,
            failing_connects: AtomicU32::new(0),
            connect_attempts: AtomicU32::new(0),
            unavailable: AtomicBool::new(false),
            published: Mutex::new(Vec::new()),
        }
    }

    // === Fault injection ===

    /// The next `count` subscribe attempts fail with `Unavailable`.
    pub fn fail_next_connects(&self, count: u32) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    /// Toggles a full outage: publishes and subscribes both fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Ends every open subscription stream, as a dropped connection would.
    pub fn drop_subscriptions(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Delivers a payload to subscribers without recording it as published.
    pub fn inject_raw(&self, channel: &str, payload: impl Into<Vec<u8>>) {
        let _ = self.sender.send(BusDelivery::new(channel, payload));
    }

    // === Test helpers ===

    /// Number of `psubscribe` calls, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    /// Everything successfully published, in order.
    pub fn published(&self) -> Vec<BusDelivery> {
        self.published_lock().clone()
    }

    /// Payloads published on one channel, in order.
    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.published_lock()
            .iter()
            .filter(|d| d.channel == channel)
            .filter_map(|d| d.payload_str().map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.published_lock().clear();
    }

    fn published_lock(&self) -> MutexGuard<'_, Vec<BusDelivery>> {
        self.published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), BusError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BusError::unavailable("in-memory bus marked unavailable"));
        }
        Ok(())
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BusError> {
        self.check_available()?;

        let delivery = BusDelivery::new(channel, payload.as_bytes());
        self.published_lock().push(delivery.clone());

        // No subscribers is fine, Redis reports zero receivers the same way.
        let _ = self.sender.send(delivery);
        Ok(())
    }

    async fn psubscribe(&self, patterns: &[String]) -> Result<BusStream, BusError> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let failing = self
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(BusError::unavailable("injected connect failure"));
        }

        let receiver = self.sender.subscribe();
        let generation = self.generation.subscribe();
        let patterns = patterns.to_vec();

        let stream = futures::stream::unfold(
            (receiver, generation, patterns),
            |(mut receiver, mut generation, patterns)| async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = generation.changed() => return None,
                        received = receiver.recv() => match received {
                            Ok(delivery) => {
                                if patterns.iter().any(|p| pattern_matches(p, &delivery.channel)) {
                                    return Some((delivery, (receiver, generation, patterns)));
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                tracing::warn!(skipped, "In-memory bus subscriber lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => return None,
                        },
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

/// Redis-style glob match supporting `*` and `?`.
pub fn pattern_matches(pattern: &str, channel: &str) -> bool {
    let p = pattern.as_bytes();
    let c = channel.as_bytes();
    let (mut pi, mut ci) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ci < c.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == c[ci]) {
            pi += 1;
            ci += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            backtrack = Some((pi, ci));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ci = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}
