//! Listeners that may veto or rewrite a message before it is formatted.

use std::{
    fmt,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use {
    huddle_config::DispatchConfig,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use huddle_metrics::{counter, labels, listeners as listener_metrics};

use crate::event::ChannelMessageEvent;

// ── MessageListener ─────────────────────────────────────────────────────────

/// Observes and may mutate every message event.
pub trait MessageListener: Send + Sync {
    fn name(&self) -> &str;

    /// Higher values run first. Default is 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect or mutate the event. On error, any changes made to the event
    /// are discarded.
    fn on_message(&self, event: &mut ChannelMessageEvent) -> anyhow::Result<()>;
}

/// Adapts a closure into a [`MessageListener`].
pub struct FnListener<F> {
    name: String,
    priority: i32,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&mut ChannelMessageEvent) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            f,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> MessageListener for FnListener<F>
where
    F: Fn(&mut ChannelMessageEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn on_message(&self, event: &mut ChannelMessageEvent) -> anyhow::Result<()> {
        (self.f)(event)
    }
}

// ── ListenerStats ───────────────────────────────────────────────────────────

/// Per-listener health statistics for circuit breaker logic.
#[derive(Default)]
pub struct ListenerStats {
    call_count: AtomicU64,
    failure_count: AtomicU64,
    consecutive_failures: AtomicU64,
    total_latency_us: AtomicU64,
    disabled: AtomicBool,
    disabled_at: Mutex<Option<Instant>>,
}

impl ListenerStats {
    fn record_success(&self, latency: Duration) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    fn record_failure(&self, latency: Duration) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    pub fn avg_latency(&self) -> Duration {
        let calls = self.call_count();
        if calls == 0 {
            return Duration::ZERO;
        }
        let total = self.total_latency_us.load(Ordering::Relaxed);
        Duration::from_micros(total / calls)
    }
}

impl fmt::Debug for ListenerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerStats")
            .field("call_count", &self.call_count())
            .field("failure_count", &self.failure_count())
            .field("consecutive_failures", &self.consecutive_failures())
            .field("disabled", &self.is_disabled())
            .finish()
    }
}

// ── ListenerRegistry ────────────────────────────────────────────────────────

#[derive(Clone)]
struct ListenerEntry {
    listener: Arc<dyn MessageListener>,
    stats: Arc<ListenerStats>,
}

/// Registered listeners, fired in descending priority. Equal priorities run
/// in registration order.
pub struct ListenerRegistry {
    entries: RwLock<Vec<ListenerEntry>>,
    /// Consecutive failures before a listener is disabled. 0 turns the
    /// breaker off.
    circuit_breaker_threshold: u64,
    /// How long a tripped listener stays disabled.
    circuit_breaker_cooldown: Duration,
    /// When true, cancellations and edits are logged but not applied.
    dry_run: bool,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown: Duration::from_secs(60),
            dry_run: false,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new()
            .with_circuit_breaker(
                config.circuit_breaker_threshold,
                Duration::from_secs(config.circuit_breaker_cooldown_secs),
            )
            .with_dry_run(config.dry_run)
    }

    #[must_use]
    pub fn with_circuit_breaker(mut self, threshold: u64, cooldown: Duration) -> Self {
        self.circuit_breaker_threshold = threshold;
        self.circuit_breaker_cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn register(&self, listener: Arc<dyn MessageListener>) {
        let name = listener.name().to_string();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(ListenerEntry {
            listener,
            stats: Arc::new(ListenerStats::default()),
        });
        // Stable sort keeps registration order among equal priorities.
        entries.sort_by_key(|e| std::cmp::Reverse(e.listener.priority()));
        info!(listener = %name, "message listener registered");
    }

    /// Remove every listener with `name`. Returns how many were removed.
    pub fn unregister(&self, name: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| e.listener.name() != name);
        before - entries.len()
    }

    pub fn stats(&self, name: &str) -> Option<Arc<ListenerStats>> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.listener.name() == name)
            .map(|e| Arc::clone(&e.stats))
    }

    /// Listener names in firing order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|e| e.listener.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the listener is disabled and should be skipped,
    /// tripping or resetting the breaker as needed.
    fn check_circuit_breaker(&self, entry: &ListenerEntry) -> bool {
        if self.circuit_breaker_threshold == 0 {
            return false;
        }
        let stats = &entry.stats;
        if !stats.is_disabled() {
            if stats.consecutive_failures() >= self.circuit_breaker_threshold {
                stats.disabled.store(true, Ordering::Relaxed);
                *stats.disabled_at.lock().unwrap_or_else(|e| e.into_inner()) =
                    Some(Instant::now());
                warn!(
                    listener = entry.listener.name(),
                    "listener circuit breaker tripped after {} consecutive failures",
                    self.circuit_breaker_threshold
                );
                #[cfg(feature = "metrics")]
                counter!(
                    listener_metrics::CIRCUIT_OPEN_TOTAL,
                    labels::LISTENER => entry.listener.name().to_string()
                )
                .increment(1);
                return true;
            }
            return false;
        }

        let disabled_at = stats.disabled_at.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(at) = *disabled_at
            && at.elapsed() >= self.circuit_breaker_cooldown
        {
            drop(disabled_at);
            stats.disabled.store(false, Ordering::Relaxed);
            stats.consecutive_failures.store(0, Ordering::Relaxed);
            info!(
                listener = entry.listener.name(),
                "listener circuit breaker reset after cooldown"
            );
            return false;
        }
        true
    }

    /// Run every listener against `event`, in order.
    ///
    /// Each listener works on a copy that replaces `event` only on success.
    /// The first cancellation stops the chain.
    pub fn fire(&self, event: &mut ChannelMessageEvent) {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if entries.is_empty() {
            return;
        }

        debug!(
            channel = event.channel().key(),
            count = entries.len(),
            "firing message listeners"
        );

        for entry in &entries {
            if self.check_circuit_breaker(entry) {
                continue;
            }

            let mut working = event.clone();
            let start = Instant::now();
            let result = entry.listener.on_message(&mut working);
            let latency = start.elapsed();
            let name = entry.listener.name();

            match result {
                Ok(()) => {
                    entry.stats.record_success(latency);
                    if self.dry_run {
                        log_dry_run(name, event, &working);
                        continue;
                    }
                    *event = working;
                    if event.is_cancelled() {
                        info!(
                            listener = name,
                            channel = event.channel().key(),
                            "listener cancelled message"
                        );
                        return;
                    }
                },
                Err(e) => {
                    entry.stats.record_failure(latency);
                    warn!(listener = name, error = %e, "message listener failed");
                    #[cfg(feature = "metrics")]
                    counter!(listener_metrics::FAILURES_TOTAL, labels::LISTENER => name.to_string())
                        .increment(1);
                },
            }
        }
    }
}

fn log_dry_run(name: &str, before: &ChannelMessageEvent, after: &ChannelMessageEvent) {
    if after.is_cancelled() {
        info!(listener = name, "listener cancel (dry-run, not applied)");
    }
    if after.message() != before.message() {
        info!(listener = name, message = after.message(), "listener rewrite (dry-run, not applied)");
    }
    let before_ids: Vec<&str> = before.recipients().iter().map(|r| r.id()).collect();
    let after_ids: Vec<&str> = after.recipients().iter().map(|r| r.id()).collect();
    if before_ids != after_ids {
        info!(
            listener = name,
            recipients = after_ids.len(),
            "listener recipient change (dry-run, not applied)"
        );
    }
}
