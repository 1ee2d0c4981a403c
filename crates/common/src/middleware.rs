//! Middleware contract and pipeline runner.
//!
//! Middlewares subscribe to one or more [`LifecyclePoint`]s. For a given point
//! the registry runs them in registration order; each receives the activity
//! and a [`Next`] continuation that it consumes to hand the (possibly
//! mutated) activity to the rest of the chain. Returning without running
//! `next` halts the chain, which the runner reports as [`Dispatch::Halted`].

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use {
    anyhow::Result,
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use botwire_metrics::{counter, labels, pipeline as pipeline_metrics};

use crate::activity::Activity;

// ── LifecyclePoint ──────────────────────────────────────────────────────────

/// Where in the activity lifecycle a middleware runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePoint {
    /// An activity arrived from a channel.
    Receive,
    /// An activity is about to be handed to a channel.
    Send,
}

impl LifecyclePoint {
    pub const ALL: &'static [LifecyclePoint] = &[Self::Receive, Self::Send];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Send => "send",
        }
    }
}

impl fmt::Display for LifecyclePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Middleware trait ────────────────────────────────────────────────────────

/// A pipeline stage that may inspect or mutate an activity.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// A human-readable name for this middleware.
    fn name(&self) -> &str;

    /// Lifecycle points this middleware is registered for.
    fn points(&self) -> &[LifecyclePoint];

    /// Handle the activity. Call `next.run(activity)` exactly once to
    /// continue the chain; returning without it halts the pipeline.
    async fn handle(
        &self,
        point: LifecyclePoint,
        activity: &mut Activity,
        next: Next<'_>,
    ) -> Result<()>;
}

// ── MiddlewareStats ─────────────────────────────────────────────────────────

/// Per-middleware counters.
///
/// Latency is inclusive: it covers the middleware and everything downstream
/// of it that ran before it returned.
pub struct MiddlewareStats {
    pub call_count: AtomicU64,
    pub failure_count: AtomicU64,
    pub halt_count: AtomicU64,
    pub total_latency_us: AtomicU64,
}

impl MiddlewareStats {
    pub fn new() -> Self {
        Self {
            call_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            halt_count: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
        }
    }

    fn record(&self, latency: Duration, outcome: Outcome) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        match outcome {
            Outcome::Passed => {},
            Outcome::Failed => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
            },
            Outcome::Halted => {
                self.halt_count.fetch_add(1, Ordering::Relaxed);
            },
        }
    }

    pub fn avg_latency(&self) -> Duration {
        let calls = self.call_count.load(Ordering::Relaxed);
        if calls == 0 {
            return Duration::ZERO;
        }
        let total = self.total_latency_us.load(Ordering::Relaxed);
        Duration::from_micros(total / calls)
    }
}

impl Default for MiddlewareStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Passed,
    Failed,
    Halted,
}

struct MiddlewareEntry {
    middleware: Arc<dyn Middleware>,
    stats: Arc<MiddlewareStats>,
}

// ── Next ────────────────────────────────────────────────────────────────────

const NOT_FAILED: usize = usize::MAX;

/// How far a single run got through its chain.
struct Progress {
    /// Index of the most recently entered middleware.
    deepest: AtomicUsize,
    /// Set once the terminal continuation runs.
    completed: AtomicBool,
    /// Index of the middleware whose own `handle` first returned an error.
    failed_at: AtomicUsize,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            deepest: AtomicUsize::new(0),
            completed: AtomicBool::new(false),
            failed_at: AtomicUsize::new(NOT_FAILED),
        }
    }
}

/// Single-use continuation handed to each middleware.
///
/// Consumed by [`Next::run`], so a middleware cannot continue twice.
pub struct Next<'a> {
    point: LifecyclePoint,
    chain: &'a [MiddlewareEntry],
    index: usize,
    progress: &'a Progress,
}

impl Next<'_> {
    /// Lifecycle point being run.
    pub fn point(&self) -> LifecyclePoint {
        self.point
    }

    /// Number of middlewares still to run after this continuation.
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }

    /// Pass `activity` to the rest of the chain.
    pub async fn run(self, activity: &mut Activity) -> Result<()> {
        let Some((entry, rest)) = self.chain.split_first() else {
            self.progress.completed.store(true, Ordering::Relaxed);
            return Ok(());
        };

        self.progress.deepest.store(self.index, Ordering::Relaxed);
        let next = Next {
            point: self.point,
            chain: rest,
            index: self.index + 1,
            progress: self.progress,
        };

        let start = Instant::now();
        let result = entry.middleware.handle(self.point, activity, next).await;
        let latency = start.elapsed();

        // An error passed outward keeps the index of the frame that raised it.
        if result.is_err() {
            let _ = self.progress.failed_at.compare_exchange(
                NOT_FAILED,
                self.index,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }

        // Halts are attributed to the innermost middleware only.
        let innermost = self.progress.deepest.load(Ordering::Relaxed) == self.index;
        let outcome = match &result {
            Err(_) if self.progress.failed_at.load(Ordering::Relaxed) == self.index => {
                Outcome::Failed
            },
            Ok(()) if innermost && !self.progress.completed.load(Ordering::Relaxed) => {
                Outcome::Halted
            },
            _ => Outcome::Passed,
        };
        entry.stats.record(latency, outcome);
        result
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────────

/// Result of running a lifecycle point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Every middleware continued; the activity may proceed.
    Completed,
    /// The named middleware returned without continuing.
    Halted { by: String },
}

impl Dispatch {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

// ── MiddlewareRegistry ──────────────────────────────────────────────────────

/// Ordered middleware chains, one per lifecycle point.
pub struct MiddlewareRegistry {
    chains: HashMap<LifecyclePoint, Vec<MiddlewareEntry>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self {
            chains: HashMap::new(),
        }
    }

    /// Append a middleware to the chain of every point it subscribes to.
    pub fn register(&mut self, middleware: Arc<dyn Middleware>) {
        let stats = Arc::new(MiddlewareStats::new());
        for &point in middleware.points() {
            self.chains.entry(point).or_default().push(MiddlewareEntry {
                middleware: Arc::clone(&middleware),
                stats: Arc::clone(&stats),
            });
        }
        info!(
            middleware = middleware.name(),
            points = ?middleware.points(),
            "middleware registered"
        );
    }

    /// Returns true if any middleware is registered for `point`.
    pub fn has_middleware(&self, point: LifecyclePoint) -> bool {
        self.chains.get(&point).is_some_and(|v| !v.is_empty())
    }

    /// Names of the middlewares for `point`, in run order.
    pub fn middleware_names(&self, point: LifecyclePoint) -> Vec<&str> {
        self.chains
            .get(&point)
            .map(|chain| chain.iter().map(|e| e.middleware.name()).collect())
            .unwrap_or_default()
    }

    /// Stats for a named middleware, shared across all of its points.
    pub fn stats(&self, name: &str) -> Option<Arc<MiddlewareStats>> {
        self.chains
            .values()
            .flatten()
            .find(|e| e.middleware.name() == name)
            .map(|e| Arc::clone(&e.stats))
    }

    /// Run the chain for `point` over `activity`.
    ///
    /// Later middlewares observe every mutation made by earlier ones. An
    /// error from any middleware stops the chain and is returned with the
    /// failing middleware named in its context.
    pub async fn run(&self, point: LifecyclePoint, activity: &mut Activity) -> Result<Dispatch> {
        let chain = self.chains.get(&point).map(Vec::as_slice).unwrap_or_default();
        debug!(point = %point, count = chain.len(), kind = %activity.kind, "running middleware chain");

        #[cfg(feature = "metrics")]
        counter!(pipeline_metrics::RUNS_TOTAL, labels::POINT => point.as_str()).increment(1);

        let progress = Progress::default();
        let next = Next {
            point,
            chain,
            index: 0,
            progress: &progress,
        };

        let name_at = |index: usize| {
            chain
                .get(index)
                .map(|e| e.middleware.name().to_string())
                .unwrap_or_default()
        };

        if let Err(e) = next.run(activity).await {
            let name = name_at(progress.failed_at.load(Ordering::Relaxed));
            warn!(middleware = %name, point = %point, error = %e, "middleware failed");
            #[cfg(feature = "metrics")]
            counter!(
                pipeline_metrics::MIDDLEWARE_ERRORS_TOTAL,
                labels::POINT => point.as_str(),
                labels::MIDDLEWARE => name.clone()
            )
            .increment(1);
            return Err(e.context(format!("middleware '{name}' failed during {point}")));
        }

        if progress.completed.load(Ordering::Relaxed) {
            return Ok(Dispatch::Completed);
        }

        let by = name_at(progress.deepest.load(Ordering::Relaxed));
        info!(middleware = %by, point = %point, "middleware halted the chain");
        #[cfg(feature = "metrics")]
        counter!(
            pipeline_metrics::HALTS_TOTAL,
            labels::POINT => point.as_str(),
            labels::MIDDLEWARE => by.clone()
        )
        .increment(1);
        Ok(Dispatch::Halted { by })
    }
}

impl Default for MiddlewareRegistry {
    fn default() -> Self {
        Self::new()
    }
}
