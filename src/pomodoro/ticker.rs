use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, interval_at};

/// Owned handle to the one-second countdown.
///
/// Every `start()` hands out a new generation number; ticks are delivered
/// tagged with it so the session can discard ticks from a cancelled countdown
/// that were already queued.
pub trait Ticker: Send {
    fn start(&mut self) -> u64;
    fn cancel(&mut self);
}

pub type TickSink = Arc<dyn Fn(u64) + Send + Sync>;

pub struct IntervalTicker {
    runtime: Handle,
    period: Duration,
    sink: TickSink,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl IntervalTicker {
    pub fn new(runtime: Handle, period: Duration, sink: TickSink) -> Self {
        Self {
            runtime,
            period,
            sink,
            generation: 0,
            task: None,
        }
    }
}

impl Ticker for IntervalTicker {
    fn start(&mut self) -> u64 {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let period = self.period;
        let sink = Arc::clone(&self.sink);
        self.task = Some(self.runtime.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                sink(generation);
            }
        }));
        tracing::trace!(generation, "countdown scheduled");
        generation
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::trace!(generation = self.generation, "countdown cancelled");
        }
    }
}

impl Drop for IntervalTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}
