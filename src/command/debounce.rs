use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::event::{AppEvent, SharedSink};

/// Default interval between "more output" pulses
pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(100);

/// Monotonic count of lines written during one run
#[derive(Debug, Clone, Default)]
pub struct OutputCounter(Arc<AtomicU64>);

impl OutputCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more line
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Coalesces bursts of output into at most one `MoreOutput` per interval
pub struct Debouncer;

/// Handle to an armed debouncer
pub struct DebounceHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<usize>,
}

impl Debouncer {
    /// Arm a debouncer for one run of program `program_index`
    ///
    /// Every tick compares the counter with the value seen at the previous
    /// tick and sends a single pulse if it grew.
    pub fn spawn(
        program_index: usize,
        counter: OutputCounter,
        sink: SharedSink,
        interval: Duration,
    ) -> DebounceHandle {
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(run(program_index, counter, sink, interval, stopped));
        DebounceHandle { stop, task }
    }
}

impl DebounceHandle {
    /// Stop ticking and send the final unconditional pulse
    ///
    /// Returns the number of pulses sent over the debouncer's lifetime.
    pub async fn finish(self) -> usize {
        // The task also flushes if it sees the sender dropped.
        let _ = self.stop.send(());
        match self.task.await {
            Ok(pulses) => pulses,
            Err(err) => {
                warn!(error = %err, "debouncer task did not complete");
                0
            }
        }
    }
}

async fn run(
    program_index: usize,
    counter: OutputCounter,
    sink: SharedSink,
    interval: Duration,
    mut stopped: oneshot::Receiver<()>,
) -> usize {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Counters are created fresh for each run.
    let mut seen = 0;
    let mut pulses = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = counter.get();
                if current > seen {
                    seen = current;
                    sink.send(AppEvent::MoreOutput { program_index });
                    pulses += 1;
                }
            }
            _ = &mut stopped => break,
        }
    }

    sink.send(AppEvent::MoreOutput { program_index });
    pulses += 1;
    debug!(program = program_index, pulses, "debouncer stopped");
    pulses
}
