use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

/// Event from background run tasks to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A run completed; the program's buffer already holds all of its output
    Finished {
        program_index: usize,
        succeeded: bool,
        summary: String,
    },
    /// New lines landed in the program's buffer since the last pulse
    MoreOutput { program_index: usize },
}

impl AppEvent {
    /// Index of the program the event is about
    pub fn program_index(&self) -> usize {
        match self {
            AppEvent::Finished { program_index, .. } | AppEvent::MoreOutput { program_index } => {
                *program_index
            }
        }
    }
}

/// Outbound channel handed to every run at spawn time
///
/// Sending must never block the run's tasks.
pub trait EventSink: Send + Sync + 'static {
    fn send(&self, event: AppEvent);
}

/// Shared handle to an event sink
pub type SharedSink = Arc<dyn EventSink>;

impl EventSink for mpsc::UnboundedSender<AppEvent> {
    fn send(&self, event: AppEvent) {
        // The receiver is gone once the UI has shut down; nothing left to notify.
        if let Err(err) = mpsc::UnboundedSender::send(self, event) {
            debug!(program = err.0.program_index(), "event receiver closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_sender_delivers_events_through_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
        let sink: SharedSink = Arc::new(tx);

        sink.send(AppEvent::MoreOutput { program_index: 2 });

        assert_eq!(
            rx.try_recv().unwrap(),
            AppEvent::MoreOutput { program_index: 2 }
        );
    }

    #[test]
    fn sink_send_after_receiver_dropped_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel::<AppEvent>();
        drop(rx);
        let sink: SharedSink = Arc::new(tx);

        sink.send(AppEvent::Finished {
            program_index: 0,
            succeeded: true,
            summary: "done".into(),
        });
    }
}
