use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::command::debounce::DEFAULT_DEBOUNCE_INTERVAL;
use crate::command::runner::{CommandRunner, RunRequest};
use crate::event::{AppEvent, SharedSink};
use crate::program::ProgramState;

/// What stopping a running program does to its child process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopMode {
    /// Only flip the running flag; the child runs to completion in the background
    #[default]
    Detach,
    /// Send SIGTERM to the child while the run still owns it
    Kill,
}

/// Settings shared by every run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub debounce_interval: Duration,
    pub stop_mode: StopMode,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            debounce_interval: DEFAULT_DEBOUNCE_INTERVAL,
            stop_mode: StopMode::Detach,
        }
    }
}

/// Starts and stops runs, reporting to an injected event sink
pub struct Supervisor {
    sink: SharedSink,
    settings: RunSettings,
}

impl Supervisor {
    pub fn new(sink: SharedSink, settings: RunSettings) -> Self {
        Self { sink, settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Start the program if it is stopped, or stop it if it is running
    ///
    /// Never blocks: starting spawns the run's tasks and returns, stopping
    /// only flips the flag (and signals the child in [`StopMode::Kill`]).
    /// Returns a message describing what happened.
    pub fn toggle(&self, state: &mut ProgramState) -> String {
        if state.is_running() {
            return self.stop(state);
        }

        if state.is_in_flight() {
            let message = format!("Program {} is still shutting down", state.command());
            info!(program = state.index(), "start ignored, previous run still live");
            return message;
        }

        self.start(state)
    }

    fn stop(&self, state: &mut ProgramState) -> String {
        state.mark_stopping();
        if self.settings.stop_mode == StopMode::Kill
            && let Some(stop) = state.take_stop()
            && !stop.terminate()
        {
            debug!(program = state.index(), "child already exited, output still draining");
        }

        let message = format!("Stopping program {}", state.command());
        info!(program = state.index(), mode = ?self.settings.stop_mode, "stop requested");
        state.set_message(message.clone());
        message
    }

    fn start(&self, state: &mut ProgramState) -> String {
        let request = RunRequest {
            program_index: state.index(),
            command: state.command().to_string(),
            buffer: Arc::clone(state.buffer()),
            sink: Arc::clone(&self.sink),
            debounce_interval: self.settings.debounce_interval,
        };

        match CommandRunner::spawn(request) {
            Ok(mut handle) => {
                let stop = handle.take_stop();
                state.mark_started(handle.pid(), stop);
                let message = format!("Starting program {}", state.command());
                state.set_message(message.clone());
                message
            }
            Err(err) => {
                error!(program = state.index(), error = %err, "could not start program");
                let summary = format!("Program {} failed: {}", state.index(), err);
                state.record_finished(false, summary.clone());
                self.sink.send(AppEvent::Finished {
                    program_index: state.index(),
                    succeeded: false,
                    summary: summary.clone(),
                });
                summary
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramStatus;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn supervisor(stop_mode: StopMode) -> (Supervisor, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel::<AppEvent>();
        let settings = RunSettings {
            debounce_interval: Duration::from_millis(20),
            stop_mode,
        };
        (Supervisor::new(Arc::new(tx), settings), rx)
    }

    async fn next_finished(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> AppEvent {
        loop {
            let event = timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for Finished")
                .expect("sink closed");
            if matches!(event, AppEvent::Finished { .. }) {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn supervisor_toggle_starts_stopped_program() {
        let (supervisor, mut rx) = supervisor(StopMode::Detach);
        let mut state = ProgramState::new(0, "echo hello", 10).unwrap();

        let message = supervisor.toggle(&mut state);

        assert_eq!(message, "Starting program echo hello");
        assert!(state.is_running());
        assert!(state.has_run());
        assert!(state.pid().is_some());

        let event = next_finished(&mut rx).await;
        assert_eq!(
            event,
            AppEvent::Finished {
                program_index: 0,
                succeeded: true,
                summary: "Program 0 finished successfully.".into(),
            }
        );
    }

    #[tokio::test]
    async fn supervisor_toggle_reports_spawn_failure_immediately() {
        let (supervisor, mut rx) = supervisor(StopMode::Detach);
        let mut state = ProgramState::new(2, "/nonexistent/program --flag", 10).unwrap();

        let message = supervisor.toggle(&mut state);

        assert!(message.starts_with("Program 2 failed: "), "{message}");
        assert!(!state.is_running());
        assert_eq!(state.status(), ProgramStatus::Failed);
        match rx.try_recv().unwrap() {
            AppEvent::Finished {
                program_index,
                succeeded,
                ..
            } => {
                assert_eq!(program_index, 2);
                assert!(!succeeded);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn supervisor_toggle_twice_stops_without_second_child() {
        let (supervisor, mut rx) = supervisor(StopMode::Detach);
        let mut state = ProgramState::new(0, "sleep 1", 10).unwrap();

        supervisor.toggle(&mut state);
        let pid = state.pid();
        let message = supervisor.toggle(&mut state);

        assert_eq!(message, "Stopping program sleep 1");
        assert!(!state.is_running());
        assert_eq!(state.status(), ProgramStatus::Stopping);
        assert_eq!(state.pid(), pid);

        // A third toggle must not spawn while the first child is alive.
        let message = supervisor.toggle(&mut state);
        assert_eq!(message, "Program sleep 1 is still shutting down");
        assert_eq!(state.pid(), pid);

        // Detached child runs to completion and still reports.
        let event = next_finished(&mut rx).await;
        assert!(matches!(event, AppEvent::Finished { succeeded: true, .. }));
    }

    #[tokio::test]
    async fn supervisor_kill_mode_terminates_child() {
        let (supervisor, mut rx) = supervisor(StopMode::Kill);
        let mut state = ProgramState::new(1, "sleep 30", 10).unwrap();

        supervisor.toggle(&mut state);
        supervisor.toggle(&mut state);

        let event = next_finished(&mut rx).await;
        match event {
            AppEvent::Finished {
                program_index,
                succeeded,
                summary,
            } => {
                assert_eq!(program_index, 1);
                assert!(!succeeded);
                assert!(summary.contains("signal"), "{summary}");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn supervisor_kill_mode_leaves_exited_child_alone_while_draining() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("background.sh");
        std::fs::write(&script, "sleep 2 &\nexit 0\n").unwrap();
        let (supervisor, mut rx) = supervisor(StopMode::Kill);
        let command = format!("sh {}", script.display());
        let mut state = ProgramState::new(0, command.as_str(), 10).unwrap();

        supervisor.toggle(&mut state);
        // The shell has exited but its background job still holds the pipes.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(state.is_running());

        supervisor.toggle(&mut state);
        assert_eq!(state.status(), ProgramStatus::Stopping);
        assert!(state.take_stop().is_none());

        let event = next_finished(&mut rx).await;
        assert_eq!(
            event,
            AppEvent::Finished {
                program_index: 0,
                succeeded: true,
                summary: "Program 0 finished successfully.".into(),
            }
        );
    }

    #[tokio::test]
    async fn supervisor_restarts_after_finished_is_applied() {
        let (supervisor, mut rx) = supervisor(StopMode::Detach);
        let mut state = ProgramState::new(0, "echo again", 10).unwrap();

        for _ in 0..2 {
            supervisor.toggle(&mut state);
            if let AppEvent::Finished {
                succeeded, summary, ..
            } = next_finished(&mut rx).await
            {
                state.record_finished(succeeded, summary);
            }
            assert_eq!(state.status(), ProgramStatus::Succeeded);
            assert_eq!(state.snapshot().len(), 1);
        }
    }
}
