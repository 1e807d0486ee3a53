use tracing::{info, warn};

use crate::command::Supervisor;
use crate::config::Config;
use crate::error::{Result, RunboardError};
use crate::event::{AppEvent, SharedSink};
use crate::program::ProgramState;
use crate::tui::OutputView;

/// Which pane receives navigation keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Program list
    List,
    /// Output of the selected program
    Output,
}

/// Application state
pub struct App {
    name: Option<String>,
    programs: Vec<ProgramState>,
    views: Vec<OutputView>,
    supervisor: Supervisor,
    selected: usize,
    focus: Focus,
    status_line: String,
    should_quit: bool,
}

impl App {
    /// Initialize the application
    ///
    /// There is always a selected program, so the list must not be empty.
    pub fn new(programs: Vec<ProgramState>, supervisor: Supervisor) -> Result<Self> {
        if programs.is_empty() {
            return Err(RunboardError::NoPrograms);
        }
        let views = programs.iter().map(|_| OutputView::new()).collect();
        Ok(Self {
            name: None,
            programs,
            views,
            supervisor,
            selected: 0,
            focus: Focus::List,
            status_line: String::new(),
            should_quit: false,
        })
    }

    /// Build the program states for a validated configuration
    pub fn from_config(config: &Config, sink: SharedSink) -> Result<Self> {
        let programs = config
            .programs
            .iter()
            .enumerate()
            .map(|(index, program)| ProgramState::new(index, program.command.clone(), program.buffer_lines))
            .collect::<Result<Vec<_>>>()?;
        let mut app = Self::new(programs, Supervisor::new(sink, config.settings))?;
        app.name = config.name.clone();
        Ok(app)
    }

    /// Start program `index` if stopped, stop it if running
    pub fn start_or_stop(&mut self, index: usize) -> Result<String> {
        let state = self
            .programs
            .get_mut(index)
            .ok_or(RunboardError::UnknownProgram(index))?;

        let message = self.supervisor.toggle(state);
        if state.is_running() {
            self.views[index].reset();
        }
        self.status_line = message.clone();
        Ok(message)
    }

    /// Toggle the selected program
    pub fn toggle_selected(&mut self) {
        if let Err(err) = self.start_or_stop(self.selected) {
            warn!(error = %err, "toggle failed");
        }
    }

    /// Apply an event from a run
    pub fn handle_event(&mut self, event: AppEvent) {
        let index = event.program_index();
        let Some(state) = self.programs.get_mut(index) else {
            warn!(program = index, "event for unknown program");
            return;
        };

        match event {
            AppEvent::MoreOutput { .. } => {}
            AppEvent::Finished {
                succeeded, summary, ..
            } => {
                state.record_finished(succeeded, summary.clone());
                self.status_line = summary;
            }
        }
        self.views[index].set_line_count(state.buffer().len());
    }

    /// Ask every run whose child may still be alive to terminate it
    ///
    /// Returns how many children were signalled.
    pub fn shutdown(&mut self) -> usize {
        let mut signalled = 0;
        for state in self.programs.iter_mut().filter(|state| state.is_in_flight()) {
            let Some(stop) = state.take_stop() else {
                continue;
            };
            if stop.terminate() {
                info!(program = state.index(), pid = state.pid(), "terminating on shutdown");
                signalled += 1;
            }
        }
        signalled
    }

    /// Check if the application should quit
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Set the quit flag
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Configuration name shown in the header
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Message of the last toggle or finished run
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn programs(&self) -> &[ProgramState] {
        &self.programs
    }

    pub fn program(&self, index: usize) -> Option<&ProgramState> {
        self.programs.get(index)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_program(&self) -> &ProgramState {
        &self.programs[self.selected]
    }

    /// Select program `index` if it exists
    pub fn select(&mut self, index: usize) {
        if index < self.programs.len() {
            self.selected = index;
        }
    }

    /// Select the next program (wrapping)
    pub fn select_next(&mut self) {
        if !self.programs.is_empty() {
            self.selected = (self.selected + 1) % self.programs.len();
        }
    }

    /// Select the previous program (wrapping)
    pub fn select_prev(&mut self) {
        if !self.programs.is_empty() {
            self.selected = if self.selected == 0 {
                self.programs.len() - 1
            } else {
                self.selected - 1
            };
        }
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::List => Focus::Output,
            Focus::Output => Focus::List,
        };
    }

    /// Scroll state of the selected program
    pub fn current_view(&self) -> &OutputView {
        &self.views[self.selected]
    }

    pub fn current_view_mut(&mut self) -> &mut OutputView {
        &mut self.views[self.selected]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RunSettings;
    use crate::program::ProgramStatus;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn app_with(commands: &[&str]) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel::<AppEvent>();
        let programs = commands
            .iter()
            .enumerate()
            .map(|(i, cmd)| ProgramState::new(i, *cmd, 100).unwrap())
            .collect();
        let settings = RunSettings {
            debounce_interval: Duration::from_millis(20),
            ..RunSettings::default()
        };
        (App::new(programs, Supervisor::new(Arc::new(tx), settings)).unwrap(), rx)
    }

    async fn run_until_finished(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppEvent>, count: usize) {
        let mut finished = 0;
        while finished < count {
            let event = timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for events")
                .expect("sink closed");
            if matches!(event, AppEvent::Finished { .. }) {
                finished += 1;
            }
            app.handle_event(event);
        }
    }

    #[test]
    fn app_new_initializes_correctly() {
        let (app, _rx) = app_with(&["cmd1", "cmd2"]);

        assert_eq!(app.programs().len(), 2);
        assert_eq!(app.focus(), Focus::List);
        assert_eq!(app.selected_index(), 0);
        assert!(!app.should_quit());
    }

    #[test]
    fn app_new_rejects_empty_program_list() {
        let (tx, _rx) = mpsc::unbounded_channel::<AppEvent>();
        let supervisor = Supervisor::new(Arc::new(tx), RunSettings::default());

        assert!(matches!(
            App::new(Vec::new(), supervisor),
            Err(RunboardError::NoPrograms)
        ));
    }

    #[test]
    fn app_selection_wraps() {
        let (mut app, _rx) = app_with(&["a", "b", "c"]);

        app.select_prev();
        assert_eq!(app.selected_index(), 2);
        app.select_next();
        assert_eq!(app.selected_index(), 0);

        app.select(7);
        assert_eq!(app.selected_index(), 0);
        app.select(1);
        assert_eq!(app.selected_program().command(), "b");
    }

    #[test]
    fn app_quit_sets_flag() {
        let (mut app, _rx) = app_with(&["cmd"]);
        app.quit();
        assert!(app.should_quit());
    }

    #[test]
    fn app_toggle_focus_alternates() {
        let (mut app, _rx) = app_with(&["cmd"]);
        app.toggle_focus();
        assert_eq!(app.focus(), Focus::Output);
        app.toggle_focus();
        assert_eq!(app.focus(), Focus::List);
    }

    #[test]
    fn app_start_or_stop_rejects_unknown_program() {
        let (mut app, _rx) = app_with(&["cmd"]);
        assert!(matches!(
            app.start_or_stop(3),
            Err(RunboardError::UnknownProgram(3))
        ));
    }

    #[test]
    fn app_handle_event_ignores_unknown_program() {
        let (mut app, _rx) = app_with(&["cmd"]);
        app.handle_event(AppEvent::MoreOutput { program_index: 9 });
        assert_eq!(app.programs()[0].status(), ProgramStatus::Idle);
    }

    #[tokio::test]
    async fn app_finished_event_updates_program_and_view() {
        let (mut app, mut rx) = app_with(&["seq 1 3"]);

        let message = app.start_or_stop(0).unwrap();
        assert_eq!(message, "Starting program seq 1 3");
        assert_eq!(app.status_line(), message);

        run_until_finished(&mut app, &mut rx, 1).await;

        let program = app.program(0).unwrap();
        assert_eq!(program.status(), ProgramStatus::Succeeded);
        assert_eq!(program.message(), "Program 0 finished successfully.");
        assert_eq!(app.current_view().line_count(), 3);
        assert_eq!(app.status_line(), "Program 0 finished successfully.");
    }

    #[tokio::test]
    async fn app_failed_program_shows_error_without_affecting_others() {
        let (mut app, mut rx) = app_with(&["/nonexistent/runboard", "echo ok"]);

        app.start_or_stop(0).unwrap();
        app.start_or_stop(1).unwrap();
        run_until_finished(&mut app, &mut rx, 2).await;

        assert_eq!(app.programs()[0].status(), ProgramStatus::Failed);
        assert_eq!(app.programs()[0].status().label(), "Error!");
        assert_eq!(app.programs()[1].status(), ProgramStatus::Succeeded);
        assert_eq!(app.programs()[1].snapshot()[0].content, "ok");
    }

    #[tokio::test]
    async fn app_shutdown_terminates_running_children() {
        let (mut app, mut rx) = app_with(&["sleep 30"]);

        app.start_or_stop(0).unwrap();
        assert_eq!(app.shutdown(), 1);
        run_until_finished(&mut app, &mut rx, 1).await;

        assert_eq!(app.programs()[0].status(), ProgramStatus::Failed);
        assert_eq!(app.shutdown(), 0);
    }

    #[tokio::test]
    async fn app_shutdown_terminates_detached_children() {
        let (mut app, mut rx) = app_with(&["sleep 30"]);

        app.start_or_stop(0).unwrap();
        app.start_or_stop(0).unwrap();
        assert_eq!(app.programs()[0].status(), ProgramStatus::Stopping);

        assert_eq!(app.shutdown(), 1);
        run_until_finished(&mut app, &mut rx, 1).await;
        assert!(app.programs()[0].message().contains("signal"));
    }

    #[tokio::test]
    async fn app_shutdown_skips_children_that_already_exited() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("background.sh");
        std::fs::write(&script, "sleep 2 &\nexit 0\n").unwrap();
        let command = format!("sh {}", script.display());
        let (mut app, mut rx) = app_with(&[command.as_str()]);

        app.start_or_stop(0).unwrap();
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert_eq!(app.shutdown(), 0);
        run_until_finished(&mut app, &mut rx, 1).await;
        assert_eq!(app.programs()[0].status(), ProgramStatus::Succeeded);
    }
}
