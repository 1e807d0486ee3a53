use std::path::Path;
use std::sync::Arc;

use crate::buffer::{OutputBuffer, OutputKind, OutputLine};
use crate::command::StopHandle;
use crate::error::Result;

/// Lifecycle status shown in the program list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStatus {
    /// Never started, or last run succeeded and nothing is running
    Idle,
    /// A run is live and the user wants it running
    Running,
    /// Stop was requested but the child has not been reported finished yet
    Stopping,
    /// Last run ended with success
    Succeeded,
    /// Last run failed to start or exited unsuccessfully
    Failed,
}

impl ProgramStatus {
    /// Short label for the "Running?" column
    pub fn label(self) -> &'static str {
        match self {
            ProgramStatus::Idle | ProgramStatus::Succeeded => " ",
            ProgramStatus::Running => "Y",
            ProgramStatus::Stopping => "Stopping",
            ProgramStatus::Failed => "Error!",
        }
    }
}

/// State of one configured program, reused across start/stop cycles
pub struct ProgramState {
    index: usize,
    command: String,
    running: bool,
    ran: bool,
    succeeded: bool,
    message: String,
    buffer: Arc<OutputBuffer>,
    /// Set from spawn until the run's Finished event is applied.
    in_flight: bool,
    pid: Option<u32>,
    stop: Option<StopHandle>,
}

impl ProgramState {
    /// Create the state for program `index` with a buffer of `buffer_lines`
    pub fn new(index: usize, command: impl Into<String>, buffer_lines: usize) -> Result<Self> {
        Ok(Self {
            index,
            command: command.into(),
            running: false,
            ran: false,
            succeeded: false,
            message: String::new(),
            buffer: Arc::new(OutputBuffer::new(buffer_lines)?),
            in_flight: false,
            pid: None,
            stop: None,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw command line: program path followed by whitespace separated arguments
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_run(&self) -> bool {
        self.ran
    }

    pub fn last_run_succeeded(&self) -> bool {
        self.succeeded
    }

    /// Final status message of the last run, or the last toggle message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if a child process from a previous start may still be alive
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Process ID of the live child, if any
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Shared handle to the output history
    pub fn buffer(&self) -> &Arc<OutputBuffer> {
        &self.buffer
    }

    /// Current output lines, oldest first
    pub fn snapshot(&self) -> Vec<OutputLine> {
        self.buffer.snapshot()
    }

    /// Current output lines of one stream, oldest first
    pub fn snapshot_stream(&self, kind: OutputKind) -> Vec<OutputLine> {
        self.buffer
            .snapshot()
            .into_iter()
            .filter(|line| line.kind == kind)
            .collect()
    }

    pub fn status(&self) -> ProgramStatus {
        if self.running {
            ProgramStatus::Running
        } else if self.in_flight {
            ProgramStatus::Stopping
        } else if self.ran && !self.succeeded {
            ProgramStatus::Failed
        } else if self.ran {
            ProgramStatus::Succeeded
        } else {
            ProgramStatus::Idle
        }
    }

    /// Command with an absolute program path shortened to its file name
    pub fn display_command(&self) -> String {
        let mut parts = self.command.split_whitespace();
        let Some(program) = parts.next() else {
            return String::new();
        };
        let program = if program.starts_with('/') {
            Path::new(program)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(program)
        } else {
            program
        };
        std::iter::once(program)
            .chain(parts)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn mark_started(&mut self, pid: Option<u32>, stop: Option<StopHandle>) {
        self.running = true;
        self.ran = true;
        self.in_flight = true;
        self.pid = pid;
        self.stop = stop;
    }

    /// Take the handle that terminates the live child, if not used yet
    pub(crate) fn take_stop(&mut self) -> Option<StopHandle> {
        self.stop.take()
    }

    pub(crate) fn mark_stopping(&mut self) {
        self.running = false;
    }

    pub(crate) fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Apply the outcome carried by a Finished event
    pub fn record_finished(&mut self, succeeded: bool, summary: impl Into<String>) {
        self.running = false;
        self.ran = true;
        self.succeeded = succeeded;
        self.in_flight = false;
        self.pid = None;
        self.stop = None;
        self.message = summary.into();
    }
}
