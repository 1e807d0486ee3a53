use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::buffer::{OutputBuffer, OutputKind, OutputLine};
use crate::command::debounce::{DebounceHandle, Debouncer, OutputCounter};
use crate::event::{AppEvent, SharedSink};

/// Lines in flight between a stream reader and the merge task
const RELAY_CAPACITY: usize = 1;

/// Split a command line into program and arguments on whitespace
///
/// There is no quoting: an argument can't contain spaces.
pub fn split_command(command: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Send SIGTERM to a child that has not been reaped yet
///
/// `Child::id` is `None` once the child has been waited on, so a reaped
/// (and possibly reused) PID is never signalled.
fn terminate(child: &Child) -> nix::Result<()> {
    let Some(pid) = child.id() else {
        return Err(nix::errno::Errno::ESRCH);
    };
    let pid = i32::try_from(pid).map_err(|_| nix::errno::Errno::ESRCH)?;
    signal::kill(Pid::from_raw(pid), Signal::SIGTERM)
}

/// Everything one run needs from its program
pub struct RunRequest {
    pub program_index: usize,
    pub command: String,
    pub buffer: Arc<OutputBuffer>,
    pub sink: SharedSink,
    pub debounce_interval: Duration,
}

/// Asks a run to terminate its child
///
/// The run signals the child it still owns, so nothing is sent once the
/// child has exited.
#[derive(Debug)]
pub struct StopHandle(oneshot::Sender<()>);

impl StopHandle {
    /// Request SIGTERM for the child
    ///
    /// Returns false when the child had already exited.
    pub fn terminate(self) -> bool {
        self.0.send(()).is_ok()
    }
}

/// Handle for a started run
///
/// Dropping it detaches the run; the run keeps capturing and still reports
/// its Finished event.
pub struct CommandHandle {
    pid: Option<u32>,
    stop: Option<StopHandle>,
    waiter: JoinHandle<()>,
}

impl CommandHandle {
    /// Get the process ID
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Take the stop handle, leaving the run detached from this handle
    pub fn take_stop(&mut self) -> Option<StopHandle> {
        self.stop.take()
    }

    /// Request SIGTERM for the child; false if it had already exited
    pub fn terminate(&mut self) -> bool {
        self.stop.take().is_some_and(StopHandle::terminate)
    }

    /// Wait until the run's Finished event has been sent
    pub async fn join(self) {
        if let Err(err) = self.waiter.await {
            warn!(error = %err, "run waiter did not complete");
        }
    }
}

/// Spawns programs and the tasks that capture their output
pub struct CommandRunner;

impl CommandRunner {
    /// Spawn the program and its capture tasks
    ///
    /// On success the run owns: one reader per stream, the merge task that
    /// is the only writer into the buffer, a debouncer, and a waiter that
    /// joins them all before sending exactly one `Finished` event. The
    /// caller reports spawn errors itself.
    pub fn spawn(request: RunRequest) -> std::io::Result<CommandHandle> {
        let RunRequest {
            program_index,
            command,
            buffer,
            sink,
            debounce_interval,
        } = request;

        let Some((program, args)) = split_command(&command) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command",
            ));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        info!(program = program_index, pid, command = %command, "spawned program");

        buffer.clear();
        let counter = OutputCounter::new();
        let debouncer = Debouncer::spawn(
            program_index,
            counter.clone(),
            Arc::clone(&sink),
            debounce_interval,
        );

        let mut readers = Vec::with_capacity(2);
        let stdout = match child.stdout.take() {
            Some(stream) => {
                let (task, relay) = spawn_reader(program_index, OutputKind::Stdout, stream);
                readers.push(task);
                Some(relay)
            }
            None => {
                report_pipe_failure(program_index, OutputKind::Stdout, &buffer, &counter);
                None
            }
        };
        let stderr = match child.stderr.take() {
            Some(stream) => {
                let (task, relay) = spawn_reader(program_index, OutputKind::Stderr, stream);
                readers.push(task);
                Some(relay)
            }
            None => {
                report_pipe_failure(program_index, OutputKind::Stderr, &buffer, &counter);
                None
            }
        };

        let merge = tokio::spawn(merge(program_index, stdout, stderr, buffer, counter));

        let (stop, stop_requested) = oneshot::channel();
        let waiter = tokio::spawn(wait(
            program_index,
            child,
            stop_requested,
            RunTasks {
                readers,
                merge,
                debouncer,
            },
            sink,
        ));

        Ok(CommandHandle {
            pid,
            stop: Some(StopHandle(stop)),
            waiter,
        })
    }
}

/// Tasks the waiter joins before reporting
struct RunTasks {
    readers: Vec<JoinHandle<()>>,
    merge: JoinHandle<u64>,
    debouncer: DebounceHandle,
}

impl RunTasks {
    /// Join barrier: returns once every line has reached the buffer
    async fn drain(self, program_index: usize) {
        for reader in self.readers {
            if let Err(err) = reader.await {
                warn!(program = program_index, error = %err, "stream reader failed");
            }
        }
        match self.merge.await {
            Ok(lines) => debug!(program = program_index, lines, "output drained"),
            Err(err) => warn!(program = program_index, error = %err, "merge task failed"),
        }
        self.debouncer.finish().await;
    }
}

async fn wait(
    program_index: usize,
    mut child: Child,
    mut stop_requested: oneshot::Receiver<()>,
    tasks: RunTasks,
    sink: SharedSink,
) {
    // A dropped stop handle disables the stop branch.
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = &mut stop_requested => {
            match terminate(&child) {
                Ok(()) => info!(program = program_index, "sent SIGTERM"),
                Err(err) => warn!(program = program_index, error = %err, "could not signal program"),
            }
            child.wait().await
        }
    };
    // The child is reaped; later stop requests must find the channel closed.
    drop(stop_requested);
    tasks.drain(program_index).await;

    let (succeeded, summary) = summarize(program_index, &status);
    match &status {
        Ok(status) => info!(
            program = program_index,
            exit_code = status.code(),
            success = succeeded,
            "program exited"
        ),
        Err(err) => error!(program = program_index, error = %err, "waiting for program failed"),
    }

    sink.send(AppEvent::Finished {
        program_index,
        succeeded,
        summary,
    });
}

fn summarize(program_index: usize, status: &std::io::Result<ExitStatus>) -> (bool, String) {
    match status {
        Ok(status) if status.success() => (
            true,
            format!("Program {} finished successfully.", program_index),
        ),
        Ok(status) => (false, format!("Program {} failed: {}", program_index, status)),
        Err(err) => (false, format!("Program {} failed: {}", program_index, err)),
    }
}

fn report_pipe_failure(
    program_index: usize,
    kind: OutputKind,
    buffer: &OutputBuffer,
    counter: &OutputCounter,
) {
    warn!(program = program_index, stream = ?kind, "could not attach to output stream");
    buffer.append(OutputLine::error(format!("could not attach to {:?}", kind)));
    counter.bump();
}

/// Read `stream` line by line into a relay queue until end of stream
///
/// A read error is treated as end of stream. Dropping the relay sender is
/// the completion signal.
fn spawn_reader<R>(
    program_index: usize,
    kind: OutputKind,
    stream: R,
) -> (JoinHandle<()>, mpsc::Receiver<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (relay, lines) = mpsc::channel(RELAY_CAPACITY);
    let task = tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {
                    if relay.send(decode_line(&raw)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(program = program_index, stream = ?kind, error = %err, "read failed, closing stream");
                    break;
                }
            }
        }
        debug!(program = program_index, stream = ?kind, "stream closed");
    });
    (task, lines)
}

/// Strip the line terminator and replace invalid UTF-8
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Single writer into the buffer
///
/// Takes whichever relay is ready first and exits only after both relays
/// are closed and empty.
async fn merge(
    program_index: usize,
    mut stdout: Option<mpsc::Receiver<String>>,
    mut stderr: Option<mpsc::Receiver<String>>,
    buffer: Arc<OutputBuffer>,
    counter: OutputCounter,
) -> u64 {
    let mut written = 0;
    while stdout.is_some() || stderr.is_some() {
        let (kind, line) = tokio::select! {
            line = next_relayed(&mut stdout) => (OutputKind::Stdout, line),
            line = next_relayed(&mut stderr) => (OutputKind::Stderr, line),
        };
        match line {
            Some(content) => {
                buffer.append(OutputLine::new(kind, content));
                counter.bump();
                written += 1;
            }
            None if kind == OutputKind::Stdout => stdout = None,
            None => stderr = None,
        }
    }
    debug!(program = program_index, written, "merge finished");
    written
}

async fn next_relayed(relay: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match relay {
        Some(lines) => lines.recv().await,
        None => std::future::pending().await,
    }
}
