mod debounce;
mod runner;
mod supervisor;

pub use debounce::{DEFAULT_DEBOUNCE_INTERVAL, DebounceHandle, Debouncer, OutputCounter};
pub use runner::{CommandHandle, CommandRunner, RunRequest, StopHandle, split_command};
pub use supervisor::{RunSettings, StopMode, Supervisor};
