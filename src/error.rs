use thiserror::Error;

/// Errors surfaced by runboard
///
/// Failures that belong to a single run (spawn errors, non-zero exits, wait
/// errors) are not represented here; they travel as `AppEvent::Finished`.
#[derive(Error, Debug)]
pub enum RunboardError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("buffer capacity must be greater than zero")]
    ZeroCapacity,

    #[error("program {index} has an empty command")]
    EmptyCommand { index: usize },

    #[error("at least one program is required")]
    NoPrograms,

    #[error("no program with index {0}")]
    UnknownProgram(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RunboardError>;
