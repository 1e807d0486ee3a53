use super::RingBuffer;

/// Stream a line was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Stdout,
    Stderr,
}

/// One captured line of output tagged with its origin stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    /// Output type
    pub kind: OutputKind,
    /// Line text without the trailing newline
    pub content: String,
}

impl OutputLine {
    /// Create a new OutputLine
    pub fn new(kind: OutputKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Create an error line, reported on the stderr side
    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::new(OutputKind::Stderr, format!("[error] {}", message))
    }

    /// Check if the line came from stderr
    pub fn is_stderr(&self) -> bool {
        self.kind == OutputKind::Stderr
    }
}

/// Per-program history of captured lines
pub type OutputBuffer = RingBuffer<OutputLine>;
