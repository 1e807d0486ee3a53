//! Terminal dashboard that starts, stops and watches a fleet of programs.
//!
//! Each program's stdout and stderr are captured into a bounded
//! [`buffer::OutputBuffer`]; runs report back through an injected
//! [`event::EventSink`] with rate-limited `MoreOutput` pulses and exactly one
//! `Finished` event, sent only after all output has reached the buffer.

pub mod app;
pub mod buffer;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod program;
pub mod tui;
