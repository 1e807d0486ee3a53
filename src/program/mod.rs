mod state;

pub use state::{ProgramState, ProgramStatus};
