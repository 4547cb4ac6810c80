//! Synchronous wrapper around an interactive shell running on a PTY.
//!
//! The shell is spawned once and stays alive across commands, so state such
//! as exported variables and the working directory persists. Output is read
//! without blocking the caller beyond an explicit timeout, which lets higher
//! layers poll for command output and detect interactive prompts.

mod errors;
mod interactive_process;

pub use errors::InteractiveProcessError;
pub use interactive_process::InteractiveProcess;
