//! Wire protocol shared by the shell server and its streaming clients.
//!
//! Directives flow client -> server as length-prefixed JSON frames; shell
//! output flows back as raw UTF-8 chunks carrying an inline completion
//! marker per command.

mod directive;
mod framing;
mod marker;

pub use directive::CommandId;
pub use directive::Directive;
pub use directive::QUIT_COMMAND;
pub use framing::FramingError;
pub use framing::HEADER_LEN;
pub use framing::read_frame;
pub use framing::write_frame;
pub use marker::completion_marker;
pub use marker::echo_line;
pub use marker::wrap_command;

/// TCP port the shell server listens on and sandboxed environments publish.
pub const DEFAULT_PORT: u16 = 44440;
