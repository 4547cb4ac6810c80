//! TCP server that runs shell commands for remote clients.
//!
//! Each connection gets its own interactive shell. Clients send framed JSON
//! directives; the server streams the shell's raw output back and appends a
//! completion marker after every command so clients can tell where one
//! command's output ends. Commands run strictly one at a time per connection,
//! in arrival order. Input directives skip that queue and reach the shell
//! immediately, which is how a client answers an interactive prompt while the
//! prompting command is still running.

mod connection;
mod errors;
mod server;

pub use errors::ServerError;
pub use server::PtyServer;
