//! Async TCP client for the shell server.
//!
//! Directives go out as length-prefixed JSON frames; shell output comes back
//! as a raw byte stream. [`AsyncPtyClient`] owns the connection and hands out
//! [`PtyServerResponse`] accumulators that follow one command's output until
//! its completion marker arrives.

mod client;
mod errors;
mod response;

pub use client::AsyncPtyClient;
pub use errors::ClientError;
pub use response::PtyServerResponse;
pub use response::ResponseStatus;
