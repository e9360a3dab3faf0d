//! Control surface: Unix socket protocol, server and client.

pub mod client;
pub mod protocol;
pub mod server;

pub use protocol::{Command, Response};
pub use server::{CommandHandler, IpcServer};
