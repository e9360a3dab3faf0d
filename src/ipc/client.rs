//! Control socket client, used by the CLI subcommands.

use crate::error::{Result, SubcastError};
use crate::ipc::protocol::{Command, Response};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Send one command to the daemon and read the response.
pub async fn send_command(socket_path: &Path, command: Command) -> Result<Response> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| SubcastError::IpcConnection {
            message: format!("failed to connect to daemon: {}", e),
        })?;

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let command_json = command.to_json().map_err(|e| SubcastError::IpcProtocol {
        message: format!("failed to serialize command: {}", e),
    })?;

    writer
        .write_all(command_json.as_bytes())
        .await
        .map_err(|e| SubcastError::IpcConnection {
            message: format!("failed to write command: {}", e),
        })?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| SubcastError::IpcConnection {
            message: format!("failed to write newline: {}", e),
        })?;
    writer
        .flush()
        .await
        .map_err(|e| SubcastError::IpcConnection {
            message: format!("failed to flush writer: {}", e),
        })?;

    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .await
        .map_err(|e| SubcastError::IpcConnection {
            message: format!("failed to read response: {}", e),
        })?;

    Response::from_json(response_line.trim()).map_err(|e| SubcastError::IpcProtocol {
        message: format!("failed to deserialize response: {}", e),
    })
}
