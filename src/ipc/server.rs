//! Async Unix socket server for the control surface.
//!
//! One JSON command per connection, one JSON response back. The toggle
//! hotkey hook, overlay control pages and the `subcast` CLI all speak this
//! protocol.

use crate::error::{Result, SubcastError};
use crate::ipc::protocol::{Command, Response};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Handler trait for processing control commands.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and return a response.
    async fn handle(&self, command: Command) -> Response;
}

/// Control socket server.
pub struct IpcServer {
    socket_path: PathBuf,
    shutdown: Arc<AtomicBool>,
}

impl IpcServer {
    /// Create a server bound to the specified socket path.
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The socket path this server uses.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Default socket path from XDG_RUNTIME_DIR, with a /tmp fallback.
    pub fn default_socket_path() -> PathBuf {
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            PathBuf::from(xdg_runtime).join("subcast.sock")
        } else {
            let uid = unsafe { libc::getuid() };
            PathBuf::from(format!("/tmp/subcast-{}.sock", uid))
        }
    }

    /// Accept connections until `stop` is called.
    pub async fn start<H>(&self, handler: H) -> Result<()>
    where
        H: CommandHandler + 'static,
    {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| SubcastError::IpcSocket {
                message: format!("failed to remove existing socket: {}", e),
            })?;
        }

        let listener =
            UnixListener::bind(&self.socket_path).map_err(|e| SubcastError::IpcSocket {
                message: format!("failed to bind to socket: {}", e),
            })?;

        let handler = Arc::new(handler);

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            // Accept with a timeout so the shutdown flag is polled.
            let accept_result =
                tokio::time::timeout(tokio::time::Duration::from_millis(100), listener.accept())
                    .await;

            match accept_result {
                Ok(Ok((stream, _))) => {
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, handler).await {
                            eprintln!("subcast: control client error: {}", e);
                        }
                    });
                }
                Ok(Err(e)) => {
                    return Err(SubcastError::IpcConnection {
                        message: format!("failed to accept connection: {}", e),
                    });
                }
                Err(_) => continue,
            }
        }

        Ok(())
    }

    /// Stop the server and remove the socket file.
    pub fn stop(&self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(|e| SubcastError::IpcSocket {
                message: format!("failed to remove socket file: {}", e),
            })?;
        }
        Ok(())
    }
}

/// Handle a single client connection: read one command, send one response.
async fn handle_client<H>(stream: UnixStream, handler: Arc<H>) -> Result<()>
where
    H: CommandHandler,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader
        .read_line(&mut line)
        .await
        .map_err(|e| SubcastError::IpcConnection {
            message: format!("failed to read from client: {}", e),
        })?;

    let command = Command::from_json(line.trim()).map_err(|e| SubcastError::IpcProtocol {
        message: format!("failed to parse command: {}", e),
    })?;

    let response = handler.handle(command).await;

    let response_json = response.to_json().map_err(|e| SubcastError::IpcProtocol {
        message: format!("failed to serialize response: {}", e),
    })?;

    writer
        .write_all(response_json.as_bytes())
        .await
        .map_err(|e| SubcastError::IpcConnection {
            message: format!("failed to write to client: {}", e),
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

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct MockHandler;

    #[async_trait::async_trait]
    impl CommandHandler for MockHandler {
        async fn handle(&self, command: Command) -> Response {
            match command {
                Command::Status => Response::Status {
                    mode: "off".to_string(),
                    epoch: 0,
                    subscribers: 0,
                    dropped_chunks: 0,
                    subtitle_ttl_s: 4.5,
                    max_lines: 2,
                    toggle_key: "f11".to_string(),
                },
                _ => Response::Ok,
            }
        }
    }

    #[test]
    fn test_default_socket_path_shape() {
        let path = IpcServer::default_socket_path();
        let path_str = path.to_string_lossy();
        if std::env::var("XDG_RUNTIME_DIR").is_ok() {
            assert!(path_str.ends_with("subcast.sock"), "got: {:?}", path);
        } else {
            let uid = unsafe { libc::getuid() };
            assert_eq!(path_str, format!("/tmp/subcast-{}.sock", uid));
        }
    }

    #[tokio::test]
    async fn test_client_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server_path = socket_path.clone();
        let _server = tokio::spawn(async move {
            let server = IpcServer::new(server_path);
            server.start(MockHandler).await
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        let command_json = format!("{}\n", Command::Status.to_json().unwrap());
        stream.write_all(command_json.as_bytes()).await.unwrap();

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let response = Response::from_json(line.trim()).unwrap();

        assert!(matches!(response, Response::Status { .. }));
    }

    #[tokio::test]
    async fn test_multiple_concurrent_clients() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server_path = socket_path.clone();
        let _server = tokio::spawn(async move {
            let server = IpcServer::new(server_path);
            server.start(MockHandler).await
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let mut clients = Vec::new();
        for i in 0..5 {
            let socket_path = socket_path.clone();
            clients.push(tokio::spawn(async move {
                let mut stream = UnixStream::connect(&socket_path).await.unwrap();
                let command = if i % 2 == 0 {
                    Command::Status
                } else {
                    Command::Toggle
                };
                let json = format!("{}\n", command.to_json().unwrap());
                stream.write_all(json.as_bytes()).await.unwrap();

                let mut reader = BufReader::new(stream);
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                Response::from_json(line.trim()).unwrap()
            }));
        }

        for client in clients {
            let response = client.await.unwrap();
            assert!(matches!(response, Response::Status { .. } | Response::Ok));
        }
    }

    #[tokio::test]
    async fn test_invalid_json_does_not_kill_server() {
        let temp_dir = TempDir::new().unwrap();
        let socket_path = temp_dir.path().join("test.sock");

        let server_path = socket_path.clone();
        let _server = tokio::spawn(async move {
            let server = IpcServer::new(server_path);
            server.start(MockHandler).await
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        stream.write_all(b"not valid json\n").await.unwrap();
        drop(stream);

        // A well-formed command still works afterwards.
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();
        let json = format!("{}\n", Command::Toggle.to_json().unwrap());
        stream.write_all(json.as_bytes()).await.unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(Response::from_json(line.trim()).unwrap(), Response::Ok);
    }
}
