//! Command server: serves one client connection at a time on the agent socket.
//!
//! Each connection carries newline-delimited requests and gets one response
//! line per request. EOF, idle timeout or a broken pipe returns to `accept`.
//! Only `terminate` ends the loop.

use afk_agent_protocol::{
    decode_line, AgentCommand, ErrorInfo, Response, ERROR_ACTION_NOT_FOUND, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};
use afk_core::{ResolveError, Shutdown, TransitionEngine};
use fs_err as fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const IDLE_TIMEOUT_SECS: u64 = 5;
const WRITE_TIMEOUT_SECS: u64 = 2;

pub struct CommandServer {
    listener: UnixListener,
    path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Closed,
    Terminate,
}

impl CommandServer {
    /// Binds the socket, removing a stale endpoint left by an unclean exit.
    pub fn bind(path: &Path) -> Result<Self, String> {
        prepare_socket_dir(path)?;
        remove_existing_socket(path)?;
        let listener = UnixListener::bind(path)
            .map_err(|err| format!("Failed to bind agent socket: {}", err))?;
        info!(path = %path.display(), "Command server listening");
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Accepts connections until a client sends `terminate`, then requests
    /// shutdown of the rest of the agent.
    pub fn run(&self, engine: &TransitionEngine, shutdown: &Shutdown) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    debug!("Client connected");
                    if handle_connection(stream, engine) == ConnectionEnd::Terminate {
                        info!("Terminate requested");
                        shutdown.request();
                        break;
                    }
                    debug!("Client disconnected");
                }
                Err(err) => {
                    warn!(error = %err, "Failed to accept agent connection");
                }
            }
        }
    }
}

impl Drop for CommandServer {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            debug!(error = %err, "Failed to remove agent socket");
        }
    }
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        warn!(path = %socket_path.display(), "Removing stale agent socket");
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(stream: UnixStream, engine: &TransitionEngine) -> ConnectionEnd {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(IDLE_TIMEOUT_SECS)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(WRITE_TIMEOUT_SECS)));
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(err) => {
            warn!(error = %err, "Failed to clone client stream");
            return ConnectionEnd::Closed;
        }
    };
    let mut reader = BufReader::new(stream);

    loop {
        let line = match read_line(&mut reader) {
            Ok(Some(line)) => line,
            Ok(None) => return ConnectionEnd::Closed,
            Err(err) => {
                warn!(code = %err.code, message = %err.message, "Failed to read request");
                let _ = write_response(&mut writer, Response::error_with_info(None, err));
                return ConnectionEnd::Closed;
            }
        };

        let (response, end) = match decode_line(&line) {
            Ok((id, command)) => handle_command(id, command, engine),
            Err(err) => {
                warn!(code = %err.code, message = %err.message, "Rejected request");
                (Response::error_with_info(None, err), None)
            }
        };

        if let Err(err) = write_response(&mut writer, response) {
            debug!(error = %err, "Failed to write response");
            return end.unwrap_or(ConnectionEnd::Closed);
        }
        if let Some(end) = end {
            return end;
        }
    }
}

/// Reads one newline-terminated request. `Ok(None)` means the client closed
/// the connection (or went idle) without sending anything further.
fn read_line(reader: &mut BufReader<UnixStream>) -> Result<Option<Vec<u8>>, ErrorInfo> {
    let mut line = Vec::new();
    let limit = (MAX_REQUEST_BYTES + 1) as u64;
    match reader.by_ref().take(limit).read_until(b'\n', &mut line) {
        Ok(0) => Ok(None),
        Ok(_) if line.len() > MAX_REQUEST_BYTES => Err(ErrorInfo::new(
            "request_too_large",
            "request exceeded maximum size",
        )),
        Ok(_) => Ok(Some(line)),
        Err(err)
            if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ) =>
        {
            if line.is_empty() {
                Ok(None)
            } else {
                Err(ErrorInfo::new("read_timeout", "request timed out"))
            }
        }
        Err(err) => Err(ErrorInfo::new(
            "read_error",
            format!("failed to read request: {}", err),
        )),
    }
}

fn handle_command(
    id: Option<String>,
    command: AgentCommand,
    engine: &TransitionEngine,
) -> (Response, Option<ConnectionEnd>) {
    match command {
        AgentCommand::Terminate => (
            Response::ok(id, serde_json::json!({ "terminating": true })),
            Some(ConnectionEnd::Terminate),
        ),
        AgentCommand::GetHealth => (
            Response::ok(
                id,
                serde_json::json!({
                    "status": "ok",
                    "pid": std::process::id(),
                    "version": env!("CARGO_PKG_VERSION"),
                    "protocol_version": PROTOCOL_VERSION,
                }),
            ),
            None,
        ),
        AgentCommand::GetStatus => (to_response(id, &engine.snapshot(), "status"), None),
        AgentCommand::RunAction(request) => {
            info!(action = %request.action, silent = request.silent, "Message received");
            let response = match engine.apply_action(&request) {
                Ok(outcome) => to_response(id, &outcome, "action outcome"),
                Err(err @ ResolveError::ActionNotFound(_)) => {
                    warn!(action = %request.action, "Action not found");
                    Response::error(id, ERROR_ACTION_NOT_FOUND, err.to_string())
                }
                Err(err @ ResolveError::ControlValue) => {
                    Response::error(id, "invalid_params", err.to_string())
                }
            };
            (response, None)
        }
    }
}

fn to_response<T: serde::Serialize>(id: Option<String>, value: &T, label: &str) -> Response {
    match serde_json::to_value(value) {
        Ok(value) => Response::ok(id, value),
        Err(err) => Response::error(
            id,
            "serialization_error",
            format!("Failed to serialize {}: {}", label, err),
        ),
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
