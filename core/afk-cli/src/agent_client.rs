//! Client helper for sending requests to the AFK agent.

use afk_agent_protocol::{Request, Response, MAX_REQUEST_BYTES};
use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

const READ_TIMEOUT_MS: u64 = 10_000;
const WRITE_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Could not reach the agent at {0}; is the agent running?")]
    NotRunning(PathBuf),

    #[error("Failed to talk to agent: {0}")]
    Io(String),

    #[error("Agent response malformed: {0}")]
    Malformed(String),

    #[error("{code}: {message}")]
    Agent { code: String, message: String },
}

/// Sends one request and returns the response data.
pub fn send_request(socket: &Path, request: &Request) -> Result<Value, ClientError> {
    let mut stream = UnixStream::connect(socket).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
            ClientError::NotRunning(socket.to_path_buf())
        }
        _ => ClientError::Io(format!("failed to connect: {}", err)),
    })?;
    let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, request)
        .map_err(|err| ClientError::Io(format!("failed to write request: {}", err)))?;
    stream
        .write_all(b"\n")
        .map_err(|err| ClientError::Io(format!("failed to write request: {}", err)))?;
    stream.flush().ok();

    let response = read_response(stream)?;
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        let (code, message) = response
            .error
            .map(|err| (err.code, err.message))
            .unwrap_or_else(|| ("unknown".to_string(), "Unknown agent error".to_string()));
        Err(ClientError::Agent { code, message })
    }
}

fn read_response(stream: UnixStream) -> Result<Response, ClientError> {
    let mut line = Vec::new();
    let limit = (MAX_REQUEST_BYTES + 1) as u64;
    BufReader::new(stream)
        .take(limit)
        .read_until(b'\n', &mut line)
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                ClientError::Io("timed out waiting for agent response".to_string())
            }
            _ => ClientError::Io(format!("failed to read response: {}", err)),
        })?;

    if line.len() > MAX_REQUEST_BYTES {
        return Err(ClientError::Malformed(
            "response exceeded maximum size".to_string(),
        ));
    }
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ClientError::Malformed("agent response was empty".to_string()));
    }

    serde_json::from_slice(&line).map_err(|err| ClientError::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use afk_agent_protocol::{ActionRequest, Method, TERMINATE};
    use std::os::unix::net::UnixListener;
    use std::thread;
    use tempfile::TempDir;

    fn serve_once(listener: UnixListener, reply: &'static str) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut request = String::new();
            BufReader::new(stream).read_line(&mut request).unwrap();
            writer.write_all(reply.as_bytes()).unwrap();
            request
        })
    }

    #[test]
    fn missing_socket_reports_not_running() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("absent.sock");
        let err = send_request(&socket, &Request::new(Method::GetHealth, None)).unwrap_err();
        assert!(matches!(err, ClientError::NotRunning(_)));
    }

    #[test]
    fn returns_data_and_sends_one_line() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("agent.sock");
        let handle = serve_once(
            UnixListener::bind(&socket).unwrap(),
            "{\"ok\":true,\"data\":{\"terminating\":true}}\n",
        );

        let data = send_request(
            &socket,
            &Request::run_action(&ActionRequest::named(TERMINATE)),
        )
        .unwrap();

        assert_eq!(data["terminating"], true);
        let sent: Request = serde_json::from_str(&handle.join().unwrap()).unwrap();
        assert_eq!(sent.method, Method::RunAction);
        assert_eq!(sent.params.unwrap()["action"], TERMINATE);
    }

    #[test]
    fn agent_error_is_surfaced() {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("agent.sock");
        let handle = serve_once(
            UnixListener::bind(&socket).unwrap(),
            "{\"ok\":false,\"error\":{\"code\":\"action_not_found\",\"message\":\"Action not found: nap\"}}\n",
        );

        let err = send_request(
            &socket,
            &Request::run_action(&ActionRequest::named("nap")),
        )
        .unwrap_err();
        handle.join().unwrap();

        match err {
            ClientError::Agent { code, .. } => assert_eq!(code, "action_not_found"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
