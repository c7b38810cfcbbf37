//! IPC protocol types and validation for afk-agent.
//!
//! This crate is shared by the agent and the `afk` client to prevent schema
//! drift. The agent remains the authority on validation, but the client reuses
//! the same types to construct valid requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::PathBuf;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

pub const SOCKET_ENV: &str = "AFK_AGENT_SOCKET";
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/afk_slack_agent.sock";

/// Control value that stops the agent. Reserved: never a valid action name.
pub const TERMINATE: &str = "terminate";

const MAX_ACTION_NAME_LEN: usize = 128;

pub const ERROR_ACTION_NOT_FOUND: &str = "action_not_found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetStatus,
    RunAction,
    Terminate,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: None,
            params,
        }
    }

    pub fn run_action(action: &ActionRequest) -> Self {
        Self::new(Method::RunAction, serde_json::to_value(action).ok())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// A named action plus optional per-request overrides.
///
/// Empty override strings are treated as absent by the resolver, so the
/// client may forward its flags verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_message: Option<String>,
    #[serde(default)]
    pub silent: bool,
}

impl ActionRequest {
    pub fn named(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        let name = self.action.as_str();
        if name.trim().is_empty() {
            return Err(ErrorInfo::new("invalid_params", "action is required"));
        }
        if name.trim() != name {
            return Err(ErrorInfo::new(
                "invalid_params",
                "action must not have surrounding whitespace",
            ));
        }
        if name.len() > MAX_ACTION_NAME_LEN {
            return Err(ErrorInfo::new(
                "invalid_params",
                format!("action must be {} characters or fewer", MAX_ACTION_NAME_LEN),
            ));
        }
        Ok(())
    }

    pub fn is_terminate(&self) -> bool {
        self.action == TERMINATE
    }
}

/// A decoded, validated request ready for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    GetHealth,
    GetStatus,
    RunAction(ActionRequest),
    Terminate,
}

pub fn parse_action(params: Value) -> Result<ActionRequest, ErrorInfo> {
    let request: ActionRequest = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("action payload is invalid: {}", err),
        )
    })?;
    request.validate()?;
    Ok(request)
}

/// Maps a request envelope onto the command it asks for.
///
/// `run_action` naming the `terminate` control value is routed as
/// [`AgentCommand::Terminate`].
pub fn parse_command(request: Request) -> Result<AgentCommand, ErrorInfo> {
    if request.protocol_version != PROTOCOL_VERSION {
        return Err(ErrorInfo::new(
            "protocol_mismatch",
            "unsupported protocol version",
        ));
    }

    match request.method {
        Method::GetHealth => Ok(AgentCommand::GetHealth),
        Method::GetStatus => Ok(AgentCommand::GetStatus),
        Method::Terminate => Ok(AgentCommand::Terminate),
        Method::RunAction => {
            let params = request
                .params
                .ok_or_else(|| ErrorInfo::new("invalid_params", "action payload is required"))?;
            let action = parse_action(params)?;
            if action.is_terminate() {
                Ok(AgentCommand::Terminate)
            } else {
                Ok(AgentCommand::RunAction(action))
            }
        }
    }
}

/// Decodes one request line. The bare literal `terminate` is accepted as
/// well as a JSON envelope.
pub fn decode_line(line: &[u8]) -> Result<(Option<String>, AgentCommand), ErrorInfo> {
    let trimmed = trim_ascii(line);
    if trimmed.is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }
    if trimmed == TERMINATE.as_bytes() {
        return Ok((None, AgentCommand::Terminate));
    }

    let request: Request = serde_json::from_slice(trimmed).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })?;
    let id = request.id.clone();
    parse_command(request).map(|command| (id, command))
}

/// Resolves the agent socket path: `AFK_AGENT_SOCKET` or the well-known default.
pub fn socket_path() -> PathBuf {
    match env::var(SOCKET_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_SOCKET_PATH),
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|index| index + 1)
        .unwrap_or(start);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(method: Method, params: Option<Value>) -> Request {
        Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some("req-1".to_string()),
            params,
        }
    }

    #[test]
    fn bare_terminate_line_is_accepted() {
        let (id, command) = decode_line(b"terminate\n").unwrap();
        assert!(id.is_none());
        assert_eq!(command, AgentCommand::Terminate);
    }

    #[test]
    fn run_action_named_terminate_routes_to_terminate() {
        let request = envelope(Method::RunAction, Some(json!({"action": "terminate"})));
        assert_eq!(parse_command(request).unwrap(), AgentCommand::Terminate);
    }

    #[test]
    fn run_action_carries_overrides() {
        let line = serde_json::to_vec(&envelope(
            Method::RunAction,
            Some(json!({"action": "lunch", "status_text": "Eating", "silent": true})),
        ))
        .unwrap();
        let (id, command) = decode_line(&line).unwrap();
        assert_eq!(id.as_deref(), Some("req-1"));
        match command {
            AgentCommand::RunAction(action) => {
                assert_eq!(action.action, "lunch");
                assert_eq!(action.status_text.as_deref(), Some("Eating"));
                assert!(action.silent);
                assert!(action.away_message.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn run_action_requires_params() {
        let err = parse_command(envelope(Method::RunAction, None)).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_blank_action_name() {
        let err = parse_action(json!({"action": "   "})).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_padded_action_name() {
        let err = parse_action(json!({"action": " lunch"})).unwrap_err();
        assert_eq!(err.code, "invalid_params");
        let err = parse_command(envelope(
            Method::RunAction,
            Some(json!({"action": "terminate\t"})),
        ))
        .unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_long_action_name() {
        let err = parse_action(json!({"action": "a".repeat(256)})).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = parse_action(json!({"action": "lunch", "colour": "red"})).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn rejects_protocol_mismatch() {
        let mut request = envelope(Method::GetHealth, None);
        request.protocol_version = 99;
        assert_eq!(
            parse_command(request).unwrap_err().code,
            "protocol_mismatch"
        );
    }

    #[test]
    fn rejects_garbage_and_blank_lines() {
        assert_eq!(decode_line(b"{nope").unwrap_err().code, "invalid_json");
        assert_eq!(decode_line(b"  \n").unwrap_err().code, "empty_request");
    }
}
