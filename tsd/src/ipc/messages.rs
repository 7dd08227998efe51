//! IPC message types
//!
//! Requests travel as `{method, args}` so unknown methods still decode and
//! can be answered with a protocol error; they are then resolved into the
//! closed `Request` enum before dispatch.

use std::fmt;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{TaskParseError, TaskRecord};

/// Request as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRequest {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RawRequest {
    pub fn new(method: Method, args: Vec<Value>) -> Self {
        Self {
            method: method.as_str().to_string(),
            args,
        }
    }

    pub fn on_add(task_line: &str) -> Self {
        Self::new(Method::OnAdd, vec![Value::from(task_line)])
    }

    pub fn on_modify(old_line: &str, new_line: &str) -> Self {
        Self::new(Method::OnModify, vec![Value::from(old_line), Value::from(new_line)])
    }

    pub fn status() -> Self {
        Self::new(Method::Status, Vec::new())
    }

    pub fn stop() -> Self {
        Self::new(Method::Stop, Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    OnAdd,
    OnModify,
    Status,
    Stop,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::OnAdd => "on-add",
            Method::OnModify => "on-modify",
            Method::Status => "status",
            Method::Stop => "stop",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "on-add" => Some(Method::OnAdd),
            "on-modify" => Some(Method::OnModify),
            "status" => Some(Method::Status),
            "stop" => Some(Method::Stop),
            _ => None,
        }
    }

    fn arity(&self) -> usize {
        match self {
            Method::OnAdd => 1,
            Method::OnModify => 2,
            Method::Status | Method::Stop => 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error("Method '{method}' expects {expected} argument(s), got {got}")]
    BadArgs {
        method: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid task argument: {0}")]
    BadTask(#[from] TaskParseError),
}

/// A decoded request, ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    OnAdd { task: TaskRecord },
    OnModify { old: TaskRecord, new: TaskRecord },
    Status,
    Stop,
}

impl Request {
    /// Resolve the method and parse task arguments; tasks may arrive as JSON text or objects
    pub fn from_raw(raw: RawRequest, default_tz: Tz) -> Result<Self, ProtocolError> {
        let method = Method::from_name(&raw.method).ok_or_else(|| ProtocolError::UnknownMethod(raw.method.clone()))?;
        if raw.args.len() != method.arity() {
            return Err(ProtocolError::BadArgs {
                method: method.as_str(),
                expected: method.arity(),
                got: raw.args.len(),
            });
        }

        let mut tasks = raw
            .args
            .into_iter()
            .map(|arg| parse_task(arg, default_tz))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter();

        Ok(match (method, tasks.next(), tasks.next()) {
            (Method::OnAdd, Some(task), None) => Request::OnAdd { task },
            (Method::OnModify, Some(old), Some(new)) => Request::OnModify { old, new },
            (Method::Status, ..) => Request::Status,
            (Method::Stop, ..) => Request::Stop,
            (method, ..) => {
                return Err(ProtocolError::BadArgs {
                    method: method.as_str(),
                    expected: method.arity(),
                    got: 0,
                });
            }
        })
    }
}

fn parse_task(arg: Value, default_tz: Tz) -> Result<TaskRecord, TaskParseError> {
    match arg {
        Value::String(line) => TaskRecord::from_json(&line, default_tz),
        other => TaskRecord::from_value(other, default_tz),
    }
}

/// Class of a failed request, carried as the name before ` raised: `
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    DataIntegrity,
    Internal,
}

impl ErrorKind {
    const ALL: [ErrorKind; 3] = [ErrorKind::Protocol, ErrorKind::DataIntegrity, ErrorKind::Internal];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Protocol => "ProtocolError",
            ErrorKind::DataIntegrity => "DataIntegrityError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const RAISED: &str = " raised: ";

/// Response from daemon to client
///
/// On the wire this is a bare JSON string: the feedback line, the decimal
/// pid for `status`, or `<Kind> raised: <message>` for a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DaemonResponse {
    Ok { message: String },
    Error { kind: ErrorKind, message: String },
}

impl DaemonResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        DaemonResponse::Ok { message: message.into() }
    }

    pub fn error(kind: ErrorKind, message: impl fmt::Display) -> Self {
        DaemonResponse::Error {
            kind,
            message: message.to_string(),
        }
    }
}

impl From<DaemonResponse> for String {
    fn from(response: DaemonResponse) -> Self {
        match response {
            DaemonResponse::Ok { message } => message,
            DaemonResponse::Error { kind, message } => format!("{}{}{}", kind, RAISED, message),
        }
    }
}

impl From<String> for DaemonResponse {
    fn from(line: String) -> Self {
        for kind in ErrorKind::ALL {
            if let Some(message) = line.strip_prefix(kind.as_str()).and_then(|rest| rest.strip_prefix(RAISED)) {
                return DaemonResponse::error(kind, message);
            }
        }
        DaemonResponse::Ok { message: line }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TASK: &str = r#"{"uuid":"2d0fc886-3a8e-478c-a323-5d13de45e254","description":"x","status":"pending"}"#;

    #[test]
    fn test_raw_request_wire_shape() {
        let json = serde_json::to_value(RawRequest::on_modify(TASK, TASK)).unwrap();
        assert_eq!(json["method"], "on-modify");
        assert_eq!(json["args"].as_array().unwrap().len(), 2);
        assert!(json["args"][0].is_string());

        let status: RawRequest = serde_json::from_value(json!({"method": "status"})).unwrap();
        assert!(status.args.is_empty());
    }

    #[test]
    fn test_from_raw_dispatch_table() {
        let req = Request::from_raw(RawRequest::on_add(TASK), Tz::UTC).unwrap();
        assert!(matches!(req, Request::OnAdd { ref task } if task.description == "x"));
        assert_eq!(Request::from_raw(RawRequest::status(), Tz::UTC).unwrap(), Request::Status);
        assert_eq!(Request::from_raw(RawRequest::stop(), Tz::UTC).unwrap(), Request::Stop);
    }

    #[test]
    fn test_task_args_may_be_objects() {
        let raw = RawRequest {
            method: "on-add".to_string(),
            args: vec![serde_json::from_str(TASK).unwrap()],
        };
        assert!(matches!(Request::from_raw(raw, Tz::UTC), Ok(Request::OnAdd { .. })));
    }

    #[test]
    fn test_protocol_errors() {
        let unknown = RawRequest {
            method: "on-delete".to_string(),
            args: vec![],
        };
        assert!(matches!(
            Request::from_raw(unknown, Tz::UTC),
            Err(ProtocolError::UnknownMethod(m)) if m == "on-delete"
        ));

        let short = RawRequest::new(Method::OnModify, vec![Value::from(TASK)]);
        assert!(matches!(
            Request::from_raw(short, Tz::UTC),
            Err(ProtocolError::BadArgs { expected: 2, got: 1, .. })
        ));

        let garbage = RawRequest::on_add("{not json");
        assert!(matches!(Request::from_raw(garbage, Tz::UTC), Err(ProtocolError::BadTask(_))));
    }

    #[test]
    fn test_response_is_a_bare_string() {
        let ok = serde_json::to_value(DaemonResponse::ok("Todoist: item created")).unwrap();
        assert_eq!(ok, json!("Todoist: item created"));

        let pid = serde_json::to_value(DaemonResponse::ok("4242")).unwrap();
        assert_eq!(pid, json!("4242"));

        let err = serde_json::to_value(DaemonResponse::error(ErrorKind::DataIntegrity, "no inbox")).unwrap();
        assert_eq!(err, json!("DataIntegrityError raised: no inbox"));
    }

    #[test]
    fn test_response_decoding_recognises_error_prefixes() {
        let back: DaemonResponse = serde_json::from_value(json!("DataIntegrityError raised: no inbox")).unwrap();
        assert_eq!(back, DaemonResponse::error(ErrorKind::DataIntegrity, "no inbox"));

        let back: DaemonResponse = serde_json::from_value(json!("ProtocolError raised: Unknown method 'x'")).unwrap();
        assert!(matches!(back, DaemonResponse::Error { kind: ErrorKind::Protocol, ref message } if message == "Unknown method 'x'"));

        let back: DaemonResponse = serde_json::from_value(json!("InternalError raised: boom")).unwrap();
        assert!(matches!(back, DaemonResponse::Error { kind: ErrorKind::Internal, .. }));

        // Only the exact `<Kind> raised: ` prefix marks a failure
        for text in ["Todoist: item created", "ProtocolError", "KeyError raised: x", "1234"] {
            let back: DaemonResponse = serde_json::from_value(json!(text)).unwrap();
            assert_eq!(back, DaemonResponse::ok(text));
        }
    }
}
