//! Maps transport failures onto the client's `{code, message}` taxonomy.

use jwt_client_types::ErrorCode;
use serde_json::Value;

use crate::error::codes::{ENOERROR, EUNSPECIFIED};
use crate::transport::{ErrorInfo, TransportError};

/// HTTP-ish code for a network error name.
///
/// DNS failures map to 502, refused connections to 503, anything else to 500.
pub fn classify_by_message(message: &str) -> u16 {
    match message {
        "ENOTFOUND" => 502,
        "ECONNREFUSED" => 503,
        _ => 500,
    }
}

/// Normalizes a transport failure into `(code, message)`.
///
/// First matching rule wins:
/// 1. a status code: 404 stays `404/404`, others keep the status and take the
///    message from the error object;
/// 2. an error object without status: message from the object, code
///    classified from the message;
/// 3. nothing but a bare code: message is the code (or `ENOERROR`), code
///    classified from it.
pub fn normalize(error: &TransportError) -> (ErrorCode, String) {
    // upstream bodies shaped like an error object replace `error`
    let info = match &error.body {
        Some(Value::Object(body)) => Some(ErrorInfo::from_object(body)),
        _ => error.error.clone(),
    };

    if let Some(status) = error.status_code {
        if status == 404 {
            return (ErrorCode::from(404u16), "404".to_string());
        }
        let message = info.as_ref().map(message_of).unwrap_or_else(|| EUNSPECIFIED.to_string());
        return (ErrorCode::from(status), message);
    }

    if let Some(info) = info {
        let message = message_of(&info);
        return (ErrorCode::from(classify_by_message(&message)), message);
    }

    let message = error.code.clone().unwrap_or_else(|| ENOERROR.to_string());
    (ErrorCode::from(classify_by_message(&message)), message)
}

fn message_of(info: &ErrorInfo) -> String {
    info.name
        .clone()
        .or_else(|| info.code.as_ref().map(ToString::to_string))
        .unwrap_or_else(|| EUNSPECIFIED.to_string())
}
