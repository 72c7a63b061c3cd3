//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only the subset the coordination endpoint uses is supported: text
//! packets on the default namespace. Binary attachments are rejected.

use crate::error::ConnectionError;
use serde::Deserialize;
use serde_json::Value;

/// Socket.IO CONNECT for the default namespace, wrapped in an Engine.IO message.
pub const CONNECT: &str = "40";
/// Socket.IO DISCONNECT for the default namespace.
pub const DISCONNECT: &str = "41";
pub const PING: &str = "2";
pub const PONG: &str = "3";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connected,
    Disconnected,
    Event { name: String, payload: Value },
    Ack,
    ConnectError(String),
}

pub fn decode(text: &str) -> Result<Frame, ConnectionError> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(protocol("empty frame"));
    };
    let rest = chars.as_str();
    match kind {
        '0' => serde_json::from_str(rest)
            .map(Frame::Open)
            .map_err(|e| protocol(&format!("bad handshake: {e}"))),
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping),
        '3' => Ok(Frame::Pong),
        '4' => decode_packet(rest),
        '5' | '6' => Ok(Frame::Noop),
        other => Err(protocol(&format!("unknown engine packet type '{other}'"))),
    }
}

fn decode_packet(text: &str) -> Result<Frame, ConnectionError> {
    let mut chars = text.chars();
    let Some(kind) = chars.next() else {
        return Err(protocol("empty socket packet"));
    };
    let body = strip_ack_id(strip_namespace(chars.as_str()));
    match kind {
        '0' => Ok(Frame::Connected),
        '1' => Ok(Frame::Disconnected),
        '2' => decode_event_body(body),
        '3' => Ok(Frame::Ack),
        '4' => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(ToString::to_string))
                .unwrap_or_else(|| body.to_string());
            Ok(Frame::ConnectError(message))
        }
        '5' | '6' => Err(protocol("binary packets are not supported")),
        other => Err(protocol(&format!("unknown socket packet type '{other}'"))),
    }
}

fn decode_event_body(body: &str) -> Result<Frame, ConnectionError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| protocol(&format!("bad event body: {e}")))?;
    let Value::Array(mut items) = value else {
        return Err(protocol("event body is not an array"));
    };
    if items.is_empty() {
        return Err(protocol("event body is empty"));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(protocol("event name is not a string"));
    };
    let payload = if items.is_empty() {
        Value::Null
    } else {
        items.swap_remove(0)
    };
    Ok(Frame::Event { name, payload })
}

fn strip_namespace(text: &str) -> &str {
    if !text.starts_with('/') {
        return text;
    }
    match text.find(',') {
        Some(idx) => &text[idx + 1..],
        None => "",
    }
}

fn strip_ack_id(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_ascii_digit())
}

pub fn encode_event(name: &str, payload: &Value) -> String {
    let body = Value::Array(vec![Value::String(name.to_string()), payload.clone()]);
    format!("42{body}")
}

fn protocol(reason: &str) -> ConnectionError {
    ConnectionError::Protocol(reason.to_string())
}
