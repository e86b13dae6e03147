use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

/// Upper bound on a single message body.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DapMessage {
    pub seq: u64,
    #[serde(flatten)]
    pub content: DapMessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DapMessageContent {
    Request {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Value>,
    },
    Response {
        request_seq: u64,
        success: bool,
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    Event {
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

impl DapMessage {
    pub fn request(seq: u64, command: impl Into<String>, arguments: Option<Value>) -> Self {
        Self {
            seq,
            content: DapMessageContent::Request {
                command: command.into(),
                arguments,
            },
        }
    }
}

/// Reads one `Content-Length` framed message. `Ok(None)` means the stream
/// ended cleanly between messages.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<DapMessage>, TransportError> {
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            if saw_header {
                return Err(TransportError::Malformed(
                    "stream ended inside message headers".to_string(),
                ));
            }
            return Ok(None);
        }
        saw_header = true;

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("Content-Length") {
                let value = value.trim();
                let length = value.parse::<usize>().map_err(|err| {
                    TransportError::Malformed(format!("invalid Content-Length {value:?}: {err}"))
                })?;
                content_length = Some(length);
            }
        }
    }

    let Some(content_length) = content_length else {
        return Err(TransportError::Malformed(
            "missing Content-Length header".to_string(),
        ));
    };
    if content_length > MAX_MESSAGE_BYTES {
        return Err(TransportError::TooLarge(content_length));
    }

    let mut buffer = vec![0u8; content_length];
    reader.read_exact(&mut buffer)?;
    Ok(Some(serde_json::from_slice(&buffer)?))
}

/// Writes one framed message and flushes.
pub fn write_message<W: Write + ?Sized>(
    writer: &mut W,
    message: &DapMessage,
) -> Result<(), TransportError> {
    let json = serde_json::to_vec(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", json.len())?;
    writer.write_all(&json)?;
    writer.flush()?;
    Ok(())
}
