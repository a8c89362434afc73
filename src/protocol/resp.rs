//! RESP2 encoding and decoding

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::error::{ProtocolError, ProtocolResult};

/// A decoded RESP2 reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    SimpleString(String),
    Error(String),
    Integer(i64),
    /// `None` is the null bulk string (`$-1`)
    BulkString(Option<Vec<u8>>),
    /// `None` is the null array (`*-1`)
    Array(Option<Vec<Value>>),
}

impl Value {
    /// Short name of the reply type, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::SimpleString(_) => "simple string",
            Value::Error(_) => "error",
            Value::Integer(_) => "integer",
            Value::BulkString(Some(_)) => "bulk string",
            Value::BulkString(None) => "null bulk string",
            Value::Array(Some(_)) => "array",
            Value::Array(None) => "null array",
        }
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        Value::BulkString(Some(data.into()))
    }

    /// Serialize this value in wire format
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Value::SimpleString(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Value::Error(s) => {
                out.push(b'-');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            Value::Integer(i) => {
                out.extend_from_slice(format!(":{i}\r\n").as_bytes());
            }
            Value::BulkString(None) => out.extend_from_slice(b"$-1\r\n"),
            Value::BulkString(Some(data)) => {
                out.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            Value::Array(None) => out.extend_from_slice(b"*-1\r\n"),
            Value::Array(Some(items)) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }

    /// Interpret a reply as text (simple or bulk string)
    pub fn into_text(self) -> ProtocolResult<String> {
        match self {
            Value::SimpleString(s) => Ok(s),
            Value::BulkString(Some(data)) => String::from_utf8(data)
                .map_err(|_| ProtocolError::UnexpectedReply("non UTF-8 bulk string".to_string())),
            Value::Error(msg) => Err(ProtocolError::Server(msg)),
            other => Err(ProtocolError::UnexpectedReply(other.kind().to_string())),
        }
    }
}

/// Encode a command as an array of bulk strings
pub fn encode_command<S: AsRef<[u8]>>(args: &[S]) -> Vec<u8> {
    Value::Array(Some(args.iter().map(|arg| Value::bulk(arg.as_ref())).collect())).encode()
}

/// Read one CRLF terminated header line, without the terminator
async fn read_line<R>(reader: &mut R) -> ProtocolResult<String>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut buf = Vec::new();
    let read = reader.read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }

    if !buf.ends_with(b"\r\n") {
        return Err(ProtocolError::Malformed("line without CRLF terminator".to_string()));
    }
    buf.truncate(buf.len() - 2);

    String::from_utf8(buf).map_err(|_| ProtocolError::Malformed("non UTF-8 header".to_string()))
}

/// Largest bulk string accepted, same as the server's `proto-max-bulk-len`
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest array accepted
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Elements reserved up front, whatever the header claims
const ARRAY_PREALLOC: usize = 64;

/// Parse a length header. `-1` is the null marker and yields `None`.
fn parse_length(raw: &str, max: usize) -> ProtocolResult<Option<usize>> {
    let len: i64 = raw
        .parse()
        .map_err(|_| ProtocolError::Malformed(format!("invalid length {raw:?}")))?;

    match len {
        -1 => Ok(None),
        len if len < 0 => Err(ProtocolError::Malformed(format!("negative length {len}"))),
        len if len as u64 > max as u64 => Err(ProtocolError::Malformed(format!(
            "length {len} exceeds limit of {max}"
        ))),
        len => Ok(Some(len as usize)),
    }
}

/// Read a single reply from the stream.
///
/// Arrays recurse, so the future is boxed.
pub fn read_value<R>(reader: &mut R) -> BoxFuture<'_, ProtocolResult<Value>>
where
    R: AsyncBufRead + Unpin + Send,
{
    async move {
        let line = read_line(reader).await?;
        let Some(marker) = line.chars().next() else {
            return Err(ProtocolError::Malformed("empty reply header".to_string()));
        };
        let rest = &line[marker.len_utf8()..];

        match marker {
            '+' => Ok(Value::SimpleString(rest.to_string())),
            '-' => Ok(Value::Error(rest.to_string())),
            ':' => rest
                .parse()
                .map(Value::Integer)
                .map_err(|_| ProtocolError::Malformed(format!("invalid integer {rest:?}"))),
            '$' => {
                let Some(len) = parse_length(rest, MAX_BULK_LEN)? else {
                    return Ok(Value::BulkString(None));
                };

                // grows with the bytes actually received
                let mut data = Vec::new();
                (&mut *reader).take(len as u64 + 2).read_to_end(&mut data).await?;
                if data.len() < len + 2 {
                    return Err(ProtocolError::ConnectionClosed);
                }
                if !data.ends_with(b"\r\n") {
                    return Err(ProtocolError::Malformed(
                        "bulk string without CRLF terminator".to_string(),
                    ));
                }
                data.truncate(len);
                Ok(Value::BulkString(Some(data)))
            }
            '*' => {
                let Some(len) = parse_length(rest, MAX_ARRAY_LEN)? else {
                    return Ok(Value::Array(None));
                };

                let mut items = Vec::with_capacity(len.min(ARRAY_PREALLOC));
                for _ in 0..len {
                    items.push(read_value(&mut *reader).await?);
                }
                Ok(Value::Array(Some(items)))
            }
            other => Err(ProtocolError::Malformed(format!(
                "unknown reply marker {other:?}"
            ))),
        }
    }
    .boxed()
}
