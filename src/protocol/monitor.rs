//! The `MONITOR` command stream

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tracing::{debug, trace};

use super::connection::{RedisClient, RedisConnection};
use super::error::{ProtocolError, ProtocolResult};
use super::resp::Value;

/// Owns one connection that has been switched into monitor mode.
///
/// The line stream can be taken exactly once; afterwards the connection
/// belongs to the stream and is released when the stream is dropped.
pub struct MonitorConnection {
    connection: Option<RedisConnection>,
    server_id: String,
}

impl MonitorConnection {
    /// Acquire a connection from `client` and issue `MONITOR`
    pub async fn open(client: &RedisClient) -> ProtocolResult<Self> {
        let mut connection = client.get_connection().await?;

        match connection.command(&["MONITOR"]).await? {
            Value::SimpleString(ref s) if s == "OK" => {}
            other => return Err(ProtocolError::UnexpectedReply(other.kind().to_string())),
        }
        debug!(server = %client.server(), "monitor stream started");

        Ok(Self {
            server_id: client.server_id(),
            connection: Some(connection),
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Unbounded stream of raw monitor lines.
    ///
    /// Each item is one server push. Per-reply errors are yielded and the
    /// stream continues; fatal errors (closed socket, broken framing) are
    /// yielded once and end the stream. Calling this a second time returns
    /// an empty stream.
    pub fn lines(&mut self) -> BoxStream<'static, ProtocolResult<String>> {
        stream::unfold(self.connection.take(), |state| async move {
            let Some(mut connection) = state else {
                return None;
            };

            match connection.read_reply().await {
                Ok(Value::SimpleString(line)) => {
                    trace!("monitor line: {line}");
                    Some((Ok(line), Some(connection)))
                }
                Ok(other) => Some((
                    Err(ProtocolError::UnexpectedReply(other.kind().to_string())),
                    Some(connection),
                )),
                Err(e) if e.is_fatal() => Some((Err(e), None)),
                Err(e) => Some((Err(e), Some(connection))),
            }
        })
        .boxed()
    }

    /// Drop the owned connection. Safe to call more than once.
    pub fn release(&mut self) {
        if self.connection.take().is_some() {
            debug!(server = %self.server_id, "monitor connection released");
        }
    }
}

impl Drop for MonitorConnection {
    fn drop(&mut self) {
        self.release();
    }
}
