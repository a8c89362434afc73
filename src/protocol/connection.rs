//! Connections to a single Redis server

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::{debug, instrument, trace};

use super::error::{ProtocolError, ProtocolResult};
use super::resp::{Value, encode_command, read_value};
use crate::config::ServerConfig;

/// Connection factory for one server.
///
/// Holds everything needed to (re)establish a connection. Each monitored
/// server gets its own client; clients are never shared between servers.
#[derive(Debug, Clone)]
pub struct RedisClient {
    server: ServerConfig,
    connect_timeout: Duration,
}

impl RedisClient {
    pub fn new(server: ServerConfig, connect_timeout: Duration) -> Self {
        Self {
            server,
            connect_timeout,
        }
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Timeout applied to connecting and to single round trips
    pub fn timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Server identity (`host:port`)
    pub fn server_id(&self) -> String {
        self.server.id()
    }

    /// Open a fresh, authenticated connection
    pub async fn get_connection(&self) -> ProtocolResult<RedisConnection> {
        RedisConnection::connect(&self.server, self.connect_timeout).await
    }
}

/// A single authenticated connection
pub struct RedisConnection {
    stream: BufStream<TcpStream>,
    server_id: String,
}

impl RedisConnection {
    /// Connect to the server and authenticate if a password is configured
    #[instrument(skip_all, fields(server = %server))]
    pub async fn connect(server: &ServerConfig, timeout: Duration) -> ProtocolResult<Self> {
        trace!("connecting");

        let stream = tokio::time::timeout(
            timeout,
            TcpStream::connect((server.server.as_str(), server.port)),
        )
        .await
        .map_err(|_| ProtocolError::Timeout)??;
        stream.set_nodelay(true)?;

        let mut connection = Self {
            stream: BufStream::new(stream),
            server_id: server.id(),
        };

        if let Some(password) = &server.password {
            connection.auth(password, timeout).await?;
        }

        debug!("connected");
        Ok(connection)
    }

    async fn auth(&mut self, password: &str, timeout: Duration) -> ProtocolResult<()> {
        let reply = tokio::time::timeout(timeout, self.command(&["AUTH", password]))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        match reply {
            Value::SimpleString(ref s) if s == "OK" => Ok(()),
            other => Err(ProtocolError::UnexpectedReply(other.kind().to_string())),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Write a command without waiting for the reply
    pub async fn send_command<S: AsRef<[u8]>>(&mut self, args: &[S]) -> ProtocolResult<()> {
        self.stream.write_all(&encode_command(args)).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next reply, turning `-ERR` replies into errors
    pub async fn read_reply(&mut self) -> ProtocolResult<Value> {
        match read_value(&mut self.stream).await? {
            Value::Error(msg) => Err(ProtocolError::Server(msg)),
            value => Ok(value),
        }
    }

    /// Send a command and wait for its reply
    pub async fn command<S: AsRef<[u8]>>(&mut self, args: &[S]) -> ProtocolResult<Value> {
        self.send_command(args).await?;
        self.read_reply().await
    }

    pub async fn ping(&mut self) -> ProtocolResult<()> {
        match self.command(&["PING"]).await? {
            Value::SimpleString(ref s) if s == "PONG" => Ok(()),
            other => Err(ProtocolError::UnexpectedReply(other.kind().to_string())),
        }
    }

    /// Raw `INFO` text
    pub async fn info(&mut self) -> ProtocolResult<String> {
        self.command(&["INFO"]).await?.into_text()
    }

    /// Close the write half; the server drops the connection afterwards
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
