//! Parser for `MONITOR` stream lines
//!
//! A monitor line looks like
//!
//! ```text
//! 1577836800.123456 [0 127.0.0.1:6390] "SET" "foo" "bar"
//! 1577836800.0 (db 0) "GET" "foo"
//! ```
//!
//! i.e. an epoch timestamp, an optional annotation naming the database or
//! the client, then the command and its arguments. Annotations are
//! recognised by their first token only and are assumed to be exactly
//! [`ANNOTATION_WIDTH`] tokens wide; a line that breaks this assumption is
//! misparsed rather than corrected.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Commands issued by the monitoring itself; never forwarded to storage
pub const IGNORED_COMMANDS: [&str; 2] = ["INFO", "MONITOR"];

/// Number of space separated tokens an annotation occupies
pub const ANNOTATION_WIDTH: usize = 2;

static ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<database>\(db)|(?P<client>\[.*))$").expect("annotation pattern is valid")
});

/// The annotation between timestamp and command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// `(db 0)`, older servers
    Database,
    /// `[0 127.0.0.1:6390]`, newer servers
    Client,
}

impl Annotation {
    /// Detect an annotation from the token following the timestamp
    pub fn detect(token: &str) -> Option<Annotation> {
        let captures = ANNOTATION.captures(token)?;
        if captures.name("database").is_some() {
            Some(Annotation::Database)
        } else {
            Some(Annotation::Client)
        }
    }
}

/// One command observed on a monitor stream
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorEvent {
    /// Seconds since the epoch, as reported by the server
    pub timestamp: f64,
    /// Upper-cased command name
    pub command: String,
    pub key: Option<String>,
    /// Remaining arguments joined by single spaces
    pub arguments: Option<String>,
}

impl MonitorEvent {
    /// Parsed events always convert; a hand-built event with an
    /// unrepresentable timestamp maps to the epoch.
    pub fn datetime(&self) -> DateTime<Utc> {
        to_datetime(self.timestamp).unwrap_or_default()
    }

    /// Whether this event is filtered before reaching storage
    pub fn is_ignored(&self) -> bool {
        IGNORED_COMMANDS.contains(&self.command.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The first token is not a finite epoch timestamp
    InvalidTimestamp(String),
    /// Nothing left after the timestamp and annotation
    MissingCommand,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidTimestamp(raw) => write!(f, "invalid timestamp {raw:?}"),
            ParseError::MissingCommand => write!(f, "line has no command"),
        }
    }
}

impl std::error::Error for ParseError {}

/// A line split into its parts, annotation already removed
#[derive(Debug)]
struct Tokens<'a> {
    timestamp: &'a str,
    annotation: Option<Annotation>,
    body: &'a [&'a str],
}

fn tokenize<'a>(tokens: &'a [&'a str]) -> Option<Tokens<'a>> {
    let (&timestamp, rest) = tokens.split_first()?;
    let first = rest.first()?;

    let annotation = Annotation::detect(first);
    let body = match annotation {
        Some(_) => rest.get(ANNOTATION_WIDTH..).unwrap_or_default(),
        None => rest,
    };

    Some(Tokens {
        timestamp,
        annotation,
        body,
    })
}

fn strip_quotes(token: &str) -> String {
    token.replace('"', "")
}

fn to_datetime(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = (((timestamp - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos)
}

fn parse_timestamp(raw: &str) -> Result<f64, ParseError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|&ts| to_datetime(ts).is_some())
        .ok_or_else(|| ParseError::InvalidTimestamp(raw.to_string()))
}

/// Parse one raw monitor line.
///
/// Returns `Ok(None)` for lines with fewer than two tokens (heartbeats,
/// noise). The result does not depend on anything but `line`.
pub fn parse_line(line: &str) -> Result<Option<MonitorEvent>, ParseError> {
    let raw: Vec<&str> = line.split(' ').collect();
    let Some(tokens) = tokenize(&raw) else {
        return Ok(None);
    };

    let timestamp = parse_timestamp(tokens.timestamp)?;

    let Some((command, rest)) = tokens.body.split_first() else {
        return Err(ParseError::MissingCommand);
    };
    let command = strip_quotes(command).to_uppercase();
    if command.is_empty() {
        return Err(ParseError::MissingCommand);
    }

    let key = rest.first().map(|key| strip_quotes(key).trim().to_string());

    let arguments = match rest.get(1..) {
        Some(args) if !args.is_empty() => Some(
            args.iter()
                .map(|arg| strip_quotes(arg))
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string(),
        ),
        _ => None,
    };

    if let Some(annotation) = tokens.annotation {
        tracing::trace!("stripped {annotation:?} annotation");
    }

    Ok(Some(MonitorEvent {
        timestamp,
        command,
        key,
        arguments,
    }))
}
