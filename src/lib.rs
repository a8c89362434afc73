pub mod actors;
pub mod alerts;
pub mod config;
pub mod info;
pub mod mail;
pub mod orchestrator;
pub mod parser;
pub mod probe;
pub mod protocol;
pub mod storage;
pub mod util;

pub use orchestrator::{FleetOrchestrator, RunReport, RunState, StopReason};
pub use parser::{MonitorEvent, ParseError, parse_line};
