//! Actor-based collectors
//!
//! Every reachable server gets two actors, each running as an independent
//! tokio task with its own connection:
//!
//! ```text
//!                  ┌──────────────────┐
//!                  │ FleetOrchestrator│
//!                  └────────┬─────────┘
//!                           │ spawns (per reachable server)
//!              ┌────────────┴────────────┐
//!              │                         │
//!   ┌──────────▼─────────┐    ┌──────────▼─────────┐
//!   │ CommandCollector   │    │ StatsCollector     │
//!   │ MONITOR stream     │    │ INFO every interval│
//!   └──────────┬─────────┘    └──────────┬─────────┘
//!              │                         │
//!              └────────────┬────────────┘
//!                           │ writes
//!                  ┌────────▼─────────┐
//!                  │ StorageBackend   │ (shared, Send + Sync)
//!                  └──────────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel (`PollNow`, `Shutdown`)
//! 2. **Counters**: each actor updates shared [`messages::CollectorStats`]
//! 3. **Request/Response**: oneshot channels for `PollNow`

pub mod collector;
pub mod command;
pub mod messages;
pub mod stats;

pub use collector::CollectorHandle;
