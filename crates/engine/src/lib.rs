// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ps-engine: offline-first sync of learning progress.
//!
//! Producers enqueue [`ProgressOp`](ps_core::ProgressOp)s into a durable
//! local queue; the engine delivers them to the remote progress API when
//! connectivity allows.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Producer   │────►│ SyncEngine  │────►│  Progress   │
//! │  (enqueue)  │     │(coordinator)│◄────│   Remote    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                       │    ▲    │
//!               ┌───────┘    │    └───────┐
//!               ▼            │            ▼
//!        ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!        │ QueueStore  │ │Connectivity │ │  EventBus   │
//!        │  (SQLite)   │ │  (source)   │ │(subscribers)│
//!        └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Features
//!
//! - Single-flight drain with per-item retry and a dead-letter ceiling
//! - Bounded remote calls (dispatch timeout)
//! - Retention sweep of delivered items and old dead letters
//! - Injectable remote, clock and connectivity source for testing

pub mod config;
pub mod connectivity;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod remote;
pub mod sweeper;

pub use config::{Config, QueueConfig, RemoteConfig, SyncConfig};
pub use connectivity::{
    channel, ChannelSource, Connectivity, ConnectivityHandle, ConnectivitySource, ProbeSource,
    SharedConnectivity,
};
pub use engine::{
    DrainOutcome, EngineOptions, SkipReason, StoreLocation, SyncEngine, SyncEngineBuilder,
    SyncStatus,
};
pub use error::{EngineError, EngineResult};
pub use events::{EventBus, Subscription, SyncEvent, SyncReport};
pub use remote::{ProgressRemote, RemoteError, RemoteFuture, RemoteResult, RestRemote};
pub use sweeper::{RetentionPolicy, SweepReport};

#[cfg(test)]
mod test_helpers;
