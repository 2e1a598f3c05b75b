// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod dead_letters;
pub mod enqueue;
pub mod pending;
pub mod purge;
pub mod status;
pub mod sync;
#[cfg(test)]
#[path = "mod_tests.rs"]
pub mod testing;
pub mod watch;

use std::path::Path;
use std::time::Duration;

use ps_engine::{
    Config, EngineError, EngineOptions, ProbeSource, ProgressRemote, RestRemote, StoreLocation,
    SyncEngine,
};

use crate::error::{Error, Result};

/// Connect timeout for the reachability probe run before a command.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Helper to build the engine from the loaded config.
///
/// The CLI drains explicitly, so background drains after enqueue are off.
pub fn open_engine(config: &Config, queue: Option<&Path>) -> Result<SyncEngine<RestRemote>> {
    let remote = RestRemote::from_config(&config.remote).map_err(EngineError::from)?;
    let path = match queue {
        Some(path) => path.to_path_buf(),
        None => config.queue.resolved_path(),
    };
    let options = EngineOptions { drain_on_enqueue: false, ..config.engine_options() };
    Ok(SyncEngine::builder(StoreLocation::Path(path), remote).options(options).build())
}

/// Builds the reachability probe for the configured remote.
pub fn probe_source(config: &Config) -> Result<ProbeSource> {
    ProbeSource::from_url(&config.remote.url, config.sync.probe_interval())
        .map(|probe| probe.with_connect_timeout(PROBE_TIMEOUT))
        .map_err(|e| Error::InvalidRemoteUrl {
            url: config.remote.url.clone(),
            reason: e.to_string(),
        })
}

/// Probe the remote once and record the result on the engine.
///
/// With `--offline` nothing is probed and the engine stays offline.
pub async fn detect_connectivity<R>(
    engine: &SyncEngine<R>,
    config: &Config,
    offline: bool,
) -> Result<bool>
where
    R: ProgressRemote + 'static,
{
    if offline {
        engine.connectivity().set(false);
        return Ok(false);
    }
    let probe = probe_source(config)?;
    let online = probe.probe_once().await;
    tracing::debug!(addr = probe.addr(), online, "probed remote");
    engine.connectivity().set(online);
    Ok(online)
}
