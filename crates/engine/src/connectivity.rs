// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity tracking and platform signal sources.
//!
//! [`SharedConnectivity`] is the engine's view of the network, readable
//! lock-free from any task. Platform signals arrive through a
//! [`ConnectivitySource`]; the engine's watch loop feeds each change into
//! [`SyncEngine::handle_connectivity`](crate::SyncEngine::handle_connectivity).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::remote::RemoteError;

/// A connectivity signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    /// Converts a reachability flag into a signal.
    pub fn from_online(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    /// Returns true for [`Connectivity::Online`].
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// Online flag shared between the engine and its watch loop.
#[derive(Debug)]
pub struct SharedConnectivity {
    online: AtomicBool,
}

impl SharedConnectivity {
    /// Create shared state with the given initial reachability.
    pub fn new(online: bool) -> Self {
        Self { online: AtomicBool::new(online) }
    }

    /// Check if currently online.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Store a new value and return the previous one.
    pub fn set(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::AcqRel)
    }
}

impl Default for SharedConnectivity {
    fn default() -> Self {
        Self::new(false)
    }
}

/// A stream of platform connectivity signals.
///
/// Sources may repeat the current state; the engine ignores signals that do
/// not change it.
pub trait ConnectivitySource: Send {
    /// Wait for the next signal. Returns `None` when the source is closed.
    fn next_change(&mut self) -> Pin<Box<dyn Future<Output = Option<Connectivity>> + Send + '_>>;
}

/// Create a source driven by an embedder-held handle.
///
/// Use this when the platform reports connectivity through callbacks (a UI
/// toolkit, a mobile OS bridge): call [`ConnectivityHandle::online`] and
/// [`ConnectivityHandle::offline`] from those callbacks.
pub fn channel(buffer: usize) -> (ConnectivityHandle, ChannelSource) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ConnectivityHandle { tx }, ChannelSource { rx })
}

/// Sending half of [`channel`].
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    tx: mpsc::Sender<Connectivity>,
}

impl ConnectivityHandle {
    /// Report that the platform is online.
    pub async fn online(&self) -> bool {
        self.send(Connectivity::Online).await
    }

    /// Report that the platform is offline.
    pub async fn offline(&self) -> bool {
        self.send(Connectivity::Offline).await
    }

    /// Report a signal. Returns false if the source was dropped.
    pub async fn send(&self, signal: Connectivity) -> bool {
        self.tx.send(signal).await.is_ok()
    }
}

/// Receiving half of [`channel`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Connectivity>,
}

impl ConnectivitySource for ChannelSource {
    fn next_change(&mut self) -> Pin<Box<dyn Future<Output = Option<Connectivity>> + Send + '_>> {
        Box::pin(self.rx.recv())
    }
}

/// Polls TCP reachability of the remote host.
///
/// Reports a signal on the first probe and afterwards only when the result
/// flips.
#[derive(Debug)]
pub struct ProbeSource {
    addr: String,
    interval: Duration,
    connect_timeout: Duration,
    last: Option<bool>,
}

impl ProbeSource {
    /// Probe `addr` (`host:port`) every `interval`.
    pub fn new(addr: impl Into<String>, interval: Duration) -> Self {
        ProbeSource {
            addr: addr.into(),
            interval,
            connect_timeout: Duration::from_secs(3),
            last: None,
        }
    }

    /// Probe the host of an HTTP(S) URL, using the scheme's default port
    /// when none is given.
    pub fn from_url(url: &str, interval: Duration) -> Result<Self, RemoteError> {
        Ok(Self::new(probe_addr(url)?, interval))
    }

    /// Override the per-probe connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the probed address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Attempt a single TCP connection.
    pub async fn probe_once(&self) -> bool {
        matches!(
            tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }
}

impl ConnectivitySource for ProbeSource {
    fn next_change(&mut self) -> Pin<Box<dyn Future<Output = Option<Connectivity>> + Send + '_>> {
        Box::pin(async move {
            loop {
                if self.last.is_some() {
                    tokio::time::sleep(self.interval).await;
                }
                let online = self.probe_once().await;
                if self.last != Some(online) {
                    self.last = Some(online);
                    tracing::debug!(addr = %self.addr, online, "connectivity probe changed");
                    return Some(Connectivity::from_online(online));
                }
            }
        })
    }
}

/// Extract `host:port` from a URL for probing.
pub fn probe_addr(url: &str) -> Result<String, RemoteError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|e| RemoteError::InvalidConfig(format!("{url}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| RemoteError::InvalidConfig(format!("{url}: missing host")))?;
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| RemoteError::InvalidConfig(format!("{url}: missing port")))?;
    if host.contains(':') {
        Ok(format!("[{host}]:{port}"))
    } else {
        Ok(format!("{host}:{port}"))
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
