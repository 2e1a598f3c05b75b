// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]
#![allow(clippy::unwrap_used)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// Remote url nothing listens on.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1";

/// Isolated home for one test: state, config and queue live under it.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Sandbox { dir: TempDir::new().unwrap() }
    }

    /// Sandbox whose config points at `url`.
    pub fn with_remote(url: &str) -> Self {
        let sandbox = Self::new();
        let config = format!("[remote]\nurl = \"{}\"\n\n[sync]\ndispatch_timeout_ms = 2000\n", url);
        std::fs::write(sandbox.config_path(), config).unwrap();
        sandbox
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.dir.path().join("queue.db")
    }

    /// `psync` with the sandbox environment and queue path applied.
    pub fn psync(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("psync");
        let home = self.dir.path();
        cmd.env("HOME", home)
            .env("XDG_STATE_HOME", home.join("state"))
            .env("XDG_CONFIG_HOME", home.join("config"))
            .env_remove("PROGSYNC_API_KEY")
            .env_remove("RUST_LOG")
            .arg("--queue")
            .arg(self.queue_path());
        if self.config_path().exists() {
            cmd.arg("--config").arg(self.config_path());
        }
        cmd
    }
}

/// Minimal HTTP server that answers every request with `status`.
pub struct StubServer {
    pub url: String,
    requests: Arc<AtomicUsize>,
}

impl StubServer {
    pub fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                // Reachability probes connect and hang up without a request.
                if read_request(&mut stream) {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let reply = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        status
                    );
                    let _ = stream.write_all(reply.as_bytes());
                }
            }
        });
        StubServer { url, requests }
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// Reads one request (headers and body). Returns false on an empty connection.
fn read_request(stream: &mut std::net::TcpStream) -> bool {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => return false,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    true
}
