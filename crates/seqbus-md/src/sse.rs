// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP Server-Sent Events client.
//!
//! Connects to `host:port`, issues a `GET path` with
//! `Accept: text/event-stream`, verifies the `200` status line, discards
//! the header block, and hands the payload of every `data:` line
//! (case-insensitive prefix) to the registered callback. Connection
//! drops and non-200 responses trigger a 1 second backoff and a
//! reconnect; the loop is owned by one worker thread.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 4096;

/// Where the event stream lives.
#[derive(Debug, Clone)]
pub struct SseEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Callback receiving the raw payload of each `data:` line.
pub type DataCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// One-worker SSE subscription with automatic reconnect.
pub struct SseSource {
    endpoint: SseEndpoint,
    callback: DataCallback,
    running: Arc<AtomicBool>,
    stream: Arc<std::sync::Mutex<Option<TcpStream>>>,
    worker: Option<JoinHandle<()>>,
}

impl SseSource {
    #[must_use]
    pub fn new(endpoint: SseEndpoint, callback: DataCallback) -> Self {
        Self {
            endpoint,
            callback,
            running: Arc::new(AtomicBool::new(false)),
            stream: Arc::new(std::sync::Mutex::new(None)),
            worker: None,
        }
    }

    pub fn start(&mut self) -> std::io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let endpoint = self.endpoint.clone();
        let callback = Arc::clone(&self.callback);
        let running = Arc::clone(&self.running);
        let stream_slot = Arc::clone(&self.stream);

        let handle = std::thread::Builder::new()
            .name("seqbus-md-sse".to_string())
            .spawn(move || run(&endpoint, &callback, &running, &stream_slot))?;
        self.worker = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // closing the socket unblocks the read
        if let Ok(mut slot) = self.stream.lock() {
            if let Some(stream) = slot.take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SseSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    endpoint: &SseEndpoint,
    callback: &DataCallback,
    running: &AtomicBool,
    stream_slot: &std::sync::Mutex<Option<TcpStream>>,
) {
    while running.load(Ordering::Relaxed) {
        let stream = match TcpStream::connect((endpoint.host.as_str(), endpoint.port)) {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!(
                    "[MD-SSE] connect to {}:{} failed: {}",
                    endpoint.host,
                    endpoint.port,
                    err
                );
                backoff(running);
                continue;
            }
        };
        if let Ok(clone) = stream.try_clone() {
            if let Ok(mut slot) = stream_slot.lock() {
                *slot = Some(clone);
            }
        }

        if let Err(err) = stream_events(endpoint, stream, callback, running) {
            if running.load(Ordering::Relaxed) {
                log::warn!("[MD-SSE] connection dropped: {}", err);
            }
        }
        if running.load(Ordering::Relaxed) {
            backoff(running);
        }
    }
}

/// One connection's lifetime: request, header block, data lines.
fn stream_events(
    endpoint: &SseEndpoint,
    mut stream: TcpStream,
    callback: &DataCallback,
    running: &AtomicBool,
) -> std::io::Result<()> {
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}:{}\r\nAccept: text/event-stream\r\nConnection: keep-alive\r\nCache-Control: no-cache\r\n\r\n",
        endpoint.path, endpoint.host, endpoint.port
    );
    stream.write_all(request.as_bytes())?;

    let mut buffer = String::with_capacity(8192);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut headers_skipped = false;

    while running.load(Ordering::Relaxed) {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));

        if !headers_skipped {
            let Some(end) = buffer.find("\r\n\r\n") else {
                continue;
            };
            if !status_is_ok(&buffer) {
                log::warn!("[MD-SSE] non-200 response from {}:{}", endpoint.host, endpoint.port);
                return Ok(());
            }
            buffer.drain(..end + 4);
            headers_skipped = true;
        }

        // consume complete lines, keep the partial tail
        while let Some(nl) = buffer.find('\n') {
            let mut line: String = buffer.drain(..=nl).collect();
            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            if let Some(payload) = data_payload(&line) {
                callback(payload);
            }
        }
    }
    Ok(())
}

fn status_is_ok(head: &str) -> bool {
    if !head.starts_with("HTTP/") {
        return false;
    }
    head.split_whitespace().nth(1) == Some("200")
}

/// Payload of a `data:` line, prefix matched case-insensitively, one
/// optional leading space stripped. Byte-wise so a multibyte character
/// near the front never splits a char boundary.
fn data_payload(line: &str) -> Option<&str> {
    let bytes = line.as_bytes();
    if bytes.len() < 5 || !bytes[..5].eq_ignore_ascii_case(b"data:") {
        return None;
    }
    let rest = &line[5..];
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn backoff(running: &AtomicBool) {
    let deadline = std::time::Instant::now() + RECONNECT_BACKOFF;
    while running.load(Ordering::Relaxed) && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
}
