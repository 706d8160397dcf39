// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multicast receive worker.
//!
//! One dedicated thread per joined group drains the socket through a mio
//! poll loop (1 ms tick for shutdown checks, edge-triggered drain) into a
//! 64 KiB scratch buffer, runs the duplicate window, and fans the
//! datagram out to every registered handler. Handlers run on the worker
//! and are isolated behind a panic boundary; a panicking handler never
//! kills the loop.

use crate::transport::dedup::DedupWindow;
use crate::transport::MAX_DATAGRAM_SIZE;
use mio::{Events, Interest, Poll, Token};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Raw datagram callback: borrowed payload plus source address.
pub type DatagramHandler = Arc<dyn Fn(&[u8], SocketAddr) + Send + Sync>;

const SOCKET_TOKEN: Token = Token(0);
const POLL_TICK: Duration = Duration::from_millis(1);

/// Receive-side tuning taken from [`crate::config::BusConfig`].
#[derive(Debug, Clone)]
pub struct ReceiverOptions {
    /// Interface to join the group on; unspecified lets the OS pick.
    pub join_iface: Option<Ipv4Addr>,
    /// Duplicate window switch (`MCAST_DEDUP`).
    pub dedup: bool,
    /// Duplicate window length (`MCAST_DEDUP_MS`).
    pub dedup_window_ms: u64,
}

impl Default for ReceiverOptions {
    fn default() -> Self {
        Self {
            join_iface: None,
            dedup: true,
            dedup_window_ms: crate::config::DEFAULT_DEDUP_WINDOW_MS,
        }
    }
}

/// Worker counters, readable from any thread.
#[derive(Debug, Default)]
pub struct ReceiverMetrics {
    pub datagrams_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub duplicates_dropped: AtomicU64,
    pub handler_panics: AtomicU64,
}

impl ReceiverMetrics {
    /// `(received, bytes, duplicates, panics)` snapshot.
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.datagrams_received.load(Ordering::Relaxed),
            self.bytes_received.load(Ordering::Relaxed),
            self.duplicates_dropped.load(Ordering::Relaxed),
            self.handler_panics.load(Ordering::Relaxed),
        )
    }
}

/// Multicast group receiver with one owned worker thread.
///
/// Handlers registered through [`subscribe`](Self::subscribe) live for the
/// lifetime of the receiver; the list is append-only. `start`/`stop` are
/// idempotent; `Drop` stops the worker.
pub struct McastReceiver {
    group: Ipv4Addr,
    port: u16,
    opts: ReceiverOptions,
    handlers: Arc<Mutex<Vec<DatagramHandler>>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    metrics: Arc<ReceiverMetrics>,
}

impl McastReceiver {
    #[must_use]
    pub fn new(group: Ipv4Addr, port: u16, opts: ReceiverOptions) -> Self {
        Self {
            group,
            port,
            opts,
            handlers: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            metrics: Arc::new(ReceiverMetrics::default()),
        }
    }

    /// Register a datagram handler. Handlers run on the receive worker in
    /// registration order and must not block indefinitely.
    pub fn subscribe(&self, handler: DatagramHandler) {
        self.handlers.lock().push(handler);
    }

    #[must_use]
    pub fn metrics(&self) -> Arc<ReceiverMetrics> {
        Arc::clone(&self.metrics)
    }

    #[must_use]
    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the handler fanout for a datagram that did not come off the
    /// socket (in-process bus wiring, tests). Bypasses the duplicate
    /// window; in-process delivery has no OS duplicates to cancel.
    pub fn inject(&self, data: &[u8]) {
        let loopback = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));
        dispatch(&self.handlers, data, loopback, &self.metrics);
    }

    /// Create the socket, join the group and spawn the worker.
    ///
    /// Socket creation, bind and group-join failures are returned to the
    /// caller; they are fatal at participant startup.
    pub fn start(&mut self) -> io::Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let socket = match self.open_socket() {
            Ok(socket) => socket,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        let group = self.group;
        let iface = self.opts.join_iface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        let running = Arc::clone(&self.running);
        let handlers = Arc::clone(&self.handlers);
        let metrics = Arc::clone(&self.metrics);
        let mut window = DedupWindow::new(self.opts.dedup, self.opts.dedup_window_ms);

        let handle = std::thread::Builder::new()
            .name("seqbus-mcast-rx".to_string())
            .spawn(move || {
                run_loop(socket, group, iface, running, handlers, metrics, &mut window);
            })?;

        self.worker = Some(handle);
        log::debug!(
            "[MCAST-RX] started group={}:{} iface={} dedup={}",
            self.group,
            self.port,
            iface,
            self.opts.dedup
        );
        Ok(())
    }

    /// Signal the worker and join it. Idempotent.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        log::debug!("[MCAST-RX] stopped group={}:{}", self.group, self.port);
    }

    fn open_socket(&self) -> io::Result<std::net::UdpSocket> {
        if !self.group.is_multicast() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a multicast group", self.group),
            ));
        }

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        set_reuseport(&socket)?;
        socket.set_nonblocking(true)?;

        // Binding to the group address (where the platform allows it)
        // avoids duplicate delivery of broadcast and group copies on the
        // same port.
        #[cfg(target_os = "linux")]
        let bind_addr = SocketAddrV4::new(self.group, self.port);
        #[cfg(not(target_os = "linux"))]
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port);

        socket.bind(&SocketAddr::from(bind_addr).into())?;

        let iface = self.opts.join_iface.unwrap_or(Ipv4Addr::UNSPECIFIED);
        socket.join_multicast_v4(&self.group, &iface)?;
        log::debug!(
            "[MCAST-RX] joined group={} iface={} bind={}",
            self.group,
            iface,
            bind_addr
        );

        Ok(socket.into())
    }
}

impl Drop for McastReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Set SO_REUSEPORT so several consumers on one host can share a group
/// port. Unix only.
#[cfg(unix)]
fn set_reuseport(socket: &Socket) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let optval: libc::c_int = 1;
    // SAFETY: setsockopt FFI with valid fd, standard socket option, and correctly sized optval pointer
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            std::ptr::addr_of!(optval).cast(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Snapshot the handler list under the lock, dispatch outside it.
fn dispatch(
    handlers: &Mutex<Vec<DatagramHandler>>,
    data: &[u8],
    src: SocketAddr,
    metrics: &ReceiverMetrics,
) {
    let snapshot: Vec<DatagramHandler> = handlers.lock().clone();
    for handler in &snapshot {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler(data, src);
        }));
        if result.is_err() {
            metrics.handler_panics.fetch_add(1, Ordering::Relaxed);
            log::warn!("[MCAST-RX] handler panicked on {} byte datagram", data.len());
        }
    }
}

fn run_loop(
    socket: std::net::UdpSocket,
    group: Ipv4Addr,
    iface: Ipv4Addr,
    running: Arc<AtomicBool>,
    handlers: Arc<Mutex<Vec<DatagramHandler>>>,
    metrics: Arc<ReceiverMetrics>,
    window: &mut DedupWindow,
) {
    let mut poll = match Poll::new() {
        Ok(poll) => poll,
        Err(err) => {
            log::error!("[MCAST-RX] failed to create poll: {}", err);
            running.store(false, Ordering::SeqCst);
            return;
        }
    };
    let mut events = Events::with_capacity(16);
    let mut mio_socket = mio::net::UdpSocket::from_std(socket);
    if let Err(err) = poll
        .registry()
        .register(&mut mio_socket, SOCKET_TOKEN, Interest::READABLE)
    {
        log::error!("[MCAST-RX] failed to register socket: {}", err);
        running.store(false, Ordering::SeqCst);
        return;
    }

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    while running.load(Ordering::Relaxed) {
        if let Err(err) = poll.poll(&mut events, Some(POLL_TICK)) {
            if err.kind() != io::ErrorKind::Interrupted {
                log::warn!("[MCAST-RX] poll error: {}", err);
            }
            continue;
        }

        for event in events.iter() {
            if event.token() != SOCKET_TOKEN {
                continue;
            }

            // Drain everything the kernel has queued before polling again.
            loop {
                let (len, src) = match mio_socket.recv_from(&mut buf) {
                    Ok(result) => result,
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        log::warn!("[MCAST-RX] recv error: {}", err);
                        break;
                    }
                };

                metrics.datagrams_received.fetch_add(1, Ordering::Relaxed);
                metrics.bytes_received.fetch_add(len as u64, Ordering::Relaxed);

                if window.is_duplicate(src, &buf[..len]) {
                    metrics.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[MCAST-RX] dropped duplicate len={} src={}", len, src);
                    continue;
                }

                dispatch(&handlers, &buf[..len], src, &metrics);
            }
        }
    }

    if let Err(err) = mio_socket.leave_multicast_v4(&group, &iface) {
        log::debug!("[MCAST-RX] leave group failed (shutdown): {}", err);
    }
}
