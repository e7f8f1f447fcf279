//! UDP network listener
//!
//! Binds the OSC socket on the caller's thread, so bind errors are reported
//! synchronously, then moves it into a dedicated `osc-listener` thread. That
//! thread runs a current-thread tokio runtime and waits on either a datagram
//! or the shutdown signal, so stopping never waits on a poll interval.
//!
//! The listener only decodes and enqueues. It never sees routing or target
//! state.

use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use serde::Serialize;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::constants::{DEFAULT_RECV_BUFFER_BYTES, MAX_DATAGRAM_SIZE};
use crate::error::{NetworkError, ServerError};
use crate::protocol::decode_packet;
use crate::server::queue::SharedQueue;

/// How long `spawn` waits for the listener thread to come up
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Back-off after a failed receive so a persistent socket error cannot spin
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(5);

/// Socket settings for a listener
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub recv_buffer_bytes: usize,
    pub max_datagram_bytes: usize,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self {
            recv_buffer_bytes: DEFAULT_RECV_BUFFER_BYTES,
            max_datagram_bytes: MAX_DATAGRAM_SIZE,
        }
    }
}

/// Live counters updated by the listener thread
#[derive(Debug)]
pub struct ListenerStats {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    messages: AtomicU64,
    decode_errors: AtomicU64,
    dropped: AtomicU64,
    receive_errors: AtomicU64,
    started_at: DateTime<Utc>,
}

impl ListenerStats {
    fn new() -> Self {
        Self {
            datagrams: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            messages: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }
}

/// Point-in-time copy of [`ListenerStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerStatsSnapshot {
    pub datagrams: u64,
    pub bytes: u64,
    /// Messages decoded and enqueued
    pub messages: u64,
    pub decode_errors: u64,
    /// Messages refused by a full queue
    pub dropped: u64,
    pub receive_errors: u64,
    pub started_at: DateTime<Utc>,
}

impl ListenerStatsSnapshot {
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Running listener thread
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<ListenerStats>,
}

impl ListenerHandle {
    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> ListenerStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the thread and wait for it to exit. The socket closes with it.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The receiver may already be gone if the thread exited on its own.
        let _ = self.shutdown.send(true);
        if thread.join().is_err() {
            tracing::error!("OSC listener thread panicked");
        }
        tracing::debug!("OSC listener on {} shut down", self.local_addr);
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create the UDP socket with address reuse and a large receive buffer
pub fn bind_socket(addr: SocketAddr, recv_buffer_bytes: usize) -> Result<std::net::UdpSocket, NetworkError> {
    let option = |option: &'static str| move |source| NetworkError::SocketOption { option, source };

    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(option("socket"))?;
    socket.set_reuse_address(true).map_err(option("SO_REUSEADDR"))?;

    // The kernel may cap the buffer below the request; that is not fatal.
    if let Err(e) = socket.set_recv_buffer_size(recv_buffer_bytes) {
        tracing::warn!("Could not set receive buffer to {} bytes: {}", recv_buffer_bytes, e);
    }

    socket
        .bind(&addr.into())
        .map_err(|source| NetworkError::BindFailed {
            addr: addr.to_string(),
            source,
        })?;
    socket.set_nonblocking(true).map_err(option("O_NONBLOCK"))?;

    Ok(socket.into())
}

/// Bind `addr` and start the listener thread.
///
/// `running` is checked after every wakeup; clearing it (or calling
/// [`ListenerHandle::shutdown`]) ends the loop.
pub fn spawn(
    addr: SocketAddr,
    settings: &ListenerSettings,
    queue: SharedQueue,
    running: Arc<AtomicBool>,
) -> Result<ListenerHandle, ServerError> {
    let std_socket = bind_socket(addr, settings.recv_buffer_bytes)?;
    let local_addr = std_socket.local_addr().map_err(|e| NetworkError::Runtime(e.to_string()))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (ready_tx, ready_rx) = bounded::<Result<(), NetworkError>>(1);
    let stats = Arc::new(ListenerStats::new());
    let max_datagram = settings.max_datagram_bytes;

    let thread_stats = stats.clone();
    let thread = thread::Builder::new()
        .name("osc-listener".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(NetworkError::Runtime(e.to_string())));
                    return;
                }
            };

            runtime.block_on(async move {
                let socket = match UdpSocket::from_std(std_socket) {
                    Ok(socket) => socket,
                    Err(e) => {
                        let _ = ready_tx.send(Err(NetworkError::Runtime(e.to_string())));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                receive_loop(socket, max_datagram, queue, running, thread_stats, shutdown_rx).await;
            });
        })
        .map_err(|e| ServerError::Spawn(e.to_string()))?;

    let mut handle = ListenerHandle {
        local_addr,
        shutdown: shutdown_tx,
        thread: Some(thread),
        stats,
    };

    match ready_rx.recv_timeout(READY_TIMEOUT) {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            handle.shutdown();
            Err(e.into())
        }
        Err(_) => {
            handle.shutdown();
            Err(ServerError::Spawn("listener thread did not report readiness".to_string()))
        }
    }
}

async fn receive_loop(
    socket: UdpSocket,
    max_datagram: usize,
    queue: SharedQueue,
    running: Arc<AtomicBool>,
    stats: Arc<ListenerStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; max_datagram];
    tracing::info!("OSC listener started on {:?}", socket.local_addr().ok());

    while running.load(Ordering::Acquire) {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => handle_datagram(&buf[..len], peer, &queue, &stats),
                Err(e) => tokio::time::sleep(handle_receive_error(&e, &stats)).await,
            },
        }
    }

    tracing::info!("OSC listener stopped");
}

/// Count and log a failed receive, returning how long to back off
fn handle_receive_error(err: &std::io::Error, stats: &ListenerStats) -> Duration {
    // e.g. ICMP port-unreachable surfacing as ConnectionReset on Windows
    stats.receive_errors.fetch_add(1, Ordering::Relaxed);
    tracing::warn!("{}", NetworkError::ReceiveFailed(err.to_string()));
    RECEIVE_ERROR_BACKOFF
}

fn handle_datagram(data: &[u8], peer: SocketAddr, queue: &SharedQueue, stats: &ListenerStats) {
    stats.datagrams.fetch_add(1, Ordering::Relaxed);
    stats.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);

    let messages = match decode_packet(data) {
        Ok(messages) => messages,
        Err(e) => {
            stats.decode_errors.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dropping malformed datagram from {}: {}", peer, e);
            return;
        }
    };

    for msg in messages {
        tracing::trace!("OSC message from {}: {} {:?}", peer, msg.address, msg.args);
        if queue.push(msg) {
            stats.messages.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
