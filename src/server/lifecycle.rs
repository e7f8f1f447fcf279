//! Server lifecycle
//!
//! `ServerRuntime` owns everything that exists while the router is serving:
//! the running flag, the listener thread and the queue between them. There
//! is no global state; whoever owns the runtime owns the server.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{NetworkError, ServerError};
use crate::server::listener::{self, ListenerHandle, ListenerSettings, ListenerStatsSnapshot};
use crate::server::queue::{MessageQueue, SharedQueue};

/// Server lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServerState::Stopped => "stopped",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Owner of the listener, its queue and the running flag
pub struct ServerRuntime {
    state: ServerState,
    running: Arc<AtomicBool>,
    queue: SharedQueue,
    listener: Option<ListenerHandle>,
    settings: ListenerSettings,
}

impl ServerRuntime {
    pub fn new(config: &ServerConfig) -> Self {
        let settings = ListenerSettings {
            recv_buffer_bytes: config.recv_buffer_bytes,
            max_datagram_bytes: config.max_datagram_bytes,
        };
        Self::with_settings(config.queue_capacity, settings)
    }

    pub fn with_settings(queue_capacity: usize, settings: ListenerSettings) -> Self {
        Self {
            state: ServerState::Stopped,
            running: Arc::new(AtomicBool::new(false)),
            queue: Arc::new(MessageQueue::new(queue_capacity.max(1))),
            listener: None,
            settings,
        }
    }

    /// Bind `ip:port` and start receiving.
    ///
    /// Port 0 binds an ephemeral port; the returned address is the one
    /// actually bound. Fails with [`ServerError::AlreadyRunning`] if a
    /// listener already exists, leaving it untouched.
    pub fn start(&mut self, ip: &str, port: u16) -> Result<SocketAddr, ServerError> {
        if matches!(self.state, ServerState::Running | ServerState::Starting) {
            tracing::info!("Start requested while {}", self.state);
            return Err(ServerError::AlreadyRunning);
        }

        self.state = ServerState::Starting;
        let ip: IpAddr = match ip.trim().parse() {
            Ok(ip) => ip,
            Err(_) => {
                self.state = ServerState::Stopped;
                return Err(NetworkError::InvalidAddress(ip.to_string()).into());
            }
        };
        let addr = SocketAddr::new(ip, port);

        self.running.store(true, Ordering::Release);
        match listener::spawn(addr, &self.settings, self.queue.clone(), self.running.clone()) {
            Ok(handle) => {
                let local_addr = handle.local_addr();
                self.listener = Some(handle);
                self.state = ServerState::Running;
                tracing::info!("OSC server listening on {}", local_addr);
                Ok(local_addr)
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                self.state = ServerState::Stopped;
                tracing::error!("Failed to start OSC server on {}: {}", addr, e);
                Err(e)
            }
        }
    }

    /// Stop the listener and discard anything still queued.
    /// Safe to call in any state.
    pub fn stop(&mut self) {
        if self.state == ServerState::Stopped && self.listener.is_none() {
            return;
        }

        self.state = ServerState::Stopping;
        self.running.store(false, Ordering::Release);
        if let Some(mut handle) = self.listener.take() {
            handle.shutdown();
        }

        let discarded = self.queue.clear();
        if discarded > 0 {
            tracing::debug!("Discarded {} queued messages", discarded);
        }
        self.state = ServerState::Stopped;
        tracing::info!("OSC server stopped");
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn queue(&self) -> &SharedQueue {
        &self.queue
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(ListenerHandle::local_addr)
    }

    pub fn listener_stats(&self) -> Option<ListenerStatsSnapshot> {
        self.listener.as_ref().map(ListenerHandle::stats)
    }
}

impl Default for ServerRuntime {
    fn default() -> Self {
        Self::new(&ServerConfig::default())
    }
}

impl Drop for ServerRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}
