//! Session lifecycle
//!
//! A [`Session`] owns one endpoint of a point-to-point stream: its role,
//! its UDP socket, and — once running — the two pumps that move frames
//! between the network and the audio device bridge. Sessions are plain
//! values; nothing here is process-global, and several sessions can
//! coexist in one process (the loopback tests rely on that).
//!
//! Lifecycle: construct with [`Session::master`] or [`Session::member`]
//! (both bind the socket immediately; failures there are fatal), then
//! [`Session::run`] blocks through three phases: handshake, device attach,
//! streaming. Streaming is entered exactly once and lasts until the
//! [`ShutdownHandle`] fires — a lost peer goes unnoticed by design.

pub(crate) mod handshake;
pub(crate) mod pump;

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::info;

use crate::audio::bridge::DeviceBridge;
use crate::error::{Error, NetworkError, Result};
use crate::network::udp::{adjacent_local_addr, bind_socket};

/// Which side of the session this endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listens for a peer and dictates the stream parameters
    Master,
    /// Connects to a master and adopts its parameters
    Member,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Member => write!(f, "member"),
        }
    }
}

/// Negotiated stream parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub num_channels: u16,
    pub sample_rate: u32,
}

/// Observable lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Streaming {
        num_channels: u16,
        sample_rate: u32,
    },
    Terminated,
}

/// Clonable handle that stops a running session.
///
/// Firing it unblocks [`Session::run`] wherever it is waiting — the
/// handshake included — and cancels both pumps. Firing more than once is
/// harmless.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn signal(&self) {
        // send_replace stores the value even with no receiver subscribed
        // yet, so a signal that races session startup still lands.
        self.tx.send_replace(true);
    }
}

/// Snapshot of a session's streaming counters
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Frames encoded and written to the socket
    pub frames_sent: u64,
    /// Frames decoded from the peer and accepted
    pub frames_received: u64,
    /// Accepted frames dropped because the inbound queue was full
    pub frames_dropped: u64,
    /// Datagrams rejected: wrong source address or wrong frame shape
    pub frames_rejected: u64,
    /// Datagrams that failed to decode
    pub decode_errors: u64,
    /// Datagram writes that failed or were oversized
    pub send_errors: u64,
}

#[derive(Default)]
pub(crate) struct StatsInner {
    pub frames_sent: AtomicU64,
    pub frames_received: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_rejected: AtomicU64,
    pub decode_errors: AtomicU64,
    pub send_errors: AtomicU64,
}

impl StatsInner {
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// One endpoint of a point-to-point audio stream
pub struct Session {
    role: Role,
    name: String,
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    params: Option<StreamParams>,
    state_tx: watch::Sender<SessionState>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    stats: Arc<StatsInner>,
}

impl Session {
    /// Create a master session listening at `bind_addr`, advertising the
    /// given stream parameters to whichever member arrives first.
    ///
    /// Must be called within a tokio runtime. Fails if the address cannot
    /// be parsed or bound, or if the parameters cannot go on the wire
    /// (channel count is a single byte there).
    pub fn master(
        name: &str,
        bind_addr: &str,
        num_channels: u16,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 || num_channels > u8::MAX as u16 {
            return Err(Error::Config(format!(
                "channel count must be 1..={}, got {}",
                u8::MAX,
                num_channels
            )));
        }
        if sample_rate == 0 {
            return Err(Error::Config("sample rate must be non-zero".into()));
        }

        let requested: SocketAddr = bind_addr
            .parse()
            .map_err(|_| NetworkError::InvalidAddress(bind_addr.to_string()))?;

        let session = Self::bind(
            Role::Master,
            name,
            requested,
            None,
            Some(StreamParams {
                num_channels,
                sample_rate,
            }),
        )?;
        info!("{} listening", session);
        Ok(session)
    }

    /// Create a member session that will connect to the master at
    /// `remote_addr`, listening on the adjacent port by convention.
    ///
    /// Must be called within a tokio runtime. Stream parameters stay
    /// unknown until the handshake completes.
    pub fn member(name: &str, remote_addr: &str) -> Result<Self> {
        let remote = remote_addr
            .to_socket_addrs()
            .map_err(|e| NetworkError::InvalidAddress(format!("{remote_addr}: {e}")))?
            .next()
            .ok_or_else(|| NetworkError::InvalidAddress(remote_addr.to_string()))?;

        let local = adjacent_local_addr(remote)?;
        let session = Self::bind(Role::Member, name, local, Some(remote), None)?;
        info!("{} listening", session);
        Ok(session)
    }

    fn bind(
        role: Role,
        name: &str,
        local: SocketAddr,
        remote: Option<SocketAddr>,
        params: Option<StreamParams>,
    ) -> Result<Self> {
        let socket = UdpSocket::from_std(bind_socket(local)?)?;
        let local_addr = socket.local_addr()?;

        Ok(Self {
            role,
            name: name.to_string(),
            socket: Arc::new(socket),
            local_addr,
            remote_addr: remote,
            params,
            state_tx: watch::channel(SessionState::AwaitingHandshake).0,
            shutdown_tx: Arc::new(watch::channel(false).0),
            stats: Arc::new(StatsInner::default()),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The peer address, once known (at construction for a member, after
    /// the handshake for a master)
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The stream parameters, authoritative only once streaming has
    /// started (a master holds its configured values from construction)
    pub fn stream_params(&self) -> Option<StreamParams> {
        self.params
    }

    /// Subscribe to lifecycle state changes
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Handle that stops this session from anywhere
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Snapshot of the streaming counters
    pub fn stats(&self) -> SessionStats {
        self.stats.snapshot()
    }

    /// Drive the session to completion.
    ///
    /// Phase 1 runs the handshake to `Negotiated`; phase 2 attaches the
    /// device bridge with the now-final parameters; phase 3 starts the
    /// receive and send pumps and blocks until the shutdown handle fires.
    /// Startup failures (bind happened earlier; here: handshake send,
    /// device attach) are returned; per-datagram trouble during streaming
    /// is logged and counted, never returned.
    pub async fn run<B: DeviceBridge>(&mut self, bridge: &B) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("{} awaiting handshake", self);
        let negotiated = tokio::select! {
            negotiated = self.negotiate() => negotiated?,
            _ = wait_signal(&mut shutdown_rx) => {
                self.state_tx.send_replace(SessionState::Terminated);
                info!("{} shut down before handshake", self);
                return Ok(());
            }
        };

        self.remote_addr = Some(negotiated.remote);
        self.params = Some(StreamParams {
            num_channels: negotiated.num_channels,
            sample_rate: negotiated.sample_rate,
        });
        info!(
            "{}: {} channels at {} Hz",
            self, negotiated.num_channels, negotiated.sample_rate
        );

        let handle = bridge.attach(&self.name, negotiated.num_channels, negotiated.sample_rate)?;
        let num_channels = handle.num_channels();
        let sample_rate = handle.sample_rate();
        let (inbound, outbound) = handle.into_queues();

        self.state_tx.send_replace(SessionState::Streaming {
            num_channels,
            sample_rate,
        });

        let receive = tokio::spawn(pump::receive_pump(
            self.socket.clone(),
            negotiated.remote,
            num_channels,
            inbound,
            self.stats.clone(),
        ));
        let send = tokio::spawn(pump::send_pump(
            self.socket.clone(),
            negotiated.remote,
            outbound,
            self.stats.clone(),
        ));

        wait_signal(&mut shutdown_rx).await;

        receive.abort();
        send.abort();
        let _ = receive.await;
        let _ = send.await;

        self.state_tx.send_replace(SessionState::Terminated);
        info!("{} terminated", self);
        Ok(())
    }

    async fn negotiate(&self) -> Result<handshake::Negotiated> {
        match self.role {
            Role::Master => {
                let Some(params) = self.params else {
                    return Err(Error::Config("master session without stream parameters".into()));
                };
                handshake::listen(&self.socket, params).await
            }
            Role::Member => {
                let Some(remote) = self.remote_addr else {
                    return Err(Error::Config("member session without a remote address".into()));
                };
                handshake::connect(&self.socket, remote).await
            }
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remote_addr {
            Some(remote) => write!(
                f,
                "{} \"{}\" ({} <-> {})",
                self.role, self.name, self.local_addr, remote
            ),
            None => write!(
                f,
                "{} \"{}\" ({}, peer unknown)",
                self.role, self.name, self.local_addr
            ),
        }
    }
}

async fn wait_signal(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
