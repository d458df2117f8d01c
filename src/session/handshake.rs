//! One-shot session handshake
//!
//! `Idle -> AwaitingPeer -> Negotiated`, one path per role, executed once
//! before any audio flows. The master waits for a [`Packet::HandshakeRequest`],
//! pins that sender as its peer, and answers with its configured stream
//! parameters. The member sends one request to the configured master and
//! waits for the [`Packet::HandshakeResponse`], adopting whatever it
//! advertises — the member has no way to refuse an incompatible
//! configuration; negotiation is deliberately master-authoritative.
//!
//! There is no retry and no timeout: the exchange either completes or the
//! session is shut down externally. Every datagram that is not the awaited
//! handshake message is logged and discarded, never fatal.

use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, Result};
use crate::protocol::{self, Packet, MAX_DATAGRAM_SIZE};
use crate::session::StreamParams;

/// Outcome of a completed handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Negotiated {
    pub remote: SocketAddr,
    pub num_channels: u16,
    pub sample_rate: u32,
}

/// Master path: wait for a request, pin the peer, advertise parameters.
pub(crate) async fn listen(socket: &UdpSocket, params: StreamParams) -> Result<Negotiated> {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Handshake receive failed: {}", e);
                continue;
            }
        };

        match protocol::decode(&buf[..len]) {
            Ok((Packet::HandshakeRequest, _)) => {
                info!("Handshake request from {}", addr);
                let response = Packet::HandshakeResponse {
                    num_channels: params.num_channels as u8,
                    sample_rate: params.sample_rate,
                };
                if let Err(e) = socket.send_to(&protocol::encode(&response), addr).await {
                    // Keep listening; a peer that never hears back cannot
                    // stream anyway, and another request may still arrive.
                    warn!("Failed to answer handshake from {}: {}", addr, e);
                    continue;
                }
                return Ok(Negotiated {
                    remote: addr,
                    num_channels: params.num_channels,
                    sample_rate: params.sample_rate,
                });
            }
            Ok((other, _)) => {
                debug!("Ignoring {} from {} before handshake", other.kind(), addr);
            }
            Err(e) => {
                debug!("Ignoring undecodable datagram from {}: {}", addr, e);
            }
        }
    }
}

/// Member path: announce to the master, then adopt its parameters.
pub(crate) async fn connect(socket: &UdpSocket, remote: SocketAddr) -> Result<Negotiated> {
    let request = protocol::encode(&Packet::HandshakeRequest);
    socket
        .send_to(&request, remote)
        .await
        .map_err(|e| NetworkError::SendFailed(format!("handshake request to {remote}: {e}")))?;
    info!("Handshake request sent to {}", remote);

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Handshake receive failed: {}", e);
                continue;
            }
        };

        if addr != remote {
            debug!("Ignoring datagram from {} while awaiting {}", addr, remote);
            continue;
        }

        match protocol::decode(&buf[..len]) {
            Ok((
                Packet::HandshakeResponse {
                    num_channels,
                    sample_rate,
                },
                _,
            )) => {
                info!(
                    "Handshake response from {}: {} channels at {} Hz",
                    remote, num_channels, sample_rate
                );
                return Ok(Negotiated {
                    remote,
                    num_channels: num_channels as u16,
                    sample_rate,
                });
            }
            Ok((other, _)) => {
                debug!("Ignoring {} from {} before handshake", other.kind(), addr);
            }
            Err(e) => {
                debug!("Ignoring undecodable datagram from {}: {}", addr, e);
            }
        }
    }
}
