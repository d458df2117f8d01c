//! The two streaming pumps
//!
//! Each running session owns two terminal loops: the receive pump
//! (socket → decode → inbound queue) and the send pump (outbound queue →
//! encode → socket). They share nothing mutable — the socket is safe
//! between them because one only reads and the other only writes — and
//! neither can block the other. Per-datagram failures are logged and
//! counted; nothing that happens here propagates back to `run()`.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::audio::bridge::{FrameSink, FrameSource};
use crate::protocol::{self, Packet, MAX_DATAGRAM_SIZE};
use crate::session::StatsInner;

/// Network → audio. Decoded frames from the pinned peer are offered to the
/// inbound queue without blocking; a full queue drops the frame, which is
/// the designed behavior under load, not a fault.
pub(crate) async fn receive_pump(
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    num_channels: u16,
    inbound: FrameSink,
    stats: Arc<StatsInner>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let (len, addr) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Receive failed: {}", e);
                continue;
            }
        };

        if addr != remote {
            stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
            debug!("Dropping datagram from {} (session peer is {})", addr, remote);
            continue;
        }

        match protocol::decode(&buf[..len]) {
            Ok((Packet::AudioFrame(frame), _)) => {
                if frame.channel_count() != num_channels as usize {
                    stats.frames_rejected.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Dropping frame with {} channels (negotiated {})",
                        frame.channel_count(),
                        num_channels
                    );
                    continue;
                }
                stats.frames_received.fetch_add(1, Ordering::Relaxed);
                if !inbound.offer(frame) {
                    stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Ok((other, _)) => {
                debug!("Ignoring {} from {} during streaming", other.kind(), addr);
            }
            Err(e) => {
                stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                debug!("Undecodable datagram from {}: {}", addr, e);
            }
        }
    }
}

/// Audio → network. Blocks on the outbound queue — this loop is paced by
/// hardware timing, not network timing — and writes one datagram per
/// frame. Ends when the hardware side of the queue goes away.
pub(crate) async fn send_pump(
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
    mut outbound: FrameSource,
    stats: Arc<StatsInner>,
) {
    while let Some(frame) = outbound.recv().await {
        let encoded = protocol::encode(&Packet::AudioFrame(frame));
        if encoded.len() > MAX_DATAGRAM_SIZE {
            stats.send_errors.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Frame encodes to {} bytes, over the {} byte datagram limit; dropping",
                encoded.len(),
                MAX_DATAGRAM_SIZE
            );
            continue;
        }

        match socket.send_to(&encoded, remote).await {
            Ok(_) => {
                stats.frames_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.send_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Send to {} failed: {}", remote, e);
            }
        }
    }

    debug!("Outbound frame queue closed; send pump exiting");
}
