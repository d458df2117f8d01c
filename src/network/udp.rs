//! UDP socket setup
//!
//! Sockets are created through socket2 so the kernel buffers can be sized
//! for audio bursts before the socket is handed to tokio.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::NetworkError;

/// Kernel send/receive buffer size requested for session sockets
const SOCKET_BUFFER_SIZE: usize = 1024 * 1024;

/// Bind a non-blocking UDP socket at `addr`, ready for
/// `tokio::net::UdpSocket::from_std`.
pub fn bind_socket(addr: SocketAddr) -> Result<std::net::UdpSocket, NetworkError> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    // Best effort; some platforms clamp these.
    let _ = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE);
    let _ = socket.set_send_buffer_size(SOCKET_BUFFER_SIZE);

    socket
        .set_nonblocking(true)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .bind(&addr.into())
        .map_err(|e| NetworkError::BindFailed(format!("{addr}: {e}")))?;

    Ok(socket.into())
}

/// Derive a member's local listening address from the remote it will
/// connect to: the unspecified address of the same family, one port up.
pub fn adjacent_local_addr(remote: SocketAddr) -> Result<SocketAddr, NetworkError> {
    let port = remote
        .port()
        .checked_add(1)
        .ok_or_else(|| NetworkError::InvalidAddress(format!("no port adjacent to {remote}")))?;

    let ip: IpAddr = match remote {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };

    Ok(SocketAddr::new(ip, port))
}
