//! Network subsystem for UDP audio transport

pub mod udp;

pub use udp::{adjacent_local_addr, bind_socket};
