//! # jamlink
//!
//! Low-latency point-to-point multi-channel audio streaming over UDP.
//!
//! One endpoint runs as the **master**: it binds a listening socket, waits
//! for a peer, and dictates the stream parameters (channel count, sample
//! rate). The other runs as the **member**: it announces itself to the
//! master and adopts whatever parameters the master advertises. Once the
//! handshake completes, both sides exchange raw f32 audio frames, one frame
//! per UDP datagram, in both directions.
//!
//! ## Architecture Overview
//!
//! ```text
//!             MASTER ENDPOINT                      MEMBER ENDPOINT
//!  ┌────────────────────────────────┐   ┌────────────────────────────────┐
//!  │  Audio Device (a DeviceBridge  │   │  Audio Device                  │
//!  │  adapter)                      │   │                                │
//!  │   capture ─┐        ┌─ play    │   │   capture ─┐        ┌─ play    │
//!  │            ▼        │          │   │            ▼        │          │
//!  │   ┌────────────┐ ┌────────────┐│   │   ┌────────────┐ ┌────────────┐│
//!  │   │ outbound   │ │ inbound    ││   │   │ outbound   │ │ inbound    ││
//!  │   │ queue (2)  │ │ ring buf(2)││   │   │ queue (2)  │ │ ring buf(2)││
//!  │   └─────┬──────┘ └─────▲──────┘│   │   └─────┬──────┘ └─────▲──────┘│
//!  │         ▼              │       │   │         ▼              │       │
//!  │   ┌──────────┐  ┌──────────┐   │   │   ┌──────────┐  ┌──────────┐   │
//!  │   │send pump │  │recv pump │   │   │   │send pump │  │recv pump │   │
//!  │   └─────┬────┘  └─────▲────┘   │   │   └─────┬────┘  └─────▲────┘   │
//!  │         ▼             │        │   │         ▼             │        │
//!  │   ┌─────────────────────────┐  │   │   ┌─────────────────────────┐  │
//!  │   │ UDP socket (one/session)│◄─┼───┼──►│ UDP socket              │  │
//!  │   └─────────────────────────┘  │   │   └─────────────────────────┘  │
//!  └────────────────────────────────┘   └────────────────────────────────┘
//! ```
//!
//! Every queue between the audio callback and the network is bounded and
//! drop-on-full: when the consumer falls behind, the newest frame is
//! discarded instead of ever blocking the producer. Audio continuity beats
//! frame delivery here.

pub mod audio;
pub mod error;
pub mod network;
pub mod protocol;
pub mod session;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate a master advertises when none is given
    pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

    /// Default channel count (stereo)
    pub const DEFAULT_CHANNELS: u16 = 2;

    /// Default UDP port for a master endpoint
    pub const DEFAULT_PORT: u16 = 4466;

    /// Capacity of the frame queues between the pumps and the audio device
    pub const DEVICE_QUEUE_FRAMES: usize = 2;
}
