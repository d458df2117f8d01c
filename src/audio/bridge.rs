//! Audio device bridge
//!
//! The session core never talks to audio hardware directly. It consumes a
//! [`DeviceBridge`]: a capability that, given a client name and the
//! negotiated stream parameters, attaches to some audio device and returns
//! a [`DeviceHandle`] carrying the two frame queues and the authoritative
//! channel count / sample rate.
//!
//! Both queues are bounded and drop-on-full on the producer side:
//!
//! - **inbound** (network → hardware): the receive pump offers decoded
//!   frames through a [`FrameSink`]; the hardware callback drains the
//!   underlying ring buffer without blocking.
//! - **outbound** (hardware → network): the hardware callback offers
//!   captured frames through a [`FrameProducer`] (a `try_send`, never a
//!   wait); the send pump awaits frames on the [`FrameSource`] side.
//!
//! The producer never blocking is the invariant the whole engine is built
//! around: the audio callback runs on a real-time thread that must not
//! stall, whatever the network is doing.

use tokio::sync::mpsc;

use crate::audio::buffer::{create_shared_buffer, SharedRingBuffer};
use crate::audio::frame::Frame;
use crate::error::AudioError;

/// Something that can attach to an audio device and expose it as a pair of
/// frame queues.
///
/// Implemented by hardware adapters (see `audio::device` with the `device`
/// feature) and by in-memory test bridges.
pub trait DeviceBridge {
    /// Attach to the device as `name` with the negotiated parameters.
    ///
    /// The returned handle reports the authoritative channel count and
    /// sample rate, which an adapter may have adjusted from the requested
    /// values.
    fn attach(
        &self,
        name: &str,
        num_channels: u16,
        sample_rate: u32,
    ) -> Result<DeviceHandle, AudioError>;
}

/// Core-side write half of the inbound (network → hardware) queue.
///
/// Offers are non-blocking; a full queue drops the offered frame.
#[derive(Clone)]
pub struct FrameSink {
    buffer: SharedRingBuffer,
}

impl FrameSink {
    /// Offer a frame toward the hardware. Returns false if it was dropped.
    pub fn offer(&self, frame: Frame) -> bool {
        self.buffer.push(frame)
    }
}

/// Core-side read half of the outbound (hardware → network) queue.
pub struct FrameSource {
    rx: mpsc::Receiver<Frame>,
}

impl FrameSource {
    /// Wait for the next captured frame.
    ///
    /// Returns `None` once the hardware side has gone away.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

/// Hardware-side write half of the outbound queue.
///
/// Safe to call from an audio callback: the offer never blocks.
#[derive(Clone)]
pub struct FrameProducer {
    tx: mpsc::Sender<Frame>,
}

impl FrameProducer {
    /// Offer a captured frame toward the network. Returns false if it was
    /// dropped (queue full or core gone).
    pub fn offer(&self, frame: Frame) -> bool {
        self.tx.try_send(frame).is_ok()
    }
}

/// The queue halves owned by the session core after an attach.
pub struct BridgeQueues {
    /// Network → hardware, drop-on-full
    pub inbound: FrameSink,
    /// Hardware → network, awaited by the send pump
    pub outbound: FrameSource,
}

/// The queue halves owned by the hardware adapter.
pub struct HardwareQueues {
    /// Network → hardware; the callback drains this with `try_pop`/`pop`
    pub inbound: SharedRingBuffer,
    /// Hardware → network; the callback offers with [`FrameProducer::offer`]
    pub outbound: FrameProducer,
}

/// Build a linked pair of queue sets with the given per-direction capacity.
pub fn frame_queues(capacity: usize) -> (BridgeQueues, HardwareQueues) {
    let inbound = create_shared_buffer(capacity);
    let (tx, rx) = mpsc::channel(capacity);

    (
        BridgeQueues {
            inbound: FrameSink {
                buffer: inbound.clone(),
            },
            outbound: FrameSource { rx },
        },
        HardwareQueues {
            inbound,
            outbound: FrameProducer { tx },
        },
    )
}

/// A successfully attached audio device, as seen by the session core.
pub struct DeviceHandle {
    num_channels: u16,
    sample_rate: u32,
    queues: BridgeQueues,
}

impl DeviceHandle {
    pub fn new(num_channels: u16, sample_rate: u32, queues: BridgeQueues) -> Self {
        Self {
            num_channels,
            sample_rate,
            queues,
        }
    }

    /// Channel count the device actually runs at
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Sample rate the device actually runs at
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Split into the two queue halves consumed by the pumps
    pub fn into_queues(self) -> (FrameSink, FrameSource) {
        (self.queues.inbound, self.queues.outbound)
    }
}
