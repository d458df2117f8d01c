//! Stateless packet encode/decode
//!
//! Pure functions over byte slices; safe to call from any thread without
//! synchronization. Encoding a well-formed packet cannot fail. Decoding
//! validates the declared shape against the bytes actually present before
//! allocating anything, so a hostile header can neither over-allocate nor
//! read past the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;

use crate::audio::frame::Frame;
use crate::error::DecodeError;

use super::{Packet, TAG_AUDIO_FRAME, TAG_HANDSHAKE_REQUEST, TAG_HANDSHAKE_RESPONSE};

/// Encode a packet into its exact wire representation.
pub fn encode(packet: &Packet) -> Bytes {
    let mut buf = BytesMut::with_capacity(packet.encoded_len());

    match packet {
        Packet::HandshakeRequest => {
            buf.put_u8(TAG_HANDSHAKE_REQUEST);
        }
        Packet::HandshakeResponse {
            num_channels,
            sample_rate,
        } => {
            buf.put_u8(TAG_HANDSHAKE_RESPONSE);
            buf.put_u8(*num_channels);
            buf.put_u32_le(*sample_rate);
        }
        Packet::AudioFrame(frame) => {
            buf.put_u8(TAG_AUDIO_FRAME);
            buf.put_u32_le(frame.channel_count() as u32);
            buf.put_u32_le(frame.sample_count() as u32);
            for channel in frame.channels() {
                for &sample in channel {
                    buf.put_f32_le(sample);
                }
            }
        }
    }

    debug_assert_eq!(buf.len(), packet.encoded_len());
    buf.freeze()
}

/// Decode one packet from the start of `datagram`.
///
/// Returns the packet and the exact number of bytes consumed; trailing
/// bytes beyond the declared shape are left untouched.
pub fn decode(datagram: &[u8]) -> Result<(Packet, usize), DecodeError> {
    let total = datagram.len();
    let mut buf = datagram;

    need(buf, 1)?;
    let tag = buf.get_u8();

    let packet = match tag {
        TAG_HANDSHAKE_REQUEST => Packet::HandshakeRequest,
        TAG_HANDSHAKE_RESPONSE => {
            need(buf, 5)?;
            let num_channels = buf.get_u8();
            let sample_rate = buf.get_u32_le();
            Packet::HandshakeResponse {
                num_channels,
                sample_rate,
            }
        }
        TAG_AUDIO_FRAME => {
            need(buf, 8)?;
            let num_channels = buf.get_u32_le() as usize;
            let num_samples = buf.get_u32_le() as usize;

            // Saturates on a hostile header; the check below then rejects it
            // without allocating.
            let payload_len = num_channels
                .saturating_mul(num_samples)
                .saturating_mul(size_of::<f32>());
            need(buf, payload_len)?;

            let total_samples = num_channels * num_samples;
            let mut samples = Vec::with_capacity(total_samples);
            for _ in 0..total_samples {
                samples.push(buf.get_f32_le());
            }
            Packet::AudioFrame(Frame::from_samples(num_channels, samples))
        }
        other => return Err(DecodeError::UnknownType(other)),
    };

    Ok((packet, total - buf.remaining()))
}

fn need(buf: &[u8], expected: usize) -> Result<(), DecodeError> {
    if buf.len() < expected {
        Err(DecodeError::Truncated {
            expected,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}
