//! Real audio hardware via cpal
//!
//! [`CpalBridge`] implements [`DeviceBridge`] on top of the host's default
//! input and output devices. Each direction runs in its own dedicated
//! thread that owns the cpal stream (cpal streams are not `Send`), kept
//! alive until the bridge is dropped.
//!
//! The capture callback de-interleaves each hardware buffer into one
//! channel-major [`Frame`] and offers it toward the network; the playback
//! callback drains the inbound ring buffer, interleaving back, and writes
//! silence when the network has not kept up.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::bridge::{frame_queues, DeviceBridge, DeviceHandle, FrameProducer};
use crate::audio::buffer::SharedRingBuffer;
use crate::audio::frame::Frame;
use crate::constants::DEVICE_QUEUE_FRAMES;
use crate::error::AudioError;

/// Bridge to the host's default audio devices.
pub struct CpalBridge {
    queue_capacity: usize,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl CpalBridge {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity,
            running: Arc::new(AtomicBool::new(true)),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Stop both stream threads and wait for them to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut threads = self.threads.lock().unwrap();
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Default for CpalBridge {
    fn default() -> Self {
        Self::new(DEVICE_QUEUE_FRAMES)
    }
}

impl Drop for CpalBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

impl DeviceBridge for CpalBridge {
    fn attach(
        &self,
        name: &str,
        num_channels: u16,
        sample_rate: u32,
    ) -> Result<DeviceHandle, AudioError> {
        let host = cpal::default_host();
        let input = host
            .default_input_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default input device".into()))?;
        let output = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("no default output device".into()))?;

        let config = StreamConfig {
            channels: num_channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: BufferSize::Default,
        };

        let (core, hw) = frame_queues(self.queue_capacity);

        let capture = spawn_capture_thread(
            name,
            input,
            config.clone(),
            hw.outbound,
            self.running.clone(),
        )?;
        let playback =
            spawn_playback_thread(name, output, config, hw.inbound, self.running.clone())?;

        let mut threads = self.threads.lock().unwrap();
        threads.push(capture);
        threads.push(playback);

        Ok(DeviceHandle::new(num_channels, sample_rate, core))
    }
}

fn spawn_capture_thread(
    name: &str,
    device: cpal::Device,
    config: StreamConfig,
    outbound: FrameProducer,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AudioError> {
    let channels = config.channels as usize;

    thread::Builder::new()
        .name(format!("capture-{name}"))
        .spawn(move || {
            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let frame = deinterleave(data, channels);
                    // Drops on a full queue; the callback never waits.
                    let _ = outbound.offer(frame);
                },
                |err| tracing::error!("Input stream error: {}", err),
                None,
            );

            match stream {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        tracing::error!("Failed to start input stream: {}", e);
                        return;
                    }
                    while running.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(10));
                    }
                    // Stream is dropped here, stopping capture
                }
                Err(e) => {
                    tracing::error!("Failed to build input stream: {}", e);
                }
            }
        })
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

fn spawn_playback_thread(
    name: &str,
    device: cpal::Device,
    config: StreamConfig,
    inbound: SharedRingBuffer,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, AudioError> {
    let channels = config.channels as usize;

    thread::Builder::new()
        .name(format!("playback-{name}"))
        .spawn(move || {
            // Partially consumed frame carried across callbacks
            let mut pending: Option<(Frame, usize)> = None;

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, channels, &inbound, &mut pending);
                },
                |err| tracing::error!("Output stream error: {}", err),
                None,
            );

            match stream {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        tracing::error!("Failed to start output stream: {}", e);
                        return;
                    }
                    while running.load(Ordering::Relaxed) {
                        thread::sleep(Duration::from_millis(10));
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to build output stream: {}", e);
                }
            }
        })
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

/// Turn one interleaved hardware buffer into a channel-major frame.
fn deinterleave(data: &[f32], channels: usize) -> Frame {
    let samples_per_channel = data.len() / channels;
    let mut frame = Frame::new(channels, samples_per_channel);
    for c in 0..channels {
        let dest = frame.channel_mut(c);
        for (i, sample) in dest.iter_mut().enumerate() {
            *sample = data[i * channels + c];
        }
    }
    frame
}

/// Fill an interleaved output buffer from the inbound frame queue,
/// continuing a partially consumed frame and writing silence on underrun.
fn fill_output(
    data: &mut [f32],
    channels: usize,
    inbound: &SharedRingBuffer,
    pending: &mut Option<(Frame, usize)>,
) {
    let mut written = 0;
    let total = data.len() / channels;

    while written < total {
        let (frame, offset) = match pending.take() {
            Some(p) => p,
            None => match inbound.pop() {
                Some(frame) if frame.channel_count() == channels => (frame, 0),
                // Underrun, or a frame whose shape no longer matches: silence.
                _ => {
                    for slot in &mut data[written * channels..] {
                        *slot = 0.0;
                    }
                    return;
                }
            },
        };

        let available = frame.sample_count() - offset;
        let take = available.min(total - written);
        for i in 0..take {
            for c in 0..channels {
                data[(written + i) * channels + c] = frame.channel(c)[offset + i];
            }
        }
        written += take;

        if offset + take < frame.sample_count() {
            *pending = Some((frame, offset + take));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::create_shared_buffer;

    #[test]
    fn test_deinterleave_round_trip() {
        // L R L R L R -> [L L L][R R R]
        let data = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let frame = deinterleave(&data, 2);
        assert_eq!(frame.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(frame.channel(1), &[-1.0, -2.0, -3.0]);
    }

    #[test]
    fn test_fill_output_spans_frames_and_silences_underrun() {
        let inbound = create_shared_buffer(4);
        let mut frame = Frame::new(2, 2);
        frame.channel_mut(0).copy_from_slice(&[1.0, 2.0]);
        frame.channel_mut(1).copy_from_slice(&[-1.0, -2.0]);
        inbound.push(frame);

        let mut pending = None;
        let mut out = [9.0f32; 8];
        fill_output(&mut out, 2, &inbound, &mut pending);

        // Two samples per channel from the frame, then silence.
        assert_eq!(&out[..4], &[1.0, -1.0, 2.0, -2.0]);
        assert_eq!(&out[4..], &[0.0; 4]);
        assert!(pending.is_none());
    }

    #[test]
    fn test_fill_output_carries_partial_frame() {
        let inbound = create_shared_buffer(4);
        let mut frame = Frame::new(1, 4);
        frame.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        inbound.push(frame);

        let mut pending = None;
        let mut out = [0.0f32; 2];
        fill_output(&mut out, 1, &inbound, &mut pending);
        assert_eq!(out, [1.0, 2.0]);
        assert!(pending.is_some());

        fill_output(&mut out, 1, &inbound, &mut pending);
        assert_eq!(out, [3.0, 4.0]);
        assert!(pending.is_none());
    }
}
