//! Loopback session tests
//!
//! Full sessions (handshake, device attach, both pumps) against an
//! in-memory device bridge with deterministic timing, master and member in
//! the same process over 127.0.0.1 — where UDP loss is not expected.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

use jamlink::audio::bridge::{frame_queues, DeviceBridge, DeviceHandle, HardwareQueues};
use jamlink::audio::buffer::SharedRingBuffer;
use jamlink::audio::Frame;
use jamlink::error::AudioError;
use jamlink::session::{Session, SessionState};

/// In-memory device bridge: records the attach call and hands the
/// hardware-side queue halves to the test.
#[derive(Default)]
struct TestBridge {
    attached: Mutex<Option<(String, u16, u32)>>,
    hardware: Mutex<Option<HardwareQueues>>,
}

impl TestBridge {
    fn attach_args(&self) -> Option<(String, u16, u32)> {
        self.attached.lock().unwrap().clone()
    }

    fn take_hardware(&self) -> HardwareQueues {
        self.hardware
            .lock()
            .unwrap()
            .take()
            .expect("bridge was never attached")
    }
}

impl DeviceBridge for TestBridge {
    fn attach(
        &self,
        name: &str,
        num_channels: u16,
        sample_rate: u32,
    ) -> Result<DeviceHandle, AudioError> {
        let (core, hw) = frame_queues(4);
        *self.attached.lock().unwrap() = Some((name.to_string(), num_channels, sample_rate));
        *self.hardware.lock().unwrap() = Some(hw);
        Ok(DeviceHandle::new(num_channels, sample_rate, core))
    }
}

async fn wait_streaming(rx: &mut watch::Receiver<SessionState>) -> (u16, u32) {
    timeout(Duration::from_secs(5), async {
        loop {
            if let SessionState::Streaming {
                num_channels,
                sample_rate,
            } = *rx.borrow_and_update()
            {
                return (num_channels, sample_rate);
            }
            rx.changed().await.expect("session dropped");
        }
    })
    .await
    .expect("session never reached streaming")
}

async fn wait_terminated(rx: &mut watch::Receiver<SessionState>) {
    timeout(Duration::from_secs(5), async {
        loop {
            if *rx.borrow_and_update() == SessionState::Terminated {
                return;
            }
            rx.changed().await.expect("session dropped");
        }
    })
    .await
    .expect("session never terminated")
}

async fn wait_for_frame(buffer: &SharedRingBuffer) -> Frame {
    for _ in 0..1000 {
        if let Some(frame) = buffer.try_pop() {
            return frame;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no frame delivered");
}

fn counting_frame(channels: usize, samples: usize, scale: f32) -> Frame {
    let mut frame = Frame::new(channels, samples);
    for c in 0..channels {
        for (i, sample) in frame.channel_mut(c).iter_mut().enumerate() {
            *sample = (c * samples + i) as f32 * scale;
        }
    }
    frame
}

#[tokio::test]
async fn test_member_adopts_master_parameters() {
    let master_bridge = Arc::new(TestBridge::default());
    let mut master = Session::master("deck-a", "127.0.0.1:0", 6, 96000).unwrap();
    let master_addr = master.local_addr().to_string();
    let mut master_state = master.state();
    let master_shutdown = master.shutdown_handle();
    let bridge = master_bridge.clone();
    let master_task = tokio::spawn(async move { master.run(bridge.as_ref()).await });

    let member_bridge = Arc::new(TestBridge::default());
    let mut member = Session::member("deck-b", &master_addr).unwrap();
    let mut member_state = member.state();
    let member_shutdown = member.shutdown_handle();
    let bridge = member_bridge.clone();
    let member_task = tokio::spawn(async move { member.run(bridge.as_ref()).await });

    // The member had no parameters of its own; streaming on both sides
    // means it adopted exactly the master's configuration.
    assert_eq!(wait_streaming(&mut master_state).await, (6, 96000));
    assert_eq!(wait_streaming(&mut member_state).await, (6, 96000));
    assert_eq!(
        member_bridge.attach_args().unwrap(),
        ("deck-b".to_string(), 6, 96000)
    );
    assert_eq!(
        master_bridge.attach_args().unwrap(),
        ("deck-a".to_string(), 6, 96000)
    );

    master_shutdown.signal();
    member_shutdown.signal();
    timeout(Duration::from_secs(5), master_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(5), member_task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_end_to_end_frame_delivery_over_loopback() {
    let master_bridge = Arc::new(TestBridge::default());
    let mut master = Session::master("studio", "127.0.0.1:4466", 2, 48000).unwrap();
    let mut master_state = master.state();
    let master_shutdown = master.shutdown_handle();
    let bridge = master_bridge.clone();
    let master_task = tokio::spawn(async move {
        let result = master.run(bridge.as_ref()).await;
        (result, master.stats())
    });

    let member_bridge = Arc::new(TestBridge::default());
    let mut member = Session::member("remote", "127.0.0.1:4466").unwrap();
    let mut member_state = member.state();
    let member_shutdown = member.shutdown_handle();
    let bridge = member_bridge.clone();
    let member_task = tokio::spawn(async move {
        let result = member.run(bridge.as_ref()).await;
        (result, member.stats())
    });

    assert_eq!(wait_streaming(&mut master_state).await, (2, 48000));
    assert_eq!(wait_streaming(&mut member_state).await, (2, 48000));

    let master_hw = master_bridge.take_hardware();
    let member_hw = member_bridge.take_hardware();

    // Member captures a known (2, 256) frame; the master's inbound queue
    // must deliver it intact.
    let sent = counting_frame(2, 256, 1.0 / 512.0);
    assert!(member_hw.outbound.offer(sent.clone()));
    let delivered = wait_for_frame(&master_hw.inbound).await;
    assert_eq!(delivered, sent);

    // And the reverse direction through the same sockets.
    let reply = counting_frame(2, 128, -0.25);
    assert!(master_hw.outbound.offer(reply.clone()));
    let echoed = wait_for_frame(&member_hw.inbound).await;
    assert_eq!(echoed, reply);

    master_shutdown.signal();
    member_shutdown.signal();

    let (result, master_stats) = timeout(Duration::from_secs(5), master_task)
        .await
        .unwrap()
        .unwrap();
    result.unwrap();
    let (result, member_stats) = timeout(Duration::from_secs(5), member_task)
        .await
        .unwrap()
        .unwrap();
    result.unwrap();

    assert!(master_stats.frames_received >= 1);
    assert!(master_stats.frames_sent >= 1);
    assert!(member_stats.frames_sent >= 1);
    assert!(member_stats.frames_received >= 1);
    assert_eq!(master_stats.decode_errors, 0);
    assert_eq!(member_stats.decode_errors, 0);
}

#[tokio::test]
async fn test_shutdown_unblocks_master_awaiting_handshake() {
    let bridge = Arc::new(TestBridge::default());
    let mut master = Session::master("lonely", "127.0.0.1:0", 2, 48000).unwrap();
    let mut state = master.state();
    let shutdown = master.shutdown_handle();
    let b = bridge.clone();
    let task = tokio::spawn(async move { master.run(b.as_ref()).await });

    // No member ever arrives; the signal must still end the run cleanly.
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.signal();

    timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    wait_terminated(&mut state).await;
    assert!(bridge.attach_args().is_none());
}
