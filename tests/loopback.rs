//! End-to-end loopback scenarios from §8 (S1, S2): a sender and
//! receiver orchestrator running in the same process over a real UDP
//! socket pair on localhost.

use std::net::UdpSocket as StdUdpSocket;
use std::sync::Arc;
use std::time::Duration;

use ndi_bridge::capture::{SimulatedCapture, SourceDescriptor};
use ndi_bridge::config::HostConfig;
use ndi_bridge::media::{PixelBuffer, PixelFormat};
use ndi_bridge::metrics::Metrics;
use ndi_bridge::output::{Recorded, SimulatedOutput, SourceOutput};
use ndi_bridge::receiver::{self, ReceiverOptions};
use ndi_bridge::sender::{self, SenderOptions};

fn free_port() -> u16 {
    let socket = StdUdpSocket::bind("127.0.0.1:0").expect("bind ephemeral port");
    socket.local_addr().unwrap().port()
}

fn video_frame(i: u64) -> (PixelBuffer, u64) {
    let pixel = PixelBuffer {
        width: 64,
        height: 36,
        format: PixelFormat::Bgra8,
        stride: 64 * 4,
        data: vec![(i % 255) as u8; 64 * 36 * 4],
    };
    // 60fps spacing in 100ns ticks.
    (pixel, i * 166_667)
}

async fn wait_for_video_count(output: &SimulatedOutput, target: usize, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if output.video_count().await >= target {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return output.video_count().await >= target;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn s1_three_hundred_frames_arrive_in_order_with_preserved_timestamps() {
    let port = free_port();
    let output = SimulatedOutput::new();
    let metrics = Metrics::new();

    let (_recv_shutdown_tx, recv_shutdown_rx) = sender::shutdown_channel();
    let recv_output: Arc<dyn SourceOutput> = output.clone();
    let recv_metrics = metrics.clone();
    let recv_task = tokio::spawn(async move {
        receiver::run(
            recv_output,
            ReceiverOptions { port, buffer_ms: 0, name: "test-source".to_string() },
            recv_metrics,
            recv_shutdown_rx,
        )
        .await
    });

    // Let the receiver bind before the sender starts.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frame_count = 300u64;
    let frames: Vec<(PixelBuffer, u64)> = (0..frame_count).map(video_frame).collect();
    let expected_timestamps: Vec<u64> = frames.iter().map(|(_, ts)| *ts).collect();

    let capture = Box::new(SimulatedCapture::new(
        vec![SourceDescriptor { name: "Cam 1".to_string() }],
        frames,
    ));

    let host = HostConfig {
        auto: true,
        ..HostConfig::default()
    };
    let (send_shutdown_tx, send_shutdown_rx) = sender::shutdown_channel();
    let send_metrics = metrics.clone();
    let send_task = tokio::spawn(async move {
        sender::run(
            capture,
            SenderOptions {
                target: format!("127.0.0.1:{port}"),
                mtu_payload: 1362,
                host,
            },
            send_metrics,
            send_shutdown_rx,
        )
        .await
    });

    let delivered = wait_for_video_count(&output, frame_count as usize, Duration::from_secs(5)).await;
    assert!(delivered, "receiver did not observe all 300 frames in time");

    let recorded = output.recorded().await;
    let video_timestamps: Vec<u64> = recorded
        .iter()
        .filter_map(|r| match r {
            Recorded::Video { timestamp, .. } => Some(*timestamp),
            _ => None,
        })
        .collect();

    assert_eq!(video_timestamps.len(), frame_count as usize);
    assert_eq!(video_timestamps, expected_timestamps);

    let _ = send_shutdown_tx.send(true);
    send_task.abort();
    recv_task.abort();
}

#[tokio::test(start_paused = true)]
async fn s2_buffered_mode_releases_first_frame_no_earlier_than_configured_delay() {
    let port = free_port();
    let output = SimulatedOutput::new();
    let metrics = Metrics::new();

    let (_recv_shutdown_tx, recv_shutdown_rx) = sender::shutdown_channel();
    let recv_output: Arc<dyn SourceOutput> = output.clone();
    let recv_metrics = metrics.clone();
    let recv_task = tokio::spawn(async move {
        receiver::run(
            recv_output,
            ReceiverOptions { port, buffer_ms: 500, name: "test-source".to_string() },
            recv_metrics,
            recv_shutdown_rx,
        )
        .await
    });

    tokio::time::sleep(Duration::from_millis(10)).await;

    let frames = vec![video_frame(0)];
    let capture = Box::new(SimulatedCapture::new(
        vec![SourceDescriptor { name: "Cam 1".to_string() }],
        frames,
    ));
    let host = HostConfig {
        auto: true,
        ..HostConfig::default()
    };
    let (send_shutdown_tx, send_shutdown_rx) = sender::shutdown_channel();
    let send_metrics = metrics.clone();
    let send_task = tokio::spawn(async move {
        sender::run(
            capture,
            SenderOptions {
                target: format!("127.0.0.1:{port}"),
                mtu_payload: 1362,
                host,
            },
            send_metrics,
            send_shutdown_rx,
        )
        .await
    });

    // Let the datagram land, then assert nothing has been released yet.
    tokio::time::advance(Duration::from_millis(100)).await;
    tokio::task::yield_now().await;
    assert_eq!(output.video_count().await, 0);

    tokio::time::advance(Duration::from_millis(410)).await;
    tokio::task::yield_now().await;
    assert_eq!(
        output.video_count().await,
        1,
        "frame must be released once total elapsed delay reaches 500ms"
    );

    let _ = send_shutdown_tx.send(true);
    send_task.abort();
    recv_task.abort();
}
