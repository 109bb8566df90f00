use std::time::Duration;

use bytes::Bytes;
use ratelink::{
    mbps_to_bps, Clock, ControlSnapshot, ControlWriter, DropTailQueue, LinkDriver, LinkOptions,
    LinkQueue, LinkStats, QueueLimits, TokioClock,
};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    // The controller side: a fixed 12 Mbit/s link.
    let path = std::env::temp_dir().join(format!("ratelink-static-{}", std::process::id()));
    let writer = ControlWriter::create(&path, ControlSnapshot::new(mbps_to_bps(12.0), true)).unwrap();

    // The link side maps the same file.
    let clock = TokioClock::new();
    let stats = std::sync::Arc::new(LinkStats::default());
    let link = LinkQueue::open(
        &path,
        DropTailQueue::new(QueueLimits::default().packets(100)),
        LinkOptions::default().name("static"),
        clock.now(),
    )
    .unwrap()
    .with_telemetry(stats.clone());

    let (input, from_peer) = mpsc::channel(128);
    let (to_peer, mut output) = mpsc::channel(128);
    let handle = LinkDriver::new(link, clock, from_peer, to_peer).spawn();

    let producer = input.clone();
    tokio::spawn(async move {
        for i in 0..50u32 {
            producer.send(Bytes::from(vec![i as u8; 1200])).await.unwrap();
            tokio::time::sleep(Duration::from_micros(500)).await;
        }

        // Halve the rate halfway through.
        writer.set_rate_bps(mbps_to_bps(6.0));
        for i in 50..100u32 {
            producer.send(Bytes::from(vec![i as u8; 1200])).await.unwrap();
            tokio::time::sleep(Duration::from_micros(500)).await;
        }
    });

    let mut received = 0;
    while let Some(payload) = output.recv().await {
        received += 1;
        println!("{} ms: packet {} ({} bytes)", clock.now(), payload[0], payload.len());
        if received == 100 {
            break;
        }
    }

    // Closing the input finishes the link.
    drop(input);

    let link = handle.await.unwrap().unwrap();
    println!(
        "opportunities: {}, mean delay: {:.1} ms, max delay: {} ms, dropped: {}",
        stats.opportunities(),
        stats.mean_delay_ms().unwrap_or_default(),
        stats.max_delay_ms(),
        link.queue().dropped(),
    );

    let _ = std::fs::remove_file(&path);
}
