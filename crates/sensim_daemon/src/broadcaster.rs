//! Broadcaster: one per sensor, generating a reading each cycle and writing
//! it to every registered receiver.

use crate::receiver::ReceiverId;
use crate::registry::ReceiverRegistry;
use futures::future::join_all;
use sensim_core::{FixMessage, ReadingGenerator, Sensor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Counters a broadcaster keeps for status reporting.
#[derive(Debug, Default)]
pub struct BroadcastStats {
    cycles: AtomicU64,
    deliveries: AtomicU64,
    dropped_receivers: AtomicU64,
}

impl BroadcastStats {
    /// Completed broadcast cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Messages successfully written, summed over all receivers.
    pub fn deliveries(&self) -> u64 {
        self.deliveries.load(Ordering::Relaxed)
    }

    /// Receivers removed after a failed or timed-out write.
    pub fn dropped_receivers(&self) -> u64 {
        self.dropped_receivers.load(Ordering::Relaxed)
    }
}

/// Outcome of one broadcast cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub message: FixMessage,
    pub delivered: usize,
    /// Receivers whose write failed; they are no longer registered.
    pub dropped: Vec<ReceiverId>,
}

pub struct Broadcaster<W = TcpStream> {
    sensor: Arc<Sensor>,
    generator: ReadingGenerator,
    registry: ReceiverRegistry<W>,
    write_timeout: Duration,
    stats: Arc<BroadcastStats>,
}

impl<W: AsyncWrite + Unpin> Broadcaster<W> {
    pub fn new(
        sensor: Arc<Sensor>,
        generator: ReadingGenerator,
        registry: ReceiverRegistry<W>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            sensor,
            generator,
            registry,
            write_timeout,
            stats: Arc::new(BroadcastStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<BroadcastStats> {
        Arc::clone(&self.stats)
    }

    /// Generate, classify and broadcast one reading.
    pub async fn cycle(&mut self) -> CycleReport {
        let value = self.generator.next_value(&self.sensor);
        let message = FixMessage::for_reading(&self.sensor, value);
        self.broadcast(message).await
    }

    /// Write `message` to every receiver in a fresh snapshot.
    ///
    /// Writes run concurrently, each bounded by the write timeout, and the
    /// call returns once all have finished. A receiver whose write fails is
    /// removed; the others are unaffected.
    pub async fn broadcast(&self, message: FixMessage) -> CycleReport {
        let payload = message.encode();
        let receivers = self.registry.snapshot();

        let results = join_all(
            receivers
                .iter()
                .map(|receiver| receiver.send(&payload, self.write_timeout)),
        )
        .await;

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (receiver, result) in receivers.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        sensor_id = message.sensor_id,
                        receiver_id = receiver.id(),
                        peer = %receiver.peer(),
                        error = %e,
                        "Receiver dropped"
                    );
                    self.registry.remove(receiver);
                    dropped.push(receiver.id());
                }
            }
        }

        self.stats.cycles.fetch_add(1, Ordering::Relaxed);
        self.stats
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .dropped_receivers
            .fetch_add(dropped.len() as u64, Ordering::Relaxed);

        CycleReport {
            message,
            delivered,
            dropped,
        }
    }

    /// Broadcast forever, sleeping the sensor's interval after each cycle.
    pub async fn run(mut self) {
        let interval = self.sensor.sleep_interval();
        info!(
            sensor_id = self.sensor.id(),
            sensor_type = self.sensor.sensor_type(),
            frequency = self.sensor.frequency(),
            interval_us = interval.as_micros() as u64,
            "Sensor started broadcasting"
        );

        loop {
            self.cycle().await;
            tokio::time::sleep(interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensim_core::Quality;
    use std::io;
    use std::net::SocketAddr;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncReadExt, DuplexStream};

    /// A peer that has gone away: every write fails.
    struct BrokenSink;

    /// A peer that never drains its socket: every write stays pending.
    struct StalledSink;

    /// Either a healthy in-memory peer or one of the faulty sinks.
    enum TestSink {
        Healthy(DuplexStream),
        Broken(BrokenSink),
        Stalled(StalledSink),
    }

    impl AsyncWrite for TestSink {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            match self.get_mut() {
                TestSink::Healthy(stream) => Pin::new(stream).poll_write(cx, buf),
                TestSink::Broken(_) => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
                TestSink::Stalled(_) => Poll::Pending,
            }
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match self.get_mut() {
                TestSink::Healthy(stream) => Pin::new(stream).poll_flush(cx),
                TestSink::Broken(_) => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
                TestSink::Stalled(_) => Poll::Pending,
            }
        }

        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            match self.get_mut() {
                TestSink::Healthy(stream) => Pin::new(stream).poll_shutdown(cx),
                _ => Poll::Ready(Ok(())),
            }
        }
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn temp_sensor() -> Arc<Sensor> {
        Arc::new(Sensor::new(1, "Temp", 0, 100, "FIX", 10).unwrap())
    }

    fn healthy(registry: &ReceiverRegistry<TestSink>, port: u16) -> DuplexStream {
        let (server, client) = tokio::io::duplex(1024);
        registry.add(TestSink::Healthy(server), peer(port));
        client
    }

    fn broadcaster(registry: &ReceiverRegistry<TestSink>) -> Broadcaster<TestSink> {
        Broadcaster::new(
            temp_sensor(),
            ReadingGenerator::from_seed(1),
            registry.clone(),
            Duration::from_millis(100),
        )
    }

    async fn read_line(client: &mut DuplexStream, expected: &str) {
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_failed_receiver_does_not_affect_others() {
        let registry = ReceiverRegistry::new();
        let mut b = healthy(&registry, 1);
        let a = registry.add(TestSink::Broken(BrokenSink), peer(2));
        let mut c = healthy(&registry, 3);
        let broadcaster = broadcaster(&registry);

        let message = FixMessage::for_reading(&temp_sensor(), 5);
        let report = broadcaster.broadcast(message).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.dropped, vec![a.id()]);
        assert!(!registry.contains(a.id()));
        assert!(a.is_closed());
        read_line(&mut b, "$FIX, 1, Temp, 5, Alarm*").await;
        read_line(&mut c, "$FIX, 1, Temp, 5, Alarm*").await;

        // A is gone for good: the next cycle only sees B and C
        let message = FixMessage::for_reading(&temp_sensor(), 50);
        let report = broadcaster.broadcast(message).await;
        assert_eq!(report.delivered, 2);
        assert!(report.dropped.is_empty());
        read_line(&mut b, "$FIX, 1, Temp, 50, Normal*").await;
        read_line(&mut c, "$FIX, 1, Temp, 50, Normal*").await;

        let stats = broadcaster.stats();
        assert_eq!(stats.cycles(), 2);
        assert_eq!(stats.deliveries(), 4);
        assert_eq!(stats.dropped_receivers(), 1);
    }

    #[tokio::test]
    async fn test_stalled_receiver_is_bounded_and_dropped() {
        let registry = ReceiverRegistry::new();
        let stalled = registry.add(TestSink::Stalled(StalledSink), peer(1));
        let mut healthy_client = healthy(&registry, 2);
        let broadcaster = broadcaster(&registry);

        let started = std::time::Instant::now();
        let message = FixMessage::for_reading(&temp_sensor(), 80);
        let report = broadcaster.broadcast(message).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, vec![stalled.id()]);
        read_line(&mut healthy_client, "$FIX, 1, Temp, 80, Warning*").await;
    }

    #[tokio::test]
    async fn test_cycle_with_no_receivers() {
        let registry = ReceiverRegistry::new();
        let mut broadcaster = broadcaster(&registry);

        let report = broadcaster.cycle().await;
        assert_eq!(report.delivered, 0);
        assert!(report.dropped.is_empty());
        assert!((0..100).contains(&report.message.value));
        assert_eq!(report.message.quality, temp_sensor().classify(report.message.value));
    }

    #[tokio::test]
    async fn test_cycle_messages_arrive_in_order() {
        let registry = ReceiverRegistry::new();
        let mut client = healthy(&registry, 1);
        let mut broadcaster = broadcaster(&registry);

        let mut sent = Vec::new();
        for _ in 0..5 {
            sent.push(broadcaster.cycle().await.message);
        }

        for message in sent {
            read_line(&mut client, &message.to_string()).await;
        }
    }

    #[tokio::test]
    async fn test_alarm_and_normal_classification_on_wire() {
        let registry = ReceiverRegistry::new();
        let mut client = healthy(&registry, 1);
        let broadcaster = broadcaster(&registry);

        let report = broadcaster
            .broadcast(FixMessage::for_reading(&temp_sensor(), 5))
            .await;
        assert_eq!(report.message.quality, Quality::Alarm);
        read_line(&mut client, "$FIX, 1, Temp, 5, Alarm*").await;

        broadcaster
            .broadcast(FixMessage::for_reading(&temp_sensor(), 50))
            .await;
        read_line(&mut client, "$FIX, 1, Temp, 50, Normal*").await;
    }
}
