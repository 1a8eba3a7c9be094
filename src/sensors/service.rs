use tracing::{debug, error, info, warn};

use crate::{
    db::{models::Reading, models::Source, Store, StoreError},
    sensors::{
        parser::{self, ParseError, Parsed},
        source::{Chunk, LineSource},
    },
};

/// What happened to a single line.
#[derive(Debug)]
pub enum LineOutcome {
    Stored(Reading),
    Ignored,
    Rejected(ParseError),
    /// Parsed fine but the write failed; the sample is lost.
    Failed(StoreError),
}

/// Read → parse → persist loop shared by the socket and serial ingesters.
pub struct IngestService {
    store: Store,
    source: Source,
}

impl IngestService {
    pub fn new(store: Store, source: Source) -> Self {
        Self { store, source }
    }

    /// Parses one line and, when it holds a sample, commits it immediately.
    /// Never fails: every problem is logged and reported in the outcome.
    pub async fn handle_line(&self, line: &str) -> LineOutcome {
        let measurement = match parser::parse(line) {
            Ok(Parsed::Sample(m)) => m,
            Ok(Parsed::Ignored) => {
                debug!(source = %self.source, line = %line.trim(), "Skipping non-data line");
                return LineOutcome::Ignored;
            }
            Err(e) => {
                warn!(source = %self.source, line = %line.trim(), error = %e, "Invalid data format");
                return LineOutcome::Rejected(e);
            }
        };

        match self.store.insert_reading(self.source, &measurement).await {
            Ok(reading) => {
                info!(
                    source = %self.source,
                    id = reading.id,
                    timestamp = %reading.timestamp,
                    humidity = reading.humidity,
                    temperature = reading.temperature,
                    light_level = reading.light_level,
                    "Reading stored"
                );
                LineOutcome::Stored(reading)
            }
            Err(e) => {
                warn!(source = %self.source, error = %e, "Failed to store reading");
                LineOutcome::Failed(e)
            }
        }
    }

    /// Consumes `lines` until it closes or a read fails, persisting samples in
    /// arrival order. Returns the number of readings stored.
    pub async fn run<S>(&self, lines: &mut S) -> u64
    where
        S: LineSource + Send,
    {
        info!(source = %self.source, "Ingest loop started");
        let mut stored = 0;

        loop {
            let chunk = match lines.next_chunk().await {
                Ok(chunk) => chunk,
                Err(e) => {
                    error!(source = %self.source, error = %e, "Read failed, ending ingest loop");
                    break;
                }
            };
            match chunk {
                Chunk::Closed => break,
                Chunk::Idle => continue,
                Chunk::Data(text) => {
                    debug!(source = %self.source, raw = %text, "Received raw data");
                    for line in text.lines().filter(|l| !l.trim().is_empty()) {
                        if let LineOutcome::Stored(_) = self.handle_line(line).await {
                            stored += 1;
                        }
                    }
                }
            }
        }

        info!(source = %self.source, stored, "Ingest source closed");
        stored
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, io, time::Duration};

    use tokio::{io::AsyncWriteExt, net::TcpStream, task::JoinHandle, time};
    use tracing::Instrument;
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        db::{models::Measurement, test_store},
        sensors::source::SocketListener,
    };

    /// Replays canned chunks, then reports the source as closed.
    struct ScriptedSource(VecDeque<Chunk>);

    impl ScriptedSource {
        fn new(chunks: impl IntoIterator<Item = Chunk>) -> Self {
            Self(chunks.into_iter().collect())
        }
    }

    impl LineSource for ScriptedSource {
        async fn next_chunk(&mut self) -> io::Result<Chunk> {
            Ok(self.0.pop_front().unwrap_or(Chunk::Closed))
        }
    }

    fn data(text: &str) -> Chunk {
        Chunk::Data(text.to_owned())
    }

    #[tokio::test]
    async fn well_formed_line_is_stored() {
        let store = test_store().await;
        let service = IngestService::new(store.clone(), Source::Remote);

        let outcome = service.handle_line("45.2,21.7,300.0").await;
        let LineOutcome::Stored(reading) = outcome else {
            panic!("expected Stored, got {outcome:?}");
        };

        assert_eq!(store.latest(Source::Remote).await.unwrap(), Some(reading.clone()));
        assert_eq!(
            reading.measurement(),
            Measurement {
                humidity: 45.2,
                temperature: 21.7,
                light_level: 300.0
            }
        );
    }

    #[tokio::test]
    async fn malformed_line_is_rejected_and_not_stored() {
        let store = test_store().await;
        let service = IngestService::new(store.clone(), Source::Remote);

        let outcome = service.handle_line("45.2,21.7").await;
        assert!(matches!(outcome, LineOutcome::Rejected(ParseError::FieldCount { .. })));
        assert_eq!(store.count(Source::Remote).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn banner_is_ignored() {
        let store = test_store().await;
        let service = IngestService::new(store.clone(), Source::Local);

        assert!(matches!(
            service.handle_line("Loading measurements...").await,
            LineOutcome::Ignored
        ));
        assert_eq!(store.count(Source::Local).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_failure_loses_only_that_sample() {
        let store = test_store().await;
        let service = IngestService::new(store.clone(), Source::Local);
        store.pool().close().await;

        assert!(matches!(
            service.handle_line("1,2,3").await,
            LineOutcome::Failed(_)
        ));
    }

    #[tokio::test]
    async fn run_continues_past_bad_input_and_keeps_order() {
        let store = test_store().await;
        let service = IngestService::new(store.clone(), Source::Local);

        let mut source = ScriptedSource::new([
            data("Loading measurements..."),
            data("10,20,30"),
            Chunk::Idle,
            data("garbage"),
            data("11,21,31\n12,22,32\n"),
            data("Humidity: 13%, Temperature: 23°C, Light Level: 33"),
        ]);

        let stored = service.run(&mut source).await;
        assert_eq!(stored, 4);

        let humidity: Vec<f64> = store
            .all_readings(Source::Local)
            .await
            .unwrap()
            .iter()
            .map(|r| r.humidity)
            .collect();
        assert_eq!(humidity, vec![10.0, 11.0, 12.0, 13.0]);
    }

    #[tokio::test]
    async fn read_error_ends_loop_without_failing() {
        struct BrokenDevice(u8);

        impl LineSource for BrokenDevice {
            async fn next_chunk(&mut self) -> io::Result<Chunk> {
                self.0 += 1;
                match self.0 {
                    1 => Ok(data("1,2,3")),
                    _ => Err(io::Error::other("device unplugged")),
                }
            }
        }

        let store = test_store().await;
        let service = IngestService::new(store.clone(), Source::Local);

        assert_eq!(service.run(&mut BrokenDevice(0)).await, 1);
        assert_eq!(store.count(Source::Local).await.unwrap(), 1);
    }

    /// Serves the first peer on `listener` into the remote table.
    fn spawn_remote_ingest(listener: SocketListener, store: Store) -> JoinHandle<u64> {
        tokio::spawn(
            async move {
                let mut source = listener.accept_one().await.unwrap();
                IngestService::new(store, Source::Remote).run(&mut source).await
            }
            .in_current_span(),
        )
    }

    #[tokio::test]
    async fn socket_peer_end_to_end() {
        let store = test_store().await;
        let listener = SocketListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = spawn_remote_ingest(listener, store.clone());

        let mut peer = TcpStream::connect(addr).await.unwrap();
        peer.write_all(b"45.2,21.7,300.0").await.unwrap();
        drop(peer);

        assert_eq!(server.await.unwrap(), 1);
        let latest = store.latest(Source::Remote).await.unwrap().unwrap();
        assert_eq!(latest.humidity, 45.2);
        assert_eq!(latest.temperature, 21.7);
        assert_eq!(latest.light_level, 300.0);
    }

    #[tokio::test]
    #[traced_test]
    async fn socket_peer_sending_missing_field_stores_nothing() {
        let store = test_store().await;
        let listener = SocketListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = spawn_remote_ingest(listener, store.clone());

        let mut peer = TcpStream::connect(addr).await.unwrap();
        peer.write_all(b"45.2,21.7").await.unwrap();
        drop(peer);

        assert_eq!(server.await.unwrap(), 0);
        assert_eq!(store.count(Source::Remote).await.unwrap(), 0);
        assert!(logs_contain("Invalid data format"));
        assert!(logs_contain("45.2,21.7"));
    }

    #[tokio::test]
    async fn socket_peer_reset_ends_loop_normally() {
        let store = test_store().await;
        let listener = SocketListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = spawn_remote_ingest(listener, store.clone());

        let mut peer = TcpStream::connect(addr).await.unwrap();
        peer.write_all(b"45.2,21.7,300.0\n").await.unwrap();

        // Wait until the sample is stored so the reset cannot discard it.
        time::timeout(Duration::from_secs(5), async {
            while store.count(Source::Remote).await.unwrap() == 0 {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        #[allow(deprecated)]
        peer.set_linger(Some(Duration::ZERO)).unwrap();
        drop(peer);

        assert_eq!(server.await.unwrap(), 1);
    }
}
