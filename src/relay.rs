//! Relay client: reads a remote sensor's serial device and forwards each
//! sample to the ingest listener in the labeled grammar.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::sensors::{
    parser::{self, Parsed},
    source::{Chunk, LineSource},
};

/// Forwards samples from `lines` to `sink` until the source closes.
/// Returns the number of messages sent; a write failure ends the relay.
pub async fn forward<S, W>(lines: &mut S, sink: &mut W) -> io::Result<u64>
where
    S: LineSource + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut sent = 0;

    loop {
        let text = match lines.next_chunk().await? {
            Chunk::Closed => break,
            Chunk::Idle => continue,
            Chunk::Data(text) => text,
        };

        for line in text.lines() {
            debug!(raw = %line.trim(), "Raw data");
            match parser::parse(line) {
                Ok(Parsed::Sample(m)) => {
                    let message = m.to_labeled();
                    sink.write_all(message.as_bytes()).await?;
                    sink.write_all(b"\n").await?;
                    sink.flush().await?;
                    info!(message = %message, "Sent parsed data");
                    sent += 1;
                }
                Ok(Parsed::Ignored) => {}
                Err(e) => warn!(line = %line.trim(), error = %e, "Invalid data format"),
            }
        }
    }

    info!(sent, "Relay source closed");
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::sensors::{parser::parse, source::TextEncoding};

    struct ScriptedSource(VecDeque<Chunk>);

    impl LineSource for ScriptedSource {
        async fn next_chunk(&mut self) -> io::Result<Chunk> {
            Ok(self.0.pop_front().unwrap_or(Chunk::Closed))
        }
    }

    #[tokio::test]
    async fn only_samples_are_forwarded() {
        let mut source = ScriptedSource(VecDeque::from([
            Chunk::Data("Loading measurements...\n".to_owned()),
            Chunk::Data("45.2,21.7,300.0\n".to_owned()),
            Chunk::Idle,
            Chunk::Data("sensor fault\n".to_owned()),
            Chunk::Data("Humidity: 50%, Temperature: 19.5°C, Light Level: 12\n".to_owned()),
        ]));
        let mut sink: Vec<u8> = Vec::new();

        let sent = forward(&mut source, &mut sink).await.unwrap();
        assert_eq!(sent, 2);

        let text = String::from_utf8(sink).unwrap();
        let messages: Vec<&str> = text.lines().collect();
        assert_eq!(
            messages,
            vec![
                "Humidity: 45.2%, Temperature: 21.7°C, Light Level: 300",
                "Humidity: 50%, Temperature: 19.5°C, Light Level: 12",
            ]
        );
        // Whatever the relay sends, the listener's parser accepts.
        assert!(messages
            .iter()
            .all(|m| matches!(parse(m), Ok(Parsed::Sample(_)))));
    }

    /// Replays raw device lines through a decoder, like the serial source.
    struct DeviceBytes {
        lines: VecDeque<Vec<u8>>,
        encoding: TextEncoding,
    }

    impl LineSource for DeviceBytes {
        async fn next_chunk(&mut self) -> io::Result<Chunk> {
            Ok(match self.lines.pop_front() {
                Some(bytes) => Chunk::Data(self.encoding.decode(&bytes)),
                None => Chunk::Closed,
            })
        }
    }

    fn utf8_device(encoding: TextEncoding) -> DeviceBytes {
        DeviceBytes {
            lines: VecDeque::from([
                "Humidity: 45.2%, Temperature: 21.7°C, Light Level: 300\n"
                    .as_bytes()
                    .to_vec(),
            ]),
            encoding,
        }
    }

    #[tokio::test]
    async fn utf8_labeled_line_is_forwarded() {
        let mut source = utf8_device(TextEncoding::Utf8);
        let mut sink: Vec<u8> = Vec::new();

        assert_eq!(forward(&mut source, &mut sink).await.unwrap(), 1);
        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "Humidity: 45.2%, Temperature: 21.7°C, Light Level: 300\n"
        );
    }

    #[tokio::test]
    async fn utf8_device_misread_as_latin1_forwards_nothing() {
        let mut source = utf8_device(TextEncoding::Latin1);
        let mut sink: Vec<u8> = Vec::new();

        assert_eq!(forward(&mut source, &mut sink).await.unwrap(), 0);
        assert!(sink.is_empty());
    }
}
