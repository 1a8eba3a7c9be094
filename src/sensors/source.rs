use std::{
    future::Future,
    io::{self, BufRead, BufReader},
    net::SocketAddr,
    time::Duration,
};

use thiserror::Error;
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream, ToSocketAddrs},
};
use tracing::info;

/// Largest chunk taken from the socket in one read.
const READ_CHUNK: usize = 1024;

/// One read from a [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Text as delivered by the transport; may hold zero, one or several lines.
    Data(String),
    /// Nothing arrived before the read timed out.
    Idle,
    /// The peer or device is gone.
    Closed,
}

/// Producer of raw sensor text.
pub trait LineSource {
    fn next_chunk(&mut self) -> impl Future<Output = io::Result<Chunk>> + Send;
}

#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("could not open serial port {path}: {source}")]
    Serial {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("could not bind ingest listener: {0}")]
    Bind(#[source] io::Error),

    #[error("could not accept ingest connection: {0}")]
    Accept(#[source] io::Error),
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// Listener that serves exactly one peer.
pub struct SocketListener {
    listener: TcpListener,
}

impl SocketListener {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, ConnectivityError> {
        let listener = TcpListener::bind(addr).await.map_err(ConnectivityError::Bind)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the single producing peer. Consumes the listener, so no
    /// further connections are accepted.
    pub async fn accept_one(self) -> Result<TcpSource, ConnectivityError> {
        let (stream, peer) = self.listener.accept().await.map_err(ConnectivityError::Accept)?;
        info!(peer = %peer, "Ingest peer connected");
        Ok(TcpSource::new(stream))
    }
}

pub struct TcpSource {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TcpSource {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: vec![0; READ_CHUNK],
        }
    }
}

impl LineSource for TcpSource {
    async fn next_chunk(&mut self) -> io::Result<Chunk> {
        let n = match self.stream.read(&mut self.buf).await {
            Ok(n) => n,
            Err(e) if is_disconnect(&e) => {
                info!(error = %e, "Ingest peer dropped the connection");
                return Ok(Chunk::Closed);
            }
            Err(e) => return Err(e),
        };
        if n == 0 {
            return Ok(Chunk::Closed);
        }
        Ok(Chunk::Data(String::from_utf8_lossy(&self.buf[..n]).into_owned()))
    }
}

/// Errors that only mean the peer went away.
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

// ---------------------------------------------------------------------------
// Serial
// ---------------------------------------------------------------------------

type SerialReader = BufReader<Box<dyn serialport::SerialPort>>;

/// How a serial device encodes its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Invalid sequences become U+FFFD.
    Utf8,
    /// Every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

/// Line-oriented reader over a serial device.
///
/// `serialport` is blocking, so each read runs on tokio's blocking pool. The
/// reader and any partial line are moved into the blocking task and handed
/// back when it returns.
pub struct SerialSource {
    state: Option<(SerialReader, Vec<u8>)>,
    encoding: TextEncoding,
}

impl SerialSource {
    pub fn open(
        path: &str,
        baud_rate: u32,
        timeout: Duration,
        encoding: TextEncoding,
    ) -> Result<Self, ConnectivityError> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|source| ConnectivityError::Serial {
                path: path.to_owned(),
                source,
            })?;
        info!(path = %path, baud_rate, ?encoding, "Serial port opened");
        Ok(Self {
            state: Some((BufReader::new(port), Vec::new())),
            encoding,
        })
    }
}

impl LineSource for SerialSource {
    async fn next_chunk(&mut self) -> io::Result<Chunk> {
        let Some((mut reader, mut pending)) = self.state.take() else {
            return Ok(Chunk::Closed);
        };

        let (reader, pending, result) = tokio::task::spawn_blocking(move || {
            let result = reader.read_until(b'\n', &mut pending);
            (reader, pending, result)
        })
        .await
        .map_err(io::Error::other)?;

        match result {
            Ok(0) => Ok(Chunk::Closed),
            Ok(_) if pending.last() == Some(&b'\n') => {
                self.state = Some((reader, Vec::new()));
                Ok(Chunk::Data(self.encoding.decode(&pending)))
            }
            // Partial line at end of stream.
            Ok(_) => Ok(Chunk::Data(self.encoding.decode(&pending))),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                self.state = Some((reader, pending));
                Ok(Chunk::Idle)
            }
            Err(e) => Err(e),
        }
    }
}
