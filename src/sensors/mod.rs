pub mod parser;
pub mod service;
pub mod source;

pub use parser::{parse, ParseError, Parsed};
pub use service::{IngestService, LineOutcome};
pub use source::{
    Chunk, ConnectivityError, LineSource, SerialSource, SocketListener, TcpSource, TextEncoding,
};
