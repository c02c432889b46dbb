use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::net::SocketAddr;
use std::path::Path;

use flate2::read::GzDecoder;
use tokio::net::UdpSocket;
use tokio::time::{Duration, Instant};

use crate::error::SourceError;

/// Largest datagram the live link sends; anything longer is dropped
pub const MAX_DATAGRAM: usize = 1024;

/// Anything that produces raw records: a socket, a log file, a test script.
///
/// `next_record` may wait indefinitely; the coordinator bounds it with the
/// receive timeout, so implementations must be cancel-safe.
#[allow(async_fn_in_trait)]
pub trait RecordSource {
    async fn next_record(&mut self) -> Result<Vec<u8>, SourceError>;

    /// Short label for logs
    fn describe(&self) -> String;
}

/// Live UDP telemetry link
pub struct UdpSource {
    socket: UdpSocket,
    buf: Vec<u8>,
    oversized: u64,
}

impl UdpSource {
    pub async fn bind(addr: &str) -> Result<Self, SourceError> {
        let socket = UdpSocket::bind(addr).await?;
        log::info!("Listening for telemetry on {}", socket.local_addr()?);
        Ok(Self::from_socket(socket))
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket,
            // One spare byte tells a cut-off datagram from one that fits exactly
            buf: vec![0u8; MAX_DATAGRAM + 1],
            oversized: 0,
        }
    }

    /// Datagrams dropped for exceeding [`MAX_DATAGRAM`]
    pub fn oversized(&self) -> u64 {
        self.oversized
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SourceError> {
        Ok(self.socket.local_addr()?)
    }
}

impl RecordSource for UdpSource {
    async fn next_record(&mut self) -> Result<Vec<u8>, SourceError> {
        loop {
            let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
            if len > MAX_DATAGRAM {
                self.oversized += 1;
                log::warn!(
                    "Dropped datagram from {} longer than {} bytes ({} so far)",
                    peer,
                    MAX_DATAGRAM,
                    self.oversized
                );
                continue;
            }
            log::trace!("{} bytes from {}", len, peer);
            return Ok(self.buf[..len].to_vec());
        }
    }

    fn describe(&self) -> String {
        match self.socket.local_addr() {
            Ok(addr) => format!("udp://{addr}"),
            Err(_) => "udp".to_string(),
        }
    }
}

/// Recorded log, one record per line; `.gz` files are decompressed.
/// Lines are kept as raw bytes so a garbled one is rejected by the parser
/// like any other malformed record. End of file closes the source.
pub struct LogFileSource {
    name: String,
    lines: VecDeque<Vec<u8>>,
}

impl LogFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if path.extension().map(|e| e == "gz").unwrap_or(false) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut lines = VecDeque::new();
        for line in BufReader::new(reader).split(b'\n') {
            let line = line?;
            if !line.iter().all(u8::is_ascii_whitespace) {
                lines.push_back(line);
            }
        }
        log::info!("Loaded {} records from {}", lines.len(), path.display());

        Ok(Self {
            name: path.display().to_string(),
            lines,
        })
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl RecordSource for LogFileSource {
    async fn next_record(&mut self) -> Result<Vec<u8>, SourceError> {
        self.lines.pop_front().ok_or(SourceError::Closed)
    }

    fn describe(&self) -> String {
        format!("file://{}", self.name)
    }
}

/// One step of a [`ScriptedSource`]
#[derive(Clone, Debug)]
pub enum ScriptedEvent {
    Record(Vec<u8>),
    /// Go quiet for this long before moving on. The quiet period is
    /// measured in time, so a receive timeout that cuts it short resumes it.
    Silence(Duration),
    /// Fail the transport
    Fail(std::io::ErrorKind),
}

impl ScriptedEvent {
    pub fn record(text: &str) -> Self {
        ScriptedEvent::Record(text.as_bytes().to_vec())
    }
}

/// Deterministic source for tests and demos. Closes when the script runs out.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    events: VecDeque<ScriptedEvent>,
    quiet_until: Option<Instant>,
}

impl ScriptedSource {
    pub fn new(events: impl IntoIterator<Item = ScriptedEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            quiet_until: None,
        }
    }
}

impl RecordSource for ScriptedSource {
    async fn next_record(&mut self) -> Result<Vec<u8>, SourceError> {
        loop {
            if let Some(deadline) = self.quiet_until {
                tokio::time::sleep_until(deadline).await;
                self.quiet_until = None;
            }
            match self.events.pop_front() {
                Some(ScriptedEvent::Record(bytes)) => return Ok(bytes),
                Some(ScriptedEvent::Silence(d)) => self.quiet_until = Some(Instant::now() + d),
                Some(ScriptedEvent::Fail(kind)) => return Err(std::io::Error::from(kind).into()),
                None => return Err(SourceError::Closed),
            }
        }
    }

    fn describe(&self) -> String {
        format!("scripted ({} events left)", self.events.len())
    }
}
