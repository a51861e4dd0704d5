use crate::transport::errors::TransportError;
use bytes::{Buf, BufMut, BytesMut};
#[cfg(not(feature = "coverage"))]
use openssl::ssl::{SslConnector, SslMethod};
#[cfg(not(feature = "coverage"))]
use std::net::TcpStream;
use std::time::Duration;
use tokio_util::codec::{Decoder, Encoder};

/// Socket read timeout; a read that times out yields "no frame yet".
pub const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Reads the handshake may spend waiting for CONNECTED.
pub const MAX_HANDSHAKE_POLLS: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let command = match raw {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        };
        Some(command)
    }

    // CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StompFrame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StompFrame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First occurrence wins when a header is repeated.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Default)]
pub struct StompCodec;

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, TransportError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(TransportError::Protocol(format!(
                    "invalid header escape: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

/// Returns `(head_len, body_start)` once the blank line closing the headers is buffered.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for (index, byte) in buf.iter().enumerate() {
        if *byte != b'\n' {
            continue;
        }
        let line = &buf[line_start..index];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() && line_start > 0 {
            return Some((line_start, index + 1));
        }
        line_start = index + 1;
    }
    None
}

fn content_length(headers: &[(String, String)]) -> Result<Option<usize>, TransportError> {
    headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| TransportError::Protocol(format!("bad content-length: {value}")))
        })
        .transpose()
}

impl Decoder for StompCodec {
    type Item = StompFrame;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StompFrame>, TransportError> {
        // Heart-beats are bare EOLs between frames.
        let eols = src
            .iter()
            .take_while(|byte| matches!(byte, b'\n' | b'\r'))
            .count();
        src.advance(eols);

        let Some((head_len, body_start)) = find_head_end(src) else {
            return Ok(None);
        };

        let head = std::str::from_utf8(&src[..head_len])
            .map_err(|_| TransportError::Protocol("frame head is not utf-8".to_string()))?;
        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default();
        let command = Command::parse(command_line)
            .ok_or_else(|| TransportError::Protocol(format!("unknown command: {command_line}")))?;

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| TransportError::Protocol(format!("malformed header: {line}")))?;
            if command.escapes_headers() {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let body_end = match content_length(&headers)? {
            Some(length) => {
                if src.len() <= body_start + length {
                    return Ok(None);
                }
                if src[body_start + length] != 0 {
                    return Err(TransportError::Protocol(
                        "frame body is not NUL-terminated".to_string(),
                    ));
                }
                body_start + length
            }
            None => match src[body_start..].iter().position(|byte| *byte == 0) {
                Some(offset) => body_start + offset,
                None => return Ok(None),
            },
        };

        let body = src[body_start..body_end].to_vec();
        src.advance(body_end + 1);
        Ok(Some(StompFrame {
            command,
            headers,
            body,
        }))
    }
}

impl Encoder<StompFrame> for StompCodec {
    type Error = TransportError;

    fn encode(&mut self, frame: StompFrame, dst: &mut BytesMut) -> Result<(), TransportError> {
        let escape = frame.command.escapes_headers();
        dst.put_slice(frame.command.as_str().as_bytes());
        dst.put_u8(b'\n');
        for (name, value) in &frame.headers {
            if escape {
                dst.put_slice(escape_header(name).as_bytes());
                dst.put_u8(b':');
                dst.put_slice(escape_header(value).as_bytes());
            } else {
                dst.put_slice(name.as_bytes());
                dst.put_u8(b':');
                dst.put_slice(value.as_bytes());
            }
            dst.put_u8(b'\n');
        }
        if !frame.body.is_empty() && frame.header("content-length").is_none() {
            dst.put_slice(format!("content-length:{}\n", frame.body.len()).as_bytes());
        }
        dst.put_u8(b'\n');
        dst.put_slice(&frame.body);
        dst.put_u8(0);
        Ok(())
    }
}

/// Bus traffic the client cares about, mapped out of raw frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BusMessage {
    Message {
        subscription: String,
        destination: String,
        body: String,
    },
    Receipt {
        receipt_id: String,
    },
    Error {
        message: String,
        body: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub host: String,
    pub port: u16,
    pub virtual_host: String,
    pub login: String,
    pub passcode: Option<String>,
}

pub struct BusHandshake {
    pub server_version: Option<String>,
    pub session: Box<dyn BusSession>,
}

impl std::fmt::Debug for BusHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusHandshake")
            .field("server_version", &self.server_version)
            .finish_non_exhaustive()
    }
}

pub trait BusConnector {
    fn handshake(&mut self, request: HandshakeRequest) -> Result<BusHandshake, TransportError>;
}

pub trait BusSession {
    fn subscribe(&mut self, id: &str, destination: &str) -> Result<(), TransportError>;
    fn unsubscribe(&mut self, id: &str) -> Result<(), TransportError>;
    fn publish(&mut self, destination: &str, body: &str) -> Result<(), TransportError>;
    /// `Ok(None)` means nothing is available right now.
    fn next_message(&mut self) -> Result<Option<BusMessage>, TransportError>;
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

pub trait FrameTransport {
    fn send(&mut self, frame: StompFrame) -> Result<(), TransportError>;
    /// `Ok(None)` when no complete frame is available yet; end of stream is `Disconnected`.
    fn recv(&mut self) -> Result<Option<StompFrame>, TransportError>;
}

#[derive(Debug, Default)]
pub struct NoopBusConnector;

impl BusConnector for NoopBusConnector {
    fn handshake(&mut self, _request: HandshakeRequest) -> Result<BusHandshake, TransportError> {
        Ok(BusHandshake {
            server_version: None,
            session: Box::new(NoopSession),
        })
    }
}

#[derive(Debug, Default)]
pub struct NoopSession;

impl BusSession for NoopSession {
    fn subscribe(&mut self, _id: &str, _destination: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn unsubscribe(&mut self, _id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn publish(&mut self, _destination: &str, _body: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn next_message(&mut self) -> Result<Option<BusMessage>, TransportError> {
        Ok(None)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct StompConnector<T: FrameTransport> {
    transport: Option<T>,
}

pub struct SocketBusConnector<F> {
    connect: F,
}

pub struct BlockingStompTransport<S> {
    stream: S,
    codec: StompCodec,
    read_buf: BytesMut,
}

impl<S> BlockingStompTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            codec: StompCodec,
            read_buf: BytesMut::with_capacity(4096),
        }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[cfg(not(feature = "coverage"))]
fn open_tcp(request: &HandshakeRequest) -> Result<TcpStream, TransportError> {
    let address = format!("{}:{}", request.host, request.port);
    Ok(TcpStream::connect(address)?)
}

#[cfg(not(feature = "coverage"))]
pub fn tcp_connect(request: &HandshakeRequest) -> Result<TcpStream, TransportError> {
    let tcp = open_tcp(request)?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))?;
    Ok(tcp)
}

/// The read timeout is only applied once the handshake has completed.
#[cfg(not(feature = "coverage"))]
pub fn tls_connect(
    request: &HandshakeRequest,
) -> Result<openssl::ssl::SslStream<TcpStream>, TransportError> {
    let tcp = open_tcp(request)?;
    let builder = SslConnector::builder(SslMethod::tls())
        .map_err(|err| TransportError::Io(format!("tls connector init failed: {err}")))?;
    let connector = builder.build();
    let stream = connector
        .connect(&request.host, tcp)
        .map_err(|err| TransportError::Io(format!("tls handshake failed: {err}")))?;
    stream.get_ref().set_read_timeout(Some(READ_TIMEOUT))?;
    Ok(stream)
}

impl<F> SocketBusConnector<F> {
    pub fn new(connect: F) -> Self {
        Self { connect }
    }
}

impl<S: std::io::Read + std::io::Write> FrameTransport for BlockingStompTransport<S> {
    fn send(&mut self, frame: StompFrame) -> Result<(), TransportError> {
        let mut out = BytesMut::with_capacity(512);
        self.codec.encode(frame, &mut out)?;
        self.stream.write_all(&out)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<StompFrame>, TransportError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buf)? {
                return Ok(Some(frame));
            }

            let mut buffer = [0u8; 4096];
            let bytes_read = match self.stream.read(&mut buffer) {
                Ok(count) => count,
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(err.into()),
            };
            if bytes_read == 0 {
                return Err(TransportError::Disconnected);
            }
            self.read_buf.extend_from_slice(&buffer[..bytes_read]);
        }
    }
}

impl<T: FrameTransport> StompConnector<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    fn connect_frame(request: &HandshakeRequest) -> StompFrame {
        let mut frame = StompFrame::new(Command::Connect)
            .with_header("accept-version", "1.2")
            .with_header("host", request.virtual_host.clone())
            .with_header("login", request.login.clone());
        if let Some(passcode) = &request.passcode {
            frame = frame.with_header("passcode", passcode.clone());
        }
        frame.with_header("heart-beat", "0,0")
    }
}

fn map_frame(frame: StompFrame) -> Option<BusMessage> {
    match frame.command {
        Command::Message => {
            let subscription = frame.header("subscription")?.to_string();
            let destination = frame.header("destination")?.to_string();
            Some(BusMessage::Message {
                subscription,
                destination,
                body: frame.body_text(),
            })
        }
        Command::Receipt => {
            let receipt_id = frame.header("receipt-id")?.to_string();
            Some(BusMessage::Receipt { receipt_id })
        }
        Command::Error => Some(BusMessage::Error {
            message: frame.header("message").unwrap_or("server error").to_string(),
            body: frame.body_text(),
        }),
        _ => None,
    }
}

impl<T: FrameTransport + 'static> BusConnector for StompConnector<T> {
    fn handshake(&mut self, request: HandshakeRequest) -> Result<BusHandshake, TransportError> {
        let mut transport = self.transport.take().ok_or_else(|| {
            TransportError::Protocol("frame transport already consumed".to_string())
        })?;
        transport.send(Self::connect_frame(&request))?;

        for _ in 0..MAX_HANDSHAKE_POLLS {
            let Some(frame) = transport.recv()? else {
                continue;
            };
            return match frame.command {
                Command::Connected => Ok(BusHandshake {
                    server_version: frame.header("version").map(str::to_string),
                    session: Box::new(StompSession { transport }),
                }),
                Command::Error => Err(TransportError::Protocol(
                    frame.header("message").unwrap_or("connect rejected").to_string(),
                )),
                other => Err(TransportError::Protocol(format!(
                    "unexpected {} frame during handshake",
                    other.as_str()
                ))),
            };
        }

        Err(TransportError::Protocol(
            "no CONNECTED frame from server".to_string(),
        ))
    }
}

impl<F, S> BusConnector for SocketBusConnector<F>
where
    F: FnMut(&HandshakeRequest) -> Result<S, TransportError>,
    S: std::io::Read + std::io::Write + 'static,
{
    fn handshake(&mut self, request: HandshakeRequest) -> Result<BusHandshake, TransportError> {
        let stream = (self.connect)(&request)?;
        let transport = BlockingStompTransport::new(stream);
        let mut connector = StompConnector::new(transport);
        connector.handshake(request)
    }
}

pub struct StompSession<T: FrameTransport> {
    transport: T,
}

impl<T: FrameTransport + 'static> BusSession for StompSession<T> {
    fn subscribe(&mut self, id: &str, destination: &str) -> Result<(), TransportError> {
        self.transport.send(
            StompFrame::new(Command::Subscribe)
                .with_header("id", id)
                .with_header("destination", destination)
                .with_header("ack", "auto"),
        )
    }

    fn unsubscribe(&mut self, id: &str) -> Result<(), TransportError> {
        self.transport
            .send(StompFrame::new(Command::Unsubscribe).with_header("id", id))
    }

    fn publish(&mut self, destination: &str, body: &str) -> Result<(), TransportError> {
        self.transport.send(
            StompFrame::new(Command::Send)
                .with_header("destination", destination)
                .with_header("content-type", "application/json")
                .with_body(body.as_bytes()),
        )
    }

    fn next_message(&mut self) -> Result<Option<BusMessage>, TransportError> {
        while let Some(frame) = self.transport.recv()? {
            if let Some(message) = map_frame(frame) {
                return Ok(Some(message));
            }
        }
        Ok(None)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.transport.send(StompFrame::new(Command::Disconnect))
    }
}
