use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::command::{parse_version, Command};
use crate::error::{PressError, Result};
use crate::palette::ScreenPoint;

/// sys-botbase listens here.
pub const DEFAULT_PORT: u16 = 6000;

/// Byte stream to a controller. Implement this for TCP or a test double.
#[async_trait]
pub trait Transport: Send {
    /// Write one encoded command line.
    async fn write_line(&mut self, line: &[u8]) -> Result<()>;
    /// Read bytes up to and including the next `\n`, at most `max_len` bytes.
    async fn read_frame(&mut self, max_len: usize) -> Result<Vec<u8>>;
    /// Close the stream. Errors are not interesting at this point.
    async fn shutdown(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub port: u16,
    pub connect_timeout: Duration,
    /// Pause between asking for the version and reading the reply.
    pub settle_delay: Duration,
    /// Longest reply accepted before the stream is considered broken.
    pub max_frame: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_millis(100),
            max_frame: 64,
        }
    }
}

pub struct TcpTransport {
    stream: BufReader<TcpStream>,
}

impl TcpTransport {
    pub async fn connect(host: &str, config: &LinkConfig) -> Result<Self> {
        let addr = (host, config.port);
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                PressError::Connection(format!(
                    "timed out connecting to {}:{} after {:?}",
                    host, config.port, config.connect_timeout
                ))
            })?
            .map_err(|e| PressError::connection(&format!("connect to {}:{}", host, config.port), e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| PressError::connection("set TCP_NODELAY", e))?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let stream = self.stream.get_mut();
        stream
            .write_all(line)
            .await
            .map_err(|e| PressError::connection("send", e))?;
        stream.flush().await.map_err(|e| PressError::connection("flush", e))
    }

    async fn read_frame(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let mut frame = Vec::new();
        let read = (&mut self.stream)
            .take(max_len as u64)
            .read_until(b'\n', &mut frame)
            .await
            .map_err(|e| PressError::connection("receive", e))?;
        if read == 0 {
            return Err(PressError::Connection("connection closed by peer".into()));
        }
        if frame.last() != Some(&b'\n') {
            if frame.len() >= max_len {
                return Err(PressError::Connection(format!(
                    "reply exceeds {} bytes without a newline",
                    max_len
                )));
            }
            return Err(PressError::Connection("connection closed mid-reply".into()));
        }
        Ok(frame)
    }

    async fn shutdown(&mut self) {
        let _ = self.stream.get_mut().shutdown().await;
    }
}

/// One serialized session with a controller.
///
/// Every command, and the read that follows it, runs under a single lock.
/// After a transport failure the session is closed and stays closed until
/// the caller reconnects.
pub struct ControllerLink<T: Transport = TcpTransport> {
    endpoint: String,
    config: LinkConfig,
    transport: Mutex<Option<T>>,
    connected: AtomicBool,
    poll_rate_ms: AtomicU32,
}

impl ControllerLink<TcpTransport> {
    pub async fn connect(host: &str, config: LinkConfig) -> Result<Self> {
        info!(host, port = config.port, "connecting");
        let transport = TcpTransport::connect(host, &config).await?;
        let endpoint = format!("{}:{}", host, config.port);
        Ok(Self::with_transport(endpoint, transport, config))
    }

    /// Connect, read the version and push the poll rate.
    ///
    /// Only a failed connect is an outer error. A failed handshake still
    /// hands back the link next to the handshake error; check
    /// `is_connected` to see whether it survived.
    pub async fn open(host: &str, poll_rate_ms: u32, config: LinkConfig) -> Result<(Self, Result<String>)> {
        let link = Self::connect(host, config).await?;
        let handshake = link.handshake(poll_rate_ms).await;
        Ok((link, handshake))
    }
}

impl<T: Transport> ControllerLink<T> {
    pub fn with_transport(endpoint: impl Into<String>, transport: T, config: LinkConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            transport: Mutex::new(Some(transport)),
            connected: AtomicBool::new(true),
            poll_rate_ms: AtomicU32::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Last poll rate sent to the device, 0 if none yet.
    pub fn poll_rate_ms(&self) -> u32 {
        self.poll_rate_ms.load(Ordering::Acquire)
    }

    /// Ask for the version, then configure the poll rate.
    ///
    /// - `poll_rate_ms`: input sampling interval to push to the device
    ///
    /// The poll rate is sent even when the version reply is unreadable, as
    /// long as the link is still up. The version error is returned after.
    ///
    /// Returns the status line to show the user
    pub async fn handshake(&self, poll_rate_ms: u32) -> Result<String> {
        let version = self.get_version().await;
        if self.is_connected() {
            self.set_poll_rate(poll_rate_ms).await?;
        }
        let version = version?;
        let message = format!("Connected successfully, sys-botbase {} detected!", version);
        info!("{}", message);
        Ok(message)
    }

    pub async fn get_version(&self) -> Result<String> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(PressError::NotConnected)?;

        let result = async {
            transport.write_line(&Command::GetVersion.encode()).await?;
            tokio::time::sleep(self.config.settle_delay).await;
            transport.read_frame(self.config.max_frame).await
        }
        .await;

        let frame = match result {
            Ok(frame) => frame,
            Err(e) => {
                self.fault(&mut guard, &e).await;
                return Err(e);
            }
        };
        let version = parse_version(&frame)?;
        debug!(version = %version, "version reply");
        Ok(version)
    }

    pub async fn set_poll_rate(&self, poll_rate_ms: u32) -> Result<()> {
        self.send(Command::SetPollRate(poll_rate_ms)).await?;
        self.poll_rate_ms.store(poll_rate_ms, Ordering::Release);
        Ok(())
    }

    pub async fn touch(&self, at: ScreenPoint) -> Result<()> {
        self.send(Command::Touch(at)).await
    }

    pub async fn touch_hold(&self, at: ScreenPoint, duration_ms: u32) -> Result<()> {
        self.send(Command::TouchHold(at, duration_ms)).await
    }

    /// Fire-and-forget send; no reply is read.
    pub async fn send(&self, command: Command) -> Result<()> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(PressError::NotConnected)?;
        debug!(?command, "send");
        if let Err(e) = transport.write_line(&command.encode()).await {
            self.fault(&mut guard, &e).await;
            return Err(e);
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        let mut guard = self.transport.lock().await;
        if let Some(mut transport) = guard.take() {
            transport.shutdown().await;
            info!(endpoint = %self.endpoint, "disconnected");
        }
        self.connected.store(false, Ordering::Release);
    }

    async fn fault(&self, slot: &mut Option<T>, err: &PressError) {
        if !matches!(err, PressError::Connection(_)) {
            return;
        }
        warn!(endpoint = %self.endpoint, error = %err, "link failed, closing");
        if let Some(mut transport) = slot.take() {
            transport.shutdown().await;
        }
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct Script {
        sent: Vec<Vec<u8>>,
        replies: VecDeque<Vec<u8>>,
        fail_writes: bool,
    }

    struct ScriptedTransport(Arc<StdMutex<Script>>);

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn write_line(&mut self, line: &[u8]) -> Result<()> {
            let mut script = self.0.lock().unwrap();
            if script.fail_writes {
                return Err(PressError::Connection("broken pipe".into()));
            }
            script.sent.push(line.to_vec());
            Ok(())
        }

        async fn read_frame(&mut self, _max_len: usize) -> Result<Vec<u8>> {
            self.0
                .lock()
                .unwrap()
                .replies
                .pop_front()
                .ok_or_else(|| PressError::Connection("no reply".into()))
        }
    }

    fn scripted(replies: &[&[u8]]) -> (ControllerLink<ScriptedTransport>, Arc<StdMutex<Script>>) {
        let script = Arc::new(StdMutex::new(Script {
            replies: replies.iter().map(|r| r.to_vec()).collect(),
            ..Script::default()
        }));
        let config = LinkConfig {
            settle_delay: Duration::ZERO,
            ..LinkConfig::default()
        };
        let link = ControllerLink::with_transport("mock", ScriptedTransport(script.clone()), config);
        (link, script)
    }

    #[tokio::test]
    async fn handshake_reads_version_then_sets_poll_rate() {
        let (link, script) = scripted(&[b"2.4\n"]);
        let message = link.handshake(31).await.unwrap();
        assert_eq!(message, "Connected successfully, sys-botbase 2.4 detected!");
        assert_eq!(link.poll_rate_ms(), 31);
        let sent = script.lock().unwrap().sent.clone();
        assert_eq!(sent, vec![b"getVersion\r\n".to_vec(), b"configure pollRate 31\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn touch_commands_are_sent_without_reading() {
        let (link, script) = scripted(&[]);
        assert_eq!(link.endpoint(), "mock");
        link.touch(ScreenPoint::new(609, 80)).await.unwrap();
        link.touch_hold(ScreenPoint::new(300, 200), 250).await.unwrap();
        let sent = script.lock().unwrap().sent.clone();
        assert_eq!(sent, vec![b"touch 609 80\r\n".to_vec(), b"touchHold 300 200 250\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn send_failure_closes_the_link() {
        let (link, script) = scripted(&[]);
        script.lock().unwrap().fail_writes = true;
        let err = link.touch(ScreenPoint::new(1, 2)).await.unwrap_err();
        assert!(matches!(err, PressError::Connection(_)));
        assert!(!link.is_connected());

        script.lock().unwrap().fail_writes = false;
        assert!(matches!(
            link.touch(ScreenPoint::new(1, 2)).await,
            Err(PressError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn malformed_version_keeps_link_open() {
        let (link, _script) = scripted(&[b"\n"]);
        assert!(matches!(link.get_version().await, Err(PressError::Protocol(_))));
        assert!(link.is_connected());
    }

    #[tokio::test]
    async fn unreadable_version_still_sets_poll_rate() {
        let (link, script) = scripted(&[b"\n"]);
        assert!(matches!(link.handshake(31).await, Err(PressError::Protocol(_))));
        assert!(link.is_connected());
        assert_eq!(link.poll_rate_ms(), 31);
        let sent = script.lock().unwrap().sent.clone();
        assert_eq!(sent, vec![b"getVersion\r\n".to_vec(), b"configure pollRate 31\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn lost_version_reply_skips_poll_rate() {
        let (link, script) = scripted(&[]);
        assert!(matches!(link.handshake(31).await, Err(PressError::Connection(_))));
        assert!(!link.is_connected());
        assert_eq!(link.poll_rate_ms(), 0);
        assert_eq!(script.lock().unwrap().sent, vec![b"getVersion\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn disconnect_rejects_further_commands() {
        let (link, _script) = scripted(&[]);
        link.disconnect().await;
        assert!(!link.is_connected());
        assert!(matches!(link.set_poll_rate(10).await, Err(PressError::NotConnected)));
    }

    #[tokio::test]
    async fn tcp_frame_longer_than_limit_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&[b'x'; 100]).await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut transport = TcpTransport::from_stream(stream);
        let err = transport.read_frame(16).await.unwrap_err();
        assert!(err.to_string().contains("exceeds 16 bytes"));
    }

    #[tokio::test]
    async fn connect_refused_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = LinkConfig {
            port,
            ..LinkConfig::default()
        };
        let err = ControllerLink::connect("127.0.0.1", config).await.err().unwrap();
        assert!(matches!(err, PressError::Connection(_)));
    }
}
