//! Shared test doubles: an in-memory controller and a loopback TCP one.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pixelpress::command::{encode_version_response, parse_command};
use pixelpress::{CancelSignal, Command, PressError, Result, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    pub command: Command,
    pub at: Instant,
}

#[derive(Default)]
struct State {
    sent: Vec<Sent>,
    cancel_after: Option<(usize, CancelSignal)>,
    cancelled_at: Option<Instant>,
    fail_after: Option<usize>,
}

/// Records every command with the (possibly paused) tokio clock.
#[derive(Clone, Default)]
pub struct MockController {
    state: Arc<Mutex<State>>,
    version: Arc<Mutex<Option<String>>>,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: &str) -> Self {
        let mock = Self::default();
        *mock.version.lock().unwrap() = Some(version.to_string());
        mock
    }

    /// Trip `signal` right after the `n`th command has been written.
    pub fn cancel_after(&self, n: usize, signal: CancelSignal) {
        self.state.lock().unwrap().cancel_after = Some((n, signal));
    }

    /// Fail every write after the first `n`.
    pub fn fail_after(&self, n: usize) {
        self.state.lock().unwrap().fail_after = Some(n);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.sent().into_iter().map(|s| s.command).collect()
    }

    pub fn cancelled_at(&self) -> Option<Instant> {
        self.state.lock().unwrap().cancelled_at
    }
}

#[async_trait]
impl Transport for MockController {
    async fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = state.fail_after {
            if state.sent.len() >= limit {
                return Err(PressError::Connection("connection reset by peer".into()));
            }
        }
        let command = parse_command(line)?;
        let now = Instant::now();
        state.sent.push(Sent { command, at: now });

        let count = state.sent.len();
        let trip = match &state.cancel_after {
            Some((n, signal)) if *n == count => Some(signal.clone()),
            _ => None,
        };
        if let Some(signal) = trip {
            signal.cancel();
            state.cancelled_at = Some(now);
        }
        Ok(())
    }

    async fn read_frame(&mut self, _max_len: usize) -> Result<Vec<u8>> {
        match self.version.lock().unwrap().as_deref() {
            Some(v) => Ok(encode_version_response(v)),
            None => Err(PressError::Connection("no reply".into())),
        }
    }
}

/// Loopback controller: answers `getVersion`, records everything else, and
/// returns the recorded commands once the client hangs up.
pub async fn spawn_tcp_controller(version: &'static str) -> (u16, JoinHandle<Vec<Command>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut seen = Vec::new();
        while let Ok(Some(line)) = lines.next_line().await {
            let command = parse_command(line.as_bytes()).unwrap();
            if command == Command::GetVersion {
                write.write_all(&encode_version_response(version)).await.unwrap();
            }
            seen.push(command);
        }
        seen
    });
    (port, handle)
}

pub fn solid_image(width: u32, height: u32, color: Rgb<u8>) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, color))
}
