//! sys-botbase text protocol: one ASCII command per line.

use crate::error::{PressError, Result};
use crate::palette::ScreenPoint;

pub const LINE_TERMINATOR: &[u8] = b"\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetVersion,
    SetPollRate(u32),
    Touch(ScreenPoint),
    TouchHold(ScreenPoint, u32),
}

impl Command {
    /// Encodes the command as a terminated line ready to send.
    pub fn encode(&self) -> Vec<u8> {
        let body = match self {
            Command::GetVersion => "getVersion".to_string(),
            Command::SetPollRate(ms) => format!("configure pollRate {}", ms),
            Command::Touch(p) => format!("touch {} {}", p.x, p.y),
            Command::TouchHold(p, ms) => format!("touchHold {} {} {}", p.x, p.y, ms),
        };
        let mut out = Vec::with_capacity(body.len() + LINE_TERMINATOR.len());
        out.extend_from_slice(body.as_bytes());
        out.extend_from_slice(LINE_TERMINATOR);
        out
    }

    /// Only `getVersion` answers; everything else is fire-and-forget.
    pub fn expects_response(&self) -> bool {
        matches!(self, Command::GetVersion)
    }
}

/// Parses one command line as the device would. Trailing CR/LF is optional.
pub fn parse_command(line: &[u8]) -> Result<Command> {
    let text = std::str::from_utf8(line)
        .map_err(|_| PressError::Protocol("command is not ASCII".into()))?
        .trim_end_matches(['\r', '\n']);
    let mut parts = text.split_ascii_whitespace();
    let token = parts
        .next()
        .ok_or_else(|| PressError::Protocol("empty command".into()))?;
    let args: Vec<&str> = parts.collect();

    let int = |s: &str| -> Result<i32> {
        s.parse::<i32>()
            .map_err(|_| PressError::Protocol(format!("bad integer argument {:?} in {:?}", s, text)))
    };
    let uint = |s: &str| -> Result<u32> {
        s.parse::<u32>()
            .map_err(|_| PressError::Protocol(format!("bad duration argument {:?} in {:?}", s, text)))
    };

    match (token, args.as_slice()) {
        ("getVersion", []) => Ok(Command::GetVersion),
        ("configure", ["pollRate", ms]) => Ok(Command::SetPollRate(uint(*ms)?)),
        ("touch", [x, y]) => Ok(Command::Touch(ScreenPoint::new(int(*x)?, int(*y)?))),
        ("touchHold", [x, y, ms]) => Ok(Command::TouchHold(ScreenPoint::new(int(*x)?, int(*y)?), uint(*ms)?)),
        _ => Err(PressError::Protocol(format!("unknown command {:?}", text))),
    }
}

/// Device-side encoding of a version reply.
pub fn encode_version_response(version: &str) -> Vec<u8> {
    let mut out = version.as_bytes().to_vec();
    out.push(b'\n');
    out
}

/// Extracts the version string from a framed reply.
///
/// - `frame`: bytes up to and including `\n`, possibly NUL padded
///
/// Returns the version without line ending or padding
pub fn parse_version(frame: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(frame)
        .map_err(|_| PressError::Protocol("version reply is not UTF-8".into()))?;
    let version = text.trim_end_matches('\0').trim_end_matches(['\r', '\n']);
    if version.is_empty() {
        return Err(PressError::Protocol("empty version reply".into()));
    }
    Ok(version.to_string())
}
