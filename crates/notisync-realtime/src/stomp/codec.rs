//! STOMP 1.2 text codec.
//!
//! One WebSocket message may carry several frames and heart-beats. Frames
//! end with NUL; when `content-length` is present the body is exactly that
//! many bytes and may itself contain NUL.

use std::fmt::Write as _;

use notisync_core::error::{AppError, ErrorKind};
use notisync_core::result::AppResult;

use super::frame::{Inbound, StompCommand, StompFrame};

const NUL: u8 = 0;

/// Serialize a frame for the wire.
pub fn encode(frame: &StompFrame) -> String {
    let mut out = String::with_capacity(64 + frame.body.len());
    out.push_str(frame.command.as_str());
    out.push('\n');

    let escape = frame.command.escapes_headers();
    for (name, value) in &frame.headers {
        if escape {
            out.push_str(&escape_header(name));
            out.push(':');
            out.push_str(&escape_header(value));
        } else {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
        }
        out.push('\n');
    }
    if !frame.body.is_empty() && frame.get("content-length").is_none() {
        let _ = writeln!(out, "content-length:{}", frame.body.len());
    }

    out.push('\n');
    out.push_str(&frame.body);
    out.push('\0');
    out
}

/// Decode every frame and heart-beat in one WebSocket message.
///
/// A run of bare EOLs between frames is reported as a single heart-beat.
/// The whole message is rejected if any frame is malformed or larger than
/// `max_frame_bytes`.
pub fn decode(message: &str, max_frame_bytes: usize) -> AppResult<Vec<Inbound>> {
    let bytes = message.as_bytes();
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        while pos < bytes.len() && (bytes[pos] == b'\n' || bytes[pos] == b'\r') {
            pos += 1;
        }
        if pos > start {
            out.push(Inbound::Heartbeat);
        }
        if pos >= bytes.len() {
            break;
        }
        let (frame, next) = decode_frame(bytes, pos, max_frame_bytes)?;
        out.push(Inbound::Frame(frame));
        pos = next;
    }

    Ok(out)
}

/// Decode one frame starting at `start`; returns the frame and the offset
/// just past its terminating NUL.
fn decode_frame(bytes: &[u8], start: usize, max: usize) -> AppResult<(StompFrame, usize)> {
    let mut pos = start;

    let command_line = read_line(bytes, &mut pos)?;
    let command: StompCommand = command_line.parse()?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let line = read_line(bytes, &mut pos)?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| AppError::decode(format!("Malformed STOMP header line '{line}'")))?;
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| AppError::decode(format!("Invalid content-length '{v}'")))
        })
        .transpose()?;

    let body_end = match content_length {
        Some(len) => {
            let end = pos
                .checked_add(len)
                .filter(|end| *end < bytes.len())
                .ok_or_else(|| AppError::decode("STOMP frame shorter than its content-length"))?;
            if bytes[end] != NUL {
                return Err(AppError::decode("STOMP frame body not terminated by NUL"));
            }
            end
        }
        None => bytes[pos..]
            .iter()
            .position(|b| *b == NUL)
            .map(|offset| pos + offset)
            .ok_or_else(|| AppError::decode("Unterminated STOMP frame"))?,
    };

    if body_end + 1 - start > max {
        return Err(AppError::decode(format!(
            "STOMP frame of {} bytes exceeds limit of {max}",
            body_end + 1 - start
        )));
    }

    let body = std::str::from_utf8(&bytes[pos..body_end])
        .map_err(|e| AppError::with_source(ErrorKind::Decode, "STOMP body is not UTF-8", e))?
        .to_string();

    Ok((
        StompFrame {
            command,
            headers,
            body,
        },
        body_end + 1,
    ))
}

/// Read up to the next LF, stripping an optional CR.
fn read_line<'a>(bytes: &'a [u8], pos: &mut usize) -> AppResult<&'a str> {
    let rest = &bytes[*pos..];
    let len = rest
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| AppError::decode("STOMP frame truncated before end of headers"))?;
    let mut line = &rest[..len];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }
    *pos += len + 1;
    std::str::from_utf8(line).map_err(|_| AppError::decode("STOMP header is not UTF-8"))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &str) -> AppResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            other => {
                return Err(AppError::decode(format!(
                    "Invalid STOMP header escape '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}
