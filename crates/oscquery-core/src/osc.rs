//! OSC 1.0 binary codec
//!
//! Packet layout for a single message: address (NUL-terminated UTF-8,
//! padded to the next 4-byte boundary), type tag string beginning with `,`
//! (NUL-terminated, padded), then the argument payloads in tag order. All
//! multi-byte numeric fields are big-endian.
//!
//! Decoding is tolerant: a truncated packet yields the successfully decoded
//! argument prefix, unknown tag characters are skipped without consuming
//! payload bytes, and `[`/`]` array brackets are recognized but produce no
//! argument in this revision. Only a packet that cannot produce an address
//! fails outright.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::{Error, Result};
pub use crate::types::OscValue;

/// A decoded OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub path: String,
    pub args: Vec<OscValue>,
}

#[inline]
fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

fn take<'a>(buf: &'a [u8], cursor: &mut usize, n: usize) -> Option<&'a [u8]> {
    let end = cursor.checked_add(n)?;
    if end > buf.len() {
        return None;
    }
    let slice = &buf[*cursor..end];
    *cursor = end;
    Some(slice)
}

fn take_u32(buf: &[u8], cursor: &mut usize) -> Option<u32> {
    take(buf, cursor, 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn take_u64(buf: &[u8], cursor: &mut usize) -> Option<u64> {
    take(buf, cursor, 8).map(|b| {
        u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    })
}

/// Decode a single OSC message.
///
/// Fails with [`Error::MalformedOsc`] only when no address can be framed;
/// everything after the address degrades gracefully per the rules above.
pub fn decode(buf: &[u8]) -> Result<OscMessage> {
    if buf.len() < 4 {
        return Err(Error::MalformedOsc(format!(
            "packet too short: {} bytes",
            buf.len()
        )));
    }

    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::MalformedOsc("unterminated address".to_string()))?;
    let path = std::str::from_utf8(&buf[..nul])
        .map_err(|e| Error::MalformedOsc(format!("address is not UTF-8: {}", e)))?
        .to_string();

    let mut cursor = pad4(nul + 1);
    if cursor >= buf.len() || buf[cursor] != b',' {
        return Ok(OscMessage { path, args: Vec::new() });
    }

    let tag_start = cursor + 1;
    let (tags, args_start) = match buf[tag_start..].iter().position(|&b| b == 0) {
        Some(rel) => (
            &buf[tag_start..tag_start + rel],
            pad4(tag_start + rel + 1).min(buf.len()),
        ),
        None => (&buf[tag_start..], buf.len()),
    };
    let tags = tags.to_vec();

    cursor = args_start;
    let mut args = Vec::with_capacity(tags.len());

    for tag in tags {
        match tag {
            b'i' => match take_u32(buf, &mut cursor) {
                Some(v) => args.push(OscValue::Int(v as i32)),
                None => break,
            },
            b'f' => match take_u32(buf, &mut cursor) {
                Some(v) => args.push(OscValue::Float(f32::from_bits(v))),
                None => break,
            },
            b's' | b'S' => {
                let Some(rel) = buf[cursor.min(buf.len())..].iter().position(|&b| b == 0) else {
                    break;
                };
                let s = String::from_utf8_lossy(&buf[cursor..cursor + rel]).into_owned();
                args.push(OscValue::Str(s));
                cursor = pad4(cursor + rel + 1).min(buf.len());
            }
            b'b' => {
                let Some(size) = take_u32(buf, &mut cursor) else {
                    break;
                };
                let Some(data) = take(buf, &mut cursor, size as usize) else {
                    break;
                };
                args.push(OscValue::Blob(data.to_vec()));
                cursor = pad4(cursor).min(buf.len());
            }
            b'h' => match take_u64(buf, &mut cursor) {
                Some(v) => args.push(OscValue::Long(v as i64)),
                None => break,
            },
            b't' => match take_u64(buf, &mut cursor) {
                Some(v) => args.push(OscValue::TimeTag {
                    seconds: (v >> 32) as u32,
                    fraction: v as u32,
                }),
                None => break,
            },
            b'd' => match take_u64(buf, &mut cursor) {
                Some(v) => args.push(OscValue::Double(f64::from_bits(v))),
                None => break,
            },
            b'c' => match take_u32(buf, &mut cursor) {
                Some(v) => {
                    if let Some(c) = char::from_u32(v) {
                        args.push(OscValue::Char(c));
                    }
                }
                None => break,
            },
            b'r' => match take(buf, &mut cursor, 4) {
                Some(b) => args.push(OscValue::Rgba {
                    r: b[0],
                    g: b[1],
                    b: b[2],
                    a: b[3],
                }),
                None => break,
            },
            b'm' => match take(buf, &mut cursor, 4) {
                Some(b) => args.push(OscValue::Midi {
                    port: b[0],
                    status: b[1],
                    data1: b[2],
                    data2: b[3],
                }),
                None => break,
            },
            b'T' => args.push(OscValue::Bool(true)),
            b'F' => args.push(OscValue::Bool(false)),
            b'N' => args.push(OscValue::Nil),
            b'I' => args.push(OscValue::Infinitum),
            // array brackets carry no payload in this revision
            b'[' | b']' => {}
            // unknown tag: skip without consuming payload bytes
            _ => {}
        }
    }

    Ok(OscMessage { path, args })
}

/// Encode a single OSC message.
///
/// Supports `i`/`f`/`s`/`b`/`T`/`F`/`N` payloads; arguments of any other
/// variant are skipped with a warning. The output length is always a
/// multiple of 4.
pub fn encode(path: &str, args: &[OscValue]) -> Bytes {
    let mut buf = BytesMut::with_capacity(32 + args.len() * 8);
    put_padded_str(&mut buf, path);

    let mut tags = String::with_capacity(args.len() + 1);
    tags.push(',');
    let mut payload = Vec::with_capacity(args.len());
    for arg in args {
        let tag = match arg {
            OscValue::Int(_) => 'i',
            OscValue::Float(_) => 'f',
            OscValue::Str(_) => 's',
            OscValue::Blob(_) => 'b',
            OscValue::Bool(true) => 'T',
            OscValue::Bool(false) => 'F',
            OscValue::Nil => 'N',
            other => {
                warn!("skipping OSC argument with no wire encoding: {:?}", other);
                continue;
            }
        };
        tags.push(tag);
        payload.push(arg);
    }
    put_padded_str(&mut buf, &tags);

    for arg in payload {
        match arg {
            OscValue::Int(v) => buf.put_i32(*v),
            OscValue::Float(v) => buf.put_f32(*v),
            OscValue::Str(s) => put_padded_str(&mut buf, s),
            OscValue::Blob(b) => {
                buf.put_u32(b.len() as u32);
                buf.extend_from_slice(b);
                pad_to_4(&mut buf);
            }
            _ => {}
        }
    }

    buf.freeze()
}

fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.put_u8(0);
    pad_to_4(buf);
}

fn pad_to_4(buf: &mut BytesMut) {
    while buf.len() % 4 != 0 {
        buf.put_u8(0);
    }
}
