//! Server-sent event wire format
//!
//! Clients parse these frames directly, so the byte layout is fixed:
//!
//! ```text
//! data: {"type": "now_playing", "data": {"title": "X"}}\n\n
//! : keepalive\n\n
//! ```

use serde::Serialize;
use std::io;

/// Comment frame sent when no event arrived within the keepalive window
pub const KEEPALIVE_FRAME: &str = ": keepalive\n\n";

/// Envelope serialized once per publish
#[derive(Debug, Serialize)]
pub struct EventEnvelope<'a, T: ?Sized> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub data: &'a T,
}

/// JSON formatter using `", "` and `": "` separators
///
/// Non-ASCII characters are written as `\uXXXX` escapes (UTF-16 surrogate
/// pairs above U+FFFF), so frames are pure ASCII.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

/// Serialize a value with [`SpacedFormatter`]
pub fn to_spaced_json<T>(value: &T) -> serde_json::Result<String>
where
    T: ?Sized + Serialize,
{
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    // serde_json only ever emits valid UTF-8
    String::from_utf8(buf).map_err(|e| serde_json::Error::io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Build the `data: {...}\n\n` frame for an event
pub fn encode_event<T>(event_type: &str, payload: &T) -> serde_json::Result<String>
where
    T: ?Sized + Serialize,
{
    let json = to_spaced_json(&EventEnvelope {
        event_type,
        data: payload,
    })?;
    Ok(format!("data: {}\n\n", json))
}

/// First frame of every live connection
///
/// Unlike regular events the listener ID sits at the top level and the JSON is compact.
pub fn connected_frame(listener_id: &str) -> String {
    format!(
        "data: {{\"type\":\"connected\",\"listener_id\":\"{}\"}}\n\n",
        listener_id
    )
}
