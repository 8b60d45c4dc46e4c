//! Byte-stable JSON for message payloads.
//!
//! Payloads are compared byte for byte across nodes, so the rendering is
//! pinned: keys sorted, `", "` between items, `": "` between key and value,
//! and every character outside printable ASCII escaped as `\uXXXX`
//! (surrogate pairs above the BMP).

use std::io;

use serde::Serialize;
use serde_json::ser::{CharEscape, Formatter, Serializer};
use serde_json::{Map, Value};

use super::bindings::Bindings;
use super::{MessageError, MessageResult};

/// Formatter with spaced separators and ASCII-only output.
#[derive(Clone, Copy, Debug, Default)]
pub struct PayloadFormatter;

impl Formatter for PayloadFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() && c != '\x7f' {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..i])?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }

    fn write_char_escape<W: ?Sized + io::Write>(&mut self, writer: &mut W, escape: CharEscape) -> io::Result<()> {
        let text: &[u8] = match escape {
            CharEscape::Quote => b"\\\"",
            CharEscape::ReverseSolidus => b"\\\\",
            CharEscape::Solidus => b"\\/",
            CharEscape::Backspace => b"\\b",
            CharEscape::FormFeed => b"\\f",
            CharEscape::LineFeed => b"\\n",
            CharEscape::CarriageReturn => b"\\r",
            CharEscape::Tab => b"\\t",
            CharEscape::AsciiControl(byte) => {
                return write!(writer, "\\u{:04x}", byte);
            }
        };
        writer.write_all(text)
    }
}

/// Renders any serializable value with [`PayloadFormatter`].
pub fn to_string_stable<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PayloadFormatter);
    value.serialize(&mut serializer)?;
    // The formatter only ever writes ASCII.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Renders a payload: sorted keys, hex bytes, stable separators.
pub fn to_payload_json(bindings: &Bindings) -> MessageResult<String> {
    let object: Map<String, Value> = bindings
        .iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect();
    to_string_stable(&Value::Object(object)).map_err(MessageError::Payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings;
    use crate::messages::bindings_from_json;

    #[test]
    fn separators_are_spaced() {
        let payload = to_payload_json(&bindings! { "b" => 2u64, "a" => "x" }).unwrap();
        assert_eq!(payload, r#"{"a": "x", "b": 2}"#);
    }

    #[test]
    fn empty_payload() {
        assert_eq!(to_payload_json(&Bindings::new()).unwrap(), "{}");
    }

    #[test]
    fn bytes_and_nulls() {
        let bindings = bindings! { "memo" => vec![0xcau8, 0xfe], "event" => None::<String> };
        let payload = to_payload_json(&bindings).unwrap();
        assert_eq!(payload, r#"{"event": null, "memo": "cafe"}"#);
    }

    #[test]
    fn non_ascii_is_escaped() {
        let payload = to_payload_json(&bindings! { "description" => "caf\u{e9} \u{1f600}" }).unwrap();
        assert_eq!(payload, r#"{"description": "caf\u00e9 \ud83d\ude00"}"#);
    }

    #[test]
    fn control_characters_are_escaped() {
        let payload = to_payload_json(&bindings! { "d" => "a\"b\\c\nd\u{1}" }).unwrap();
        assert_eq!(payload, r#"{"d": "a\"b\\c\nd\u0001"}"#);
    }

    #[test]
    fn floats_and_arrays_render_as_json() {
        let bindings = bindings_from_json(&serde_json::json!({
            "fee_fraction": 0.5,
            "tags": [1, 2],
            "meta": {"b": 1, "a": "\u{e9}"},
        }));
        assert_eq!(
            to_payload_json(&bindings).unwrap(),
            r#"{"fee_fraction": 0.5, "meta": {"a": "\u00e9", "b": 1}, "tags": [1, 2]}"#
        );
    }

    #[test]
    fn arrays_use_the_same_separator() {
        let rendered = to_string_stable(&serde_json::json!([1, 2, 3])).unwrap();
        assert_eq!(rendered, "[1, 2, 3]");
    }
}
