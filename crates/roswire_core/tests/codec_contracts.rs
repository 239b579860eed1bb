use std::io;

use roswire_core::codec::{RosMsg, Time};
use roswire_core::error::{ErrorKind, Result};

/// Hand-written message the way generated ROS structs serialize:
/// fields back to back, in declaration order, no framing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Telemetry {
    seq: i16,
    armed: bool,
    mode: u8,
    frame_id: String,
    flags: Vec<bool>,
}

impl RosMsg for Telemetry {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        self.seq.encode(w)?;
        self.armed.encode(w)?;
        self.mode.encode(w)?;
        self.frame_id.encode(w)?;
        self.flags.encode(w)
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            seq: i16::decode(r)?,
            armed: bool::decode(r)?,
            mode: u8::decode(r)?,
            frame_id: String::decode(r)?,
            flags: Vec::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    label: String,
    ok: bool,
}

impl RosMsg for Part {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        self.label.encode(w)?;
        self.ok.encode(w)
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            label: String::decode(r)?,
            ok: bool::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Manifest {
    parts: Vec<Part>,
    note: String,
}

impl RosMsg for Manifest {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        self.parts.encode(w)?;
        self.note.encode(w)
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            parts: Vec::decode(r)?,
            note: String::decode(r)?,
        })
    }
}

fn encoded<T: RosMsg>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.encode(&mut out).unwrap();
    out
}

#[test]
fn flat_message_has_exact_wire_layout() {
    let msg = Telemetry {
        seq: 2050,
        armed: true,
        mode: 7,
        frame_id: String::from("ABC012"),
        flags: vec![true, false, false, true],
    };

    assert_eq!(
        encoded(&msg),
        vec![
            2, 8, // seq
            1, // armed
            7, // mode
            6, 0, 0, 0, 65, 66, 67, 48, 49, 50, // frame_id
            4, 0, 0, 0, 1, 0, 0, 1, // flags
        ]
    );
}

#[test]
fn nested_message_has_exact_wire_layout() {
    let msg = Manifest {
        parts: vec![
            Part { label: String::from("ABC"), ok: true },
            Part { label: String::from("1!!!!"), ok: true },
            Part { label: String::from("234b"), ok: false },
        ],
        note: String::from("EEe"),
    };

    assert_eq!(
        encoded(&msg),
        vec![
            3, 0, 0, 0, // part count
            3, 0, 0, 0, 65, 66, 67, 1, // "ABC", true
            5, 0, 0, 0, 49, 33, 33, 33, 33, 1, // "1!!!!", true
            4, 0, 0, 0, 50, 51, 52, 98, 0, // "234b", false
            3, 0, 0, 0, 69, 69, 101, // note
        ]
    );
}

#[test]
fn messages_roundtrip() {
    let cases = [
        Telemetry {
            seq: -42,
            armed: false,
            mode: 0,
            frame_id: String::new(),
            flags: vec![],
        },
        Telemetry {
            seq: i16::MAX,
            armed: true,
            mode: u8::MAX,
            frame_id: String::from("base_link"),
            flags: vec![true; 17],
        },
    ];

    for msg in cases {
        let bytes = encoded(&msg);
        let back = Telemetry::decode(&mut io::Cursor::new(bytes)).unwrap();
        assert_eq!(back, msg);
    }
}

#[test]
fn decode_positions_cursor_after_message() {
    // Two messages back to back decode sequentially from one reader.
    let a = Part { label: String::from("x"), ok: true };
    let b = Part { label: String::from("yz"), ok: false };

    let mut bytes = encoded(&a);
    bytes.extend(encoded(&b));

    let mut cursor = io::Cursor::new(bytes);
    assert_eq!(Part::decode(&mut cursor).unwrap(), a);
    assert_eq!(Part::decode(&mut cursor).unwrap(), b);
}

#[test]
fn truncated_nested_message_fails_with_io_kind() {
    let msg = Manifest {
        parts: vec![Part { label: String::from("ABC"), ok: true }],
        note: String::from("n"),
    };

    let bytes = encoded(&msg);
    let err = Manifest::decode(&mut io::Cursor::new(&bytes[..bytes.len() - 3])).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
}

#[test]
fn time_embeds_like_any_field() {
    let stamp = Time::new(1_700_000_000, 42);
    let mut bytes = Vec::new();
    stamp.encode(&mut bytes).unwrap();
    42u32.encode(&mut bytes).unwrap();

    let mut cursor = io::Cursor::new(bytes);
    assert_eq!(Time::decode(&mut cursor).unwrap(), stamp);
    assert_eq!(u32::decode(&mut cursor).unwrap(), 42);
}
