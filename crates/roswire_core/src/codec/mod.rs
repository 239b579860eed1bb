//! roswire_core::codec
//!
//! The ROS1 wire serialization format, implemented directly over
//! `io::Read`/`io::Write`:
//! - fixed-width integers and floats are little-endian, natural width
//! - bool is a single byte, 0 or 1
//! - String is a u32 byte length followed by UTF-8 bytes
//! - Vec<T> is a u32 element count followed by the elements
//! - fixed arrays are the elements only, no count prefix
//! - the connection-header field set is a u32 total length followed by
//!   u32-prefixed `key=value` entries
//!
//! Message framing (the u32 length in front of a whole message) is the
//! transport layer's job, not the codec's.

use std::collections::HashMap;
use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CoreError, Domain, ErrorKind, Payload, Result};

mod time;
pub use time::{RosDuration, Time};

/// A value that can be read from and written to the ROS1 wire format.
pub trait RosMsg: Sized {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()>;
    fn decode<R: io::Read>(r: &mut R) -> Result<Self>;
}

/// Lengths and counts on the wire are u32; anything larger cannot be encoded.
fn wire_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        CoreError::error()
            .domain(Domain::Codec)
            .kind(ErrorKind::UnsupportedData)
            .msg("data length exceeds u32 wire limit")
            .build()
    })
}

macro_rules! impl_rosmsg_numeric {
    ($ty:ty, $write:ident, $read:ident) => {
        impl RosMsg for $ty {
            fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
                w.$write::<LittleEndian>(*self)?;
                Ok(())
            }

            fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
                Ok(r.$read::<LittleEndian>()?)
            }
        }
    };
}

impl_rosmsg_numeric!(u16, write_u16, read_u16);
impl_rosmsg_numeric!(u32, write_u32, read_u32);
impl_rosmsg_numeric!(u64, write_u64, read_u64);
impl_rosmsg_numeric!(i16, write_i16, read_i16);
impl_rosmsg_numeric!(i32, write_i32, read_i32);
impl_rosmsg_numeric!(i64, write_i64, read_i64);
impl_rosmsg_numeric!(f32, write_f32, read_f32);
impl_rosmsg_numeric!(f64, write_f64, read_f64);

impl RosMsg for u8 {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(*self)?;
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(r.read_u8()?)
    }
}

impl RosMsg for i8 {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_i8(*self)?;
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        Ok(r.read_i8()?)
    }
}

impl RosMsg for bool {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u8(u8::from(*self))?;
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        match r.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CoreError::warn()
                .domain(Domain::Codec)
                .kind(ErrorKind::Decode)
                .msg("bool byte out of range")
                .payload(Payload::Code(u32::from(other)))
                .build()),
        }
    }
}

impl RosMsg for String {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        wire_len(self.len())?.encode(w)?;
        w.write_all(self.as_bytes())?;
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        let len = u32::decode(r)? as usize;
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        String::from_utf8(buf).map_err(|_| CoreError::decode("string is not valid UTF-8"))
    }
}

impl<T: RosMsg> RosMsg for Vec<T> {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        wire_len(self.len())?.encode(w)?;
        for item in self {
            item.encode(w)?;
        }
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        let count = u32::decode(r)? as usize;
        // Do not trust the count for preallocation; a hostile peer can claim
        // u32::MAX elements in a four-byte payload.
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(T::decode(r)?);
        }
        Ok(items)
    }
}

impl<T: RosMsg, const N: usize> RosMsg for [T; N] {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        for item in self {
            item.encode(w)?;
        }
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::decode(r)?);
        }
        items
            .try_into()
            .map_err(|_| CoreError::decode("fixed array arity mismatch"))
    }
}

/// Connection-header field sets travel as a u32 total length followed by
/// u32-prefixed `key=value` entries.
impl RosMsg for HashMap<String, String> {
    fn encode<W: io::Write>(&self, w: &mut W) -> Result<()> {
        let mut body = Vec::new();
        for (key, value) in self {
            let entry_len = key.len() + value.len() + 1;
            wire_len(entry_len)?.encode(&mut body)?;
            body.extend_from_slice(key.as_bytes());
            body.push(b'=');
            body.extend_from_slice(value.as_bytes());
        }
        wire_len(body.len())?.encode(w)?;
        w.write_all(&body)?;
        Ok(())
    }

    fn decode<R: io::Read>(r: &mut R) -> Result<Self> {
        let total = u32::decode(r)? as usize;
        let mut body = vec![0u8; total];
        r.read_exact(&mut body)?;

        let mut fields = HashMap::new();
        let mut cursor = io::Cursor::new(body);
        while (cursor.position() as usize) < total {
            let entry = String::decode(&mut cursor)?;
            let (key, value) = entry.split_once('=').ok_or_else(|| {
                CoreError::warn()
                    .domain(Domain::Header)
                    .kind(ErrorKind::ProtocolViolation)
                    .msg("header entry without '=' separator")
                    .build()
            })?;
            fields.insert(key.to_string(), value.to_string());
        }
        Ok(fields)
    }
}
