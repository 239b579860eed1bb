//! Message framing shared by the service and topic paths.
//!
//! On the wire a message is its u32 LE byte length followed by the encoded
//! body. Encoding reserves the length slot up front and patches it after
//! the body is written, so the message is serialized exactly once.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use roswire_core::codec::RosMsg;
use roswire_core::error::{CoreError, Domain, ErrorKind, Payload, Result};

/// Default per-frame bound. Anything larger is treated as a protocol
/// violation rather than an allocation request.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Serialize a message with its length prefix in front.
pub fn encode_framed<M: RosMsg>(msg: &M) -> Result<Vec<u8>> {
    let mut writer = io::Cursor::new(Vec::with_capacity(128));
    // skip the length slot, encode the body, then patch the slot
    writer.set_position(4);
    msg.encode(&mut writer)?;

    let body_len = writer.position() - 4;
    let body_len = u32::try_from(body_len).map_err(|_| {
        CoreError::error()
            .domain(Domain::Codec)
            .kind(ErrorKind::UnsupportedData)
            .msg("message body exceeds u32 frame limit")
            .build()
    })?;
    writer.set_position(0);
    body_len.encode(&mut writer)?;
    Ok(writer.into_inner())
}

/// Read one length-prefixed frame, returning the body bytes.
pub async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R, max_len: u32) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > max_len {
        return Err(CoreError::error()
            .domain(Domain::Transport)
            .kind(ErrorKind::ProtocolViolation)
            .msg("frame exceeds length bound")
            .payload(Payload::Code(len))
            .build());
    }

    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    Ok(body)
}

/// Decode a message from a frame body, requiring the body to be consumed
/// exactly.
pub fn decode_frame<M: RosMsg>(body: &[u8]) -> Result<M> {
    let mut cursor = io::Cursor::new(body);
    let msg = M::decode(&mut cursor)?;
    if cursor.position() as usize != body.len() {
        return Err(CoreError::decode("frame carries trailing bytes"));
    }
    Ok(msg)
}

/// Read the one-byte verification flag a service sends before its response.
pub async fn read_flag<R: AsyncRead + Unpin>(stream: &mut R) -> Result<bool> {
    let mut flag = [0u8; 1];
    stream.read_exact(&mut flag).await?;
    Ok(flag[0] != 0)
}

/// Write the verification flag.
pub async fn write_flag<W: AsyncWrite + Unpin>(stream: &mut W, ok: bool) -> Result<()> {
    stream.write_all(&[u8::from(ok)]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_encoding_carries_length_prefix() {
        let framed = encode_framed(&String::from("hi")).unwrap();
        // body = u32 string length + bytes
        assert_eq!(framed, vec![6, 0, 0, 0, 2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn framed_empty_message_is_length_zero() {
        #[derive(Debug, PartialEq)]
        struct Empty;

        impl RosMsg for Empty {
            fn encode<W: io::Write>(&self, _w: &mut W) -> Result<()> {
                Ok(())
            }
            fn decode<R: io::Read>(_r: &mut R) -> Result<Self> {
                Ok(Empty)
            }
        }

        assert_eq!(encode_framed(&Empty).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn decode_frame_rejects_trailing_bytes() {
        let err = decode_frame::<u16>(&[1, 0, 99]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
    }

    #[tokio::test]
    async fn read_frame_returns_the_body() {
        let framed = encode_framed(&0xDDCCBBAAu32).unwrap();
        let mut cursor = io::Cursor::new(framed);

        let body = read_frame(&mut cursor, DEFAULT_MAX_FRAME_LEN).await.unwrap();
        assert_eq!(body, vec![0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(decode_frame::<u32>(&body).unwrap(), 0xDDCCBBAA);
    }

    #[tokio::test]
    async fn read_frame_rejects_oversized_length() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1024u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 1024]);
        let mut cursor = io::Cursor::new(bytes);

        let err = read_frame(&mut cursor, 512).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolViolation);
        assert_eq!(err.payload, Payload::Code(1024));
    }

    #[tokio::test]
    async fn flag_roundtrips() {
        let mut buf = Vec::new();
        write_flag(&mut buf, true).await.unwrap();
        write_flag(&mut buf, false).await.unwrap();

        let mut cursor = io::Cursor::new(buf);
        assert!(read_flag(&mut cursor).await.unwrap());
        assert!(!read_flag(&mut cursor).await.unwrap());
    }
}
