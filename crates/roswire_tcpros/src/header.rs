//! TCPROS connection headers.
//!
//! Every TCPROS connection opens with one header from each side: a u32 LE
//! total length, then each field as a u32 LE length plus `key=value`.
//! Field order is not significant. A peer that refuses a connection
//! answers with a header carrying an `error` field and closes.

use std::collections::HashMap;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use roswire_core::codec::RosMsg;
use roswire_core::error::{CoreError, Domain, ErrorKind, Payload, Result};

/// Headers are small; anything past this is a corrupt or hostile peer.
pub const MAX_HEADER_LEN: u32 = 1024 * 1024;

/// Encode a header field set into a writer.
pub fn encode<W: io::Write>(w: &mut W, fields: &HashMap<String, String>) -> Result<()> {
    fields.encode(w)
}

/// Decode a header field set from a reader.
pub fn decode<R: io::Read>(r: &mut R) -> Result<HashMap<String, String>> {
    HashMap::decode(r)
}

/// Read one header from an async stream.
pub async fn read<R: AsyncRead + Unpin>(stream: &mut R) -> Result<HashMap<String, String>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_HEADER_LEN {
        return Err(CoreError::error()
            .domain(Domain::Header)
            .kind(ErrorKind::ProtocolViolation)
            .msg("connection header exceeds length bound")
            .payload(Payload::Code(len))
            .build());
    }

    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;

    // Re-frame so the sync field-set decoder sees length + body.
    let mut framed = Vec::with_capacity(body.len() + 4);
    framed.extend_from_slice(&len_buf);
    framed.extend_from_slice(&body);
    decode(&mut io::Cursor::new(framed))
}

/// Write one header to an async stream.
pub async fn write<W: AsyncWrite + Unpin>(
    stream: &mut W,
    fields: &HashMap<String, String>,
) -> Result<()> {
    let mut buf = Vec::new();
    encode(&mut buf, fields)?;
    stream.write_all(&buf).await?;
    Ok(())
}

/// Fetch a mandatory field.
pub fn require<'a>(fields: &'a HashMap<String, String>, name: &'static str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| CoreError::missing_header_field(name))
}

/// Compare a field against the locally expected value.
///
/// `*` on either side means "accept anything" (the md5sum/type negotiation
/// rule); any other difference refuses the connection.
pub fn match_field(
    fields: &HashMap<String, String>,
    name: &'static str,
    expected: &str,
) -> Result<()> {
    let actual = require(fields, name)?;
    if actual == "*" || expected == "*" || actual == expected {
        return Ok(());
    }
    Err(CoreError::header_mismatch(name))
}

/// Build the refusal header a peer sends before closing.
pub fn error_fields(reason: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    fields.insert("error".to_string(), reason.to_string());
    fields
}

/// Surface a peer-reported refusal, if the header carries one.
pub fn reject_on_error(fields: &HashMap<String, String>) -> Result<()> {
    if let Some(reason) = fields.get("error") {
        return Err(CoreError::error()
            .domain(Domain::Header)
            .kind(ErrorKind::Transport)
            .msgf(format_args!("peer refused connection: {reason}"))
            .build());
    }
    Ok(())
}
