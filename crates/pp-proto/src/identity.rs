//! 17-byte binary peer identities and their printable form.
//!
//! A peer (client or worker) is addressed on a router socket by a 17-byte
//! token: a leading zero byte followed by a 16-byte UUID. For logging and
//! for the worker queue (which needs a hashable/orderable key, not a raw
//! byte buffer) the token has a human-readable form: `@` followed by the
//! 16 payload bytes rendered as 32 uppercase hex characters.

use uuid::Uuid;

/// Length of the binary identity: one marker byte + 16 UUID bytes.
pub const BINARY_LEN: usize = 17;

/// Length of the readable identity: `@` + 32 hex chars.
pub const READABLE_LEN: usize = 33;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity must be {BINARY_LEN} bytes, got {0}")]
    WrongBinaryLength(usize),
    #[error("identity must start with a zero byte")]
    MissingMarkerByte,
    #[error("readable identity must be {READABLE_LEN} chars, got {0}")]
    WrongReadableLength(usize),
    #[error("readable identity must start with '@'")]
    MissingAtSign,
    #[error("readable identity contains non-hex character {0:?}")]
    InvalidHexChar(char),
}

/// Encode a 17-byte binary identity (`0x00` + 16-byte UUID) as `@` + 32
/// uppercase hex characters.
///
/// Grounded in the source `encode_uuid`: marker byte is asserted, not
/// re-emitted; each payload byte becomes two uppercase hex digits.
pub fn encode_uuid(data: &[u8]) -> Result<String, IdentityError> {
    if data.len() != BINARY_LEN {
        return Err(IdentityError::WrongBinaryLength(data.len()));
    }
    if data[0] != 0x00 {
        return Err(IdentityError::MissingMarkerByte);
    }
    let mut out = String::with_capacity(READABLE_LEN);
    out.push('@');
    for byte in &data[1..] {
        out.push_str(&format!("{:02X}", byte));
    }
    Ok(out)
}

/// Decode a readable identity (`@` + 32 uppercase hex chars) back into
/// its 17-byte binary form. Only the exact shape `encode_uuid` produces
/// is accepted; lowercase hex is rejected rather than tolerated, per the
/// readable form's definition as uppercase.
pub fn decode_uuid(readable: &str) -> Result<Vec<u8>, IdentityError> {
    let chars: Vec<char> = readable.chars().collect();
    if chars.len() != READABLE_LEN {
        return Err(IdentityError::WrongReadableLength(chars.len()));
    }
    if chars[0] != '@' {
        return Err(IdentityError::MissingAtSign);
    }
    let mut data = Vec::with_capacity(BINARY_LEN);
    data.push(0x00);
    for pair in chars[1..].chunks(2) {
        let hi = hex_nibble(pair[0])?;
        let lo = hex_nibble(pair[1])?;
        data.push((hi << 4) | lo);
    }
    Ok(data)
}

fn hex_nibble(c: char) -> Result<u8, IdentityError> {
    if !c.is_ascii_hexdigit() || c.is_ascii_lowercase() {
        return Err(IdentityError::InvalidHexChar(c));
    }
    c.to_digit(16)
        .map(|d| d as u8)
        .ok_or(IdentityError::InvalidHexChar(c))
}

/// Build a fresh binary identity from a random v4 UUID.
pub fn new_binary_identity() -> Vec<u8> {
    let mut data = Vec::with_capacity(BINARY_LEN);
    data.push(0x00);
    data.extend_from_slice(Uuid::new_v4().as_bytes());
    data
}

/// Check that a frame looks like an identity frame: exactly 17 bytes,
/// first byte zero. Used for the frontend's frame-0 validation.
pub fn is_valid_identity_frame(frame: &[u8]) -> bool {
    frame.len() == BINARY_LEN && frame[0] == 0x00
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn roundtrip_random_identity() {
        let bin = new_binary_identity();
        let readable = encode_uuid(&bin).unwrap();
        assert_eq!(readable.len(), READABLE_LEN);
        assert!(readable.starts_with('@'));
        let back = decode_uuid(&readable).unwrap();
        assert_eq!(bin, back);
    }

    #[test]
    fn encode_rejects_wrong_length() {
        assert_eq!(
            encode_uuid(&[0u8; 16]),
            Err(IdentityError::WrongBinaryLength(16))
        );
    }

    #[test]
    fn encode_rejects_missing_marker() {
        let mut data = vec![0x01u8; BINARY_LEN];
        data[0] = 0x01;
        assert_eq!(encode_uuid(&data), Err(IdentityError::MissingMarkerByte));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert_eq!(
            decode_uuid("@ABC"),
            Err(IdentityError::WrongReadableLength(4))
        );
    }

    #[test]
    fn decode_rejects_missing_at() {
        let bad = "X".repeat(READABLE_LEN);
        assert_eq!(decode_uuid(&bad), Err(IdentityError::MissingAtSign));
    }

    #[test]
    fn decode_rejects_lowercase_hex() {
        let bin = new_binary_identity();
        let upper = encode_uuid(&bin).unwrap();
        let lower = format!("@{}", &upper[1..].to_lowercase());
        assert!(matches!(
            decode_uuid(&lower),
            Err(IdentityError::InvalidHexChar(_))
        ));
    }

    #[test]
    fn is_valid_identity_frame_checks_length_and_marker() {
        let bin = new_binary_identity();
        assert!(is_valid_identity_frame(&bin));
        assert!(!is_valid_identity_frame(&bin[1..]));
        let mut bad_marker = bin.clone();
        bad_marker[0] = 0x01;
        assert!(!is_valid_identity_frame(&bad_marker));
    }
}
