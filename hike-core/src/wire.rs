//! Framing: a payload is N fixed-size records, each 6 address bytes + 1 status byte.
//! Record 0 is the sender's own status; the rest are relayed from its carry buffer.

use crate::address::{Address, ADDRESS_LEN};
use crate::status::{StatusCode, StatusRecord};

/// Bytes per record on the wire.
pub const RECORD_SIZE: usize = ADDRESS_LEN + 1;

/// Encode records in order: `records.len() * RECORD_SIZE` bytes.
pub fn encode(records: &[StatusRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * RECORD_SIZE);
    for r in records {
        encode_record(r, &mut out);
    }
    out
}

pub(crate) fn encode_record(record: &StatusRecord, out: &mut Vec<u8>) {
    out.extend_from_slice(record.sender.as_bytes());
    out.push(record.code.0);
}

/// Decode a whole payload. An empty buffer decodes to no records.
/// Lengths that are not a multiple of `RECORD_SIZE` are rejected outright.
pub fn decode(bytes: &[u8]) -> Result<Vec<StatusRecord>, DecodeError> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(DecodeError::InvalidLength { len: bytes.len() });
    }
    Ok(bytes.chunks_exact(RECORD_SIZE).map(decode_record).collect())
}

pub(crate) fn decode_record(chunk: &[u8]) -> StatusRecord {
    let mut sender = [0u8; ADDRESS_LEN];
    sender.copy_from_slice(&chunk[..ADDRESS_LEN]);
    StatusRecord {
        sender: Address::new(sender),
        code: StatusCode(chunk[ADDRESS_LEN]),
    }
}

/// Error decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload length {len} is not a multiple of {RECORD_SIZE}")]
    InvalidLength { len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        Address::new([0x30, 0xED, 0xA0, 0xA8, 0xCE, last])
    }

    #[test]
    fn layout_is_address_then_code() {
        let bytes = encode(&[StatusRecord::new(addr(0xD0), 7)]);
        assert_eq!(bytes, vec![0x30, 0xED, 0xA0, 0xA8, 0xCE, 0xD0, 7]);
    }

    #[test]
    fn multiple_records_keep_order() {
        let records = vec![
            StatusRecord::new(addr(1), 2),
            StatusRecord::new(addr(2), 99),
            StatusRecord::new(addr(3), 0),
        ];
        let bytes = encode(&records);
        assert_eq!(bytes.len(), 3 * RECORD_SIZE);
        assert_eq!(decode(&bytes).unwrap(), records);
    }

    #[test]
    fn empty_buffer_is_no_records() {
        assert!(encode(&[]).is_empty());
        assert_eq!(decode(&[]).unwrap(), vec![]);
    }

    #[test]
    fn rejects_partial_record() {
        let mut bytes = encode(&[StatusRecord::new(addr(1), 1)]);
        bytes.push(0xAA);
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::InvalidLength { len: 8 })
        );
        assert!(matches!(
            decode(&bytes[..3]),
            Err(DecodeError::InvalidLength { len: 3 })
        ));
    }

    #[test]
    fn rejects_legacy_four_byte_code_layout() {
        // Older firmware wrote the code as a 4-byte int: 10 bytes per record.
        let bytes = vec![0u8; 10];
        assert!(decode(&bytes).is_err());
    }
}
