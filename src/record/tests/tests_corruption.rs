//! Record corruption tests: any single-bit flip in `type || key || value`
//! must fail checksum verification.

use rand::Rng;

use crate::record::*;

fn encoded(record: &LogRecord) -> (Vec<u8>, usize) {
    let bytes = encode_record(record).unwrap();
    let (_, header_len) = decode_header(&bytes).unwrap();
    (bytes, header_len)
}

fn decode_all(bytes: &[u8]) -> Result<LogRecord, RecordError> {
    let (header, header_len) = decode_header(bytes).expect("header");
    decode_payload(&header, &bytes[header_len..])
}

/// # Scenario
/// Flip every bit of the type byte, key, and value in turn.
///
/// # Expected behavior
/// Each flip yields `RecordError::ChecksumMismatch`.
#[test]
fn every_single_bit_flip_is_detected() {
    let record = LogRecord::normal(b"key-01".to_vec(), b"value-01".to_vec());
    let (bytes, header_len) = encoded(&record);

    // Type byte lives at offset 4; key and value follow the header.
    let covered: Vec<usize> = std::iter::once(4).chain(header_len..bytes.len()).collect();

    for idx in covered {
        for bit in 0..8 {
            let mut corrupt = bytes.clone();
            corrupt[idx] ^= 1 << bit;
            let err = decode_all(&corrupt).unwrap_err();
            assert!(
                matches!(err, RecordError::ChecksumMismatch { .. }),
                "byte {idx} bit {bit}: expected ChecksumMismatch, got {err:?}"
            );
        }
    }
}

#[test]
fn random_bit_flip_in_large_value_is_detected() {
    let mut rng = rand::rng();
    let value: Vec<u8> = (0..4096).map(|_| rng.random()).collect();
    let record = LogRecord::normal(b"large".to_vec(), value);
    let (bytes, header_len) = encoded(&record);

    for _ in 0..64 {
        let idx = rng.random_range(header_len..bytes.len());
        let bit = rng.random_range(0..8);
        let mut corrupt = bytes.clone();
        corrupt[idx] ^= 1 << bit;
        assert!(matches!(
            decode_all(&corrupt).unwrap_err(),
            RecordError::ChecksumMismatch { .. }
        ));
    }
}

#[test]
fn corrupted_stored_checksum_is_detected() {
    let (mut bytes, _) = encoded(&LogRecord::normal(b"k".to_vec(), b"v".to_vec()));
    bytes[0] ^= 0xFF;
    assert!(matches!(
        decode_all(&bytes).unwrap_err(),
        RecordError::ChecksumMismatch { .. }
    ));
}

#[test]
fn unknown_type_with_valid_checksum() {
    // Hand-build a record with type 7 and a matching CRC.
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&record_crc(7, b"k", b"").to_le_bytes());
    bytes.extend_from_slice(&[7, 1, 0, b'k']);
    let err = decode_all(&bytes).unwrap_err();
    assert!(matches!(err, RecordError::UnknownType(7)));
}

#[test]
fn short_payload_is_rejected() {
    let (bytes, header_len) = encoded(&LogRecord::normal(b"key".to_vec(), b"value".to_vec()));
    let (header, _) = decode_header(&bytes).unwrap();
    let err = decode_payload(&header, &bytes[header_len..bytes.len() - 1]).unwrap_err();
    assert!(matches!(err, RecordError::Encoding(_)));
}
