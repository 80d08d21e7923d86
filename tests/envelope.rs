//! Framing at the real packet size limit

use bytes::BytesMut;
use mysql_wire::protocol::constants::{HEADER_LEN, MAX_PAYLOAD_LEN};
use mysql_wire::protocol::{Compressor, PacketCodec};
use mysql_wire::Error;

fn frame(payload: &[u8], compressor: Option<Compressor>) -> BytesMut {
    let mut codec = PacketCodec::new();
    if let Some(c) = compressor {
        codec.enable_compression(c);
    }
    let mut wire = BytesMut::new();
    codec.encode(payload, &mut wire).unwrap();
    wire
}

fn deframe(mut wire: BytesMut, compressor: Option<Compressor>) -> Vec<u8> {
    let mut codec = PacketCodec::new();
    if let Some(c) = compressor {
        codec.enable_compression(c);
    }
    let payload = codec.decode(&mut wire).unwrap().expect("complete payload");
    assert!(wire.is_empty(), "{} trailing bytes", wire.len());
    payload.to_vec()
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_split_boundaries() {
    for len in [MAX_PAYLOAD_LEN - 1, MAX_PAYLOAD_LEN, MAX_PAYLOAD_LEN + 1, 2 * MAX_PAYLOAD_LEN] {
        let data = payload(len);
        let wire = frame(&data, None);
        let packets = len / MAX_PAYLOAD_LEN + 1;
        assert_eq!(wire.len(), len + packets * HEADER_LEN, "len {}", len);
        assert_eq!(deframe(wire, None), data, "len {}", len);
    }
}

#[test]
fn test_exact_max_ends_with_empty_packet() {
    let wire = frame(&payload(MAX_PAYLOAD_LEN), None);
    assert_eq!(&wire[..4], &[0xFF, 0xFF, 0xFF, 0]);
    assert_eq!(&wire[wire.len() - 4..], &[0, 0, 0, 1]);
}

#[test]
fn test_compressed_split_boundaries() {
    for len in [MAX_PAYLOAD_LEN, MAX_PAYLOAD_LEN + 1] {
        let data = payload(len);
        let wire = frame(&data, Some(Compressor::Zlib));
        assert!(wire.len() < len);
        assert_eq!(deframe(wire, Some(Compressor::Zlib)), data, "len {}", len);
    }
}

#[test]
fn test_compressed_stored_sub_case() {
    let data = b"SELECT 1".to_vec();
    let wire = frame(&data, Some(Compressor::Zlib));
    // uncompressed length 0: stored verbatim
    assert_eq!(&wire[4..7], &[0, 0, 0]);
    assert_eq!(deframe(wire, Some(Compressor::Zlib)), data);
}

#[test]
fn test_out_of_order_sequence_is_rejected() {
    let mut writer = PacketCodec::new();
    let mut wire = BytesMut::new();
    writer.encode(b"first", &mut wire).unwrap();
    writer.encode(b"second", &mut wire).unwrap();
    // swap: second packet claims id 0 again
    wire[9 + 3] = 0;

    let mut reader = PacketCodec::new();
    assert_eq!(&reader.decode(&mut wire).unwrap().unwrap()[..], b"first");
    assert!(matches!(reader.decode(&mut wire), Err(Error::Protocol(_))));
}
