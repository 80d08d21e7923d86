#![no_main]

use bytes::BytesMut;
use mysql_wire::protocol::{Compressor, PacketCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&mode, wire)) = data.split_first() else {
        return;
    };
    let mut codec = PacketCodec::new().with_max_payload(usize::from(mode >> 1).max(1));
    if mode & 1 != 0 {
        codec.enable_compression(Compressor::Zlib);
    }

    // Feed in two halves to exercise partial reads
    let mid = wire.len() / 2;
    let mut buf = BytesMut::from(&wire[..mid]);
    for next in [&wire[mid..], &[][..]] {
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => return,
            }
        }
        buf.extend_from_slice(next);
    }
});
