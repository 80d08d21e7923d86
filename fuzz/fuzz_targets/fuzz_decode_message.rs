#![no_main]

use bytes::Bytes;
use mysql_wire::protocol::constants::capabilities::CLIENT_DEPRECATE_EOF;
use mysql_wire::protocol::{decode_message, ColumnType, Phase};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First byte picks the phase and capabilities, the rest is the payload.
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let payload = Bytes::copy_from_slice(payload);
    let caps = if selector & 0x80 != 0 { CLIENT_DEPRECATE_EOF } else { 0 };
    let columns = usize::from(selector >> 3 & 0x0F);

    let phase = match selector & 0x07 {
        0 => Phase::Greeting,
        1 => Phase::Authentication,
        2 => Phase::CommandResponse,
        3 => Phase::PrepareResponse,
        4 => Phase::ColumnDefinition,
        5 => Phase::TextRows { columns },
        _ => Phase::BinaryRows {
            columns: vec![ColumnType::LongLong, ColumnType::VarString, ColumnType::DateTime][..columns.min(3)].into(),
        },
    };

    let _ = decode_message(&payload, &phase, caps);
});
