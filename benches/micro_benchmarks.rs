//! Micro benchmarks for framing, decoding and value codecs
//!
//! Run with: cargo bench --bench micro_benchmarks

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mysql_wire::codec::{self, CodecContext, ColumnMeta};
use mysql_wire::protocol::wire::put_lenenc_bytes;
use mysql_wire::protocol::{decode_message, ColumnType, Compressor, Format, PacketCodec, Phase};

fn framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");
    for size in [64usize, 4 * 1024, 1024 * 1024] {
        let payload = vec![b'x'; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            let mut codec = PacketCodec::new();
            let mut out = BytesMut::with_capacity(size + 16);
            b.iter(|| {
                out.clear();
                codec.reset_sequence();
                codec.encode(black_box(payload), &mut out).unwrap();
            })
        });

        let mut wire = BytesMut::new();
        PacketCodec::new().encode(&payload, &mut wire).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", size), &wire, |b, wire| {
            b.iter(|| {
                let mut codec = PacketCodec::new();
                let mut src = wire.clone();
                black_box(codec.decode(&mut src).unwrap());
            })
        });

        let mut compressed = BytesMut::new();
        let mut writer = PacketCodec::new();
        writer.enable_compression(Compressor::Zlib);
        writer.encode(&payload, &mut compressed).unwrap();
        group.bench_with_input(BenchmarkId::new("decode_zlib", size), &compressed, |b, wire| {
            b.iter(|| {
                let mut codec = PacketCodec::new();
                codec.enable_compression(Compressor::Zlib);
                let mut src = wire.clone();
                black_box(codec.decode(&mut src).unwrap());
            })
        });
    }
    group.finish();
}

fn text_row(columns: usize) -> Bytes {
    let mut buf = BytesMut::new();
    for i in 0..columns {
        put_lenenc_bytes(&mut buf, format!("value-{}", i).as_bytes());
    }
    buf.freeze()
}

fn decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_message");
    for columns in [4usize, 32] {
        let row = text_row(columns);
        let phase = Phase::TextRows { columns };
        group.bench_with_input(BenchmarkId::new("text_row", columns), &row, |b, row| {
            b.iter(|| black_box(decode_message(row, &phase, 0).unwrap()))
        });
    }

    let ok = Bytes::from_static(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00]);
    group.bench_function("ok", |b| {
        b.iter(|| black_box(decode_message(&ok, &Phase::CommandResponse, 0).unwrap()))
    });
    group.finish();
}

fn codecs(c: &mut Criterion) {
    let ctx = CodecContext::default();
    let mut group = c.benchmark_group("codec");

    let int_meta = ColumnMeta::new(ColumnType::LongLong);
    group.bench_function("i64_text", |b| {
        b.iter(|| {
            let v: i64 = codec::decode(Some(black_box(&b"-9223372036854775"[..])), &int_meta, Format::Text, &ctx).unwrap();
            black_box(v)
        })
    });

    let bool_meta = ColumnMeta::new(ColumnType::VarString);
    group.bench_function("bool_text", |b| {
        b.iter(|| {
            let v: bool = codec::decode(Some(black_box(&b"yes"[..])), &bool_meta, Format::Text, &ctx).unwrap();
            black_box(v)
        })
    });

    let datetime_meta = ColumnMeta::new(ColumnType::DateTime);
    group.bench_function("datetime_text", |b| {
        b.iter(|| {
            let v: chrono::NaiveDateTime = codec::decode(
                Some(black_box(&b"2024-02-29 13:45:10.123456"[..])),
                &datetime_meta,
                Format::Text,
                &ctx,
            )
            .unwrap();
            black_box(v)
        })
    });
    group.finish();
}

criterion_group!(benches, framing, decoding, codecs);
criterion_main!(benches);
