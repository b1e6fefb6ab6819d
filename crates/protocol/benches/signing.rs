//! Benchmarks for the envelope hot paths.
//!
//! - Signature computation over bodies of growing size
//! - JSON encoding and decoding of a signed envelope

use amq_protocol::{DuplexMessage, Envelope, Message, MsgBody, Signer};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn message_with_entries(entries: usize) -> Message {
    let body: MsgBody = (0..entries).map(|i| (format!("key{:04}", i), i)).collect();
    DuplexMessage::new(
        "bench",
        "sys_amq_0001_biz",
        "sys_amq_0002_biz",
        "sys_amq_0003_biz",
    )
    .with_body(body)
    .into()
}

fn bench_signing(c: &mut Criterion) {
    let mut group = c.benchmark_group("signing");
    let signer = Signer::new("bench-secret");

    for entries in [0usize, 8, 64] {
        let envelope = Envelope::from_message(&message_with_entries(entries), &signer);
        group.bench_function(format!("sign_{}_entries", entries), |b| {
            b.iter(|| signer.sign(black_box(&envelope)))
        });
    }

    group.finish();
}

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");
    let signer = Signer::new("bench-secret");
    let envelope = Envelope::from_message(&message_with_entries(8), &signer);
    let bytes = envelope.to_bytes().unwrap();

    group.bench_function("encode", |b| b.iter(|| black_box(&envelope).to_bytes()));
    group.bench_function("decode_and_verify", |b| {
        b.iter(|| {
            let decoded = Envelope::from_slice(black_box(&bytes)).unwrap();
            signer.verify(&decoded)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_signing, bench_encoding);
criterion_main!(benches);
