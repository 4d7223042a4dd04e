// Copyright (c) 2018-2021 The MobileCoin Foundation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use masked_select::{equals_chunks, ArithmeticMask, LookupMask, MaskedSelect, Plaintext};

pub fn arithmetic_mask(c: &mut Criterion) {
    let mask = ArithmeticMask::for_chunk_bits(4);
    let values: Vec<u64> = (0..16).collect();

    c.bench_function("arithmetic mask 4-bit x16", |b| {
        b.iter(|| mask.masked_select_all(&Plaintext, &black_box(1), &values))
    });
}

pub fn lookup_mask_4(c: &mut Criterion) {
    let mask = LookupMask::for_chunk_bits(4);
    let values: Vec<u64> = (0..16).collect();

    c.bench_function("lookup mask 4-bit x16", |b| {
        b.iter(|| mask.masked_select_all(&Plaintext, &black_box(1), &values))
    });
}

pub fn lookup_mask_8(c: &mut Criterion) {
    let mask = LookupMask::for_chunk_bits(8);
    let values: Vec<u64> = (0..16).collect();

    c.bench_function("lookup mask 8-bit x16", |b| {
        b.iter(|| mask.masked_select_all(&Plaintext, &black_box(1), &values))
    });
}

pub fn equals_32bit_key(c: &mut Criterion) {
    let a: Vec<u64> = (0..8).collect();
    let b_: Vec<u64> = (0..8).rev().collect();

    c.bench_function("equals_chunks 8 chunks", |b| {
        b.iter(|| equals_chunks(&Plaintext, black_box(&a[..]), black_box(&b_[..])))
    });
}

criterion_group!(
    benches,
    arithmetic_mask,
    lookup_mask_4,
    lookup_mask_8,
    equals_32bit_key
);
criterion_main!(benches);
