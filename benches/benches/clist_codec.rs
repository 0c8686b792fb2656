//! Benchmark suite for the command-list codecs.
//!
//! Measures the hot paths of band recording: variable-size integers,
//! rectangle delta encoding, and the bitmap compressors.
//!
//! Run with: cargo bench --manifest-path benches/Cargo.toml

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use platen_benches::{generate_mono_bitmap, generate_rect_walk};
use platen_clist::bitmap::{g4, rle};
use platen_clist::{opcode, rect, varint};
use std::hint::black_box;

fn bench_varint(c: &mut Criterion) {
	let values: Vec<u32> = (0..4096u32).map(|i| i.wrapping_mul(2_654_435_761)).collect();
	let mut group = c.benchmark_group("varint");
	group.throughput(Throughput::Elements(values.len() as u64));
	group.bench_function("encode", |b| {
		let mut buf = [0u8; varint::MAX_LEN];
		b.iter(|| {
			for &v in &values {
				black_box(varint::put_w(black_box(v), &mut buf));
			}
		});
	});
	group.bench_function("decode", |b| {
		let mut encoded = Vec::new();
		let mut buf = [0u8; varint::MAX_LEN];
		for &v in &values {
			let n = varint::put_w(v, &mut buf);
			encoded.extend_from_slice(&buf[..n]);
		}
		b.iter(|| {
			let mut pos = 0;
			while pos < encoded.len() {
				let (v, n) = varint::get_w(&encoded[pos..]).unwrap();
				black_box(v);
				pos += n;
			}
		});
	});
	group.finish();
}

fn bench_rect_delta(c: &mut Criterion) {
	let rects = generate_rect_walk(4096);
	let mut group = c.benchmark_group("rect_delta");
	group.throughput(Throughput::Elements(rects.len() as u64));
	group.bench_function("encode", |b| {
		b.iter(|| {
			let mut prev = platen_clist::CmdRect::default();
			let mut have_prev = false;
			for &r in &rects {
				black_box(rect::encode(opcode::FILL_RECT, r, &mut prev, have_prev));
				have_prev = true;
			}
		});
	});
	group.finish();
}

fn bench_bitmap_codecs(c: &mut Criterion) {
	let (data, raster) = generate_mono_bitmap(2048, 128);
	let mut group = c.benchmark_group("bitmap");
	group.throughput(Throughput::Bytes(data.len() as u64));
	group.bench_function("rle_encode", |b| {
		b.iter(|| black_box(rle::encode(black_box(&data))));
	});
	let rle_encoded = rle::encode(&data);
	group.bench_function("rle_decode", |b| {
		b.iter(|| black_box(rle::decode(black_box(&rle_encoded)).unwrap()));
	});
	group.bench_function("g4_encode", |b| {
		b.iter(|| black_box(g4::encode(black_box(&data), 2048, 128, raster)));
	});
	let g4_encoded = g4::encode(&data, 2048, 128, raster);
	group.bench_function("g4_decode", |b| {
		b.iter(|| black_box(g4::decode(black_box(&g4_encoded), 2048, 128, raster).unwrap()));
	});
	group.finish();
}

criterion_group!(benches, bench_varint, bench_rect_delta, bench_bitmap_codecs);
criterion_main!(benches);
