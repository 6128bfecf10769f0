use criterion::{Criterion, black_box, criterion_group, criterion_main};
use skelview_assets::{BinaryInput, version};

fn encode_varint(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn skeleton_header(version: &str) -> Vec<u8> {
    let mut bytes = vec![0u8; 8];
    encode_varint(&mut bytes, version.len() as u32 + 1);
    bytes.extend_from_slice(version.as_bytes());
    bytes
}

fn bench_varints(c: &mut Criterion) {
    let mut bytes = Vec::new();
    for i in 0..4096u32 {
        encode_varint(&mut bytes, i.wrapping_mul(2_654_435_761));
    }

    c.bench_function("read_varint x4096", |b| {
        b.iter(|| {
            let mut input = BinaryInput::new(black_box(&bytes));
            let mut sum = 0i64;
            while input.remaining() > 0 {
                sum += input.read_varint(true).unwrap_or(0) as i64;
            }
            sum
        })
    });
}

fn bench_version(c: &mut Criterion) {
    let ascii = skeleton_header("3.8.95");
    let wide = skeleton_header("skeleton 4.1.23 exporté ünïcode");

    c.bench_function("from_binary ascii", |b| {
        b.iter(|| version::from_binary(black_box(&ascii)))
    });
    c.bench_function("from_binary multibyte", |b| {
        b.iter(|| version::from_binary(black_box(&wide)))
    });
}

criterion_group!(benches, bench_varints, bench_version);
criterion_main!(benches);
