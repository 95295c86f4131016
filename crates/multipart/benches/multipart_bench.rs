use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use micro_multipart::codec::PushMultipartParser;
use micro_multipart::protocol::ParserLimits;

fn limits() -> ParserLimits {
    ParserLimits {
        max_header_size: 8 * 1024,
        max_header_count: 16,
        max_segment_count: 1024,
        max_segment_size: u64::MAX,
    }
}

fn build_body(parts: usize, part_size: usize) -> Vec<u8> {
    let mut body = Vec::new();
    let content = vec![b'x'; part_size];
    for idx in 0..parts {
        body.extend_from_slice(b"--bench-boundary\r\n");
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"field{idx}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(&content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"--bench-boundary--\r\n");
    body
}

fn drain(body: &[u8], chunk_size: usize) {
    let mut parser = PushMultipartParser::new("bench-boundary", limits()).unwrap();
    for chunk in body.chunks(chunk_size) {
        for event in parser.parse(chunk) {
            std::hint::black_box(event.unwrap());
        }
    }
    parser.close().unwrap();
}

fn framing_benchmark(c: &mut Criterion) {
    let body = build_body(16, 16 * 1024);

    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(body.len() as u64));
    group.bench_function("whole_body", |b| b.iter(|| drain(&body, body.len())));
    group.bench_function("8k_chunks", |b| b.iter(|| drain(&body, 8 * 1024)));
    group.bench_function("64b_chunks", |b| b.iter(|| drain(&body, 64)));
    group.finish();
}

criterion_group!(benches, framing_benchmark);
criterion_main!(benches);
