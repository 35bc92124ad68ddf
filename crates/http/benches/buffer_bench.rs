use std::hint::black_box;

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use http::{Method, StatusCode};
use micro_envelope::buffer::{Buffer, BufferLimits};
use micro_envelope::envelope::{Message, Payload, WriteCallback};
use micro_envelope::protocol::{HttpRequest, HttpResponse};

const LIMITS: BufferLimits = BufferLimits::new(16 * 1024, 4 * 1024 * 1024);

fn buffer_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_append");
    for size in [64_usize, 1024, 16 * 1024] {
        let chunk = vec![b'x'; size];
        group.throughput(Throughput::Bytes((size * 64) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &chunk, |b, chunk| {
            b.iter(|| {
                let mut buffer = Buffer::with_limits(LIMITS);
                for _ in 0..64 {
                    buffer.append(black_box(chunk)).unwrap();
                }
                buffer.flip();
                black_box(buffer.freeze())
            });
        });
    }
    group.finish();
}

fn buffer_read(c: &mut Criterion) {
    let mut source = Buffer::with_limits(LIMITS);
    source.append(&[7_u8; 64 * 1024]).unwrap();
    source.flip();

    c.bench_function("buffer_read_into", |b| {
        let mut dst = [0_u8; 1024];
        b.iter(|| {
            source.rewind();
            while source.remaining() >= dst.len() {
                source.read_into(&mut dst).unwrap();
            }
            black_box(dst[0])
        });
    });
}

fn envelope_exchange(c: &mut Criterion) {
    c.bench_function("envelope_reply_and_drain", |b| {
        b.iter(|| {
            let request = HttpRequest::new(Method::GET, "/bench".parse().unwrap());
            request.reply_handler(|response: HttpResponse| {
                response
                    .envelope()
                    .attach_sink(|payload: Payload, on_complete: Option<WriteCallback>| {
                        black_box(payload.as_bytes().map(Bytes::len));
                        if let Some(callback) = on_complete {
                            callback();
                        }
                    })
                    .unwrap();
            });

            let response = HttpResponse::new(StatusCode::OK);
            response.write("queued before reply").unwrap();
            request.reply(response.clone());
            response.write("after reply").unwrap();
            response.complete();
            request.complete();
        });
    });
}

criterion_group!(benches, buffer_append, buffer_read, envelope_exchange);
criterion_main!(benches);
