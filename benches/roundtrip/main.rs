use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tungstenite::Message;

use socketeer::stream::memory;
use socketeer::ws::{Config, Role, Websocket};

mod server;

const SIZES: [usize; 3] = [64, 1024, 64 * 1024];

fn socketeer_rtt_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("socketeer");

    for size in SIZES {
        let (server_side, client_side) = memory::pair();
        let echo = server::start_on_thread(server_side);
        let mut ws = Websocket::from_raw_stream(client_side, Role::Client, Config::default()).unwrap();
        let msg = "Z".repeat(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("rtt", size), &msg, |b, msg| {
            b.iter(|| {
                ws.write_text(msg).unwrap();
                black_box(ws.read().unwrap());
            })
        });

        ws.close().unwrap();
        echo.join().unwrap();
    }

    group.finish();
}

fn tungstenite_rtt_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tungstenite");

    for size in SIZES {
        let (server_side, client_side) = memory::pair();
        let echo = server::start_on_thread(server_side);
        let mut ws =
            tungstenite::WebSocket::from_raw_socket(client_side, tungstenite::protocol::Role::Client, None);
        let msg = "Z".repeat(size);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("rtt", size), &msg, |b, msg| {
            b.iter(|| {
                ws.send(Message::text(msg.clone())).unwrap();
                if let Message::Text(data) = ws.read().unwrap() {
                    black_box(data);
                }
            })
        });

        let _ = ws.close(None);
        // drain until the echo side answers with its own close frame
        while ws.read().is_ok() {}
        echo.join().unwrap();
    }

    group.finish();
}

criterion_group!(benches, socketeer_rtt_benchmark, tungstenite_rtt_benchmark);
criterion_main!(benches);
