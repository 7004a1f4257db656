//! Performance benchmarks for the tailer.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use oplog_tailer::{
    Continuation, MemoryFeed, MemoryOplog, Record, RecordInput, SinkError, Tailer,
};
use serde_json::json;

fn counting_sink(_record: Record) -> Result<(), SinkError> {
    Ok(())
}

fn started_tailer(oplog: &MemoryOplog) -> Tailer<MemoryFeed, fn(Record) -> Result<(), SinkError>> {
    let mut tailer = Tailer::new(
        oplog.feed(),
        counting_sink as fn(Record) -> Result<(), SinkError>,
    );
    tailer.start().unwrap();
    tailer
}

fn append_backlog(oplog: &MemoryOplog, size: usize) {
    for i in 0..size {
        oplog.append(RecordInput::insert(
            "bench.events",
            format!("e{}", i),
            json!({"seq": i, "data": "test"}),
        ));
    }
}

/// Benchmark draining a backlog that arrived after start
fn bench_drain_backlog(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_backlog");

    for backlog in [100, 1000, 10000] {
        group.bench_with_input(
            BenchmarkId::new("records", backlog),
            &backlog,
            |b, &size| {
                b.iter_batched(
                    || {
                        let oplog = MemoryOplog::new();
                        let tailer = started_tailer(&oplog);
                        append_backlog(&oplog, size);
                        (oplog, tailer)
                    },
                    |(_oplog, mut tailer)| {
                        while tailer.step() == Some(Continuation::Immediate) {}
                        black_box(tailer.last_position());
                    },
                    BatchSize::LargeInput,
                );
            },
        );
    }

    group.finish();
}

/// Benchmark an idle poll against a large retained history
fn bench_idle_poll(c: &mut Criterion) {
    let oplog = MemoryOplog::new();
    append_backlog(&oplog, 10000);
    let mut tailer = started_tailer(&oplog);

    c.bench_function("idle_poll_10k_history", |b| {
        b.iter(|| {
            black_box(tailer.step());
        });
    });
}

/// Benchmark recovering from a dead cursor
fn bench_cursor_recovery(c: &mut Criterion) {
    let oplog = MemoryOplog::new();
    append_backlog(&oplog, 1000);
    let mut tailer = started_tailer(&oplog);

    c.bench_function("cursor_recovery", |b| {
        b.iter(|| {
            oplog.invalidate_cursors();
            black_box(tailer.step());
        });
    });
}

criterion_group!(
    benches,
    bench_drain_backlog,
    bench_idle_poll,
    bench_cursor_recovery,
);

criterion_main!(benches);
