use coedit_core::collab::OperationMessage;
use coedit_core::editor::{transform_pair, Tie};
use coedit_core::{DocumentCore, EditorConfig, EditorStateManager, Operation, Sequencer};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

/// Benchmark sequential typing through the full document core
fn bench_sequential_typing(c: &mut Criterion) {
    let mut group = c.benchmark_group("editor_sequential_typing");
    let config = EditorConfig::for_user("alice");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut doc = DocumentCore::new("bench", "", &config);
                for i in 0..size {
                    black_box(doc.insert_text(i, "a").unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark inserting into the middle of a large document
fn bench_insert_large_document(c: &mut Criterion) {
    let content = "lorem ipsum dolor sit amet\n".repeat(4000);

    c.bench_function("editor_insert_middle_100k", |b| {
        b.iter(|| {
            let mut state = EditorStateManager::new(&content);
            let middle = state.len() / 2;
            black_box(state.insert_text(middle, "x").unwrap());
        });
    });
}

/// Benchmark undoing and redoing a full history
fn bench_undo_redo(c: &mut Criterion) {
    c.bench_function("editor_undo_redo_100", |b| {
        b.iter(|| {
            let mut state = EditorStateManager::new("");
            for i in 0..100 {
                state.insert_text(i, "a").unwrap();
            }
            while state.undo().unwrap().is_some() {}
            while state.redo().unwrap().is_some() {}
            black_box(state.len());
        });
    });
}

/// Benchmark transforming two concurrent edit batches
fn bench_transform_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_pair");

    for size in [10, 100].iter() {
        let a: Vec<Operation> = (0..*size).map(|i| Operation::insert(i * 2, "a")).collect();
        let b: Vec<Operation> = (0..*size).map(|i| Operation::delete(i..i + 1)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |bench, _| {
            bench.iter(|| black_box(transform_pair(&a, &b, Tie::Left)));
        });
    }

    group.finish();
}

/// Benchmark sequencing stale operations that need rebasing
fn bench_sequencer(c: &mut Criterion) {
    c.bench_function("sequencer_rebase_100", |b| {
        b.iter(|| {
            let mut sequencer = Sequencer::new("", 1000);
            for i in 0..100 {
                let message = OperationMessage {
                    op_id: Uuid::new_v4(),
                    base_version_seq: 0,
                    user: if i % 2 == 0 { "alice" } else { "bob" }.to_string(),
                    operation: vec![Operation::insert(0, "a")],
                };
                black_box(sequencer.submit(&message).unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_sequential_typing,
    bench_insert_large_document,
    bench_undo_redo,
    bench_transform_pair,
    bench_sequencer
);
criterion_main!(benches);
