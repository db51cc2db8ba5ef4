use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use surface_sync_engine::editing::{Operation, TransactionEngine};
use surface_sync_engine::input::{ClassifyContext, classify};
use surface_sync_engine::surface::render_document;
use surface_sync_engine::{Config, ContentRange, InputCoordinator, ModelSelection, SurfaceTree};
mod common;

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    group.sample_size(20);

    let store = common::generate_store(200, 5);
    let mut surface = render_document(&store).unwrap();
    surface.take_records();
    let container = surface.find_container(&"t100".into()).unwrap();
    let text = surface.first_text_below(container).unwrap();
    surface.splice_text(text, 0, 0, "x");
    let records = surface.take_records();

    group.bench_function("single_node_typing", |b| {
        let ctx = ClassifyContext::default();
        b.iter(|| {
            let change = classify(&surface, &store, black_box(&records), &ctx);
            black_box(change);
        });
    });

    group.finish();
}

fn bench_transactions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transactions");
    group.sample_size(20);

    group.bench_function("replace_across_blocks", |b| {
        b.iter_batched(
            || TransactionEngine::new(common::generate_store(50, 2)),
            |engine| {
                let result = engine.apply(vec![Operation::ReplaceText {
                    range: ContentRange::new("t10", 5, "t20", 5),
                    text: "joined".to_string(),
                }]);
                black_box(result);
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("typing_round_trip", |b| {
        b.iter_batched(
            || {
                let store = common::generate_store(50, 2);
                let mut surface = render_document(&store).unwrap();
                surface.take_records();
                let mut coordinator = InputCoordinator::new(store, &Config::default());
                coordinator.set_selection(Some(ModelSelection::caret("t25", 0)));
                (coordinator, surface)
            },
            |(mut coordinator, mut surface)| {
                let container = surface.find_container(&"t25".into()).unwrap();
                let text = surface.first_text_below(container).unwrap();
                surface.splice_text(text, 0, 0, "typed");
                let records = surface.take_records();
                black_box(coordinator.handle_mutations(&surface, &records));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_transactions);
criterion_main!(benches);
