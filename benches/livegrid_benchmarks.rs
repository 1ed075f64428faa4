use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use livegrid::*;

fn dataset(rows: usize) -> Dataset {
    let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"];
    Dataset::builder()
        .column(Column::new("n", (0..rows as i64).map(|i| Value::Int((i * 7919) % 10007)).collect()))
        .column(Column::new("x", (0..rows).map(|i| Value::Float(i as f64 * 0.25)).collect()))
        .column(Column::new(
            "word",
            (0..rows).map(|i| Value::from(format!("{}-{}", words[i % words.len()], i % 97))).collect(),
        ))
        .build()
        .unwrap()
}

fn widget(rows: usize) -> GridWidget {
    GridWidget::with_config(dataset(rows), GridConfig::default(), |_: WidgetMessage| {}).unwrap()
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");

    for size in [1_000, 10_000, 100_000].iter() {
        let mut grid = widget(*size);
        let mut ascending = true;
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                ascending = !ascending;
                grid.change_sort(black_box(Some("n")), ascending).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_slider_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("slider_filter");

    for size in [1_000, 10_000, 100_000].iter() {
        let mut grid = widget(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let state = FilterState::Slider { min: Some(100.0), max: Some(5_000.0) };
                grid.change_filter("n", black_box(Some(state))).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_dropdown_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dropdown_listing");

    for size in [1_000, 10_000, 100_000].iter() {
        let mut grid = widget(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                // re-sorting clears the cached unique values
                grid.change_sort(Some("x"), true).unwrap();
                grid.show_filter_dropdown(black_box("word"), None).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_viewport_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("viewport_scroll");

    for size in [10_000, 100_000].iter() {
        let mut grid = widget(*size);
        let mut top = 0i64;
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                top = (top + 250) % size as i64;
                grid.change_viewport(black_box(top), top + 30).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sort,
    bench_slider_filter,
    bench_dropdown_listing,
    bench_viewport_scroll
);
criterion_main!(benches);
