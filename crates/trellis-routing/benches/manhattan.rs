use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use trellis_routing::{ManhattanOptions, Obstacle, RouteEnd, RouteRequest, Router, rect, route};

/// A row of elements between the two ends, each one forcing a detour.
fn obstacle_row(count: usize) -> Vec<Obstacle> {
    (0..count)
        .map(|i| Obstacle {
            id: format!("o{i}"),
            cell_type: "standard.Rectangle".to_string(),
            bbox: rect(200.0 + i as f64 * 160.0, -40.0 + (i % 3) as f64 * 30.0, 80.0, 160.0),
        })
        .collect()
}

fn bench_manhattan(c: &mut Criterion) {
    let mut group = c.benchmark_group("manhattan");
    group.measurement_time(Duration::from_secs(5));

    for count in [1usize, 4, 16] {
        let obstacles = obstacle_row(count);
        let width = 400.0 + count as f64 * 160.0;
        let source = RouteEnd::element("source", rect(0.0, 0.0, 100.0, 60.0));
        let target = RouteEnd::element("target", rect(width, 0.0, 100.0, 60.0));
        let router = Router::Manhattan(ManhattanOptions::default());

        group.bench_with_input(BenchmarkId::new("obstacles", count), &count, |b, _| {
            b.iter(|| {
                let request = RouteRequest {
                    vertices: &[],
                    source: &source,
                    target: &target,
                    obstacles: &obstacles,
                };
                black_box(route(black_box(&request), &router))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_manhattan);
criterion_main!(benches);
