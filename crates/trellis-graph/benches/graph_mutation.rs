use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use trellis_graph::{
    AddOptions, Cell, CellId, ChangeOptions, Graph, LinkEnd, Paper, PaperOptions, SearchOptions,
    TranslateOptions,
};

/// `count` elements on a grid, each linked to its right and lower neighbor.
fn grid_cells(count: usize) -> Vec<Cell> {
    let side = (count as f64).sqrt().ceil() as usize;
    let mut cells = Vec::with_capacity(count * 3);
    for i in 0..count {
        let (row, col) = (i / side, i % side);
        cells.push(
            Cell::element("standard.Rectangle")
                .with_id(format!("n{i}"))
                .with_position(col as f64 * 160.0, row as f64 * 120.0)
                .with_size(100.0, 60.0),
        );
    }
    for i in 0..count {
        for next in [i + 1, i + side] {
            let same_row = next != i + 1 || next % side != 0;
            if next < count && same_row {
                cells.push(
                    Cell::link("standard.Link")
                        .with_id(format!("l{i}-{next}"))
                        .with_source(LinkEnd::cell(format!("n{i}")))
                        .with_target(LinkEnd::cell(format!("n{next}"))),
                );
            }
        }
    }
    cells
}

fn grid(count: usize) -> Graph {
    let mut graph = Graph::new();
    graph
        .add_cells(grid_cells(count), &AddOptions::default())
        .expect("grid cells are valid");
    graph
}

fn bench_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");
    group.measurement_time(Duration::from_secs(5));

    for count in [100usize, 1_000] {
        let cells = grid_cells(count);
        group.bench_with_input(BenchmarkId::new("add_cells", count), &count, |b, _| {
            b.iter(|| {
                let mut graph = Graph::new();
                graph
                    .add_cells(black_box(cells.clone()), &AddOptions::default())
                    .expect("grid cells are valid");
                black_box(graph.len())
            })
        });

        let graph = grid(count);
        group.bench_with_input(BenchmarkId::new("successors", count), &count, |b, _| {
            b.iter(|| black_box(graph.get_successors("n0", &SearchOptions::default()).len()))
        });

        let paper = Paper::new(PaperOptions::default()).expect("default strategies exist");
        group.bench_with_input(BenchmarkId::new("resolve_links", count), &count, |b, _| {
            b.iter(|| black_box(paper.resolve_links(&graph).map(|paths| paths.len())))
        });
    }

    let mut nested = grid(400);
    let children: Vec<CellId> = (1..400).map(|i| CellId::from(format!("n{i}"))).collect();
    nested
        .embed("n0", &children, &ChangeOptions::new())
        .expect("grid elements embed into n0");
    group.bench_function("translate_parent/400", |b| {
        b.iter(|| {
            nested
                .translate_cell("n0", black_box(1.0), 0.0, &TranslateOptions::default())
                .expect("n0 is in the graph")
        })
    });

    group.finish();
}

criterion_group!(benches, bench_graph);
criterion_main!(benches);
