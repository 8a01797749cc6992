use trellis::routing::{ManhattanOptions, Router};
use trellis::store::{StoreOptions, Topic, manual, service};
use trellis::{AddOptions, Cell, ChangeOptions, Graph, LinkEnd, NamedSpec, Paper, PaperOptions};

fn diagram() -> Graph {
    let mut graph = Graph::new();
    graph
        .add_cells(
            vec![
                Cell::element("standard.Rectangle")
                    .with_id("a")
                    .with_position(0.0, 0.0)
                    .with_size(80.0, 40.0),
                Cell::element("standard.Rectangle")
                    .with_id("b")
                    .with_position(400.0, 200.0)
                    .with_size(80.0, 40.0),
                Cell::link("standard.Link")
                    .with_id("l")
                    .with_source(LinkEnd::cell("a"))
                    .with_target(LinkEnd::cell("b")),
            ],
            &AddOptions::default(),
        )
        .unwrap();
    graph
}

#[test]
fn moving_an_element_republishes_and_reroutes() {
    let (mut store, frames) = manual(diagram(), StoreOptions::default());
    let paper = Paper::new(PaperOptions {
        default_router: NamedSpec::new("manhattan"),
        ..PaperOptions::default()
    })
    .unwrap();
    assert!(matches!(
        Router::from_spec(&paper.options().default_router),
        Ok(Router::Manhattan(ManhattanOptions { .. }))
    ));

    let before = paper.resolve_link(store.graph(), "l").unwrap();
    let seen = std::rc::Rc::new(std::cell::Cell::new(0));
    let sink = std::rc::Rc::clone(&seen);
    store.subscribe(Topic::Elements, move |_| sink.set(sink.get() + 1));

    store
        .graph_mut()
        .update("b", |cell| cell.translate(0.0, 200.0, &ChangeOptions::new()))
        .unwrap();
    assert!(service(&mut store, &frames));
    assert!(!service(&mut store, &frames));
    assert_eq!(seen.get(), 1);

    let after = paper.resolve_link(store.graph(), "l").unwrap();
    assert_ne!(before.path, after.path);
    assert_eq!(store.snapshot().element("b").map(|r| r.y), Some(400.0));
}
