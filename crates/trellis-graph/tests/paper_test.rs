use serde_json::json;
use trellis_graph::{
    AddOptions, Cell, ElementGeometry, Error, Graph, LinkEnd, NamedSpec, Paper, PaperOptions,
    point, rect,
};

fn element(id: &str, x: f64, y: f64) -> Cell {
    Cell::element("standard.Rectangle")
        .with_id(id)
        .with_position(x, y)
        .with_size(100.0, 100.0)
}

fn link(id: &str, source: impl Into<LinkEnd>, target: impl Into<LinkEnd>) -> Cell {
    Cell::link("standard.Link")
        .with_id(id)
        .with_source(source)
        .with_target(target)
}

fn two_boxes() -> Graph {
    let mut graph = Graph::new();
    graph
        .add_cells(
            vec![
                element("a", 0.0, 0.0),
                element("b", 300.0, 0.0),
                link("l", LinkEnd::cell("a"), LinkEnd::cell("b")),
            ],
            &AddOptions::default(),
        )
        .unwrap();
    graph
}

fn paper() -> Paper {
    Paper::new(PaperOptions::default()).unwrap()
}

#[test]
fn straight_links_are_clipped_to_the_element_boxes() {
    let graph = two_boxes();
    let path = paper().resolve_link(&graph, "l").unwrap();
    assert_eq!(path.source_anchor, point(50.0, 50.0));
    assert_eq!(path.target_anchor, point(350.0, 50.0));
    assert_eq!(path.source_point, point(100.0, 50.0));
    assert_eq!(path.target_point, point(300.0, 50.0));
    assert!(path.route.is_empty());
    assert_eq!(path.path.to_svg(), "M 100 50 L 300 50");
}

#[test]
fn vertices_are_kept_and_steer_the_connection_points() {
    let mut graph = two_boxes();
    graph
        .add_cell(
            Cell::link("standard.Link")
                .with_id("bent")
                .with_source(LinkEnd::cell("a"))
                .with_target(LinkEnd::cell("b"))
                .with_vertices([point(200.0, 200.0)]),
            &AddOptions::default(),
        )
        .unwrap();
    let path = paper().resolve_link(&graph, "bent").unwrap();
    assert_eq!(path.route, [point(200.0, 200.0)]);
    assert_eq!(path.source_point, point(100.0, 100.0));
    assert_eq!(path.target_point, point(300.0, 100.0));
    assert_eq!(path.path.to_svg(), "M 100 100 L 200 200 L 300 100");
}

#[test]
fn unknown_strategies_are_rejected() {
    let err = Paper::new(PaperOptions {
        default_router: NamedSpec::new("teleport"),
        ..PaperOptions::default()
    })
    .unwrap_err();
    assert!(matches!(err, Error::Routing(_)));

    let mut graph = two_boxes();
    let err = graph
        .add_cell(
            link("odd", LinkEnd::cell("a"), LinkEnd::cell("b")).with_router(json!("teleport")),
            &AddOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Routing(_)));
    assert!(!graph.contains("odd"));
}

#[test]
fn links_can_end_on_other_links() {
    let mut graph = two_boxes();
    graph
        .add_cell(
            link("branch", LinkEnd::point(200.0, 200.0), LinkEnd::cell("l")),
            &AddOptions::default(),
        )
        .unwrap();
    let path = paper().resolve_link(&graph, "branch").unwrap();
    assert_eq!(path.source_point, point(200.0, 200.0));
    assert_eq!(path.target_point, point(200.0, 50.0));
}

#[test]
fn link_cycles_and_missing_cells_fall_back_to_the_origin() {
    let mut graph = Graph::new();
    graph
        .add_cells(
            vec![
                link("ping", LinkEnd::point(10.0, 10.0), LinkEnd::cell("pong")),
                link("pong", LinkEnd::point(30.0, 10.0), LinkEnd::cell("ping")),
                link("lost", LinkEnd::cell("ghost"), LinkEnd::point(40.0, 0.0)),
            ],
            &AddOptions::default(),
        )
        .unwrap();
    let paper = paper();

    let lost = paper.resolve_link(&graph, "lost").unwrap();
    assert_eq!(lost.source_point, point(0.0, 0.0));
    assert_eq!(lost.target_point, point(40.0, 0.0));

    // pong's target is ping, which is being resolved: it collapses to the origin, so pong's
    // midpoint is (15, 5).
    let ping = paper.resolve_link(&graph, "ping").unwrap();
    assert_eq!(ping.target_point, point(15.0, 5.0));
}

#[test]
fn registered_views_replace_the_model_box() {
    let graph = two_boxes();
    let mut paper = paper();
    paper.register_view("b", ElementGeometry::new(rect(250.0, 25.0, 50.0, 50.0)));
    let path = paper.resolve_link(&graph, "l").unwrap();
    assert_eq!(path.target_anchor, point(275.0, 50.0));
    assert_eq!(path.target_point, point(250.0, 50.0));
    assert_eq!(path.source_point, point(100.0, 50.0));

    assert!(paper.unregister_view("b"));
    assert!(!paper.unregister_view("b"));
    let path = paper.resolve_link(&graph, "l").unwrap();
    assert_eq!(path.target_anchor, point(350.0, 50.0));
}

#[test]
fn resolving_non_links_fails() {
    let graph = two_boxes();
    let paper = paper();
    assert!(matches!(
        paper.resolve_link(&graph, "a"),
        Err(Error::NotALink { .. })
    ));
    assert!(matches!(
        paper.resolve_link(&graph, "zzz"),
        Err(Error::NotInGraph { .. })
    ));
}

#[test]
fn every_link_resolves_in_z_order() {
    let mut graph = two_boxes();
    graph
        .add_cell(
            link("back", LinkEnd::cell("b"), LinkEnd::cell("a")),
            &AddOptions::default(),
        )
        .unwrap();
    let paths = paper().resolve_links(&graph).unwrap();
    let ids: Vec<&str> = paths.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, ["l", "back"]);
    assert_eq!(paths[1].1.source_point, point(300.0, 50.0));
    assert_eq!(paths[1].1.target_point, point(100.0, 50.0));
}
