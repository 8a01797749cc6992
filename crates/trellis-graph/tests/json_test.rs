use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use trellis_graph::{
    AddOptions, Cell, CellId, CellRole, ChangeOptions, Error, Graph, GraphEvent, LinkEnd, point,
};

fn element(id: &str) -> Cell {
    Cell::element("standard.Rectangle")
        .with_id(id)
        .with_position(10.0, 20.0)
        .with_size(100.0, 40.0)
}

fn link(id: &str, source: &str, target: &str) -> Cell {
    Cell::link("standard.Link")
        .with_id(id)
        .with_source(LinkEnd::cell(source))
        .with_target(LinkEnd::cell(target))
}

fn ids(list: &[&str]) -> Vec<CellId> {
    list.iter().map(|id| CellId::from(*id)).collect()
}

fn opts() -> ChangeOptions {
    ChangeOptions::new()
}

fn sample() -> Graph {
    let mut graph = Graph::new();
    graph
        .add_cells(
            vec![
                element("p"),
                element("a"),
                element("b"),
                link("l", "a", "b")
                    .with_vertices([point(5.0, 5.0)])
                    .with_attr("data", json!({"weight": 3})),
            ],
            &AddOptions::default(),
        )
        .unwrap();
    graph.embed("p", &ids(&["a"]), &opts()).unwrap();
    graph
}

#[test]
fn serialized_graphs_load_back_identically() {
    let graph = sample();
    let json = graph.to_json();
    assert_eq!(json["cells"].as_array().map(Vec::len), Some(4));

    let mut copy = Graph::new();
    copy.from_json(&json, &opts()).unwrap();
    assert_eq!(copy.to_json(), json);
    assert_eq!(copy.get_cell("a").and_then(Cell::parent), Some(&CellId::from("p")));
    assert_eq!(copy.get_cell("p").unwrap().embeds(), ids(&["a"]));
    assert_eq!(copy.get_cell("l").unwrap().vertices(), [point(5.0, 5.0)]);
}

#[test]
fn loading_replaces_the_cells_with_one_reset_event() {
    let mut graph = sample();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    graph.on(move |_, event| sink.borrow_mut().push(event.clone()));

    let json = json!({"cells": [{"id": "solo", "type": "standard.Circle"}]});
    graph.from_json(&json, &opts()).unwrap();
    assert_eq!(graph.len(), 1);
    assert!(graph.get_cell("solo").is_some_and(Cell::is_element));
    assert_eq!(*events.borrow(), [GraphEvent::Reset { options: opts() }]);
}

#[test]
fn loading_without_cells_fails_and_keeps_the_graph() {
    let mut graph = sample();
    let err = graph.from_json(&json!({"nodes": []}), &opts()).unwrap_err();
    assert!(matches!(err, Error::MissingCells));

    let err = graph
        .from_json(&json!({"cells": [{"id": "x", "type": 7}]}), &opts())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCellType { .. }));
    assert_eq!(graph.len(), 4);
}

#[test]
fn numeric_ids_are_read_as_strings() {
    let mut graph = Graph::new();
    graph
        .add_json(&json!({"id": 5, "type": "standard.Rectangle"}), &AddOptions::default())
        .unwrap();
    assert!(graph.contains("5"));
}

#[test]
fn registered_types_fill_in_their_defaults() {
    let mut graph = Graph::new();
    graph.registry_mut().register(
        "app.Task",
        CellRole::Element,
        json!({"size": {"width": 80, "height": 30}, "attrs": {"body": {"rx": 6}}}),
    );
    graph
        .add_json(
            &json!({"id": "t", "type": "app.Task", "attrs": {"body": {"fill": "gold"}}}),
            &AddOptions::default(),
        )
        .unwrap();
    let task = graph.get_cell("t").unwrap();
    assert_eq!(task.bbox().map(|b| (b.size.width, b.size.height)), Some((80.0, 30.0)));
    assert_eq!(
        task.get("attrs/body").unwrap(),
        Some(json!({"rx": 6, "fill": "gold"}))
    );

    graph
        .add_json(
            &json!({"id": "e", "type": "app.Flow", "source": {"id": "t"}, "target": {"x": 1, "y": 2}}),
            &AddOptions::default(),
        )
        .unwrap();
    assert!(graph.get_cell("e").is_some_and(Cell::is_link));
}

#[test]
fn syncing_adds_updates_and_removes() {
    let mut graph = sample();
    graph
        .sync_cells(
            &[
                json!({"id": "p", "type": "standard.Rectangle"}),
                json!({"id": "a", "type": "standard.Rectangle", "position": {"x": 70, "y": 80}}),
                json!({"id": "c", "type": "standard.Rectangle"}),
            ],
            true,
            &opts(),
        )
        .unwrap();

    let mut present: Vec<&str> = graph.cells().map(|c| c.id().as_str()).collect();
    present.sort_unstable();
    assert_eq!(present, ["a", "c", "p"]);
    let a = graph.get_cell("a").unwrap();
    assert_eq!(a.position(), Some(point(70.0, 80.0)));
    // keys the sync omitted are left alone
    assert_eq!(a.bbox().map(|b| (b.size.width, b.size.height)), Some((100.0, 40.0)));
    assert_eq!(a.parent(), Some(&CellId::from("p")));
}

#[test]
fn syncing_without_remove_keeps_unlisted_cells() {
    let mut graph = sample();
    graph
        .sync_cells(&[json!({"id": "c", "type": "standard.Circle"})], false, &opts())
        .unwrap();
    assert_eq!(graph.len(), 5);
}

#[test]
fn a_rejected_sync_leaves_the_graph_untouched() {
    let mut graph = sample();
    let before = graph.to_json();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    graph.on(move |_, event| sink.borrow_mut().push(event.clone()));

    let err = graph
        .sync_cells(
            &[
                json!({"id": "c", "type": "standard.Rectangle"}),
                json!({"id": "l", "type": "standard.Link", "router": {"name": "nope"}}),
            ],
            true,
            &opts(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Routing(_)), "{err}");
    assert!(!graph.contains("c"));
    assert_eq!(graph.to_json(), before);
    assert!(events.borrow().is_empty());
}

#[test]
fn syncing_a_new_type_replaces_the_cell_in_place() {
    let mut graph = sample();
    let z = graph.get_cell("b").and_then(Cell::z);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    graph.on(move |_, event| sink.borrow_mut().push(event.clone()));

    graph
        .sync_cells(
            &[json!({"id": "b", "type": "standard.Circle", "size": {"width": 40, "height": 40}})],
            false,
            &opts(),
        )
        .unwrap();

    let b = graph.get_cell("b").unwrap();
    assert_eq!(b.cell_type(), "standard.Circle");
    assert_eq!(b.z(), z);
    let inbound: Vec<&str> = graph
        .get_connected_links("b", &Default::default())
        .into_iter()
        .map(|l| l.id().as_str())
        .collect();
    assert_eq!(inbound, ["l"]);

    let kinds: Vec<&str> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            GraphEvent::Remove { .. } => Some("remove"),
            GraphEvent::Add { .. } => Some("add"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, ["remove", "add"]);
}

#[test]
fn syncing_null_keys_removes_them() {
    let mut graph = sample();
    graph
        .sync_cells(
            &[json!({"id": "l", "type": "standard.Link", "data": null})],
            false,
            &opts(),
        )
        .unwrap();
    assert_eq!(graph.get_cell("l").unwrap().get("data").unwrap(), None);
}

#[test]
fn cloned_groups_point_at_each_other() {
    let graph = sample();
    let clones = graph.clone_cells(&ids(&["a", "b", "l"]));
    assert_eq!(clones.len(), 3);

    let a = clones.id_of("a").unwrap();
    let b = clones.id_of("b").unwrap();
    assert_ne!(a.as_str(), "a");
    let l = clones.get("l").unwrap();
    assert_eq!(l.source().and_then(LinkEnd::id), Some(a));
    assert_eq!(l.target().and_then(LinkEnd::id), Some(b));
    // the parent was not cloned
    assert!(clones.get("a").unwrap().parent().is_none());
}

#[test]
fn links_to_cells_outside_the_group_keep_their_ends() {
    let graph = sample();
    let clones = graph.clone_cells(&ids(&["a", "l"]));
    let l = clones.get("l").unwrap();
    assert_eq!(l.source().and_then(LinkEnd::id), clones.id_of("a"));
    assert_eq!(l.target().and_then(LinkEnd::id), Some(&CellId::from("b")));
}

#[test]
fn deep_clones_carry_the_embedding() {
    let mut graph = sample();
    let clones = graph.clone_cell("p", true);
    assert_eq!(clones.len(), 2);
    let p = clones.id_of("p").unwrap().clone();
    let a = clones.id_of("a").unwrap().clone();
    assert_eq!(clones.get("a").unwrap().parent(), Some(&p));
    assert_eq!(clones.get("p").unwrap().embeds(), [a.clone()]);

    graph
        .add_cells(clones.into_cells(), &AddOptions::default())
        .unwrap();
    assert_eq!(graph.len(), 6);
    assert_eq!(graph.get_cell(a.as_str()).and_then(Cell::parent), Some(&p));

    assert_eq!(graph.clone_cell("p", false).len(), 1);
}

#[test]
fn deep_clones_include_links_between_descendants() {
    let mut graph = sample();
    graph.embed("p", &ids(&["b"]), &opts()).unwrap();
    let clones = graph.clone_cell("p", true);
    assert_eq!(clones.len(), 4);

    let l = clones.get("l").unwrap();
    assert_ne!(l.id(), &CellId::from("l"));
    assert_eq!(l.source().and_then(LinkEnd::id), clones.id_of("a"));
    assert_eq!(l.target().and_then(LinkEnd::id), clones.id_of("b"));
    assert_eq!(l.vertices(), [point(5.0, 5.0)]);

    graph
        .add_cells(clones.into_cells(), &AddOptions::default())
        .unwrap();
    assert_eq!(graph.len(), 8);
}

#[test]
fn subgraph_clones_include_the_links_between_members() {
    let graph = sample();
    let clones = graph.clone_subgraph(&ids(&["a", "b"]), false);
    assert_eq!(clones.len(), 3);
    let l = clones.get("l").unwrap();
    assert_eq!(l.source().and_then(LinkEnd::id), clones.id_of("a"));
    assert_eq!(l.target().and_then(LinkEnd::id), clones.id_of("b"));
}
