use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use trellis_graph::{
    AddOptions, Cell, CellEvent, ChangeOptions, Error, Graph, Label, LinkEnd, point,
};

fn opts() -> ChangeOptions {
    ChangeOptions::new()
}

fn styled_rect(id: &str) -> Cell {
    Cell::element("standard.Rectangle")
        .with_id(id)
        .with_attr(
            "attrs",
            json!({"body": {"fill": "white", "stroke": "black"}, "label": {"text": "A"}}),
        )
}

#[test]
fn path_writes_read_back_and_leave_siblings_alone() {
    let cases = [
        ("attrs/body/fill", json!("red")),
        ("attrs/body/filter", json!({"name": "dropShadow", "args": {"dx": 2}})),
        ("attrs/label/text", json!("")),
        ("data/tags", json!(["x", "y"])),
        ("data/matrix/1/0", json!(7)),
        ("attrs/body/strokeDasharray", json!(null)),
    ];
    for (path, value) in cases {
        let mut cell = styled_rect("a");
        let before = cell.to_json();
        cell.set(path, value.clone(), &opts()).unwrap();
        assert_eq!(cell.get(path).unwrap(), Some(value.clone()), "{path}");

        let after = cell.to_json();
        assert_eq!(after["attrs"]["label"], before["attrs"]["label"], "{path}");
        if path != "attrs/body/fill" {
            assert_eq!(after["attrs"]["body"]["fill"], json!("white"), "{path}");
        }
        assert_eq!(after["attrs"]["body"]["stroke"], json!("black"), "{path}");
    }
}

#[test]
fn reads_of_missing_paths_are_none() {
    let cell = styled_rect("a");
    assert_eq!(cell.get("attrs/nothing/here").unwrap(), None);
    assert_eq!(cell.get("data").unwrap(), None);
    assert!(cell.get("attrs/body/fill/deeper").is_err());
}

#[test]
fn merge_keeps_existing_keys() {
    let mut cell = styled_rect("a");
    cell.merge("attrs/body", json!({"fill": "blue", "rx": 4}), &opts())
        .unwrap();
    assert_eq!(
        cell.get("attrs/body").unwrap(),
        Some(json!({"fill": "blue", "stroke": "black", "rx": 4}))
    );
    cell.remove_prop("attrs/body/rx", &opts()).unwrap();
    assert_eq!(cell.get("attrs/body/rx").unwrap(), None);
}

#[test]
fn the_id_is_immutable() {
    let mut cell = styled_rect("a");
    let err = cell.set("id", json!("b"), &opts()).unwrap_err();
    assert!(matches!(err, Error::ImmutableAttribute { .. }));
    assert_eq!(cell.id(), "a");
}

#[test]
fn added_elements_report_their_position() {
    let mut graph = Graph::new();
    graph
        .add_json(
            &json!({
                "id": "a",
                "type": "standard.Rectangle",
                "position": {"x": 20, "y": 30},
                "size": {"width": 120, "height": 80},
            }),
            &AddOptions::default(),
        )
        .unwrap();
    let a = graph.get_cell("a").unwrap();
    assert_eq!(a.position(), Some(point(20.0, 30.0)));
    assert_eq!(a.get("size").unwrap(), Some(json!({"width": 120, "height": 80})));
}

#[test]
fn ends_compare_by_cell_and_port_or_by_point() {
    let mut link = Cell::link("standard.Link")
        .with_source(LinkEnd::point(0.0, 0.0))
        .with_target(LinkEnd::point(100.0, 100.0));
    let old = link.source().cloned().unwrap();
    assert!(LinkEnd::ends_equal(&old, &LinkEnd::point(0.0, 0.0)));

    link.set_source(LinkEnd::cell("element-a"), &opts()).unwrap();
    let new = link.source().cloned().unwrap();
    assert!(!LinkEnd::ends_equal(&old, &new));

    assert!(LinkEnd::ends_equal(&new, &LinkEnd::cell("element-a")));
    assert!(!LinkEnd::ends_equal(
        &new,
        &LinkEnd::cell("element-a").with_port("out")
    ));
    assert!(LinkEnd::ends_equal(
        &LinkEnd::cell("a").with_port("p").with_arg("magnet", "body"),
        &LinkEnd::cell("a").with_port("p")
    ));
}

#[test]
fn disconnecting_free_ends_is_a_no_op() {
    let mut link = Cell::link("standard.Link")
        .with_source(LinkEnd::point(15.0, 25.0))
        .with_target(LinkEnd::cell("b"));
    link.disconnect(&opts()).unwrap();
    assert_eq!(link.source(), Some(&LinkEnd::point(15.0, 25.0)));
    assert_eq!(link.target(), Some(&LinkEnd::point(0.0, 0.0)));

    let once = link.to_json();
    link.disconnect(&opts()).unwrap();
    assert_eq!(link.to_json(), once);
}

#[test]
fn vertices_and_labels_accept_negative_indices() {
    let mut link = Cell::link("standard.Link")
        .with_vertices([point(10.0, 10.0), point(20.0, 20.0)]);
    assert_eq!(link.vertex(-1), Some(point(20.0, 20.0)));
    assert_eq!(link.vertex(5), None);

    link.insert_vertex(1, point(15.0, 12.0), &opts()).unwrap();
    link.remove_vertex(0, &opts()).unwrap();
    assert_eq!(link.vertices(), [point(15.0, 12.0), point(20.0, 20.0)]);

    link.append_label(Label::at(0.5).with("attrs", json!({"text": {"text": "mid"}})), &opts())
        .unwrap();
    link.insert_label(0, Label::at(10.0), &opts()).unwrap();
    assert_eq!(link.labels().len(), 2);
    assert_eq!(
        link.label(-1).and_then(|l| l.position()).map(|p| p.distance),
        Some(0.5)
    );
    link.remove_label(-1, &opts()).unwrap();
    assert_eq!(link.labels().len(), 1);
}

#[test]
fn loops_are_links_with_the_same_cell_at_both_ends() {
    let looped = Cell::link("link")
        .with_source(LinkEnd::cell("a").with_port("out"))
        .with_target(LinkEnd::cell("a").with_port("in"));
    assert!(looped.has_loop());

    let free = Cell::link("link")
        .with_source(LinkEnd::point(1.0, 1.0))
        .with_target(LinkEnd::point(1.0, 1.0));
    assert!(!free.has_loop());
}

#[test]
fn standalone_cells_notify_observers_immediately() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut cell = styled_rect("a");
    let sink = Rc::clone(&seen);
    let observer = cell.observe(move |event| {
        let CellEvent::Change { key, previous, .. } = event;
        sink.borrow_mut().push((key.clone(), previous.clone()));
    });

    cell.set("attrs/body/fill", json!("red"), &opts()).unwrap();
    cell.translate(5.0, 0.0, &opts()).unwrap();
    assert_eq!(seen.borrow().len(), 2);
    assert_eq!(seen.borrow()[0].0, "attrs");
    assert_eq!(seen.borrow()[1], ("position".to_string(), Some(json!({"x": 0, "y": 0}))));

    assert!(cell.unobserve(observer));
    cell.translate(5.0, 0.0, &opts()).unwrap();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn owned_cells_notify_observers_after_the_update_commits() {
    let mut graph = Graph::new();
    graph.add_cell(styled_rect("a"), &AddOptions::default()).unwrap();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    graph
        .update("a", |cell| {
            Ok(cell.observe(move |_| *sink.borrow_mut() += 1))
        })
        .unwrap();

    graph
        .update("a", |cell| {
            cell.translate(1.0, 1.0, &opts())?;
            assert_eq!(*count.borrow(), 0);
            cell.set("attrs/body/fill", json!("red"), &opts())
        })
        .unwrap();
    assert_eq!(*count.borrow(), 2);
}

#[test]
fn clones_get_fresh_ids_and_no_embedding() {
    let cell = styled_rect("a")
        .with_attr("parent", json!("p"))
        .with_attr("embeds", json!(["c"]));
    let clone = cell.clone_cell();
    assert_ne!(clone.id(), cell.id());
    assert!(clone.parent().is_none());
    assert!(clone.embeds().is_empty());
    assert_eq!(clone.get("attrs").unwrap(), cell.get("attrs").unwrap());
}
