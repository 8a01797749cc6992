use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::json;
use trellis_graph::{
    AddOptions, Cell, CellId, ChangeOptions, Graph, LinkEnd, RemoveOptions,
};
use trellis_store::{
    ElementRecord, GraphState, GraphStore, ManualFrames, StoreOptions, Topic, Update,
};

fn element(id: &str, x: f64) -> Cell {
    Cell::element("standard.Rectangle")
        .with_id(id)
        .with_position(x, 0.0)
        .with_size(100.0, 40.0)
}

fn link(id: &str, source: &str, target: &str) -> Cell {
    Cell::link("standard.Link")
        .with_id(id)
        .with_source(LinkEnd::cell(source))
        .with_target(LinkEnd::cell(target))
}

fn opts() -> ChangeOptions {
    ChangeOptions::new()
}

fn sample_graph() -> Graph {
    let mut graph = Graph::new();
    graph
        .add_cells(
            vec![element("a", 0.0), element("b", 200.0), link("l", "a", "b")],
            &AddOptions::default(),
        )
        .unwrap();
    graph
}

fn store() -> (GraphStore, ManualFrames) {
    let frames = ManualFrames::new();
    let store = GraphStore::new(sample_graph(), frames.clone(), StoreOptions::default());
    (store, frames)
}

/// Counts notifications of one topic.
fn counter(store: &GraphStore, topic: Topic) -> Rc<RefCell<usize>> {
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    store.subscribe(topic, move |_| *sink.borrow_mut() += 1);
    count
}

fn move_to(store: &mut GraphStore, id: &str, x: f64) {
    store
        .graph_mut()
        .update(id, |cell| cell.set("position", json!({"x": x, "y": 0}), &opts()))
        .unwrap();
}

#[test]
fn the_initial_snapshot_holds_every_cell() {
    let (store, frames) = store();
    let snapshot = store.snapshot();
    assert_eq!(snapshot.version(), 0);
    assert_eq!(snapshot.elements().len(), 2);
    assert_eq!(snapshot.links().len(), 1);
    assert_eq!(snapshot.element("b").map(|r| r.x), Some(200.0));
    assert_eq!(snapshot.link("l").map(|r| r.target.clone()), Some(LinkEnd::cell("b")));
    assert_eq!(frames.requests(), 0);
}

#[test]
fn changes_outside_batches_share_one_frame() {
    let (mut store, frames) = store();
    let any = counter(&store, Topic::Any);
    let before = store.snapshot();

    move_to(&mut store, "a", 10.0);
    move_to(&mut store, "a", 20.0);
    move_to(&mut store, "b", 30.0);
    assert_eq!(frames.requests(), 1);
    assert!(Arc::ptr_eq(&before, &store.snapshot()));
    assert_eq!(*any.borrow(), 0);

    assert!(frames.take());
    assert!(store.flush());
    assert_eq!(*any.borrow(), 1);
    let after = store.snapshot();
    assert_eq!(after.version(), 1);
    assert_eq!(after.element("a").map(|r| r.x), Some(20.0));
    assert_eq!(after.element("b").map(|r| r.x), Some(30.0));

    // nothing left to publish
    assert!(!store.flush());
    assert_eq!(*any.borrow(), 1);

    move_to(&mut store, "a", 40.0);
    assert_eq!(frames.requests(), 2);
}

#[test]
fn a_batch_of_many_mutations_publishes_once() {
    let (mut store, frames) = store();
    let any = counter(&store, Topic::Any);

    store.update(|graph| {
        for i in 0..150 {
            graph
                .add_cell(element(&format!("n{i}"), i as f64), &AddOptions::default())
                .unwrap();
        }
        for i in 0..150 {
            let id = format!("n{i}");
            graph
                .update(&id, |cell| cell.translate(5.0, 5.0, &opts()))
                .unwrap();
            graph
                .update(&id, |cell| cell.set("attrs/body/fill", json!("red"), &opts()))
                .unwrap();
        }
    });
    assert_eq!(frames.requests(), 1);
    assert!(store.flush());
    assert_eq!(*any.borrow(), 1);

    let first = store.snapshot();
    let second = store.snapshot();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.version(), 1);
    assert_eq!(first.elements().len(), 152);
    assert_eq!(first.element("n149").map(|r| (r.x, r.y)), Some((154.0, 5.0)));
}

#[test]
fn flushing_inside_an_open_batch_waits_for_the_batch() {
    let (mut store, frames) = store();
    store.graph_mut().start_batch("drag");
    move_to(&mut store, "a", 10.0);
    assert_eq!(frames.requests(), 0);
    assert!(!store.flush());

    store.graph_mut().stop_batch("drag");
    assert_eq!(frames.requests(), 1);
    assert!(store.flush());
    assert_eq!(store.snapshot().element("a").map(|r| r.x), Some(10.0));
}

#[test]
fn subscribers_only_hear_about_their_topic() {
    let (mut store, frames) = store();
    let elements = counter(&store, Topic::Elements);
    let links = counter(&store, Topic::Links);

    store
        .graph_mut()
        .update("l", |cell| cell.set("vertices", json!([{"x": 50, "y": 50}]), &opts()))
        .unwrap();
    frames.take();
    store.flush();
    assert_eq!((*elements.borrow(), *links.borrow()), (0, 1));

    move_to(&mut store, "a", 5.0);
    store.flush();
    assert_eq!((*elements.borrow(), *links.borrow()), (1, 1));

    store
        .graph_mut()
        .remove_cell("b", &RemoveOptions::default())
        .unwrap();
    store.flush();
    assert_eq!((*elements.borrow(), *links.borrow()), (2, 2));
    assert!(store.snapshot().links().is_empty());
}

#[test]
fn unchanged_records_are_shared_between_snapshots() {
    let (mut store, _frames) = store();
    let before = store.snapshot();
    move_to(&mut store, "a", 60.0);
    store.flush();
    let after = store.snapshot();

    assert!(Arc::ptr_eq(&before.elements()[1], &after.elements()[1]));
    assert!(Arc::ptr_eq(&before.links()[0], &after.links()[0]));
    assert!(!Arc::ptr_eq(&before.elements()[0], &after.elements()[0]));
}

#[test]
fn unsubscribing_stops_notifications() {
    let (mut store, _frames) = store();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let subscription = store.subscribe(Topic::Any, move |_| *sink.borrow_mut() += 1);
    let kept = counter(&store, Topic::Any);

    move_to(&mut store, "a", 1.0);
    store.flush();
    assert!(subscription.unsubscribe());
    assert!(!subscription.unsubscribe());

    move_to(&mut store, "a", 2.0);
    store.flush();
    assert_eq!(*count.borrow(), 1);
    assert_eq!(*kept.borrow(), 2);
}

#[test]
fn realtime_stores_publish_without_frames() {
    let frames = ManualFrames::new();
    let mut store = GraphStore::new(
        sample_graph(),
        frames.clone(),
        StoreOptions {
            realtime: true,
            ..StoreOptions::default()
        },
    );
    let any = counter(&store, Topic::Any);

    move_to(&mut store, "a", 1.0);
    move_to(&mut store, "a", 2.0);
    assert_eq!(*any.borrow(), 2);

    store.update(|graph| {
        graph
            .add_cells(vec![element("c", 0.0), element("d", 0.0)], &AddOptions::default())
            .unwrap();
    });
    assert_eq!(*any.borrow(), 3);
    assert_eq!(store.snapshot().version(), 3);
    assert_eq!(frames.requests(), 0);
}

#[test]
fn controlled_stores_report_graph_changes_only() {
    let reported = Rc::new(RefCell::new(Vec::<GraphState>::new()));
    let sink = Rc::clone(&reported);
    let frames = ManualFrames::new();
    let mut store = GraphStore::new(
        sample_graph(),
        frames,
        StoreOptions {
            realtime: false,
            on_change: Some(Box::new(move |state: &GraphState| {
                sink.borrow_mut().push(state.clone())
            })),
        },
    );
    let any = counter(&store, Topic::Any);

    move_to(&mut store, "a", 15.0);
    store.flush();
    assert_eq!(reported.borrow().len(), 1);
    let state = reported.borrow()[0].clone();
    assert_eq!(state.elements[0].x, 15.0);

    // Echoing the reported state back is a no-op.
    assert!(!store.set_state(Update::Value(state.clone())).unwrap());
    assert_eq!(*any.borrow(), 1);

    let mut next = state;
    next.elements[1].x = 500.0;
    assert!(store.set_state(Update::Value(next)).unwrap());
    assert_eq!(reported.borrow().len(), 1);
    assert_eq!(*any.borrow(), 2);
    assert_eq!(
        store.graph().get_cell("b").and_then(Cell::position).map(|p| p.x),
        Some(500.0)
    );
    assert!(!store.has_pending());
}

#[test]
fn rejected_states_change_nothing() {
    let (mut store, frames) = store();
    let any = counter(&store, Topic::Any);
    let before = store.snapshot();

    let mut next = before.to_state();
    let mut extra = next.elements[0].clone();
    extra.id = CellId::from("c");
    next.elements.push(extra);
    next.links[0]
        .attributes
        .insert("router".to_string(), json!({"name": "nope"}));

    assert!(store.set_state(Update::Value(next)).is_err());
    assert!(!store.graph().contains("c"));
    assert!(Arc::ptr_eq(&before, &store.snapshot()));
    assert!(store.snapshot().element("c").is_none());
    assert!(!store.has_pending());
    assert_eq!(*any.borrow(), 0);
    assert_eq!(frames.requests(), 0);
}

#[test]
fn states_can_be_derived_from_the_previous_one() {
    let (mut store, _frames) = store();
    let changed = store
        .set_state(Update::with(|previous| {
            let mut next = previous.clone();
            next.links.clear();
            let mut extra = ElementRecord::clone(&next.elements[0]);
            extra.id = CellId::from("c");
            extra.x = 900.0;
            next.elements.push(extra);
            next
        }))
        .unwrap();
    assert!(changed);

    let graph = store.graph();
    assert!(!graph.contains("l"));
    assert_eq!(graph.get_cell("c").and_then(Cell::position).map(|p| p.x), Some(900.0));
    assert_eq!(store.snapshot().elements().len(), 3);
}

#[test]
fn states_round_trip_through_json() {
    let (store, _frames) = store();
    let state = store.snapshot().to_state();
    let json = state.to_json();
    assert_eq!(json["elements"][0]["type"], json!("standard.Rectangle"));
    assert_eq!(json["links"][0]["source"], json!({"id": "a"}));
    assert_eq!(GraphState::from_json(&json).unwrap(), state);
    assert!(GraphState::from_json(&json!({"elements": 3})).is_err());
}

#[test]
fn releasing_the_graph_stops_tracking() {
    let (store, frames) = store();
    let mut graph = store.into_graph();
    graph
        .update("a", |cell| cell.translate(1.0, 0.0, &opts()))
        .unwrap();
    assert_eq!(frames.requests(), 0);
}
