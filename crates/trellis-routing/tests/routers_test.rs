use serde_json::json;
use trellis_routing::anchor::Anchor;
use trellis_routing::geom::{Line, PointExt};
use trellis_routing::{
    ConnectionPoint, Connector, ConnectorInput, CurveTangent, ElementGeometry, EndContext, Error,
    ManhattanOptions, NamedSpec, Obstacle, Point, Rect, RouteEnd, RouteRequest, Router, Segment,
    point, rect, route,
};

struct Link<'a> {
    source: (&'a str, Rect),
    target: (&'a str, Rect),
    vertices: Vec<Point>,
    obstacles: Vec<Obstacle>,
}

fn link<'a>(source: (&'a str, Rect), target: (&'a str, Rect)) -> Link<'a> {
    Link {
        source,
        target,
        vertices: Vec::new(),
        obstacles: Vec::new(),
    }
}

fn obstacle(id: &str, cell_type: &str, bbox: Rect) -> Obstacle {
    Obstacle {
        id: id.to_string(),
        cell_type: cell_type.to_string(),
        bbox,
    }
}

fn router(name: &str, args: serde_json::Value) -> Router {
    Router::from_spec(&NamedSpec::with_args(name, args)).unwrap()
}

/// Anchors, route, bbox connection points and the normal connector, in that order.
fn path(link: &Link<'_>, router: &Router) -> String {
    let source_view = ElementGeometry::new(link.source.1);
    let target_view = ElementGeometry::new(link.target.1);
    let source_ctx = EndContext::new(&source_view);
    let target_ctx = EndContext::new(&target_view);

    let anchor = if router.prefers_perpendicular_anchor() {
        Anchor::from_spec(&NamedSpec::new("perpendicular")).unwrap()
    } else {
        Anchor::default()
    };
    let source_ref = link
        .vertices
        .first()
        .copied()
        .unwrap_or_else(|| link.target.1.center());
    let source_anchor = anchor.resolve(&source_ctx, source_ref).round_to(2);
    let target_ref = link.vertices.last().copied().unwrap_or(source_anchor);
    let target_anchor = anchor.resolve(&target_ctx, target_ref).round_to(2);

    let source = RouteEnd::element(link.source.0, link.source.1).with_anchor(source_anchor);
    let target = RouteEnd::element(link.target.0, link.target.1).with_anchor(target_anchor);
    let points = route(
        &RouteRequest {
            vertices: &link.vertices,
            source: &source,
            target: &target,
            obstacles: &link.obstacles,
        },
        router,
    )
    .unwrap();

    let cp = ConnectionPoint::default();
    let source_point = cp
        .resolve(
            Line::new(points.first().copied().unwrap_or(target_anchor), source_anchor),
            &source_ctx,
        )
        .round_to(2);
    let target_point = cp
        .resolve(
            Line::new(points.last().copied().unwrap_or(source_anchor), target_anchor),
            &target_ctx,
        )
        .round_to(2);

    Connector::Normal
        .connect(&ConnectorInput {
            source: source_point,
            target: target_point,
            route: &points,
            source_bbox: Some(link.source.1),
            target_bbox: Some(link.target.1),
        })
        .to_svg()
}

fn crosses_interior(a: Point, b: Point, r: &Rect) -> bool {
    let inner = r.inflate(-0.5, -0.5);
    !Line::new(a, b).intersect_rect(&inner).is_empty() || inner.contains(a) || inner.contains(b)
}

#[test]
fn one_side_leaves_through_the_chosen_side() {
    let l = link(
        ("r1", rect(20.0, 30.0, 120.0, 80.0)),
        ("r2", rect(320.0, 330.0, 120.0, 80.0)),
    );
    let cases = [
        (json!({"side": "left", "padding": 20}), "M 20 70 L 0 70 L 0 370 L 320 370"),
        (json!({"side": "left"}), "M 20 70 L -20 70 L -20 370 L 320 370"),
        (json!({"side": "right"}), "M 140 70 L 480 70 L 480 370 L 440 370"),
        (json!({"side": "top"}), "M 80 30 L 80 -10 L 380 -10 L 380 330"),
        (json!({"side": "bottom"}), "M 80 110 L 80 450 L 380 450 L 380 410"),
    ];
    for (args, expected) in cases {
        assert_eq!(path(&l, &router("oneSide", args.clone())), expected, "{args}");
    }
}

#[test]
fn one_side_rejects_unknown_side() {
    let err = Router::from_spec(&NamedSpec::with_args(
        "oneSide",
        json!({"side": "non-existing"}),
    ))
    .unwrap_err();
    assert!(matches!(err, Error::InvalidOption { .. }), "{err:?}");
}

#[test]
fn normal_router_passes_vertices_through() {
    let mut l = link(
        ("r1", rect(200.0, 60.0, 50.0, 30.0)),
        ("r2", rect(125.0, 60.0, 50.0, 30.0)),
    );
    l.vertices.push(point(150.0, 200.0));
    assert_eq!(
        path(&l, &Router::Normal),
        "M 216 90 L 150 200 L 150 90"
    );
}

#[test]
fn orthogonal_router_bends_through_vertices() {
    let mut l = link(
        ("r1", rect(200.0, 60.0, 50.0, 30.0)),
        ("r2", rect(125.0, 60.0, 50.0, 30.0)),
    );
    l.vertices.push(point(150.0, 200.0));
    assert_eq!(
        path(&l, &router("orthogonal", json!({}))),
        "M 225 90 L 225 200 L 150 200 L 150 90"
    );
}

#[test]
fn orthogonal_router_joins_elements_with_one_bend() {
    let l = link(
        ("r3", rect(40.0, 40.0, 50.0, 30.0)),
        ("r4", rect(220.0, 120.0, 50.0, 30.0)),
    );
    assert_eq!(
        path(&l, &router("orthogonal", json!({}))),
        "M 90 55 L 245 55 L 245 120"
    );
}

#[test]
fn orthogonal_router_does_not_spike_back_into_the_target() {
    let mut l = link(
        ("r5", rect(200.0, 60.0, 50.0, 30.0)),
        ("r6", rect(350.0, 40.0, 50.0, 30.0)),
    );
    l.vertices.push(point(150.0, 200.0));
    assert_eq!(
        path(&l, &router("orthogonal", json!({}))),
        "M 225 90 L 225 200 L 150 200 L 150 55 L 350 55"
    );
}

#[test]
fn manhattan_falls_back_to_orthogonal_when_loops_run_out() {
    let l = link(
        ("r1", rect(20.0, 80.0, 120.0, 80.0)),
        ("r3", rect(620.0, -20.0, 120.0, 80.0)),
    );
    let r = router(
        "manhattan",
        json!({"maximumLoops": 1, "step": 20, "paddingBox": {"x": 0, "y": 0, "width": 0, "height": 0}}),
    );
    assert_eq!(path(&l, &r), "M 140 120 L 680 120 L 680 60");
}

#[test]
fn manhattan_ignores_excluded_types() {
    let r1 = rect(20.0, 30.0, 120.0, 80.0);
    let r2 = rect(320.0, 30.0, 120.0, 80.0);
    let r3 = rect(620.0, 30.0, 120.0, 80.0);
    let mut l = link(("r1", r1), ("r3", r3));
    l.obstacles = vec![
        obstacle("r1", "standard.Rectangle", r1),
        obstacle("r2", "standard.Ellipse", r2),
        obstacle("r3", "standard.Rectangle", r3),
    ];
    let r = router(
        "manhattan",
        json!({
            "step": 20,
            "paddingBox": {"x": 0, "y": 0, "width": 0, "height": 0},
            "excludeTypes": ["standard.Ellipse"],
        }),
    );
    assert_eq!(path(&l, &r), "M 140 70 L 620 70");
}

#[test]
fn manhattan_point_predicate_replaces_obstacle_map() {
    let r1 = rect(20.0, 30.0, 120.0, 80.0);
    let r2 = rect(320.0, 30.0, 120.0, 80.0);
    let r3 = rect(620.0, 30.0, 120.0, 80.0);
    let mut l = link(("r1", r1), ("r3", r3));
    l.obstacles = vec![obstacle("r2", "standard.Rectangle", r2)];
    let opts = ManhattanOptions {
        step: 20.0,
        padding_box: Some(rect(0.0, 0.0, 0.0, 0.0)),
        ..ManhattanOptions::default()
    }
    .with_point_obstacle(|_| false);
    assert_eq!(path(&l, &Router::Manhattan(opts)), "M 140 70 L 620 70");
}

#[test]
fn manhattan_detours_around_obstacles() {
    let r1 = rect(20.0, 30.0, 120.0, 80.0);
    let r2 = rect(320.0, 30.0, 120.0, 80.0);
    let r3 = rect(620.0, 30.0, 120.0, 80.0);
    let mut l = link(("r1", r1), ("r3", r3));
    l.obstacles = vec![
        obstacle("r1", "standard.Rectangle", r1),
        obstacle("r2", "standard.Rectangle", r2),
        obstacle("r3", "standard.Rectangle", r3),
    ];
    let r = router(
        "manhattan",
        json!({"step": 20, "paddingBox": {"x": 0, "y": 0, "width": 0, "height": 0}}),
    );

    let source = RouteEnd::element("r1", r1).with_anchor(r1.center());
    let target = RouteEnd::element("r3", r3).with_anchor(r3.center());
    let points = route(
        &RouteRequest {
            vertices: &[],
            source: &source,
            target: &target,
            obstacles: &l.obstacles,
        },
        &r,
    )
    .unwrap();

    assert!(!points.is_empty());
    let mut polyline = vec![r1.center()];
    polyline.extend(points.iter().copied());
    polyline.push(r3.center());
    // The first and last segments start inside their own elements.
    for pair in polyline[1..polyline.len() - 1].windows(2) {
        assert!(!crosses_interior(pair[0], pair[1], &r2), "{pair:?} crosses r2");
    }
    for pair in polyline.windows(2) {
        assert!(pair[0].x == pair[1].x || pair[0].y == pair[1].y, "{pair:?}");
    }
    assert_ne!(path(&l, &r), "M 140 70 L 620 70");
}

#[test]
fn metro_falls_back_to_a_diagonal_route() {
    let l = link(
        ("r1", rect(20.0, 30.0, 120.0, 80.0)),
        ("r3", rect(620.0, 630.0, 120.0, 80.0)),
    );
    let r = router("metro", json!({"maximumLoops": 1}));
    assert_eq!(path(&l, &r), "M 80 70 L 81 70 L 680 670 L 680 670");
}

#[test]
fn fallback_route_is_never_empty() {
    let r1 = rect(20.0, 30.0, 120.0, 80.0);
    let r3 = rect(620.0, 630.0, 120.0, 80.0);
    let source = RouteEnd::element("r1", r1).with_anchor(r1.center());
    let target = RouteEnd::element("r3", r3).with_anchor(r3.center());
    for name in ["manhattan", "metro"] {
        let points = route(
            &RouteRequest {
                vertices: &[],
                source: &source,
                target: &target,
                obstacles: &[],
            },
            &router(name, json!({"maximumLoops": 1})),
        )
        .unwrap();
        assert!(!points.is_empty(), "{name}");
    }
}

#[test]
fn manhattan_passes_through_vertices() {
    let r1 = rect(0.0, 0.0, 40.0, 40.0);
    let r2 = rect(400.0, 0.0, 40.0, 40.0);
    let source = RouteEnd::element("a", r1).with_anchor(r1.center());
    let target = RouteEnd::element("b", r2).with_anchor(r2.center());
    let vertex = point(200.0, 200.0);
    let points = route(
        &RouteRequest {
            vertices: &[vertex],
            source: &source,
            target: &target,
            obstacles: &[],
        },
        &router("manhattan", json!({})),
    )
    .unwrap();
    assert!(points.contains(&vertex), "{points:?}");
}

fn route_between(
    source: &RouteEnd,
    target: &RouteEnd,
    vertices: &[Point],
    router: &Router,
) -> Vec<Point> {
    route(
        &RouteRequest {
            vertices,
            source,
            target,
            obstacles: &[],
        },
        router,
    )
    .unwrap()
}

fn curve(args: serde_json::Value) -> Connector {
    Connector::from_spec(&NamedSpec::with_args("curve", args)).unwrap()
}

#[test]
fn right_angle_meets_halfway_between_facing_sides() {
    let a = RouteEnd::element("a", rect(0.0, 0.0, 100.0, 100.0)).with_anchor(point(100.0, 50.0));
    let b = RouteEnd::element("b", rect(300.0, 100.0, 100.0, 100.0))
        .with_anchor(point(300.0, 150.0));
    assert_eq!(
        route_between(&a, &b, &[], &router("rightAngle", json!({}))),
        vec![point(200.0, 50.0), point(200.0, 150.0)]
    );
}

#[test]
fn right_angle_honours_explicit_directions() {
    let a = RouteEnd::element("a", rect(0.0, 0.0, 100.0, 100.0)).with_anchor(point(50.0, 100.0));
    let b = RouteEnd::element("b", rect(200.0, 300.0, 100.0, 100.0))
        .with_anchor(point(250.0, 300.0));
    let r = router(
        "rightAngle",
        json!({"sourceDirection": "bottom", "targetDirection": "top"}),
    );
    assert_eq!(
        route_between(&a, &b, &[], &r),
        vec![point(50.0, 200.0), point(250.0, 200.0)]
    );
}

#[test]
fn right_angle_passes_through_vertices() {
    let a = RouteEnd::element("a", rect(0.0, 0.0, 100.0, 100.0)).with_anchor(point(100.0, 50.0));
    let b = RouteEnd::element("b", rect(300.0, 100.0, 100.0, 100.0))
        .with_anchor(point(300.0, 150.0));
    let vertex = point(200.0, 300.0);
    let r = router("rightAngle", json!({}));
    assert_eq!(
        route_between(&a, &b, &[vertex], &r),
        vec![point(150.0, 50.0), point(150.0, 300.0), vertex, point(200.0, 150.0)]
    );

    let ignored = router("rightAngle", json!({"useVertices": false}));
    assert!(!route_between(&a, &b, &[vertex], &ignored).contains(&vertex));
}

#[test]
fn right_angle_rejects_unknown_directions() {
    let err = Router::from_spec(&NamedSpec::with_args(
        "rightAngle",
        json!({"sourceDirection": "diagonal"}),
    ))
    .unwrap_err();
    assert!(matches!(err, Error::InvalidOption { .. }), "{err:?}");
}

#[test]
fn curve_uses_the_given_tangents() {
    let c = curve(json!({
        "sourceTangent": {"x": 0, "y": 60},
        "targetTangent": {"x": 0, "y": -60},
    }));
    let d = c
        .connect(&ConnectorInput {
            source: point(0.0, 0.0),
            target: point(100.0, 100.0),
            route: &[],
            source_bbox: None,
            target_bbox: None,
        })
        .to_svg();
    assert_eq!(d, "M 0 0 C 0 40 100 60 100 100");
}

#[test]
fn curve_spans_every_route_segment() {
    let route = [point(100.0, 0.0), point(200.0, 100.0)];
    let path = curve(json!({})).connect(&ConnectorInput {
        source: point(0.0, 100.0),
        target: point(300.0, 0.0),
        route: &route,
        source_bbox: Some(rect(-50.0, 50.0, 50.0, 100.0)),
        target_bbox: None,
    });
    assert_eq!(path.segments.first(), Some(&Segment::Move(point(0.0, 100.0))));
    let ends: Vec<Point> = path
        .segments
        .iter()
        .skip(1)
        .map(|segment| match segment {
            Segment::Curve(_, _, end) => *end,
            other => panic!("{other:?}"),
        })
        .collect();
    assert_eq!(ends, vec![route[0], route[1], point(300.0, 0.0)]);
}

#[test]
fn curve_leaves_elements_through_their_nearest_side() {
    // The source sits on the right edge, so the first control point lies to its right.
    let path = curve(json!({})).connect(&ConnectorInput {
        source: point(100.0, 50.0),
        target: point(300.0, 250.0),
        route: &[],
        source_bbox: Some(rect(0.0, 0.0, 100.0, 100.0)),
        target_bbox: Some(rect(300.0, 200.0, 100.0, 100.0)),
    });
    match path.segments[1] {
        Segment::Curve(c1, c2, end) => {
            assert!(c1.x > 100.0 && c1.y == 50.0, "{c1:?}");
            assert!(c2.x < 300.0 && c2.y == 250.0, "{c2:?}");
            assert_eq!(end, point(300.0, 250.0));
        }
        other => panic!("{other:?}"),
    }
}

#[test]
fn curve_directions_accept_names_angles_and_vectors() {
    let Connector::Curve(opts) = curve(json!({
        "direction": "closest-point",
        "sourceDirection": "up",
        "targetDirection": {"x": 3, "y": 4},
    })) else {
        panic!("not a curve");
    };
    assert_eq!(opts.source_direction, Some(CurveTangent::Up));
    match opts.target_direction {
        Some(CurveTangent::Fixed(v)) => {
            assert!((v.x - 0.6).abs() < 1e-9 && (v.y - 0.8).abs() < 1e-9, "{v:?}");
        }
        other => panic!("{other:?}"),
    }

    let Connector::Curve(opts) = curve(json!({"sourceDirection": 90})) else {
        panic!("not a curve");
    };
    match opts.source_direction {
        Some(CurveTangent::Fixed(v)) => {
            assert!(v.x.abs() < 1e-9 && (v.y + 1.0).abs() < 1e-9, "{v:?}");
        }
        other => panic!("{other:?}"),
    }
}
