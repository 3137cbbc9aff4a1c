use narwhal::{
    CellId, CellRenderer, CellState, Change, Error, Graph, ShapeRegistry, point, rect,
};
use serde_json::json;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn triangle() -> (Graph, CellId, CellId, CellId) {
    let mut graph = Graph::new();
    let a = graph
        .insert_vertex(None, Some("a"), "A", rect(0.0, 0.0, 40.0, 40.0), None)
        .unwrap();
    let b = graph
        .insert_vertex(None, Some("b"), "B", rect(100.0, 0.0, 40.0, 40.0), None)
        .unwrap();
    let e = graph
        .insert_edge(None, Some("e"), "", Some(a), Some(b), None)
        .unwrap();
    (graph, a, b, e)
}

fn group(graph: &mut Graph) -> (CellId, CellId) {
    let g = graph
        .insert_vertex(None, Some("g"), "Group", rect(0.0, 0.0, 100.0, 100.0), None)
        .unwrap();
    let c = graph
        .insert_vertex(Some(g), Some("c"), "", rect(10.0, 10.0, 20.0, 20.0), None)
        .unwrap();
    (g, c)
}

#[test]
fn every_insert_is_one_undoable_edit() {
    let (mut graph, a, b, e) = triangle();
    assert_eq!(graph.undo_manager().len(), 3);
    assert_eq!(graph.cell_by_id("e"), Some(e));
    assert_eq!(
        graph.state(e).unwrap().absolute_points,
        vec![point(40.0, 20.0), point(100.0, 20.0)]
    );

    assert!(graph.undo().unwrap());
    assert!(graph.state(e).is_none());
    assert!(!graph.model().contains(e));
    assert!(graph.state(a).is_some() && graph.state(b).is_some());

    assert!(graph.can_redo());
    assert!(graph.redo().unwrap());
    assert!(graph.state(e).is_some());
    assert_eq!(graph.model().terminal(e, true), Some(a));
    assert!(!graph.redo().unwrap());
}

#[test]
fn removing_a_terminal_freezes_the_loose_end() {
    let (mut graph, a, b, e) = triangle();
    let c = graph
        .insert_vertex(None, Some("c"), "C", rect(0.0, 100.0, 40.0, 40.0), None)
        .unwrap();
    let f = graph
        .insert_edge(None, Some("f"), "", Some(c), Some(a), None)
        .unwrap();

    let removed = graph.remove_cells(&[a], false).unwrap();
    assert_eq!(removed, vec![a]);

    // e leaves a as its source, f arrives at a as its target.
    assert!(graph.model().contains(e) && graph.model().contains(f));
    assert_eq!(graph.model().terminal(e, true), None);
    assert_eq!(graph.model().terminal(f, false), None);
    let geo = graph.model().geometry(e).unwrap();
    assert_eq!(geo.source_point, Some(point(40.0, 20.0)));
    let geo = graph.model().geometry(f).unwrap();
    assert_eq!(geo.target_point, Some(point(20.0, 40.0)));
    let state = graph.state(e).unwrap();
    assert_eq!(state.first_point(), Some(point(40.0, 20.0)));
    assert_eq!(state.last_point(), Some(point(100.0, 20.0)));
    assert_eq!(graph.state(f).unwrap().last_point(), Some(point(20.0, 40.0)));

    assert!(graph.model().cell(a).unwrap().edges().is_empty());
    assert_eq!(graph.model().cell(b).unwrap().edges(), &[e]);
    assert_eq!(graph.model().cell(c).unwrap().edges(), &[f]);
    graph.model().check_invariants().unwrap();

    graph.undo().unwrap();
    assert_eq!(graph.model().terminal(e, true), Some(a));
    assert_eq!(graph.model().terminal(f, false), Some(a));
    assert!(graph.state(a).is_some());
    graph.model().check_invariants().unwrap();

    graph.redo().unwrap();
    assert_eq!(graph.model().terminal(e, true), None);
    assert_eq!(graph.model().terminal(f, false), None);
    assert_eq!(graph.model().cell(b).unwrap().edges(), &[e]);
    assert_eq!(graph.model().cell(c).unwrap().edges(), &[f]);
    graph.model().check_invariants().unwrap();
}

#[test]
fn removing_with_edges_takes_connected_edges_along() {
    let (mut graph, a, b, e) = triangle();
    let removed = graph.remove_cells(&[a], true).unwrap();
    assert_eq!(removed, vec![a, e]);
    assert!(!graph.model().contains(e));
    assert!(graph.model().cell(b).unwrap().edges().is_empty());

    graph.undo().unwrap();
    assert_eq!(graph.model().cell(b).unwrap().edges(), &[e]);
}

#[test]
fn moving_a_child_extends_its_parent_in_the_same_edit() {
    let mut graph = Graph::new().with_extend_parents_on_move(true);
    let (g, c) = group(&mut graph);
    let edits = graph.undo_manager().len();

    graph.move_cells(&[c], 150.0, 0.0, false, None).unwrap();
    assert_eq!(graph.model().geometry(c).unwrap().x(), 160.0);
    assert_eq!(graph.model().geometry(g).unwrap().width(), 180.0);
    assert_eq!(graph.state(c).unwrap().bounds, rect(160.0, 10.0, 20.0, 20.0));
    assert_eq!(graph.undo_manager().len(), edits + 1);

    graph.undo().unwrap();
    assert_eq!(graph.model().geometry(c).unwrap().x(), 10.0);
    assert_eq!(graph.model().geometry(g).unwrap().width(), 100.0);
    assert_eq!(graph.state(g).unwrap().bounds, rect(0.0, 0.0, 100.0, 100.0));
}

#[test]
fn move_and_grow_to_fit_undo_as_one_step() {
    let mut graph = Graph::new();
    let (g, c) = group(&mut graph);
    let edits = graph.undo_manager().len();

    graph
        .batch(|graph| {
            graph.move_cells(&[c], 150.0, 0.0, false, None)?;
            graph.update_group_bounds(&[g], 10.0, true)
        })
        .unwrap();

    assert_eq!(graph.undo_manager().len(), edits + 1);
    assert_eq!(
        graph.model().geometry(g).unwrap().bounds,
        rect(150.0, 0.0, 40.0, 40.0)
    );
    assert_eq!(
        graph.model().geometry(c).unwrap().bounds,
        rect(10.0, 10.0, 20.0, 20.0)
    );
    // The child did not move on screen.
    assert_eq!(graph.state(c).unwrap().bounds, rect(160.0, 10.0, 20.0, 20.0));

    graph.undo().unwrap();
    assert_eq!(
        graph.model().geometry(g).unwrap().bounds,
        rect(0.0, 0.0, 100.0, 100.0)
    );
    assert_eq!(graph.state(c).unwrap().bounds, rect(10.0, 10.0, 20.0, 20.0));
}

#[test]
fn resizing_past_the_parent_extends_it() {
    let mut graph = Graph::new();
    let (g, c) = group(&mut graph);
    graph
        .resize_cells(&[c], &[rect(10.0, 10.0, 150.0, 20.0)])
        .unwrap();
    assert_eq!(graph.model().geometry(g).unwrap().width(), 160.0);
    assert_eq!(graph.model().geometry(g).unwrap().height(), 100.0);
}

#[test]
fn style_batch_is_a_single_step() {
    let (mut graph, a, _b, _e) = triangle();
    graph
        .batch(|graph| {
            graph.set_cell_style_key(&[a], "fillColor", Some("red"))?;
            graph.set_cell_style_key(&[a], "strokeColor", Some("blue"))
        })
        .unwrap();
    assert_eq!(
        graph.model().style(a),
        Some("fillColor=red;strokeColor=blue")
    );
    assert_eq!(graph.state(a).unwrap().style["fillColor"], "red");

    graph.undo().unwrap();
    assert_eq!(graph.model().style(a), None);
    assert_eq!(graph.state(a).unwrap().style["fillColor"], "#C3D9FF");

    graph.set_cell_style(&[a], Some("shape=ellipse")).unwrap();
    graph.set_cell_style_key(&[a], "shape", None).unwrap();
    assert_eq!(graph.model().style(a), None);
}

#[test]
fn collapsing_swaps_to_the_label_size() {
    let mut graph = Graph::new();
    let (g, c) = group(&mut graph);

    let folded = graph.fold_cells(&[g], true, false).unwrap();
    assert_eq!(folded, vec![g]);
    assert!(graph.model().is_collapsed(g));
    let geo = graph.model().geometry(g).unwrap();
    // "Group" at 11px: 5 columns * 6.6 + 2 * 2 spacing, one 13.2 line + 2 * 2.
    assert!(approx(geo.width(), 37.0));
    assert!(approx(geo.height(), 17.2));
    assert_eq!(geo.alternate_bounds, Some(rect(0.0, 0.0, 100.0, 100.0)));
    assert!(graph.state(c).is_none());

    // Already collapsed: nothing to do.
    assert!(graph.fold_cells(&[g], true, false).unwrap().is_empty());

    graph.fold_cells(&[g], false, false).unwrap();
    assert_eq!(
        graph.model().geometry(g).unwrap().bounds,
        rect(0.0, 0.0, 100.0, 100.0)
    );
    assert!(graph.state(c).is_some());

    graph.undo().unwrap();
    assert!(graph.model().is_collapsed(g));
    graph.undo().unwrap();
    assert!(!graph.model().is_collapsed(g));
    assert_eq!(graph.model().geometry(g).unwrap().alternate_bounds, None);
}

#[test]
fn hiding_cells_with_edges() {
    let (mut graph, a, b, e) = triangle();
    let hidden = graph.toggle_cells(false, &[a], true).unwrap();
    assert_eq!(hidden, vec![a, e]);
    assert!(graph.state(a).is_none() && graph.state(e).is_none());
    assert!(graph.state(b).is_some());

    graph.undo().unwrap();
    assert!(graph.state(a).is_some() && graph.state(e).is_some());
}

#[test]
fn clones_keep_internal_connections_and_loosen_the_rest() {
    let (mut graph, a, _b, e) = triangle();
    let clones = graph.clone_cells(&[a, e], true).unwrap();
    assert_eq!(clones.len(), 2);
    let (ca, ce) = (clones[0], clones[1]);
    assert!(!graph.model().contains(ca) && !graph.model().contains(ce));
    assert_eq!(graph.model().terminal(ce, true), Some(ca));
    assert_eq!(graph.model().terminal(ce, false), None);
    assert_eq!(
        graph.model().geometry(ce).unwrap().target_point,
        Some(point(100.0, 20.0))
    );

    graph.add_cells(&clones, None, None, None, None).unwrap();
    assert_eq!(graph.model().cell(ca).unwrap().edges(), &[ce]);
    assert_eq!(
        graph.state(ce).unwrap().last_point(),
        Some(point(100.0, 20.0))
    );
    graph.model().check_invariants().unwrap();
}

#[test]
fn invalid_edge_clones_are_dropped_when_dangling_is_disallowed() {
    let mut graph = Graph::new().with_allow_dangling_edges(false);
    let a = graph
        .insert_vertex(None, None, "", rect(0.0, 0.0, 40.0, 40.0), None)
        .unwrap();
    let b = graph
        .insert_vertex(None, None, "", rect(100.0, 0.0, 40.0, 40.0), None)
        .unwrap();
    let e = graph.insert_edge(None, None, "", Some(a), Some(b), None).unwrap();

    let clones = graph.clone_cells(&[a, e], false).unwrap();
    assert_eq!(clones.len(), 1);
    assert!(graph.model().is_vertex(clones[0]));
}

#[test]
fn importing_clones_into_place() {
    let (mut graph, a, _b, _e) = triangle();
    let imported = graph.import_cells(&[a], 10.0, 10.0, None).unwrap();
    assert_eq!(imported.len(), 1);
    let copy = imported[0];
    assert_ne!(copy, a);
    assert!(graph.model().contains(copy));
    assert_eq!(
        graph.model().geometry(copy).unwrap().bounds,
        rect(10.0, 10.0, 40.0, 40.0)
    );
    assert_ne!(graph.model().cell(copy).unwrap().id(), Some("a"));
    assert_eq!(
        graph.model().geometry(a).unwrap().bounds,
        rect(0.0, 0.0, 40.0, 40.0)
    );

    graph.undo().unwrap();
    assert!(!graph.model().contains(copy));
}

#[test]
fn dangling_edges_can_be_refused() {
    let mut graph = Graph::new().with_allow_dangling_edges(false);
    let a = graph
        .insert_vertex(None, None, "", rect(0.0, 0.0, 40.0, 40.0), None)
        .unwrap();
    let err = graph
        .insert_edge(None, None, "", Some(a), None, None)
        .unwrap_err();
    assert!(matches!(err, Error::DanglingEdge(_)));
    assert_eq!(graph.undo_manager().len(), 1);
    assert_eq!(graph.model().children(graph.default_parent()), &[a]);
    assert!(graph.model().cell(a).unwrap().edges().is_empty());
}

#[test]
fn connecting_and_disconnecting_ends() {
    let (mut graph, a, _b, e) = triangle();
    graph.connect_cell(e, None, false).unwrap();
    assert_eq!(graph.model().terminal(e, false), None);
    assert_eq!(
        graph.model().geometry(e).unwrap().target_point,
        Some(point(100.0, 20.0))
    );

    let locked = graph
        .batch(|graph| {
            let cell = graph.model_mut().create(
                narwhal::Cell::vertex(narwhal::Geometry::new(0.0, 100.0, 40.0, 40.0))
                    .with_connectable(false),
            );
            graph.add_cells(&[cell], None, None, None, None)?;
            Ok(cell)
        })
        .unwrap();
    let err = graph.connect_cell(e, Some(locked), false).unwrap_err();
    assert!(matches!(err, Error::NotConnectable(c) if c == locked));

    graph.connect_cell(e, Some(a), false).unwrap();
    assert_eq!(graph.model().terminal(e, false), Some(a));
    assert!(matches!(
        graph.connect_cell(a, None, true),
        Err(Error::Model(narwhal::model::Error::NotAnEdge(_)))
    ));
}

#[test]
fn hit_testing_follows_the_view_transform() {
    let (mut graph, a, _b, e) = triangle();
    graph.scale_and_translate(2.0, 10.0, 0.0);
    assert_eq!(graph.state(a).unwrap().bounds, rect(20.0, 0.0, 80.0, 80.0));
    assert_eq!(graph.cell_at(30.0, 10.0), Some(a));
    assert_eq!(graph.cell_at(150.0, 41.0), Some(e));
    assert_eq!(graph.cell_at(500.0, 500.0), None);
    assert_eq!(graph.graph_bounds(), rect(20.0, 0.0, 280.0, 80.0));
}

#[test]
fn stylesheet_overrides_come_from_json() {
    let mut graph = Graph::from_json_config(
        r##"{ "stylesheet": { "defaultVertex": { "fillColor": "#000000" } } }"##,
    )
    .unwrap();
    let a = graph
        .insert_vertex(None, None, "", rect(0.0, 0.0, 40.0, 40.0), None)
        .unwrap();
    let style = &graph.state(a).unwrap().style;
    assert_eq!(style["fillColor"], "#000000");
    assert_eq!(style["shape"], "rectangle");
}

#[test]
fn raw_changes_run_as_one_edit() {
    let (mut graph, a, _b, _e) = triangle();
    graph
        .execute(Change::Value {
            cell: a,
            value: json!("Z"),
        })
        .unwrap();
    assert_eq!(graph.state(a).unwrap().label.as_deref(), Some("Z"));
    graph.undo().unwrap();
    assert_eq!(graph.state(a).unwrap().label.as_deref(), Some("A"));
}

#[test]
fn failed_batches_leave_no_trace() {
    let (mut graph, a, _b, _e) = triangle();
    let edits = graph.undo_manager().len();
    let err = graph
        .batch(|graph| {
            graph.set_value(a, "changed")?;
            graph.execute(Change::Child {
                child: a,
                parent: Some(a),
                index: 0,
            })
        })
        .unwrap_err();
    assert!(matches!(err, Error::Model(_)));
    assert_eq!(graph.model().value(a), Some(&json!("A")));
    assert_eq!(graph.undo_manager().len(), edits);
    assert!(!graph.model().is_updating());
}

#[test]
fn failed_batches_free_the_cells_they_allocated() {
    let (mut graph, a, _b, e) = triangle();
    let count = graph.model().cell_count();

    let err = graph
        .batch(|g| {
            g.move_cells(&[a], 10.0, 0.0, true, None)?;
            g.insert_vertex(None, None, "x", rect(0.0, 0.0, 10.0, 10.0), None)?;
            g.import_cells(&[a, e], 0.0, 50.0, None)?;
            Err::<(), _>(Error::NotConnectable(a))
        })
        .unwrap_err();
    assert!(matches!(err, Error::NotConnectable(_)));
    assert_eq!(graph.model().cell_count(), count);
    graph.model().check_invariants().unwrap();

    // A failed inner batch only frees its own allocations.
    let kept = graph
        .batch(|g| {
            let kept = g.insert_vertex(None, None, "kept", rect(0.0, 0.0, 10.0, 10.0), None)?;
            let inner = g.batch(|g| {
                g.move_cells(&[a], 10.0, 0.0, true, None)?;
                Err::<(), _>(Error::DanglingEdge(e))
            });
            assert!(inner.is_err());
            Ok(kept)
        })
        .unwrap();
    assert!(graph.model().contains(kept));
    assert_eq!(graph.model().cell_count(), count + 1);
    graph.model().check_invariants().unwrap();
}

#[test]
fn rendering_paints_what_changed() {
    let (mut graph, a, b, e) = triangle();
    let registry = ShapeRegistry::new()
        .with("rectangle", |ops: &mut Vec<CellId>, s: &CellState| {
            ops.push(s.cell)
        })
        .with("connector", |ops: &mut Vec<CellId>, s: &CellState| {
            ops.push(s.cell)
        });
    let mut renderer = CellRenderer::new(registry);
    let mut ops = Vec::new();

    let report = graph.render(&mut renderer, &mut ops);
    assert_eq!(report.painted, vec![a, b, e]);

    ops.clear();
    graph.move_cells(&[a], 0.0, 30.0, false, None).unwrap();
    let report = graph.render(&mut renderer, &mut ops);
    assert_eq!(report.painted, vec![a, e]);
    assert_eq!(ops, vec![a, e]);
}
