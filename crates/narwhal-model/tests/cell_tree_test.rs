use narwhal_model::{Cell, CellId, Error, Geometry, Model, ModelOptions, point};

fn vertex(model: &mut Model, parent: CellId, x: f64, y: f64) -> CellId {
    let v = model.create(Cell::vertex(Geometry::new(x, y, 40.0, 30.0)));
    model.add(parent, v, None).unwrap();
    v
}

fn edge(model: &mut Model, parent: CellId, source: CellId, target: CellId) -> CellId {
    let e = model.create(Cell::edge());
    model.add(parent, e, None).unwrap();
    model.set_terminals(e, Some(source), Some(target)).unwrap();
    e
}

#[test]
fn new_model_has_root_and_one_layer() {
    let model = Model::new();
    let root = model.root();
    let layer = model.default_parent();
    assert_ne!(root, layer);
    assert_eq!(model.children(root), &[layer]);
    assert!(model.is_layer(layer));
    assert_eq!(model.cell_by_id("0"), Some(root));
    assert_eq!(model.cell_by_id("1"), Some(layer));
}

#[test]
fn insert_moves_child_out_of_previous_parent() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let b = vertex(&mut model, layer, 100.0, 0.0);
    let c = vertex(&mut model, a, 5.0, 5.0);

    model.add(b, c, None).unwrap();
    assert_eq!(model.parent(c), Some(b));
    assert!(model.children(a).is_empty());
    assert_eq!(model.children(b), &[c]);
    model.check_invariants().unwrap();
}

#[test]
fn appending_a_child_already_in_parent_moves_it_to_the_end() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let b = vertex(&mut model, layer, 0.0, 0.0);
    let c = vertex(&mut model, layer, 0.0, 0.0);

    model.add(layer, a, None).unwrap();
    assert_eq!(model.children(layer), &[b, c, a]);

    model.add(layer, a, Some(0)).unwrap();
    assert_eq!(model.children(layer), &[a, b, c]);
}

#[test]
fn out_of_range_and_cyclic_inserts_are_rejected() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let b = model.create(Cell::vertex(Geometry::default()));

    assert!(matches!(
        model.add(a, b, Some(2)),
        Err(Error::IndexOutOfRange { index: 2, .. })
    ));
    assert_eq!(model.parent(b), None);

    assert!(matches!(
        model.add(a, layer, None),
        Err(Error::Cycle { .. })
    ));
    assert_eq!(model.parent(layer), Some(model.root()));
    assert_eq!(model.child_at(a, 7), None);
    assert!(!model.is_updating());
}

#[test]
fn terminal_changes_keep_edge_lists_symmetric() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let b = vertex(&mut model, layer, 100.0, 0.0);
    let c = vertex(&mut model, layer, 200.0, 0.0);
    let e = edge(&mut model, layer, a, b);

    assert_eq!(model.cell(a).unwrap().edges(), &[e]);
    assert_eq!(model.cell(b).unwrap().edges(), &[e]);

    model.set_terminal(e, Some(c), false).unwrap();
    assert!(model.cell(b).unwrap().edges().is_empty());
    assert_eq!(model.cell(c).unwrap().edges(), &[e]);
    assert_eq!(model.terminal(e, false), Some(c));
    model.check_invariants().unwrap();
}

#[test]
fn edge_queries_filter_by_direction() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let b = vertex(&mut model, layer, 100.0, 0.0);
    let out = edge(&mut model, layer, a, b);
    let inc = edge(&mut model, layer, b, a);
    let lp = edge(&mut model, layer, a, a);

    assert_eq!(model.edges(a, false, true, false), vec![out]);
    assert_eq!(model.edges(a, true, false, false), vec![inc]);
    assert_eq!(model.edges(a, true, true, true), vec![out, inc, lp]);
    assert!(model.edges(a, false, false, true).is_empty());

    assert_eq!(model.edges_between(a, b, true), vec![out]);
    assert_eq!(model.edges_between(a, b, false), vec![out, inc]);
}

#[test]
fn nearest_common_ancestor_and_ancestry() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let g = vertex(&mut model, layer, 0.0, 0.0);
    let a = vertex(&mut model, g, 0.0, 0.0);
    let b = vertex(&mut model, g, 0.0, 0.0);
    let c = vertex(&mut model, a, 0.0, 0.0);
    let other = vertex(&mut model, layer, 0.0, 0.0);

    assert!(model.is_ancestor(g, c));
    assert!(model.is_ancestor(c, c));
    assert!(!model.is_ancestor(c, g));
    assert_eq!(model.nearest_common_ancestor(c, b), Some(g));
    assert_eq!(model.nearest_common_ancestor(a, c), Some(a));
    assert_eq!(model.nearest_common_ancestor(c, other), Some(layer));
    assert_eq!(model.descendants(g), vec![g, a, c, b]);
}

#[test]
fn edges_follow_the_common_ancestor_of_their_terminals() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let g = vertex(&mut model, layer, 100.0, 50.0);
    let a = vertex(&mut model, g, 10.0, 10.0);
    let b = vertex(&mut model, g, 60.0, 10.0);

    let e = model.create(Cell::edge().with_geometry(Geometry::edge().with_points([point(150.0, 80.0)])));
    model.add(layer, e, None).unwrap();
    model.set_terminals(e, Some(a), Some(b)).unwrap();

    assert_eq!(model.parent(e), Some(g));
    // The waypoint is now relative to the group's origin.
    assert_eq!(model.geometry(e).unwrap().points, vec![point(50.0, 30.0)]);
}

#[test]
fn edge_parent_is_left_alone_when_disabled() {
    let mut model = Model::with_options(ModelOptions {
        maintain_edge_parent: false,
        ..Default::default()
    });
    let layer = model.default_parent();
    let g = vertex(&mut model, layer, 100.0, 50.0);
    let a = vertex(&mut model, g, 10.0, 10.0);
    let b = vertex(&mut model, g, 60.0, 10.0);
    let e = edge(&mut model, layer, a, b);
    assert_eq!(model.parent(e), Some(layer));
}

#[test]
fn ids_are_assigned_and_collisions_renamed() {
    let mut model = Model::with_options(ModelOptions {
        id_prefix: "c".to_string(),
        ..Default::default()
    });
    let layer = model.default_parent();
    let a = model.create(Cell::vertex(Geometry::default()).with_id("node"));
    model.add(layer, a, None).unwrap();
    let b = model.create(Cell::vertex(Geometry::default()).with_id("node"));
    model.add(layer, b, None).unwrap();
    let c = model.create(Cell::vertex(Geometry::default()));
    model.add(layer, c, None).unwrap();

    assert_eq!(model.cell(a).unwrap().id(), Some("node"));
    assert_ne!(model.cell(b).unwrap().id(), Some("node"));
    assert!(model.cell(c).unwrap().id().unwrap().starts_with('c'));
    assert_eq!(model.cell_by_id("node"), Some(a));

    model.remove(a).unwrap();
    assert_eq!(model.cell_by_id("node"), None);
}

#[test]
fn origin_sums_ancestor_offsets() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let g = vertex(&mut model, layer, 100.0, 50.0);
    let a = vertex(&mut model, g, 10.0, 20.0);
    assert_eq!(model.origin(a), point(110.0, 70.0));
    assert_eq!(model.origin(layer), point(0.0, 0.0));
}

#[test]
fn remove_severs_incident_edges_from_outside() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    let b = vertex(&mut model, layer, 100.0, 0.0);
    let c = vertex(&mut model, layer, 200.0, 0.0);
    let e = edge(&mut model, layer, a, b);
    let f = edge(&mut model, layer, c, a);

    model.remove(a).unwrap();
    assert!(!model.contains(a));
    assert_eq!(model.terminal(e, true), None);
    assert_eq!(model.terminal(f, false), None);
    assert_eq!(model.cell(b).unwrap().edges(), &[e]);
    assert_eq!(model.cell(c).unwrap().edges(), &[f]);
    assert!(model.cell(a).unwrap().edges().is_empty());
    model.check_invariants().unwrap();
}

#[test]
fn removed_subtree_keeps_dangling_terminals_for_re_add() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let g = vertex(&mut model, layer, 0.0, 0.0);
    let outside = vertex(&mut model, layer, 300.0, 0.0);
    let a = vertex(&mut model, g, 0.0, 0.0);
    let e = edge(&mut model, layer, a, outside);
    // Edge sits in the layer (common ancestor), move it into the group explicitly.
    model.add(g, e, None).unwrap();
    assert_eq!(model.parent(e), Some(g));

    model.remove(g).unwrap();
    assert_eq!(model.terminal(e, false), Some(outside));
    assert!(model.cell(outside).unwrap().edges().is_empty());

    model.add(layer, g, None).unwrap();
    assert_eq!(model.cell(outside).unwrap().edges(), &[e]);
    model.check_invariants().unwrap();
}

#[test]
fn release_frees_detached_cells() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer, 0.0, 0.0);
    assert!(matches!(model.release(a), Err(Error::Attached(_))));
    model.remove(a).unwrap();
    model.release(a).unwrap();
    assert!(model.cell(a).is_none());
    assert!(matches!(
        model.set_style(a, Some("x".to_string())),
        Err(Error::StaleCell(_))
    ));
}

#[test]
fn detached_geometry_is_written_without_history() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = model.create(Cell::vertex(Geometry::new(0.0, 0.0, 10.0, 10.0)));
    model
        .set_detached_geometry(a, Some(Geometry::new(5.0, 5.0, 10.0, 10.0)))
        .unwrap();
    assert!(!model.is_updating());
    assert_eq!(model.geometry(a).unwrap().x(), 5.0);

    model.add(layer, a, None).unwrap();
    assert!(matches!(
        model.set_detached_geometry(a, None),
        Err(Error::Attached(_))
    ));
}
