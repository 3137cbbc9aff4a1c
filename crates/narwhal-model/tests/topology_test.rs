use narwhal_model::topology::{
    clone_cells, clone_cells_with_mapping, descendants_of, filter_descendants, opposites, parents,
    topmost_cells,
};
use narwhal_model::{Cell, CellId, CloneMapping, Error, Geometry, Model};
use serde_json::json;

fn vertex(model: &mut Model, parent: CellId) -> CellId {
    let v = model.create(
        Cell::vertex(Geometry::new(10.0, 10.0, 40.0, 20.0))
            .with_value(json!({"label": "v"}))
            .with_style("rounded=1"),
    );
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
fn topmost_cells_drop_descendants_regardless_of_order() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer);
    let child = vertex(&mut model, a);
    let grandchild = vertex(&mut model, child);
    let b = vertex(&mut model, layer);

    assert_eq!(topmost_cells(&model, &[a, child, b]), vec![a, b]);
    assert_eq!(topmost_cells(&model, &[child, b, a]), vec![b, a]);
    assert_eq!(topmost_cells(&model, &[grandchild, a]), vec![a]);
}

#[test]
fn opposites_skip_loops_and_respect_direction() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer);
    let b = vertex(&mut model, layer);
    let c = vertex(&mut model, layer);
    let ab = edge(&mut model, layer, a, b);
    let ca = edge(&mut model, layer, c, a);
    let aa = edge(&mut model, layer, a, a);
    let edges = [ab, ca, aa];

    assert_eq!(opposites(&model, &edges, a, true, true), vec![b, c]);
    assert_eq!(opposites(&model, &edges, a, false, true), vec![b]);
    assert_eq!(opposites(&model, &edges, a, true, false), vec![c]);
}

#[test]
fn parents_are_distinct() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer);
    let b = vertex(&mut model, layer);
    let c = vertex(&mut model, a);
    assert_eq!(parents(&model, &[a, b, c]), vec![layer, a]);
}

#[test]
fn cloned_edges_between_cloned_cells_are_rewired() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer);
    let b = vertex(&mut model, layer);
    let e = edge(&mut model, layer, a, b);

    let result = clone_cells(&mut model, &[a, b, e], true).unwrap();
    let ca = result.mapping[&a];
    let cb = result.mapping[&b];
    let ce = result.mapping[&e];
    assert_eq!(result.clones, vec![ca, cb, ce]);

    assert_eq!(model.terminal(ce, true), Some(ca));
    assert_eq!(model.terminal(ce, false), Some(cb));
    assert_eq!(model.style(ca), Some("rounded=1"));
    assert_eq!(model.value(ca), Some(&json!({"label": "v"})));
    assert_eq!(model.cell(ca).unwrap().id(), None);
    assert!(!model.contains(ca));
}

#[test]
fn cloned_edges_keep_unmapped_terminals() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer);
    let x = vertex(&mut model, layer);
    let e = edge(&mut model, layer, a, x);

    let result = clone_cells(&mut model, &[a, e], true).unwrap();
    let ca = result.mapping[&a];
    let ce = result.mapping[&e];
    assert_eq!(model.terminal(ce, true), Some(ca));
    assert_eq!(model.terminal(ce, false), Some(x));
    // Not listed by x until the clone joins the model.
    assert_eq!(model.cell(x).unwrap().edges(), &[e]);

    model.add(layer, ca, None).unwrap();
    model.add(layer, ce, None).unwrap();
    assert_eq!(model.cell(x).unwrap().edges(), &[e, ce]);
    assert_eq!(model.cell(ca).unwrap().edges(), &[ce]);
    model.check_invariants().unwrap();
}

#[test]
fn cloning_a_group_clones_its_children_and_inner_edges() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let g = vertex(&mut model, layer);
    let a = vertex(&mut model, g);
    let b = vertex(&mut model, g);
    let e = edge(&mut model, layer, a, b);
    assert_eq!(model.parent(e), Some(g));

    let result = clone_cells(&mut model, &[g], true).unwrap();
    let cg = result.clones[0];
    let ca = result.mapping[&a];
    let cb = result.mapping[&b];
    let ce = result.mapping[&e];
    assert_eq!(model.children(cg), &[ca, cb, ce]);
    assert_eq!(model.terminal(ce, true), Some(ca));
    assert_eq!(model.terminal(ce, false), Some(cb));

    let shallow = clone_cells(&mut model, &[g], false).unwrap();
    assert!(model.children(shallow.clones[0]).is_empty());
}

#[test]
fn conflicting_mappings_are_rejected() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer);
    let b = vertex(&mut model, layer);
    let target = model.create(Cell::new());
    let mut mapping = CloneMapping::default();
    mapping.insert(a, target);
    mapping.insert(b, target);
    assert_eq!(
        clone_cells_with_mapping(&mut model, &[a, b], true, &mut mapping),
        Err(Error::ConflictingMapping(target))
    );
}

#[test]
fn descendant_walks_are_preorder_and_deduplicated() {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = vertex(&mut model, layer);
    let a1 = vertex(&mut model, a);
    let b = vertex(&mut model, layer);
    let ab = edge(&mut model, layer, a1, b);

    assert_eq!(descendants_of(&model, &[a, a1, b]), vec![a, a1, b]);
    let edges = filter_descendants(&model, model.root(), |c| model.is_edge(c));
    assert_eq!(edges, vec![ab]);
    let vertices = filter_descendants(&model, layer, |c| model.is_vertex(c));
    assert_eq!(vertices, vec![a, a1, b]);
}
