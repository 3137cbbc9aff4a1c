use narwhal_model::{Cell, CellId, Geometry, Model};
use narwhal_view::{CellRenderer, CellState, GraphView, Shape, ShapeRegistry};

#[derive(Debug, Default)]
struct Canvas {
    ops: Vec<(String, CellId)>,
}

struct Recorder(&'static str);

impl Shape<Canvas> for Recorder {
    fn paint(&self, ctx: &mut Canvas, state: &CellState) {
        ctx.ops.push((format!("paint {}", self.0), state.cell));
    }

    fn destroy(&self, ctx: &mut Canvas, cell: CellId) {
        ctx.ops.push((format!("destroy {}", self.0), cell));
    }
}

fn registry() -> ShapeRegistry<Canvas> {
    ShapeRegistry::new()
        .with("rectangle", Recorder("rectangle"))
        .with("connector", Recorder("connector"))
        .with("ellipse", |c: &mut Canvas, s: &CellState| {
            c.ops.push(("paint ellipse".to_string(), s.cell))
        })
}

fn scene() -> (Model, CellId, CellId, CellId) {
    let mut model = Model::new();
    let layer = model.default_parent();
    let a = model.create(Cell::vertex(Geometry::new(0.0, 0.0, 40.0, 40.0)));
    model.add(layer, a, None).unwrap();
    let b = model.create(
        Cell::vertex(Geometry::new(100.0, 0.0, 40.0, 40.0)).with_style("shape=ellipse"),
    );
    model.add(layer, b, None).unwrap();
    let e = model.create(Cell::edge());
    model.add(layer, e, None).unwrap();
    model.set_terminals(e, Some(a), Some(b)).unwrap();
    (model, a, b, e)
}

fn commit(
    model: &mut Model,
    view: &mut GraphView,
    f: impl FnOnce(&mut Model) -> narwhal_model::Result<()>,
) {
    model.begin_update();
    f(model).unwrap();
    let edit = model.end_update().unwrap().unwrap();
    view.model_changed(model, edit.changes());
    view.validate(model);
}

#[test]
fn first_render_paints_everything_in_validation_order() {
    let (model, a, b, e) = scene();
    let mut view = GraphView::new();
    view.validate(&model);
    let mut renderer = CellRenderer::new(registry());
    let mut canvas = Canvas::default();

    let report = renderer.render(&mut view, &mut canvas);
    assert_eq!(report.painted, vec![a, b, e]);
    assert_eq!(report.fallbacks, 0);
    assert_eq!(
        canvas.ops,
        vec![
            ("paint rectangle".to_string(), a),
            ("paint ellipse".to_string(), b),
            ("paint connector".to_string(), e),
        ]
    );

    let again = renderer.render(&mut view, &mut canvas);
    assert!(again.painted.is_empty() && again.removed.is_empty());
}

#[test]
fn only_changed_states_are_repainted() {
    let (mut model, a, _b, e) = scene();
    let mut view = GraphView::new();
    view.validate(&model);
    let mut renderer = CellRenderer::new(registry());
    let mut canvas = Canvas::default();
    renderer.render(&mut view, &mut canvas);

    commit(&mut model, &mut view, |m| {
        m.set_geometry(a, Some(Geometry::new(0.0, 30.0, 40.0, 40.0)))
    });
    let report = renderer.render(&mut view, &mut canvas);
    assert_eq!(report.painted, vec![a, e]);

    // A style change that resolves to the same output paints nothing.
    commit(&mut model, &mut view, |m| m.set_style(a, Some("shape=rectangle".into())));
    let report = renderer.render(&mut view, &mut canvas);
    assert!(report.painted.is_empty());
}

#[test]
fn unknown_shapes_fall_back_to_the_default() {
    let (mut model, a, _b, _e) = scene();
    let mut view = GraphView::new();
    view.validate(&model);
    let mut renderer = CellRenderer::new(registry());
    let mut canvas = Canvas::default();
    renderer.render(&mut view, &mut canvas);
    canvas.ops.clear();

    commit(&mut model, &mut view, |m| m.set_style(a, Some("shape=cloud".into())));
    let report = renderer.render(&mut view, &mut canvas);
    assert_eq!(report.painted, vec![a]);
    assert_eq!(report.fallbacks, 1);
    assert_eq!(canvas.ops, vec![("paint rectangle".to_string(), a)]);
}

#[test]
fn switching_shapes_destroys_the_old_one() {
    let (mut model, a, _b, _e) = scene();
    let mut view = GraphView::new();
    view.validate(&model);
    let mut renderer = CellRenderer::new(registry());
    let mut canvas = Canvas::default();
    renderer.render(&mut view, &mut canvas);
    canvas.ops.clear();

    commit(&mut model, &mut view, |m| m.set_style(a, Some("shape=ellipse".into())));
    renderer.render(&mut view, &mut canvas);
    assert_eq!(
        canvas.ops,
        vec![
            ("destroy rectangle".to_string(), a),
            ("paint ellipse".to_string(), a),
        ]
    );
}

#[test]
fn removed_cells_are_destroyed() {
    let (mut model, a, _b, e) = scene();
    let mut view = GraphView::new();
    view.validate(&model);
    let mut renderer = CellRenderer::new(registry());
    let mut canvas = Canvas::default();
    renderer.render(&mut view, &mut canvas);
    canvas.ops.clear();

    commit(&mut model, &mut view, |m| m.remove(a));
    let report = renderer.render(&mut view, &mut canvas);
    assert_eq!(report.removed, vec![a, e]);
    assert!(report.painted.is_empty());
    assert!(!renderer.is_drawn(a));
    assert_eq!(
        canvas.ops,
        vec![
            ("destroy rectangle".to_string(), a),
            ("destroy connector".to_string(), e),
        ]
    );
}

#[test]
fn missing_default_shape_skips_the_cell() {
    let (model, a, b, e) = scene();
    let mut view = GraphView::new();
    view.validate(&model);
    let mut renderer =
        CellRenderer::new(ShapeRegistry::new().with("rectangle", Recorder("rectangle")));
    let mut canvas = Canvas::default();

    let report = renderer.render(&mut view, &mut canvas);
    assert_eq!(report.painted, vec![a, b]);
    // `b` asks for an unregistered ellipse, `e` for the missing connector.
    assert_eq!(report.fallbacks, 2);
    assert!(!renderer.is_drawn(e));
}
