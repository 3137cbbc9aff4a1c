use narwhal::{Cell, CellId, CellKind, CellState, Geometry, Graph, GraphConfig, point};
use serde::{Deserialize, Serialize};
use rustc_hash::FxBuildHasher;
use serde_json::Value;
use std::io::Read;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Graph(narwhal::Error),
    Json(serde_json::Error),
    Scene(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Graph(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Scene(msg) => write!(f, "invalid scene: {msg}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<narwhal::Error> for CliError {
    fn from(value: narwhal::Error) -> Self {
        Self::Graph(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Render,
    Tree,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    pretty: bool,
    scale: Option<f64>,
    translate: Option<(f64, f64)>,
    config: Option<String>,
}

fn usage() -> &'static str {
    "narwhal-cli\n\
\n\
USAGE:\n\
  narwhal-cli [render] [--pretty] [--scale <s>] [--translate <dx>,<dy>] [--config <path>] [<path>|-]\n\
  narwhal-cli tree [--pretty] [--config <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', the scene is read from stdin.\n\
  - A scene is a JSON object with a \"cells\" array and an optional \"config\" object.\n\
  - render prints the validated cell states; tree prints the model tree.\n\
  - --config replaces the scene's \"config\" with the JSON file at <path>.\n\
  - Set NARWHAL_LOG (e.g. NARWHAL_LOG=debug) for logs on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "render" => args.command = Command::Render,
            "tree" => args.command = Command::Tree,
            "--pretty" => args.pretty = true,
            "--scale" => {
                let Some(scale) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                let scale = scale.parse::<f64>().map_err(|_| CliError::Usage(usage()))?;
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(CliError::Usage(usage()));
                }
                args.scale = Some(scale);
            }
            "--translate" => {
                let Some(raw) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                let Some((dx, dy)) = raw.split_once(',') else {
                    return Err(CliError::Usage(usage()));
                };
                let dx = dx.trim().parse::<f64>().map_err(|_| CliError::Usage(usage()))?;
                let dy = dy.trim().parse::<f64>().map_err(|_| CliError::Usage(usage()))?;
                args.translate = Some((dx, dy));
            }
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(path.clone());
            }
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            "-" => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some("-".to_string());
            }
            other if other.starts_with('-') => return Err(CliError::Usage(usage())),
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(std::io::stdout().lock(), value)?;
    } else {
        serde_json::to_writer(std::io::stdout().lock(), value)?;
    }
    println!();
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("NARWHAL_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // A subscriber installed by an embedding process wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------------------------
// Scene input.

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Scene {
    cells: Vec<SceneCell>,
    config: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SceneCell {
    id: Option<String>,
    parent: Option<String>,
    vertex: bool,
    edge: bool,
    source: Option<String>,
    target: Option<String>,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    relative: bool,
    points: Vec<[f64; 2]>,
    source_point: Option<[f64; 2]>,
    target_point: Option<[f64; 2]>,
    style: Option<String>,
    value: Value,
    collapsed: bool,
    visible: Option<bool>,
    connectable: Option<bool>,
}

impl SceneCell {
    fn to_cell(&self) -> Cell {
        let cell = if self.edge {
            let mut geo =
                Geometry::edge().with_points(self.points.iter().map(|&[x, y]| point(x, y)));
            geo.source_point = self.source_point.map(|[x, y]| point(x, y));
            geo.target_point = self.target_point.map(|[x, y]| point(x, y));
            Cell::edge().with_geometry(geo)
        } else if self.vertex {
            let mut geo = Geometry::new(self.x, self.y, self.width, self.height);
            geo.relative = self.relative;
            Cell::vertex(geo)
        } else {
            Cell::new()
        };
        let mut cell = cell
            .with_value(self.value.clone())
            .with_collapsed(self.collapsed)
            .with_visible(self.visible.unwrap_or(true))
            .with_connectable(self.connectable.unwrap_or(true));
        if let Some(id) = &self.id {
            cell = cell.with_id(id.clone());
        }
        if let Some(style) = &self.style {
            cell = cell.with_style(style.clone());
        }
        cell
    }
}

/// Parents must be listed before their children. Terminals may name any cell of the scene, or
/// one the model starts with.
fn check_references(graph: &Graph, scene: &Scene) -> Result<(), CliError> {
    let mut all: HashSet<&str> = HashSet::default();
    for cell in &scene.cells {
        if let Some(id) = cell.id.as_deref() {
            if !all.insert(id) || graph.cell_by_id(id).is_some() {
                return Err(CliError::Scene(format!("duplicate id {id:?}")));
            }
        }
    }
    let mut seen: HashSet<&str> = HashSet::default();
    for (i, cell) in scene.cells.iter().enumerate() {
        if cell.vertex && cell.edge {
            return Err(CliError::Scene(format!(
                "cell #{i} cannot be both a vertex and an edge"
            )));
        }
        if let Some(parent) = cell.parent.as_deref() {
            if !seen.contains(parent) && graph.cell_by_id(parent).is_none() {
                return Err(CliError::Scene(format!(
                    "cell #{i}: parent {parent:?} is unknown or listed after its child"
                )));
            }
        }
        for (what, r) in [("source", &cell.source), ("target", &cell.target)] {
            let Some(id) = r.as_deref() else {
                continue;
            };
            if !cell.edge {
                return Err(CliError::Scene(format!("cell #{i}: only edges have a {what}")));
            }
            if !all.contains(id) && graph.cell_by_id(id).is_none() {
                return Err(CliError::Scene(format!("cell #{i}: unknown {what} {id:?}")));
            }
        }
        if let Some(id) = cell.id.as_deref() {
            seen.insert(id);
        }
    }
    Ok(())
}

/// Inserts the scene as a single edit. References resolve to the cells the scene created, even
/// when the model renames an explicit id that collides with a generated one.
fn load_scene(graph: &mut Graph, scene: &Scene) -> Result<(), CliError> {
    check_references(graph, scene)?;
    graph.batch(|g| {
        let mut by_id: HashMap<&str, CellId> = HashMap::default();
        let mut added: Vec<CellId> = Vec::with_capacity(scene.cells.len());
        for cell in &scene.cells {
            let parent = match cell.parent.as_deref() {
                Some(id) => resolve(g, &by_id, id),
                None => None,
            }
            .unwrap_or_else(|| g.default_parent());
            let id = g.model_mut().create(cell.to_cell());
            g.model_mut().add(parent, id, None)?;
            if let Some(scene_id) = cell.id.as_deref() {
                by_id.insert(scene_id, id);
            }
            added.push(id);
        }
        for (cell, &id) in scene.cells.iter().zip(&added) {
            let source = cell.source.as_deref().and_then(|s| resolve(g, &by_id, s));
            let target = cell.target.as_deref().and_then(|t| resolve(g, &by_id, t));
            if source.is_some() || target.is_some() {
                g.model_mut().set_terminals(id, source, target)?;
            }
        }
        let renamed = scene
            .cells
            .iter()
            .zip(&added)
            .filter(|&(cell, &id)| {
                cell.id.is_some() && g.model().cell(id).and_then(|c| c.id()) != cell.id.as_deref()
            })
            .count();
        if renamed > 0 {
            tracing::warn!(renamed, "scene ids collided with generated ids and were renamed");
        }
        tracing::debug!(cells = added.len(), "scene loaded");
        Ok(())
    })?;
    Ok(())
}

/// Scene ids first, then cells the model started with.
fn resolve(graph: &Graph, by_id: &HashMap<&str, CellId>, id: &str) -> Option<CellId> {
    by_id.get(id).copied().or_else(|| graph.cell_by_id(id))
}

// ---------------------------------------------------------------------------------------------
// Output.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(flatten)]
    state: &'a CellState,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderOut<'a> {
    scale: f64,
    translate: [f64; 2],
    graph_bounds: [f64; 4],
    states: Vec<StateOut<'a>>,
}

fn render_out(graph: &Graph) -> RenderOut<'_> {
    let model = graph.model();
    let states = model
        .descendants(model.root())
        .into_iter()
        .filter_map(|cell| {
            let state = graph.state(cell)?;
            Some(StateOut {
                id: model.cell(cell).and_then(|c| c.id()),
                state,
            })
        })
        .collect();
    let view = graph.view();
    let b = graph.graph_bounds();
    RenderOut {
        scale: view.scale(),
        translate: [view.translate().x, view.translate().y],
        graph_bounds: [b.origin.x, b.origin.y, b.size.width, b.size.height],
        states,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TreeNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    kind: CellKind,
    #[serde(skip_serializing_if = "Value::is_null")]
    value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometry: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    collapsed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    hidden: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
}

fn tree_node(graph: &Graph, cell: CellId) -> Option<TreeNode> {
    let model = graph.model();
    let data = model.cell(cell)?;
    let id_of = |c: Option<CellId>| {
        c.and_then(|c| model.cell(c))
            .and_then(|d| d.id())
            .map(str::to_string)
    };
    Some(TreeNode {
        id: data.id().map(str::to_string),
        kind: data.kind(),
        value: data.value().clone(),
        style: data.style().map(str::to_string),
        geometry: data.geometry().cloned(),
        source: id_of(data.source()),
        target: id_of(data.target()),
        collapsed: data.is_collapsed(),
        hidden: !data.is_visible(),
        children: data
            .children()
            .iter()
            .filter_map(|&c| tree_node(graph, c))
            .collect(),
    })
}

fn load_config(args: &Args, scene: &Scene) -> Result<GraphConfig, CliError> {
    if let Some(path) = args.config.as_deref() {
        return Ok(GraphConfig::from_json_str(&std::fs::read_to_string(path)?)?);
    }
    match scene.config.clone() {
        Some(value) => Ok(GraphConfig::from_json_value(value)?),
        None => Ok(GraphConfig::default()),
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let text = read_input(args.input.as_deref())?;
    let scene: Scene = serde_json::from_str(&text)?;
    let config = load_config(&args, &scene)?;

    let mut graph = Graph::with_config(config);
    load_scene(&mut graph, &scene)?;

    match args.command {
        Command::Render => {
            if args.scale.is_some() || args.translate.is_some() {
                let (dx, dy) = args.translate.unwrap_or((0.0, 0.0));
                graph.scale_and_translate(args.scale.unwrap_or(1.0), dx, dy);
            }
            write_json(&render_out(&graph), args.pretty)
        }
        Command::Tree => {
            let root = tree_node(&graph, graph.model().root());
            write_json(&root, args.pretty)
        }
    }
}

fn main() {
    init_tracing();
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
