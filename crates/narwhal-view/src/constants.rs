//! Style keys and well-known values.

pub const NONE: &str = "none";

pub const STYLE_SHAPE: &str = "shape";
pub const STYLE_PERIMETER: &str = "perimeter";
pub const STYLE_PERIMETER_SPACING: &str = "perimeterSpacing";
pub const STYLE_SOURCE_PERIMETER_SPACING: &str = "sourcePerimeterSpacing";
pub const STYLE_TARGET_PERIMETER_SPACING: &str = "targetPerimeterSpacing";
pub const STYLE_SOURCE_PORT: &str = "sourcePort";
pub const STYLE_TARGET_PORT: &str = "targetPort";

pub const STYLE_EXIT_X: &str = "exitX";
pub const STYLE_EXIT_Y: &str = "exitY";
pub const STYLE_EXIT_DX: &str = "exitDx";
pub const STYLE_EXIT_DY: &str = "exitDy";
pub const STYLE_EXIT_PERIMETER: &str = "exitPerimeter";
pub const STYLE_ENTRY_X: &str = "entryX";
pub const STYLE_ENTRY_Y: &str = "entryY";
pub const STYLE_ENTRY_DX: &str = "entryDx";
pub const STYLE_ENTRY_DY: &str = "entryDy";
pub const STYLE_ENTRY_PERIMETER: &str = "entryPerimeter";

pub const STYLE_EDGE: &str = "edgeStyle";
pub const STYLE_LOOP: &str = "loop";
pub const STYLE_NOEDGESTYLE: &str = "noEdgeStyle";
pub const STYLE_ORTHOGONAL_LOOP: &str = "orthogonalLoop";
pub const STYLE_SEGMENT: &str = "segment";
pub const STYLE_DIRECTION: &str = "direction";

pub const STYLE_FLIPH: &str = "flipH";
pub const STYLE_FLIPV: &str = "flipV";
pub const STYLE_FOLDABLE: &str = "foldable";

pub const STYLE_FILLCOLOR: &str = "fillColor";
pub const STYLE_GRADIENTCOLOR: &str = "gradientColor";
pub const STYLE_STROKECOLOR: &str = "strokeColor";
pub const STYLE_FONTCOLOR: &str = "fontColor";
pub const STYLE_LABEL_BORDERCOLOR: &str = "labelBorderColor";
pub const STYLE_LABEL_BACKGROUNDCOLOR: &str = "labelBackgroundColor";
pub const STYLE_INDICATOR_COLOR: &str = "indicatorColor";

pub const STYLE_FONTSIZE: &str = "fontSize";
pub const STYLE_FONTFAMILY: &str = "fontFamily";
pub const STYLE_FONTSTYLE: &str = "fontStyle";
pub const STYLE_ALIGN: &str = "align";
pub const STYLE_VERTICAL_ALIGN: &str = "verticalAlign";
pub const STYLE_LABEL_POSITION: &str = "labelPosition";
pub const STYLE_VERTICAL_LABEL_POSITION: &str = "verticalLabelPosition";
pub const STYLE_LABEL_WIDTH: &str = "labelWidth";
pub const STYLE_SPACING: &str = "spacing";
pub const STYLE_NOLABEL: &str = "noLabel";

pub const ALIGN_LEFT: &str = "left";
pub const ALIGN_CENTER: &str = "center";
pub const ALIGN_RIGHT: &str = "right";
pub const ALIGN_TOP: &str = "top";
pub const ALIGN_MIDDLE: &str = "middle";
pub const ALIGN_BOTTOM: &str = "bottom";

pub const SHAPE_RECTANGLE: &str = "rectangle";
pub const SHAPE_ELLIPSE: &str = "ellipse";
pub const SHAPE_RHOMBUS: &str = "rhombus";
pub const SHAPE_SWIMLANE: &str = "swimlane";
pub const SHAPE_CONNECTOR: &str = "connector";

pub const EDGESTYLE_LOOP: &str = "loopEdgeStyle";

pub const DIRECTION_NORTH: &str = "north";
pub const DIRECTION_SOUTH: &str = "south";
pub const DIRECTION_EAST: &str = "east";
pub const DIRECTION_WEST: &str = "west";

pub const PERIMETER_RECTANGLE: &str = "rectanglePerimeter";
pub const PERIMETER_ELLIPSE: &str = "ellipsePerimeter";
pub const PERIMETER_RHOMBUS: &str = "rhombusPerimeter";

/// Colour placeholders resolved against other states after the style is computed.
pub const COLOR_INHERIT: &str = "inherit";
pub const COLOR_SWIMLANE: &str = "swimlane";
pub const COLOR_INDICATED: &str = "indicated";

pub const DEFAULT_FONTSIZE: f64 = 11.0;
pub const DEFAULT_FONTFAMILY: &str = "Arial,Helvetica";
pub const LABEL_SPACING: f64 = 2.0;
pub const FOLDING_CONTROL_SIZE: f64 = 9.0;
/// Loop segment length when the style sets none.
pub const DEFAULT_LOOP_SEGMENT: f64 = 10.0;
