use std::collections::HashMap;

use crate::error::Result;
use crate::geom::{Matrix, parse_transform};
use crate::gradient::GradientGeometry;
use crate::path::{PathCommand, parse_path_data};
use crate::style::{Style, StyleKey};
use crate::types::Point;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const INKSCAPE_NS: &str = "http://www.inkscape.org/namespaces/inkscape";
pub const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// Circle approximation constant for four cubic quarter arcs.
const KAPPA: f64 = 0.5522847498;

/// Presentation attributes folded into an element's style before its `style` attribute.
const PRESENTATION_ATTRIBUTES: [&str; 19] = [
    "fill",
    "fill-opacity",
    "fill-rule",
    "stroke",
    "stroke-width",
    "stroke-opacity",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-dasharray",
    "stroke-dashoffset",
    "marker",
    "marker-start",
    "marker-mid",
    "marker-end",
    "opacity",
    "filter",
    "stop-color",
    "stop-opacity",
];

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Container(Container),
    Shape(Shape),
    Ignorable(Ignorable),
}

/// Nodes that never draw anything.
#[derive(Debug, Clone, PartialEq)]
pub enum Ignorable {
    NamedView,
    Metadata,
    Definitions,
    Unsupported(String),
}

/// A group of nodes (`g`, `a`, or an unlinked `use`).
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub id: Option<String>,
    /// `None` when the container carries no style at all.
    pub style: Option<Style>,
    pub transform: Matrix,
    /// Set for Inkscape layers (`inkscape:groupmode="layer"`).
    pub is_layer: bool,
    pub label: Option<String>,
    pub children: Vec<SceneNode>,
}

impl Container {
    pub fn new(children: Vec<SceneNode>) -> Self {
        Self {
            id: None,
            style: None,
            transform: Matrix::identity(),
            is_layer: false,
            label: None,
            children,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: String,
    pub style: Style,
    pub transform: Matrix,
    pub commands: Vec<PathCommand>,
    /// Per-vertex smoothness hints (`sodipodi:nodetypes`).
    pub node_types: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopDef {
    pub offset: f64,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopsDef {
    Stops(Vec<StopDef>),
    Link(String),
}

/// A gradient element as written in the document, before colors are extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientDef {
    pub id: String,
    pub geometry: GradientGeometry,
    pub matrix: Matrix,
    pub stops: StopsDef,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvgDocument {
    /// Root `width`, in pixels.
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Text of a `<title>` child of the root.
    pub title: Option<String>,
    pub docname: Option<String>,
    pub nodes: Vec<SceneNode>,
    pub gradients: Vec<GradientDef>,
}

/// Parses SVG text into a scene tree.
///
/// Basic shapes become path commands and `<use>` references become containers holding a
/// copy of their target, so the tree only contains paths and groups.
pub fn parse_svg(text: &str) -> Result<SvgDocument> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();

    let mut loader = Loader {
        id_map: build_id_map(&doc),
        use_stack: Vec::new(),
        generated: HashMap::new(),
    };
    let nodes = loader.load_children(root)?;
    let gradients = loader.collect_gradients(&doc);

    let title = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "title")
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string());

    log::debug!(
        "loaded svg with {} top-level nodes and {} gradients",
        nodes.len(),
        gradients.len()
    );

    Ok(SvgDocument {
        width: root.attribute("width").map(crate::style::parse_dimension),
        height: root.attribute("height").map(crate::style::parse_dimension),
        title,
        docname: root.attribute((SODIPODI_NS, "docname")).map(str::to_string),
        nodes,
        gradients,
    })
}

struct Loader<'a, 'input: 'a> {
    id_map: HashMap<String, roxmltree::Node<'a, 'input>>,
    /// Ids of the `<use>` targets being expanded, innermost last.
    use_stack: Vec<String>,
    generated: HashMap<String, usize>,
}

impl<'a, 'input: 'a> Loader<'a, 'input> {
    fn load_children(&mut self, node: roxmltree::Node<'a, 'input>) -> Result<Vec<SceneNode>> {
        let mut out = Vec::new();
        for child in node.children().filter(|n| n.is_element()) {
            if let Some(scene) = self.load_node(child)? {
                out.push(scene);
            }
        }
        Ok(out)
    }

    fn load_node(&mut self, node: roxmltree::Node<'a, 'input>) -> Result<Option<SceneNode>> {
        let tag = node.tag_name();
        if tag.namespace() == Some(SODIPODI_NS) && tag.name() == "namedview" {
            return Ok(Some(SceneNode::Ignorable(Ignorable::NamedView)));
        }
        if !matches!(tag.namespace(), None | Some(SVG_NS)) {
            log::warn!("skipping foreign element `{}`", tag.name());
            return Ok(Some(SceneNode::Ignorable(Ignorable::Unsupported(
                tag.name().to_string(),
            ))));
        }

        let name = tag.name();
        let commands = match name {
            "metadata" | "title" | "desc" => {
                return Ok(Some(SceneNode::Ignorable(Ignorable::Metadata)));
            }
            "defs" => return Ok(Some(SceneNode::Ignorable(Ignorable::Definitions))),
            "g" | "a" => {
                let children = self.load_children(node)?;
                return Ok(Some(SceneNode::Container(self.container(node, children))));
            }
            "use" => return self.load_use(node),
            "path" => match node.attribute("d") {
                Some(d) => Some(parse_path_data(d)?),
                None => None,
            },
            "rect" => rect_to_path(node),
            "circle" => {
                let r = length(node, "r", 0.0);
                ellipse_to_path(length(node, "cx", 0.0), length(node, "cy", 0.0), r, r)
            }
            "ellipse" => ellipse_to_path(
                length(node, "cx", 0.0),
                length(node, "cy", 0.0),
                length(node, "rx", 0.0),
                length(node, "ry", 0.0),
            ),
            "line" => Some(vec![
                PathCommand::MoveTo(Point::new(length(node, "x1", 0.0), length(node, "y1", 0.0))),
                PathCommand::LineTo(Point::new(length(node, "x2", 0.0), length(node, "y2", 0.0))),
            ]),
            "polyline" => poly_to_path(node, false),
            "polygon" => poly_to_path(node, true),
            other => {
                log::warn!("skipping unsupported element `{other}`");
                return Ok(Some(SceneNode::Ignorable(Ignorable::Unsupported(
                    other.to_string(),
                ))));
            }
        };

        let Some(commands) = commands.filter(|c| !c.is_empty()) else {
            log::debug!("skipping `{name}` without geometry");
            return Ok(None);
        };

        let id = match node.attribute("id") {
            Some(id) => id.to_string(),
            None => self.generate_id(name),
        };
        Ok(Some(SceneNode::Shape(Shape {
            id,
            style: read_style(node),
            transform: read_transform(node),
            commands,
            node_types: node
                .attribute((SODIPODI_NS, "nodetypes"))
                .map(str::to_string),
        })))
    }

    fn container(
        &self,
        node: roxmltree::Node<'a, 'input>,
        children: Vec<SceneNode>,
    ) -> Container {
        let style = read_style(node);
        Container {
            id: node.attribute("id").map(str::to_string),
            style: (!style.is_empty()).then_some(style),
            transform: read_transform(node),
            is_layer: node.attribute((INKSCAPE_NS, "groupmode")) == Some("layer"),
            label: node.attribute((INKSCAPE_NS, "label")).map(str::to_string),
            children,
        }
    }

    /// Replaces a `<use>` by a container holding a copy of its target.
    fn load_use(&mut self, node: roxmltree::Node<'a, 'input>) -> Result<Option<SceneNode>> {
        let Some(target_id) = href_id(node) else {
            log::warn!("skipping <use> without a local reference");
            return Ok(None);
        };
        let Some(target) = self.id_map.get(&target_id).copied() else {
            log::warn!("skipping <use> of unknown element `#{target_id}`");
            return Ok(None);
        };
        if self.use_stack.contains(&target_id) {
            log::warn!("skipping recursive <use> of `#{target_id}`");
            return Ok(None);
        }

        self.use_stack.push(target_id);
        let copy = self.load_node(target);
        self.use_stack.pop();
        let Some(copy) = copy? else {
            return Ok(None);
        };

        let offset = Matrix::translate(length(node, "x", 0.0), length(node, "y", 0.0));
        let mut container = self.container(node, vec![copy]);
        container.transform = container.transform.mul(offset);
        Ok(Some(SceneNode::Container(container)))
    }

    fn generate_id(&mut self, tag: &str) -> String {
        let n = self.generated.entry(tag.to_string()).or_insert(0);
        *n += 1;
        format!("{tag}{n}")
    }

    fn collect_gradients(&mut self, doc: &'a roxmltree::Document<'input>) -> Vec<GradientDef> {
        let mut out = Vec::new();
        for node in doc.descendants().filter(|n| n.is_element()) {
            let name = node.tag_name().name();
            let geometry = match name {
                "linearGradient" => GradientGeometry::Linear {
                    p1: Point::new(length(node, "x1", 0.0), length(node, "y1", 0.0)),
                    p2: Point::new(length(node, "x2", 0.0), length(node, "y2", 0.0)),
                },
                "radialGradient" => GradientGeometry::Radial {
                    center: Point::new(length(node, "cx", 0.0), length(node, "cy", 0.0)),
                    radius: length(node, "r", 0.0),
                    focus: Point::new(length(node, "fx", 0.0), length(node, "fy", 0.0)),
                },
                _ => continue,
            };
            let id = match node.attribute("id") {
                Some(id) => id.to_string(),
                None => self.generate_id(name),
            };
            let matrix = node
                .attribute("gradientTransform")
                .map(parse_transform)
                .unwrap_or_default();
            let stops = match href_id(node) {
                Some(link) => StopsDef::Link(link),
                None => StopsDef::Stops(read_stops(node)),
            };
            out.push(GradientDef {
                id,
                geometry,
                matrix,
                stops,
            });
        }
        out
    }
}

fn build_id_map<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> HashMap<String, roxmltree::Node<'a, 'input>> {
    let mut out = HashMap::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if let Some(id) = node.attribute("id") {
            // First wins.
            out.entry(id.to_string()).or_insert(node);
        }
    }
    out
}

fn href_id(node: roxmltree::Node<'_, '_>) -> Option<String> {
    let raw = node
        .attribute("href")
        .or_else(|| node.attribute((XLINK_NS, "href")))?;
    let raw = raw.trim().trim_matches('"').trim_matches('\'');
    let id = raw.strip_prefix('#')?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

/// Presentation attributes overlaid with the `style` attribute.
fn read_style(node: roxmltree::Node<'_, '_>) -> Style {
    let mut style = Style::new();
    for name in PRESENTATION_ATTRIBUTES {
        if let Some(value) = node.attribute(name) {
            style.set(StyleKey::parse(name), value.trim());
        }
    }
    match node.attribute("style") {
        Some(raw) => style.merged(&Style::parse(raw)),
        None => style,
    }
}

fn read_transform(node: roxmltree::Node<'_, '_>) -> Matrix {
    node.attribute("transform")
        .map(parse_transform)
        .unwrap_or_default()
}

fn read_stops(node: roxmltree::Node<'_, '_>) -> Vec<StopDef> {
    let mut stops = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() != "stop" {
            log::warn!(
                "ignoring <{}> inside gradient; only stops are allowed",
                child.tag_name().name()
            );
            continue;
        }
        let Some(offset) = parse_stop_offset(child.attribute("offset")) else {
            log::warn!("ignoring gradient stop without a usable offset");
            continue;
        };
        stops.push(StopDef {
            offset,
            style: read_style(child),
        });
    }
    stops
}

fn parse_stop_offset(input: Option<&str>) -> Option<f64> {
    let s = input?.trim();
    if let Some(p) = s.strip_suffix('%') {
        let v = p.trim().parse::<f64>().ok()?;
        return Some((v / 100.0).clamp(0.0, 1.0));
    }
    let v = s.parse::<f64>().ok()?;
    Some(v.clamp(0.0, 1.0))
}

fn length(node: roxmltree::Node<'_, '_>, name: &str, default: f64) -> f64 {
    node.attribute(name)
        .and_then(|v| v.trim().trim_end_matches("px").parse::<f64>().ok())
        .unwrap_or(default)
}

fn rect_to_path(node: roxmltree::Node<'_, '_>) -> Option<Vec<PathCommand>> {
    let x = length(node, "x", 0.0);
    let y = length(node, "y", 0.0);
    let w = length(node, "width", 0.0);
    let h = length(node, "height", 0.0);
    if w <= 0.0 || h <= 0.0 {
        return None;
    }

    let rx_attr = node.attribute("rx").map(|_| length(node, "rx", 0.0));
    let ry_attr = node.attribute("ry").map(|_| length(node, "ry", 0.0));
    let (rx, ry) = match (rx_attr, ry_attr) {
        (Some(rx), Some(ry)) => (rx, ry),
        (Some(r), None) | (None, Some(r)) => (r, r),
        (None, None) => (0.0, 0.0),
    };
    let rx = rx.clamp(0.0, w / 2.0);
    let ry = ry.clamp(0.0, h / 2.0);

    let pt = Point::new;
    if rx <= 0.0 || ry <= 0.0 {
        return Some(vec![
            PathCommand::MoveTo(pt(x, y)),
            PathCommand::LineTo(pt(x + w, y)),
            PathCommand::LineTo(pt(x + w, y + h)),
            PathCommand::LineTo(pt(x, y + h)),
            PathCommand::ClosePath,
        ]);
    }

    let corner = |to: Point| PathCommand::ArcTo {
        rx,
        ry,
        x_axis_rotation: 0.0,
        large_arc: false,
        sweep: true,
        to,
    };
    Some(vec![
        PathCommand::MoveTo(pt(x + rx, y)),
        PathCommand::LineTo(pt(x + w - rx, y)),
        corner(pt(x + w, y + ry)),
        PathCommand::LineTo(pt(x + w, y + h - ry)),
        corner(pt(x + w - rx, y + h)),
        PathCommand::LineTo(pt(x + rx, y + h)),
        corner(pt(x, y + h - ry)),
        PathCommand::LineTo(pt(x, y + ry)),
        corner(pt(x + rx, y)),
        PathCommand::ClosePath,
    ])
}

fn ellipse_to_path(cx: f64, cy: f64, rx: f64, ry: f64) -> Option<Vec<PathCommand>> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let ox = rx * KAPPA;
    let oy = ry * KAPPA;
    let pt = Point::new;
    Some(vec![
        PathCommand::MoveTo(pt(cx + rx, cy)),
        PathCommand::CubicTo(pt(cx + rx, cy + oy), pt(cx + ox, cy + ry), pt(cx, cy + ry)),
        PathCommand::CubicTo(pt(cx - ox, cy + ry), pt(cx - rx, cy + oy), pt(cx - rx, cy)),
        PathCommand::CubicTo(pt(cx - rx, cy - oy), pt(cx - ox, cy - ry), pt(cx, cy - ry)),
        PathCommand::CubicTo(pt(cx + ox, cy - ry), pt(cx + rx, cy - oy), pt(cx + rx, cy)),
        PathCommand::ClosePath,
    ])
}

fn poly_to_path(node: roxmltree::Node<'_, '_>, close: bool) -> Option<Vec<PathCommand>> {
    let nums = crate::geom::parse_number_list(node.attribute("points")?);
    let points: Vec<Point> = nums
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0], pair[1]))
        .collect();
    let (first, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut out = vec![PathCommand::MoveTo(*first)];
    out.extend(rest.iter().map(|p| PathCommand::LineTo(*p)));
    if close {
        out.push(PathCommand::ClosePath);
    }
    Some(out)
}
