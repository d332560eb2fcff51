use serde_json::json;

use crate::bline::Interpreter;
use crate::coords::{CoordMapper, PIXELS_PER_UNIT};
use crate::debug::DebugLogger;
use crate::error::Result;
use crate::geom::Matrix;
use crate::gradient::{GradientGeometry, GradientStops, GradientTable, StopSource};
use crate::layer::{LayerDescriptor, color_overlay, encapsulate, transform_warp};
use crate::prepare::prepare;
use crate::scene::{Container, GradientDef, SceneNode, Shape, StopsDef, SvgDocument};
use crate::schema::ParamValue;
use crate::sif::{self, Element};
use crate::style::{Paint, Style, StyleKey, extract_color, parse_dimension};
use crate::types::{Color, Size};

pub const DEFAULT_GAMMA: f64 = 2.2;
pub const DEFAULT_NAME: &str = "Synfig Animation 1";

/// A converted document, ready to be rendered as markup.
#[derive(Debug, Clone, PartialEq)]
pub struct SifDocument {
    pub width: f64,
    pub height: f64,
    pub name: String,
    pub pixels_per_unit: f64,
    pub layers: Vec<LayerDescriptor>,
}

impl SifDocument {
    pub fn mapper(&self) -> CoordMapper {
        CoordMapper::with_scale(self.width, self.height, self.pixels_per_unit)
    }

    pub fn to_element(&self) -> Result<Element> {
        sif::render_document(self)
    }

    pub fn to_xml_string(&self) -> Result<String> {
        self.to_element()?.to_xml_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub pixels_per_unit: f64,
    pub gamma: f64,
    pub close_epsilon: f64,
    pub default_size: Size,
    pub default_name: String,
    pub fuse_subpaths: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pixels_per_unit: PIXELS_PER_UNIT,
            gamma: DEFAULT_GAMMA,
            close_epsilon: 1e-9,
            default_size: Size::default(),
            default_name: DEFAULT_NAME.to_string(),
            fuse_subpaths: true,
        }
    }
}

pub(crate) fn convert_document(
    doc: SvgDocument,
    settings: &Settings,
    debug: Option<&DebugLogger>,
) -> Result<SifDocument> {
    let width = doc.width.unwrap_or(settings.default_size.width);
    let height = doc.height.unwrap_or(settings.default_size.height);
    let name = doc
        .title
        .or(doc.docname)
        .unwrap_or_else(|| settings.default_name.clone());

    let mut builder = LayerBuilder {
        settings,
        mapper: CoordMapper::with_scale(width, height, settings.pixels_per_unit),
        gradients: GradientTable::new(),
        interpreter: Interpreter::new(settings.close_epsilon),
        debug,
    };
    for def in &doc.gradients {
        builder.register_gradient(def)?;
    }

    let nodes = prepare(doc.nodes, settings.fuse_subpaths)?;
    let mut layers = Vec::new();
    for node in &nodes {
        layers.extend(builder.convert_node(node)?);
    }

    log::debug!(
        "converted `{name}` ({width}x{height}) into {} top-level layers",
        layers.len()
    );
    if let Some(logger) = debug {
        logger.increment("gradient.links_walked", builder.gradients.links_walked() as u64);
        logger.emit_summary("convert");
        logger.flush();
    }

    Ok(SifDocument {
        width,
        height,
        name,
        pixels_per_unit: settings.pixels_per_unit,
        layers,
    })
}

struct LayerBuilder<'a> {
    settings: &'a Settings,
    mapper: CoordMapper,
    gradients: GradientTable,
    interpreter: Interpreter,
    debug: Option<&'a DebugLogger>,
}

impl LayerBuilder<'_> {
    fn register_gradient(&mut self, def: &GradientDef) -> Result<()> {
        let source = match &def.stops {
            StopsDef::Link(target) => StopSource::Link(target.clone()),
            StopsDef::Stops(stops) => StopSource::Stops(
                stops
                    .iter()
                    .map(|stop| {
                        let color = extract_color(
                            &stop.style,
                            &StyleKey::StopColor,
                            &[StyleKey::StopOpacity],
                            self.settings.gamma,
                        );
                        (stop.offset, color)
                    })
                    .collect::<GradientStops>(),
            ),
        };
        self.gradients.add(&def.id, def.geometry, def.matrix, source)
    }

    fn convert_node(&mut self, node: &SceneNode) -> Result<Vec<LayerDescriptor>> {
        match node {
            SceneNode::Ignorable(_) => Ok(Vec::new()),
            SceneNode::Container(container) => self.convert_container(container),
            SceneNode::Shape(shape) => self.convert_shape(shape),
        }
    }

    fn convert_container(&mut self, container: &Container) -> Result<Vec<LayerDescriptor>> {
        let mut layers = Vec::new();
        for child in &container.children {
            layers.extend(self.convert_node(child)?);
        }
        if !container.is_layer {
            return Ok(layers);
        }
        let wrapped = encapsulate(layers, container.label.as_deref())?;
        for layer in &wrapped {
            self.trace(layer);
        }
        Ok(wrapped)
    }

    fn convert_shape(&mut self, shape: &Shape) -> Result<Vec<LayerDescriptor>> {
        let style = &shape.style;
        let fill = painted(style, &StyleKey::Fill);
        let stroke = painted(style, &StyleKey::Stroke);
        if fill.is_none() && stroke.is_none() {
            return Ok(Vec::new());
        }

        let mut blines = self.interpreter.run(
            &shape.commands,
            shape.node_types.as_deref(),
            shape.transform,
        )?;
        let mut layers = Vec::new();
        for bline in &mut blines {
            self.mapper.bline_to_units(bline);

            if let Some(paint) = &fill {
                let color = self.paint_color(paint, style, &StyleKey::Fill, StyleKey::FillOpacity);
                let evenodd = style
                    .get(&StyleKey::FillRule)
                    .is_none_or(|rule| rule.trim() == "evenodd");
                let region = LayerDescriptor::create(
                    "region",
                    &shape.id,
                    [
                        ("bline", ParamValue::Bline(bline.clone())),
                        ("color", ParamValue::color(color)),
                        ("winding_style", ParamValue::Integer(if evenodd { 1 } else { 0 })),
                    ],
                )?;
                layers.extend(self.overlay_paint(region, paint, shape.transform)?);
            }

            if let Some(paint) = &stroke {
                let color =
                    self.paint_color(paint, style, &StyleKey::Stroke, StyleKey::StrokeOpacity);
                let width = style
                    .get(&StyleKey::StrokeWidth)
                    .map(parse_dimension)
                    .map_or(0.0, |w| self.mapper.stroke_width_to_units(w, shape.transform));
                let miter = style
                    .get(&StyleKey::StrokeLinejoin)
                    .is_none_or(|join| join.trim() == "miter");
                let round_tips = style
                    .get(&StyleKey::StrokeLinecap)
                    .is_some_and(|cap| cap.trim() != "butt");
                let outline = LayerDescriptor::create(
                    "outline",
                    &shape.id,
                    [
                        ("bline", ParamValue::Bline(bline.clone())),
                        ("color", ParamValue::color(color)),
                        ("width", ParamValue::Real(width)),
                        ("sharp_cusps", ParamValue::Bool(miter)),
                        ("round_tip[0]", ParamValue::Bool(round_tips)),
                        ("round_tip[1]", ParamValue::Bool(round_tips)),
                    ],
                )?;
                layers.extend(self.overlay_paint(outline, paint, shape.transform)?);
            }
        }

        for layer in &layers {
            self.trace(layer);
        }
        Ok(layers)
    }

    /// Flat color of a fill or stroke. Paint servers draw in black and are overlaid later.
    fn paint_color(
        &self,
        paint: &Paint,
        style: &Style,
        key: &StyleKey,
        opacity: StyleKey,
    ) -> Color {
        match paint {
            Paint::Url(_) => Color::BLACK,
            _ => extract_color(style, key, &[opacity, StyleKey::Opacity], self.settings.gamma),
        }
    }

    fn overlay_paint(
        &mut self,
        layer: LayerDescriptor,
        paint: &Paint,
        transform: Matrix,
    ) -> Result<Vec<LayerDescriptor>> {
        let Paint::Url(id) = paint else {
            return Ok(vec![layer]);
        };
        let overlay = self.gradient_layer(id, transform)?;
        color_overlay(vec![layer], overlay, false)
    }

    /// The layer painting gradient `id`, warped by the shape and gradient transforms.
    fn gradient_layer(&mut self, id: &str, transform: Matrix) -> Result<Option<LayerDescriptor>> {
        let Some(gradient) = self.gradients.resolve(id)? else {
            log::warn!("paint server `#{id}` is not a supported gradient; drawing in black");
            return Ok(None);
        };

        let stops = ParamValue::Gradient(gradient.stops);
        let mut layer = match gradient.geometry {
            GradientGeometry::Linear { p1, p2 } => LayerDescriptor::create(
                "linear_gradient",
                id,
                [
                    ("p1", ParamValue::vector(self.mapper.to_units(p1))),
                    ("p2", ParamValue::vector(self.mapper.to_units(p2))),
                    ("gradient", stops),
                ],
            )?,
            GradientGeometry::Radial { center, radius, .. } => LayerDescriptor::create(
                "radial_gradient",
                id,
                [
                    ("center", ParamValue::vector(self.mapper.to_units(center))),
                    ("radius", ParamValue::Real(self.mapper.distance_to_units(radius))),
                    ("gradient", stops),
                ],
            )?,
        };
        layer.set_guid("gradient", &gradient.stops_guid)?;

        let warped = transform_warp(
            vec![layer],
            transform.mul(gradient.matrix),
            &self.mapper,
            false,
        )?;
        Ok(warped.into_iter().next())
    }

    fn trace(&self, layer: &LayerDescriptor) {
        log::debug!("emitted {} layer `{}`", layer.kind, layer.desc);
        if let Some(logger) = self.debug {
            logger.log_json(&json!({
                "type": "layer",
                "kind": layer.kind,
                "desc": layer.desc,
                "params": layer.params.len(),
            }));
            logger.increment(&format!("layer.{}", layer.kind), 1);
        }
    }
}

/// The paint of `key` when it draws anything. An absent paint draws nothing.
fn painted(style: &Style, key: &StyleKey) -> Option<Paint> {
    style.paint(key).filter(|paint| !paint.is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::parse_svg;

    fn convert(body: &str) -> SifDocument {
        let text = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg"
                    xmlns:xlink="http://www.w3.org/1999/xlink"
                    xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
                    width="120" height="120">{body}</svg>"#
        );
        convert_document(parse_svg(&text).unwrap(), &Settings::default(), None).unwrap()
    }

    fn param<'a>(layer: &'a LayerDescriptor, name: &str) -> &'a ParamValue {
        &layer.get_param(name).unwrap().value
    }

    #[test]
    fn document_defaults() {
        let text = r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#;
        let doc = convert_document(parse_svg(text).unwrap(), &Settings::default(), None).unwrap();
        assert_eq!((doc.width, doc.height), (1024.0, 768.0));
        assert_eq!(doc.name, DEFAULT_NAME);
        assert!(doc.layers.is_empty());
    }

    #[test]
    fn filled_path_becomes_region() {
        let doc = convert(
            r#"<path id="sq" d="M 0 0 L 60 0 L 60 60 Z" style="fill:#ffffff;opacity:0.5"/>"#,
        );
        assert_eq!(doc.layers.len(), 1);
        let region = &doc.layers[0];
        assert_eq!(region.kind, "region");
        assert_eq!(region.desc, "sq");
        assert_eq!(*param(region, "winding_style"), ParamValue::Integer(1));
        assert_eq!(
            param(region, "color").as_color(),
            Some(Color::rgba(1.0, 1.0, 1.0, 0.5))
        );
        let ParamValue::Bline(bline) = param(region, "bline") else {
            panic!("expected bline");
        };
        assert!(bline.looped);
        assert_eq!(bline.vertices[0].position, crate::types::Point::new(-1.0, 1.0));
    }

    #[test]
    fn absent_fill_draws_nothing() {
        let doc = convert(r#"<path d="M 0 0 L 60 0"/>"#);
        assert!(doc.layers.is_empty());
    }

    #[test]
    fn stroke_becomes_outline() {
        let doc = convert(
            r#"<path id="ln" d="M 0 0 L 60 0" transform="scale(2)"
                     style="fill:none;stroke:#000000;stroke-width:3;stroke-linecap:round;stroke-linejoin:bevel"/>"#,
        );
        assert_eq!(doc.layers.len(), 1);
        let outline = &doc.layers[0];
        assert_eq!(outline.kind, "outline");
        assert_eq!(outline.version, "0.2");
        assert_eq!(*param(outline, "width"), ParamValue::Real(0.1));
        assert_eq!(*param(outline, "sharp_cusps"), ParamValue::Bool(false));
        assert_eq!(*param(outline, "round_tip[0]"), ParamValue::Bool(true));
        assert_eq!(*param(outline, "round_tip[1]"), ParamValue::Bool(true));
    }

    #[test]
    fn inkscape_layers_are_encapsulated() {
        let doc = convert(
            r#"<g inkscape:groupmode="layer" inkscape:label="Background">
                 <path d="M 0 0 L 1 0 L 1 1 Z" style="fill:#000"/>
               </g>
               <g><path d="M 0 0 L 1 0 L 1 1 Z" style="fill:#000"/></g>"#,
        );
        assert_eq!(doc.layers.len(), 2);
        assert_eq!(doc.layers[0].kind, "PasteCanvas");
        assert_eq!(doc.layers[0].desc, "Background");
        assert_eq!(doc.layers[1].kind, "region");
    }

    #[test]
    fn gradient_fill_is_overlaid() {
        let doc = convert(
            r##"<defs>
                 <linearGradient id="base">
                   <stop offset="0" style="stop-color:#000000"/>
                   <stop offset="1" style="stop-color:#ffffff"/>
                 </linearGradient>
                 <linearGradient id="lg" x1="0" y1="0" x2="60" y2="0" xlink:href="#base"/>
               </defs>
               <path id="p" d="M 0 0 L 60 0 L 60 60 Z" style="fill:url(#lg)"/>"##,
        );
        assert_eq!(doc.layers.len(), 1);
        let outer = &doc.layers[0];
        assert_eq!(outer.kind, "PasteCanvas");
        let ParamValue::Canvas(inner) = param(outer, "canvas") else {
            panic!("expected canvas");
        };
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[0].kind, "region");
        assert_eq!(param(&inner[0], "color").as_color(), Some(Color::BLACK));

        let overlay = &inner[1];
        assert_eq!(*param(overlay, "blend_method"), ParamValue::Integer(21));
        let ParamValue::Canvas(gradient_layers) = param(overlay, "canvas") else {
            panic!("expected canvas");
        };
        let gradient = &gradient_layers[0];
        assert_eq!(gradient.kind, "linear_gradient");
        assert!(gradient.get_param("gradient").unwrap().guid.is_some());
        assert_eq!(
            param(gradient, "p2").as_point(),
            Some(crate::types::Point::new(0.0, 1.0))
        );
    }

    #[test]
    fn transformed_gradient_gets_a_warp() {
        let doc = convert(
            r##"<defs>
                 <radialGradient id="rg" cx="60" cy="60" r="30" gradientTransform="translate(10,0)">
                   <stop offset="0" stop-color="#ff0000"/>
                 </radialGradient>
               </defs>
               <path d="M 0 0 L 60 0 L 60 60 Z" style="fill:url(#rg)"/>"##,
        );
        let ParamValue::Canvas(inner) = param(&doc.layers[0], "canvas") else {
            panic!("expected canvas");
        };
        let ParamValue::Canvas(overlay) = param(&inner[1], "canvas") else {
            panic!("expected canvas");
        };
        let ParamValue::Canvas(warped) = param(&overlay[0], "canvas") else {
            panic!("expected warp canvas");
        };
        assert_eq!(warped[0].kind, "radial_gradient");
        assert_eq!(*param(&warped[0], "radius"), ParamValue::Real(0.5));
        assert_eq!(warped[1].kind, "warp");
    }

    #[test]
    fn unknown_paint_server_stays_black() {
        let doc = convert(r#"<path d="M 0 0 L 60 0 L 60 60 Z" style="fill:url(#pattern)"/>"#);
        assert_eq!(doc.layers.len(), 1);
        assert_eq!(doc.layers[0].kind, "region");
    }

    #[test]
    fn filled_and_stroked_multipath_splits() {
        let doc = convert(
            r#"<path id="two" d="M 0 0 L 10 0 L 10 10 Z M 2 2 L 4 2 L 4 4 Z"
                     style="fill:#ff0000;stroke:#0000ff;stroke-width:1"/>"#,
        );
        let kinds: Vec<&str> = doc.layers.iter().map(|l| l.kind.as_str()).collect();
        // The stroke half keeps a black fill, so each of its loops yields a region too.
        assert_eq!(kinds, vec!["region", "region", "outline", "region", "outline"]);
        assert_eq!(doc.layers[0].desc, "two-fill");
        assert!(doc.layers[1..].iter().all(|l| l.desc == "two-stroke"));
    }
}
