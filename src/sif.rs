use std::io::{Cursor, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::bline::Bline;
use crate::convert::SifDocument;
use crate::error::{Result, SifError};
use crate::geom::{tangent_angle, tangent_radius};
use crate::gradient::GradientStops;
use crate::layer::{LayerDescriptor, Param};
use crate::schema::{ParamType, ParamValue};
use crate::types::Color;

pub const CANVAS_VERSION: &str = "0.5";
const CANVAS_RESOLUTION: &str = "2834.645752";
const INLINE_CANVAS_RESOLUTION: &str = "10.0";

/// A markup element with ordered attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn append(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child called `name`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Serializes the element as an indented XML document.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        self.write(&mut writer)?;
        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| SifError::Xml(e.to_string()))
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            return writer.write_event(Event::Empty(start)).map_err(xml_error);
        }

        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        if let Some(text) = &self.text {
            writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.name.as_str())))
            .map_err(xml_error)
    }
}

fn xml_error(e: impl std::fmt::Display) -> SifError {
    SifError::Xml(e.to_string())
}

/// Reals keep a fractional part (`1.0`, not `1`).
fn real(v: f64) -> String {
    format!("{v:?}")
}

fn value_element(tag: &str, value: impl Into<String>) -> Element {
    Element::new(tag).with_attribute("value", value)
}

fn text_element(tag: &str, text: impl Into<String>) -> Element {
    Element::new(tag).with_text(text)
}

/// Builds the root `canvas` element of `doc`.
pub fn render_document(doc: &SifDocument) -> Result<Element> {
    let [left, top, right, bottom] = doc.mapper().view_box();
    let mut canvas = Element::new("canvas")
        .with_attribute("version", CANVAS_VERSION)
        .with_attribute("width", format!("{:.6}", doc.width))
        .with_attribute("height", format!("{:.6}", doc.height))
        .with_attribute("xres", CANVAS_RESOLUTION)
        .with_attribute("yres", CANVAS_RESOLUTION)
        .with_attribute(
            "view-box",
            format!("{left:.6} {top:.6} {right:.6} {bottom:.6}"),
        )
        .with_child(text_element("name", doc.name.as_str()));
    for layer in &doc.layers {
        canvas.append(render_layer(layer)?);
    }
    Ok(canvas)
}

pub fn render_layer(layer: &LayerDescriptor) -> Result<Element> {
    let mut el = Element::new("layer")
        .with_attribute("type", layer.kind.as_str())
        .with_attribute("desc", layer.desc.as_str())
        .with_attribute("active", if layer.active { "true" } else { "false" })
        .with_attribute("version", layer.version.as_str());
    for param in &layer.params {
        el.append(build_param(param)?);
    }
    Ok(el)
}

/// `<param name=..>` wrapping the typed value element.
pub fn build_param(param: &Param) -> Result<Element> {
    let mut value = build_value(param.ty, &param.value).map_err(|e| match e {
        SifError::Schema(msg) => SifError::Schema(format!("parameter `{}`: {msg}", param.name)),
        other => other,
    })?;
    if let Some(guid) = &param.guid {
        value.set_attribute("guid", guid.as_str());
    }
    Ok(Element::new("param")
        .with_attribute("name", param.name.as_str())
        .with_child(value))
}

fn mismatch(ty: ParamType, value: &ParamValue) -> SifError {
    SifError::Schema(format!("cannot write {value:?} as {ty}"))
}

fn build_value(ty: ParamType, value: &ParamValue) -> Result<Element> {
    let el = match (ty, value) {
        (ParamType::Real, v) => {
            let n = v.as_number().ok_or_else(|| mismatch(ty, v))?;
            value_element("real", real(n))
        }
        (ParamType::Integer, ParamValue::Integer(n)) => value_element("integer", n.to_string()),
        (ParamType::Vector, v) => {
            let p = v.as_point().ok_or_else(|| mismatch(ty, v))?;
            Element::new("vector")
                .with_child(text_element("x", real(p.x)))
                .with_child(text_element("y", real(p.y)))
        }
        (ParamType::Color, v) => color_element(v.as_color().ok_or_else(|| mismatch(ty, v))?),
        (ParamType::Gradient, ParamValue::Gradient(stops)) => gradient_element(stops),
        (ParamType::Bool, ParamValue::Bool(b)) => {
            value_element("bool", if *b { "true" } else { "false" })
        }
        (ParamType::Time, ParamValue::Time(t) | ParamValue::String(t)) => {
            value_element("time", t.as_str())
        }
        (ParamType::String, ParamValue::String(s)) => text_element("string", s.as_str()),
        (ParamType::Bline, ParamValue::Bline(bline)) => bline_element(bline),
        (ParamType::Canvas, ParamValue::Canvas(layers)) => {
            let mut canvas = Element::new("canvas")
                .with_attribute("xres", INLINE_CANVAS_RESOLUTION)
                .with_attribute("yres", INLINE_CANVAS_RESOLUTION);
            for layer in layers {
                canvas.append(render_layer(layer)?);
            }
            canvas
        }
        (ty, v) => return Err(mismatch(ty, v)),
    };
    Ok(el)
}

fn color_children(mut el: Element, color: Color) -> Element {
    for (tag, c) in ["r", "g", "b", "a"].into_iter().zip(color.components()) {
        el.append(text_element(tag, real(c)));
    }
    el
}

fn color_element(color: Color) -> Element {
    color_children(Element::new("color"), color)
}

fn gradient_element(stops: &GradientStops) -> Element {
    let mut el = Element::new("gradient");
    for (pos, color) in stops.iter() {
        el.append(color_children(
            Element::new("color").with_attribute("pos", real(pos)),
            color,
        ));
    }
    el
}

fn real_child(tag: &str, v: f64) -> Element {
    Element::new(tag).with_child(value_element("real", real(v)))
}

fn tangent_element(tag: &str, radius: f64, angle: f64) -> Element {
    let composite = Element::new("radial_composite")
        .with_attribute("type", "vector")
        .with_child(real_child("radius", radius))
        .with_child(
            Element::new("theta").with_child(value_element("angle", real(angle))),
        );
    Element::new(tag).with_child(composite)
}

fn bline_element(bline: &Bline) -> Element {
    let mut el = Element::new("bline")
        .with_attribute("type", "bline_point")
        .with_attribute("loop", if bline.looped { "true" } else { "false" });

    for v in &bline.vertices {
        let p = v.position;
        let point = Element::new("point").with_child(
            Element::new("vector")
                .with_child(text_element("x", real(p.x)))
                .with_child(text_element("y", real(p.y))),
        );
        let split = Element::new("split")
            .with_child(value_element("bool", if v.split { "true" } else { "false" }));
        let composite = Element::new("composite")
            .with_attribute("type", "bline_point")
            .with_child(point)
            .with_child(real_child("width", 1.0))
            .with_child(real_child("origin", 0.5))
            .with_child(split)
            .with_child(tangent_element(
                "t1",
                tangent_radius(p, v.incoming),
                tangent_angle(p, v.incoming),
            ))
            .with_child(tangent_element(
                "t2",
                tangent_radius(p, v.outgoing),
                tangent_angle(p, v.outgoing) - 180.0,
            ));
        el.append(Element::new("entry").with_child(composite));
    }
    el
}
