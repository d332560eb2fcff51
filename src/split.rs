use crate::scene::Shape;
use crate::style::{PropertyRole, Style, StyleKey};

/// The two halves of a shape that is both filled and stroked.
#[derive(Debug, Clone, PartialEq)]
pub struct FillStroke {
    pub fill: Option<Shape>,
    pub stroke: Option<Shape>,
    /// Keys that belong on the group wrapping both halves.
    pub container_style: Style,
}

impl FillStroke {
    pub fn is_split(&self) -> bool {
        self.fill.is_some() && self.stroke.is_some()
    }
}

fn is_off(style: &Style, key: &StyleKey) -> bool {
    style.paint(key).is_some_and(|paint| paint.is_none())
}

/// Separates the fill and the stroke of `shape`.
///
/// The fill is off only when it is explicitly `none`; the stroke is off when it is absent or
/// `none`. A shape with just one active side comes back unchanged in that slot. Otherwise the
/// halves are `<id>-fill`, with its stroke forced to `none`, and `<id>-stroke`, with its fill
/// forced to black.
pub fn split_fill_stroke(shape: Shape) -> FillStroke {
    let fill_off = is_off(&shape.style, &StyleKey::Fill);
    let stroke_off =
        is_off(&shape.style, &StyleKey::Stroke) || !shape.style.contains(&StyleKey::Stroke);

    let single = |fill: Option<Shape>, stroke: Option<Shape>| FillStroke {
        fill,
        stroke,
        container_style: Style::new(),
    };
    match (fill_off, stroke_off) {
        (true, true) => return single(None, None),
        (true, false) => return single(None, Some(shape)),
        (false, true) => return single(Some(shape), None),
        (false, false) => {}
    }

    let container_style = shape
        .style
        .filter_roles(|role| role == PropertyRole::Container);

    let mut fill_style = shape
        .style
        .filter_roles(|role| matches!(role, PropertyRole::Fill | PropertyRole::Shared));
    fill_style.set(StyleKey::Stroke, "none");

    let mut stroke_style = shape
        .style
        .filter_roles(|role| matches!(role, PropertyRole::Stroke | PropertyRole::Shared));
    stroke_style.set(StyleKey::Fill, "#000000");

    let fill = Shape {
        id: format!("{}-fill", shape.id),
        style: fill_style,
        ..shape.clone()
    };
    let stroke = Shape {
        id: format!("{}-stroke", shape.id),
        style: stroke_style,
        ..shape
    };
    FillStroke {
        fill: Some(fill),
        stroke: Some(stroke),
        container_style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Matrix;
    use crate::path::parse_path_data;

    fn shape(style: &str) -> Shape {
        Shape {
            id: "p".to_string(),
            style: Style::parse(style),
            transform: Matrix::translate(1.0, 2.0),
            commands: parse_path_data("M 0 0 L 5 0 L 5 5 Z M 1 1 L 2 1 Z").unwrap(),
            node_types: Some("cccc".to_string()),
        }
    }

    #[test]
    fn fill_and_stroke_are_separated() {
        let out = split_fill_stroke(shape(
            "fill:#ff0000;fill-opacity:0.5;stroke:#0000ff;stroke-width:3;marker-end:url(#m);opacity:0.8;filter:url(#f)",
        ));
        assert!(out.is_split());
        let fill = out.fill.unwrap();
        let stroke = out.stroke.unwrap();

        assert_eq!(fill.id, "p-fill");
        assert_eq!(
            fill.style.to_string(),
            "fill:#ff0000;fill-opacity:0.5;stroke:none;opacity:0.8"
        );
        assert_eq!(stroke.id, "p-stroke");
        assert_eq!(
            stroke.style.to_string(),
            "fill:#000000;stroke:#0000ff;stroke-width:3;marker-end:url(#m);opacity:0.8"
        );
        assert_eq!(out.container_style.to_string(), "filter:url(#f)");

        for half in [&fill, &stroke] {
            assert_eq!(half.transform, Matrix::translate(1.0, 2.0));
            assert_eq!(half.node_types.as_deref(), Some("cccc"));
            assert_eq!(half.commands.len(), 7);
        }
    }

    #[test]
    fn single_sided_shapes_are_not_split() {
        let fill_only = split_fill_stroke(shape("fill:#ff0000"));
        assert_eq!(fill_only.fill.map(|s| s.id), Some("p".to_string()));
        assert!(fill_only.stroke.is_none());

        let stroke_only = split_fill_stroke(shape("fill:none;stroke:#000"));
        assert!(stroke_only.fill.is_none());
        assert_eq!(stroke_only.stroke.map(|s| s.id), Some("p".to_string()));

        let hidden = split_fill_stroke(shape("fill:none;stroke:none"));
        assert!(hidden.fill.is_none() && hidden.stroke.is_none());
        assert!(!hidden.is_split());
    }

    #[test]
    fn none_is_matched_case_insensitively() {
        let out = split_fill_stroke(shape("fill:NONE;stroke:#000"));
        assert!(!out.is_split());
        assert!(out.fill.is_none());
        assert_eq!(out.stroke.map(|s| s.id), Some("p".to_string()));

        let hidden = split_fill_stroke(shape("fill:None;stroke: none "));
        assert!(hidden.fill.is_none() && hidden.stroke.is_none());
    }

    #[test]
    fn absent_fill_counts_as_active() {
        let out = split_fill_stroke(shape("stroke:#000"));
        assert!(out.is_split());
        let fill = out.fill.unwrap();
        assert_eq!(fill.style.to_string(), "stroke:none");
    }
}
