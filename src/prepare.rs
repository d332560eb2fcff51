use crate::error::Result;
use crate::fuse::fuse_subpaths;
use crate::path::move_count;
use crate::propagate::propagate;
use crate::scene::{Container, SceneNode, Shape};
use crate::split::split_fill_stroke;

/// Normalizes a loaded tree for conversion.
///
/// Inheritance is flattened first. Then every shape with more than one subpath is split into
/// its fill and stroke halves, and with `fuse` set the fill half gets its subpaths joined.
pub fn prepare(nodes: Vec<SceneNode>, fuse: bool) -> Result<Vec<SceneNode>> {
    propagate(nodes)
        .into_iter()
        .map(|node| prepare_node(node, fuse))
        .collect()
}

fn prepare_node(node: SceneNode, fuse: bool) -> Result<SceneNode> {
    match node {
        SceneNode::Container(mut container) => {
            container.children = std::mem::take(&mut container.children)
                .into_iter()
                .map(|child| prepare_node(child, fuse))
                .collect::<Result<_>>()?;
            Ok(SceneNode::Container(container))
        }
        SceneNode::Shape(shape) if move_count(&shape.commands) > 1 => {
            prepare_multipath(shape, fuse)
        }
        other => Ok(other),
    }
}

fn prepare_multipath(shape: Shape, fuse: bool) -> Result<SceneNode> {
    let id = shape.id.clone();
    let parts = split_fill_stroke(shape.clone());

    let fill = match parts.fill {
        Some(mut fill) if fuse => {
            fill.commands = fuse_subpaths(std::mem::take(&mut fill.commands))?;
            Some(fill)
        }
        other => other,
    };

    match (fill, parts.stroke) {
        (Some(fill), Some(stroke)) => {
            log::debug!("split `{id}` into fill and stroke");
            let style = parts.container_style;
            Ok(SceneNode::Container(Container {
                id: Some(id),
                style: (!style.is_empty()).then_some(style),
                ..Container::new(vec![SceneNode::Shape(fill), SceneNode::Shape(stroke)])
            }))
        }
        (Some(fill), None) => Ok(SceneNode::Shape(fill)),
        (None, Some(stroke)) => Ok(SceneNode::Shape(stroke)),
        (None, None) => Ok(SceneNode::Shape(shape)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Matrix;
    use crate::path::{format_path, parse_path_data};
    use crate::style::{Style, StyleKey};

    const TWO_SQUARES: &str = "M 0 0 L 10 0 L 10 10 Z M 2 2 L 4 2 L 4 4 Z";

    fn shape(style: &str, d: &str) -> SceneNode {
        SceneNode::Shape(Shape {
            id: "s".to_string(),
            style: Style::parse(style),
            transform: Matrix::identity(),
            commands: parse_path_data(d).unwrap(),
            node_types: None,
        })
    }

    #[test]
    fn filled_and_stroked_multipath_is_split() {
        let out = prepare(
            vec![shape("fill:#f00;stroke:#000;filter:url(#f)", TWO_SQUARES)],
            true,
        )
        .unwrap();
        let SceneNode::Container(group) = &out[0] else {
            panic!("expected container");
        };
        assert_eq!(group.id.as_deref(), Some("s"));
        assert!(!group.is_layer);
        assert_eq!(
            group.style.as_ref().map(ToString::to_string),
            Some("filter:url(#f)".to_string())
        );

        let [SceneNode::Shape(fill), SceneNode::Shape(stroke)] = group.children.as_slice() else {
            panic!("expected two shapes");
        };
        assert_eq!(fill.id, "s-fill");
        assert_eq!(move_count(&fill.commands), 1);
        assert_eq!(stroke.id, "s-stroke");
        assert_eq!(format_path(&stroke.commands), TWO_SQUARES);
    }

    #[test]
    fn fill_only_multipath_is_fused_in_place() {
        let out = prepare(vec![shape("fill:#f00", TWO_SQUARES)], true).unwrap();
        let SceneNode::Shape(fill) = &out[0] else {
            panic!("expected shape");
        };
        assert_eq!(fill.id, "s");
        assert_eq!(
            format_path(&fill.commands),
            "M 0 0 L 10 0 L 10 10 L 2 2 L 4 2 L 4 4 L 10 10 Z"
        );
    }

    #[test]
    fn fusing_can_be_disabled() {
        let out = prepare(vec![shape("fill:#f00", TWO_SQUARES)], false).unwrap();
        let SceneNode::Shape(fill) = &out[0] else {
            panic!("expected shape");
        };
        assert_eq!(move_count(&fill.commands), 2);
    }

    #[test]
    fn single_subpath_and_stroke_only_shapes_are_kept() {
        let out = prepare(
            vec![
                shape("fill:#f00;stroke:#000", "M 0 0 L 1 0 L 1 1 Z"),
                shape("fill:none;stroke:#000", TWO_SQUARES),
            ],
            true,
        )
        .unwrap();
        let SceneNode::Shape(single) = &out[0] else {
            panic!("expected shape");
        };
        assert_eq!(single.style.get(&StyleKey::Stroke), Some("#000"));
        let SceneNode::Shape(stroke) = &out[1] else {
            panic!("expected shape");
        };
        assert_eq!(move_count(&stroke.commands), 2);
    }

    #[test]
    fn nested_shapes_are_prepared() {
        let out = prepare(
            vec![SceneNode::Container(Container::new(vec![shape(
                "fill:#f00;stroke:#000",
                TWO_SQUARES,
            )]))],
            true,
        )
        .unwrap();
        let SceneNode::Container(outer) = &out[0] else {
            panic!("expected container");
        };
        assert!(matches!(outer.children[0], SceneNode::Container(_)));
    }
}
