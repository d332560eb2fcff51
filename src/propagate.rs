use crate::geom::Matrix;
use crate::scene::{Container, SceneNode, Shape};
use crate::style::Style;

/// Flattens style and transform inheritance.
///
/// Every shape ends up with its fully resolved style and transform. Containers keep the
/// identity transform and only the style keys that must not reach their children. Top-level
/// ignorable nodes are returned untouched, and running the pass twice gives the same tree.
pub fn propagate(nodes: Vec<SceneNode>) -> Vec<SceneNode> {
    let root_style = Style::new();
    nodes
        .into_iter()
        .map(|node| propagate_node(node, &root_style, Matrix::identity()))
        .collect()
}

fn propagate_node(node: SceneNode, inherited: &Style, parent: Matrix) -> SceneNode {
    match node {
        SceneNode::Container(container) => {
            SceneNode::Container(propagate_container(container, inherited, parent))
        }
        SceneNode::Shape(shape) => SceneNode::Shape(propagate_shape(shape, inherited, parent)),
        ignorable @ SceneNode::Ignorable(_) => ignorable,
    }
}

fn propagate_container(mut container: Container, inherited: &Style, parent: Matrix) -> Container {
    let composed = parent.mul(container.transform);
    let local = container.style.take().unwrap_or_default();
    let (propagating, residue) = local.partition_propagating();
    let child_style = inherited.merged(&propagating);

    container.children = std::mem::take(&mut container.children)
        .into_iter()
        .map(|child| propagate_node(child, &child_style, composed))
        .collect();
    container.transform = Matrix::identity();
    container.style = (!residue.is_empty()).then_some(residue);
    container
}

fn propagate_shape(mut shape: Shape, inherited: &Style, parent: Matrix) -> Shape {
    let (propagating, residue) = std::mem::take(&mut shape.style).partition_propagating();
    shape.style = inherited.merged(&propagating).merged(&residue);
    shape.transform = parent.mul(shape.transform);
    shape
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_path_data;
    use crate::scene::Ignorable;
    use crate::style::StyleKey;

    fn shape(id: &str, style: &str, transform: Matrix) -> SceneNode {
        SceneNode::Shape(Shape {
            id: id.to_string(),
            style: Style::parse(style),
            transform,
            commands: parse_path_data("M 0 0 L 1 1").unwrap(),
            node_types: None,
        })
    }

    fn group(style: &str, transform: Matrix, children: Vec<SceneNode>) -> SceneNode {
        let style = Style::parse(style);
        SceneNode::Container(Container {
            style: (!style.is_empty()).then_some(style),
            transform,
            ..Container::new(children)
        })
    }

    fn sample() -> Vec<SceneNode> {
        vec![
            SceneNode::Ignorable(Ignorable::Definitions),
            group(
                "fill:#ff0000;stroke:#000000;filter:url(#blur)",
                Matrix::translate(10.0, 0.0),
                vec![
                    shape("a", "fill:#00ff00", Matrix::scale(2.0, 2.0)),
                    group(
                        "opacity:0.5",
                        Matrix::translate(0.0, 5.0),
                        vec![shape("b", "filter:url(#glow)", Matrix::identity())],
                    ),
                ],
            ),
        ]
    }

    fn unwrap_container(node: &SceneNode) -> &Container {
        match node {
            SceneNode::Container(c) => c,
            other => panic!("expected container, got {other:?}"),
        }
    }

    fn unwrap_shape(node: &SceneNode) -> &Shape {
        match node {
            SceneNode::Shape(s) => s,
            other => panic!("expected shape, got {other:?}"),
        }
    }

    #[test]
    fn shapes_receive_resolved_style_and_transform() {
        let out = propagate(sample());
        let outer = unwrap_container(&out[1]);

        let a = unwrap_shape(&outer.children[0]);
        assert_eq!(a.style.get(&StyleKey::Fill), Some("#00ff00"));
        assert_eq!(a.style.get(&StyleKey::Stroke), Some("#000000"));
        assert!(!a.style.contains(&StyleKey::Filter));
        assert_eq!(a.transform, Matrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 0.0));

        let inner = unwrap_container(&outer.children[1]);
        let b = unwrap_shape(&inner.children[0]);
        assert_eq!(b.style.get(&StyleKey::Opacity), Some("0.5"));
        assert_eq!(b.style.get(&StyleKey::Fill), Some("#ff0000"));
        assert_eq!(b.style.get(&StyleKey::Filter), Some("url(#glow)"));
        assert_eq!(b.transform, Matrix::translate(10.0, 5.0));
    }

    #[test]
    fn containers_keep_only_the_residue() {
        let out = propagate(sample());
        let outer = unwrap_container(&out[1]);
        assert!(outer.transform.is_identity());
        assert_eq!(
            outer.style.as_ref().map(ToString::to_string),
            Some("filter:url(#blur)".to_string())
        );
        let inner = unwrap_container(&outer.children[1]);
        assert!(inner.style.is_none());
        assert!(inner.transform.is_identity());
    }

    #[test]
    fn ignorable_nodes_pass_through() {
        let out = propagate(sample());
        assert_eq!(out[0], SceneNode::Ignorable(Ignorable::Definitions));
    }

    #[test]
    fn running_twice_changes_nothing() {
        let once = propagate(sample());
        let twice = propagate(once.clone());
        assert_eq!(once, twice);
    }
}
