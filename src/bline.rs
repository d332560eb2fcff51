use std::str::Chars;

use crate::error::{Result, SifError};
use crate::geom::{Matrix, arc_to_cubics, elevate_quadratic};
use crate::path::PathCommand;
use crate::types::Point;

/// One bline vertex. Tangents are absolute control points, not offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub incoming: Point,
    pub position: Point,
    pub outgoing: Point,
    /// `false` keeps both tangents collinear through the vertex.
    pub split: bool,
}

impl Vertex {
    pub fn new(incoming: Point, position: Point, outgoing: Point, split: bool) -> Self {
        Self {
            incoming,
            position,
            outgoing,
            split,
        }
    }

    pub fn points(&self) -> [Point; 3] {
        [self.incoming, self.position, self.outgoing]
    }

    fn map(&mut self, f: impl Fn(Point) -> Point) {
        self.incoming = f(self.incoming);
        self.position = f(self.position);
        self.outgoing = f(self.outgoing);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bline {
    pub vertices: Vec<Vertex>,
    pub looped: bool,
}

impl Bline {
    /// Applies `f` to every tangent and position.
    pub fn map_points(&mut self, f: impl Fn(Point) -> Point) {
        for v in &mut self.vertices {
            v.map(&f);
        }
    }
}

/// Reads node-type hints one vertex at a time. `z` marks a smooth vertex; any other character,
/// or running out of characters, marks a corner.
pub struct HintCursor<'a> {
    chars: Option<Chars<'a>>,
}

impl<'a> HintCursor<'a> {
    pub fn new(hints: Option<&'a str>) -> Self {
        Self {
            chars: hints.map(str::chars),
        }
    }

    pub fn next_split(&mut self) -> bool {
        let next = self.chars.as_mut().and_then(Iterator::next);
        next != Some('z')
    }
}

/// A vertex whose outgoing tangent is not yet known.
#[derive(Debug, Clone, Copy)]
struct Pending {
    incoming: Point,
    position: Point,
    split: bool,
}

impl Pending {
    fn at(position: Point, split: bool) -> Self {
        Self {
            incoming: position,
            position,
            split,
        }
    }

    fn finish(self, outgoing: Point) -> Vertex {
        Vertex::new(self.incoming, self.position, outgoing, self.split)
    }
}

/// Turns path commands into blines.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    close_epsilon: f64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self {
            close_epsilon: 1e-9,
        }
    }
}

impl Interpreter {
    /// `close_epsilon` is the per-axis distance under which a closing point counts as being
    /// back at the subpath start.
    pub fn new(close_epsilon: f64) -> Self {
        Self { close_epsilon }
    }

    pub fn run(
        &self,
        commands: &[PathCommand],
        node_types: Option<&str>,
        transform: Matrix,
    ) -> Result<Vec<Bline>> {
        let mut hints = HintCursor::new(node_types);
        let mut blines: Vec<Bline> = Vec::new();
        let mut pending: Option<Pending> = None;
        let mut start = Point::ZERO;

        for cmd in commands {
            if let PathCommand::MoveTo(p) = *cmd {
                if let (Some(prev), Some(bline)) = (pending.take(), blines.last_mut()) {
                    bline.vertices.push(prev.finish(prev.position));
                }
                blines.push(Bline::default());
                start = p;
                pending = Some(Pending::at(p, hints.next_split()));
                continue;
            }

            if blines.is_empty() {
                return Err(SifError::MalformedPath(
                    "path data must begin with a moveto".to_string(),
                ));
            }

            if matches!(cmd, PathCommand::ClosePath) {
                let Some(bline) = blines.last_mut() else {
                    continue;
                };
                if let Some(prev) = pending.take() {
                    if bline.vertices.is_empty() {
                        bline.vertices.push(Vertex::new(
                            prev.incoming,
                            prev.position,
                            prev.position,
                            false,
                        ));
                    } else if prev.position.approx_eq(start, self.close_epsilon) {
                        bline.vertices[0].incoming = prev.incoming;
                    } else {
                        bline.vertices.push(prev.finish(prev.position));
                    }
                }
                bline.looped = true;
                continue;
            }

            // Drawing after a close without a moveto continues from the subpath start.
            let prev = match pending.take() {
                Some(prev) => prev,
                None => {
                    blines.push(Bline::default());
                    Pending::at(start, true)
                }
            };
            let Some(bline) = blines.last_mut() else {
                continue;
            };

            pending = Some(match *cmd {
                PathCommand::LineTo(p) => {
                    bline.vertices.push(prev.finish(prev.position));
                    Pending::at(p, hints.next_split())
                }
                PathCommand::CubicTo(c1, c2, p) => {
                    bline.vertices.push(prev.finish(c1));
                    Pending {
                        incoming: c2,
                        position: p,
                        split: hints.next_split(),
                    }
                }
                PathCommand::QuadTo(q, p) => {
                    let (c1, c2) = elevate_quadratic(prev.position, q, p);
                    bline.vertices.push(prev.finish(c1));
                    Pending {
                        incoming: c2,
                        position: p,
                        split: hints.next_split(),
                    }
                }
                PathCommand::ArcTo {
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    to,
                } => {
                    let split = hints.next_split();
                    let segments =
                        arc_to_cubics(prev.position, rx, ry, x_axis_rotation, large_arc, sweep, to);
                    let Some(first) = segments.first() else {
                        pending = Some(prev);
                        continue;
                    };
                    bline.vertices.push(prev.finish(first.ctrl1));
                    for pair in segments.windows(2) {
                        bline.vertices.push(Vertex::new(
                            pair[0].ctrl2,
                            pair[0].to,
                            pair[1].ctrl1,
                            false,
                        ));
                    }
                    let last = segments[segments.len() - 1];
                    Pending {
                        incoming: last.ctrl2,
                        position: last.to,
                        split,
                    }
                }
                PathCommand::MoveTo(_) | PathCommand::ClosePath => prev,
            });
        }

        if let (Some(prev), Some(bline)) = (pending, blines.last_mut()) {
            bline.vertices.push(prev.finish(prev.position));
        }

        if !transform.is_identity() {
            for bline in &mut blines {
                bline.map_points(|p| transform.apply(p));
            }
        }

        Ok(blines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_path_data;

    fn run(d: &str) -> Vec<Bline> {
        let cmds = parse_path_data(d).unwrap();
        Interpreter::default()
            .run(&cmds, None, Matrix::identity())
            .unwrap()
    }

    fn degenerate(v: &Vertex) -> bool {
        v.incoming == v.position && v.outgoing == v.position
    }

    #[test]
    fn open_triangle_closes_with_straight_vertex() {
        let blines = run("M 0 0 L 10 0 L 10 10 Z");
        assert_eq!(blines.len(), 1);
        let b = &blines[0];
        assert!(b.looped);
        assert_eq!(b.vertices.len(), 3);
        assert!(b.vertices.iter().all(degenerate));
        assert_eq!(b.vertices[0].position, Point::new(0.0, 0.0));
        assert_eq!(b.vertices[2].position, Point::new(10.0, 10.0));
    }

    #[test]
    fn lone_moveto_closes_to_single_vertex() {
        let blines = run("M 0 0 Z");
        assert_eq!(blines.len(), 1);
        assert!(blines[0].looped);
        assert_eq!(blines[0].vertices.len(), 1);
        let v = blines[0].vertices[0];
        assert!(degenerate(&v));
        assert!(!v.split);
    }

    #[test]
    fn closing_at_start_folds_tangent_into_first_vertex() {
        let blines = run("M 0 0 L 10 0 C 10 5 5 10 0 0 Z");
        let b = &blines[0];
        assert_eq!(b.vertices.len(), 2);
        assert_eq!(b.vertices[0].incoming, Point::new(5.0, 10.0));
        assert_eq!(b.vertices[1].outgoing, Point::new(10.0, 5.0));
    }

    #[test]
    fn quadratic_is_elevated_exactly() {
        let blines = run("M 0 0 Q 1 2 2 0");
        let b = &blines[0];
        assert_eq!(b.vertices.len(), 2);
        assert_eq!(b.vertices[0].outgoing, Point::new(2.0 / 3.0, 4.0 / 3.0));
        assert_eq!(b.vertices[1].incoming, Point::new(4.0 / 3.0, 4.0 / 3.0));
        assert!(!b.looped);
    }

    #[test]
    fn moveto_flushes_pending_point_into_previous_subpath() {
        let blines = run("M 0 0 L 5 5 M 10 10 L 20 20");
        assert_eq!(blines.len(), 2);
        assert_eq!(blines[0].vertices.len(), 2);
        assert_eq!(blines[0].vertices[1].position, Point::new(5.0, 5.0));
        assert_eq!(blines[1].vertices.len(), 2);
    }

    #[test]
    fn hints_select_smooth_vertices() {
        let cmds = parse_path_data("M 0 0 L 1 0 L 1 1 L 0 1").unwrap();
        let blines = Interpreter::default()
            .run(&cmds, Some("czc"), Matrix::identity())
            .unwrap();
        let splits: Vec<bool> = blines[0].vertices.iter().map(|v| v.split).collect();
        // The fourth vertex has no hint left and defaults to a corner.
        assert_eq!(splits, vec![true, false, true, true]);
    }

    #[test]
    fn half_circle_arc_adds_one_smooth_joint() {
        let blines = run("M 0 0 A 10 10 0 0 1 20 0");
        let b = &blines[0];
        assert_eq!(b.vertices.len(), 3);
        assert!(!b.vertices[1].split);
        assert!((b.vertices[1].position.x - 10.0).abs() < 1e-9);
        assert_eq!(b.vertices[2].position, Point::new(20.0, 0.0));
        // The start vertex leaves along the arc, not along a degenerate tangent.
        assert_ne!(b.vertices[0].outgoing, b.vertices[0].position);
    }

    #[test]
    fn transform_applies_to_every_point() {
        let cmds = parse_path_data("M 0 0 C 1 0 2 0 3 0").unwrap();
        let blines = Interpreter::default()
            .run(&cmds, None, Matrix::translate(10.0, 20.0))
            .unwrap();
        let v = blines[0].vertices[0];
        assert_eq!(v.position, Point::new(10.0, 20.0));
        assert_eq!(v.outgoing, Point::new(11.0, 20.0));
        assert_eq!(blines[0].vertices[1].incoming, Point::new(12.0, 20.0));
    }

    #[test]
    fn drawing_after_close_restarts_at_subpath_start() {
        let blines = run("M 0 0 L 10 0 L 10 10 Z L 0 10");
        assert_eq!(blines.len(), 2);
        assert_eq!(blines[1].vertices[0].position, Point::new(0.0, 0.0));
        assert_eq!(blines[1].vertices[1].position, Point::new(0.0, 10.0));
    }

    #[test]
    fn close_epsilon_absorbs_rounding_noise() {
        let cmds = parse_path_data("M 0 0 L 10 0 L 1e-12 0 Z").unwrap();
        let strict = Interpreter::new(0.0)
            .run(&cmds, None, Matrix::identity())
            .unwrap();
        assert_eq!(strict[0].vertices.len(), 3);
        let loose = Interpreter::default()
            .run(&cmds, None, Matrix::identity())
            .unwrap();
        assert_eq!(loose[0].vertices.len(), 2);
    }

    #[test]
    fn commands_before_moveto_are_rejected() {
        let err = Interpreter::default()
            .run(&[PathCommand::LineTo(Point::ZERO)], None, Matrix::identity())
            .unwrap_err();
        assert!(matches!(err, SifError::MalformedPath(_)));
    }
}
