use crate::types::Point;
use std::f64::consts::PI;

/// 2x3 affine matrix in SVG order: `[a c e; b d f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::identity()
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::identity()
        }
    }

    pub fn rotate(deg: f64) -> Self {
        let rad = deg.to_radians();
        let s = libm::sin(rad);
        let c = libm::cos(rad);
        Self {
            a: c,
            b: s,
            c: -s,
            d: c,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn skew_x(deg: f64) -> Self {
        Self {
            c: libm::tan(deg.to_radians()),
            ..Self::identity()
        }
    }

    pub fn skew_y(deg: f64) -> Self {
        Self {
            b: libm::tan(deg.to_radians()),
            ..Self::identity()
        }
    }

    /// `self * other`: `other` is applied first.
    pub fn mul(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.e,
            self.b * p.x + self.d * p.y + self.f,
        )
    }

    pub fn determinant(self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Area scale folded back to a length scale.
    pub fn linear_scale(self) -> f64 {
        libm::sqrt(self.determinant().abs())
    }

    pub fn is_identity(self) -> bool {
        self == Self::identity()
    }

    pub fn to_svg_string(self) -> String {
        format!(
            "matrix({},{},{},{},{},{})",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// Parses an SVG transform list. Unknown functions are skipped; a missing attribute is identity.
pub fn parse_transform(input: &str) -> Matrix {
    let mut out = Matrix::identity();
    let mut s = input.trim();

    while !s.is_empty() {
        let Some(open) = s.find('(') else { break };
        let name = s[..open].trim().trim_start_matches(',').trim();
        let Some(close) = s[open + 1..].find(')') else {
            break;
        };
        let args = parse_number_list(&s[open + 1..open + 1 + close]);

        let m = match name {
            "translate" => {
                let tx = args.first().copied().unwrap_or(0.0);
                let ty = args.get(1).copied().unwrap_or(0.0);
                Matrix::translate(tx, ty)
            }
            "scale" => {
                let sx = args.first().copied().unwrap_or(1.0);
                let sy = args.get(1).copied().unwrap_or(sx);
                Matrix::scale(sx, sy)
            }
            "rotate" => {
                let a = args.first().copied().unwrap_or(0.0);
                if args.len() >= 3 {
                    let (cx, cy) = (args[1], args[2]);
                    Matrix::translate(cx, cy)
                        .mul(Matrix::rotate(a))
                        .mul(Matrix::translate(-cx, -cy))
                } else {
                    Matrix::rotate(a)
                }
            }
            "skewX" => Matrix::skew_x(args.first().copied().unwrap_or(0.0)),
            "skewY" => Matrix::skew_y(args.first().copied().unwrap_or(0.0)),
            "matrix" if args.len() >= 6 => {
                Matrix::new(args[0], args[1], args[2], args[3], args[4], args[5])
            }
            _ => Matrix::identity(),
        };

        out = out.mul(m);
        s = s[open + 1 + close + 1..].trim_start();
    }

    out
}

pub(crate) fn parse_number_list(input: &str) -> Vec<f64> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f64>().ok())
        .collect()
}

/// One cubic Bezier segment; the start point is implied by the previous segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSegment {
    pub ctrl1: Point,
    pub ctrl2: Point,
    pub to: Point,
}

/// Degree elevation of the quadratic `p0 q1 p2`. Returns the two cubic control points.
pub fn elevate_quadratic(p0: Point, q1: Point, p2: Point) -> (Point, Point) {
    let third = 1.0 / 3.0;
    let two_thirds = 2.0 / 3.0;
    let c1 = Point::new(
        third * p0.x + two_thirds * q1.x,
        third * p0.y + two_thirds * q1.y,
    );
    let c2 = Point::new(
        two_thirds * q1.x + third * p2.x,
        two_thirds * q1.y + third * p2.y,
    );
    (c1, c2)
}

/// SVG elliptical arc to cubic segments of at most 90 degrees each (SVG 1.1 implementation
/// notes, center parameterization).
///
/// Returns an empty list when the endpoints coincide, and a single straight segment when a
/// radius is zero.
pub fn arc_to_cubics(
    from: Point,
    rx_in: f64,
    ry_in: f64,
    x_axis_rotation_deg: f64,
    large_arc: bool,
    sweep: bool,
    to: Point,
) -> Vec<CubicSegment> {
    if from == to {
        return Vec::new();
    }
    let mut rx = rx_in.abs();
    let mut ry = ry_in.abs();
    if rx == 0.0 || ry == 0.0 {
        return vec![CubicSegment {
            ctrl1: from,
            ctrl2: to,
            to,
        }];
    }

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sin(phi);
    let cos_phi = libm::cos(phi);

    let dx2 = (from.x - to.x) / 2.0;
    let dy2 = (from.y - to.y) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = x1p2 / (rx * rx) + y1p2 / (ry * ry);
    if lambda > 1.0 {
        let s = libm::sqrt(lambda);
        rx *= s;
        ry *= s;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let mut coef = 0.0;
    if den != 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        coef = sign * libm::sqrt((num / den).max(0.0));
    }
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let cx = cos_phi * cxp - sin_phi * cyp + (from.x + to.x) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (from.y + to.y) / 2.0;

    fn angle(ux: f64, uy: f64, vx: f64, vy: f64) -> f64 {
        libm::atan2(ux * vy - uy * vx, ux * vx + uy * vy)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let mut theta = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    let count = libm::ceil(dtheta.abs() / (PI / 2.0)).max(1.0) as usize;
    let delta = dtheta / count as f64;

    let ellipse = EllipseFrame {
        cx,
        cy,
        rx,
        ry,
        sin_phi,
        cos_phi,
    };
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let mut seg = ellipse.segment(theta, theta + delta);
        if i + 1 == count {
            // Land exactly on the requested endpoint.
            seg.to = to;
        }
        out.push(seg);
        theta += delta;
    }
    out
}

struct EllipseFrame {
    cx: f64,
    cy: f64,
    rx: f64,
    ry: f64,
    sin_phi: f64,
    cos_phi: f64,
}

impl EllipseFrame {
    fn map(&self, x: f64, y: f64) -> Point {
        let x = self.rx * x;
        let y = self.ry * y;
        Point::new(
            self.cx + self.cos_phi * x - self.sin_phi * y,
            self.cy + self.sin_phi * x + self.cos_phi * y,
        )
    }

    fn segment(&self, t1: f64, t2: f64) -> CubicSegment {
        let k = (4.0 / 3.0) * libm::tan((t2 - t1) / 4.0);
        let (s1, c1) = (libm::sin(t1), libm::cos(t1));
        let (s2, c2) = (libm::sin(t2), libm::cos(t2));
        CubicSegment {
            ctrl1: self.map(c1 - k * s1, s1 + k * c1),
            ctrl2: self.map(c2 + k * s2, s2 - k * c2),
            to: self.map(c2, s2),
        }
    }
}

/// Direction (degrees) of the tangent handle `handle` as seen from `vertex`, using the
/// quadrant convention of the bline tangent encoding.
pub fn tangent_angle(vertex: Point, handle: Point) -> f64 {
    let dx = handle.x - vertex.x;
    let dy = handle.y - vertex.y;
    let rad = if dx == 0.0 {
        if dy > 0.0 {
            -PI / 2.0
        } else if dy < 0.0 {
            PI / 2.0
        } else {
            0.0
        }
    } else if dy == 0.0 {
        if dx > 0.0 { PI } else { 0.0 }
    } else if dx > 0.0 {
        PI + libm::atan(dy / dx)
    } else if dy < 0.0 {
        libm::atan(dy / dx)
    } else {
        2.0 * PI + libm::atan(dy / dx)
    };
    rad.to_degrees()
}

/// Tangent handle length; bline tangents are three times the control-point offset.
pub fn tangent_radius(vertex: Point, handle: Point) -> f64 {
    3.0 * vertex.distance(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        a.approx_eq(b, 1e-9)
    }

    #[test]
    fn composes_parent_before_local() {
        let parent = Matrix::translate(10.0, 0.0);
        let local = Matrix::scale(2.0, 2.0);
        let p = parent.mul(local).apply(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
    }

    #[test]
    fn identity_is_neutral() {
        let m = Matrix::new(1.5, 0.25, -0.5, 2.0, 3.0, 4.0);
        assert_eq!(Matrix::identity().mul(m), m);
        assert_eq!(m.mul(Matrix::identity()), m);
    }

    #[test]
    fn parses_transform_lists() {
        let m = parse_transform("translate(10,20) scale(2)");
        assert_eq!(m, Matrix::new(2.0, 0.0, 0.0, 2.0, 10.0, 20.0));
        let r = parse_transform("rotate(90 10 10)");
        assert!(close(r.apply(Point::new(20.0, 10.0)), Point::new(10.0, 20.0)));
        assert!(parse_transform("").is_identity());
        assert!(parse_transform("bogus(1,2)").is_identity());
    }

    #[test]
    fn linear_scale_uses_determinant() {
        let m = Matrix::scale(4.0, 1.0);
        assert!((m.linear_scale() - 2.0).abs() < 1e-12);
        let flipped = Matrix::scale(-3.0, 3.0);
        assert!((flipped.linear_scale() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn quadratic_elevation_is_exact() {
        let (c1, c2) = elevate_quadratic(
            Point::new(0.0, 0.0),
            Point::new(1.0, 2.0),
            Point::new(2.0, 0.0),
        );
        assert_eq!(c1, Point::new(2.0 / 3.0, 4.0 / 3.0));
        assert_eq!(c2, Point::new(4.0 / 3.0, 4.0 / 3.0));
    }

    #[test]
    fn half_circle_arc_splits_into_quarters() {
        let segs = arc_to_cubics(
            Point::new(0.0, 0.0),
            10.0,
            10.0,
            0.0,
            false,
            true,
            Point::new(20.0, 0.0),
        );
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[1].to, Point::new(20.0, 0.0));
        // The joint of a half circle from (0,0) to (20,0) sits on the circle's apex.
        assert!((segs[0].to.x - 10.0).abs() < 1e-9);
        assert!((segs[0].to.y.abs() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_arcs() {
        let p = Point::new(3.0, 4.0);
        assert!(arc_to_cubics(p, 5.0, 5.0, 0.0, false, false, p).is_empty());
        let line = arc_to_cubics(p, 0.0, 5.0, 0.0, false, false, Point::new(9.0, 9.0));
        assert_eq!(line.len(), 1);
        assert_eq!(line[0].to, Point::new(9.0, 9.0));
    }

    #[test]
    fn tangent_angle_quadrants() {
        let o = Point::ZERO;
        assert!((tangent_angle(o, Point::new(1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((tangent_angle(o, Point::new(-1.0, 0.0))).abs() < 1e-9);
        assert!((tangent_angle(o, Point::new(0.0, 1.0)) + 90.0).abs() < 1e-9);
        assert!((tangent_angle(o, Point::new(0.0, -1.0)) - 90.0).abs() < 1e-9);
        assert!((tangent_angle(o, Point::new(1.0, 1.0)) - 225.0).abs() < 1e-9);
        assert!((tangent_angle(o, Point::new(-1.0, -1.0)) - 45.0).abs() < 1e-9);
        assert!((tangent_angle(o, Point::new(-1.0, 1.0)) - 315.0).abs() < 1e-9);
        assert_eq!(tangent_angle(o, o), 0.0);
        assert!((tangent_radius(o, Point::new(3.0, 4.0)) - 15.0).abs() < 1e-12);
    }
}
