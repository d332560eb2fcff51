use crate::bline::Bline;
use crate::error::{Result, SifError};
use crate::geom::Matrix;
use crate::schema::ParamValue;
use crate::types::Point;

/// Source pixels per target unit.
pub const PIXELS_PER_UNIT: f64 = 60.0;

const ROUND_TRIP_TOLERANCE: f64 = 1e-9;

/// Maps between document pixels (origin top-left, y down) and units (origin at the document
/// center, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordMapper {
    width: f64,
    height: f64,
    scale: f64,
}

impl CoordMapper {
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_scale(width, height, PIXELS_PER_UNIT)
    }

    pub fn with_scale(width: f64, height: f64, scale: f64) -> Self {
        Self {
            width,
            height,
            scale,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn to_units(&self, p: Point) -> Point {
        let x = (p.x - self.width / 2.0) / self.scale;
        let y = (self.height - p.y - self.height / 2.0) / self.scale;
        Point::new(x, y)
    }

    /// Inverse of [`CoordMapper::to_units`]. The result is mapped forward again and must land
    /// back on `p`.
    pub fn to_pixels(&self, p: Point) -> Result<Point> {
        let x = p.x * self.scale + self.width / 2.0;
        let y = self.height - (p.y * self.scale + self.height / 2.0);
        let out = Point::new(x, y);

        let back = self.to_units(out);
        if !close(back.x, p.x) || !close(back.y, p.y) {
            return Err(SifError::RoundTripInvariant {
                expected: p,
                actual: back,
            });
        }
        Ok(out)
    }

    pub fn distance_to_units(&self, d: f64) -> f64 {
        d / self.scale
    }

    pub fn distance_to_pixels(&self, d: f64) -> f64 {
        d * self.scale
    }

    /// Stroke width in units, scaled by the linear factor of `transform`.
    pub fn stroke_width_to_units(&self, width: f64, transform: Matrix) -> f64 {
        width * transform.linear_scale() / self.scale
    }

    /// Converts every coordinate pair inside `value` to units.
    ///
    /// A list of exactly two numbers is a pair; any other list is walked recursively. Blines
    /// inside the value are converted as well.
    pub fn list_to_units(&self, value: &mut ParamValue) {
        if let Some(p) = value.as_point() {
            *value = ParamValue::vector(self.to_units(p));
            return;
        }
        match value {
            ParamValue::List(items) => {
                for item in items {
                    self.list_to_units(item);
                }
            }
            ParamValue::Bline(bline) => self.bline_to_units(bline),
            _ => {}
        }
    }

    pub fn list_to_pixels(&self, value: &mut ParamValue) -> Result<()> {
        if let Some(p) = value.as_point() {
            *value = ParamValue::vector(self.to_pixels(p)?);
            return Ok(());
        }
        match value {
            ParamValue::List(items) => {
                for item in items {
                    self.list_to_pixels(item)?;
                }
            }
            ParamValue::Bline(bline) => self.bline_to_pixels(bline)?,
            _ => {}
        }
        Ok(())
    }

    pub fn bline_to_units(&self, bline: &mut Bline) {
        bline.map_points(|p| self.to_units(p));
    }

    pub fn bline_to_pixels(&self, bline: &mut Bline) -> Result<()> {
        for v in &mut bline.vertices {
            v.incoming = self.to_pixels(v.incoming)?;
            v.position = self.to_pixels(v.position)?;
            v.outgoing = self.to_pixels(v.outgoing)?;
        }
        Ok(())
    }

    /// Unit-space view box as `[left, top, right, bottom]`.
    pub fn view_box(&self) -> [f64; 4] {
        let hw = self.width / 2.0 / self.scale;
        let hh = self.height / 2.0 / self.scale;
        [-hw, hh, hw, -hh]
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ROUND_TRIP_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bline::Vertex;

    #[test]
    fn center_maps_to_origin() {
        let m = CoordMapper::new(480.0, 270.0);
        assert_eq!(m.to_units(Point::new(240.0, 135.0)), Point::ZERO);
        assert_eq!(m.to_units(Point::new(300.0, 75.0)), Point::new(1.0, 1.0));
    }

    #[test]
    fn round_trip_holds_across_the_page() {
        let m = CoordMapper::new(1024.0, 768.0);
        for ix in 0..=16 {
            for iy in 0..=12 {
                let p = Point::new(ix as f64 * 64.0 + 0.37, iy as f64 * 64.0 - 0.11);
                let back = m.to_pixels(m.to_units(p)).unwrap();
                assert!(back.approx_eq(p, 1e-9), "{p} -> {back}");
            }
        }
    }

    #[test]
    fn distances_only_scale() {
        let m = CoordMapper::new(100.0, 100.0);
        assert_eq!(m.distance_to_units(120.0), 2.0);
        assert_eq!(m.distance_to_pixels(2.0), 120.0);
    }

    #[test]
    fn stroke_width_uses_linear_scale() {
        let m = CoordMapper::new(100.0, 100.0);
        let w = m.stroke_width_to_units(6.0, Matrix::scale(4.0, 1.0));
        assert!((w - 0.2).abs() < 1e-12);
    }

    #[test]
    fn nested_lists_convert_pairs_only() {
        let m = CoordMapper::new(120.0, 120.0);
        let mut value = ParamValue::List(vec![
            ParamValue::vector(Point::new(60.0, 60.0)),
            ParamValue::List(vec![ParamValue::vector(Point::new(120.0, 0.0))]),
            ParamValue::Real(7.0),
            ParamValue::List(vec![
                ParamValue::Real(1.0),
                ParamValue::Real(2.0),
                ParamValue::Real(3.0),
            ]),
        ]);
        m.list_to_units(&mut value);
        let ParamValue::List(items) = &value else {
            panic!("expected list");
        };
        assert_eq!(items[0].as_point(), Some(Point::ZERO));
        let ParamValue::List(inner) = &items[1] else {
            panic!("expected nested list");
        };
        assert_eq!(inner[0].as_point(), Some(Point::new(1.0, 1.0)));
        assert_eq!(items[2], ParamValue::Real(7.0));
        assert_eq!(items[3].as_numbers(), Some(vec![1.0, 2.0, 3.0]));

        m.list_to_pixels(&mut value).unwrap();
        let ParamValue::List(items) = &value else {
            panic!("expected list");
        };
        assert_eq!(items[0].as_point(), Some(Point::new(60.0, 60.0)));
    }

    #[test]
    fn bline_points_convert_together() {
        let m = CoordMapper::new(120.0, 120.0);
        let mut bline = Bline {
            vertices: vec![Vertex::new(
                Point::new(0.0, 0.0),
                Point::new(60.0, 60.0),
                Point::new(120.0, 120.0),
                true,
            )],
            looped: false,
        };
        m.bline_to_units(&mut bline);
        let v = bline.vertices[0];
        assert_eq!(v.incoming, Point::new(-1.0, 1.0));
        assert_eq!(v.position, Point::ZERO);
        assert_eq!(v.outgoing, Point::new(1.0, -1.0));
        assert!(v.split);
        m.bline_to_pixels(&mut bline).unwrap();
        assert_eq!(bline.vertices[0].outgoing, Point::new(120.0, 120.0));
    }

    #[test]
    fn view_box_is_centered() {
        let m = CoordMapper::new(480.0, 270.0);
        assert_eq!(m.view_box(), [-4.0, 2.25, 4.0, -2.25]);
    }
}
