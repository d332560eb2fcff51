use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::bline::Bline;
use crate::error::{Result, SifError};
use crate::gradient::GradientStops;
use crate::layer::LayerDescriptor;
use crate::types::{Color, Point};

/// The value kinds a layer parameter can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Real,
    Integer,
    Vector,
    Color,
    Gradient,
    Bool,
    Time,
    Bline,
    String,
    Canvas,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::Real => "real",
            ParamType::Integer => "integer",
            ParamType::Vector => "vector",
            ParamType::Color => "color",
            ParamType::Gradient => "gradient",
            ParamType::Bool => "bool",
            ParamType::Time => "time",
            ParamType::Bline => "bline",
            ParamType::String => "string",
            ParamType::Canvas => "canvas",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value before it is bound to a type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    /// A time literal such as `0s`.
    Time(String),
    /// Numeric tuples (vectors, colors) and arbitrary nestings of them.
    List(Vec<ParamValue>),
    Gradient(GradientStops),
    Bline(Bline),
    Canvas(Vec<LayerDescriptor>),
}

impl ParamValue {
    pub fn vector(p: Point) -> Self {
        ParamValue::List(vec![ParamValue::Real(p.x), ParamValue::Real(p.y)])
    }

    pub fn color(c: Color) -> Self {
        ParamValue::List(c.components().into_iter().map(ParamValue::Real).collect())
    }

    pub fn as_number(&self) -> Option<f64> {
        match *self {
            ParamValue::Real(v) => Some(v),
            ParamValue::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    /// The elements of a flat numeric list.
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            ParamValue::List(items) => items.iter().map(ParamValue::as_number).collect(),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self.as_numbers()?.as_slice() {
            [x, y] => Some(Point::new(*x, *y)),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self.as_numbers()?.as_slice() {
            [r, g, b] => Some(Color::rgba(*r, *g, *b, 1.0)),
            [r, g, b, a] => Some(Color::rgba(*r, *g, *b, *a)),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            ParamValue::List(items) => format!("a list of {} elements", items.len()),
            ParamValue::Gradient(stops) => format!("a stop map of {} entries", stops.len()),
            other => format!("{other:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<Point> for ParamValue {
    fn from(p: Point) -> Self {
        ParamValue::vector(p)
    }
}

impl From<Color> for ParamValue {
    fn from(c: Color) -> Self {
        ParamValue::color(c)
    }
}

impl From<Bline> for ParamValue {
    fn from(b: Bline) -> Self {
        ParamValue::Bline(b)
    }
}

/// Compile-time default of a schema entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Real(f64),
    Integer(i64),
    Bool(bool),
    Vector(f64, f64),
    Color(f64, f64, f64, f64),
    Time(&'static str),
    String(&'static str),
    /// Black at 0.0 to white at 1.0.
    BlackToWhite,
    /// No default; the parameter is only written when supplied.
    Absent,
}

impl DefaultValue {
    pub fn to_value(self) -> Option<ParamValue> {
        Some(match self {
            DefaultValue::Real(v) => ParamValue::Real(v),
            DefaultValue::Integer(v) => ParamValue::Integer(v),
            DefaultValue::Bool(v) => ParamValue::Bool(v),
            DefaultValue::Vector(x, y) => ParamValue::vector(Point::new(x, y)),
            DefaultValue::Color(r, g, b, a) => ParamValue::color(Color::rgba(r, g, b, a)),
            DefaultValue::Time(t) => ParamValue::Time(t.to_string()),
            DefaultValue::String(s) => ParamValue::String(s.to_string()),
            DefaultValue::BlackToWhite => ParamValue::Gradient(
                [(0.0, Color::BLACK), (1.0, Color::WHITE)]
                    .into_iter()
                    .collect(),
            ),
            DefaultValue::Absent => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub default: DefaultValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSpec {
    pub kind: &'static str,
    /// Prefixed with the blending parameters.
    pub blending: bool,
    /// Prefixed with the bline-shape parameters (after blending).
    pub bline_shape: bool,
    pub params: &'static [ParamSpec],
}

const fn p(name: &'static str, ty: ParamType, default: DefaultValue) -> ParamSpec {
    ParamSpec { name, ty, default }
}

use self::DefaultValue as D;
use self::ParamType as T;

pub static BLENDING_PARAMS: [ParamSpec; 3] = [
    p("z_depth", T::Real, D::Real(0.0)),
    p("amount", T::Real, D::Real(1.0)),
    p("blend_method", T::Integer, D::Integer(0)),
];

pub static BLINE_SHAPE_PARAMS: [ParamSpec; 8] = [
    p("origin", T::Vector, D::Vector(0.0, 0.0)),
    p("color", T::Color, D::Color(0.0, 0.0, 0.0, 1.0)),
    p("invert", T::Bool, D::Bool(false)),
    p("antialias", T::Bool, D::Bool(true)),
    p("feather", T::Real, D::Real(0.0)),
    p("blurtype", T::Integer, D::Integer(1)),
    p("winding_style", T::Integer, D::Integer(0)),
    p("bline", T::Bline, D::Absent),
];

static IMPORT_PARAMS: [ParamSpec; 6] = [
    p("tl", T::Vector, D::Vector(-1.0, 1.0)),
    p("br", T::Vector, D::Vector(1.0, -1.0)),
    p("c", T::Integer, D::Integer(1)),
    p("gamma_adjust", T::Real, D::Real(1.0)),
    p("filename", T::String, D::String("")),
    p("time_offset", T::Time, D::Time("0s")),
];

static LINEAR_GRADIENT_PARAMS: [ParamSpec; 5] = [
    p("p1", T::Vector, D::Vector(0.0, 0.0)),
    p("p2", T::Vector, D::Vector(1.0, 1.0)),
    p("gradient", T::Gradient, D::BlackToWhite),
    p("loop", T::Bool, D::Bool(false)),
    p("zigzag", T::Bool, D::Bool(false)),
];

static RADIAL_GRADIENT_PARAMS: [ParamSpec; 5] = [
    p("gradient", T::Gradient, D::BlackToWhite),
    p("center", T::Vector, D::Vector(0.0, 0.0)),
    p("radius", T::Real, D::Real(1.0)),
    p("loop", T::Bool, D::Bool(false)),
    p("zigzag", T::Bool, D::Bool(false)),
];

static CIRCLE_PARAMS: [ParamSpec; 6] = [
    p("color", T::Color, D::Color(0.0, 0.0, 0.0, 1.0)),
    p("origin", T::Vector, D::Vector(0.0, 0.0)),
    p("radius", T::Real, D::Real(1.0)),
    p("feather", T::Real, D::Real(0.0)),
    p("invert", T::Bool, D::Bool(false)),
    p("falloff", T::Integer, D::Integer(2)),
];

static RECTANGLE_PARAMS: [ParamSpec; 5] = [
    p("color", T::Color, D::Color(0.0, 0.0, 0.0, 1.0)),
    p("point1", T::Vector, D::Vector(0.0, 0.0)),
    p("point2", T::Vector, D::Vector(1.0, 1.0)),
    p("expand", T::Real, D::Real(0.0)),
    p("invert", T::Bool, D::Bool(false)),
];

static PASTE_CANVAS_PARAMS: [ParamSpec; 6] = [
    p("origin", T::Vector, D::Vector(0.0, 0.0)),
    p("canvas", T::Canvas, D::Absent),
    p("zoom", T::Real, D::Real(0.0)),
    p("time_offset", T::Time, D::Time("0s")),
    p("children_lock", T::Bool, D::Bool(false)),
    p("focus", T::Vector, D::Vector(0.0, 0.0)),
];

static OUTLINE_PARAMS: [ParamSpec; 7] = [
    p("width", T::Real, D::Real(1.0)),
    p("expand", T::Real, D::Real(0.0)),
    p("sharp_cusps", T::Bool, D::Bool(true)),
    p("round_tip[0]", T::Bool, D::Bool(true)),
    p("round_tip[1]", T::Bool, D::Bool(true)),
    p("loopyness", T::Real, D::Real(1.0)),
    p("homogeneous_width", T::Bool, D::Bool(true)),
];

static WARP_PARAMS: [ParamSpec; 8] = [
    p("src_tl", T::Vector, D::Vector(-1.0, 1.0)),
    p("src_br", T::Vector, D::Vector(1.0, -1.0)),
    p("dest_tl", T::Vector, D::Vector(-1.0, 1.0)),
    p("dest_tr", T::Vector, D::Vector(1.0, 1.0)),
    p("dest_br", T::Vector, D::Vector(1.0, -1.0)),
    p("dest_bl", T::Vector, D::Vector(-1.0, -1.0)),
    p("clip", T::Bool, D::Bool(false)),
    p("horizon", T::Real, D::Real(4.0)),
];

static TRANSLATE_PARAMS: [ParamSpec; 1] = [p("origin", T::Vector, D::Vector(0.0, 0.0))];

const fn layer(
    kind: &'static str,
    blending: bool,
    bline_shape: bool,
    params: &'static [ParamSpec],
) -> LayerSpec {
    LayerSpec {
        kind,
        blending,
        bline_shape,
        params,
    }
}

pub static LAYER_SPECS: [LayerSpec; 10] = [
    layer("import", true, false, &IMPORT_PARAMS),
    layer("linear_gradient", true, false, &LINEAR_GRADIENT_PARAMS),
    layer("radial_gradient", true, false, &RADIAL_GRADIENT_PARAMS),
    layer("circle", true, false, &CIRCLE_PARAMS),
    layer("rectangle", true, false, &RECTANGLE_PARAMS),
    layer("PasteCanvas", true, false, &PASTE_CANVAS_PARAMS),
    layer("outline", true, true, &OUTLINE_PARAMS),
    layer("region", true, true, &[]),
    layer("warp", false, false, &WARP_PARAMS),
    layer("translate", false, false, &TRANSLATE_PARAMS),
];

const DEFAULT_LAYER_VERSION: &str = "0.1";

static MERGED_PARAMS: OnceLock<HashMap<&'static str, Vec<&'static ParamSpec>>> = OnceLock::new();

fn merged_params() -> &'static HashMap<&'static str, Vec<&'static ParamSpec>> {
    MERGED_PARAMS.get_or_init(|| {
        LAYER_SPECS
            .iter()
            .map(|spec| {
                let mut params: Vec<&'static ParamSpec> = Vec::new();
                if spec.blending {
                    params.extend(BLENDING_PARAMS.iter());
                }
                if spec.bline_shape {
                    params.extend(BLINE_SHAPE_PARAMS.iter());
                }
                params.extend(spec.params.iter());
                (spec.kind, params)
            })
            .collect()
    })
}

pub fn layer_spec(kind: &str) -> Option<&'static LayerSpec> {
    LAYER_SPECS.iter().find(|spec| spec.kind == kind)
}

/// All parameters of `kind` in declaration order, shared bases first.
pub fn default_params(kind: &str) -> Result<&'static [&'static ParamSpec]> {
    merged_params()
        .get(kind)
        .map(Vec::as_slice)
        .ok_or_else(|| SifError::Schema(format!("unknown layer kind `{kind}`")))
}

pub fn param_spec(kind: &str, name: &str) -> Result<&'static ParamSpec> {
    default_params(kind)?
        .iter()
        .copied()
        .find(|spec| spec.name == name)
        .ok_or_else(|| SifError::Schema(format!("layer `{kind}` has no parameter `{name}`")))
}

pub fn type_of(kind: &str, name: &str) -> Result<ParamType> {
    param_spec(kind, name).map(|spec| spec.ty)
}

/// Type of a value that has no schema entry.
pub fn infer_type(value: &ParamValue) -> Result<ParamType> {
    match value {
        ParamValue::Bool(_) => Ok(ParamType::Bool),
        ParamValue::Integer(_) => Ok(ParamType::Integer),
        ParamValue::Real(_) => Ok(ParamType::Real),
        ParamValue::String(_) => Ok(ParamType::String),
        ParamValue::Time(_) => Ok(ParamType::Time),
        ParamValue::Bline(_) => Ok(ParamType::Bline),
        ParamValue::Canvas(_) => Ok(ParamType::Canvas),
        ParamValue::Gradient(stops) if stops.contains_position(0.0) => Ok(ParamType::Gradient),
        ParamValue::List(_) => match value.as_numbers().map(|n| n.len()) {
            Some(2) => Ok(ParamType::Vector),
            Some(3 | 4) => Ok(ParamType::Color),
            _ => Err(SifError::AmbiguousType(value.describe())),
        },
        other => Err(SifError::AmbiguousType(other.describe())),
    }
}

pub fn default_version(kind: &str) -> &'static str {
    match kind {
        "outline" => "0.2",
        "linear_gradient" => "0.0",
        _ => DEFAULT_LAYER_VERSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types() {
        assert_eq!(type_of("circle", "radius").unwrap(), ParamType::Real);
        assert_eq!(type_of("region", "bline").unwrap(), ParamType::Bline);
        assert_eq!(type_of("outline", "z_depth").unwrap(), ParamType::Real);
        assert_eq!(type_of("PasteCanvas", "canvas").unwrap(), ParamType::Canvas);
        assert_eq!(type_of("outline", "round_tip[1]").unwrap(), ParamType::Bool);
    }

    #[test]
    fn unknown_kind_or_name_is_a_schema_error() {
        assert!(matches!(type_of("circle", "bogus"), Err(SifError::Schema(_))));
        assert!(matches!(type_of("spiral", "radius"), Err(SifError::Schema(_))));
        // Transform layers carry no blending parameters.
        assert!(matches!(type_of("warp", "amount"), Err(SifError::Schema(_))));
    }

    #[test]
    fn bases_come_first() {
        let names: Vec<&str> = default_params("outline")
            .unwrap()
            .iter()
            .map(|spec| spec.name)
            .collect();
        assert_eq!(&names[..4], &["z_depth", "amount", "blend_method", "origin"]);
        assert_eq!(names.len(), 3 + 8 + 7);
        assert_eq!(default_params("region").unwrap().len(), 11);
    }

    #[test]
    fn infers_scalar_types() {
        assert_eq!(infer_type(&ParamValue::Bool(true)).unwrap(), ParamType::Bool);
        assert_eq!(infer_type(&ParamValue::Integer(3)).unwrap(), ParamType::Integer);
        assert_eq!(infer_type(&ParamValue::Real(3.0)).unwrap(), ParamType::Real);
    }

    #[test]
    fn infers_tuples_by_length() {
        assert_eq!(
            infer_type(&ParamValue::vector(Point::new(1.0, 2.0))).unwrap(),
            ParamType::Vector
        );
        assert_eq!(
            infer_type(&ParamValue::color(Color::WHITE)).unwrap(),
            ParamType::Color
        );
        let five = ParamValue::List(vec![ParamValue::Real(0.0); 5]);
        assert!(matches!(infer_type(&five), Err(SifError::AmbiguousType(_))));
    }

    #[test]
    fn infers_gradient_from_stop_at_zero() {
        let stops: GradientStops = [(0.0, Color::BLACK), (1.0, Color::WHITE)]
            .into_iter()
            .collect();
        assert_eq!(
            infer_type(&ParamValue::Gradient(stops)).unwrap(),
            ParamType::Gradient
        );
        let shifted: GradientStops = [(0.5, Color::BLACK)].into_iter().collect();
        assert!(matches!(
            infer_type(&ParamValue::Gradient(shifted)),
            Err(SifError::AmbiguousType(_))
        ));
        assert_eq!(
            infer_type(&ParamValue::Bline(Bline::default())).unwrap(),
            ParamType::Bline
        );
    }

    #[test]
    fn versions() {
        assert_eq!(default_version("outline"), "0.2");
        assert_eq!(default_version("linear_gradient"), "0.0");
        assert_eq!(default_version("region"), "0.1");
        assert_eq!(default_version("anything"), "0.1");
    }

    #[test]
    fn defaults_materialize() {
        assert_eq!(
            param_spec("warp", "horizon").unwrap().default.to_value(),
            Some(ParamValue::Real(4.0))
        );
        assert_eq!(param_spec("region", "bline").unwrap().default.to_value(), None);
        assert!(matches!(
            param_spec("linear_gradient", "gradient").unwrap().default.to_value(),
            Some(ParamValue::Gradient(ref s)) if s.len() == 2
        ));
    }
}
