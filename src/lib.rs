mod bline;
mod convert;
mod coords;
mod debug;
mod error;
mod fuse;
mod geom;
mod gradient;
mod layer;
mod path;
mod prepare;
mod propagate;
mod scene;
mod schema;
mod sif;
mod split;
mod style;
mod types;

use std::path::PathBuf;

pub use bline::{Bline, HintCursor, Interpreter, Vertex};
pub use convert::{DEFAULT_GAMMA, DEFAULT_NAME, SifDocument};
use convert::Settings;
pub use coords::{CoordMapper, PIXELS_PER_UNIT};
pub use debug::DebugLogger;
pub use error::{Result, SifError};
pub use fuse::fuse_subpaths;
pub use geom::{
    CubicSegment, Matrix, arc_to_cubics, elevate_quadratic, parse_transform, tangent_angle,
    tangent_radius,
};
pub use gradient::{Gradient, GradientGeometry, GradientStops, GradientTable, StopSource};
pub use layer::{
    BLEND_STRAIGHT_ONTO, LayerDescriptor, Param, color_overlay, encapsulate, transform_warp,
};
pub use path::{PathCommand, format_path, move_count, parse_path_data};
pub use prepare::prepare;
pub use propagate::propagate;
pub use scene::{
    Container, GradientDef, Ignorable, SceneNode, Shape, StopDef, StopsDef, SvgDocument,
    parse_svg,
};
pub use schema::{
    LayerSpec, ParamSpec, ParamType, ParamValue, default_params, default_version, infer_type,
    layer_spec, param_spec, type_of,
};
pub use sif::{Element, build_param, render_document, render_layer};
pub use split::{FillStroke, split_fill_stroke};
pub use style::{
    Paint, PropertyRole, Rgb8, Style, StyleKey, extract_color, parse_color, parse_dimension,
};
pub use types::{Color, Point, Size};

/// Converts SVG drawings into Synfig canvases.
#[derive(Debug, Clone)]
pub struct Converter {
    settings: Settings,
    debug: Option<DebugLogger>,
}

impl Converter {
    pub fn builder() -> ConverterBuilder {
        ConverterBuilder::new()
    }

    /// Parses `svg` and converts it.
    pub fn convert_str(&self, svg: &str) -> Result<SifDocument> {
        let doc = parse_svg(svg)?;
        self.convert_document(doc)
    }

    pub fn convert_document(&self, doc: SvgDocument) -> Result<SifDocument> {
        convert::convert_document(doc, &self.settings, self.debug.as_ref())
    }

    /// Convenience for `convert_str` followed by markup rendering.
    pub fn convert_to_sif(&self, svg: &str) -> Result<String> {
        self.convert_str(svg)?.to_xml_string()
    }

    pub fn pixels_per_unit(&self) -> f64 {
        self.settings.pixels_per_unit
    }

    pub fn gamma(&self) -> f64 {
        self.settings.gamma
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            debug: None,
        }
    }
}

pub struct ConverterBuilder {
    pixels_per_unit: f64,
    gamma: f64,
    close_epsilon: f64,
    default_size: Size,
    default_name: String,
    fuse_subpaths: bool,
    debug_path: Option<PathBuf>,
}

impl ConverterBuilder {
    pub fn new() -> Self {
        let defaults = Settings::default();
        Self {
            pixels_per_unit: defaults.pixels_per_unit,
            gamma: defaults.gamma,
            close_epsilon: defaults.close_epsilon,
            default_size: defaults.default_size,
            default_name: defaults.default_name,
            fuse_subpaths: defaults.fuse_subpaths,
            debug_path: None,
        }
    }

    pub fn pixels_per_unit(mut self, value: f64) -> Self {
        self.pixels_per_unit = value;
        self
    }

    /// Exponent applied to 8-bit color channels.
    pub fn gamma(mut self, value: f64) -> Self {
        self.gamma = value;
        self
    }

    /// Per-axis distance under which a closing point snaps to its subpath start.
    pub fn close_epsilon(mut self, value: f64) -> Self {
        self.close_epsilon = value;
        self
    }

    /// Canvas size used when the root element has no width or height.
    pub fn default_size(mut self, size: Size) -> Self {
        self.default_size = size;
        self
    }

    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    pub fn fuse_subpaths(mut self, enabled: bool) -> Self {
        self.fuse_subpaths = enabled;
        self
    }

    /// Writes a JSON-lines event log of every conversion to `path`.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Converter> {
        if !(self.pixels_per_unit.is_finite() && self.pixels_per_unit > 0.0) {
            return Err(SifError::InvalidConfiguration(format!(
                "pixels_per_unit must be positive, got {}",
                self.pixels_per_unit
            )));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(SifError::InvalidConfiguration(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }
        if !(self.close_epsilon.is_finite() && self.close_epsilon >= 0.0) {
            return Err(SifError::InvalidConfiguration(format!(
                "close_epsilon must be finite and non-negative, got {}",
                self.close_epsilon
            )));
        }
        let Size { width, height } = self.default_size;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(SifError::InvalidConfiguration(format!(
                "default_size must be positive, got {width}x{height}"
            )));
        }

        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };

        Ok(Converter {
            settings: Settings {
                pixels_per_unit: self.pixels_per_unit,
                gamma: self.gamma,
                close_epsilon: self.close_epsilon,
                default_size: self.default_size,
                default_name: self.default_name,
                fuse_subpaths: self.fuse_subpaths,
            },
            debug,
        })
    }
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
