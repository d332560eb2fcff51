use crate::coords::CoordMapper;
use crate::error::{Result, SifError};
use crate::geom::Matrix;
use crate::schema::{self, ParamType, ParamValue};
use crate::types::Point;

/// Blend method that paints a layer only where the layers below it are opaque.
pub const BLEND_STRAIGHT_ONTO: i64 = 21;

const DEFAULT_CANVAS_NAME: &str = "Inline Canvas";
const DEFAULT_TRANSFORM_NAME: &str = "Transform";

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: ParamType,
    pub value: ParamValue,
    /// Links every parameter that carries the same guid.
    pub guid: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub kind: String,
    pub desc: String,
    pub version: String,
    pub active: bool,
    pub params: Vec<Param>,
}

impl LayerDescriptor {
    /// Builds a layer of `kind` with every schema parameter, in schema order.
    ///
    /// Values from `provided` win over defaults. Parameters without a default (`bline`,
    /// `canvas`) are only written when provided.
    pub fn create<'a>(
        kind: &str,
        desc: &str,
        provided: impl IntoIterator<Item = (&'a str, ParamValue)>,
    ) -> Result<Self> {
        let specs = schema::default_params(kind)?;
        let mut provided: Vec<(&str, ParamValue)> = provided.into_iter().collect();
        if let Some((name, _)) = provided
            .iter()
            .find(|(name, _)| !specs.iter().any(|spec| spec.name == *name))
        {
            return Err(SifError::Schema(format!(
                "layer `{kind}` has no parameter `{name}`"
            )));
        }

        let mut params = Vec::with_capacity(specs.len());
        for spec in specs {
            let value = match provided.iter().position(|(name, _)| *name == spec.name) {
                Some(idx) => provided.swap_remove(idx).1,
                None => match spec.default.to_value() {
                    Some(value) => value,
                    None => continue,
                },
            };
            check_value(kind, spec.name, spec.ty, &value)?;
            params.push(Param {
                name: spec.name.to_string(),
                ty: spec.ty,
                value,
                guid: None,
            });
        }

        Ok(Self {
            kind: kind.to_string(),
            desc: desc.to_string(),
            version: schema::default_version(kind).to_string(),
            active: true,
            params,
        })
    }

    pub fn get_param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name == name)
    }

    /// Sets `name` to `value`, replacing the existing parameter in place.
    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let ty = schema::type_of(&self.kind, name)?;
        check_value(&self.kind, name, ty, &value)?;
        match self.params.iter_mut().find(|param| param.name == name) {
            Some(param) => {
                param.value = value;
                param.guid = None;
            }
            None => self.params.push(Param {
                name: name.to_string(),
                ty,
                value,
                guid: None,
            }),
        }
        Ok(())
    }

    pub fn set_guid(&mut self, name: &str, guid: &str) -> Result<()> {
        let kind = &self.kind;
        let param = self
            .params
            .iter_mut()
            .find(|param| param.name == name)
            .ok_or_else(|| SifError::Schema(format!("layer `{kind}` has no parameter `{name}`")))?;
        param.guid = Some(guid.to_string());
        Ok(())
    }
}

/// Rejects values that cannot be written as `ty`.
fn check_value(kind: &str, name: &str, ty: ParamType, value: &ParamValue) -> Result<()> {
    let ok = match ty {
        ParamType::Real => value.as_number().is_some(),
        ParamType::Integer => matches!(value, ParamValue::Integer(_)),
        ParamType::Vector => value.as_point().is_some(),
        ParamType::Color => value.as_color().is_some(),
        ParamType::Gradient => matches!(value, ParamValue::Gradient(_)),
        ParamType::Bool => matches!(value, ParamValue::Bool(_)),
        ParamType::Time => matches!(value, ParamValue::Time(_) | ParamValue::String(_)),
        ParamType::Bline => matches!(value, ParamValue::Bline(_)),
        ParamType::String => matches!(value, ParamValue::String(_)),
        ParamType::Canvas => matches!(value, ParamValue::Canvas(_)),
    };
    if ok {
        Ok(())
    } else {
        Err(SifError::Schema(format!(
            "parameter `{name}` of `{kind}` expects a {ty} value, got {value:?}"
        )))
    }
}

/// Wraps `layers` into a single `PasteCanvas`. An empty list stays empty.
pub fn encapsulate(
    layers: Vec<LayerDescriptor>,
    name: Option<&str>,
) -> Result<Vec<LayerDescriptor>> {
    if layers.is_empty() {
        return Ok(layers);
    }
    let canvas = LayerDescriptor::create(
        "PasteCanvas",
        name.unwrap_or(DEFAULT_CANVAS_NAME),
        [("canvas", ParamValue::Canvas(layers))],
    )?;
    Ok(vec![canvas])
}

/// Paints `overlay` onto `layers` with the straight-onto blend method.
///
/// With `is_end` the result is left flat, for use at the end of a canvas; otherwise it is
/// encapsulated.
pub fn color_overlay(
    mut layers: Vec<LayerDescriptor>,
    overlay: Option<LayerDescriptor>,
    is_end: bool,
) -> Result<Vec<LayerDescriptor>> {
    let Some(overlay) = overlay else {
        return Ok(layers);
    };
    if layers.is_empty() {
        return Ok(layers);
    }

    let mut overlay_enc = encapsulate(vec![overlay], None)?;
    for layer in &mut overlay_enc {
        layer.set_param("blend_method", ParamValue::Integer(BLEND_STRAIGHT_ONTO))?;
    }
    layers.extend(overlay_enc);

    if is_end {
        Ok(layers)
    } else {
        encapsulate(layers, None)
    }
}

/// Distorts `layers` by `matrix` with a `warp` layer. Identity matrices leave the layers
/// untouched.
pub fn transform_warp(
    mut layers: Vec<LayerDescriptor>,
    matrix: Matrix,
    mapper: &CoordMapper,
    is_end: bool,
) -> Result<Vec<LayerDescriptor>> {
    if layers.is_empty() || matrix.is_identity() {
        return Ok(layers);
    }

    let src_tl = Point::new(100.0, 100.0);
    let src_br = Point::new(200.0, 200.0);
    let dest = |x: f64, y: f64| ParamValue::vector(mapper.to_units(matrix.apply(Point::new(x, y))));

    let warp = LayerDescriptor::create(
        "warp",
        DEFAULT_TRANSFORM_NAME,
        [
            ("src_tl", ParamValue::vector(mapper.to_units(src_tl))),
            ("src_br", ParamValue::vector(mapper.to_units(src_br))),
            ("dest_tl", dest(100.0, 100.0)),
            ("dest_tr", dest(200.0, 100.0)),
            ("dest_br", dest(200.0, 200.0)),
            ("dest_bl", dest(100.0, 200.0)),
        ],
    )?;
    layers.push(warp);

    if is_end {
        Ok(layers)
    } else {
        encapsulate(layers, None)
    }
}
