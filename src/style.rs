use std::collections::BTreeMap;
use std::fmt;

use lightningcss::properties::Property;
use lightningcss::properties::svg::{SVGPaint, SVGPaintFallback};
use lightningcss::stylesheet::{ParserOptions, StyleAttribute};
use lightningcss::values::color::{CssColor, SRGB};

use crate::types::Color;

/// Which half of a fill/stroke split a style property belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyRole {
    Fill,
    Stroke,
    /// Stays on the wrapping container and is never duplicated.
    Container,
    /// Copied to both halves.
    Shared,
}

impl PropertyRole {
    fn for_name(name: &str) -> Self {
        if name.starts_with("fill") {
            PropertyRole::Fill
        } else if name.starts_with("stroke") || name.starts_with("marker") {
            PropertyRole::Stroke
        } else if name.starts_with("filter") {
            PropertyRole::Container
        } else {
            PropertyRole::Shared
        }
    }
}

/// Style properties the converter understands, plus a pass-through bucket for everything else.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StyleKey {
    Fill,
    FillOpacity,
    FillRule,
    Stroke,
    StrokeWidth,
    StrokeOpacity,
    StrokeLinecap,
    StrokeLinejoin,
    StrokeMiterlimit,
    StrokeDasharray,
    StrokeDashoffset,
    Marker,
    MarkerStart,
    MarkerMid,
    MarkerEnd,
    Opacity,
    Filter,
    StopColor,
    StopOpacity,
    Unknown(PropertyRole, String),
}

impl StyleKey {
    pub fn parse(raw: &str) -> Self {
        let name = raw.trim().to_ascii_lowercase();
        match name.as_str() {
            "fill" => StyleKey::Fill,
            "fill-opacity" => StyleKey::FillOpacity,
            "fill-rule" => StyleKey::FillRule,
            "stroke" => StyleKey::Stroke,
            "stroke-width" => StyleKey::StrokeWidth,
            "stroke-opacity" => StyleKey::StrokeOpacity,
            "stroke-linecap" => StyleKey::StrokeLinecap,
            "stroke-linejoin" => StyleKey::StrokeLinejoin,
            "stroke-miterlimit" => StyleKey::StrokeMiterlimit,
            "stroke-dasharray" => StyleKey::StrokeDasharray,
            "stroke-dashoffset" => StyleKey::StrokeDashoffset,
            "marker" => StyleKey::Marker,
            "marker-start" => StyleKey::MarkerStart,
            "marker-mid" => StyleKey::MarkerMid,
            "marker-end" => StyleKey::MarkerEnd,
            "opacity" => StyleKey::Opacity,
            "filter" => StyleKey::Filter,
            "stop-color" => StyleKey::StopColor,
            "stop-opacity" => StyleKey::StopOpacity,
            _ => StyleKey::Unknown(PropertyRole::for_name(&name), name),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StyleKey::Fill => "fill",
            StyleKey::FillOpacity => "fill-opacity",
            StyleKey::FillRule => "fill-rule",
            StyleKey::Stroke => "stroke",
            StyleKey::StrokeWidth => "stroke-width",
            StyleKey::StrokeOpacity => "stroke-opacity",
            StyleKey::StrokeLinecap => "stroke-linecap",
            StyleKey::StrokeLinejoin => "stroke-linejoin",
            StyleKey::StrokeMiterlimit => "stroke-miterlimit",
            StyleKey::StrokeDasharray => "stroke-dasharray",
            StyleKey::StrokeDashoffset => "stroke-dashoffset",
            StyleKey::Marker => "marker",
            StyleKey::MarkerStart => "marker-start",
            StyleKey::MarkerMid => "marker-mid",
            StyleKey::MarkerEnd => "marker-end",
            StyleKey::Opacity => "opacity",
            StyleKey::Filter => "filter",
            StyleKey::StopColor => "stop-color",
            StyleKey::StopOpacity => "stop-opacity",
            StyleKey::Unknown(_, name) => name,
        }
    }

    pub fn role(&self) -> PropertyRole {
        match self {
            StyleKey::Fill | StyleKey::FillOpacity | StyleKey::FillRule => PropertyRole::Fill,
            StyleKey::Stroke
            | StyleKey::StrokeWidth
            | StyleKey::StrokeOpacity
            | StyleKey::StrokeLinecap
            | StyleKey::StrokeLinejoin
            | StyleKey::StrokeMiterlimit
            | StyleKey::StrokeDasharray
            | StyleKey::StrokeDashoffset
            | StyleKey::Marker
            | StyleKey::MarkerStart
            | StyleKey::MarkerMid
            | StyleKey::MarkerEnd => PropertyRole::Stroke,
            StyleKey::Filter => PropertyRole::Container,
            StyleKey::Opacity | StyleKey::StopColor | StyleKey::StopOpacity => PropertyRole::Shared,
            StyleKey::Unknown(role, _) => *role,
        }
    }

    /// Keys that apply to the element they are set on and are not inherited by children.
    pub fn is_non_propagating(&self) -> bool {
        matches!(self, StyleKey::Filter)
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `style` attribute. Keys are unique; later declarations win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    entries: BTreeMap<StyleKey, String>,
}

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `style` attribute. Comments are dropped, and an `!important` declaration is
    /// not overridden by a later plain one.
    pub fn parse(input: &str) -> Self {
        let mut style = Style::new();
        let mut important: Vec<StyleKey> = Vec::new();
        for decl in strip_comments(input).split(';') {
            let decl = decl.trim();
            if decl.is_empty() {
                continue;
            }
            let Some((k, v)) = decl.split_once(':') else {
                continue;
            };
            let key = StyleKey::parse(k);
            if key.as_str().is_empty() {
                continue;
            }
            let (value, is_important) = split_important(v);
            if is_important {
                important.push(key.clone());
            } else if important.contains(&key) {
                continue;
            }
            style.set(key, value);
        }
        style
    }

    pub fn get(&self, key: &StyleKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &StyleKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn set(&mut self, key: StyleKey, value: impl Into<String>) {
        self.entries.insert(key, value.into());
    }

    pub fn remove(&mut self, key: &StyleKey) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StyleKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// `self` overlaid with `own`; values from `own` win.
    pub fn merged(&self, own: &Style) -> Style {
        let mut out = self.clone();
        for (k, v) in &own.entries {
            out.entries.insert(k.clone(), v.clone());
        }
        out
    }

    /// Splits into `(propagating, non_propagating)`.
    pub fn partition_propagating(self) -> (Style, Style) {
        let (non_propagating, propagating): (BTreeMap<_, _>, BTreeMap<_, _>) = self
            .entries
            .into_iter()
            .partition(|(k, _)| k.is_non_propagating());
        (
            Style {
                entries: propagating,
            },
            Style {
                entries: non_propagating,
            },
        )
    }

    /// Keeps only the entries whose role satisfies `keep`.
    pub fn filter_roles(&self, keep: impl Fn(PropertyRole) -> bool) -> Style {
        Style {
            entries: self
                .entries
                .iter()
                .filter(|(k, _)| keep(k.role()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn paint(&self, key: &StyleKey) -> Option<Paint> {
        self.get(key).map(Paint::parse)
    }

    /// Numeric value of `key`, or `None` when absent or unparsable.
    pub fn number(&self, key: &StyleKey) -> Option<f64> {
        self.get(key).and_then(|v| v.trim().parse::<f64>().ok())
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (k, v)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            write!(f, "{k}:{v}")?;
        }
        Ok(())
    }
}

/// An sRGB color as written in the source, 0..=255 per channel plus alpha in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f64,
}

impl Rgb8 {
    pub const BLACK: Rgb8 = Rgb8 {
        r: 0,
        g: 0,
        b: 0,
        alpha: 1.0,
    };

    /// Linearizes each channel with `gamma` and multiplies the alpha by `opacity`.
    pub fn to_color(self, gamma: f64, opacity: f64) -> Color {
        let ch = |c: u8| libm::pow(c as f64 / 255.0, gamma);
        Color::rgba(ch(self.r), ch(self.g), ch(self.b), self.alpha * opacity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    None,
    Color(Rgb8),
    /// `url(#id)` reference to a paint server.
    Url(String),
    /// Anything we cannot interpret (e.g. `currentColor`).
    Unsupported(String),
}

impl Paint {
    pub fn parse(input: &str) -> Self {
        let v = input.trim();
        if v.eq_ignore_ascii_case("none") {
            return Paint::None;
        }
        let decl = format!("fill:{v}");
        if let Ok(style_attr) = StyleAttribute::parse(&decl, ParserOptions::default()) {
            for prop in &style_attr.declarations.declarations {
                if let Property::Fill(paint) = prop {
                    if let Some(out) = paint_from_css(paint) {
                        return out;
                    }
                }
            }
        }
        if let Some(id) = parse_url_ref(v) {
            return Paint::Url(id);
        }
        match parse_color(v) {
            Some(c) => Paint::Color(c),
            None => Paint::Unsupported(v.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Paint::None)
    }
}

fn paint_from_css(paint: &SVGPaint<'_>) -> Option<Paint> {
    match paint {
        SVGPaint::None => Some(Paint::None),
        SVGPaint::Color(color) => css_color_to_rgb(color).map(Paint::Color),
        SVGPaint::Url { url, fallback } => {
            let raw = url.url.as_ref().trim();
            if let Some(id) = raw.strip_prefix('#') {
                if !id.is_empty() {
                    return Some(Paint::Url(id.to_string()));
                }
            }
            match fallback {
                Some(SVGPaintFallback::Color(color)) => css_color_to_rgb(color).map(Paint::Color),
                Some(SVGPaintFallback::None) => Some(Paint::None),
                None => None,
            }
        }
        SVGPaint::ContextFill | SVGPaint::ContextStroke => None,
    }
}

fn css_color_to_rgb(color: &CssColor) -> Option<Rgb8> {
    if let CssColor::RGBA(rgba) = color {
        return Some(Rgb8 {
            r: rgba.red,
            g: rgba.green,
            b: rgba.blue,
            alpha: (rgba.alpha as f64 / 255.0).clamp(0.0, 1.0),
        });
    }
    if let Ok(srgb) = SRGB::try_from(color) {
        let ch = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        return Some(Rgb8 {
            r: ch(srgb.r),
            g: ch(srgb.g),
            b: ch(srgb.b),
            alpha: (srgb.alpha as f64).clamp(0.0, 1.0),
        });
    }
    None
}

fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find("/*") {
        out.push_str(&rest[..open]);
        match rest[open + 2..].find("*/") {
            Some(close) => rest = &rest[open + 2 + close + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Value without a trailing `!important`, and whether it was there.
fn split_important(value: &str) -> (&str, bool) {
    let value = value.trim();
    if let Some(bang) = value.rfind('!') {
        if value[bang + 1..].trim().eq_ignore_ascii_case("important") {
            return (value[..bang].trim_end(), true);
        }
    }
    (value, false)
}

/// Parses a CSS color value such as a `stop-color`.
pub fn parse_color(input: &str) -> Option<Rgb8> {
    let v = input.trim();
    let decl = format!("color:{v}");
    if let Ok(style_attr) = StyleAttribute::parse(&decl, ParserOptions::default()) {
        for prop in &style_attr.declarations.declarations {
            if let Property::Color(color) = prop {
                if let Some(c) = css_color_to_rgb(color) {
                    return Some(c);
                }
            }
        }
    }
    parse_color_legacy(v)
}

fn parse_color_legacy(v: &str) -> Option<Rgb8> {
    let rgb = |r, g, b| Rgb8 {
        r,
        g,
        b,
        alpha: 1.0,
    };
    if let Some(hex) = v.strip_prefix('#') {
        let digit = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            6 => Some(rgb(digit(&hex[0..2])?, digit(&hex[2..4])?, digit(&hex[4..6])?)),
            3 => {
                let r = digit(&hex[0..1])?;
                let g = digit(&hex[1..2])?;
                let b = digit(&hex[2..3])?;
                Some(rgb(r * 17, g * 17, b * 17))
            }
            _ => None,
        };
    }
    match v.to_ascii_lowercase().as_str() {
        "black" => Some(rgb(0, 0, 0)),
        "white" => Some(rgb(255, 255, 255)),
        "red" => Some(rgb(255, 0, 0)),
        "green" => Some(rgb(0, 128, 0)),
        "blue" => Some(rgb(0, 0, 255)),
        _ => None,
    }
}

fn parse_url_ref(input: &str) -> Option<String> {
    let s = input.trim();
    if !s.to_ascii_lowercase().starts_with("url(") {
        return None;
    }
    let open = s.find('(')?;
    let close = s.rfind(')')?;
    if close <= open + 1 {
        return None;
    }
    let inner = s[open + 1..close]
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    let id = inner.strip_prefix('#')?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

/// Color of `color_key` after gamma adjustment, with alpha multiplied by every present
/// opacity key. A missing color key yields black.
pub fn extract_color(
    style: &Style,
    color_key: &StyleKey,
    opacity_keys: &[StyleKey],
    gamma: f64,
) -> Color {
    let rgb = match style.paint(color_key) {
        Some(Paint::Color(c)) => c,
        Some(Paint::None) | None => Rgb8::BLACK,
        Some(other) => {
            log::warn!("cannot use {other:?} as a flat {color_key} color; using black");
            Rgb8::BLACK
        }
    };
    let mut opacity = 1.0;
    for key in opacity_keys {
        if let Some(raw) = style.get(key) {
            match raw.trim().parse::<f64>() {
                Ok(v) => opacity *= v,
                Err(_) => log::warn!("ignoring unparsable {key} value `{raw}`"),
            }
        }
    }
    rgb.to_color(gamma, opacity)
}

/// Converts a length with an optional unit suffix to pixels.
///
/// Empty input is `0`; percentages and unrecognized units fall back to `1024`.
pub fn parse_dimension(input: &str) -> f64 {
    const FALLBACK: f64 = 1024.0;
    let s = input.trim();
    if s.is_empty() {
        return 0.0;
    }
    if s.ends_with(|c: char| c.is_ascii_digit()) {
        return s.parse::<f64>().unwrap_or(FALLBACK);
    }
    if s.ends_with('%') {
        return FALLBACK;
    }
    const UNITS: [(&str, f64); 7] = [
        ("px", 1.0),
        ("pt", 1.25),
        ("em", 16.0),
        ("mm", 3.54),
        ("pc", 15.0),
        ("cm", 35.43),
        ("in", 90.0),
    ];
    for (suffix, factor) in UNITS {
        if let Some(num) = s.strip_suffix(suffix) {
            return num
                .trim()
                .parse::<f64>()
                .map(|v| v * factor)
                .unwrap_or(FALLBACK);
        }
    }
    FALLBACK
}
