use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::error::{Result, SifError};
use crate::geom::Matrix;
use crate::types::{Color, Point};

/// Color stops keyed by position. Positions are unique and kept in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradientStops {
    stops: Vec<(f64, Color)>,
}

impl GradientStops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a stop, replacing any stop already at `position`.
    pub fn insert(&mut self, position: f64, color: Color) {
        match self
            .stops
            .binary_search_by(|(p, _)| p.total_cmp(&position))
        {
            Ok(idx) => self.stops[idx].1 = color,
            Err(idx) => self.stops.insert(idx, (position, color)),
        }
    }

    pub fn get(&self, position: f64) -> Option<Color> {
        self.stops
            .iter()
            .find(|(p, _)| *p == position)
            .map(|(_, c)| *c)
    }

    pub fn contains_position(&self, position: f64) -> bool {
        self.get(position).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, Color)> + '_ {
        self.stops.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }
}

impl FromIterator<(f64, Color)> for GradientStops {
    fn from_iter<I: IntoIterator<Item = (f64, Color)>>(iter: I) -> Self {
        let mut out = GradientStops::new();
        for (pos, color) in iter {
            out.insert(pos, color);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientGeometry {
    Linear { p1: Point, p2: Point },
    Radial { center: Point, radius: f64, focus: Point },
}

/// Where a gradient gets its colors from.
#[derive(Debug, Clone, PartialEq)]
pub enum StopSource {
    Stops(GradientStops),
    /// Id of another gradient whose stops are shared.
    Link(String),
}

/// A gradient with its stops resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub id: String,
    pub geometry: GradientGeometry,
    pub matrix: Matrix,
    pub stops: GradientStops,
    /// Shared by every gradient that uses the same stops.
    pub stops_guid: String,
}

#[derive(Debug, Clone)]
enum EntryStops {
    Owned { stops: GradientStops, guid: String },
    Link(String),
}

#[derive(Debug, Clone)]
struct Entry {
    geometry: GradientGeometry,
    matrix: Matrix,
    stops: EntryStops,
}

/// Gradient definitions by id, with link chains resolved lazily and memoized.
#[derive(Debug, Default)]
pub struct GradientTable {
    entries: HashMap<String, Entry>,
    links_walked: usize,
}

impl GradientTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_linear(
        &mut self,
        id: &str,
        p1: Point,
        p2: Point,
        matrix: Matrix,
        source: StopSource,
    ) -> Result<()> {
        self.add(id, GradientGeometry::Linear { p1, p2 }, matrix, source)
    }

    pub fn add_radial(
        &mut self,
        id: &str,
        center: Point,
        radius: f64,
        focus: Point,
        matrix: Matrix,
        source: StopSource,
    ) -> Result<()> {
        self.add(
            id,
            GradientGeometry::Radial {
                center,
                radius,
                focus,
            },
            matrix,
            source,
        )
    }

    pub fn add(
        &mut self,
        id: &str,
        geometry: GradientGeometry,
        matrix: Matrix,
        source: StopSource,
    ) -> Result<()> {
        let stops = match source {
            StopSource::Stops(stops) if !stops.is_empty() => {
                let guid = stops_guid(id, &stops);
                EntryStops::Owned { stops, guid }
            }
            StopSource::Link(target) if !target.is_empty() => EntryStops::Link(target),
            _ => return Err(SifError::InvalidGradient(id.to_string())),
        };
        log::debug!("registered gradient `{id}`");
        self.entries.insert(
            id.to_string(),
            Entry {
                geometry,
                matrix,
                stops,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of link hops followed by [`GradientTable::resolve`] so far.
    pub fn links_walked(&self) -> usize {
        self.links_walked
    }

    /// Looks up `id`, following links to the gradient that owns the stops.
    ///
    /// Returns `Ok(None)` for an unknown id. Every gradient on the walked chain is rewritten to
    /// own the resolved stops, so later lookups do not walk again.
    pub fn resolve(&mut self, id: &str) -> Result<Option<Gradient>> {
        if !self.entries.contains_key(id) {
            return Ok(None);
        }

        let mut chain = vec![id.to_string()];
        let mut visited: HashSet<String> = HashSet::from([id.to_string()]);
        let mut current = id.to_string();
        let (stops, guid) = loop {
            let Some(entry) = self.entries.get(&current) else {
                return Ok(None);
            };
            match &entry.stops {
                EntryStops::Owned { stops, guid } => break (stops.clone(), guid.clone()),
                EntryStops::Link(target) => {
                    if !visited.insert(target.clone()) {
                        return Err(SifError::GradientCycle(id.to_string()));
                    }
                    if !self.entries.contains_key(target) {
                        return Err(SifError::UnresolvedLink {
                            from: current.clone(),
                            to: target.clone(),
                        });
                    }
                    self.links_walked += 1;
                    current = target.clone();
                    chain.push(current.clone());
                }
            }
        };

        for link in &chain {
            if let Some(entry) = self.entries.get_mut(link) {
                if matches!(entry.stops, EntryStops::Link(_)) {
                    entry.stops = EntryStops::Owned {
                        stops: stops.clone(),
                        guid: guid.clone(),
                    };
                }
            }
        }

        Ok(self.entries.get(id).map(|entry| Gradient {
            id: id.to_string(),
            geometry: entry.geometry,
            matrix: entry.matrix,
            stops,
            stops_guid: guid,
        }))
    }
}

/// Stable identifier for a stops set, derived from its owner and contents.
fn stops_guid(id: &str, stops: &GradientStops) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    for (pos, color) in stops.iter() {
        hasher.update(pos.to_le_bytes());
        for c in color.components() {
            hasher.update(c.to_le_bytes());
        }
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_stops() -> GradientStops {
        [(0.0, Color::BLACK), (1.0, Color::WHITE)]
            .into_iter()
            .collect()
    }

    fn link(table: &mut GradientTable, id: &str, to: &str) {
        table
            .add_linear(
                id,
                Point::ZERO,
                Point::new(10.0, 0.0),
                Matrix::identity(),
                StopSource::Link(to.to_string()),
            )
            .unwrap();
    }

    #[test]
    fn stops_stay_sorted_and_unique() {
        let mut stops = GradientStops::new();
        stops.insert(1.0, Color::WHITE);
        stops.insert(0.0, Color::BLACK);
        stops.insert(0.5, Color::WHITE);
        stops.insert(0.5, Color::BLACK);
        let positions: Vec<f64> = stops.iter().map(|(p, _)| p).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.0]);
        assert_eq!(stops.get(0.5), Some(Color::BLACK));
    }

    #[test]
    fn link_chain_resolves_once() {
        let mut table = GradientTable::new();
        table
            .add_radial(
                "C",
                Point::new(5.0, 5.0),
                5.0,
                Point::new(5.0, 5.0),
                Matrix::identity(),
                StopSource::Stops(two_stops()),
            )
            .unwrap();
        link(&mut table, "B", "C");
        link(&mut table, "A", "B");

        let a = table.resolve("A").unwrap().unwrap();
        let c = table.resolve("C").unwrap().unwrap();
        assert_eq!(a.stops, c.stops);
        assert_eq!(a.stops_guid, c.stops_guid);
        assert!(matches!(a.geometry, GradientGeometry::Linear { .. }));
        assert_eq!(table.links_walked(), 2);

        let again = table.resolve("A").unwrap().unwrap();
        assert_eq!(again.stops, c.stops);
        assert_eq!(table.links_walked(), 2);
        table.resolve("B").unwrap();
        assert_eq!(table.links_walked(), 2);
    }

    #[test]
    fn unknown_id_is_none() {
        let mut table = GradientTable::new();
        assert!(table.resolve("nope").unwrap().is_none());
    }

    #[test]
    fn missing_link_target_fails() {
        let mut table = GradientTable::new();
        link(&mut table, "A", "ghost");
        let err = table.resolve("A").unwrap_err();
        assert!(matches!(
            err,
            SifError::UnresolvedLink { ref from, ref to } if from == "A" && to == "ghost"
        ));
    }

    #[test]
    fn cyclic_links_fail() {
        let mut table = GradientTable::new();
        link(&mut table, "A", "B");
        link(&mut table, "B", "A");
        assert!(matches!(
            table.resolve("A"),
            Err(SifError::GradientCycle(_))
        ));
        link(&mut table, "self", "self");
        assert!(matches!(
            table.resolve("self"),
            Err(SifError::GradientCycle(_))
        ));
    }

    #[test]
    fn gradient_needs_stops_or_link() {
        let mut table = GradientTable::new();
        let err = table
            .add_linear(
                "empty",
                Point::ZERO,
                Point::ZERO,
                Matrix::identity(),
                StopSource::Stops(GradientStops::new()),
            )
            .unwrap_err();
        assert!(matches!(err, SifError::InvalidGradient(_)));
    }

    #[test]
    fn guid_depends_on_stops() {
        let mut other = two_stops();
        other.insert(0.5, Color::WHITE);
        assert_ne!(stops_guid("g", &two_stops()), stops_guid("g", &other));
        assert_eq!(stops_guid("g", &two_stops()).len(), 64);
    }
}
