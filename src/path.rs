use std::fmt::Write as _;

use crate::error::{Result, SifError};
use crate::types::Point;

/// One absolute-coordinate path primitive.
///
/// Shorthand forms (`H`, `V`, `S`, `T`) and relative commands are resolved while parsing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    CubicTo(Point, Point, Point),
    QuadTo(Point, Point),
    ArcTo {
        rx: f64,
        ry: f64,
        x_axis_rotation: f64,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
    ClosePath,
}

impl PathCommand {
    /// The on-curve point this command ends at. `ClosePath` carries none.
    pub fn end_point(&self) -> Option<Point> {
        match *self {
            PathCommand::MoveTo(p) | PathCommand::LineTo(p) => Some(p),
            PathCommand::CubicTo(_, _, p) | PathCommand::QuadTo(_, p) => Some(p),
            PathCommand::ArcTo { to, .. } => Some(to),
            PathCommand::ClosePath => None,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, PathCommand::MoveTo(_))
    }
}

pub fn move_count(commands: &[PathCommand]) -> usize {
    commands.iter().filter(|c| c.is_move()).count()
}

/// Parses SVG path data into absolute commands.
///
/// Fails with [`SifError::MalformedPath`] when the data does not begin with a moveto, contains
/// an unknown command letter or leaves arguments unconsumed.
pub fn parse_path_data(d: &str) -> Result<Vec<PathCommand>> {
    let mut cmds = Vec::new();
    let mut p = PathParser::new(d);
    let mut cmd = ' ';
    let mut cur = Point::ZERO;
    let mut start = Point::ZERO;
    let mut last_cubic_ctrl2: Option<Point> = None;
    let mut last_quad_ctrl: Option<Point> = None;

    loop {
        p.skip_ws();
        let start_of_step = p.i;
        let Some(c) = p.next_command_or_number(&mut cmd) else {
            break;
        };
        let before = p.i;
        if cmds.is_empty() && !matches!(c, 'M' | 'm') {
            return Err(SifError::MalformedPath(format!(
                "path data must begin with a moveto, found `{c}`"
            )));
        }
        let rel = c.is_ascii_lowercase();
        let abs = |cur: Point, x: f64, y: f64| {
            if rel {
                Point::new(cur.x + x, cur.y + y)
            } else {
                Point::new(x, y)
            }
        };

        match c {
            'M' | 'm' => {
                if let Some((x, y)) = p.next_pair() {
                    cur = abs(cur, x, y);
                    start = cur;
                    cmds.push(PathCommand::MoveTo(cur));
                    // Implicit subsequent pairs are treated as LineTo.
                    while let Some((x, y)) = p.next_pair() {
                        cur = abs(cur, x, y);
                        cmds.push(PathCommand::LineTo(cur));
                    }
                    cmd = if rel { 'l' } else { 'L' };
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'L' | 'l' => {
                while let Some((x, y)) = p.next_pair() {
                    cur = abs(cur, x, y);
                    cmds.push(PathCommand::LineTo(cur));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'H' | 'h' => {
                while let Some(x) = p.next_number() {
                    cur.x = if rel { cur.x + x } else { x };
                    cmds.push(PathCommand::LineTo(cur));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'V' | 'v' => {
                while let Some(y) = p.next_number() {
                    cur.y = if rel { cur.y + y } else { y };
                    cmds.push(PathCommand::LineTo(cur));
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'C' | 'c' => {
                while let Some([x1, y1, x2, y2, x, y]) = p.next_numbers::<6>() {
                    let c1 = abs(cur, x1, y1);
                    let c2 = abs(cur, x2, y2);
                    cur = abs(cur, x, y);
                    cmds.push(PathCommand::CubicTo(c1, c2, cur));
                    last_cubic_ctrl2 = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            'S' | 's' => {
                while let Some([x2, y2, x, y]) = p.next_numbers::<4>() {
                    let c1 = match last_cubic_ctrl2 {
                        Some(prev) => Point::new(2.0 * cur.x - prev.x, 2.0 * cur.y - prev.y),
                        None => cur,
                    };
                    let c2 = abs(cur, x2, y2);
                    cur = abs(cur, x, y);
                    cmds.push(PathCommand::CubicTo(c1, c2, cur));
                    last_cubic_ctrl2 = Some(c2);
                    last_quad_ctrl = None;
                }
            }
            'Q' | 'q' => {
                while let Some([x1, y1, x, y]) = p.next_numbers::<4>() {
                    let q = abs(cur, x1, y1);
                    cur = abs(cur, x, y);
                    cmds.push(PathCommand::QuadTo(q, cur));
                    last_quad_ctrl = Some(q);
                    last_cubic_ctrl2 = None;
                }
            }
            'T' | 't' => {
                while let Some((x, y)) = p.next_pair() {
                    let q = match last_quad_ctrl {
                        Some(prev) => Point::new(2.0 * cur.x - prev.x, 2.0 * cur.y - prev.y),
                        None => cur,
                    };
                    cur = abs(cur, x, y);
                    cmds.push(PathCommand::QuadTo(q, cur));
                    last_quad_ctrl = Some(q);
                    last_cubic_ctrl2 = None;
                }
            }
            'A' | 'a' => {
                while let Some(ArcArgs {
                    rx,
                    ry,
                    rot,
                    large,
                    sweep,
                    x,
                    y,
                }) = p.next_arc()
                {
                    cur = abs(cur, x, y);
                    cmds.push(PathCommand::ArcTo {
                        rx,
                        ry,
                        x_axis_rotation: rot,
                        large_arc: large,
                        sweep,
                        to: cur,
                    });
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'Z' | 'z' => {
                cmds.push(PathCommand::ClosePath);
                cur = start;
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            other => {
                return Err(SifError::MalformedPath(format!(
                    "unknown path command `{other}`"
                )));
            }
        }

        if p.i == start_of_step {
            return Err(SifError::MalformedPath(format!(
                "unexpected input at offset {} in `{d}`",
                p.i
            )));
        }
        if p.i == before {
            p.skip_ws();
            if p.i < p.bytes.len() && !p.bytes[p.i].is_ascii_alphabetic() {
                return Err(SifError::MalformedPath(format!(
                    "unexpected input at offset {} in `{d}`",
                    p.i
                )));
            }
        }
    }

    Ok(cmds)
}

/// Writes commands back as absolute SVG path data.
pub fn format_path(commands: &[PathCommand]) -> String {
    let mut out = String::new();
    for cmd in commands {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = match *cmd {
            PathCommand::MoveTo(p) => write!(out, "M {} {}", p.x, p.y),
            PathCommand::LineTo(p) => write!(out, "L {} {}", p.x, p.y),
            PathCommand::CubicTo(c1, c2, p) => write!(
                out,
                "C {} {} {} {} {} {}",
                c1.x, c1.y, c2.x, c2.y, p.x, p.y
            ),
            PathCommand::QuadTo(q, p) => write!(out, "Q {} {} {} {}", q.x, q.y, p.x, p.y),
            PathCommand::ArcTo {
                rx,
                ry,
                x_axis_rotation,
                large_arc,
                sweep,
                to,
            } => write!(
                out,
                "A {} {} {} {} {} {} {}",
                rx,
                ry,
                x_axis_rotation,
                u8::from(large_arc),
                u8::from(sweep),
                to.x,
                to.y
            ),
            PathCommand::ClosePath => write!(out, "Z"),
        };
    }
    out
}

struct ArcArgs {
    rx: f64,
    ry: f64,
    rot: f64,
    large: bool,
    sweep: bool,
    x: f64,
    y: f64,
}

struct PathParser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i];
            if b == b' ' || b == b'\n' || b == b'\r' || b == b'\t' || b == b',' {
                self.i += 1;
            } else {
                break;
            }
        }
    }

    fn next_command_or_number(&mut self, current: &mut char) -> Option<char> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        let c = self.bytes[self.i] as char;
        if c.is_ascii_alphabetic() && c != 'e' && c != 'E' {
            *current = c;
            self.i += 1;
            return Some(c);
        }
        // No new command; reuse previous.
        Some(*current)
    }

    fn next_number(&mut self) -> Option<f64> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        let start = self.i;
        let mut has = false;

        if matches!(self.bytes[self.i], b'+' | b'-') {
            self.i += 1;
        }
        while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
            self.i += 1;
            has = true;
        }
        if self.i < self.bytes.len() && self.bytes[self.i] == b'.' {
            self.i += 1;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
                has = true;
            }
        }
        if has && self.i < self.bytes.len() && matches!(self.bytes[self.i], b'e' | b'E') {
            let mark = self.i;
            self.i += 1;
            if self.i < self.bytes.len() && matches!(self.bytes[self.i], b'+' | b'-') {
                self.i += 1;
            }
            let digits = self.i;
            while self.i < self.bytes.len() && self.bytes[self.i].is_ascii_digit() {
                self.i += 1;
            }
            if self.i == digits {
                self.i = mark;
            }
        }

        if !has {
            self.i = start;
            return None;
        }

        let s = std::str::from_utf8(&self.bytes[start..self.i]).ok()?;
        s.parse::<f64>().ok()
    }

    fn next_arc_flag(&mut self) -> Option<bool> {
        self.skip_ws();
        if self.i >= self.bytes.len() {
            return None;
        }
        match self.bytes[self.i] {
            b'0' => {
                self.i += 1;
                Some(false)
            }
            b'1' => {
                self.i += 1;
                Some(true)
            }
            _ => None,
        }
    }

    fn next_arc(&mut self) -> Option<ArcArgs> {
        let mark = self.i;
        let parsed = self.read_arc();
        if parsed.is_none() {
            self.i = mark;
        }
        parsed
    }

    fn read_arc(&mut self) -> Option<ArcArgs> {
        let [rx, ry, rot] = self.next_numbers::<3>()?;
        let large = self.next_arc_flag()?;
        let sweep = self.next_arc_flag()?;
        let (x, y) = self.next_pair()?;
        Some(ArcArgs {
            rx,
            ry,
            rot,
            large,
            sweep,
            x,
            y,
        })
    }

    fn next_pair(&mut self) -> Option<(f64, f64)> {
        let mark = self.i;
        let x = self.next_number()?;
        match self.next_number() {
            Some(y) => Some((x, y)),
            None => {
                self.i = mark;
                None
            }
        }
    }

    /// Reads exactly `N` numbers or rewinds.
    fn next_numbers<const N: usize>(&mut self) -> Option<[f64; N]> {
        let mark = self.i;
        let mut out = [0.0; N];
        for slot in out.iter_mut() {
            match self.next_number() {
                Some(v) => *slot = v,
                None => {
                    self.i = mark;
                    return None;
                }
            }
        }
        Some(out)
    }
}
