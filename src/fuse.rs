use crate::error::{Result, SifError};
use crate::path::PathCommand;
use crate::types::Point;

/// Joins the subpaths of a fill-only path into one traversal.
///
/// Each terminator (a close, or a moveto after the first command) is replaced by straight
/// connectors: the point reached just before the terminator is pushed on a return stack, the
/// previously pushed point is popped and connected to, and the next moveto becomes a lineto.
/// A close that ends the data stays as the single close of the result.
///
/// The connectors are visible if the result is stroked, so only fill geometry may go through
/// here.
pub fn fuse_subpaths(mut path: Vec<PathCommand>) -> Result<Vec<PathCommand>> {
    match path.first() {
        None => return Ok(path),
        Some(PathCommand::MoveTo(_)) => {}
        Some(_) => {
            return Err(SifError::MalformedPath(
                "cannot fuse path data that does not begin with a moveto".to_string(),
            ));
        }
    }

    let mut return_stack: Vec<Point> = Vec::new();
    let mut i = 0;
    while i < path.len() {
        if path[i] != PathCommand::ClosePath {
            match path[i] {
                PathCommand::MoveTo(p) if i > 0 => path[i] = PathCommand::LineTo(p),
                _ => {
                    i += 1;
                    continue;
                }
            }
        }

        let mut before_terminator = None;
        if i + 1 < path.len() {
            let prev = i
                .checked_sub(1)
                .and_then(|j| path[j].end_point())
                .ok_or_else(|| {
                    SifError::MalformedPath(format!(
                        "terminator at command {i} has no preceding point"
                    ))
                })?;
            before_terminator = Some(prev);
        }

        if path[i] == PathCommand::ClosePath {
            path.remove(i);
            i -= 1;
        }

        if let Some(back) = return_stack.pop() {
            i += 1;
            path.insert(i, PathCommand::LineTo(back));
        }

        if let Some(prev) = before_terminator {
            return_stack.push(prev);
        }

        if i + 1 < path.len() {
            if let PathCommand::MoveTo(p) = path[i + 1] {
                path[i + 1] = PathCommand::LineTo(p);
            }
        } else {
            path.push(PathCommand::ClosePath);
            break;
        }

        i += 1;
    }

    Ok(path)
}
