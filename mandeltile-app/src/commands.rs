//! Parsing of the navigation commands given on the command line.

use mandeltile_core::{Direction, ViewCommand};

fn parse_pair(args: &str) -> Result<(f64, f64), String> {
    let (a, b) = args
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated numbers, got '{args}'"))?;
    let a = a.trim().parse::<f64>().map_err(|e| format!("'{a}': {e}"))?;
    let b = b.trim().parse::<f64>().map_err(|e| format!("'{b}': {e}"))?;
    Ok((a, b))
}

/// Parse one command: `reset`, `more`, `fewer`, `zoom-out`, `up`, `down`,
/// `left`, `right`, `zoom-in:PX,PY` or `pan:DX,DY`.
pub fn parse_command(s: &str) -> Result<ViewCommand, String> {
    let (name, args) = match s.split_once(':') {
        Some((name, args)) => (name, Some(args)),
        None => (s, None),
    };
    let command = match (name, args) {
        ("reset", None) => ViewCommand::Reset,
        ("more", None) => ViewCommand::MoreIterations,
        ("fewer", None) => ViewCommand::FewerIterations,
        ("zoom-out", None) => ViewCommand::ZoomOut,
        ("up", None) => ViewCommand::Nudge(Direction::Up),
        ("down", None) => ViewCommand::Nudge(Direction::Down),
        ("left", None) => ViewCommand::Nudge(Direction::Left),
        ("right", None) => ViewCommand::Nudge(Direction::Right),
        ("zoom-in", Some(args)) => {
            let (px, py) = parse_pair(args)?;
            ViewCommand::ZoomIn { px, py }
        }
        ("pan", Some(args)) => {
            let (dx, dy) = parse_pair(args)?;
            ViewCommand::Pan { dx, dy }
        }
        _ => return Err(format!("unknown command '{s}'")),
    };
    Ok(command)
}
