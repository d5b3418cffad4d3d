//! Turn-by-turn directions and the shareable map link.

use crate::maps::{DirectionsService, Step, MAX_LINK_PLACES};
use crate::place::Place;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};

pub const MAP_LINK_BASE: &str = "https://www.google.com/maps/dir/";

/// Directions for one leg, or the reason they could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegOutcome {
    Steps(Vec<Step>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegDirections {
    pub origin: Place,
    pub destination: Place,
    pub outcome: LegOutcome,
}

/// Fetch directions for every consecutive pair of `places`.
///
/// Legs are independent: a failed leg is recorded in place and the remaining
/// legs are still fetched.
pub fn render_directions<D: DirectionsService + ?Sized>(
    service: &D,
    places: &[Place],
    progress: Option<&ProgressBar>,
) -> Vec<LegDirections> {
    let mut legs = Vec::with_capacity(places.len().saturating_sub(1));
    for pair in places.windows(2) {
        let (origin, destination) = (&pair[0], &pair[1]);
        let outcome = match service.directions(origin, destination) {
            Ok(steps) => LegOutcome::Steps(steps),
            Err(e) => {
                log::warn!("Directions from '{}' to '{}' failed: {}", origin, destination, e);
                LegOutcome::Failed(e.to_string())
            }
        };
        legs.push(LegDirections {
            origin: origin.clone(),
            destination: destination.clone(),
            outcome,
        });
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }
    legs
}

/// Google Maps directions URL through `places` in order.
/// `None` when there are more places than one link can carry.
pub fn map_link(places: &[Place]) -> Option<String> {
    if places.is_empty() || places.len() > MAX_LINK_PLACES {
        return None;
    }
    let path = places
        .iter()
        .map(Place::as_str)
        .collect::<Vec<_>>()
        .join("/")
        .replace(' ', "+");
    Some(format!("{}{}", MAP_LINK_BASE, path))
}

/// Plain-text rendering of an HTML instruction
pub fn strip_html(instruction: &str) -> String {
    let mut out = String::with_capacity(instruction.len());
    let mut rest = instruction;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => {
                let tag = &rest[open + 1..open + close];
                // block elements start a new clause
                if tag.starts_with("div") {
                    out.push(' ');
                }
                rest = &rest[open + close + 1..];
            }
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    out.push_str(rest);

    let out = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
