//! Heuristic search for geographic data: coordinate-looking text, location
//! parameter names, well-known simulator home positions and `f32` values in
//! coordinate range.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

pub const LOCATION_KEYWORDS: &[&str] = &[
    "HOME",
    "FENCE",
    "GEOFENCE",
    "ORIGIN",
    "TAKEOFF",
    "LAND",
    "RTL",
    "WAYPOINT",
    "MISSION",
    "GPS",
    "LAT",
    "LNG",
    "LATITUDE",
    "LONGITUDE",
];

/// Default home positions used by common simulator setups.
pub const KNOWN_TEST_LOCATIONS: &[&str] =
    &["37.761169", "-122.494194", "35.432778", "149.165222", "40.071374", "-105.220780"];

const PARAMETER_PATTERNS: &[(&str, &str)] = &[
    ("HOME_LAT", r"(?i-u)HOME_LAT[^a-z][^0-9]*-?[0-9]+\.?[0-9]*"),
    ("HOME_LNG", r"(?i-u)HOME_LNG[^a-z][^0-9]*-?[0-9]+\.?[0-9]*"),
    ("FENCE_LAT", r"(?i-u)FENCE_LAT[^a-z][^0-9]*-?[0-9]+\.?[0-9]*"),
    ("FENCE_LNG", r"(?i-u)FENCE_LNG[^a-z][^0-9]*-?[0-9]+\.?[0-9]*"),
    ("WPNAV_SPEED", r"(?i-u)WPNAV_SPEED[^a-z][^0-9]*[0-9]+"),
    ("RTL_ALT", r"(?i-u)RTL_ALT[^a-z][^0-9]*[0-9]+"),
];

const MAX_COORDINATES: usize = 10;
const MAX_KEYWORD_CONTEXTS: usize = 15;
const MAX_PARAMETER_SAMPLES: usize = 3;
const MAX_FLOAT_COORDINATES: usize = 10;
const KEYWORD_CONTEXT_RADIUS: usize = 30;
const TEST_LOCATION_CONTEXT_RADIUS: usize = 50;
const MIN_CONTEXT_LEN: usize = 10;
const FLOAT_DUPLICATE_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub coordinates: Vec<String>,
    pub keyword_contexts: Vec<String>,
    pub parameter_defaults: Vec<ParameterMatch>,
    pub known_test_locations: Vec<KnownLocationHit>,
    pub float_coordinates: Vec<FloatCoordinate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMatch {
    pub parameter: String,
    pub count: usize,
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownLocationHit {
    pub value: String,
    pub offset: usize,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatCoordinate {
    pub offset: usize,
    pub value: f32,
}

pub fn scan_locations(data: &[u8]) -> LocationReport {
    LocationReport {
        coordinates: find_coordinates(data),
        keyword_contexts: find_keyword_contexts(data),
        parameter_defaults: find_parameter_defaults(data),
        known_test_locations: find_known_test_locations(data),
        float_coordinates: find_float_coordinates(data),
    }
}

fn coordinate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?-u)-?[0-9]{1,3}\.[0-9]{4,8}|HOME_LAT|HOME_LNG|FENCE_LAT|FENCE_LNG")
            .expect("regex")
    })
}

fn parameter_regexes() -> &'static [(&'static str, Regex)] {
    static RES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RES.get_or_init(|| {
        PARAMETER_PATTERNS
            .iter()
            .map(|(name, pattern)| (*name, Regex::new(pattern).expect("regex")))
            .collect()
    })
}

/// Decimal numbers within ±180 and location parameter names, unique and sorted.
pub fn find_coordinates(data: &[u8]) -> Vec<String> {
    let mut found = BTreeSet::new();
    for m in coordinate_regex().find_iter(data) {
        let Ok(text) = std::str::from_utf8(m.as_bytes()) else { continue };
        let valid = match text.parse::<f64>() {
            Ok(value) => (-180.0..=180.0).contains(&value),
            Err(_) => true,
        };
        if valid {
            found.insert(text.to_string());
        }
    }
    found.into_iter().take(MAX_COORDINATES).collect()
}

/// Printable neighbourhoods of every location keyword, unique and sorted.
pub fn find_keyword_contexts(data: &[u8]) -> Vec<String> {
    let upper = data.to_ascii_uppercase();
    let mut found = BTreeSet::new();
    for keyword in LOCATION_KEYWORDS {
        for pos in occurrences(&upper, keyword.as_bytes()) {
            let start = pos.saturating_sub(KEYWORD_CONTEXT_RADIUS);
            let end = data.len().min(pos + keyword.len() + KEYWORD_CONTEXT_RADIUS);
            let context = collapse_whitespace(&printable_only(&data[start..end]));
            if context.len() > MIN_CONTEXT_LEN {
                found.insert(context);
            }
        }
    }
    found.into_iter().take(MAX_KEYWORD_CONTEXTS).collect()
}

pub fn find_parameter_defaults(data: &[u8]) -> Vec<ParameterMatch> {
    parameter_regexes()
        .iter()
        .filter_map(|(name, re)| {
            let matches: Vec<_> = re.find_iter(data).collect();
            if matches.is_empty() {
                return None;
            }
            Some(ParameterMatch {
                parameter: name.to_string(),
                count: matches.len(),
                samples: matches
                    .iter()
                    .take(MAX_PARAMETER_SAMPLES)
                    .map(|m| printable_only(m.as_bytes()))
                    .collect(),
            })
        })
        .collect()
}

pub fn find_known_test_locations(data: &[u8]) -> Vec<KnownLocationHit> {
    KNOWN_TEST_LOCATIONS
        .iter()
        .filter_map(|value| {
            let offset = occurrences(data, value.as_bytes()).next()?;
            let start = offset.saturating_sub(TEST_LOCATION_CONTEXT_RADIUS);
            let end = data.len().min(offset + TEST_LOCATION_CONTEXT_RADIUS);
            Some(KnownLocationHit {
                value: value.to_string(),
                offset,
                context: printable_only(&data[start..end]),
            })
        })
        .collect()
}

/// Little-endian `f32` words at aligned offsets with `1 < |v| <= 180`.
///
/// Values within 0.001 of each other collapse into the one found first in the
/// image. Survivors are ordered by magnitude, largest first.
pub fn find_float_coordinates(data: &[u8]) -> Vec<FloatCoordinate> {
    let mut candidates: Vec<FloatCoordinate> = data
        .chunks_exact(4)
        .enumerate()
        .filter_map(|(i, word)| {
            let value = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            let magnitude = value.abs();
            (value.is_finite() && magnitude > 1.0 && magnitude <= 180.0)
                .then_some(FloatCoordinate { offset: i * 4, value })
        })
        .collect();

    candidates.sort_by(|a, b| a.value.total_cmp(&b.value).then(a.offset.cmp(&b.offset)));
    let mut unique: Vec<FloatCoordinate> = Vec::new();
    let mut anchor = f32::NAN;
    for candidate in candidates {
        match unique.last_mut() {
            Some(kept) if (candidate.value - anchor).abs() < FLOAT_DUPLICATE_EPSILON => {
                if candidate.offset < kept.offset {
                    *kept = candidate;
                }
            }
            _ => {
                anchor = candidate.value;
                unique.push(candidate);
            }
        }
    }

    unique.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()).then(a.offset.cmp(&b.offset)));
    unique.truncate(MAX_FLOAT_COORDINATES);
    unique
}

fn occurrences<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    haystack
        .windows(needle.len().max(1))
        .enumerate()
        .filter(move |(_, window)| *window == needle)
        .map(|(pos, _)| pos)
}

fn printable_only(bytes: &[u8]) -> String {
    bytes.iter().filter(|b| (0x20..=0x7E).contains(*b)).map(|&b| b as char).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
