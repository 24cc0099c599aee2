// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-tour file labels built from a user-chosen field selection.
//!
//! Convention: `{field1}_{field2}_…`, each field sanitized so `_` only ever
//! appears as the separator. Tours whose label is shared with another tour
//! in the same batch get `_{tour_id}` appended.

use crate::models::{PackagedTour, Tour};
use crate::services::filter::TourDisplay;
use crate::services::sanitize::{sanitize, FALLBACK_FILENAME};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const SEPARATOR: &str = "_";

/// Byte budget for a base label. With the id suffix, a counter and `.gpx`
/// the file name stays under the common 255-byte limit.
pub const MAX_BASE_LABEL_BYTES: usize = 200;

/// Byte budget for the tour id appended to a shared label.
const MAX_ID_SUFFIX_BYTES: usize = 32;

/// A tour attribute that can take part in the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum FilenameField {
    Type,
    Sport,
    Date,
    Name,
    Distance,
    ElevationUp,
}

impl FilenameField {
    /// Default selection offered by the download form.
    pub const DEFAULT_SELECTION: [FilenameField; 6] = [
        FilenameField::Date,
        FilenameField::Name,
        FilenameField::Distance,
        FilenameField::ElevationUp,
        FilenameField::Sport,
        FilenameField::Type,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilenameField::Type => "type",
            FilenameField::Sport => "sport",
            FilenameField::Date => "date",
            FilenameField::Name => "name",
            FilenameField::Distance => "distance",
            FilenameField::ElevationUp => "elevation_up",
        }
    }

    /// Value of this field in a display row.
    pub fn value(self, row: &TourDisplay) -> &str {
        match self {
            FilenameField::Type => &row.tour_type,
            FilenameField::Sport => &row.sport,
            FilenameField::Date => &row.date,
            FilenameField::Name => &row.name,
            FilenameField::Distance => &row.distance,
            FilenameField::ElevationUp => &row.elevation_up,
        }
    }
}

impl fmt::Display for FilenameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilenameField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "type" => Ok(FilenameField::Type),
            "sport" => Ok(FilenameField::Sport),
            "date" => Ok(FilenameField::Date),
            "name" => Ok(FilenameField::Name),
            "distance" => Ok(FilenameField::Distance),
            "elevation_up" => Ok(FilenameField::ElevationUp),
            other => Err(format!("unknown file name field '{other}'")),
        }
    }
}

/// Parse a comma-separated field list such as `date,name,distance`.
pub fn parse_fields(raw: &str) -> Result<Vec<FilenameField>, String> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Label for a single row before batch-wide disambiguation.
pub fn base_label(row: &TourDisplay, fields: &[FilenameField]) -> String {
    if fields.is_empty() {
        return FALLBACK_FILENAME.to_string();
    }
    let label = fields
        .iter()
        .map(|f| sanitize(f.value(row)))
        .collect::<Vec<_>>()
        .join(SEPARATOR);

    if label.len() <= MAX_BASE_LABEL_BYTES {
        return label;
    }
    truncate_bytes(&label, MAX_BASE_LABEL_BYTES)
        .trim_end_matches(|c: char| c.is_whitespace() || SEPARATOR.contains(c))
        .to_string()
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
fn truncate_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Assign a batch-unique file label to every tour, preserving input order.
///
/// Labels shared by several tours get `_{tour_id}` appended. Should that
/// still clash with another label, a running counter is added as well.
pub fn assign_labels(tours: Vec<Tour>, fields: &[FilenameField]) -> Vec<PackagedTour> {
    let bases: Vec<String> = tours
        .iter()
        .map(|t| base_label(&TourDisplay::from_tour(t), fields))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for base in &bases {
        *counts.entry(base.as_str()).or_default() += 1;
    }

    let mut labels: Vec<String> = bases
        .iter()
        .zip(&tours)
        .map(|(base, tour)| {
            if counts[base.as_str()] > 1 {
                let id = sanitize(&tour.id);
                format!("{base}{SEPARATOR}{}", truncate_bytes(&id, MAX_ID_SUFFIX_BYTES))
            } else {
                base.clone()
            }
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(labels.len());
    for label in labels.iter_mut() {
        if seen.insert(label.clone()) {
            continue;
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{label}{SEPARATOR}{n}");
            if seen.insert(candidate.clone()) {
                tracing::debug!(label = %label, renamed = %candidate, "Label still ambiguous, numbered");
                *label = candidate;
                break;
            }
            n += 1;
        }
    }

    tours
        .into_iter()
        .zip(labels)
        .map(|(tour, file_label)| PackagedTour { tour, file_label })
        .collect()
}

/// Example file name for a field selection, shown next to the picker.
pub fn example_filename(fields: &[FilenameField]) -> String {
    let sample = TourDisplay {
        id: "0".to_string(),
        tour_type: "PlannedTour".to_string(),
        sport: "roadcycling".to_string(),
        date: "2025-01-01".to_string(),
        name: "My Amazing Tour".to_string(),
        distance: "10km".to_string(),
        elevation_up: "100m".to_string(),
    };
    format!("{}.gpx", base_label(&sample, fields))
}
