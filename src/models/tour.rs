// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Komoot tour model as returned by the tour listing API.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a tour was planned in advance or recorded on the go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TourType {
    #[serde(rename = "tour_planned")]
    Planned,
    #[serde(rename = "tour_recorded")]
    Recorded,
}

impl TourType {
    pub const ALL: [TourType; 2] = [TourType::Planned, TourType::Recorded];

    /// Wire value used by the Komoot API.
    pub fn as_str(self) -> &'static str {
        match self {
            TourType::Planned => "tour_planned",
            TourType::Recorded => "tour_recorded",
        }
    }
}

impl fmt::Display for TourType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TourType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tour_planned" => Ok(TourType::Planned),
            "tour_recorded" => Ok(TourType::Recorded),
            other => Err(format!("unknown tour type '{other}'")),
        }
    }
}

/// A recorded or planned tour (read-only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    /// Komoot tour ID (numeric on the wire, kept as a string)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "type")]
    pub tour_type: TourType,
    /// Sport key, e.g. `touringbicycle` or `mtb_easy`
    pub sport: String,
    /// Start date (ISO 8601)
    pub date: String,
    pub name: String,
    /// Distance in meters
    pub distance: f64,
    /// Elevation gain in meters
    #[serde(default)]
    pub elevation_up: f64,
}

/// A tour selected for download together with its archive file label.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagedTour {
    pub tour: Tour,
    /// Sanitized, batch-unique label; the archive entry is `{file_label}.gpx`
    pub file_label: String,
}

impl PackagedTour {
    pub fn file_name(&self) -> String {
        format!("{}.gpx", self.file_label)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tour_parses_numeric_id() {
        let json = r#"{
            "id": 123456789,
            "type": "tour_recorded",
            "sport": "mtb_easy",
            "date": "2024-06-01T07:30:00.000+02:00",
            "name": "Morning Ride",
            "distance": 31250.4,
            "elevation_up": 412.7,
            "status": "private"
        }"#;

        let tour: Tour = serde_json::from_str(json).unwrap();
        assert_eq!(tour.id, "123456789");
        assert_eq!(tour.tour_type, TourType::Recorded);
        assert_eq!(tour.sport, "mtb_easy");
    }

    #[test]
    fn test_tour_missing_elevation_defaults_to_zero() {
        let json = r#"{"id":"a","type":"tour_planned","sport":"hike",
            "date":"2025-01-01T00:00:00Z","name":"Walk","distance":1000}"#;
        let tour: Tour = serde_json::from_str(json).unwrap();
        assert_eq!(tour.elevation_up, 0.0);
    }

    #[test]
    fn test_tour_type_round_trip_str() {
        for t in TourType::ALL {
            assert_eq!(t.as_str().parse::<TourType>().unwrap(), t);
        }
        assert!("tour_unknown".parse::<TourType>().is_err());
    }
}
