// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tour selection by type and distance, and the display projection used by
//! the results table.

use crate::models::{Tour, TourType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Slider ceiling in kilometers. A maximum at or above it means "no limit".
pub const DISTANCE_CEILING_KM: f64 = 200.0;

/// Which tours to show and download.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterCriteria {
    /// Accepted tour types. Empty selects nothing.
    #[serde(default = "all_types")]
    pub types: BTreeSet<TourType>,
    #[serde(default)]
    pub min_km: f64,
    #[serde(default = "ceiling")]
    pub max_km: f64,
}

fn all_types() -> BTreeSet<TourType> {
    TourType::ALL.into_iter().collect()
}

fn ceiling() -> f64 {
    DISTANCE_CEILING_KM
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            types: all_types(),
            min_km: 0.0,
            max_km: DISTANCE_CEILING_KM,
        }
    }
}

impl FilterCriteria {
    /// Inclusive distance bounds in meters.
    pub fn distance_bounds_m(&self) -> (f64, f64) {
        let max = if self.max_km >= DISTANCE_CEILING_KM {
            f64::INFINITY
        } else {
            self.max_km * 1000.0
        };
        (self.min_km * 1000.0, max)
    }

    pub fn accepts(&self, tour: &Tour) -> bool {
        let (min, max) = self.distance_bounds_m();
        self.types.contains(&tour.tour_type) && tour.distance >= min && tour.distance <= max
    }

    /// Reject values a client could not have produced with the slider.
    ///
    /// An inverted range is allowed; it simply matches nothing.
    pub fn validate(&self) -> Result<(), String> {
        if !self.min_km.is_finite() || !self.max_km.is_finite() {
            return Err("distance range must be finite".to_string());
        }
        if self.min_km < 0.0 {
            return Err("min_km must not be negative".to_string());
        }
        Ok(())
    }

    /// Type filter to pass to the listing API: a single type when exactly one
    /// is accepted, otherwise everything (narrowed locally afterwards).
    pub fn api_type_filter(&self) -> Option<TourType> {
        match self.types.len() {
            1 => self.types.iter().next().copied(),
            _ => None,
        }
    }
}

/// Narrow `tours` to those matching `criteria`, keeping input order.
pub fn filter_tours(tours: &[Tour], criteria: &FilterCriteria) -> Vec<Tour> {
    tours
        .iter()
        .filter(|t| criteria.accepts(t))
        .cloned()
        .collect()
}

/// Human-readable row for the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TourDisplay {
    pub id: String,
    #[serde(rename = "type")]
    pub tour_type: String,
    pub sport: String,
    pub date: String,
    pub name: String,
    pub distance: String,
    pub elevation_up: String,
}

impl TourDisplay {
    pub fn from_tour(tour: &Tour) -> Self {
        Self {
            id: tour.id.clone(),
            tour_type: tour
                .tour_type
                .as_str()
                .trim_start_matches("tour_")
                .to_string(),
            sport: tour.sport.replace('_', ""),
            date: tour.date.chars().take(10).collect(),
            name: tour.name.clone(),
            distance: format!("{}km", group_thousands(tour.distance / 1000.0)),
            elevation_up: format!("{}m", group_thousands(tour.elevation_up)),
        }
    }
}

/// Round half-to-even and insert `,` every three digits: `1234.5` -> `1,234`.
pub fn group_thousands(value: f64) -> String {
    let rounded = value.round_ties_even() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Label shown under the distance slider.
pub fn distance_label(min_km: f64, max_km: f64) -> String {
    format!("Distances selected {min_km}km to {max_km}km")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tour(id: &str, tour_type: TourType, distance: f64) -> Tour {
        Tour {
            id: id.to_string(),
            tour_type,
            sport: "roadcycling".to_string(),
            date: "2025-01-01T00:00:00Z".to_string(),
            name: format!("Tour {id}"),
            distance,
            elevation_up: 100.0,
        }
    }

    fn criteria(types: &[TourType], min_km: f64, max_km: f64) -> FilterCriteria {
        FilterCriteria {
            types: types.iter().copied().collect(),
            min_km,
            max_km,
        }
    }

    #[test]
    fn test_empty_type_set_selects_nothing() {
        let tours = vec![
            tour("a", TourType::Planned, 1000.0),
            tour("b", TourType::Recorded, 2000.0),
        ];
        assert!(filter_tours(&tours, &criteria(&[], 0.0, 200.0)).is_empty());
    }

    #[test]
    fn test_ceiling_means_unbounded() {
        let tours = vec![tour("long", TourType::Planned, 500_000.0)];
        let out = filter_tours(&tours, &criteria(&[TourType::Planned], 0.0, 200.0));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_max_below_ceiling_is_enforced() {
        let tours = vec![tour("a", TourType::Recorded, 60_000.0)];
        let out = filter_tours(&tours, &criteria(&[TourType::Recorded], 0.0, 50.0));
        assert!(out.is_empty());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let tours = vec![
            tour("min", TourType::Planned, 10_000.0),
            tour("max", TourType::Planned, 50_000.0),
            tour("below", TourType::Planned, 9_999.0),
        ];
        let out = filter_tours(&tours, &criteria(&[TourType::Planned], 10.0, 50.0));
        let ids: Vec<&str> = out.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["min", "max"]);
    }

    #[test]
    fn test_type_membership_and_order_preserved() {
        let tours = vec![
            tour("1", TourType::Recorded, 1000.0),
            tour("2", TourType::Planned, 1000.0),
            tour("3", TourType::Recorded, 1000.0),
        ];
        let out = filter_tours(&tours, &criteria(&[TourType::Recorded], 0.0, 200.0));
        let ids: Vec<&str> = out.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let tours = vec![
            tour("a", TourType::Planned, 1000.0),
            tour("b", TourType::Recorded, 900_000.0),
        ];
        let before = tours.clone();
        let _ = filter_tours(&tours, &criteria(&[TourType::Planned], 5.0, 20.0));
        assert_eq!(tours, before);
    }

    #[test]
    fn test_display_projection() {
        let t = Tour {
            id: "a".to_string(),
            tour_type: TourType::Planned,
            sport: "road_cycling".to_string(),
            date: "2025-01-01T00:00:00Z".to_string(),
            name: "Hill Loop".to_string(),
            distance: 52000.0,
            elevation_up: 310.0,
        };
        let row = TourDisplay::from_tour(&t);
        assert_eq!(row.tour_type, "planned");
        assert_eq!(row.sport, "roadcycling");
        assert_eq!(row.date, "2025-01-01");
        assert_eq!(row.distance, "52km");
        assert_eq!(row.elevation_up, "310m");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0), "0");
        assert_eq!(group_thousands(999.4), "999");
        assert_eq!(group_thousands(1234.0), "1,234");
        assert_eq!(group_thousands(1_234_567.0), "1,234,567");
        assert_eq!(group_thousands(2.5), "2");
        assert_eq!(group_thousands(3.5), "4");
        assert_eq!(group_thousands(-1500.0), "-1,500");
    }

    #[test]
    fn test_api_type_filter() {
        assert_eq!(
            criteria(&[TourType::Recorded], 0.0, 200.0).api_type_filter(),
            Some(TourType::Recorded)
        );
        assert_eq!(FilterCriteria::default().api_type_filter(), None);
        assert_eq!(criteria(&[], 0.0, 200.0).api_type_filter(), None);
    }

    #[test]
    fn test_validate_accepts_inverted_range() {
        let inverted = criteria(&[TourType::Planned], 60.0, 50.0);
        assert!(inverted.validate().is_ok());
        let tours = vec![tour("a", TourType::Planned, 55_000.0)];
        assert!(filter_tours(&tours, &inverted).is_empty());

        assert!(criteria(&[TourType::Planned], -1.0, 50.0).validate().is_err());
        assert!(criteria(&[TourType::Planned], 0.0, f64::NAN).validate().is_err());
        assert!(FilterCriteria::default().validate().is_ok());
    }

    #[test]
    fn test_distance_label() {
        assert_eq!(distance_label(0.0, 200.0), "Distances selected 0km to 200km");
    }
}
