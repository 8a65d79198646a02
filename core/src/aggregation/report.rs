use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::aggregation::device::{AggregateSet, DeviceAggregate};
use crate::prelude::SightError;

/// A single sighting cannot establish recurrence.
pub const MIN_CO_TRAVELER_COUNT: usize = 2;

/// Max-distance bins, lower bound inclusive, upper bound exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceBin {
    From2To4,
    From4To6,
    From6To8,
    From8To10,
    TenPlus,
}

impl DistanceBin {
    pub const ALL: [DistanceBin; 5] = [
        DistanceBin::From2To4,
        DistanceBin::From4To6,
        DistanceBin::From6To8,
        DistanceBin::From8To10,
        DistanceBin::TenPlus,
    ];

    pub fn bounds(&self) -> (f64, Option<f64>) {
        match self {
            DistanceBin::From2To4 => (2.0, Some(4.0)),
            DistanceBin::From4To6 => (4.0, Some(6.0)),
            DistanceBin::From6To8 => (6.0, Some(8.0)),
            DistanceBin::From8To10 => (8.0, Some(10.0)),
            DistanceBin::TenPlus => (10.0, None),
        }
    }

    pub fn contains(&self, miles: f64) -> bool {
        let (min, max) = self.bounds();
        miles >= min && max.map_or(true, |max| miles < max)
    }

    /// File-name suffix used when exporting the bin.
    pub fn suffix(&self) -> &'static str {
        match self {
            DistanceBin::From2To4 => "co_2",
            DistanceBin::From4To6 => "co_4",
            DistanceBin::From6To8 => "co_6",
            DistanceBin::From8To10 => "co_8",
            DistanceBin::TenPlus => "co_10plus",
        }
    }
}

impl fmt::Display for DistanceBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            (min, Some(max)) => write!(f, "{}-{} mi", min, max),
            (min, None) => write!(f, "{}+ mi", min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportMode {
    MostSeen,
    Distance(DistanceBin),
}

impl FromStr for ReportMode {
    type Err = SightError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mode = match value.trim().to_ascii_lowercase().as_str() {
            "most-seen" | "most" => ReportMode::MostSeen,
            "2" => ReportMode::Distance(DistanceBin::From2To4),
            "4" => ReportMode::Distance(DistanceBin::From4To6),
            "6" => ReportMode::Distance(DistanceBin::From6To8),
            "8" => ReportMode::Distance(DistanceBin::From8To10),
            "10" | "10+" => ReportMode::Distance(DistanceBin::TenPlus),
            other => {
                return Err(SightError::MalformedRecord(format!(
                    "unknown report mode {:?}",
                    other
                )))
            }
        };
        Ok(mode)
    }
}

/// Devices seen at least twice that match `mode`, most frequently seen first.
pub fn co_traveler_report(set: &AggregateSet, mode: ReportMode) -> Vec<&DeviceAggregate> {
    let mut rows: Vec<&DeviceAggregate> = set
        .iter()
        .filter(|agg| agg.count >= MIN_CO_TRAVELER_COUNT)
        .filter(|agg| match mode {
            ReportMode::MostSeen => true,
            ReportMode::Distance(bin) => bin.contains(agg.max_distance_miles),
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

pub fn format_report_line(agg: &DeviceAggregate) -> String {
    format!(
        "{} | {} | RSSI {} | Seen {} | Max {:.1} mi",
        agg.name, agg.key.id, agg.rssi, agg.count, agg.max_distance_miles
    )
}
