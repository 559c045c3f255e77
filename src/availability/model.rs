//! Candidate and geography models for the availability index

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Mean Earth radius in kilometers, used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point, in kilometers.
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

/// Distance from the request origin to a candidate.
///
/// A freelancer with no resolvable coordinate is `Unknown`: never excluded
/// by a radius check, but always ordered after every known distance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "km", rename_all = "snake_case")]
pub enum Distance {
    Known(f64),
    Unknown,
}

impl Distance {
    /// Whether a known distance lies strictly beyond the given radius.
    /// Unknown distances never fail a radius check.
    pub fn exceeds_radius(&self, radius_km: f64) -> bool {
        match self {
            Distance::Known(km) => *km > radius_km,
            Distance::Unknown => false,
        }
    }

    /// Effective kilometers for scoring. Unknown maps to a value large
    /// enough to dominate any plausible real distance.
    pub fn effective_km(&self) -> f64 {
        match self {
            Distance::Known(km) => *km,
            Distance::Unknown => f64::from(i32::MAX),
        }
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Distance::Known(a), Distance::Known(b)) => a.partial_cmp(b),
            (Distance::Known(_), Distance::Unknown) => Some(Ordering::Less),
            (Distance::Unknown, Distance::Known(_)) => Some(Ordering::Greater),
            (Distance::Unknown, Distance::Unknown) => Some(Ordering::Equal),
        }
    }
}

/// A freelancer who passed every availability filter, with the signals
/// the ranker scores on.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub freelancer_id: Uuid,
    pub distance: Distance,
    pub rating: f64,
    /// Count of this freelancer's bookings on the request date, any status.
    pub load: i64,
}

/// Parameters for an availability lookup
#[derive(Debug, Clone)]
pub struct FindAvailableQuery {
    pub date: NaiveDate,
    pub start_minutes: i32,
    pub duration_minutes: i32,
    pub store_id: Uuid,
    pub service_id: Option<Uuid>,
    pub origin: Option<Coordinate>,
}

impl FindAvailableQuery {
    pub fn end_minutes(&self) -> i32 {
        self.start_minutes + self.duration_minutes
    }
}

/// Freelancer roster row as read by the index
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FreelancerRow {
    pub id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating: f64,
}
