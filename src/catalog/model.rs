//! Catalog models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical store
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub auto_assign_enabled: bool,
}

/// A bookable service offered by a store
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceOffering {
    pub id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub home_allowed: bool,
    pub radius_km: Option<f64>,
    pub price: i64,
}
