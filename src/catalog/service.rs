//! Catalog service - store/service lookups backed by the database

use sqlx::PgPool;
use uuid::Uuid;

use crate::availability::model::Coordinate;
use crate::catalog::model::{ServiceOffering, Store};
use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct CatalogService {
    db_pool: PgPool,
}

impl CatalogService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    pub async fn get_service(&self, id: Uuid) -> ApiResult<ServiceOffering> {
        sqlx::query_as::<_, ServiceOffering>(
            "SELECT id, store_id, name, duration_minutes, home_allowed, radius_km, price \
             FROM services WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Service {} not found", id)))
    }

    pub async fn get_store(&self, id: Uuid) -> ApiResult<Store> {
        sqlx::query_as::<_, Store>(
            "SELECT id, name, latitude, longitude, auto_assign_enabled FROM stores WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Store {} not found", id)))
    }

    /// Coordinate of a store, if it has one.
    pub async fn store_coordinate(&self, id: Uuid) -> ApiResult<Option<Coordinate>> {
        let store = self.get_store(id).await?;
        Ok(match (store.latitude, store.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        })
    }

    /// First active freelancer linked to the store, used for salon
    /// auto-staffing at booking creation.
    pub async fn first_active_staff(&self, store_id: Uuid) -> ApiResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT f.id
            FROM freelancers f
            JOIN freelancer_stores fs ON fs.freelancer_id = f.id
            WHERE fs.store_id = $1 AND f.active = TRUE
            ORDER BY f.id
            LIMIT 1
            "#,
        )
        .bind(store_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }
}
