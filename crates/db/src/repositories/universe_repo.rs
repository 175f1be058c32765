//! Repository for the `universes` table.
//!
//! Parameter writes replace one JSONB column in a single `UPDATE`; callers
//! merge and validate the patch beforehand. Concurrent writers race and the
//! last one wins.

use sqlx::types::Json;
use sqlx::PgPool;
use harmonic_core::types::DbId;
use harmonic_core::universe::{HarmonyParameters, PhysicsParameters};

use crate::models::universe::{CreateUniverse, Universe};

const COLUMNS: &str = "id, user_id, name, description, is_public, physics_params, \
                       harmony_params, created_at, updated_at";

/// Provides persistence for universes and their parameter groups.
pub struct UniverseRepo;

impl UniverseRepo {
    /// Insert a new universe, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateUniverse) -> Result<Universe, sqlx::Error> {
        let query = format!(
            "INSERT INTO universes (user_id, name, description, is_public, physics_params, harmony_params)
             VALUES ($1, $2, $3, COALESCE($4, false), $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Universe>(&query)
            .bind(input.user_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.is_public)
            .bind(Json(input.physics_params.unwrap_or_default()))
            .bind(Json(input.harmony_params.clone().unwrap_or_default()))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Universe>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM universes WHERE id = $1");
        sqlx::query_as::<_, Universe>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Replace the physics parameters. Returns `None` if the universe is gone.
    pub async fn update_physics(
        pool: &PgPool,
        id: DbId,
        physics: &PhysicsParameters,
    ) -> Result<Option<Universe>, sqlx::Error> {
        let query = format!(
            "UPDATE universes SET physics_params = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Universe>(&query)
            .bind(id)
            .bind(Json(physics))
            .fetch_optional(pool)
            .await
    }

    /// Replace the harmony parameters. Returns `None` if the universe is gone.
    pub async fn update_harmony(
        pool: &PgPool,
        id: DbId,
        harmony: &HarmonyParameters,
    ) -> Result<Option<Universe>, sqlx::Error> {
        let query = format!(
            "UPDATE universes SET harmony_params = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Universe>(&query)
            .bind(id)
            .bind(Json(harmony))
            .fetch_optional(pool)
            .await
    }
}
