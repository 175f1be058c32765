//! Universe entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use harmonic_core::types::{DbId, Timestamp};
use harmonic_core::universe::{HarmonyParameters, PhysicsParameters, UniverseParameters};

/// A row from the `universes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Universe {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub physics_params: Json<PhysicsParameters>,
    pub harmony_params: Json<HarmonyParameters>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Universe {
    /// Both stored parameter groups.
    pub fn parameters(&self) -> UniverseParameters {
        UniverseParameters {
            physics: self.physics_params.0,
            harmony: self.harmony_params.0.clone(),
        }
    }
}

/// DTO for creating a universe. Omitted parameter groups take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUniverse {
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub physics_params: Option<PhysicsParameters>,
    pub harmony_params: Option<HarmonyParameters>,
}
