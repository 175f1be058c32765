//! Universe parameter types, patch merging, and access rules.
//!
//! Physics parameters are inert configuration (nothing is simulated); harmony
//! parameters describe the musical character of a universe. Both are stored
//! as JSON on the universe row and edited through partial patches, which are
//! merged over the stored values and validated as a whole before anything is
//! written.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

pub const MIN_GRAVITY: f64 = 0.0;
pub const MAX_GRAVITY: f64 = 100.0;

pub const MIN_TIME_SCALE: f64 = 0.1;
pub const MAX_TIME_SCALE: f64 = 10.0;

pub const MIN_TEMPO_BPM: f64 = 20.0;
pub const MAX_TEMPO_BPM: f64 = 300.0;

/// Accepted key names (sharps and flats both allowed).
pub const VALID_KEYS: &[&str] = &[
    "C", "C#", "Db", "D", "D#", "Eb", "E", "F", "F#", "Gb", "G", "G#", "Ab", "A", "A#", "Bb", "B",
];

/// Accepted scale names.
pub const VALID_SCALES: &[&str] = &[
    "major",
    "minor",
    "dorian",
    "phrygian",
    "lydian",
    "mixolydian",
    "locrian",
    "pentatonic",
    "blues",
    "chromatic",
];

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

/// Physics configuration of a universe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParameters {
    pub gravity: f64,
    pub friction: f64,
    pub restitution: f64,
    pub air_resistance: f64,
    pub time_scale: f64,
}

impl Default for PhysicsParameters {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            friction: 0.5,
            restitution: 0.7,
            air_resistance: 0.1,
            time_scale: 1.0,
        }
    }
}

impl PhysicsParameters {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), CoreError> {
        check_range("gravity", self.gravity, MIN_GRAVITY, MAX_GRAVITY)?;
        check_range("friction", self.friction, 0.0, 1.0)?;
        check_range("restitution", self.restitution, 0.0, 1.0)?;
        check_range("air_resistance", self.air_resistance, 0.0, 1.0)?;
        check_range("time_scale", self.time_scale, MIN_TIME_SCALE, MAX_TIME_SCALE)?;
        Ok(())
    }

    /// Merge `patch` over `self` and validate the result.
    pub fn apply(&self, patch: &PhysicsPatch) -> Result<Self, CoreError> {
        let merged = Self {
            gravity: patch.gravity.unwrap_or(self.gravity),
            friction: patch.friction.unwrap_or(self.friction),
            restitution: patch.restitution.unwrap_or(self.restitution),
            air_resistance: patch.air_resistance.unwrap_or(self.air_resistance),
            time_scale: patch.time_scale.unwrap_or(self.time_scale),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial physics update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhysicsPatch {
    pub gravity: Option<f64>,
    pub friction: Option<f64>,
    pub restitution: Option<f64>,
    pub air_resistance: Option<f64>,
    pub time_scale: Option<f64>,
}

// ---------------------------------------------------------------------------
// Harmony
// ---------------------------------------------------------------------------

/// Musical configuration of a universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonyParameters {
    /// Tempo in beats per minute.
    pub tempo: f64,
    pub key: String,
    pub scale: String,
    pub volume: f64,
}

impl Default for HarmonyParameters {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            key: "C".to_string(),
            scale: "major".to_string(),
            volume: 0.8,
        }
    }
}

impl HarmonyParameters {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_range("tempo", self.tempo, MIN_TEMPO_BPM, MAX_TEMPO_BPM)?;
        check_range("volume", self.volume, 0.0, 1.0)?;
        if !VALID_KEYS.contains(&self.key.as_str()) {
            return Err(CoreError::Validation(format!(
                "Invalid key '{}'. Must be one of: {}",
                self.key,
                VALID_KEYS.join(", ")
            )));
        }
        if !VALID_SCALES.contains(&self.scale.as_str()) {
            return Err(CoreError::Validation(format!(
                "Invalid scale '{}'. Must be one of: {}",
                self.scale,
                VALID_SCALES.join(", ")
            )));
        }
        Ok(())
    }

    /// Merge `patch` over `self` and validate the result.
    pub fn apply(&self, patch: &HarmonyPatch) -> Result<Self, CoreError> {
        let merged = Self {
            tempo: patch.tempo.unwrap_or(self.tempo),
            key: patch.key.clone().unwrap_or_else(|| self.key.clone()),
            scale: patch.scale.clone().unwrap_or_else(|| self.scale.clone()),
            volume: patch.volume.unwrap_or(self.volume),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial harmony update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarmonyPatch {
    pub tempo: Option<f64>,
    pub key: Option<String>,
    pub scale: Option<String>,
    pub volume: Option<f64>,
}

// ---------------------------------------------------------------------------
// Parameter kinds
// ---------------------------------------------------------------------------

/// Which parameter group an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Physics,
    Harmony,
}

impl ParameterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterKind::Physics => "physics",
            ParameterKind::Harmony => "harmony",
        }
    }
}

/// A decoded patch for one parameter group.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterPatch {
    Physics(PhysicsPatch),
    Harmony(HarmonyPatch),
}

impl ParameterPatch {
    /// Decode a raw JSON patch object for the given kind.
    ///
    /// Unknown fields and wrongly typed values are validation errors.
    pub fn from_json(kind: ParameterKind, value: serde_json::Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::Validation(
                "parameters must be a JSON object".to_string(),
            ));
        }
        let invalid =
            |e: serde_json::Error| CoreError::Validation(format!("Invalid {} parameters: {e}", kind.as_str()));
        match kind {
            ParameterKind::Physics => serde_json::from_value(value)
                .map(ParameterPatch::Physics)
                .map_err(invalid),
            ParameterKind::Harmony => serde_json::from_value(value)
                .map(ParameterPatch::Harmony)
                .map_err(invalid),
        }
    }
}

/// Both parameter groups of a universe, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseParameters {
    pub physics: PhysicsParameters,
    pub harmony: HarmonyParameters,
}

impl UniverseParameters {
    /// Apply a patch to the matching group, returning the merged parameters.
    pub fn apply(&self, patch: &ParameterPatch) -> Result<Self, CoreError> {
        let mut next = self.clone();
        match patch {
            ParameterPatch::Physics(p) => next.physics = self.physics.apply(p)?,
            ParameterPatch::Harmony(p) => next.harmony = self.harmony.apply(p)?,
        }
        Ok(next)
    }

    /// JSON value of one group, as broadcast in `parameters_updated`.
    pub fn group_json(&self, kind: ParameterKind) -> serde_json::Value {
        let value = match kind {
            ParameterKind::Physics => serde_json::to_value(self.physics),
            ParameterKind::Harmony => serde_json::to_value(&self.harmony),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Access rules
// ---------------------------------------------------------------------------

/// A user may view a universe they own, or any public universe.
pub fn can_view(owner_id: DbId, is_public: bool, user_id: DbId) -> bool {
    is_public || owner_id == user_id
}

/// Only the owner may modify a universe.
pub fn can_edit(owner_id: DbId, user_id: DbId) -> bool {
    owner_id == user_id
}

pub fn ensure_can_view(
    universe_id: DbId,
    owner_id: DbId,
    is_public: bool,
    user_id: DbId,
) -> Result<(), CoreError> {
    if can_view(owner_id, is_public, user_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Access denied to universe {universe_id}"
        )))
    }
}

pub fn ensure_can_edit(universe_id: DbId, owner_id: DbId, user_id: DbId) -> Result<(), CoreError> {
    if can_edit(owner_id, user_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Only the owner can modify universe {universe_id}"
        )))
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), CoreError> {
    if !value.is_finite() {
        return Err(CoreError::Validation(format!(
            "{field} must be a finite number"
        )));
    }
    if value < min || value > max {
        return Err(CoreError::Validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
