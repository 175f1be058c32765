//! Repository tests for users and universes against a real database.

use sqlx::PgPool;
use harmonic_core::universe::{HarmonyParameters, PhysicsParameters};
use harmonic_db::models::universe::CreateUniverse;
use harmonic_db::models::user::CreateUser;
use harmonic_db::repositories::{UniverseRepo, UserRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_user(pool: &PgPool, username: &str) -> i64 {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
        },
    )
    .await
    .unwrap()
    .id
}

fn new_universe(user_id: i64, name: &str) -> CreateUniverse {
    CreateUniverse {
        user_id,
        name: name.to_string(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_check(pool: PgPool) {
    harmonic_db::health_check(&pool).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_universe_uses_defaults(pool: PgPool) {
    let owner = seed_user(&pool, "alice").await;
    let universe = UniverseRepo::create(&pool, &new_universe(owner, "Nebula"))
        .await
        .unwrap();

    assert_eq!(universe.user_id, owner);
    assert!(!universe.is_public);
    assert_eq!(universe.physics_params.0, PhysicsParameters::default());
    assert_eq!(universe.harmony_params.0, HarmonyParameters::default());

    let found = UniverseRepo::find_by_id(&pool, universe.id)
        .await
        .unwrap()
        .expect("universe should exist");
    assert_eq!(found.name, "Nebula");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_find_missing_universe(pool: PgPool) {
    assert!(UniverseRepo::find_by_id(&pool, 999_999).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_physics_replaces_group(pool: PgPool) {
    let owner = seed_user(&pool, "bob").await;
    let universe = UniverseRepo::create(&pool, &new_universe(owner, "Orbit"))
        .await
        .unwrap();

    let physics = PhysicsParameters {
        gravity: 3.7,
        ..Default::default()
    };
    let updated = UniverseRepo::update_physics(&pool, universe.id, &physics)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.physics_params.0.gravity, 3.7);
    assert_eq!(updated.harmony_params.0, universe.harmony_params.0);
    assert!(updated.updated_at >= universe.updated_at);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_harmony_replaces_group(pool: PgPool) {
    let owner = seed_user(&pool, "carol").await;
    let universe = UniverseRepo::create(&pool, &new_universe(owner, "Chorus"))
        .await
        .unwrap();

    let harmony = HarmonyParameters {
        key: "F#".to_string(),
        scale: "dorian".to_string(),
        ..Default::default()
    };
    let updated = UniverseRepo::update_harmony(&pool, universe.id, &harmony)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.parameters().harmony, harmony);
    assert_eq!(updated.parameters().physics, PhysicsParameters::default());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_missing_universe_returns_none(pool: PgPool) {
    let result = UniverseRepo::update_physics(&pool, 424_242, &PhysicsParameters::default())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_username_violates_unique_constraint(pool: PgPool) {
    seed_user(&pool, "dave").await;
    let err = UserRepo::create(
        &pool,
        &CreateUser {
            username: "dave".to_string(),
            email: "other@example.com".to_string(),
        },
    )
    .await
    .unwrap_err();

    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.code().as_deref(), Some("23505"));
    assert_eq!(db_err.constraint(), Some("uq_users_username"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_overlong_name_rejected_by_database(pool: PgPool) {
    let owner = seed_user(&pool, "erin").await;
    let result = UniverseRepo::create(&pool, &new_universe(owner, &"x".repeat(101))).await;
    assert!(result.is_err());
}
