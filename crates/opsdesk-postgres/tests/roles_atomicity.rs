//! Role deletion is the one multi-statement transaction in the system:
//! either all three tables lose their rows, or none does.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use opsdesk_core::OpsError;
use opsdesk_postgres::RolesAdminService;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for these tests");
    PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect")
}

async fn reset_permission_tables(pool: &PgPool) {
    sqlx::query("DROP TABLE IF EXISTS role_audit, role_permissions, user_roles, roles CASCADE")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        r#"
        CREATE TABLE roles (
            id     BIGSERIAL PRIMARY KEY,
            name   TEXT NOT NULL,
            active BOOLEAN NOT NULL DEFAULT true
        )
        "#,
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        r#"
        CREATE TABLE user_roles (
            user_id BIGINT NOT NULL,
            role_id BIGINT NOT NULL,
            PRIMARY KEY (user_id, role_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        r#"
        CREATE TABLE role_permissions (
            id           BIGSERIAL PRIMARY KEY,
            role_id      BIGINT NOT NULL,
            resource     TEXT NOT NULL,
            can_create   BOOLEAN NOT NULL DEFAULT false,
            can_view_all BOOLEAN NOT NULL DEFAULT false,
            can_view_own BOOLEAN NOT NULL DEFAULT false,
            can_edit_all BOOLEAN NOT NULL DEFAULT false,
            can_edit_own BOOLEAN NOT NULL DEFAULT false,
            can_delete   BOOLEAN NOT NULL DEFAULT false,
            can_export   BOOLEAN NOT NULL DEFAULT false,
            active       BOOLEAN NOT NULL DEFAULT true
        )
        "#,
    )
    .execute(pool)
    .await
    .unwrap();
}

async fn seed_role(pool: &PgPool) -> i64 {
    let role_id: i64 =
        sqlx::query_scalar("INSERT INTO roles (name) VALUES ('field team') RETURNING id")
            .fetch_one(pool)
            .await
            .unwrap();
    sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES (7, $1), (8, $1)")
        .bind(role_id)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO role_permissions (role_id, resource, can_view_own) VALUES ($1, 'calls', true)",
    )
    .bind(role_id)
    .execute(pool)
    .await
    .unwrap();
    role_id
}

async fn counts(pool: &PgPool, role_id: i64) -> (i64, i64, i64) {
    let grants: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(pool)
            .await
            .unwrap();
    let assignments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
        .bind(role_id)
        .fetch_one(pool)
        .await
        .unwrap();
    let roles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_one(pool)
        .await
        .unwrap();
    (grants, assignments, roles)
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn delete_removes_all_three_tables_together() {
    let pool = pool().await;
    reset_permission_tables(&pool).await;
    let role_id = seed_role(&pool).await;

    RolesAdminService::new(pool.clone())
        .delete(role_id)
        .await
        .unwrap();

    assert_eq!(counts(&pool, role_id).await, (0, 0, 0));
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn failed_step_rolls_back_everything() {
    let pool = pool().await;
    reset_permission_tables(&pool).await;
    let role_id = seed_role(&pool).await;

    // A restricting foreign key makes the final DELETE FROM roles fail,
    // which must roll back the two deletes that already ran.
    sqlx::query("CREATE TABLE role_audit (role_id BIGINT NOT NULL REFERENCES roles (id))")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO role_audit (role_id) VALUES ($1)")
        .bind(role_id)
        .execute(&pool)
        .await
        .unwrap();

    let err = RolesAdminService::new(pool.clone())
        .delete(role_id)
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::StorageFailed { .. }));

    // Nothing was lost.
    assert_eq!(counts(&pool, role_id).await, (1, 2, 1));
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn deleting_a_missing_role_is_not_found_and_touches_nothing() {
    let pool = pool().await;
    reset_permission_tables(&pool).await;
    let role_id = seed_role(&pool).await;

    let err = RolesAdminService::new(pool.clone())
        .delete(role_id + 100)
        .await
        .unwrap_err();
    assert!(matches!(err, OpsError::NotFound(_)));
    assert_eq!(counts(&pool, role_id).await, (1, 2, 1));
}
