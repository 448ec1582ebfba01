use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Company;

/// Partial update; `None` leaves the column unchanged.
#[derive(Debug, Default)]
pub struct CompanyChanges<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub website: Option<&'a str>,
    pub location: Option<&'a str>,
    pub logo: Option<&'a str>,
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    description: &str,
    owner_id: Uuid,
) -> Result<Company, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        "INSERT INTO companies (name, description, user_ids)
         VALUES ($1, $2, ARRAY[$3]::uuid[]) RETURNING *",
    )
    .bind(name)
    .bind(description)
    .bind(owner_id)
    .fetch_one(pool)
    .await
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE name = $1 LIMIT 1")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_many(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
}

pub async fn list_by_owner(pool: &PgPool, user_id: Uuid) -> Result<Vec<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        "SELECT * FROM companies WHERE $1 = ANY(user_ids) ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    changes: &CompanyChanges<'_>,
) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>(
        "UPDATE companies SET
             name = COALESCE($2, name),
             description = COALESCE($3, description),
             website = COALESCE($4, website),
             location = COALESCE($5, location),
             logo = COALESCE($6, logo),
             updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(changes.name)
    .bind(changes.description)
    .bind(changes.website)
    .bind(changes.location)
    .bind(changes.logo)
    .fetch_optional(pool)
    .await
}
