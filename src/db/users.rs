use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

pub struct NewUser<'a> {
    pub fullname: &'a str,
    pub email: &'a str,
    pub phone_number: &'a str,
    pub password_hash: &'a str,
    pub role: &'a str,
    pub profile_photo: Option<&'a str>,
    pub profile_photo_public_id: Option<&'a str>,
}

pub async fn create(pool: &PgPool, user: &NewUser<'_>) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (fullname, email, phone_number, password_hash, role, profile_photo, profile_photo_public_id)
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, ''), $7) RETURNING *",
    )
    .bind(user.fullname)
    .bind(user.email)
    .bind(user.phone_number)
    .bind(user.password_hash)
    .bind(user.role)
    .bind(user.profile_photo)
    .bind(user.profile_photo_public_id)
    .fetch_one(pool)
    .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_phone(pool: &PgPool, phone_number: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone_number = $1")
        .bind(phone_number)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Persist every mutable field of `user`. Returns `None` if the row is gone.
pub async fn save_profile(pool: &PgPool, user: &User) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET
             fullname = $2,
             email = $3,
             phone_number = $4,
             bio = $5,
             skills = $6,
             resume = $7,
             resume_original_name = $8,
             resume_public_id = $9,
             profile_photo = $10,
             profile_photo_public_id = $11,
             updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .bind(&user.fullname)
    .bind(&user.email)
    .bind(&user.phone_number)
    .bind(&user.bio)
    .bind(&user.skills)
    .bind(&user.resume)
    .bind(&user.resume_original_name)
    .bind(&user.resume_public_id)
    .bind(&user.profile_photo)
    .bind(&user.profile_photo_public_id)
    .fetch_optional(pool)
    .await
}

pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
