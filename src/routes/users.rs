use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::{AuthUser, TOKEN_COOKIE};
use crate::auth::jwt::{encode_token, Claims, TOKEN_TTL_DAYS};
use crate::auth::password;
use crate::db;
use crate::db::users::NewUser;
use crate::error::AppError;
use crate::extract::JsonBody;
use crate::media::{self, ResourceType, UploadOptions};
use crate::models::{PublicUser, Role};
use crate::response::{ApiResponse, Empty};
use crate::state::SharedState;
use crate::upload::{ProfileFiles, SingleFile, Upload};

const PROFILE_PHOTO_FOLDER: &str = "profile_pictures";
const RESUME_FOLDER: &str = "resumes";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize)]
pub struct UserPayload {
    pub user: PublicUser,
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(TOKEN_TTL_DAYS))
        .build()
}

fn cleared_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a comma-separated skills string, trimming and dropping blanks.
pub fn parse_skills(raw: &str) -> Vec<String> {
    clean_skills(raw.split(','))
}

fn clean_skills<'a>(entries: impl Iterator<Item = &'a str>) -> Vec<String> {
    entries
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn register(
    State(state): State<SharedState>,
    Upload(form, _): Upload<SingleFile>,
) -> Result<(StatusCode, ApiResponse<UserPayload>), AppError> {
    let (Some(fullname), Some(email), Some(phone_number), Some(password), Some(role)) = (
        form.non_empty("fullname"),
        form.non_empty("email"),
        form.non_empty("phoneNumber"),
        form.non_empty("password"),
        form.non_empty("role"),
    ) else {
        return Err(AppError::BadRequest("Missing required fields.".to_string()));
    };

    let role: Role = role.parse().map_err(AppError::BadRequest)?;

    if db::users::find_by_email(&state.pool, email).await?.is_some() {
        return Err(AppError::Conflict("Email already exists.".to_string()));
    }
    if db::users::find_by_phone(&state.pool, phone_number).await?.is_some() {
        return Err(AppError::Conflict("Phone number already exists.".to_string()));
    }

    let pw_hash = password::hash(password).map_err(AppError::Internal)?;

    // A failed photo upload does not block registration.
    let photo = match form.file("file") {
        Some(file) => {
            match media::ingest(
                state.media.as_ref(),
                file,
                UploadOptions::image(PROFILE_PHOTO_FOLDER),
            )
            .await
            {
                Ok(asset) => Some(asset),
                Err(e) => {
                    tracing::warn!("Profile photo upload failed during registration: {e}");
                    None
                }
            }
        }
        None => None,
    };

    let created = db::users::create(
        &state.pool,
        &NewUser {
            fullname,
            email,
            phone_number,
            password_hash: &pw_hash,
            role: role.as_str(),
            profile_photo: photo.as_ref().map(|a| a.url.as_str()),
            profile_photo_public_id: photo.as_ref().map(|a| a.public_id.as_str()),
        },
    )
    .await;

    let user = match created {
        Ok(user) => user,
        Err(e) => {
            if let Some(asset) = &photo {
                media::discard(state.media.as_ref(), &asset.public_id, ResourceType::Image).await;
            }
            return Err(AppError::conflict_on_unique(
                e,
                "Email or phone number already exists.",
            ));
        }
    };

    tracing::info!(user_id = %user.id, role = %role, "User registered");

    let message = format!("Account created successfully for {}.", user.fullname);
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(UserPayload {
            user: user.to_public(),
        })
        .with_message(message),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<UserPayload>), AppError> {
    let (Some(email), Some(password), Some(role)) = (
        non_blank(req.email),
        req.password.filter(|p| !p.is_empty()),
        non_blank(req.role),
    ) else {
        return Err(AppError::BadRequest(
            "Missing required fields: email, password, and role.".to_string(),
        ));
    };

    if let Err(retry_after) = state.login_limiter.check(&email) {
        return Err(AppError::RateLimited(format!(
            "Too many login attempts. Try again in {retry_after} seconds."
        )));
    }

    let user = db::users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Incorrect email or password.".to_string()))?;

    // Role is checked before the password: a wrong role is always a 403.
    if user.role != role {
        return Err(AppError::Forbidden(format!(
            "Login failed. Role mismatch. This account is not registered as {role}."
        )));
    }

    let valid = password::verify(&password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized(
            "Incorrect email or password.".to_string(),
        ));
    }
    state.login_limiter.reset(&email);

    let token = encode_token(&Claims::new(user.id), &state.config.jwt_secret)
        .map_err(AppError::Internal)?;

    tracing::info!(user_id = %user.id, "User logged in");

    let jar = CookieJar::new().add(session_cookie(token, state.config.cookie_secure));
    let message = format!("Welcome back, {}!", user.fullname);
    Ok((
        jar,
        ApiResponse::ok(UserPayload {
            user: user.to_public(),
        })
        .with_message(message),
    ))
}

pub async fn logout() -> (CookieJar, ApiResponse<Empty>) {
    (
        CookieJar::new().add(cleared_cookie()),
        ApiResponse::message("Logged out successfully."),
    )
}

pub async fn get_my_profile(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<UserPayload>, AppError> {
    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    Ok(ApiResponse::ok(UserPayload {
        user: user.to_public(),
    }))
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<SharedState>,
    Upload(form, _): Upload<ProfileFiles>,
) -> Result<ApiResponse<UserPayload>, AppError> {
    let fullname = form.non_empty("fullname");
    let email = form.non_empty("email");
    let phone_number = form.non_empty("phoneNumber");
    let bio = form.text("bio");
    let skills = match form.list("skills") {
        Some(list) => Some(clean_skills(list.iter().map(String::as_str))),
        None => form.text("skills").map(parse_skills),
    };
    let photo_file = form.file("profilePhoto");
    let resume_file = form.file("resume");

    let has_text_updates = fullname.is_some()
        || email.is_some()
        || phone_number.is_some()
        || bio.is_some()
        || skills.is_some();
    if !has_text_updates && !form.has_files() {
        return Err(AppError::BadRequest(
            "No update information provided.".to_string(),
        ));
    }

    if photo_file.is_some_and(|f| !f.is_image()) {
        return Err(AppError::BadRequest(
            "Profile photo must be an image.".to_string(),
        ));
    }
    if resume_file.is_some_and(|f| !f.is_pdf()) {
        return Err(AppError::BadRequest("Resume must be a PDF.".to_string()));
    }

    let mut user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    if let Some(email) = email.filter(|e| *e != user.email) {
        if db::users::find_by_email(&state.pool, email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists.".to_string()));
        }
        user.email = email.to_string();
    }
    if let Some(phone) = phone_number.filter(|p| *p != user.phone_number) {
        if db::users::find_by_phone(&state.pool, phone).await?.is_some() {
            return Err(AppError::Conflict("Phone number already exists.".to_string()));
        }
        user.phone_number = phone.to_string();
    }
    if let Some(name) = fullname {
        user.fullname = name.to_string();
    }
    if let Some(bio) = bio {
        user.bio = Some(bio.to_string());
    }
    if let Some(skills) = skills {
        user.skills = skills;
    }

    // New uploads are rolled back if the save fails; replaced ones are
    // deleted once it succeeds.
    let mut uploaded: Vec<(String, ResourceType)> = Vec::new();
    let mut superseded: Vec<(String, ResourceType)> = Vec::new();

    if let Some(file) = photo_file {
        let asset = media::ingest(
            state.media.as_ref(),
            file,
            UploadOptions::image(PROFILE_PHOTO_FOLDER),
        )
        .await
        .map_err(|e| AppError::Internal(format!("Profile photo upload failed: {e}")))?;

        user.profile_photo = asset.url;
        if let Some(old) = user.profile_photo_public_id.replace(asset.public_id.clone()) {
            superseded.push((old, ResourceType::Image));
        }
        uploaded.push((asset.public_id, ResourceType::Image));
    }

    if let Some(file) = resume_file {
        let asset = match media::ingest(
            state.media.as_ref(),
            file,
            UploadOptions::raw(RESUME_FOLDER),
        )
        .await
        {
            Ok(asset) => asset,
            Err(e) => {
                discard_all(&state, &uploaded).await;
                return Err(AppError::Internal(format!("Resume upload failed: {e}")));
            }
        };

        user.resume = Some(asset.url);
        user.resume_original_name = Some(file.file_name.clone());
        if let Some(old) = user.resume_public_id.replace(asset.public_id.clone()) {
            superseded.push((old, ResourceType::Raw));
        }
        uploaded.push((asset.public_id, ResourceType::Raw));
    }

    let saved = match db::users::save_profile(&state.pool, &user).await {
        Ok(Some(saved)) => saved,
        Ok(None) => {
            discard_all(&state, &uploaded).await;
            return Err(AppError::NotFound("User not found.".to_string()));
        }
        Err(e) => {
            discard_all(&state, &uploaded).await;
            return Err(AppError::conflict_on_unique(
                e,
                "Email or phone number already exists.",
            ));
        }
    };

    discard_all(&state, &superseded).await;

    tracing::info!(user_id = %saved.id, files = uploaded.len(), "Profile updated");

    Ok(ApiResponse::ok(UserPayload {
        user: saved.to_public(),
    })
    .with_message("Profile updated successfully."))
}

async fn discard_all(state: &SharedState, assets: &[(String, ResourceType)]) {
    for (public_id, resource_type) in assets {
        media::discard(state.media.as_ref(), public_id, *resource_type).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skills_are_trimmed() {
        assert_eq!(parse_skills("go, rust , ts"), vec!["go", "rust", "ts"]);
    }

    #[test]
    fn empty_skill_entries_are_dropped() {
        assert_eq!(parse_skills(" , sql,,  ,docker "), vec!["sql", "docker"]);
        assert!(parse_skills("").is_empty());
    }

    #[test]
    fn skills_list_entries_are_cleaned() {
        let list = vec![" go".to_string(), String::new(), "rust ".to_string()];
        assert_eq!(clean_skills(list.iter().map(String::as_str)), vec!["go", "rust"]);
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), false);
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(1)));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = cleared_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
