use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::db::companies::CompanyChanges;
use crate::error::AppError;
use crate::extract::{parse_id, JsonBody, PathParam};
use crate::media::{self, ResourceType, UploadOptions};
use crate::models::Company;
use crate::response::ApiResponse;
use crate::state::SharedState;
use crate::upload::{SingleFile, Upload};

const LOGO_FOLDER: &str = "company_logos";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCompany {
    pub company_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct CompanyPayload {
    pub company: Company,
}

#[derive(Serialize)]
pub struct CompaniesPayload {
    pub companies: Vec<Company>,
}

pub async fn register(
    auth: AuthUser,
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<RegisterCompany>,
) -> Result<(StatusCode, ApiResponse<CompanyPayload>), AppError> {
    let Some(name) = req.company_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Err(AppError::BadRequest("Company name is required".to_string()));
    };
    let Some(description) = req.description.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        return Err(AppError::BadRequest(
            "Company description is required".to_string(),
        ));
    };

    // Names are unique across all recruiters, not per owner.
    if db::companies::find_by_name(&state.pool, name).await?.is_some() {
        return Err(AppError::Conflict("Company is already registered".to_string()));
    }

    let company = db::companies::create(&state.pool, name, description, auth.user_id).await?;

    tracing::info!(company_id = %company.id, user_id = %auth.user_id, "Company registered");

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(CompanyPayload { company }).with_message("Company created successfully."),
    ))
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<CompaniesPayload>, AppError> {
    let companies = db::companies::list_by_owner(&state.pool, auth.user_id).await?;
    Ok(ApiResponse::ok(CompaniesPayload { companies }))
}

pub async fn get(
    _auth: AuthUser,
    State(state): State<SharedState>,
    PathParam(id): PathParam<String>,
) -> Result<ApiResponse<CompanyPayload>, AppError> {
    let id = parse_id(&id, "company")?;
    let company = db::companies::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;
    Ok(ApiResponse::ok(CompanyPayload { company }))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    PathParam(id): PathParam<String>,
    Upload(form, _): Upload<SingleFile>,
) -> Result<ApiResponse<CompanyPayload>, AppError> {
    let id = parse_id(&id, "company")?;

    let existing = db::companies::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Company not found".to_string()))?;
    if !existing.user_ids.contains(&auth.user_id) {
        return Err(AppError::Forbidden(
            "You are not allowed to update this company".to_string(),
        ));
    }

    let name = form.non_empty("name");
    if let Some(name) = name.filter(|n| *n != existing.name) {
        if db::companies::find_by_name(&state.pool, name).await?.is_some() {
            return Err(AppError::Conflict("Company is already registered".to_string()));
        }
    }

    let logo_file = form.file("file");
    if logo_file.is_some_and(|f| !f.is_image()) {
        return Err(AppError::BadRequest(
            "Company logo must be an image.".to_string(),
        ));
    }

    let logo = match logo_file {
        Some(file) => Some(
            media::ingest(state.media.as_ref(), file, UploadOptions::image(LOGO_FOLDER))
                .await
                .map_err(|e| AppError::Internal(format!("Logo upload failed: {e}")))?,
        ),
        None => None,
    };

    let changes = CompanyChanges {
        name,
        description: form.text("description"),
        website: form.text("website"),
        location: form.text("location"),
        logo: logo.as_ref().map(|a| a.url.as_str()),
    };

    let updated = db::companies::update(&state.pool, id, &changes).await;

    let company = match updated {
        Ok(Some(company)) => company,
        Ok(None) => {
            if let Some(asset) = &logo {
                media::discard(state.media.as_ref(), &asset.public_id, ResourceType::Image).await;
            }
            return Err(AppError::NotFound("Company not found".to_string()));
        }
        Err(e) => {
            if let Some(asset) = &logo {
                media::discard(state.media.as_ref(), &asset.public_id, ResourceType::Image).await;
            }
            return Err(AppError::Database(e));
        }
    };

    tracing::info!(company_id = %company.id, user_id = %auth.user_id, "Company updated");

    Ok(ApiResponse::ok(CompanyPayload { company }).with_message("Company updated"))
}
