use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::db::jobs::{JobFilter, NewJob};
use crate::error::AppError;
use crate::extract::{parse_id, JsonBody, PathParam, QueryParams};
use crate::models::JobView;
use crate::response::ApiResponse;
use crate::state::SharedState;

/// A number sent either as JSON number or as numeric text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn is_blank(&self) -> bool {
        matches!(self, Numeric::Text(s) if s.trim().is_empty())
    }

    pub fn to_f64(&self) -> Option<f64> {
        let value = match self {
            Numeric::Number(n) => *n,
            Numeric::Text(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostJob {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub salary: Option<Numeric>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub experience: Option<Numeric>,
    pub position: Option<Numeric>,
    pub company_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub experience: Option<String>,
    pub salary: Option<String>,
}

impl JobQuery {
    pub fn into_filter(self) -> JobFilter {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        JobFilter {
            keyword: present(self.keyword),
            location: present(self.location),
            job_type: present(self.job_type),
            experience: self.experience.as_deref().and_then(parse_range),
            salary: self.salary.as_deref().and_then(parse_range),
        }
    }
}

#[derive(Serialize)]
pub struct JobPayload {
    pub job: JobView,
}

#[derive(Serialize)]
pub struct JobsPayload {
    pub jobs: Vec<JobView>,
}

/// Parse `"min-max"`. Anything but exactly two numeric parts is `None`.
pub fn parse_range(raw: &str) -> Option<(f64, f64)> {
    let parts: Vec<&str> = raw.split('-').collect();
    let [min, max] = parts.as_slice() else {
        return None;
    };
    let min: f64 = min.trim().parse().ok()?;
    let max: f64 = max.trim().parse().ok()?;
    (min.is_finite() && max.is_finite()).then_some((min, max))
}

fn required_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub async fn post_job(
    auth: AuthUser,
    State(state): State<SharedState>,
    JsonBody(req): JsonBody<PostJob>,
) -> Result<(StatusCode, ApiResponse<JobPayload>), AppError> {
    let numbers_present = [&req.salary, &req.experience, &req.position]
        .iter()
        .all(|n| matches!(n, Some(n) if !n.is_blank()));

    let (
        Some(title),
        Some(description),
        Some(requirements),
        Some(location),
        Some(job_type),
        Some(company_id),
        true,
    ) = (
        required_text(&req.title),
        required_text(&req.description),
        required_text(&req.requirements),
        required_text(&req.location),
        required_text(&req.job_type),
        required_text(&req.company_id),
        numbers_present,
    )
    else {
        return Err(AppError::BadRequest("All fields are required.".to_string()));
    };

    let salary = req
        .salary
        .as_ref()
        .and_then(Numeric::to_f64)
        .ok_or_else(|| AppError::BadRequest("Salary must be a number.".to_string()))?;
    let experience = req
        .experience
        .as_ref()
        .and_then(Numeric::to_f64)
        .filter(|e| *e >= 0.0)
        .ok_or_else(|| {
            AppError::BadRequest("Experience must be a non-negative number.".to_string())
        })?;
    let position = req
        .position
        .as_ref()
        .and_then(Numeric::to_f64)
        .filter(|p| p.fract() == 0.0 && *p >= 1.0 && *p <= i32::MAX as f64)
        .map(|p| p as i32)
        .ok_or_else(|| {
            AppError::BadRequest("Position must be a positive whole number.".to_string())
        })?;

    let company_id = parse_id(company_id, "company")?;
    if db::companies::find_by_id(&state.pool, company_id).await?.is_none() {
        return Err(AppError::NotFound("Company not found".to_string()));
    }

    let job = db::jobs::create(
        &state.pool,
        &NewJob {
            title,
            description,
            requirements,
            salary,
            location,
            job_type,
            experience,
            position,
            company_id,
            created_by: auth.user_id,
        },
    )
    .await?;

    tracing::info!(job_id = %job.id, company_id = %company_id, "Job posted");

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(JobPayload {
            job: job.unpopulated(),
        })
        .with_message("Job posted successfully."),
    ))
}

pub async fn list(
    _auth: AuthUser,
    State(state): State<SharedState>,
    QueryParams(query): QueryParams<JobQuery>,
) -> Result<ApiResponse<JobsPayload>, AppError> {
    let filter = query.into_filter();
    tracing::debug!(?filter, "Searching jobs");

    let jobs = db::jobs::search(&state.pool, &filter).await?;
    let jobs = db::jobs::populate(&state.pool, jobs).await?;

    let message = if jobs.is_empty() {
        "No jobs found matching your criteria."
    } else {
        "Jobs retrieved successfully."
    };
    Ok(ApiResponse::ok(JobsPayload { jobs }).with_message(message))
}

pub async fn get(
    _auth: AuthUser,
    State(state): State<SharedState>,
    PathParam(id): PathParam<String>,
) -> Result<ApiResponse<JobPayload>, AppError> {
    let id = parse_id(&id, "job")?;
    let job = db::jobs::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;

    let company = db::companies::find_by_id(&state.pool, job.company_id).await?;
    Ok(ApiResponse::ok(JobPayload {
        job: job.with_company(company),
    }))
}

pub async fn admin_jobs(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse<JobsPayload>, AppError> {
    let jobs = db::jobs::list_by_creator(&state.pool, auth.user_id).await?;
    let jobs = db::jobs::populate(&state.pool, jobs).await?;
    Ok(ApiResponse::ok(JobsPayload { jobs }))
}
