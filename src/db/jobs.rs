use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db;
use crate::models::{Job, JobView};

pub struct NewJob<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub requirements: &'a str,
    pub salary: f64,
    pub location: &'a str,
    pub job_type: &'a str,
    pub experience: f64,
    pub position: i32,
    pub company_id: Uuid,
    pub created_by: Uuid,
}

/// Optional constraints for a job search. Ranges are inclusive.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JobFilter {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub experience: Option<(f64, f64)>,
    pub salary: Option<(f64, f64)>,
}

pub async fn create(pool: &PgPool, job: &NewJob<'_>) -> Result<Job, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        "INSERT INTO jobs (title, description, requirements, salary, location, job_type,
                           experience, position, company_id, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(job.title)
    .bind(job.description)
    .bind(job.requirements)
    .bind(job.salary)
    .bind(job.location)
    .bind(job.job_type)
    .bind(job.experience)
    .bind(job.position)
    .bind(job.company_id)
    .bind(job.created_by)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_creator(pool: &PgPool, user_id: Uuid) -> Result<Vec<Job>, sqlx::Error> {
    sqlx::query_as::<_, Job>(
        "SELECT * FROM jobs WHERE created_by = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn search(pool: &PgPool, filter: &JobFilter) -> Result<Vec<Job>, sqlx::Error> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM jobs WHERE TRUE");

    if let Some(keyword) = &filter.keyword {
        let pattern = format!("%{}%", escape_like(keyword));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(location) = &filter.location {
        qb.push(" AND location = ").push_bind(location.clone());
    }
    if let Some(job_type) = &filter.job_type {
        qb.push(" AND job_type = ").push_bind(job_type.clone());
    }
    if let Some((min, max)) = filter.experience {
        qb.push(" AND experience BETWEEN ")
            .push_bind(min)
            .push(" AND ")
            .push_bind(max);
    }
    if let Some((min, max)) = filter.salary {
        qb.push(" AND salary BETWEEN ")
            .push_bind(min)
            .push(" AND ")
            .push_bind(max);
    }

    qb.push(" ORDER BY created_at DESC");

    qb.build_query_as::<Job>().fetch_all(pool).await
}

/// Resolve the company of every job with a single lookup.
pub async fn populate(pool: &PgPool, jobs: Vec<Job>) -> Result<Vec<JobView>, sqlx::Error> {
    let mut ids: Vec<Uuid> = jobs.iter().map(|j| j.company_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let companies: HashMap<Uuid, _> = db::companies::find_many(pool, &ids)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    Ok(jobs
        .into_iter()
        .map(|job| {
            let company = companies.get(&job.company_id).cloned();
            job.with_company(company)
        })
        .collect())
}

/// Escape LIKE metacharacters so the keyword matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
