pub mod companies;
pub mod jobs;
pub mod users;

use axum::routing::{get, post, put};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Users
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route("/api/users/logout", get(users::logout).post(users::logout))
        .route("/api/users/profile", get(users::get_my_profile))
        .route("/api/users/profile/update", post(users::update_profile))
        // Companies
        .route("/api/company/register", post(companies::register))
        .route("/api/company/get", get(companies::list))
        .route("/api/company/get/{id}", get(companies::get))
        .route("/api/company/update/{id}", put(companies::update))
        // Jobs
        .route("/api/job/postjob", post(jobs::post_job))
        .route("/api/job", get(jobs::list))
        .route("/api/job/get", get(jobs::list))
        .route("/api/job/getadminjobs", get(jobs::admin_jobs))
        .route("/api/job/{id}", get(jobs::get))
}
