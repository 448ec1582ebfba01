use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::Company;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub salary: f64,
    pub location: String,
    pub job_type: String,
    pub experience: f64,
    pub position: i32,
    #[serde(skip_serializing)]
    pub company_id: Uuid,
    #[serde(rename = "created_by")]
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The `company` key of a serialized job: the bare id, or the resolved
/// company document.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CompanyRef {
    Id(Uuid),
    Populated(Company),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub company: CompanyRef,
}

impl Job {
    pub fn unpopulated(self) -> JobView {
        JobView {
            company: CompanyRef::Id(self.company_id),
            job: self,
        }
    }

    pub fn with_company(self, company: Option<Company>) -> JobView {
        match company {
            Some(company) => JobView {
                job: self,
                company: CompanyRef::Populated(company),
            },
            None => self.unpopulated(),
        }
    }
}
