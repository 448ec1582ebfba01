pub mod company;
pub mod job;
pub mod user;

pub use company::Company;
pub use job::{CompanyRef, Job, JobView};
pub use user::{Profile, PublicUser, Role, User};
