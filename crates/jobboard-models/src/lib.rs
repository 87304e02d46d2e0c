//! Shared data models for the job board backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job listings, their enumerations and client drafts
//! - User accounts, roles and account-management requests
//! - GeoJSON locations and spherical distance
//! - Per-experience statistics

pub mod error;
pub mod geo;
pub mod job;
pub mod stats;
pub mod user;
pub mod utils;

pub use error::{ModelError, ModelResult};
pub use geo::{radius_for_km, Coordinates, Location, EARTH_RADIUS_KM};
pub use job::{
    resume_file_name, Applicant, Education, Experience, Industry, Job, JobDraft, JobId, JobType,
    DEFAULT_OPEN_DAYS,
};
pub use stats::{experience_stats, ExperienceStats};
pub use user::{
    PasswordReset, PasswordUpdate, RegisterUser, Registration, Role, UpdateProfile, User, UserId,
    UserProfile,
};
pub use utils::slugify;
