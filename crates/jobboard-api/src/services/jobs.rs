//! Job listing operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use jobboard_models::{
    experience_stats, radius_for_km, resume_file_name, Applicant, ExperienceStats, Job, JobDraft,
    JobId, Role, User, UserId,
};
use jobboard_query::{Document, QueryPlan, QueryRequest};
use jobboard_storage::{extension_of, is_allowed_extension, ResumeStore};
use jobboard_store::{JobRepository, StoreError, JOBS};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::geocoder::Geocoder;

/// Attempts at recording an applicant before giving up on a busy listing.
const MAX_APPLY_ATTEMPTS: u32 = 10;
const APPLY_RETRY_DELAY_MS: u64 = 10;

/// A résumé file received with an application.
#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Service for job listings and applications.
#[derive(Clone)]
pub struct JobService {
    jobs: JobRepository,
    resumes: Arc<dyn ResumeStore>,
    geocoder: Arc<dyn Geocoder>,
    max_file_size: usize,
}

impl JobService {
    pub fn new(
        jobs: JobRepository,
        resumes: Arc<dyn ResumeStore>,
        geocoder: Arc<dyn Geocoder>,
        max_file_size: usize,
    ) -> Self {
        Self {
            jobs,
            resumes,
            geocoder,
            max_file_size,
        }
    }

    pub fn repo(&self) -> &JobRepository {
        &self.jobs
    }

    /// Listings for a client query string.
    pub async fn list(&self, request: &QueryRequest) -> ApiResult<Vec<Document>> {
        let plan = QueryPlan::from_request_with(request, &JOBS.plan_defaults());
        Ok(self.jobs.find(plan).await?)
    }

    /// Listing matching both id and slug.
    pub async fn get(&self, id: &JobId, slug: &str) -> ApiResult<Job> {
        self.jobs
            .get(id)
            .await?
            .filter(|job| job.slug == slug)
            .ok_or_else(|| ApiError::not_found("Job not found"))
    }

    /// Listings within `distance_km` of a geocoded zipcode.
    pub async fn within(&self, zipcode: &str, distance_km: f64) -> ApiResult<Vec<Job>> {
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(ApiError::bad_request("Please enter a valid distance"));
        }
        let center = self.geocoder.geocode(zipcode).await?.coordinates;
        Ok(self
            .jobs
            .within_radius(&center, radius_for_km(distance_km))
            .await?)
    }

    /// Per-experience statistics over listings matching `topic`.
    pub async fn stats(&self, topic: &str) -> ApiResult<Vec<ExperienceStats>> {
        let jobs = self.jobs.matching_text(topic).await?;
        Ok(experience_stats(&jobs))
    }

    pub async fn create(&self, owner: &User, draft: JobDraft) -> ApiResult<Job> {
        let mut job = Job::create(draft, owner.id.clone(), Utc::now())?;
        job.location = Some(self.geocoder.geocode(&job.address).await?.into_location());

        let job = self.jobs.insert(&job).await?;
        metrics::record_job_created();
        info!(job_id = %job.id, user_id = %owner.id, "Job created");
        Ok(job)
    }

    pub async fn update(&self, user: &User, id: &JobId, patch: JobDraft) -> ApiResult<Job> {
        let job = self.require(id).await?;
        ensure_can_manage(user, &job, "update")?;

        let mut updated = job.updated(patch)?;
        if updated.address != job.address || updated.location.is_none() {
            updated.location = Some(self.geocoder.geocode(&updated.address).await?.into_location());
        }

        let updated = self.jobs.replace(&updated).await?;
        info!(job_id = %id, user_id = %user.id, "Job updated");
        Ok(updated)
    }

    /// Delete a listing and its applicants' résumés.
    pub async fn delete(&self, user: &User, id: &JobId) -> ApiResult<()> {
        let job = self.require(id).await?;
        ensure_can_manage(user, &job, "delete")?;

        self.remove_resumes(&job).await;
        self.jobs.delete(id).await?;
        metrics::record_job_deleted();
        info!(job_id = %id, user_id = %user.id, "Job deleted");
        Ok(())
    }

    /// Record an application with its résumé.
    pub async fn apply(&self, user: &User, id: &JobId, upload: Option<ResumeUpload>) -> ApiResult<Job> {
        let result = self.try_apply(user, id, upload).await;
        metrics::record_application(if result.is_ok() { "accepted" } else { "rejected" });
        result
    }

    async fn try_apply(&self, user: &User, id: &JobId, upload: Option<ResumeUpload>) -> ApiResult<Job> {
        let job = self.require(id).await?;
        ensure_accepting(&job, user)?;

        let upload = upload.ok_or_else(|| ApiError::bad_request("Please upload file."))?;
        let extension = extension_of(&upload.file_name)
            .filter(|ext| is_allowed_extension(ext))
            .ok_or_else(|| ApiError::bad_request("Please upload document file."))?;
        if upload.bytes.len() > self.max_file_size {
            return Err(ApiError::bad_request(format!(
                "Please upload file less than {}.",
                format_size(self.max_file_size)
            )));
        }

        let name = resume_file_name(&user.name, &job.id, &extension);
        self.resumes.save(&name, upload.bytes).await?;

        match self.record_applicant(job, user, &name).await {
            Ok(job) => {
                info!(job_id = %id, user_id = %user.id, "Application received");
                Ok(job)
            }
            Err(e) => {
                if !self.resume_is_listed(id, &name).await {
                    self.remove_resume(&name).await;
                }
                Err(e)
            }
        }
    }

    /// Append the applicant, re-reading the listing whenever another write
    /// got there first.
    async fn record_applicant(&self, mut job: Job, user: &User, resume: &str) -> ApiResult<Job> {
        for attempt in 1..=MAX_APPLY_ATTEMPTS {
            job.applicants_applied.push(Applicant {
                id: user.id.clone(),
                resume: resume.to_string(),
            });
            match self.jobs.replace(&job).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::Conflict(_)) => {
                    debug!(job_id = %job.id, attempt, "Listing changed during application, retrying");
                    tokio::time::sleep(Duration::from_millis(APPLY_RETRY_DELAY_MS * u64::from(attempt)))
                        .await;
                    job = self.require(&job.id).await?;
                    ensure_accepting(&job, user)?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(job_id = %job.id, user_id = %user.id, attempts = MAX_APPLY_ATTEMPTS, "Application lost to concurrent updates");
        Err(ApiError::Conflict(
            "This job is receiving many applications. Please try again.".to_string(),
        ))
    }

    /// Whether a stored listing references the résumé file.
    async fn resume_is_listed(&self, id: &JobId, resume: &str) -> bool {
        matches!(
            self.jobs.get(id).await,
            Ok(Some(job)) if job.applicants_applied.iter().any(|a| a.resume == resume)
        )
    }

    pub async fn applied_by(&self, user: &UserId) -> ApiResult<Vec<Job>> {
        Ok(self.jobs.applied_by(user).await?)
    }

    pub async fn published_by(&self, user: &UserId) -> ApiResult<Vec<Job>> {
        Ok(self.jobs.owned_by(user).await?)
    }

    /// Remove what a deleted account leaves behind: its listings when it
    /// publishes, its résumé files when it applies.
    pub async fn delete_user_data(&self, user: &User) -> ApiResult<()> {
        if user.role.can_publish() {
            for job in self.jobs.owned_by(&user.id).await? {
                self.remove_resumes(&job).await;
            }
            let deleted = self.jobs.delete_owned_by(&user.id).await?;
            info!(user_id = %user.id, deleted, "Deleted listings of removed user");
        }

        for job in self.jobs.applied_by(&user.id).await? {
            for applicant in job.applicants_applied.iter().filter(|a| a.id == user.id) {
                self.remove_resume(&applicant.resume).await;
            }
        }
        Ok(())
    }

    async fn require(&self, id: &JobId) -> ApiResult<Job> {
        self.jobs.require(id).await.map_err(|e| match e {
            StoreError::NotFound(_) => ApiError::not_found("Job not found"),
            other => other.into(),
        })
    }

    async fn remove_resumes(&self, job: &Job) {
        for applicant in &job.applicants_applied {
            self.remove_resume(&applicant.resume).await;
        }
    }

    async fn remove_resume(&self, name: &str) {
        if let Err(e) = self.resumes.delete(name).await {
            warn!(resume = %name, error = %e, "Failed to delete résumé");
        }
    }
}

/// A listing takes an application while open and not yet applied to by `user`.
fn ensure_accepting(job: &Job, user: &User) -> ApiResult<()> {
    if job.is_closed(Utc::now()) {
        return Err(ApiError::bad_request(
            "You can not apply to this job. Date is over.",
        ));
    }
    if job.has_applicant(&user.id) {
        return Err(ApiError::bad_request("You have already applied to this job."));
    }
    Ok(())
}

/// Only the owner or an admin may change a listing.
fn ensure_can_manage(user: &User, job: &Job, action: &str) -> ApiResult<()> {
    if job.is_owned_by(&user.id) || user.role == Role::Admin {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "User({}) is not allowed to {} this job.",
            user.id, action
        )))
    }
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1_000_000 && bytes % 1_000_000 == 0 {
        format!("{}MB", bytes / 1_000_000)
    } else if bytes >= 1_000 && bytes % 1_000 == 0 {
        format!("{}KB", bytes / 1_000)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geocoder::StaticGeocoder;
    use chrono::Duration;
    use jobboard_models::Coordinates;
    use jobboard_storage::LocalResumeStore;
    use async_trait::async_trait;
    use jobboard_store::{CollectionSchema, DocumentStore, MemoryStore, StoreResult};

    /// Memory store whose replaces always lose the race.
    struct ContendedStore(MemoryStore);

    #[async_trait]
    impl DocumentStore for ContendedStore {
        fn backend(&self) -> &'static str {
            "contended"
        }

        async fn insert(&self, schema: &CollectionSchema, document: Document) -> StoreResult<Document> {
            self.0.insert(schema, document).await
        }

        async fn get(&self, schema: &CollectionSchema, id: &str) -> StoreResult<Option<Document>> {
            self.0.get(schema, id).await
        }

        async fn replace(&self, schema: &CollectionSchema, _document: Document) -> StoreResult<Document> {
            Err(StoreError::conflict(schema.name))
        }

        async fn delete(&self, schema: &CollectionSchema, id: &str) -> StoreResult<bool> {
            self.0.delete(schema, id).await
        }

        async fn find(&self, schema: &CollectionSchema, plan: &QueryPlan) -> StoreResult<Vec<Document>> {
            self.0.find(schema, plan).await
        }

        async fn ping(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    fn draft(title: &str) -> JobDraft {
        JobDraft {
            title: Some(title.into()),
            description: Some("Build services in Rust".into()),
            address: Some("1 Main St, Boston".into()),
            company: Some("Acme".into()),
            industry: Some(vec!["IT".into()]),
            job_type: Some("Permanent".into()),
            min_education: Some("Bachelors".into()),
            experience: Some("2 years - 5 years".into()),
            salary: Some(90000),
            ..JobDraft::default()
        }
    }

    fn service(dir: &std::path::Path) -> JobService {
        service_on(Arc::new(MemoryStore::new()), dir)
    }

    fn service_on(store: Arc<dyn DocumentStore>, dir: &std::path::Path) -> JobService {
        JobService::new(
            JobRepository::new(store),
            Arc::new(LocalResumeStore::new(dir)),
            Arc::new(StaticGeocoder::new(Coordinates::new(-71.06, 42.36))),
            2_000_000,
        )
    }

    fn user(role: Role) -> User {
        User::new("Jane Doe", "jane@example.com", role, "hash", Utc::now())
    }

    fn resume(name: &str, size: usize) -> Option<ResumeUpload> {
        Some(ResumeUpload {
            file_name: name.into(),
            bytes: vec![0; size],
        })
    }

    #[tokio::test]
    async fn test_create_geocodes_and_get_checks_slug() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let employer = user(Role::Employer);

        let job = jobs.create(&employer, draft("Rust Developer")).await.unwrap();
        assert_eq!(job.location.as_ref().unwrap().coordinates, [-71.06, 42.36]);
        assert_eq!(job.user, employer.id);

        assert!(jobs.get(&job.id, "rust-developer").await.is_ok());
        let err = jobs.get(&job.id, "other-slug").await.unwrap_err();
        assert_eq!(err.to_string(), "Job not found");
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_may_update() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let owner = user(Role::Employer);
        let job = jobs.create(&owner, draft("Rust Developer")).await.unwrap();

        let patch = JobDraft {
            title: Some("Senior Rust Developer".into()),
            ..JobDraft::default()
        };
        let stranger = user(Role::Employer);
        let err = jobs.update(&stranger, &job.id, patch.clone()).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);

        let updated = jobs.update(&user(Role::Admin), &job.id, patch).await.unwrap();
        assert_eq!(updated.slug, "senior-rust-developer");
        assert_eq!(updated.version, 1);
    }

    #[tokio::test]
    async fn test_apply_rules() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let job = jobs.create(&user(Role::Employer), draft("Rust Developer")).await.unwrap();
        let applicant = user(Role::User);

        let err = jobs.apply(&applicant, &job.id, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Please upload file.");

        let err = jobs.apply(&applicant, &job.id, resume("cv.png", 10)).await.unwrap_err();
        assert_eq!(err.to_string(), "Please upload document file.");

        let err = jobs
            .apply(&applicant, &job.id, resume("cv.pdf", 2_000_001))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please upload file less than 2MB.");

        let applied = jobs.apply(&applicant, &job.id, resume("CV.PDF", 10)).await.unwrap();
        let expected = format!("Jane_Doe_{}.pdf", job.id);
        assert_eq!(applied.applicants_applied[0].resume, expected);
        assert!(dir.path().join(&expected).exists());

        let err = jobs.apply(&applicant, &job.id, resume("cv.pdf", 10)).await.unwrap_err();
        assert_eq!(err.to_string(), "You have already applied to this job.");

        assert_eq!(jobs.applied_by(&applicant.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_applications_are_all_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let job = jobs.create(&user(Role::Employer), draft("Rust Developer")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let jobs = jobs.clone();
            let id = job.id.clone();
            let applicant = User::new(
                format!("Applicant {i}"),
                format!("applicant{i}@example.com"),
                Role::User,
                "hash",
                Utc::now(),
            );
            handles.push(tokio::spawn(async move {
                jobs.apply(&applicant, &id, resume("cv.pdf", 10)).await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        // Every lost race is another applicant's successful write, so eight
        // applicants settle within the retry budget.
        assert_eq!(accepted, 8);
        let stored = jobs.repo().get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.applicants_applied.len(), accepted);
        for applicant in &stored.applicants_applied {
            assert!(dir.path().join(&applicant.resume).exists());
        }
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, accepted);
    }

    #[tokio::test]
    async fn test_failed_application_removes_resume() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service_on(Arc::new(ContendedStore(MemoryStore::new())), dir.path());
        let job = jobs.create(&user(Role::Employer), draft("Rust Developer")).await.unwrap();

        let err = jobs
            .apply(&user(Role::User), &job.id, resume("cv.pdf", 10))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
        assert!(!dir.path().join(format!("Jane_Doe_{}.pdf", job.id)).exists());
    }

    #[tokio::test]
    async fn test_apply_to_missing_job() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let err = jobs
            .apply(&user(Role::User), &JobId::new(), resume("cv.pdf", 10))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Job not found");
    }

    #[tokio::test]
    async fn test_apply_after_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let closed = JobDraft {
            posting_date: Some(Utc::now() - Duration::days(10)),
            last_date: Some(Utc::now() - Duration::days(1)),
            ..draft("Old Listing")
        };
        let job = jobs.create(&user(Role::Employer), closed).await.unwrap();
        let err = jobs
            .apply(&user(Role::User), &job.id, resume("cv.pdf", 10))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You can not apply to this job. Date is over.");
    }

    #[tokio::test]
    async fn test_delete_removes_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let owner = user(Role::Employer);
        let job = jobs.create(&owner, draft("Rust Developer")).await.unwrap();
        let applied = jobs
            .apply(&user(Role::User), &job.id, resume("cv.docx", 10))
            .await
            .unwrap();
        let file = dir.path().join(&applied.applicants_applied[0].resume);
        assert!(file.exists());

        jobs.delete(&owner, &job.id).await.unwrap();
        assert!(!file.exists());
        let err = jobs.delete(&owner, &job.id).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_and_radius() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = service(dir.path());
        let employer = user(Role::Employer);
        jobs.create(&employer, draft("Rust Developer")).await.unwrap();
        jobs.create(&employer, draft("Java Developer")).await.unwrap();

        let stats = jobs.stats("rust developer").await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].experience, "2 YEARS - 5 YEARS");
        assert_eq!(stats[0].total_jobs, 1);
        assert!(jobs.stats("cobol").await.unwrap().is_empty());

        assert_eq!(jobs.within("02108", 10.0).await.unwrap().len(), 2);
        assert!(jobs.within("02108", -1.0).await.is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(2_000_000), "2MB");
        assert_eq!(format_size(500_000), "500KB");
        assert_eq!(format_size(1234), "1234 bytes");
    }
}
