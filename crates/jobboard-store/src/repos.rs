//! Typed repositories over a [`DocumentStore`].

use std::sync::Arc;

use jobboard_models::{Coordinates, Job, JobId, User, UserId};
use jobboard_query::{Document, FilterExpression, QueryPlan, TextPredicate};

use crate::error::{StoreError, StoreResult};
use crate::schema::{JOBS, USERS};
use crate::store::{from_document, to_document, DocumentStore};

/// Jobs collection.
#[derive(Clone)]
pub struct JobRepository {
    store: Arc<dyn DocumentStore>,
}

impl JobRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn insert(&self, job: &Job) -> StoreResult<Job> {
        from_document(self.store.insert(&JOBS, to_document(job)?).await?)
    }

    pub async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        self.store
            .get(&JOBS, id.as_str())
            .await?
            .map(from_document)
            .transpose()
    }

    /// Listing by id, or `NotFound`.
    pub async fn require(&self, id: &JobId) -> StoreResult<Job> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("{}/{}", JOBS.name, id)))
    }

    pub async fn replace(&self, job: &Job) -> StoreResult<Job> {
        from_document(self.store.replace(&JOBS, to_document(job)?).await?)
    }

    pub async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        self.store.delete(&JOBS, id.as_str()).await
    }

    /// Raw documents for a client query; applicants stay hidden unless named.
    pub async fn find(&self, plan: QueryPlan) -> StoreResult<Vec<Document>> {
        let projection = plan.projection.clone().hiding(JOBS.hidden_fields);
        self.store.find(&JOBS, &plan.with_projection(projection)).await
    }

    /// Every listing matching `filter`, as models.
    pub async fn find_jobs(&self, filter: FilterExpression) -> StoreResult<Vec<Job>> {
        self.store
            .find(&JOBS, &QueryPlan::new().with_filter(filter))
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Listings whose location lies within `radius` radians of `center`.
    pub async fn within_radius(&self, center: &Coordinates, radius: f64) -> StoreResult<Vec<Job>> {
        let jobs = self.find_jobs(FilterExpression::new()).await?;
        Ok(jobs
            .into_iter()
            .filter(|job| {
                job.location
                    .as_ref()
                    .is_some_and(|location| location.within(center, radius))
            })
            .collect())
    }

    /// Listings whose text fields contain `phrase`.
    pub async fn matching_text(&self, phrase: &str) -> StoreResult<Vec<Job>> {
        let plan = QueryPlan::new().with_text(TextPredicate::phrase(phrase));
        self.store
            .find(&JOBS, &plan)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn owned_by(&self, user: &UserId) -> StoreResult<Vec<Job>> {
        self.find_jobs(FilterExpression::new().eq("user", user.as_str()))
            .await
    }

    pub async fn applied_by(&self, user: &UserId) -> StoreResult<Vec<Job>> {
        self.find_jobs(FilterExpression::new().eq("applicantsApplied.id", user.as_str()))
            .await
    }

    /// Delete every listing owned by `user`, returning how many went.
    pub async fn delete_owned_by(&self, user: &UserId) -> StoreResult<usize> {
        let mut deleted = 0;
        for job in self.owned_by(user).await? {
            if self.delete(&job.id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Users collection.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn insert(&self, user: &User) -> StoreResult<User> {
        from_document(self.store.insert(&USERS, to_document(user)?).await?)
    }

    pub async fn get(&self, id: &UserId) -> StoreResult<Option<User>> {
        self.store
            .get(&USERS, id.as_str())
            .await?
            .map(from_document)
            .transpose()
    }

    async fn find_one(&self, filter: FilterExpression) -> StoreResult<Option<User>> {
        let plan = QueryPlan::new().with_filter(filter);
        self.store
            .find(&USERS, &plan)
            .await?
            .into_iter()
            .next()
            .map(from_document)
            .transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.find_one(FilterExpression::new().eq("email", email)).await
    }

    /// User holding the reset token digest; expiry is checked by the caller.
    pub async fn find_by_reset_token(&self, digest: &str) -> StoreResult<Option<User>> {
        self.find_one(FilterExpression::new().eq("resetPasswordToken", digest))
            .await
    }

    pub async fn replace(&self, user: &User) -> StoreResult<User> {
        from_document(self.store.replace(&USERS, to_document(user)?).await?)
    }

    pub async fn delete(&self, id: &UserId) -> StoreResult<bool> {
        self.store.delete(&USERS, id.as_str()).await
    }

    /// Raw documents for a client query, without credentials.
    pub async fn find(&self, plan: QueryPlan) -> StoreResult<Vec<Document>> {
        let projection = plan.projection.clone().hiding(USERS.hidden_fields);
        self.store.find(&USERS, &plan.with_projection(projection)).await
    }
}
