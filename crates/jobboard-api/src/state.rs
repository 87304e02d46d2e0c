//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use jobboard_storage::{LocalResumeStore, R2Client, ResumeStore};
use jobboard_store::{DocumentStore, FirestoreStore, JobRepository, MemoryStore, UserRepository};

use crate::auth::JwtKeys;
use crate::config::{ApiConfig, StorageBackend, StoreBackend};
use crate::services::{
    Geocoder, HttpMailer, JobService, LogMailer, Mailer, MapQuestGeocoder, StaticGeocoder,
    UserService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn DocumentStore>,
    pub resumes: Arc<dyn ResumeStore>,
    pub jwt: Arc<JwtKeys>,
    pub jobs: JobService,
    pub users: UserService,
}

impl AppState {
    /// Create application state from configured backends.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;

        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Memory => {
                warn!("Using in-memory document store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
            StoreBackend::Firestore => Arc::new(FirestoreStore::from_env()?),
        };

        let resumes: Arc<dyn ResumeStore> = match config.storage_backend {
            StorageBackend::Local => Arc::new(LocalResumeStore::new(&config.upload_path)),
            StorageBackend::R2 => Arc::new(R2Client::from_env()?),
        };

        let geocoder: Arc<dyn Geocoder> = match &config.geocoder_api_key {
            Some(key) => Arc::new(MapQuestGeocoder::new(key.clone())?),
            None => {
                warn!("GEOCODER_API_KEY not set; all addresses resolve to a fixed point");
                Arc::new(StaticGeocoder::default())
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.mail_api_url {
            Some(url) => Arc::new(HttpMailer::new(
                url.clone(),
                config.mail_api_key.clone(),
                config.mail_from.clone(),
            )?),
            None => {
                warn!("MAIL_API_URL not set; emails are only logged");
                Arc::new(LogMailer::new())
            }
        };

        info!(
            store = store.backend(),
            storage = resumes.backend(),
            "Backends configured"
        );

        Ok(Self::from_parts(config, store, resumes, geocoder, mailer))
    }

    /// Assemble state from ready-made collaborators.
    pub fn from_parts(
        config: ApiConfig,
        store: Arc<dyn DocumentStore>,
        resumes: Arc<dyn ResumeStore>,
        geocoder: Arc<dyn Geocoder>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let jwt = Arc::new(JwtKeys::new(&config.jwt_secret, config.jwt_expires_in));
        let jobs = JobService::new(
            JobRepository::new(Arc::clone(&store)),
            Arc::clone(&resumes),
            geocoder,
            config.max_file_size,
        );
        let users = UserService::new(
            UserRepository::new(Arc::clone(&store)),
            jobs.clone(),
            mailer,
            config.bcrypt_cost,
            config.reset_token_ttl,
        );

        Self {
            config,
            store,
            resumes,
            jwt,
            jobs,
            users,
        }
    }
}
