//! Business logic services.

pub mod geocoder;
pub mod jobs;
pub mod mailer;
pub mod users;

pub use geocoder::{GeocodedAddress, Geocoder, MapQuestGeocoder, StaticGeocoder};
pub use jobs::{JobService, ResumeUpload};
pub use mailer::{Email, HttpMailer, LogMailer, Mailer};
pub use users::UserService;
