//! Job listing models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{collect_messages, ModelError, ModelResult};
use crate::geo::Location;
use crate::user::UserId;
use crate::utils::slugify;

/// Days a listing stays open when no closing date is given.
pub const DEFAULT_OPEN_DAYS: i64 = 7;

/// Unique identifier for a job listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Declares a string-valued enum with its exact wire spellings.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL.iter().copied().find(|v| v.as_str() == s).ok_or(())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Industry a listing belongs to.
    Industry {
        Business => "Business",
        It => "IT",
        Banking => "Banking",
        Education => "Education",
        Telecom => "Telecom",
        Other => "Other",
    }
);

string_enum!(
    JobType {
        Permanent => "Permanent",
        Temporary => "Temporary",
        Internship => "Internship",
    }
);

string_enum!(
    /// Minimum education required.
    Education {
        Bachelors => "Bachelors",
        Masters => "Masters",
        Doctors => "Doctors",
        PhD => "PhD",
    }
);

string_enum!(
    /// Required experience band.
    Experience {
        NoExperience => "No experience",
        OneToTwoYears => "1 year - 2 years",
        TwoToFiveYears => "2 years - 5 years",
        FivePlusYears => "5 years+",
    }
);

/// A user who applied, with the stored résumé name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: UserId,
    pub resume: String,
}

/// A job listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "_id")]
    pub id: JobId,

    pub title: String,

    pub slug: String,

    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub address: String,

    /// Geocoded address; absent until the geocoder has resolved it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    pub company: String,

    pub industry: Vec<Industry>,

    pub job_type: JobType,

    pub min_education: Education,

    #[serde(default = "default_positions")]
    pub positions: u32,

    pub experience: Experience,

    pub salary: u64,

    pub posting_date: DateTime<Utc>,

    pub last_date: DateTime<Utc>,

    /// Owner (the publishing employer or admin).
    pub user: UserId,

    #[serde(default)]
    pub applicants_applied: Vec<Applicant>,

    #[serde(rename = "__v", default)]
    pub version: u64,
}

fn default_positions() -> u32 {
    1
}

impl Job {
    /// Validate a draft and build a new listing owned by `owner`.
    pub fn create(draft: JobDraft, owner: UserId, now: DateTime<Utc>) -> ModelResult<Self> {
        let fields = draft.validated()?;
        Ok(Self {
            id: JobId::new(),
            slug: slugify(&fields.title),
            title: fields.title,
            description: fields.description,
            email: fields.email,
            address: fields.address,
            location: None,
            company: fields.company,
            industry: fields.industry,
            job_type: fields.job_type,
            min_education: fields.min_education,
            positions: fields.positions,
            experience: fields.experience,
            salary: fields.salary,
            posting_date: fields.posting_date.unwrap_or(now),
            last_date: fields
                .last_date
                .unwrap_or(now + Duration::days(DEFAULT_OPEN_DAYS)),
            user: owner,
            applicants_applied: Vec::new(),
            version: 0,
        })
    }

    /// Merge a partial update over this listing and revalidate.
    ///
    /// Identity, ownership, applicants and location are kept; the slug
    /// follows the title.
    pub fn updated(&self, patch: JobDraft) -> ModelResult<Self> {
        let fields = self.draft().merge(patch).validated()?;
        Ok(Self {
            id: self.id.clone(),
            slug: slugify(&fields.title),
            title: fields.title,
            description: fields.description,
            email: fields.email,
            address: fields.address,
            location: self.location.clone(),
            company: fields.company,
            industry: fields.industry,
            job_type: fields.job_type,
            min_education: fields.min_education,
            positions: fields.positions,
            experience: fields.experience,
            salary: fields.salary,
            posting_date: fields.posting_date.unwrap_or(self.posting_date),
            last_date: fields.last_date.unwrap_or(self.last_date),
            user: self.user.clone(),
            applicants_applied: self.applicants_applied.clone(),
            version: self.version,
        })
    }

    /// Draft holding every editable field of this listing.
    pub fn draft(&self) -> JobDraft {
        JobDraft {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            email: self.email.clone(),
            address: Some(self.address.clone()),
            company: Some(self.company.clone()),
            industry: Some(self.industry.iter().map(|i| i.as_str().to_string()).collect()),
            job_type: Some(self.job_type.as_str().to_string()),
            min_education: Some(self.min_education.as_str().to_string()),
            positions: Some(self.positions),
            experience: Some(self.experience.as_str().to_string()),
            salary: Some(self.salary),
            posting_date: Some(self.posting_date),
            last_date: Some(self.last_date),
        }
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user == user
    }

    pub fn has_applicant(&self, user: &UserId) -> bool {
        self.applicants_applied.iter().any(|a| &a.id == user)
    }

    /// Whether applications are closed at `now`.
    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.last_date < now
    }

    /// JSON view without applicants or the version field.
    pub fn to_public_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.remove("applicantsApplied");
            map.remove("__v");
        }
        value
    }
}

/// Stored résumé name: applicant name with underscores, then the job id.
pub fn resume_file_name(applicant_name: &str, job: &JobId, extension: &str) -> String {
    let name: String = applicant_name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{}_{}{}", name, job, extension)
}

/// Editable job fields as submitted by a client; every field optional so
/// the same shape serves creation and partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    #[validate(
        required(message = "Please enter Job title"),
        length(max = 100, message = "Job title can not exceed 100 characters")
    )]
    pub title: Option<String>,

    #[validate(
        required(message = "Please enter Job description"),
        length(max = 1000, message = "Job description can not exceed 1000 characters")
    )]
    pub description: Option<String>,

    #[validate(email(message = "Please add a valid email address"))]
    pub email: Option<String>,

    #[validate(required(message = "Please enter an address"))]
    pub address: Option<String>,

    #[validate(required(message = "Please enter the company name"))]
    pub company: Option<String>,

    pub industry: Option<Vec<String>>,

    pub job_type: Option<String>,

    pub min_education: Option<String>,

    pub positions: Option<u32>,

    pub experience: Option<String>,

    #[validate(required(message = "Please enter the expected salary for this position"))]
    pub salary: Option<u64>,

    pub posting_date: Option<DateTime<Utc>>,

    pub last_date: Option<DateTime<Utc>>,
}

/// Draft after validation.
struct ValidJob {
    title: String,
    description: String,
    email: Option<String>,
    address: String,
    company: String,
    industry: Vec<Industry>,
    job_type: JobType,
    min_education: Education,
    positions: u32,
    experience: Experience,
    salary: u64,
    posting_date: Option<DateTime<Utc>>,
    last_date: Option<DateTime<Utc>>,
}

impl JobDraft {
    /// Fields present in `patch` replace ours.
    pub fn merge(self, patch: JobDraft) -> JobDraft {
        JobDraft {
            title: patch.title.or(self.title),
            description: patch.description.or(self.description),
            email: patch.email.or(self.email),
            address: patch.address.or(self.address),
            company: patch.company.or(self.company),
            industry: patch.industry.or(self.industry),
            job_type: patch.job_type.or(self.job_type),
            min_education: patch.min_education.or(self.min_education),
            positions: patch.positions.or(self.positions),
            experience: patch.experience.or(self.experience),
            salary: patch.salary.or(self.salary),
            posting_date: patch.posting_date.or(self.posting_date),
            last_date: patch.last_date.or(self.last_date),
        }
    }

    /// Check every rule, reporting all violations at once.
    pub fn check(&self) -> ModelResult<()> {
        self.clone().validated().map(|_| ())
    }

    fn validated(self) -> ModelResult<ValidJob> {
        let mut messages = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => collect_messages(&errors),
        };

        let industry = match &self.industry {
            None => {
                messages.push("Please enter the related industry".to_string());
                None
            }
            Some(values) => {
                let parsed: Option<Vec<Industry>> =
                    values.iter().map(|v| v.parse().ok()).collect();
                match parsed {
                    Some(industries) if !industries.is_empty() => Some(industries),
                    Some(_) => {
                        messages.push("Please enter the related industry".to_string());
                        None
                    }
                    None => {
                        messages.push("Please select correct options for industry".to_string());
                        None
                    }
                }
            }
        };
        let job_type = parse_choice::<JobType>(
            self.job_type.as_deref(),
            "Please enter the job type",
            "Please select correct option for job type",
            &mut messages,
        );
        let min_education = parse_choice::<Education>(
            self.min_education.as_deref(),
            "Please enter the minimum education required",
            "Please select correct option for Education",
            &mut messages,
        );
        let experience = parse_choice::<Experience>(
            self.experience.as_deref(),
            "Please enter the required experience",
            "Please select correct option for Experience",
            &mut messages,
        );

        match (
            self.title,
            self.description,
            self.address,
            self.company,
            self.salary,
            industry,
            job_type,
            min_education,
            experience,
        ) {
            (
                Some(title),
                Some(description),
                Some(address),
                Some(company),
                Some(salary),
                Some(industry),
                Some(job_type),
                Some(min_education),
                Some(experience),
            ) if messages.is_empty() => Ok(ValidJob {
                title: title.trim().to_string(),
                description,
                email: self.email,
                address,
                company,
                industry,
                job_type,
                min_education,
                positions: self.positions.unwrap_or_else(default_positions),
                experience,
                salary,
                posting_date: self.posting_date,
                last_date: self.last_date,
            }),
            _ => Err(ModelError::Validation(messages)),
        }
    }
}

fn parse_choice<T: FromStr>(
    value: Option<&str>,
    missing: &str,
    invalid: &str,
    messages: &mut Vec<String>,
) -> Option<T> {
    match value {
        None => {
            messages.push(missing.to_string());
            None
        }
        Some(text) => match text.parse() {
            Ok(choice) => Some(choice),
            Err(_) => {
                messages.push(invalid.to_string());
                None
            }
        },
    }
}
