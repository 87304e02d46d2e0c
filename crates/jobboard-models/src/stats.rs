//! Per-experience salary statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::job::Job;

/// Aggregate over the listings sharing one experience band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceStats {
    /// Upper-cased experience band.
    #[serde(rename = "_id")]
    pub experience: String,
    pub total_jobs: u64,
    pub avg_position: f64,
    pub avg_salary: f64,
    pub min_salary: u64,
    pub max_salary: u64,
}

/// Group listings by upper-cased experience, ordered by group name.
pub fn experience_stats<'a, I>(jobs: I) -> Vec<ExperienceStats>
where
    I: IntoIterator<Item = &'a Job>,
{
    let mut groups: BTreeMap<String, Vec<&Job>> = BTreeMap::new();
    for job in jobs {
        groups
            .entry(job.experience.as_str().to_uppercase())
            .or_default()
            .push(job);
    }

    groups
        .into_iter()
        .map(|(experience, jobs)| {
            let count = jobs.len() as f64;
            ExperienceStats {
                experience,
                total_jobs: jobs.len() as u64,
                avg_position: jobs.iter().map(|j| f64::from(j.positions)).sum::<f64>() / count,
                avg_salary: jobs.iter().map(|j| j.salary as f64).sum::<f64>() / count,
                min_salary: jobs.iter().map(|j| j.salary).min().unwrap_or_default(),
                max_salary: jobs.iter().map(|j| j.salary).max().unwrap_or_default(),
            }
        })
        .collect()
}
