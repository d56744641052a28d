use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ClipError;

pub const AI_EMPTY: &str = "N/A (AI Empty)";
pub const AI_FAILED: &str = "N/A (AI Failed)";
pub const JSON_PARSE_ERROR: &str = "N/A (JSON Parse Error)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Applied,
    Wishlist,
    Interviewing,
    Rejected,
    Offer,
    Closed,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Applied,
        JobStatus::Wishlist,
        JobStatus::Interviewing,
        JobStatus::Rejected,
        JobStatus::Offer,
        JobStatus::Closed,
        JobStatus::NotApplicable,
    ];

    /// Option name as it appears in the database's `Status` select.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Applied => "Applied",
            JobStatus::Wishlist => "Wishlist",
            JobStatus::Interviewing => "Interviewing",
            JobStatus::Rejected => "Rejected",
            JobStatus::Offer => "Offer",
            JobStatus::Closed => "Closed",
            JobStatus::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ClipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names: Vec<&str> = JobStatus::ALL.iter().map(|s| s.as_str()).collect();
                ClipError::Validation(format!(
                    "Unknown status '{}'. Available: {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

/// One job posting as it travels from scrape to submission.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub url: String,
    pub company_name: String,
    pub job_title: String,
    pub location: String,
    pub description: String,
    #[serde(default)]
    pub status: JobStatus,
}

impl JobRecord {
    /// Record handed back when structuring fails, so callers always get every field.
    pub fn failed(url: &str) -> Self {
        Self::filled(url, AI_FAILED)
    }

    pub fn filled(url: &str, sentinel: &str) -> Self {
        Self {
            url: url.to_string(),
            company_name: sentinel.to_string(),
            job_title: sentinel.to_string(),
            location: sentinel.to_string(),
            description: sentinel.to_string(),
            status: JobStatus::default(),
        }
    }
}

/// Corrections a user makes to a scraped record before it is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordEdits {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl RecordEdits {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Replaces each field that was edited; untouched fields keep the scraped value.
    pub fn apply(self, record: &mut JobRecord) {
        if let Some(company_name) = self.company_name {
            record.company_name = company_name;
        }
        if let Some(job_title) = self.job_title {
            record.job_title = job_title;
        }
        if let Some(location) = self.location {
            record.location = location;
        }
        if let Some(description) = self.description {
            record.description = description;
        }
    }
}

/// Database credentials supplied by the caller of the submit flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(rename = "notionApiKey")]
    pub api_key: String,
    #[serde(rename = "notionDatabaseId")]
    pub database_id: String,
}
