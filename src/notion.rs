use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{ClipError, Result};
use crate::models::{Credentials, JobRecord};

pub const NOTION_API_URL: &str = "https://api.notion.com/v1/pages";
pub const NOTION_VERSION: &str = "2022-06-28";

// Notion rejects text objects longer than this.
const RICH_TEXT_LIMIT: usize = 2000;

const UNTITLED_JOB: &str = "Untitled Job";
const MISSING_TEXT: &str = "N/A";
const MISSING_DESCRIPTION: &str = "No description extracted.";

/// Where finished job records go.
pub trait JobSubmitter: Send + Sync {
    /// Creates one entry for `record` and returns the service's response body.
    fn submit(&self, credentials: &Credentials, record: &JobRecord) -> Result<Value>;
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value }
}

/// Splits `content` into text objects Notion will accept.
fn text_objects(content: &str) -> Value {
    let chars: Vec<char> = content.chars().collect();
    let objects: Vec<Value> = chars
        .chunks(RICH_TEXT_LIMIT)
        .map(|chunk| json!({ "text": { "content": chunk.iter().collect::<String>() } }))
        .collect();
    Value::Array(objects)
}

/// Page-creation body for `record` inside database `database_id`.
///
/// The `Status` value must match an existing select option in the database;
/// Notion decides what happens when it does not.
pub fn page_payload(database_id: &str, record: &JobRecord) -> Value {
    json!({
        "parent": { "database_id": database_id },
        "properties": {
            "Job Title": { "title": text_objects(or_default(&record.job_title, UNTITLED_JOB)) },
            "Company": { "rich_text": text_objects(or_default(&record.company_name, MISSING_TEXT)) },
            "URL": { "url": record.url },
            "Location": { "rich_text": text_objects(or_default(&record.location, MISSING_TEXT)) },
            "Description": { "rich_text": text_objects(or_default(&record.description, MISSING_DESCRIPTION)) },
            "Status": { "select": { "name": record.status.as_str() } },
        },
    })
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    message: Option<String>,
}

/// Error for a non-success reply, preferring the message Notion reported.
pub fn submission_error(status: u16, body: &str) -> ClipError {
    let message = serde_json::from_str::<NotionErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("Notion API returned an error: {}", status));
    ClipError::Api(format!("Failed to add to Notion: {}", message))
}

pub fn validate(credentials: &Credentials, record: &JobRecord) -> Result<()> {
    if credentials.api_key.trim().is_empty() || credentials.database_id.trim().is_empty() {
        return Err(ClipError::Validation(
            "Notion API key and database ID are required.".to_string(),
        ));
    }
    if record.url.trim().is_empty() {
        return Err(ClipError::Validation("A job posting URL is required.".to_string()));
    }
    Ok(())
}

#[derive(Debug)]
pub struct NotionClient {
    client: Client,
    url: String,
}

impl NotionClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            url: NOTION_API_URL.to_string(),
        }
    }
}

impl Default for NotionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JobSubmitter for NotionClient {
    fn submit(&self, credentials: &Credentials, record: &JobRecord) -> Result<Value> {
        validate(credentials, record)?;

        let payload = page_payload(&credentials.database_id, record);
        debug!(payload = %payload, "Sending payload to Notion");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&credentials.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .map_err(|e| ClipError::Transport(format!("Failed to send request to Notion API: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ClipError::Transport(format!("Failed to read Notion API response: {}", e)))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "Notion API error");
            return Err(submission_error(status.as_u16(), &body));
        }

        let data: Value = serde_json::from_str(&body).map_err(|e| {
            ClipError::UnexpectedResponse(format!("Failed to parse Notion API response: {}", e))
        })?;
        info!(page_id = data["id"].as_str().unwrap_or("?"), "Created Notion page");
        Ok(data)
    }
}
