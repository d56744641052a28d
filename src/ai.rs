use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::env;
use tracing::{debug, warn};

use crate::error::{ClipError, Result};
use crate::fallback::{infer_location, infer_title, needs_repair};
use crate::models::{JobRecord, JobStatus, AI_EMPTY, JSON_PARSE_ERROR};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Fields the model is asked for, in schema order.
pub const JOB_FIELDS: [&str; 4] = ["companyName", "jobTitle", "location", "description"];

// --- Provider trait ---

/// A completion endpoint that can be asked for JSON matching a flat string schema.
pub trait StructuredModel: Send + Sync {
    /// Returns the raw JSON text the model produced for `prompt`.
    fn complete_json(&self, prompt: &str, fields: &[&str]) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAI,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    let (provider, model_id, short_name) = match name {
        "gemini-2.0-flash" | "gemini" | "flash" => {
            (ProviderKind::Gemini, "gemini-2.0-flash", "gemini-2.0-flash")
        }
        "gemini-2.5-flash" => (ProviderKind::Gemini, "gemini-2.5-flash", "gemini-2.5-flash"),
        "gemini-2.5-pro" => (ProviderKind::Gemini, "gemini-2.5-pro", "gemini-2.5-pro"),
        "gpt-4o" => (ProviderKind::OpenAI, "gpt-4o", "gpt-4o"),
        "gpt-4o-mini" | "mini" => (ProviderKind::OpenAI, "gpt-4o-mini", "gpt-4o-mini"),
        _ => {
            return Err(ClipError::Config(format!(
                "Unknown model '{}'. Available: gemini-2.0-flash (default), gemini-2.5-flash, \
                 gemini-2.5-pro, gpt-4o, gpt-4o-mini",
                name
            )));
        }
    };

    Ok(ModelSpec {
        provider,
        model_id: model_id.to_string(),
        short_name: short_name.to_string(),
    })
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn StructuredModel>> {
    match spec.provider {
        ProviderKind::Gemini => Ok(Box::new(GeminiProvider::new(spec.model_id.clone())?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(spec.model_id.clone())?)),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

/// Error for a non-success reply, using the body's `error.message` when it has one.
fn api_error(provider: &str, status: u16, body: &str) -> ClipError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| "Unknown error".to_string());
    ClipError::Api(format!(
        "{} API request failed with status {}: {}",
        provider, status, message
    ))
}

fn read_reply(provider: &str, response: reqwest::blocking::Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| ClipError::Transport(format!("Failed to read {} API response: {}", provider, e)))?;

    if !status.is_success() {
        warn!(provider, status = status.as_u16(), "Model API call failed");
        return Err(api_error(provider, status.as_u16(), &body));
    }
    Ok(body)
}

// --- Gemini provider ---

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

fn gemini_request(prompt: &str, fields: &[&str]) -> GeminiRequest {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "STRING" })))
        .collect();

    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart {
                text: prompt.to_string(),
            }],
        }],
        generation_config: GeminiGenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: json!({
                "type": "OBJECT",
                "properties": properties,
                "propertyOrdering": fields,
            }),
        },
    }
}

fn gemini_text(body: &str) -> Result<String> {
    let unexpected = || ClipError::UnexpectedResponse("Gemini API returned unexpected or empty content.".to_string());

    let response: GeminiResponse = serde_json::from_str(body).map_err(|_| unexpected())?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(unexpected)
}

#[derive(Debug)]
pub struct GeminiProvider {
    api_key: String,
    model_id: String,
    base_url: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            ClipError::Config(
                "GEMINI_API_KEY environment variable not set. Set it with: export GEMINI_API_KEY=your-key-here"
                    .to_string(),
            )
        })?;
        Ok(Self::with_api_key(model_id, api_key))
    }

    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self {
            api_key,
            model_id,
            base_url: GEMINI_API_BASE.to_string(),
            client: Client::new(),
        }
    }
}

impl StructuredModel for GeminiProvider {
    fn complete_json(&self, prompt: &str, fields: &[&str]) -> Result<String> {
        let request = gemini_request(prompt, fields);
        let url = format!("{}/{}:generateContent", self.base_url, self.model_id);

        debug!(model = %self.model_id, prompt_chars = prompt.len(), "Calling Gemini API");
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                ClipError::Transport(format!("Failed to send request to Gemini API: {}", e.without_url()))
            })?;

        let body = read_reply("Gemini", response)?;
        gemini_text(&body)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    response_format: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

fn openai_request(model: &str, prompt: &str, fields: &[&str]) -> OpenAIRequest {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "string" })))
        .collect();

    OpenAIRequest {
        model: model.to_string(),
        messages: vec![OpenAIMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        response_format: json!({
            "type": "json_schema",
            "json_schema": {
                "name": "job_details",
                "strict": true,
                "schema": {
                    "type": "object",
                    "properties": properties,
                    "required": fields,
                    "additionalProperties": false,
                },
            },
        }),
    }
}

fn openai_text(body: &str) -> Result<String> {
    let unexpected = || ClipError::UnexpectedResponse("OpenAI API returned unexpected or empty content.".to_string());

    let response: OpenAIResponse = serde_json::from_str(body).map_err(|_| unexpected())?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(unexpected)
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    url: String,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ClipError::Config(
                "OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here"
                    .to_string(),
            )
        })?;
        Ok(Self {
            api_key,
            model_id,
            url: OPENAI_API_URL.to_string(),
            client: Client::new(),
        })
    }
}

impl StructuredModel for OpenAIProvider {
    fn complete_json(&self, prompt: &str, fields: &[&str]) -> Result<String> {
        let request = openai_request(&self.model_id, prompt, fields);

        debug!(model = %self.model_id, prompt_chars = prompt.len(), "Calling OpenAI API");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ClipError::Transport(format!("Failed to send request to OpenAI API: {}", e)))?;

        let body = read_reply("OpenAI", response)?;
        openai_text(&body)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Structured extraction ---

pub fn build_prompt(page_text: &str) -> String {
    format!(
        "Analyze the following job posting text and extract the:\n\
        1. Company Name\n\
        2. Job Title\n\
        3. Job Location (e.g., city, state, country, or \"Remote\")\n\
        4. A brief, concise description of the job (max 200 words).\n\n\
        If any information is not explicitly found, indicate \"N/A\".\n\n\
        Job Posting Text:\n\
        ---\n\
        {}\n\
        ---\n\n\
        Please provide the output as a JSON object with the following keys: \"companyName\", \"jobTitle\", \"location\", \"description\".\n\
        Example JSON output: {{\"companyName\": \"Google\", \"jobTitle\": \"Software Engineer\", \"location\": \"Mountain View, CA\", \"description\": \"Develop and maintain software.\"}}",
        page_text
    )
}

/// The four string fields of a parsed model reply; absent or null fields are empty.
#[derive(Debug, Default, PartialEq, Eq)]
struct ModelFields {
    company_name: String,
    job_title: String,
    location: String,
    description: String,
}

/// `Ok(None)` when the text is not JSON at all, which callers recover from.
fn parse_fields(json_text: &str) -> Result<Option<ModelFields>> {
    let Ok(value) = serde_json::from_str::<Value>(json_text) else {
        return Ok(None);
    };

    let Value::Object(map) = value else {
        return Err(ClipError::UnexpectedResponse(
            "Model returned JSON that is not an object".to_string(),
        ));
    };

    let field = |name: &str| -> Result<String> {
        match map.get(name) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ClipError::UnexpectedResponse(format!(
                "Model returned a non-string value for '{}'",
                name
            ))),
        }
    };

    Ok(Some(ModelFields {
        company_name: field("companyName")?,
        job_title: field("jobTitle")?,
        location: field("location")?,
        description: field("description")?,
    }))
}

fn or_default(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Asks the model to structure `page_text`, then repairs title and location from the text.
///
/// The returned record has an empty `url`; the caller owns it and the status.
pub fn extract_job_details(provider: &dyn StructuredModel, page_text: &str) -> Result<JobRecord> {
    let prompt = build_prompt(page_text);
    debug!(model = provider.model_name(), chars = page_text.chars().count(), "Requesting job details");

    let json_text = provider
        .complete_json(&prompt, &JOB_FIELDS)
        .map_err(|e| e.context("AI extraction failed"))?;

    let fields = match parse_fields(&json_text).map_err(|e| e.context("AI extraction failed"))? {
        Some(fields) => fields,
        None => {
            warn!("Failed to parse JSON from model response");
            return Ok(JobRecord::filled("", JSON_PARSE_ERROR));
        }
    };

    let mut record = JobRecord {
        url: String::new(),
        company_name: or_default(fields.company_name, AI_EMPTY),
        job_title: or_default(fields.job_title, AI_EMPTY),
        location: or_default(fields.location, AI_EMPTY),
        description: or_default(fields.description, AI_EMPTY),
        status: JobStatus::default(),
    };

    if needs_repair(&record.job_title) {
        record.job_title = infer_title(page_text, &record.job_title);
        debug!(title = %record.job_title, "Applied title fallback");
    }
    if needs_repair(&record.location) {
        record.location = infer_location(page_text, &record.location);
        debug!(location = %record.location, "Applied location fallback");
    }

    Ok(record)
}
