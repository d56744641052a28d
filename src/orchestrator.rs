use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::ai::{self, StructuredModel};
use crate::error::{ClipError, Result};
use crate::models::{Credentials, JobRecord, JobStatus};
use crate::notion::JobSubmitter;
use crate::page::{ExtractionScript, PageAccess};

pub const SCRAPE_SUCCESS: &str = "Job details scraped successfully!";
pub const SUBMIT_SUCCESS: &str = "Job posting successfully added to Notion!";

/// Messages a caller can send, tagged by `action` like the popup's messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    ScrapeJobDetails { job_url: String },
    #[serde(rename_all = "camelCase")]
    AddJobToNotion {
        notion_api_key: String,
        notion_database_id: String,
        job_url: String,
        #[serde(default)]
        company_name: String,
        #[serde(default)]
        job_title: String,
        #[serde(default)]
        location: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        status: Option<JobStatus>,
    },
}

impl Request {
    pub fn add_job(credentials: &Credentials, record: &JobRecord) -> Self {
        Request::AddJobToNotion {
            notion_api_key: credentials.api_key.clone(),
            notion_database_id: credentials.database_id.clone(),
            job_url: record.url.clone(),
            company_name: record.company_name.clone(),
            job_title: record.job_title.clone(),
            location: record.location.clone(),
            description: record.description.clone(),
            status: Some(record.status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JobRecord>,
    #[serde(default, rename = "notionResult", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Answers one request, exactly once.
#[derive(Debug)]
pub struct Responder(oneshot::Sender<Response>);

impl Responder {
    pub fn pair() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    pub fn respond(self, response: Response) {
        if self.0.send(response).is_err() {
            debug!("Caller stopped waiting for the response");
        }
    }
}

/// Request/response pairing between a caller and whatever runs the flows.
pub trait MessageChannel {
    /// Returns `true` when `responder` will be answered after this call returns.
    fn on_message(&self, request: Request, responder: Responder) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Idle,
    Extracting,
    Structuring,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitting,
    Done,
    Failed,
}

struct Flow<S> {
    name: &'static str,
    state: S,
}

impl<S: Debug + Copy> Flow<S> {
    fn start(name: &'static str, state: S) -> Self {
        Self { name, state }
    }

    fn advance(&mut self, next: S) {
        debug!(flow = self.name, from = ?self.state, to = ?next, "Flow transition");
        self.state = next;
    }
}

/// Runs the scrape and submit flows against injected host capabilities.
pub struct Orchestrator {
    page: Option<Arc<dyn PageAccess>>,
    model: Option<Arc<dyn StructuredModel>>,
    submitter: Arc<dyn JobSubmitter>,
    script: ExtractionScript,
}

impl Orchestrator {
    pub fn new(submitter: Arc<dyn JobSubmitter>) -> Self {
        Self {
            page: None,
            model: None,
            submitter,
            script: ExtractionScript::default(),
        }
    }

    pub fn with_page_access(mut self, page: Arc<dyn PageAccess>) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn StructuredModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::ScrapeJobDetails { job_url } => self.scrape_job_details(&job_url),
            Request::AddJobToNotion {
                notion_api_key,
                notion_database_id,
                job_url,
                company_name,
                job_title,
                location,
                description,
                status,
            } => {
                let credentials = Credentials {
                    api_key: notion_api_key,
                    database_id: notion_database_id,
                };
                let record = JobRecord {
                    url: job_url,
                    company_name,
                    job_title,
                    location,
                    description,
                    status: status.unwrap_or(JobStatus::NotApplicable),
                };
                self.add_job(&credentials, &record)
            }
        }
    }

    /// Always returns a full record; on failure every field is the failure sentinel.
    pub fn scrape_job_details(&self, job_url: &str) -> Response {
        let mut flow = Flow::start("scrape", ScrapeState::Idle);

        match self.run_scrape(job_url, &mut flow) {
            Ok(record) => {
                flow.advance(ScrapeState::Done);
                Response {
                    success: true,
                    message: SCRAPE_SUCCESS.to_string(),
                    data: Some(record),
                    result: None,
                }
            }
            Err(e) => {
                flow.advance(ScrapeState::Failed);
                error!("Scrape flow failed: {}", e);
                Response {
                    success: false,
                    message: e.to_string(),
                    data: Some(JobRecord::failed(job_url)),
                    result: None,
                }
            }
        }
    }

    fn run_scrape(&self, job_url: &str, flow: &mut Flow<ScrapeState>) -> Result<JobRecord> {
        let page_access = self
            .page
            .as_ref()
            .ok_or_else(|| ClipError::Environment("Page access is not available.".to_string()))?;
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ClipError::Environment("No language model is configured.".to_string()))?;

        info!("Initiating scraping process for URL: {}", job_url);
        flow.advance(ScrapeState::Extracting);
        let page = page_access.active_page(job_url)?;
        debug!(page = %page.url, "Got active page");
        let content = page_access.execute(&page, &self.script)?;
        if content.is_empty() {
            return Err(ClipError::Extraction(
                "Extracted page content is empty. This might indicate issues with the job page's content or loading."
                    .to_string(),
            ));
        }
        debug!(chars = content.chars().count(), "Page content extracted");

        flow.advance(ScrapeState::Structuring);
        let mut record = ai::extract_job_details(model.as_ref(), &content)?;
        record.url = job_url.to_string();
        Ok(record)
    }

    pub fn add_job(&self, credentials: &Credentials, record: &JobRecord) -> Response {
        let mut flow = Flow::start("submit", SubmitState::Idle);
        flow.advance(SubmitState::Submitting);

        match self.submitter.submit(credentials, record) {
            Ok(result) => {
                flow.advance(SubmitState::Done);
                Response {
                    success: true,
                    message: SUBMIT_SUCCESS.to_string(),
                    data: None,
                    result: Some(result),
                }
            }
            Err(e) => {
                flow.advance(SubmitState::Failed);
                error!("Submit flow failed: {}", e);
                Response {
                    success: false,
                    message: e.to_string(),
                    data: None,
                    result: None,
                }
            }
        }
    }
}

impl MessageChannel for Arc<Orchestrator> {
    fn on_message(&self, request: Request, responder: Responder) -> bool {
        let orchestrator = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let response = orchestrator.handle(request);
            responder.respond(response);
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AI_FAILED, JSON_PARSE_ERROR};
    use crate::notion::{page_payload, submission_error, validate};
    use crate::page::StaticPageAccess;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedModel(String);

    impl StructuredModel for CannedModel {
        fn complete_json(&self, _prompt: &str, _fields: &[&str]) -> Result<String> {
            Ok(self.0.clone())
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    struct DownModel;

    impl StructuredModel for DownModel {
        fn complete_json(&self, _prompt: &str, _fields: &[&str]) -> Result<String> {
            Err(ClipError::Api(
                "Gemini API request failed with status 503: The model is overloaded.".to_string(),
            ))
        }

        fn model_name(&self) -> &str {
            "down"
        }
    }

    struct NoTab;

    impl PageAccess for NoTab {
        fn active_page(&self, _job_url: &str) -> Result<crate::page::ActivePage> {
            Err(ClipError::Environment("Could not get active tab information.".to_string()))
        }
    }

    /// Records submitted payloads; answers like Notion would for a given status.
    struct FakeNotion {
        status: u16,
        body: String,
        sent: Mutex<Vec<Value>>,
    }

    impl FakeNotion {
        fn answering(status: u16, body: Value) -> Self {
            Self {
                status,
                body: body.to_string(),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl JobSubmitter for FakeNotion {
        fn submit(&self, credentials: &Credentials, record: &JobRecord) -> Result<Value> {
            validate(credentials, record)?;
            self.sent
                .lock()
                .unwrap()
                .push(page_payload(&credentials.database_id, record));
            if (200..300).contains(&self.status) {
                Ok(serde_json::from_str(&self.body).unwrap())
            } else {
                Err(submission_error(self.status, &self.body))
            }
        }
    }

    const POSTING: &str = "<html><head><title>Rust Engineer at Acme | Careers</title></head><body>\
        <div class=\"job-description\">Acme is hiring a Rust Engineer to build storage engines. \
        You will own the write path, compaction and recovery. We offer remote work across Europe \
        and a team that cares about correctness, testing and shipping steadily.</div></body></html>";

    fn orchestrator(model: impl StructuredModel + 'static, page: impl PageAccess + 'static) -> Orchestrator {
        Orchestrator::new(Arc::new(FakeNotion::answering(200, json!({"id": "page-1"}))))
            .with_page_access(Arc::new(page))
            .with_model(Arc::new(model))
    }

    fn credentials() -> Credentials {
        Credentials {
            api_key: "secret_abc".to_string(),
            database_id: "db123".to_string(),
        }
    }

    #[test]
    fn test_scrape_success() {
        let model = CannedModel(
            r#"{"companyName":"Acme","jobTitle":"Rust Engineer","location":"Remote","description":"Storage engines."}"#
                .to_string(),
        );
        let orch = orchestrator(model, StaticPageAccess::new("https://jobs.example.com/7", POSTING));
        let response = orch.scrape_job_details("https://jobs.example.com/7");

        assert!(response.success);
        assert_eq!(response.message, SCRAPE_SUCCESS);
        let data = response.data.unwrap();
        assert_eq!(data.url, "https://jobs.example.com/7");
        assert_eq!(data.company_name, "Acme");
        assert_eq!(data.job_title, "Rust Engineer");
    }

    #[test]
    fn test_scrape_no_active_tab_fails_with_sentinels() {
        let orch = orchestrator(CannedModel("{}".to_string()), NoTab);
        let response = orch.scrape_job_details("https://jobs.example.com/7");

        assert!(!response.success);
        assert_eq!(response.message, "Could not get active tab information.");
        let data = response.data.unwrap();
        assert_eq!(data.job_title, AI_FAILED);
        assert_eq!(data.company_name, AI_FAILED);
    }

    #[test]
    fn test_scrape_empty_page_fails() {
        let orch = orchestrator(
            CannedModel("{}".to_string()),
            StaticPageAccess::new("u", "<html><body></body></html>"),
        );
        let response = orch.scrape_job_details("u");
        assert!(!response.success);
        assert!(response.message.starts_with("Extracted page content is empty."));
        assert_eq!(response.data.unwrap().location, AI_FAILED);
    }

    #[test]
    fn test_scrape_model_failure_is_reported() {
        let orch = orchestrator(DownModel, StaticPageAccess::new("u", POSTING));
        let response = orch.scrape_job_details("u");
        assert!(!response.success);
        assert_eq!(
            response.message,
            "AI extraction failed: Gemini API request failed with status 503: The model is overloaded."
        );
        assert_eq!(response.data.unwrap().description, AI_FAILED);
    }

    #[test]
    fn test_scrape_malformed_model_json_still_succeeds() {
        let orch = orchestrator(CannedModel("not json".to_string()), StaticPageAccess::new("u", POSTING));
        let response = orch.scrape_job_details("u");
        assert!(response.success);
        let data = response.data.unwrap();
        assert_eq!(data.job_title, JSON_PARSE_ERROR);
        assert_eq!(data.url, "u");
    }

    #[test]
    fn test_scrape_without_model_is_environment_failure() {
        let orch = Orchestrator::new(Arc::new(FakeNotion::answering(200, json!({}))))
            .with_page_access(Arc::new(StaticPageAccess::new("u", POSTING)));
        let response = orch.scrape_job_details("u");
        assert!(!response.success);
        assert_eq!(response.message, "No language model is configured.");
    }

    #[test]
    fn test_add_job_empty_title_sent_as_untitled() {
        let notion = Arc::new(FakeNotion::answering(200, json!({"id": "page-9", "object": "page"})));
        let orch = Orchestrator::new(notion.clone());
        let record = JobRecord {
            url: "https://jobs.example.com/9".to_string(),
            job_title: String::new(),
            ..JobRecord::default()
        };

        let response = orch.add_job(&credentials(), &record);
        assert!(response.success);
        assert_eq!(response.message, SUBMIT_SUCCESS);
        assert_eq!(response.result.unwrap()["id"], "page-9");

        let sent = notion.sent.lock().unwrap();
        assert_eq!(sent[0]["properties"]["Job Title"]["title"][0]["text"]["content"], "Untitled Job");
    }

    #[test]
    fn test_add_job_surfaces_notion_message() {
        let notion = FakeNotion::answering(
            400,
            json!({"object": "error", "message": "Offer is not a valid select option."}),
        );
        let orch = Orchestrator::new(Arc::new(notion));
        let record = JobRecord {
            url: "https://jobs.example.com/9".to_string(),
            status: JobStatus::Offer,
            ..JobRecord::default()
        };

        let response = orch.add_job(&credentials(), &record);
        assert!(!response.success);
        assert!(response.message.contains("Offer is not a valid select option."));
        assert!(response.result.is_none());
    }

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_value(json!({
            "action": "addJobToNotion",
            "notionApiKey": "k",
            "notionDatabaseId": "d",
            "jobUrl": "https://jobs.example.com/1",
            "companyName": "Acme",
            "jobTitle": "SRE",
            "location": "Remote",
            "description": "Keep it up.",
            "status": "Interviewing"
        }))
        .unwrap();
        assert!(matches!(
            request,
            Request::AddJobToNotion { status: Some(JobStatus::Interviewing), .. }
        ));

        let scrape = serde_json::to_value(Request::ScrapeJobDetails { job_url: "u".into() }).unwrap();
        assert_eq!(scrape, json!({"action": "scrapeJobDetails", "jobUrl": "u"}));
    }

    #[test]
    fn test_handle_add_without_status_sends_na() {
        let notion = Arc::new(FakeNotion::answering(200, json!({"id": "p"})));
        let orch = Orchestrator::new(notion.clone());
        let request: Request = serde_json::from_value(json!({
            "action": "addJobToNotion",
            "notionApiKey": "k",
            "notionDatabaseId": "d",
            "jobUrl": "https://jobs.example.com/1"
        }))
        .unwrap();

        assert!(orch.handle(request).success);
        let sent = notion.sent.lock().unwrap();
        assert_eq!(sent[0]["properties"]["Status"]["select"]["name"], "N/A");
    }

    #[test]
    fn test_response_serializes_result_as_notion_result() {
        let response = Response {
            success: true,
            message: SUBMIT_SUCCESS.to_string(),
            data: None,
            result: Some(json!({"id": "p"})),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["notionResult"]["id"], "p");
        assert!(value.get("data").is_none());
    }

    #[tokio::test]
    async fn test_message_channel_responds_once_asynchronously() {
        let model = CannedModel(
            r#"{"companyName":"Acme","jobTitle":"","location":"","description":"d"}"#.to_string(),
        );
        let orch = Arc::new(orchestrator(model, StaticPageAccess::new("u", POSTING)));

        let (responder, reply) = Responder::pair();
        let will_respond = orch.on_message(
            Request::ScrapeJobDetails { job_url: "https://jobs.example.com/7".into() },
            responder,
        );
        assert!(will_respond);

        let response = reply.await.unwrap();
        assert!(response.success);
        let data = response.data.unwrap();
        // The posting text has no <h1> or <title> left after extraction.
        assert_eq!(data.job_title, "N/A (AI Empty)");
        assert_eq!(data.location, "Remote");
    }
}
