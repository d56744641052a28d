use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ClipError, Result};
use crate::text::{normalize_whitespace, truncate_with_marker};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

// Never part of the rendered text.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

// Rendered on their own line, so their text must not run into a neighbour's.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Describes how text is pulled out of a job page.
///
/// This is plain data so a host can run it wherever the page lives; `run`
/// is the reference evaluation over a parsed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionScript {
    /// Tried in order; only the first element matching each selector is read.
    pub selectors: Vec<String>,
    /// Selectors trusted enough to stop the scan when they yield a long text.
    pub high_confidence: Vec<String>,
    pub early_stop_len: usize,
    /// Below this, the whole body text is used instead.
    pub min_content_len: usize,
    pub max_len: usize,
    pub truncation_marker: String,
}

impl Default for ExtractionScript {
    fn default() -> Self {
        let selectors = [
            ".app-title",
            ".job-title",
            "h1",
            "h2",
            ".company-name",
            ".location",
            ".job-description",
            "#job-description",
            "div[class*=\"description\"]",
            "div[itemprop=\"description\"]",
            "article",
            "main",
            ".section-content",
            ".app-body",
            ".posting-page",
            ".gh-content",
            ".lever-auto-content",
        ];
        let high_confidence = [
            ".job-description",
            "#job-description",
            "div[itemprop=\"description\"]",
            "article",
            "main",
            ".gh-content",
            ".lever-auto-content",
        ];

        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            high_confidence: high_confidence.iter().map(|s| s.to_string()).collect(),
            early_stop_len: 200,
            min_content_len: 100,
            max_len: 4000,
            truncation_marker: "... [Content truncated]".to_string(),
        }
    }
}

impl ExtractionScript {
    pub fn run(&self, document: &Html) -> String {
        let mut content = String::new();
        let mut content_len = 0;

        for raw in &self.selectors {
            let selector = match Selector::parse(raw) {
                Ok(selector) => selector,
                Err(e) => {
                    warn!(selector = %raw, error = %e, "Skipping invalid selector");
                    continue;
                }
            };

            let Some(element) = document.select(&selector).next() else {
                continue;
            };

            let text = normalize_whitespace(&visible_text(element));
            let len = text.chars().count();
            debug!(selector = %raw, len, "Attempted selector");

            let confident = self.high_confidence.iter().any(|s| s == raw);
            if len > content_len {
                content = text;
                content_len = len;
            }
            if confident && len > self.early_stop_len {
                debug!(selector = %raw, "Stopping early on high-confidence selector");
                break;
            }
        }

        if content_len < self.min_content_len {
            warn!("Selector content too short, falling back to body text");
            let body = normalize_whitespace(&body_text(document));
            if body.chars().count() > content_len {
                content = body;
            }
        }

        let content = normalize_whitespace(&content);
        let total = content.chars().count();
        if total > self.max_len {
            warn!(total, max = self.max_len, "Page content truncated");
        }
        truncate_with_marker(&content, self.max_len, &self.truncation_marker)
    }
}

/// Text of an element roughly as a browser would render it.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = ElementRef::wrap(child) {
            let name = el.value().name();
            if HIDDEN_TAGS.contains(&name) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_text(el, out);
            if block {
                out.push(' ');
            }
        }
    }
}

fn body_text(document: &Html) -> String {
    let Ok(body) = Selector::parse("body") else {
        return String::new();
    };
    match document.select(&body).next() {
        Some(element) => visible_text(element),
        None => visible_text(document.root_element()),
    }
}

/// The page a scrape flow reads from.
#[derive(Debug, Clone)]
pub struct ActivePage {
    pub url: String,
    pub html: String,
}

/// Host capability for reaching the job page and running a script against it.
pub trait PageAccess: Send + Sync {
    fn active_page(&self, job_url: &str) -> Result<ActivePage>;

    fn execute(&self, page: &ActivePage, script: &ExtractionScript) -> Result<String> {
        let document = Html::parse_document(&page.html);
        Ok(script.run(&document))
    }
}

/// Treats the job URL itself as the active tab and downloads it.
#[derive(Debug)]
pub struct HttpPageAccess {
    client: Client,
}

impl HttpPageAccess {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClipError::Environment(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl PageAccess for HttpPageAccess {
    fn active_page(&self, job_url: &str) -> Result<ActivePage> {
        if job_url.trim().is_empty() {
            return Err(ClipError::Environment(
                "Could not get active tab information.".to_string(),
            ));
        }

        info!("Fetching job page: {}", job_url);
        let response = self
            .client
            .get(job_url)
            .send()
            .map_err(|e| ClipError::Transport(format!("Failed to fetch job page: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClipError::Api(format!(
                "Job page request failed with status {}",
                status.as_u16()
            )));
        }

        let html = response
            .text()
            .map_err(|e| ClipError::Transport(format!("Failed to read job page body: {e}")))?;
        Ok(ActivePage {
            url: job_url.to_string(),
            html,
        })
    }
}

/// A page already held in memory, e.g. saved from a browser.
#[derive(Debug, Clone)]
pub struct StaticPageAccess {
    page: ActivePage,
}

impl StaticPageAccess {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            page: ActivePage {
                url: url.into(),
                html: html.into(),
            },
        }
    }
}

impl PageAccess for StaticPageAccess {
    fn active_page(&self, _job_url: &str) -> Result<ActivePage> {
        Ok(self.page.clone())
    }
}
