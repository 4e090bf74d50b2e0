use crate::models::DailyReport;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SUMMARY_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-2.5-flash";

pub const NO_REPORTS_MESSAGE: &str = "No reports available to summarize.";
pub const EMPTY_RESPONSE_MESSAGE: &str = "无法生成总结，请稍后再试。";
pub const UNAVAILABLE_MESSAGE: &str = "AI 服务暂时不可用，请稍后再试。";

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(#{1,6})\s+(.+?)\s*$").expect("valid heading regex"));
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+\.)\s+(.+?)\s*$").expect("valid bullet regex"));

const INSTRUCTIONS: &str = "Please generate a structured daily summary in Markdown format (use Chinese for content).
Strictly follow this structure:

## 📊 团队日报总结 (Team Summary)
[Brief summary of overall progress. Mention the general team morale/mood.]

## ⚠️ 风险与阻碍 (Key Risks)
[List any blockers or delays mentioned. If none, say \"None detected\".]

## 💡 改进建议 (Recommendations)
[Actionable advice based on the reports]

## 🏷️ 关键词云 (Keywords Cloud)
[Comma separated list of 5-10 technical or project keywords]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SummaryClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for SummaryClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SUMMARY_BASE_URL.to_string(),
            model: DEFAULT_SUMMARY_MODEL.to_string(),
            api_key: None,
        }
    }
}

/// Client for the hosted text-generation model. Every failure is folded into a readable
/// message, so callers always get text to show.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    client: reqwest::Client,
    config: SummaryClientConfig,
}

impl SummaryClient {
    pub fn new(config: SummaryClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn generate_team_summary(&self, reports: &[DailyReport]) -> String {
        if reports.is_empty() {
            return NO_REPORTS_MESSAGE.to_string();
        }

        let prompt = build_prompt(reports);
        match self.generate(&prompt).await {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => EMPTY_RESPONSE_MESSAGE.to_string(),
            Err(error) => {
                tracing::error!(model = %self.config.model, error = %error, "summary generation failed");
                UNAVAILABLE_MESSAGE.to_string()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<Option<String>, String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| "no API key configured".to_string())?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("summary request failed: {}", e.without_url()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("summary API error {}: {}", status, text));
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| format!("failed to parse summary response: {}", e.without_url()))?;
        Ok(parsed.text())
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>();
        Some(text)
    }
}

pub fn report_digest(report: &DailyReport) -> String {
    let group = if report.group_name.is_empty() {
        "General"
    } else {
        report.group_name.as_str()
    };
    let tasks = match &report.work_items {
        Some(items) => items
            .iter()
            .map(|item| format!("{} ({}%)", item.text, item.progress))
            .collect::<Vec<_>>()
            .join(", "),
        None => report.today_work.clone(),
    };
    format!(
        "User: {} (Group: {}, Mood: {})\nTask: {}\nIssues: {}\nPlan: {}",
        report.user_name,
        group,
        report.mood.as_str(),
        tasks,
        report.problems,
        report.tomorrow_plan
    )
}

pub fn build_prompt(reports: &[DailyReport]) -> String {
    let digest = reports.iter().map(report_digest).collect::<Vec<_>>().join("\n---\n");
    format!(
        "You are an expert operations manager. Here are the daily reports from the team:\n\n{}\n\n{}",
        digest, INSTRUCTIONS
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "kebab-case")]
pub enum SummaryLine {
    Heading(String),
    Bullet(String),
    Text(String),
    Blank,
}

/// Line classification for display. Only layout is recovered; nothing in the text is interpreted.
pub fn render_lines(summary: &str) -> Vec<SummaryLine> {
    summary
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                SummaryLine::Blank
            } else if let Some(caps) = HEADING_RE.captures(line) {
                SummaryLine::Heading(caps[2].to_string())
            } else if let Some(caps) = BULLET_RE.captures(line) {
                SummaryLine::Bullet(caps[1].to_string())
            } else {
                SummaryLine::Text(line.trim().to_string())
            }
        })
        .collect()
}
