use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::github::client::{IssueTracker, MAX_PER_PAGE};
use crate::llm::chat::{LanguageModel, Message};
use crate::models::{Issue, IssueComment, IssueState, IssueSummary};

/// Comments attached to an analyzed issue.
pub const RECENT_COMMENTS: usize = 5;

/// Issue body characters included in the analysis prompt.
const BODY_PROMPT_CHARS: usize = 1000;

const ANALYSIS_TEMPERATURE: f32 = 0.3;

const EMPTY_BODY: &str = "No description provided";

/// Fetches, analyzes and searches issues of one tracker.
pub struct IssueService {
    tracker: Arc<dyn IssueTracker>,
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl IssueService {
    pub fn new(tracker: Arc<dyn IssueTracker>, model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            tracker,
            model,
            timeout,
        }
    }

    /// Fetch issue `number` with its most recent comments and ask the model
    /// for a triage analysis.
    ///
    /// A failing model call does not fail the request: the summary comes back
    /// with `ai_analysis` unset and the reason in `analysis_error`.
    pub async fn analyze_issue(&self, repo_name: &str, number: u64) -> Result<IssueSummary> {
        let issue = self.tracker.get_issue(repo_name, number).await?;
        let comments = self.recent_comments(repo_name, &issue).await?;

        let prompt = analysis_prompt(&issue);
        let messages = [Message::user(prompt)];
        let call = self.model.complete(&messages, ANALYSIS_TEMPERATURE);

        let (ai_analysis, analysis_error) = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => (Some(text), None),
            Ok(Err(e)) => {
                tracing::warn!("Analysis of {repo_name}#{number} failed: {e:#}");
                (None, Some(format!("{e:#}")))
            }
            Err(_) => {
                tracing::warn!("Analysis of {repo_name}#{number} timed out");
                (
                    None,
                    Some(format!("model call timed out after {}s", self.timeout.as_secs())),
                )
            }
        };

        Ok(IssueSummary {
            issue,
            comments,
            ai_analysis,
            analysis_error,
        })
    }

    /// The last [`RECENT_COMMENTS`] comments in chronological order.
    ///
    /// Comments are listed oldest first, so only the final page (and the one
    /// before it when the final page is short) is requested.
    async fn recent_comments(&self, repo_name: &str, issue: &Issue) -> Result<Vec<IssueComment>> {
        let total = issue.comments_count as usize;
        if total == 0 {
            return Ok(Vec::new());
        }

        let last_page = total.div_ceil(MAX_PER_PAGE);
        let mut comments = self
            .tracker
            .list_comments(repo_name, issue.number, last_page, MAX_PER_PAGE)
            .await?;
        if comments.len() < RECENT_COMMENTS && last_page > 1 {
            let mut previous = self
                .tracker
                .list_comments(repo_name, issue.number, last_page - 1, MAX_PER_PAGE)
                .await?;
            previous.append(&mut comments);
            comments = previous;
        }

        let skip = comments.len().saturating_sub(RECENT_COMMENTS);
        Ok(comments.split_off(skip))
    }

    /// List issues matching `state` and every label in `labels`
    /// (comma-separated), keeping those whose title or body contains any of
    /// the whitespace-separated `keywords` (case-insensitive).
    ///
    /// Stops requesting pages once `max_results` (clamped to 1..=100) issues
    /// are collected or the tracker returns a short page.
    pub async fn search_issues(
        &self,
        repo_name: &str,
        state: IssueState,
        labels: &str,
        keywords: &str,
        max_results: usize,
    ) -> Result<Vec<Issue>> {
        let max_results = max_results.clamp(1, 100);
        let label_list = parse_labels(labels);
        let keyword_list: Vec<String> = keywords
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let mut results = Vec::new();
        let mut page = 1;
        loop {
            let batch = self
                .tracker
                .list_issues_page(repo_name, state, &label_list, page, MAX_PER_PAGE)
                .await?;
            let short_page = batch.len() < MAX_PER_PAGE;

            for issue in batch {
                if results.len() >= max_results {
                    break;
                }
                if matches_keywords(&issue, &keyword_list) {
                    results.push(issue);
                }
            }

            if results.len() >= max_results || short_page {
                break;
            }
            page += 1;
        }

        tracing::info!(
            "Issue search in {repo_name} returned {} results after {page} page(s)",
            results.len()
        );
        Ok(results)
    }
}

fn analysis_prompt(issue: &Issue) -> String {
    let body = issue
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(EMPTY_BODY);
    let body: String = body.chars().take(BODY_PROMPT_CHARS).collect();
    let labels = if issue.labels.is_empty() {
        "None".to_string()
    } else {
        issue.labels.join(", ")
    };

    format!(
        "Analyze this GitHub issue and provide:\n\
         1. A brief summary of the problem\n\
         2. Possible root causes\n\
         3. Suggested solutions or next steps\n\
         4. Priority level (High/Medium/Low)\n\n\
         Issue Title: {}\n\
         Issue Body: {body}\n\
         Labels: {labels}\n\
         State: {}",
        issue.title, issue.state
    )
}

fn parse_labels(labels: &str) -> Vec<String> {
    labels
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// No keywords matches everything.
fn matches_keywords(issue: &Issue, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = format!("{} {}", issue.title, issue.body.as_deref().unwrap_or("")).to_lowercase();
    keywords.iter().any(|kw| text.contains(kw.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn issue(title: &str, body: Option<&str>) -> Issue {
        Issue {
            number: 1,
            title: title.to_string(),
            state: "open".to_string(),
            body: body.map(str::to_string),
            labels: Vec::new(),
            comments_count: 0,
            url: "https://github.com/o/r/issues/1".to_string(),
            user: "octocat".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_labels_trims_and_drops_empty() {
        assert_eq!(parse_labels(" bug , help wanted,,"), vec!["bug", "help wanted"]);
        assert!(parse_labels("").is_empty());
    }

    #[test]
    fn test_keywords_match_title_or_body_case_insensitive() {
        let kws = vec!["crash".to_string(), "panic".to_string()];
        assert!(matches_keywords(&issue("App CRASHES on boot", None), &kws));
        assert!(matches_keywords(&issue("Boot", Some("thread main PANICKED")), &kws));
        assert!(!matches_keywords(&issue("Docs typo", Some("fix spelling")), &kws));
        assert!(matches_keywords(&issue("anything", None), &[]));
    }

    #[test]
    fn test_analysis_prompt_sections() {
        let mut i = issue("Crash", Some(&"b".repeat(1500)));
        i.labels = vec!["bug".to_string(), "p1".to_string()];
        let prompt = analysis_prompt(&i);
        assert!(prompt.starts_with("Analyze this GitHub issue and provide:\n1. A brief summary"));
        assert!(prompt.contains("4. Priority level (High/Medium/Low)"));
        assert!(prompt.contains("Issue Title: Crash\n"));
        assert!(prompt.contains(&format!("Issue Body: {}\n", "b".repeat(1000))));
        assert!(!prompt.contains(&"b".repeat(1001)));
        assert!(prompt.contains("Labels: bug, p1\n"));
        assert!(prompt.ends_with("State: open"));
    }

    #[test]
    fn test_analysis_prompt_placeholders() {
        let prompt = analysis_prompt(&issue("Empty", None));
        assert!(prompt.contains("Issue Body: No description provided\n"));
        assert!(prompt.contains("Labels: None\n"));
    }
}
