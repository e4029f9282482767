use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ww_api_types::JobDraft;

mod parse;

pub use parse::{GeneratedJob, parse_generated_job, strip_markdown};

pub const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const DEFAULT_USER_PROMPT: &str = "Create a job post for a smart contract developer";
const DEFAULT_CATEGORY: &str = "Smart Contract Development";
const DEFAULT_SKILLS: &str = "Solidity, React";

/// A chat-style text generation provider.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Groq's OpenAI-compatible chat completions endpoint.
///
/// Reads `GROQ_API_KEY` and `GROQ_MODEL` from the environment when explicit
/// values are not given.
pub struct GroqClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    http: reqwest::Client,
}

impl Default for GroqClient {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl GroqClient {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Self {
        Self {
            endpoint: GROQ_CHAT_URL.to_owned(),
            api_key: api_key
                .or_else(|| std::env::var("GROQ_API_KEY").ok())
                .filter(|key| !key.trim().is_empty()),
            model: model
                .or_else(|| std::env::var("GROQ_MODEL").ok())
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            http: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl TextGenerator for GroqClient {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GROQ_API_KEY is not configured"))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("groq chat transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("groq chat HTTP {status}: {text}");
        }

        let parsed: ChatResponse = response.json().await.context("groq chat parse")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!("groq returned {} characters", content.len());
        Ok(content)
    }
}

/// System prompt describing the listing template, seeded with the current draft.
pub fn job_system_prompt(draft: &JobDraft, profile_skills: &[String]) -> String {
    let category = if draft.category.trim().is_empty() {
        DEFAULT_CATEGORY
    } else {
        draft.category.trim()
    };
    let skills = if profile_skills.is_empty() {
        DEFAULT_SKILLS.to_owned()
    } else {
        profile_skills.join(", ")
    };

    format!(
        "You write job listings for a Web3 freelance marketplace from a short request.\n\
         Answer using exactly these labelled fields:\n\
         - Title: a short professional title, e.g. [Seniority] [Role] for [Project Type]\n\
         - Description: two to four engaging sentences; mention the company if one is given\n\
         - Company: the given company name, otherwise \"Our Web3 Company\"\n\
         - Category: the best fitting category; use \"{category}\" when unsure\n\
         - Budget: ${min}\u{2013}${max} USDC\n\
         - Duration: a realistic duration such as 1\u{2013}3 months\n\
         - Responsibilities: four or five bullet points\n\
         - Requirements: four or five bullet points\n\
         - Location: Remote unless the request says otherwise\n\
         - Immediate Start: No unless the request says otherwise\n\
         - Skills: one comma-separated line of five to seven skills, including {skills}\n\
         Keep the tone professional and specific.",
        min = draft.budget_min,
        max = draft.budget_max,
    )
}

/// Asks the generator for a listing and merges whatever could be parsed into
/// a copy of `draft`. Returns the merged draft and the raw generated text.
pub async fn generate_job(
    generator: &dyn TextGenerator,
    draft: &JobDraft,
    profile_skills: &[String],
    prompt: Option<&str>,
) -> Result<(JobDraft, String)> {
    let user_prompt = prompt
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
        .unwrap_or(DEFAULT_USER_PROMPT);
    let text = generator
        .generate(&job_system_prompt(draft, profile_skills), user_prompt)
        .await?;

    let mut merged = draft.clone();
    let parsed = parse_generated_job(&text);
    parsed.apply_to(&mut merged);
    info!(
        "generated listing (title parsed: {}, skills parsed: {})",
        parsed.title.is_some(),
        parsed.skills.is_some()
    );
    Ok((merged, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedGenerator {
        reply: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_owned(), user_prompt.to_owned()));
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn system_prompt_uses_draft_and_defaults() {
        let prompt = job_system_prompt(&JobDraft::default(), &[]);
        assert!(prompt.contains("\"Smart Contract Development\""));
        assert!(prompt.contains("$500\u{2013}$2000 USDC"));
        assert!(prompt.contains("including Solidity, React"));

        let draft = JobDraft {
            category: "Design".to_owned(),
            ..JobDraft::default()
        };
        let prompt = job_system_prompt(&draft, &["Rust".to_owned(), "Go".to_owned()]);
        assert!(prompt.contains("\"Design\""));
        assert!(prompt.contains("including Rust, Go"));
    }

    #[tokio::test]
    async fn generation_merges_into_a_copy() {
        let generator = CannedGenerator {
            reply: "Title: Rust Engineer\nDuration: 6 weeks".to_owned(),
            prompts: Mutex::new(Vec::new()),
        };
        let draft = JobDraft {
            description: "keep me".to_owned(),
            ..JobDraft::default()
        };

        let (merged, raw) = generate_job(&generator, &draft, &[], Some("  ")).await.unwrap();
        assert_eq!(merged.title, "Rust Engineer");
        assert_eq!(merged.duration, "6 weeks");
        assert_eq!(merged.description, "keep me");
        assert_eq!(raw, "Title: Rust Engineer\nDuration: 6 weeks");
        assert_eq!(generator.prompts.lock().unwrap()[0].1, DEFAULT_USER_PROMPT);
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let client = GroqClient {
            api_key: None,
            ..GroqClient::new(None, Some("test-model".to_owned()))
        };
        assert!(!client.is_configured());
        let err = client.generate("system", "user").await.unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }
}
