use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-oss-20b";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_REFERER: &str = "http://localhost:3000";
const DEFAULT_TITLE: &str = "Paragraph Summarizer";

// First non-empty one wins.
const API_KEY_VARS: [&str; 2] = ["OPENROUTER_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub host: String,
    pub port: u16,
    pub referer: String,
    pub title: String,
    pub upstream_timeout: Duration,
    pub translate_timeout: Duration,
    pub reasoning_fallback: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = API_KEY_VARS.iter().find_map(|key| get(*key));
        let model = get("MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = get("BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let port = match get("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid PORT: {raw}"))?,
            None => DEFAULT_PORT,
        };
        let upstream_timeout = parse_secs(get("UPSTREAM_TIMEOUT_SECS"), "UPSTREAM_TIMEOUT_SECS", 120)?;
        let translate_timeout = parse_secs(get("TRANSLATE_TIMEOUT_SECS"), "TRANSLATE_TIMEOUT_SECS", 60)?;
        let reasoning_fallback = match get("REASONING_FALLBACK") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("invalid REASONING_FALLBACK: {raw}"))?,
            None => true,
        };

        Ok(Self {
            api_key,
            model,
            base_url,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            referer: get("APP_REFERER").unwrap_or_else(|| DEFAULT_REFERER.to_string()),
            title: get("APP_TITLE").unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            upstream_timeout,
            translate_timeout,
            reasoning_fallback,
        })
    }

    pub fn api_key_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_secs(raw: Option<String>, name: &str, default: u64) -> Result<Duration> {
    let secs = match raw {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid {name}: {raw}"))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}
