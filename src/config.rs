use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AdvisorError, AdvisorResult};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Itemized breakdown plus a health verdict and macro-nutrient split.
pub const DETAILED_INSTRUCTION: &str = "You are an expert nutritionist. Look at the food items in the image, \
work out the total calories and list every item with its calorie count using this format:\n\
\n\
1. Item 1 - number of calories\n\
2. Item 2 - number of calories\n\
----\n\
----\n\
Finish with the total, say whether the meal is healthy or not, and give the percentage split of \
carbohydrates, fats, fibre, sugar and the other important parts of a balanced diet.";

/// Itemized breakdown and total only.
pub const BASIC_INSTRUCTION: &str = "You are an expert nutritionist. Look at the food items in the image, \
work out the total calories and list every item with its calorie count using this format:\n\
\n\
1. Item 1 - number of calories\n\
2. Item 2 - number of calories\n\
----\n\
----\n\
Finish with the total calories of the whole meal.";

/// Sampling parameters sent with every generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 1024,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub generation: GenerationSettings,
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub instruction: String,
    pub staging_dir: PathBuf,
    pub static_dir: PathBuf,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> AdvisorResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup so tests don't have to touch the process env.
    pub fn from_lookup<F>(lookup: F) -> AdvisorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = var("GOOGLE_API_KEY").ok_or_else(|| {
            AdvisorError::configuration("GOOGLE_API_KEY must be set in the environment or .env file")
        })?;

        let timeout_secs = match var("REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_positive::<u64>("REQUEST_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(raw) => parse_positive::<usize>("MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let instruction = match var("PROMPT_FILE") {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    AdvisorError::configuration(format!("cannot read PROMPT_FILE {}: {}", path, e))
                })?;
                if text.trim().is_empty() {
                    return Err(AdvisorError::configuration(format!("PROMPT_FILE {} is empty", path)));
                }
                text
            }
            None => match var("PROMPT_VARIANT").as_deref() {
                None | Some("detailed") => DETAILED_INSTRUCTION.to_string(),
                Some("basic") => BASIC_INSTRUCTION.to_string(),
                Some(other) => {
                    return Err(AdvisorError::configuration(format!(
                        "PROMPT_VARIANT must be 'detailed' or 'basic', got '{}'",
                        other
                    )))
                }
            },
        };

        Ok(Self {
            gemini: GeminiConfig {
                api_key,
                model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                api_base: var("GEMINI_API_BASE")
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                timeout: Duration::from_secs(timeout_secs),
                generation: GenerationSettings::default(),
            },
            instruction,
            staging_dir: PathBuf::from(var("STAGING_DIR").unwrap_or_else(|| "temp".to_string())),
            static_dir: PathBuf::from(var("STATIC_DIR").unwrap_or_else(|| "static".to_string())),
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            max_upload_bytes,
        })
    }
}

fn parse_positive<T>(key: &str, raw: &str) -> AdvisorResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => Ok(v),
        _ => Err(AdvisorError::configuration(format!(
            "{} must be a positive integer, got '{}'",
            key, raw
        ))),
    }
}
