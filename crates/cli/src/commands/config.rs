use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use stencil_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "catalog.templates_path",
        &config.catalog.templates_path.display().to_string(),
        source("catalog.templates_path", &["STENCIL_CATALOG_TEMPLATES_PATH"]),
    ));
    lines.push(render_line(
        "catalog.company_path",
        &config.catalog.company_path.display().to_string(),
        source("catalog.company_path", &["STENCIL_CATALOG_COMPANY_PATH"]),
    ));

    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", &["STENCIL_LLM_PROVIDER"]),
    ));
    lines.push(render_line(
        "llm.model",
        &config.llm.model,
        source("llm.model", &["STENCIL_LLM_MODEL"]),
    ));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        source("llm.base_url", &["STENCIL_LLM_BASE_URL"]),
    ));

    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_key(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "llm.api_key",
        &api_key,
        source("llm.api_key", &["STENCIL_LLM_API_KEY"]),
    ));

    lines.push(render_line(
        "llm.max_tokens",
        &config.llm.max_tokens.to_string(),
        source("llm.max_tokens", &["STENCIL_LLM_MAX_TOKENS"]),
    ));
    lines.push(render_line(
        "llm.temperature",
        &config.llm.temperature.to_string(),
        source("llm.temperature", &["STENCIL_LLM_TEMPERATURE"]),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", &["STENCIL_LLM_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "generation.tolerance",
        config.generation.tolerance.label(),
        source("generation.tolerance", &["STENCIL_GENERATION_TOLERANCE"]),
    ));
    lines.push(render_line(
        "generation.max_attempts",
        &config.generation.max_attempts.to_string(),
        source("generation.max_attempts", &["STENCIL_GENERATION_MAX_ATTEMPTS"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["STENCIL_LOGGING_LEVEL", "STENCIL_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["STENCIL_LOGGING_FORMAT", "STENCIL_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("stencil.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/stencil.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
