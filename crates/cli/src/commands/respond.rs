use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use stencil_core::catalog::CatalogHandle;
use stencil_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use stencil_core::{
    AttemptOutcome, DepartmentProfile, DomainError, FieldValues, ResponseResult, TolerancePreset,
};
use stencil_engine::engine::ResponseEngine;
use stencil_engine::openai::OpenAiClient;
use stencil_engine::service::{ResponseRequest, ResponseService};

use crate::commands::CommandResult;

#[derive(Debug)]
pub struct RespondArgs {
    pub department: String,
    pub template: String,
    pub fields: Vec<String>,
    pub tolerance: Option<TolerancePreset>,
    pub max_attempts: Option<u32>,
    pub json: bool,
}

pub fn run(args: RespondArgs) -> CommandResult {
    let field_values = match parse_field_values(&args.fields) {
        Ok(values) => values,
        Err(error) => {
            return CommandResult::failure("respond", "invalid_arguments", format!("{error:#}"), 4);
        }
    };

    // --max-attempts goes through the override layer so the usual bounds
    // checks apply to it.
    let overrides = ConfigOverrides { max_attempts: args.max_attempts, ..Default::default() };
    let options = LoadOptions { overrides, ..Default::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "respond",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let catalog = match CatalogHandle::load(
        &config.catalog.templates_path,
        &config.catalog.company_path,
    ) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("respond", "catalog", error.to_string(), 3),
    };

    let llm = match OpenAiClient::from_config(&config.llm) {
        Ok(client) => Arc::new(client),
        Err(error) => {
            return CommandResult::failure("respond", "config_validation", error.to_string(), 2);
        }
    };

    let engine = ResponseEngine::new(
        llm,
        config.generation.max_attempts,
        Duration::from_secs(config.llm.timeout_secs),
    );
    let service = ResponseService::new(catalog, engine, config.generation.tolerance);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "respond",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                5,
            );
        }
    };

    let mut request = ResponseRequest::new(args.department, args.template, field_values);
    request.tolerance = args.tolerance;

    match runtime.block_on(service.produce_response(request)) {
        Ok(result) => {
            let contact = service.department_profile(&result.department).ok();
            let output = if args.json {
                render_json(&result)
            } else {
                render_human(&result, contact.as_ref())
            };
            CommandResult { exit_code: 0, output }
        }
        Err(error) => {
            let (error_class, exit_code) = classify(&error);
            CommandResult::failure("respond", error_class, error.to_string(), exit_code)
        }
    }
}

fn parse_field_values(raw_fields: &[String]) -> anyhow::Result<FieldValues> {
    let mut values = FieldValues::new();
    for raw in raw_fields {
        let (name, value) = raw
            .split_once('=')
            .with_context(|| format!("field `{raw}` is not in NAME=VALUE form"))?;
        let name = name.trim();
        if name.is_empty() {
            bail!("field `{raw}` has an empty name");
        }
        if values.insert(name.to_string(), value.to_string()).is_some() {
            bail!("field `{name}` was given more than once");
        }
    }
    Ok(values)
}

fn classify(error: &DomainError) -> (&'static str, u8) {
    match error {
        DomainError::DepartmentNotFound { .. } | DomainError::TemplateNotFound { .. } => {
            ("not_found", 4)
        }
        DomainError::MissingFields { .. } => ("missing_fields", 4),
        DomainError::TemplateIntegrity { .. } => ("template_integrity", 4),
        DomainError::Generation(_) => ("generation_flow", 5),
    }
}

fn render_json(result: &ResponseResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"respond\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

fn render_human(result: &ResponseResult, contact: Option<&DepartmentProfile>) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "response for {}/{} ({}, {} attempt(s), tolerance {}%):",
        result.department,
        result.template_id,
        result.source.label(),
        result.attempt_count,
        result.tolerance_limit,
    ));
    lines.push(String::new());
    lines.push(result.text.clone());
    lines.push(String::new());

    match &result.deviation {
        Some(deviation) => {
            let compliance = deviation.compliance();
            lines.push(format!(
                "deviation: {}% (limit {}%) - {}: {}",
                deviation.deviation_percentage,
                deviation.tolerance_limit,
                compliance.label(),
                compliance.describe(),
            ));
        }
        None => lines.push("deviation: n/a (standard text served)".to_string()),
    }

    if !result.unknown_fields.is_empty() {
        lines.push(format!("unknown fields ignored: {}", result.unknown_fields.join(", ")));
    }

    if !result.attempts.is_empty() {
        lines.push("attempts:".to_string());
        for attempt in &result.attempts {
            match &attempt.outcome {
                AttemptOutcome::Scored { deviation, .. } => lines.push(format!(
                    "- attempt {}: {}% ({})",
                    attempt.index,
                    deviation.deviation_percentage,
                    if deviation.within_tolerance { "within tolerance" } else { "exceeded tolerance" },
                )),
                AttemptOutcome::Failed { error } => {
                    lines.push(format!("- attempt {}: failed: {error}", attempt.index));
                }
            }
        }
    }

    if let Some(profile) = contact {
        lines.push(format!(
            "contact: {} | {} | {} | {} | {}",
            profile.name,
            profile.representative_name,
            profile.contact_phone,
            profile.contact_email,
            profile.hours,
        ));
    }

    lines.join("\n")
}
