use std::collections::BTreeMap;

use stencil_core::catalog::Catalog;
use stencil_core::config::{AppConfig, LoadOptions};
use stencil_core::DepartmentProfile;

use crate::commands::CommandResult;

pub fn run(json: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "departments",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let catalog = match Catalog::load(&config.catalog.templates_path, &config.catalog.company_path)
    {
        Ok(catalog) => catalog,
        Err(error) => {
            return CommandResult::failure("departments", "catalog", error.to_string(), 3);
        }
    };

    let departments: BTreeMap<&str, &DepartmentProfile> = catalog.departments().collect();
    let output = if json { render_json(&departments) } else { render_human(&departments) };
    CommandResult { exit_code: 0, output }
}

fn render_json(departments: &BTreeMap<&str, &DepartmentProfile>) -> String {
    serde_json::to_string_pretty(departments).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"departments\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

fn render_human(departments: &BTreeMap<&str, &DepartmentProfile>) -> String {
    let mut lines = vec![format!("departments ({}):", departments.len())];
    for (key, profile) in departments {
        let tolerance = profile
            .tolerance
            .map(|preset| preset.label().to_string())
            .unwrap_or_else(|| "default".to_string());
        lines.push(format!(
            "- {key}: {} ({}, {}, {}; hours: {}; tolerance: {tolerance})",
            profile.name,
            profile.representative_name,
            profile.contact_phone,
            profile.contact_email,
            profile.hours,
        ));
    }
    lines.join("\n")
}
