use stencil_core::catalog::Catalog;
use stencil_core::config::{AppConfig, LoadOptions};
use stencil_core::Template;

use crate::commands::CommandResult;

pub fn run(department: Option<&str>, json: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "templates",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let catalog = match Catalog::load(&config.catalog.templates_path, &config.catalog.company_path)
    {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("templates", "catalog", error.to_string(), 3),
    };

    let templates: Vec<&Template> = match department {
        Some(key) => match catalog.templates_for(key) {
            Ok(templates) => templates,
            Err(error) => {
                return CommandResult::failure("templates", "not_found", error.to_string(), 4);
            }
        },
        None => catalog.templates().collect(),
    };

    let output = if json { render_json(&templates) } else { render_human(&templates) };
    CommandResult { exit_code: 0, output }
}

fn render_json(templates: &[&Template]) -> String {
    serde_json::to_string_pretty(templates).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"templates\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

fn render_human(templates: &[&Template]) -> String {
    let mut lines = vec![format!("templates ({}):", templates.len())];
    for template in templates {
        lines.push(format!(
            "- {}/{}: {} (required: {})",
            template.department,
            template.id,
            template.category,
            template.required_fields.join(", "),
        ));
    }
    lines.join("\n")
}
