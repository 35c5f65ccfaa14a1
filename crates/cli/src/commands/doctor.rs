use std::collections::HashSet;

use serde::Serialize;
use stencil_core::catalog::Catalog;
use stencil_core::config::{AppConfig, LoadOptions};
use stencil_core::referenced_fields;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_catalog_integrity(&config));
            checks.push(check_llm_credentials(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "catalog_integrity",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "llm_credentials",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Loads the catalog and audits every placeholder against the fields that
/// can actually fill it: the template's required list plus the injected
/// profile keys. An uncovered placeholder makes every fill of that template
/// fail, so it surfaces here instead of at request time.
fn check_catalog_integrity(config: &AppConfig) -> DoctorCheck {
    let catalog =
        match Catalog::load(&config.catalog.templates_path, &config.catalog.company_path) {
            Ok(catalog) => catalog,
            Err(error) => {
                return DoctorCheck {
                    name: "catalog_integrity",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                };
            }
        };

    let problems = audit_placeholders(&catalog);
    if !problems.is_empty() {
        return DoctorCheck {
            name: "catalog_integrity",
            status: CheckStatus::Fail,
            details: format!("templates with unfillable placeholders: {}", problems.join("; ")),
        };
    }

    DoctorCheck {
        name: "catalog_integrity",
        status: CheckStatus::Pass,
        details: format!(
            "{} templates across {} departments; every placeholder is fillable",
            catalog.templates().count(),
            catalog.departments().count(),
        ),
    }
}

fn audit_placeholders(catalog: &Catalog) -> Vec<String> {
    let mut problems = Vec::new();
    for template in catalog.templates() {
        let Ok(profile) = catalog.department(&template.department) else {
            continue;
        };
        let covered: HashSet<String> = catalog
            .profile_fields(profile)
            .into_keys()
            .chain(template.required_fields.iter().cloned())
            .collect();
        let mut uncovered: Vec<String> = referenced_fields(&template.standard)
            .into_iter()
            .chain(referenced_fields(&template.prompt))
            .filter(|field| !covered.contains(field))
            .collect();
        uncovered.sort();
        uncovered.dedup();
        if !uncovered.is_empty() {
            problems.push(format!("{} ({})", template.id, uncovered.join(", ")));
        }
    }
    problems
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    if config.llm.api_key.is_some() {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: "llm.api_key is set".to_string(),
        }
    } else {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: "llm.api_key is not set; `respond` needs STENCIL_LLM_API_KEY or a config \
file entry"
                .to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
