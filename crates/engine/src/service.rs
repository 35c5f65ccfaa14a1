//! End-to-end orchestration of a response request.
//!
//! The service resolves the template against an immutable catalog snapshot,
//! fills both texts, and hands the generation loop to the engine. Lookup and
//! fill failures surface before any LLM traffic; once generation starts, the
//! filled standard text is always available as the fallback.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use stencil_core::catalog::{CatalogError, CatalogHandle};
use stencil_core::fill::{fill_prompt, fill_standard, referenced_fields};
use stencil_core::{
    CompanyProfile, DepartmentProfile, DeviationScorer, DomainError, FieldValues, ResponseResult,
    ResponseSource, Template, TolerancePreset,
};

use crate::cancel::CancelSignal;
use crate::engine::ResponseEngine;
use crate::prompt::build_completion_request;

/// One caller request. Field values are merged with the department profile
/// before filling; caller-supplied values always win.
#[derive(Clone, Debug)]
pub struct ResponseRequest {
    pub department: String,
    pub template_id: String,
    pub field_values: FieldValues,
    /// Overrides the department preset and the configured default.
    pub tolerance: Option<TolerancePreset>,
    pub cancel: CancelSignal,
    pub correlation_id: Uuid,
}

impl ResponseRequest {
    pub fn new(
        department: impl Into<String>,
        template_id: impl Into<String>,
        field_values: FieldValues,
    ) -> Self {
        Self {
            department: department.into(),
            template_id: template_id.into(),
            field_values,
            tolerance: None,
            cancel: CancelSignal::never(),
            correlation_id: Uuid::new_v4(),
        }
    }
}

pub struct ResponseService {
    catalog: CatalogHandle,
    engine: ResponseEngine,
    default_tolerance: TolerancePreset,
}

impl ResponseService {
    pub fn new(
        catalog: CatalogHandle,
        engine: ResponseEngine,
        default_tolerance: TolerancePreset,
    ) -> Self {
        Self { catalog, engine, default_tolerance }
    }

    /// Produces one response. The whole request runs against the catalog
    /// snapshot taken here; a concurrent reload does not affect it.
    pub async fn produce_response(
        &self,
        mut request: ResponseRequest,
    ) -> Result<ResponseResult, DomainError> {
        info!(
            event_name = "response.requested",
            correlation_id = %request.correlation_id,
            department = %request.department,
            template_id = %request.template_id,
            "response requested"
        );

        let catalog = self.catalog.snapshot();
        let profile = catalog.department(&request.department)?;
        let template = catalog.template(&request.department, &request.template_id)?;

        let tolerance = request
            .tolerance
            .or(profile.tolerance)
            .unwrap_or(self.default_tolerance);

        let field_values =
            merge_profile_fields(catalog.profile_fields(profile), template, &request.field_values);
        let standard = fill_standard(template, &field_values)?;
        let prompt = fill_prompt(template, &field_values)?;
        if !standard.unknown_fields.is_empty() {
            warn!(
                event_name = "response.unknown_fields",
                correlation_id = %request.correlation_id,
                template_id = %request.template_id,
                fields = ?standard.unknown_fields,
                "field values not referenced by the template"
            );
        }

        let scorer = DeviationScorer::for_preset(tolerance);
        let completion = build_completion_request(&prompt.text, &standard.text, tolerance);
        let run = self
            .engine
            .run(&scorer, &completion, &standard.text, &mut request.cancel)
            .await?;

        let attempt_count = run.attempts.len() as u32;
        let (text, source, deviation) = match run.accepted {
            Some(accepted) => (accepted.text, ResponseSource::AiGenerated, Some(accepted.deviation)),
            None => (standard.text, ResponseSource::Standard, None),
        };

        Ok(ResponseResult {
            department: request.department,
            template_id: request.template_id,
            text,
            source,
            deviation,
            attempts: run.attempts,
            attempt_count,
            unknown_fields: standard.unknown_fields,
            tolerance_limit: tolerance.limit(),
            generated_at: Utc::now(),
        })
    }

    pub fn company(&self) -> CompanyProfile {
        self.catalog.snapshot().company().clone()
    }

    pub fn department_profile(&self, key: &str) -> Result<DepartmentProfile, DomainError> {
        Ok(self.catalog.snapshot().department(key)?.clone())
    }

    pub fn list_departments(&self) -> Vec<(String, DepartmentProfile)> {
        self.catalog
            .snapshot()
            .departments()
            .map(|(key, profile)| (key.to_string(), profile.clone()))
            .collect()
    }

    pub fn list_templates(&self, department: Option<&str>) -> Result<Vec<Template>, DomainError> {
        let catalog = self.catalog.snapshot();
        match department {
            Some(key) => Ok(catalog.templates_for(key)?.into_iter().cloned().collect()),
            None => Ok(catalog.templates().cloned().collect()),
        }
    }

    /// Swaps in a freshly loaded catalog. Requests already holding the old
    /// snapshot finish against it.
    pub fn reload(&self) -> Result<(), CatalogError> {
        let fresh = self.catalog.reload()?;
        info!(
            event_name = "catalog.reloaded",
            templates = fresh.templates().count(),
            departments = fresh.departments().count(),
            "catalog reloaded"
        );
        Ok(())
    }
}

/// Injects the profile values the template actually references, without
/// shadowing anything the caller supplied.
fn merge_profile_fields(
    profile_fields: HashMap<String, String>,
    template: &Template,
    caller_values: &FieldValues,
) -> FieldValues {
    let mut referenced: HashSet<String> = referenced_fields(&template.standard).into_iter().collect();
    referenced.extend(referenced_fields(&template.prompt));

    let mut merged = caller_values.clone();
    for (key, value) in profile_fields {
        if referenced.contains(&key) {
            merged.entry(key).or_insert(value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use stencil_core::catalog::CatalogHandle;
    use stencil_core::{DomainError, ResponseSource, TolerancePreset, TransportError};

    use super::{ResponseRequest, ResponseService};
    use crate::cancel::cancel_pair;
    use crate::engine::ResponseEngine;
    use crate::llm::{CompletionRequest, LlmClient};

    const COMPANY_JSON: &str = r#"{
      "company": {
        "company_name": "Granite Shore Insurance",
        "company_type": "insurance",
        "company_address": "12 Harbor Way, Portsmouth, NH 03801",
        "company_website": "www.graniteshore.example",
        "company_phone": "1-800-555-0174",
        "company_email": "service@graniteshore.example"
      },
      "departments": {
        "claims": {
          "name": "Claims Department",
          "representative_name": "Jordan Reyes",
          "contact_phone": "1-800-555-0142",
          "contact_email": "claims@graniteshore.example",
          "hours": "Monday-Friday 8AM-6PM EST",
          "tolerance": "strict"
        }
      }
    }"#;

    const TEMPLATES_JSON: &str = r#"{
      "templates": [
        {
          "id": "claim_processing_update",
          "department": "claims",
          "category": "Claim processing update",
          "prompt": "Customer {customer_name} asked for an update on claim {claim_number}.",
          "standard": "Dear {customer_name}, claim {claim_number} is in review. Call {representative_name} at {contact_phone} with questions.",
          "required_fields": ["customer_name", "claim_number"]
        }
      ]
    }"#;

    const FILLED_STANDARD: &str = "Dear Alex Morgan, claim CLM-5521 is in review. Call Jordan \
Reyes at 1-800-555-0142 with questions.";

    struct ScriptedLlm {
        responses: Mutex<VecDeque<Result<String, TransportError>>>,
        calls: AtomicU32,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self { responses: Mutex::new(responses.into()), calls: AtomicU32::new(0) })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("scripted responses")
                .pop_front()
                .unwrap_or(Err(TransportError::Network { message: "script exhausted".to_string() }))
        }
    }

    fn service_with(llm: Arc<ScriptedLlm>, dir: &TempDir) -> ResponseService {
        let templates_path = dir.path().join("templates.json");
        let company_path = dir.path().join("company.json");
        fs::write(&templates_path, TEMPLATES_JSON).expect("write templates.json");
        fs::write(&company_path, COMPANY_JSON).expect("write company.json");

        let catalog = CatalogHandle::load(templates_path, company_path).expect("catalog loads");
        let engine = ResponseEngine::new(llm, 2, Duration::from_secs(5));
        ResponseService::new(catalog, engine, TolerancePreset::Minimal)
    }

    fn claim_request() -> ResponseRequest {
        ResponseRequest::new(
            "claims",
            "claim_processing_update",
            [
                ("customer_name".to_string(), "Alex Morgan".to_string()),
                ("claim_number".to_string(), "CLM-5521".to_string()),
            ]
            .into(),
        )
    }

    #[tokio::test]
    async fn ai_candidate_within_tolerance_is_served() {
        let dir = TempDir::new().expect("tempdir");
        let llm = ScriptedLlm::new(vec![Ok(FILLED_STANDARD.to_string())]);
        let service = service_with(llm.clone(), &dir);

        let result = service.produce_response(claim_request()).await.expect("response");

        assert_eq!(result.source, ResponseSource::AiGenerated);
        assert_eq!(result.text, FILLED_STANDARD);
        assert_eq!(result.attempt_count, 1);
        assert_eq!(result.deviation.expect("scored").deviation_percentage, 0.0);
        assert_eq!(result.tolerance_limit, 10.0, "department preset applies");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_serve_the_filled_standard() {
        let dir = TempDir::new().expect("tempdir");
        let off_template = "Completely unrelated words only.".to_string();
        let llm = ScriptedLlm::new(vec![Ok(off_template.clone()), Ok(off_template)]);
        let service = service_with(llm.clone(), &dir);

        let result = service.produce_response(claim_request()).await.expect("response");

        assert_eq!(result.source, ResponseSource::Standard);
        assert_eq!(result.text, FILLED_STANDARD);
        assert_eq!(result.attempt_count, 2);
        assert!(result.deviation.is_none());
        assert_eq!(result.attempts.len(), 2, "history survives the fallback");
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn transport_failures_never_escape_the_request() {
        let dir = TempDir::new().expect("tempdir");
        let llm = ScriptedLlm::new(vec![
            Err(TransportError::Network { message: "connection refused".to_string() }),
            Err(TransportError::Http { status: 503 }),
        ]);
        let service = service_with(llm.clone(), &dir);

        let result = service.produce_response(claim_request()).await.expect("degraded, not failed");

        assert_eq!(result.source, ResponseSource::Standard);
        assert_eq!(result.text, FILLED_STANDARD);
        assert_eq!(result.attempt_count, 2);
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn unknown_department_fails_before_generation() {
        let dir = TempDir::new().expect("tempdir");
        let llm = ScriptedLlm::new(vec![Ok(FILLED_STANDARD.to_string())]);
        let service = service_with(llm.clone(), &dir);

        let mut request = claim_request();
        request.department = "underwriting".to_string();
        let error = service.produce_response(request).await.expect_err("must fail");

        assert!(matches!(error, DomainError::DepartmentNotFound { .. }));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn missing_fields_fail_before_generation() {
        let dir = TempDir::new().expect("tempdir");
        let llm = ScriptedLlm::new(vec![Ok(FILLED_STANDARD.to_string())]);
        let service = service_with(llm.clone(), &dir);

        let mut request = claim_request();
        request.field_values.remove("claim_number");
        let error = service.produce_response(request).await.expect_err("must fail");

        match error {
            DomainError::MissingFields { fields, .. } => {
                assert_eq!(fields, vec!["claim_number".to_string()]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn request_tolerance_overrides_the_department_preset() {
        let dir = TempDir::new().expect("tempdir");
        let reworded = "Hi Alex Morgan, claim CLM-5521 will stay in review. Call Jordan Reyes \
at 1-800-555-0142 with questions.";
        let llm = ScriptedLlm::new(vec![Ok(reworded.to_string())]);
        let service = service_with(llm.clone(), &dir);

        let mut request = claim_request();
        request.tolerance = Some(TolerancePreset::Flexible);
        let result = service.produce_response(request).await.expect("response");

        assert_eq!(result.tolerance_limit, 70.0);
        assert_eq!(result.source, ResponseSource::AiGenerated, "12.8% passes under flexible");
        assert_eq!(result.text, reworded);
    }

    #[tokio::test]
    async fn profile_fields_fill_referenced_placeholders() {
        let dir = TempDir::new().expect("tempdir");
        let off_template = "Completely unrelated words only.".to_string();
        let llm = ScriptedLlm::new(vec![Ok(off_template.clone()), Ok(off_template)]);
        let service = service_with(llm, &dir);

        let result = service.produce_response(claim_request()).await.expect("response");

        assert!(result.text.contains("Jordan Reyes"));
        assert!(result.text.contains("1-800-555-0142"));
        assert!(result.unknown_fields.is_empty(), "injected values are referenced");
    }

    #[tokio::test]
    async fn caller_values_override_profile_fields() {
        let dir = TempDir::new().expect("tempdir");
        let off_template = "Completely unrelated words only.".to_string();
        let llm = ScriptedLlm::new(vec![Ok(off_template.clone()), Ok(off_template)]);
        let service = service_with(llm, &dir);

        let mut request = claim_request();
        request
            .field_values
            .insert("representative_name".to_string(), "Suki Tanaka".to_string());
        let result = service.produce_response(request).await.expect("response");

        assert!(result.text.contains("Suki Tanaka"));
        assert!(!result.text.contains("Jordan Reyes"));
    }

    #[tokio::test]
    async fn caller_extras_are_reported_not_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let llm = ScriptedLlm::new(vec![Ok(FILLED_STANDARD.to_string())]);
        let service = service_with(llm, &dir);

        let mut request = claim_request();
        request.field_values.insert("zip_code".to_string(), "03801".to_string());
        let result = service.produce_response(request).await.expect("response");

        assert_eq!(result.unknown_fields, vec!["zip_code".to_string()]);
        assert_eq!(result.source, ResponseSource::AiGenerated);
    }

    #[tokio::test]
    async fn pre_cancelled_request_falls_back_without_calls() {
        let dir = TempDir::new().expect("tempdir");
        let llm = ScriptedLlm::new(vec![Ok(FILLED_STANDARD.to_string())]);
        let service = service_with(llm.clone(), &dir);

        let (handle, signal) = cancel_pair();
        handle.cancel();
        let mut request = claim_request();
        request.cancel = signal;
        let result = service.produce_response(request).await.expect("response");

        assert_eq!(result.source, ResponseSource::Standard);
        assert_eq!(result.attempt_count, 0);
        assert!(result.attempts.is_empty());
        assert_eq!(llm.calls(), 0);
    }
}
