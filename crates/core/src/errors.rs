use thiserror::Error;

use crate::generation::GenerationFlowError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("department `{department}` is not in the company directory")]
    DepartmentNotFound { department: String },
    #[error("template `{template_id}` is not in the catalog for department `{department}`")]
    TemplateNotFound { department: String, template_id: String },
    #[error("template `{template_id}` is missing required fields: {fields:?}")]
    MissingFields { template_id: String, fields: Vec<String> },
    #[error("template `{template_id}` references undeclared placeholders: {placeholders:?}")]
    TemplateIntegrity { template_id: String, placeholders: Vec<String> },
    #[error(transparent)]
    Generation(#[from] GenerationFlowError),
}

/// Failure of a single outbound generation call. Recoverable inside the
/// attempt loop only; `produce_response` never surfaces it to callers.
#[derive(Clone, Debug, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportError {
    #[error("generation request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("generation service returned HTTP {status}")]
    Http { status: u16 },
    #[error("generation service unreachable: {message}")]
    Network { message: String },
    #[error("generation service returned an unusable payload: {message}")]
    MalformedResponse { message: String },
    #[error("generation service reported an error: {message}")]
    Api { message: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("catalog failure: {0}")]
    Catalog(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            // Integrity failures are catalog defects, not caller mistakes.
            ApplicationError::Domain(DomainError::TemplateIntegrity { template_id, .. }) => {
                Self::Internal {
                    message: format!("template `{template_id}` failed its integrity check"),
                    correlation_id: "unassigned".to_owned(),
                }
            }
            ApplicationError::Domain(_) => Self::BadRequest {
                message: "request validation failed".to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Catalog(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn missing_fields_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::MissingFields {
            template_id: "claim_denial_notification".to_owned(),
            fields: vec!["customer_name".to_owned(), "claim_number".to_owned()],
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
    }

    #[test]
    fn bad_request_has_user_safe_message() {
        let interface = ApplicationError::from(DomainError::DepartmentNotFound {
            department: "mailroom".to_owned(),
        })
        .into_interface("req-2");

        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn template_integrity_maps_to_internal() {
        let interface = ApplicationError::from(DomainError::TemplateIntegrity {
            template_id: "billing_inquiry_response".to_owned(),
            placeholders: vec!["account_numbr".to_owned()],
        })
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn catalog_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Catalog("catalog file unreadable".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("llm.api_key is required".to_owned())
            .into_interface("req-5");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
    }

    #[test]
    fn missing_fields_message_lists_every_field() {
        let error = DomainError::MissingFields {
            template_id: "new_customer_welcome".to_owned(),
            fields: vec!["customer_name".to_owned(), "policy_number".to_owned()],
        };

        let rendered = error.to_string();
        assert!(rendered.contains("customer_name"));
        assert!(rendered.contains("policy_number"));
    }
}
