pub mod catalog;
pub mod config;
pub mod deviation;
pub mod errors;
pub mod fill;
pub mod generation;
pub mod response;
pub mod tolerance;

pub use catalog::{
    Catalog, CatalogError, CatalogHandle, CompanyProfile, DepartmentProfile, Template,
};
pub use deviation::{ComplianceLevel, DeviationResult, DeviationScorer};
pub use errors::{ApplicationError, DomainError, InterfaceError, TransportError};
pub use fill::{fill_prompt, fill_standard, referenced_fields, FieldValues, FilledResponse};
pub use generation::{
    transition, GenerationAction, GenerationContext, GenerationEvent, GenerationFlowError,
    GenerationState, TransitionOutcome,
};
pub use response::{AttemptOutcome, GenerationAttempt, ResponseResult, ResponseSource};
pub use tolerance::TolerancePreset;
