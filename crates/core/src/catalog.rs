//! Template catalog: the approved templates and the company/department
//! directory, loaded from JSON into an immutable snapshot.
//!
//! `CatalogHandle` owns the current snapshot behind a `RwLock<Arc<Catalog>>`.
//! Requests call [`CatalogHandle::snapshot`] once and keep that `Arc` for
//! their whole lifetime, so a concurrent [`CatalogHandle::reload`] never
//! changes the templates a request already resolved. A failed reload leaves
//! the previous snapshot in service.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{ApplicationError, DomainError};
use crate::tolerance::TolerancePreset;

/// An approved communication template.
///
/// `required_fields` is ordered and names the caller-supplied fields; the
/// template texts may additionally reference directory placeholders
/// (representative name, contact details, company block) that the service
/// layer injects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    pub id: String,
    pub department: String,
    pub category: String,
    pub prompt: String,
    pub standard: String,
    pub required_fields: Vec<String>,
}

/// Company-wide directory block shared by every department.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanyProfile {
    pub company_name: String,
    pub company_type: String,
    pub company_address: String,
    pub company_website: String,
    pub company_phone: String,
    pub company_email: String,
}

/// Per-department directory entry, optionally overriding the tolerance
/// preset for responses produced on its behalf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepartmentProfile {
    pub name: String,
    pub representative_name: String,
    pub contact_phone: String,
    pub contact_email: String,
    pub hours: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<TolerancePreset>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid catalog: {0}")]
    Validation(String),
}

impl From<CatalogError> for ApplicationError {
    fn from(error: CatalogError) -> Self {
        ApplicationError::Catalog(error.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplatesFile {
    templates: Vec<Template>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompanyFile {
    company: CompanyProfile,
    departments: BTreeMap<String, DepartmentProfile>,
}

/// Immutable, validated view of the catalog files.
#[derive(Debug)]
pub struct Catalog {
    company: CompanyProfile,
    departments: BTreeMap<String, DepartmentProfile>,
    templates: BTreeMap<String, Template>,
}

impl Catalog {
    /// Reads, parses, and validates both catalog files. Every defect is
    /// reported at load time so requests never meet a malformed catalog.
    pub fn load(templates_path: &Path, company_path: &Path) -> Result<Self, CatalogError> {
        let templates_file: TemplatesFile = read_json(templates_path)?;
        let company_file: CompanyFile = read_json(company_path)?;

        if company_file.departments.is_empty() {
            return Err(CatalogError::Validation(
                "company directory defines no departments".to_string(),
            ));
        }

        let mut templates = BTreeMap::new();
        for template in templates_file.templates {
            validate_template(&template, &company_file.departments)?;
            if templates.contains_key(&template.id) {
                return Err(CatalogError::Validation(format!(
                    "duplicate template id `{}`",
                    template.id
                )));
            }
            templates.insert(template.id.clone(), template);
        }

        Ok(Self {
            company: company_file.company,
            departments: company_file.departments,
            templates,
        })
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    pub fn department(&self, key: &str) -> Result<&DepartmentProfile, DomainError> {
        self.departments
            .get(key)
            .ok_or_else(|| DomainError::DepartmentNotFound {
                department: key.to_string(),
            })
    }

    pub fn departments(&self) -> impl Iterator<Item = (&str, &DepartmentProfile)> {
        self.departments
            .iter()
            .map(|(key, profile)| (key.as_str(), profile))
    }

    /// Looks up a template within a department. A template id that exists
    /// under a different department is reported as not found, not leaked.
    pub fn template(&self, department: &str, template_id: &str) -> Result<&Template, DomainError> {
        self.department(department)?;
        self.templates
            .get(template_id)
            .filter(|template| template.department == department)
            .ok_or_else(|| DomainError::TemplateNotFound {
                department: department.to_string(),
                template_id: template_id.to_string(),
            })
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn templates_for(&self, department: &str) -> Result<Vec<&Template>, DomainError> {
        self.department(department)?;
        Ok(self
            .templates
            .values()
            .filter(|template| template.department == department)
            .collect())
    }

    /// Placeholder values resolvable from the directory for one department:
    /// the department's own contact fields plus the company block.
    pub fn profile_fields(&self, profile: &DepartmentProfile) -> HashMap<String, String> {
        HashMap::from([
            ("department".to_string(), profile.name.clone()),
            (
                "representative_name".to_string(),
                profile.representative_name.clone(),
            ),
            ("contact_phone".to_string(), profile.contact_phone.clone()),
            ("contact_email".to_string(), profile.contact_email.clone()),
            ("hours".to_string(), profile.hours.clone()),
            ("company_name".to_string(), self.company.company_name.clone()),
            ("company_type".to_string(), self.company.company_type.clone()),
            (
                "company_address".to_string(),
                self.company.company_address.clone(),
            ),
            (
                "company_website".to_string(),
                self.company.company_website.clone(),
            ),
            (
                "company_phone".to_string(),
                self.company.company_phone.clone(),
            ),
            (
                "company_email".to_string(),
                self.company.company_email.clone(),
            ),
        ])
    }
}

/// Shared handle over the current catalog snapshot.
#[derive(Debug)]
pub struct CatalogHandle {
    templates_path: PathBuf,
    company_path: PathBuf,
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    pub fn load(
        templates_path: impl Into<PathBuf>,
        company_path: impl Into<PathBuf>,
    ) -> Result<Self, CatalogError> {
        let templates_path = templates_path.into();
        let company_path = company_path.into();
        let catalog = Catalog::load(&templates_path, &company_path)?;
        Ok(Self {
            templates_path,
            company_path,
            current: RwLock::new(Arc::new(catalog)),
        })
    }

    /// The current snapshot. Holders keep reading the same catalog even if a
    /// reload swaps in a newer one underneath.
    pub fn snapshot(&self) -> Arc<Catalog> {
        match self.current.read() {
            Ok(current) => Arc::clone(&current),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Rebuilds the snapshot from disk and swaps it in one step. On any load
    /// failure the handle keeps serving the previous snapshot.
    pub fn reload(&self) -> Result<Arc<Catalog>, CatalogError> {
        let fresh = Arc::new(Catalog::load(&self.templates_path, &self.company_path)?);
        match self.current.write() {
            Ok(mut current) => *current = Arc::clone(&fresh),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&fresh),
        }
        Ok(fresh)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CatalogError::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_template(
    template: &Template,
    departments: &BTreeMap<String, DepartmentProfile>,
) -> Result<(), CatalogError> {
    if template.id.trim().is_empty() {
        return Err(CatalogError::Validation(
            "template id must not be empty".to_string(),
        ));
    }
    if !departments.contains_key(&template.department) {
        return Err(CatalogError::Validation(format!(
            "template `{}` references unknown department `{}`",
            template.id, template.department
        )));
    }
    if template.standard.trim().is_empty() {
        return Err(CatalogError::Validation(format!(
            "template `{}` has an empty standard text",
            template.id
        )));
    }
    if template.prompt.trim().is_empty() {
        return Err(CatalogError::Validation(format!(
            "template `{}` has an empty prompt text",
            template.id
        )));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for field in &template.required_fields {
        if !well_formed_field_name(field) {
            return Err(CatalogError::Validation(format!(
                "template `{}` required field `{}` is not a valid placeholder name",
                template.id, field
            )));
        }
        if !seen.insert(field.as_str()) {
            return Err(CatalogError::Validation(format!(
                "template `{}` lists required field `{}` twice",
                template.id, field
            )));
        }
    }
    Ok(())
}

fn well_formed_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
