use std::collections::HashMap;
use serde::Deserialize;
use tracing::warn;
use crate::core::error::{Error, ErrorKind, Result};
use crate::schema::template::{builtin_templates, IndexTemplate};

#[derive(Deserialize)]
struct TemplateBody {
    mappings: HashMap<String, FamilyMapping>,
}

#[derive(Deserialize)]
struct FamilyMapping {
    #[serde(rename = "_meta")]
    meta: Option<MappingMeta>,
}

#[derive(Deserialize)]
struct MappingMeta {
    version: u32,
}

/// Schema version embedded in `template` at `mappings.<family>._meta.version`.
pub fn extract_version(template: &IndexTemplate) -> Result<u32> {
    let body: TemplateBody = serde_json::from_str(&template.definition).map_err(|e| {
        Error::new(
            ErrorKind::Parse,
            format!("template {} is not valid: {}", template.name, e),
        )
    })?;

    body.mappings
        .get(&template.family)
        .and_then(|m| m.meta.as_ref())
        .map(|meta| meta.version)
        .ok_or_else(|| {
            Error::new(
                ErrorKind::Parse,
                format!("template {} carries no version for {}", template.name, template.family),
            )
        })
}

/// A template together with its extracted version. `version` is `None` when
/// extraction failed; such templates are left out of migration.
#[derive(Debug, Clone)]
pub struct VersionedTemplate {
    pub template: IndexTemplate,
    pub version: Option<u32>,
}

/// All templates known to this process.
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    entries: Vec<VersionedTemplate>,
}

impl TemplateCatalog {
    pub fn compile(templates: Vec<IndexTemplate>) -> Self {
        let entries = templates
            .into_iter()
            .map(|template| {
                let version = match extract_version(&template) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        warn!(template = %template.name, error = %e, "skipping template for migration");
                        None
                    }
                };
                VersionedTemplate { template, version }
            })
            .collect();
        TemplateCatalog { entries }
    }

    pub fn builtin() -> Self {
        Self::compile(builtin_templates())
    }

    pub fn get(&self, name: &str) -> Option<&VersionedTemplate> {
        self.entries.iter().find(|e| e.template.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionedTemplate> {
        self.entries.iter()
    }

    /// Templates with a known version.
    pub fn versioned(&self) -> impl Iterator<Item = (&IndexTemplate, u32)> {
        self.entries
            .iter()
            .filter_map(|e| e.version.map(|v| (&e.template, v)))
    }

    /// Template whose family owns the tenant index `name`.
    pub fn template_for_index(&self, name: &str) -> Option<&VersionedTemplate> {
        self.entries
            .iter()
            .find(|e| e.template.pattern().is_ok_and(|p| p.matches(name)))
    }
}
