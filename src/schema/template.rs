use serde_json::Value;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::naming::{index_name, FamilyPattern};

/// Index template of one document family.
///
/// `definition` is the template body as sent to the engine:
/// `{index_patterns, settings, mappings: {<family>: {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTemplate {
    pub name: String,
    pub prefix: String,   // Document family prefix, the suffix of tenant index names
    pub family: String,   // Mapping type name inside `mappings`
    pub definition: String,
}

impl IndexTemplate {
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        family: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        IndexTemplate {
            name: name.into(),
            prefix: prefix.into(),
            family: family.into(),
            definition: definition.into(),
        }
    }

    pub fn index_name(&self, user_id: u64) -> String {
        index_name(user_id, &self.prefix)
    }

    pub fn pattern(&self) -> Result<FamilyPattern> {
        FamilyPattern::new(&self.prefix)
    }

    pub fn body(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.definition)?)
    }

    /// The family's mapping, the part `put_mapping` installs on an index.
    pub fn mapping(&self) -> Result<Value> {
        let mut body = self.body()?;
        body.get_mut("mappings")
            .and_then(|m| m.get_mut(&self.family))
            .map(Value::take)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Parse,
                    format!("template {} has no mapping for {}", self.name, self.family),
                )
            })
    }
}

macro_rules! builtin {
    ($prefix:literal, $family:literal) => {
        IndexTemplate::new(
            $prefix,
            $prefix,
            $family,
            include_str!(concat!("../../templates/", $prefix, ".json")),
        )
    };
}

/// Templates compiled into the binary, one per document family.
pub fn builtin_templates() -> Vec<IndexTemplate> {
    vec![
        builtin!("ec2-reports", "ec2-report"),
        builtin!("rds-reports", "rds-report"),
        builtin!("es-reports", "es-report"),
        builtin!("elasticache-reports", "elasticache-report"),
        builtin!("lambda-reports", "lambda-report"),
    ]
}
