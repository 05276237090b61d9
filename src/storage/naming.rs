use regex::Regex;
use crate::core::error::{Error, ErrorKind, Result};

/// Physical index for one tenant and one document family.
pub fn index_name(user_id: u64, prefix: &str) -> String {
    format!("{:06}-{}", user_id, prefix)
}

/// Name of the index a migration to `version` creates for `index`.
pub fn versioned_index_name(index: &str, version: u32) -> String {
    format!("{}-v{}", index, version)
}

/// Matches tenant index names of one family, e.g. `000042-ec2-reports`.
/// Migrated physical names (`000042-ec2-reports-v5`) are not matched.
#[derive(Debug, Clone)]
pub struct FamilyPattern {
    prefix: String,
    regex: Regex,
}

impl FamilyPattern {
    pub fn new(prefix: &str) -> Result<Self> {
        let regex = Regex::new(&format!(r"^(\d{{6,}})-{}$", regex::escape(prefix)))
            .map_err(|e| Error::new(ErrorKind::InvalidArgument, format!("index prefix {}: {}", prefix, e)))?;
        Ok(FamilyPattern {
            prefix: prefix.to_string(),
            regex,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Tenant user id encoded in `name`, when `name` belongs to this family.
    pub fn parse(&self, name: &str) -> Option<u64> {
        self.regex
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn matches(&self, name: &str) -> bool {
        self.parse(name).is_some()
    }
}

/// Elasticsearch-style glob with `*` wildcards, as used by index template patterns.
pub fn glob_matches(pattern: &str, name: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == name;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !name.starts_with(first) || name.len() < first.len() + last.len() || !name.ends_with(last) {
        return false;
    }

    let mut rest = &name[first.len()..name.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}
