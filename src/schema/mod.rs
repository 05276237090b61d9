pub mod template;
pub mod version;

pub use template::{builtin_templates, IndexTemplate};
pub use version::{extract_version, TemplateCatalog, VersionedTemplate};
