pub mod orchestrator;
pub mod registry;
pub mod store;

pub use orchestrator::{IndexMigration, MigrationOrchestrator, MigrationState, SweepReport};
pub use registry::{Discovery, IndexVersionRegistry};
pub use store::{FileVersionStore, IndexVersioning, MemoryVersionStore, VersionStore};
