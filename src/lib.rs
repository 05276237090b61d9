pub mod core;
pub mod storage;
pub mod schema;
pub mod writer;
pub mod reader;
pub mod parallel;
pub mod access;
pub mod migration;

pub use crate::core::config::Config;
pub use crate::core::database::Database;
pub use crate::core::error::{Error, ErrorKind, Result};

/*
┌──────────────────────────────────────── TALLYDEX ────────────────────────────────────────┐
│                                                                                          │
│   collectors (one per region/partition)                                                  │
│        │  PartitionSink<UsageRecord<P>>                                                  │
│        ▼                                                                                 │
│  ┌─────────────┐   Combined<T>   ┌──────────────────────┐        ┌───────────────────┐   │
│  │ parallel::  │ ──────────────▶ │ writer::ingest       │ ─────▶ │ writer::bulk      │   │
│  │ FanIn       │  record|failed| │ identity + index name│        │ BulkWriter        │   │
│  │ CancelToken │  cancelled      └──────────────────────┘        └─────────┬─────────┘   │
│  └─────────────┘                                                           │             │
│                                                                            ▼             │
│  ┌──────────────────────┐   indexes    ┌─────────────────┐       ┌───────────────────┐   │
│  │ access::             │ ───────────▶ │ reader::search  │ ────▶ │ storage::         │   │
│  │ AccountIndexResolver │              │ typed responses │       │ StorageEngine     │   │
│  └──────────────────────┘              └─────────────────┘       │  HttpEngine       │   │
│                                                                  │  MemoryEngine     │   │
│  startup (core::database::Database::bootstrap)                   └─────────▲─────────┘   │
│  ┌──────────────────┐   versions   ┌─────────────────────┐                 │             │
│  │ schema::         │ ───────────▶ │ migration::         │ ────────────────┘             │
│  │ TemplateCatalog  │              │ IndexVersionRegistry│  create, mapping, reindex,    │
│  └──────────────────┘              │ MigrationOrchestr.  │  delete, alias                │
│                                    └─────────────────────┘                               │
└──────────────────────────────────────────────────────────────────────────────────────────┘
*/
