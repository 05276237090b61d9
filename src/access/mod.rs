pub mod directory;
pub mod resolver;

pub use directory::{AccountDirectory, AccountGrant, MemoryDirectory, TenantAccount};
pub use resolver::{AccountIndexResolver, ResolvedAccess, ResolvedAccounts};
