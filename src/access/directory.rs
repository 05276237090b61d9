use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;

/// A cloud account registered by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantAccount {
    pub owner_user_id: u64,
    pub identity: String,        // Provider account id, e.g. `123456789012`
    pub display_name: Option<String>,
}

impl TenantAccount {
    pub fn new(owner_user_id: u64, identity: impl Into<String>) -> Self {
        TenantAccount {
            owner_user_id,
            identity: identity.into(),
            display_name: None,
        }
    }
}

/// `owner_user_id` lets `grantee_user_id` read `account_identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountGrant {
    pub owner_user_id: u64,
    pub grantee_user_id: u64,
    pub account_identity: String,
}

/// Read-only view of account ownership and sharing.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn owned_accounts(&self, user_id: u64) -> Result<Vec<TenantAccount>>;

    /// Accounts other users granted to `user_id`. `owner_user_id` on each
    /// entry is the granting owner.
    async fn shared_accounts(&self, user_id: u64) -> Result<Vec<TenantAccount>>;
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    accounts: RwLock<Vec<TenantAccount>>,
    grants: RwLock<Vec<AccountGrant>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, account: TenantAccount) {
        self.accounts.write().push(account);
    }

    pub fn grant(&self, grant: AccountGrant) {
        self.grants.write().push(grant);
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn owned_accounts(&self, user_id: u64) -> Result<Vec<TenantAccount>> {
        Ok(self
            .accounts
            .read()
            .iter()
            .filter(|a| a.owner_user_id == user_id)
            .cloned()
            .collect())
    }

    async fn shared_accounts(&self, user_id: u64) -> Result<Vec<TenantAccount>> {
        let accounts = self.accounts.read();
        Ok(self
            .grants
            .read()
            .iter()
            .filter(|g| g.grantee_user_id == user_id)
            .filter_map(|g| {
                accounts
                    .iter()
                    .find(|a| a.owner_user_id == g.owner_user_id && a.identity == g.account_identity)
                    .cloned()
            })
            .collect())
    }
}
