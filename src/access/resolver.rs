use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use crate::access::directory::{AccountDirectory, TenantAccount};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::naming::index_name;

/// One account a principal may read, and the index holding its documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccess {
    pub account_identity: String,
    pub index_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAccounts {
    pub accounts: Vec<TenantAccount>,
    /// Distinct physical indices to query.
    pub indexes: Vec<String>,
    pub access: Vec<ResolvedAccess>,
}

impl ResolvedAccounts {
    fn push(&mut self, account: TenantAccount, index: String, seen: &mut HashSet<String>) {
        if !seen.insert(account.identity.clone()) {
            return;
        }
        if !self.indexes.contains(&index) {
            self.indexes.push(index.clone());
        }
        self.access.push(ResolvedAccess {
            account_identity: account.identity.clone(),
            index_name: index,
        });
        self.accounts.push(account);
    }
}

/// Turns requested account identities into the indices a principal may read
/// for one document family.
pub struct AccountIndexResolver {
    directory: Arc<dyn AccountDirectory>,
    prefix: String,
}

impl AccountIndexResolver {
    pub fn new(directory: Arc<dyn AccountDirectory>, prefix: impl Into<String>) -> Self {
        AccountIndexResolver {
            directory,
            prefix: prefix.into(),
        }
    }

    /// An empty `requested` means every owned and shared account. Owned
    /// accounts win over a shared account with the same identity.
    pub async fn resolve(&self, requested: &[String], principal_user_id: u64) -> Result<ResolvedAccounts> {
        let owned = self.directory.owned_accounts(principal_user_id).await?;
        let shared = self.directory.shared_accounts(principal_user_id).await?;

        let mut resolved = ResolvedAccounts::default();
        let mut seen = HashSet::new();

        if requested.is_empty() {
            for account in owned.into_iter().chain(shared) {
                let index = index_name(account.owner_user_id, &self.prefix);
                resolved.push(account, index, &mut seen);
            }
            if resolved.accounts.is_empty() {
                debug!(user_id = principal_user_id, "principal has no accounts");
                return Err(Error::new(
                    ErrorKind::NoAccountsFound,
                    "no accounts found".to_string(),
                ));
            }
            return Ok(resolved);
        }

        for identity in requested {
            let account = owned
                .iter()
                .chain(shared.iter())
                .find(|a| &a.identity == identity)
                .cloned()
                .ok_or_else(|| {
                    debug!(user_id = principal_user_id, account = %identity, "account not accessible");
                    Error::unauthorized(identity)
                })?;
            let index = index_name(account.owner_user_id, &self.prefix);
            resolved.push(account, index, &mut seen);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::directory::{AccountGrant, MemoryDirectory};

    fn directory() -> Arc<MemoryDirectory> {
        let directory = MemoryDirectory::new();
        directory.add_account(TenantAccount::new(7, "111111111111"));
        directory.add_account(TenantAccount::new(7, "222222222222"));
        directory.add_account(TenantAccount::new(9, "333333333333"));
        directory.grant(AccountGrant {
            owner_user_id: 9,
            grantee_user_id: 7,
            account_identity: "333333333333".to_string(),
        });
        Arc::new(directory)
    }

    #[tokio::test]
    async fn accounts_of_one_owner_share_an_index() {
        let resolver = AccountIndexResolver::new(directory(), "ec2-reports");
        let resolved = resolver.resolve(&[], 7).await.unwrap();

        assert_eq!(resolved.accounts.len(), 3);
        assert_eq!(resolved.indexes, vec!["000007-ec2-reports", "000009-ec2-reports"]);
    }

    #[tokio::test]
    async fn repeated_request_is_deduplicated() {
        let resolver = AccountIndexResolver::new(directory(), "ec2-reports");
        let requested = vec!["111111111111".to_string(), "111111111111".to_string()];
        let resolved = resolver.resolve(&requested, 7).await.unwrap();

        assert_eq!(resolved.accounts.len(), 1);
        assert_eq!(resolved.indexes, vec!["000007-ec2-reports"]);
    }

    #[tokio::test]
    async fn unknown_account_is_unauthorized() {
        let resolver = AccountIndexResolver::new(directory(), "ec2-reports");
        let requested = vec!["111111111111".to_string(), "444444444444".to_string()];
        let err = resolver.resolve(&requested, 7).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert!(err.user_message().contains("444444444444"));
    }

    #[tokio::test]
    async fn nobody_without_accounts_gets_no_accounts_found() {
        let resolver = AccountIndexResolver::new(directory(), "ec2-reports");
        let err = resolver.resolve(&[], 1000).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoAccountsFound);
    }
}
