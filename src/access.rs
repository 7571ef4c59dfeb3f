// Access control boundary.
//
// Two seams. Roles gate who may call governance and settlement entry points
// on the engine; the `SettlementCap` capability gates which component may
// drive settlement-side balance mutation on the ledger directly. The cap is
// a value, not an address comparison, so the ledger can be tested standalone
// with a harness holding its own cap.

use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May whitelist collateral and tune weights/caps.
    Governance,
    /// The trusted margin-settlement component; the only caller allowed to
    /// route deposits and PnL settlement into the ledger.
    Settlement,
}

pub trait AccessControl {
    fn has_role(&self, caller: AccountId, role: Role) -> bool;
}

/// Capability held by the settlement component. Ledger methods that credit
/// or debit balances outside a user withdrawal require a reference to one.
#[derive(Debug)]
pub struct SettlementCap(());

impl SettlementCap {
    pub fn new() -> Self {
        Self(())
    }
}

impl Default for SettlementCap {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    grants: HashMap<Role, HashSet<AccountId>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, account: AccountId, role: Role) {
        self.grants.entry(role).or_default().insert(account);
    }

    pub fn revoke(&mut self, account: AccountId, role: Role) {
        if let Some(members) = self.grants.get_mut(&role) {
            members.remove(&account);
        }
    }
}

impl AccessControl for RoleTable {
    fn has_role(&self, caller: AccountId, role: Role) -> bool {
        self.grants
            .get(&role)
            .map(|members| members.contains(&caller))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_and_revoke() {
        let mut roles = RoleTable::new();
        let gov = AccountId(1);

        assert!(!roles.has_role(gov, Role::Governance));
        roles.grant(gov, Role::Governance);
        assert!(roles.has_role(gov, Role::Governance));
        assert!(!roles.has_role(gov, Role::Settlement));

        roles.revoke(gov, Role::Governance);
        assert!(!roles.has_role(gov, Role::Governance));
    }

    #[test]
    fn roles_are_per_account() {
        let mut roles = RoleTable::new();
        roles.grant(AccountId(1), Role::Settlement);
        assert!(!roles.has_role(AccountId(2), Role::Settlement));
    }
}
