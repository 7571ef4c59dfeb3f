// 8.0 engine/core.rs: main engine. holds the ledger, insurance fund, roles
// and the audit trail. external collaborators (oracle, venue, token bridge)
// are passed into the calls that need them, so every mutating entry point
// works from prices and balances read at call time.

use super::results::EngineError;
use crate::access::{AccessControl, Role, RoleTable, SettlementCap};
use crate::bank::TokenBridge;
use crate::collateral::CollateralLedger;
use crate::config::RiskConfig;
use crate::events::{Event, EventCollector, EventPayload, InsuranceFundedEvent};
use crate::liquidation::InsuranceFund;
use crate::types::{AccountId, AssetId, Timestamp};
use crate::wad::Wad;

/** 8.1: main engine struct. all risk-core state lives here */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: RiskConfig,
    pub(super) ledger: CollateralLedger,
    pub(super) insurance: InsuranceFund,
    pub(super) roles: RoleTable,
    pub(super) events: EventCollector,
    pub(super) cap: SettlementCap,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: RiskConfig, primary_asset: AssetId, primary_decimals: u32) -> Self {
        Self {
            config,
            ledger: CollateralLedger::new(primary_asset, primary_decimals),
            insurance: InsuranceFund::new(),
            roles: RoleTable::new(),
            events: EventCollector::new(),
            cap: SettlementCap::new(),
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    // deployment-time wiring; runtime entry points check these grants
    pub fn grant_role(&mut self, account: AccountId, role: Role) {
        self.roles.grant(account, role);
    }

    pub fn revoke_role(&mut self, account: AccountId, role: Role) {
        self.roles.revoke(account, role);
    }

    pub fn has_role(&self, account: AccountId, role: Role) -> bool {
        self.roles.has_role(account, role)
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn ledger(&self) -> &CollateralLedger {
        &self.ledger
    }

    pub fn insurance_balance(&self) -> Wad {
        self.insurance.balance()
    }

    pub fn system_bad_debt(&self) -> Wad {
        self.insurance.system_bad_debt()
    }

    /// Direct insurance funding: primary-asset tokens move into ledger
    /// custody and the fund's balance grows by the converted amount.
    pub fn fund_insurance<B: TokenBridge>(
        &mut self,
        from: AccountId,
        amount_native: u128,
        bank: &mut B,
    ) -> Result<Wad, EngineError> {
        let primary = self.ledger.primary_asset();
        let decimals = self.ledger.descriptor(primary)?.decimals;
        let amount = Wad::from_native(amount_native, decimals)?;

        bank.transfer_in(primary, from, amount_native)?;
        let index = self.ledger.index_of(primary)?;
        self.ledger.record_inflow(&self.cap, index, amount)?;
        let new_balance = self.insurance.fund(amount)?;

        self.emit(EventPayload::InsuranceFunded(InsuranceFundedEvent {
            from,
            amount,
            new_balance,
        }));
        Ok(new_balance)
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    pub(super) fn require_role(&self, caller: AccountId, role: Role) -> Result<(), EngineError> {
        if !self.roles.has_role(caller, role) {
            return Err(EngineError::MissingRole { caller, role });
        }
        Ok(())
    }

    pub(super) fn emit(&mut self, payload: EventPayload) {
        let event = Event::new(self.events.next_id(), self.current_time, payload);

        if self.config.verbose {
            println!("[event {}] {:?}", event.id.0, event.payload);
        }

        use crate::events::EventEmitter;
        self.events.emit(event);
        self.events.truncate_front(self.config.max_events);
    }
}
