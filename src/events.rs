// 11.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. the EventPayload enum lists
// all event types.

use crate::types::{AccountId, AssetId, MarketId, PositionKind, Timestamp};
use crate::wad::Wad;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Whitelist events
    CollateralAdded(CollateralAddedEvent),
    WeightChanged(WeightChangedEvent),
    MaxAmountChanged(MaxAmountChangedEvent),

    // Balance events
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
    AllowanceChanged(AllowanceChangedEvent),
    PnlSettled(PnlSettledEvent),

    // Risk events
    Liquidation(LiquidationEvent),
    CollateralSeized(CollateralSeizedEvent),
    BadDebt(BadDebtEvent),
    InsuranceFunded(InsuranceFundedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralAddedEvent {
    pub asset: AssetId,
    pub index: usize,
    pub weight: Wad,
    pub max_amount: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightChangedEvent {
    pub asset: AssetId,
    pub old_weight: Wad,
    pub new_weight: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxAmountChangedEvent {
    pub asset: AssetId,
    pub old_max_amount: Wad,
    pub new_max_amount: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub payer: AccountId,
    pub beneficiary: AccountId,
    pub asset: AssetId,
    pub amount: Wad,
    pub new_balance: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub account: AccountId,
    pub recipient: AccountId,
    pub asset: AssetId,
    pub amount: Wad,
    pub new_balance: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowanceChangedEvent {
    pub owner: AccountId,
    pub spender: AccountId,
    pub asset: AssetId,
    pub allowance: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlSettledEvent {
    pub account: AccountId,
    pub delta: Wad,
    pub new_balance: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub market: MarketId,
    pub account: AccountId,
    pub kind: PositionKind,
    pub liquidator: AccountId,
    pub closed_notional: Wad,
    pub realized_pnl: Wad,
    pub reward: Wad,
    pub liquidator_reward: Wad,
    pub insurance_reward: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralSeizedEvent {
    pub account: AccountId,
    pub liquidator: AccountId,
    pub asset: AssetId,
    pub seized: Wad,
    pub payment: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadDebtEvent {
    pub account: AccountId,
    pub residual: Wad,
    pub uncovered_by_fund: Wad,
    pub system_bad_debt: Wad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceFundedEvent {
    pub from: AccountId,
    pub amount: Wad,
    pub new_balance: Wad,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

#[derive(Debug, Default, Clone)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Drops the oldest events until at most `max` remain.
    pub fn truncate_front(&mut self, max: usize) {
        if self.events.len() > max {
            let drain_count = self.events.len() - max;
            self.events.drain(0..drain_count);
        }
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}
