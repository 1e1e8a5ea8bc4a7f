//! Decision ledger: explicit tickets correlating a "show" with its outcome.
//!
//! Each decision gets a monotonically increasing [`TicketId`]. Only pending
//! tickets are kept by id; once a ticket reaches a terminal state it moves
//! into a bounded window of recent history and is otherwise forgotten. Expired
//! ids are remembered as coalesced ranges, so any id below the issue cursor
//! that is neither pending nor expired must have been resolved. That keeps
//! [`Error::AlreadyResolved`] and [`Error::UnknownTicket`] distinct for the
//! ledger's whole lifetime. Memory grows with in-flight tickets and with runs
//! of abandoned ones, never with resolved traffic.
//!
//! State machine per ticket:
//!
//! ```text
//! Pending --resolve--> Resolved
//! Pending --expire---> Expired
//! ```
//!
//! Resolved and Expired are terminal.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::{Arm, ArmStore, Error, Result};

/// Terminal tickets kept for [`DecisionLedger::get`] and the outcome log.
pub const DEFAULT_TICKET_HISTORY: usize = 1024;

/// Opaque decision ticket id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TicketId(pub u64);

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TicketState {
    Pending,
    Resolved { positive: bool },
    /// Abandoned by the caller and cleaned up before resolution.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ticket {
    pub id: TicketId,
    pub arm: Arm,
    /// Ledger clock at issue time (issues and resolutions both tick it).
    pub issued_at: u64,
    pub state: TicketState,
}

impl Ticket {
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, TicketState::Resolved { .. })
    }

    pub fn outcome(&self) -> Option<bool> {
        match self.state {
            TicketState::Resolved { positive } => Some(positive),
            TicketState::Pending | TicketState::Expired => None,
        }
    }
}

/// Ticket counts by state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedgerCounts {
    pub issued: u64,
    pub pending: u64,
    pub resolved: u64,
    pub expired: u64,
}

/// Ticket store: pending tickets by id plus a bounded terminal history.
#[derive(Debug, Clone)]
pub struct DecisionLedger {
    next_id: u64,
    pending: BTreeMap<TicketId, Ticket>,
    /// Expired ids as `start -> end` (exclusive), adjacent runs merged.
    expired: BTreeMap<u64, u64>,
    history: VecDeque<Ticket>,
    history_cap: usize,
    clock: u64,
    counts: LedgerCounts,
}

impl Default for DecisionLedger {
    fn default() -> Self {
        Self::with_history(DEFAULT_TICKET_HISTORY)
    }
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger keeping at most `cap` terminal tickets for inspection.
    pub fn with_history(cap: usize) -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            expired: BTreeMap::new(),
            history: VecDeque::with_capacity(cap.min(DEFAULT_TICKET_HISTORY)),
            history_cap: cap,
            clock: 0,
            counts: LedgerCounts::default(),
        }
    }

    /// Issue the next ticket for `arm` and count the view in `store`.
    ///
    /// Both effects happen under the same `&mut` borrow, so no reader sees one
    /// without the other.
    pub fn issue(&mut self, arm: Arm, store: &mut ArmStore) -> Ticket {
        let ticket = Ticket {
            id: TicketId(self.next_id),
            arm,
            issued_at: self.tick(),
            state: TicketState::Pending,
        };
        self.next_id += 1;
        store.record_view(arm);
        self.pending.insert(ticket.id, ticket);
        self.counts.issued += 1;
        self.counts.pending += 1;
        ticket
    }

    /// Resolve a pending ticket exactly once.
    ///
    /// A positive outcome records a click on the ticket's arm; a negative one
    /// only updates the arm's running estimate. On any error, neither the ticket
    /// nor the store changes.
    pub fn resolve(&mut self, id: TicketId, positive: bool, store: &mut ArmStore) -> Result<Ticket> {
        let Some(&pending) = self.pending.get(&id) else {
            return Err(self.terminal_error(id));
        };
        if positive {
            store.record_click(pending.arm)?;
        } else {
            store.record_miss(pending.arm);
        }
        self.pending.remove(&id);
        self.tick();
        let ticket = Ticket {
            state: TicketState::Resolved { positive },
            ..pending
        };
        self.retire(ticket);
        self.counts.pending -= 1;
        self.counts.resolved += 1;
        Ok(ticket)
    }

    /// Expire every ticket older than `before` that is still pending.
    ///
    /// Counters are untouched: a view was shown, and clicks only ever come from
    /// explicit resolution. Cost is proportional to the tickets expired, not to
    /// the ledger's age. Returns the number of tickets expired.
    pub fn expire_pending_before(&mut self, before: TicketId) -> u64 {
        let keep = self.pending.split_off(&before);
        let stale = std::mem::replace(&mut self.pending, keep);
        let n = stale.len() as u64;
        for ticket in stale.into_values() {
            self.mark_expired(ticket.id);
            self.retire(Ticket {
                state: TicketState::Expired,
                ..ticket
            });
        }
        self.counts.pending -= n;
        self.counts.expired += n;
        n
    }

    /// Pending tickets, and terminal ones still inside the history window.
    pub fn get(&self, id: TicketId) -> Option<&Ticket> {
        self.pending
            .get(&id)
            .or_else(|| self.history.iter().rev().find(|t| t.id == id))
    }

    pub fn counts(&self) -> LedgerCounts {
        self.counts
    }

    /// Number of tickets ever issued.
    pub fn issued(&self) -> u64 {
        self.counts.issued
    }

    /// Records currently held: pending tickets, history, and expired ranges.
    pub fn retained(&self) -> usize {
        self.pending.len() + self.history.len() + self.expired.len()
    }

    /// Outcome per retained ticket, in issue order: `Some(clicked)` once
    /// resolved, `None` while pending or after expiry.
    ///
    /// Covers every pending ticket plus the most recent terminal ones; older
    /// outcomes are already folded into the arm counters.
    pub fn outcome_log(&self) -> Vec<(TicketId, Option<bool>)> {
        let mut log: Vec<(TicketId, Option<bool>)> = self
            .pending
            .values()
            .chain(self.history.iter())
            .map(|t| (t.id, t.outcome()))
            .collect();
        log.sort_unstable_by_key(|&(id, _)| id);
        log
    }

    fn terminal_error(&self, id: TicketId) -> Error {
        if id.0 >= self.next_id || self.is_expired(id) {
            Error::UnknownTicket(id)
        } else {
            Error::AlreadyResolved(id)
        }
    }

    fn is_expired(&self, id: TicketId) -> bool {
        self.expired
            .range(..=id.0)
            .next_back()
            .is_some_and(|(_, &end)| id.0 < end)
    }

    fn mark_expired(&mut self, id: TicketId) {
        let i = id.0;
        let start = match self.expired.range(..i).next_back() {
            Some((&s, &e)) if e == i => s,
            _ => i,
        };
        let end = self.expired.remove(&(i + 1)).unwrap_or(i + 1);
        self.expired.insert(start, end);
    }

    fn retire(&mut self, ticket: Ticket) {
        if self.history_cap == 0 {
            return;
        }
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(ticket);
    }

    fn tick(&mut self) -> u64 {
        let now = self.clock;
        self.clock += 1;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_counts_the_view_and_sequences_ids() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::new();
        let t0 = l.issue(Arm::A, &mut store);
        let t1 = l.issue(Arm::B, &mut store);
        let t2 = l.issue(Arm::A, &mut store);
        assert_eq!([t0.id, t1.id, t2.id], [TicketId(0), TicketId(1), TicketId(2)]);
        assert!(t0.issued_at < t1.issued_at && t1.issued_at < t2.issued_at);
        assert_eq!(store.get(Arm::A).views, 2);
        assert_eq!(store.get(Arm::B).views, 1);
        assert_eq!(l.counts().pending, 3);
    }

    #[test]
    fn resolve_twice_is_rejected_and_counts_once() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::new();
        let t = l.issue(Arm::A, &mut store);
        l.resolve(t.id, true, &mut store).unwrap();
        let before = store;
        assert_eq!(
            l.resolve(t.id, true, &mut store),
            Err(Error::AlreadyResolved(t.id))
        );
        assert_eq!(store, before);
        assert_eq!(store.get(Arm::A).clicks, 1);
    }

    #[test]
    fn unknown_ticket_is_rejected() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::new();
        assert_eq!(
            l.resolve(TicketId(5), true, &mut store),
            Err(Error::UnknownTicket(TicketId(5)))
        );
    }

    #[test]
    fn out_of_order_resolution_binds_to_the_right_arm() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::new();
        let ta = l.issue(Arm::A, &mut store);
        let tb = l.issue(Arm::B, &mut store);
        // B's outcome arrives first; A's later.
        l.resolve(tb.id, true, &mut store).unwrap();
        l.resolve(ta.id, false, &mut store).unwrap();
        assert_eq!(store.get(Arm::A).clicks, 0);
        assert_eq!(store.get(Arm::B).clicks, 1);
        assert_eq!(
            l.outcome_log(),
            vec![(ta.id, Some(false)), (tb.id, Some(true))]
        );
    }

    #[test]
    fn expired_tickets_cannot_be_resolved() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::new();
        let t0 = l.issue(Arm::A, &mut store);
        let t1 = l.issue(Arm::B, &mut store);
        l.resolve(t1.id, false, &mut store).unwrap();
        let t2 = l.issue(Arm::B, &mut store);
        assert_eq!(l.expire_pending_before(t2.id), 1);
        assert_eq!(
            l.resolve(t0.id, true, &mut store),
            Err(Error::UnknownTicket(t0.id))
        );
        l.resolve(t2.id, true, &mut store).unwrap();
        assert_eq!(
            l.counts(),
            LedgerCounts {
                issued: 3,
                pending: 0,
                resolved: 2,
                expired: 1
            }
        );
        assert_eq!(store.get(Arm::A).views, 1, "expiry keeps the view");
    }

    #[test]
    fn retained_size_stays_bounded_under_steady_traffic() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::with_history(32);
        let mut first = None;
        let mut last = None;
        for i in 0..20_000u64 {
            let arm = if i % 2 == 0 { Arm::A } else { Arm::B };
            let t = l.issue(arm, &mut store);
            l.resolve(t.id, i % 3 == 0, &mut store).unwrap();
            first.get_or_insert(t.id);
            last = Some(t.id);
            if i % 1_000 == 999 {
                assert_eq!(l.expire_pending_before(TicketId(i + 1)), 0);
            }
            assert!(l.retained() <= 32, "retained={}", l.retained());
        }
        assert_eq!(l.outcome_log().len(), 32);
        assert_eq!(l.counts().resolved, 20_000);

        let first = first.unwrap();
        assert!(l.get(first).is_none());
        assert_eq!(
            l.resolve(first, true, &mut store),
            Err(Error::AlreadyResolved(first))
        );
        assert_eq!(l.get(last.unwrap()).map(Ticket::is_resolved), Some(true));
    }

    #[test]
    fn evicted_tickets_keep_their_terminal_classification() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::with_history(4);
        let ids: Vec<TicketId> = (0..100).map(|_| l.issue(Arm::B, &mut store).id).collect();
        for id in &ids {
            if id.0 % 7 != 0 {
                l.resolve(*id, false, &mut store).unwrap();
            }
        }
        assert_eq!(l.expire_pending_before(TicketId(u64::MAX)), 15);
        // Four in history plus one range per isolated expired id.
        assert_eq!(l.retained(), 4 + 15);

        for id in ids {
            let want = if id.0 % 7 == 0 {
                Error::UnknownTicket(id)
            } else {
                Error::AlreadyResolved(id)
            };
            assert_eq!(l.resolve(id, true, &mut store), Err(want));
        }
        let newest = l.get(TicketId(98)).copied().unwrap();
        assert_eq!(newest.state, TicketState::Expired);
        assert!(!newest.is_resolved());
        assert_eq!(store.get(Arm::B).clicks, 0);
    }

    #[test]
    fn adjacent_expiries_coalesce_into_one_range() {
        let mut store = ArmStore::new();
        let mut l = DecisionLedger::with_history(0);
        for _ in 0..1_000 {
            l.issue(Arm::A, &mut store);
        }
        // The middle block first, then both sides around it.
        for i in 400..600 {
            l.mark_expired(TicketId(i));
        }
        l.pending.retain(|id, _| !(400..600).contains(&id.0));
        l.counts.pending -= 200;
        assert_eq!(l.expire_pending_before(TicketId(u64::MAX)), 800);
        assert_eq!(l.expired.len(), 1);
        assert_eq!(l.expired.get(&0), Some(&1_000));
        assert_eq!(l.retained(), 1);
    }
}
