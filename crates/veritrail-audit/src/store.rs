//! The append-only event sequence.
//!
//! `EventStore` enforces the ordering invariants of a session: ids are unique,
//! and a `basisId` may only name an event that is already stored.  It knows
//! nothing about hashing; the recorder pairs each append with a tree leaf.

use std::collections::HashMap;

use veritrail_contracts::{
    error::{VeritrailError, VeritrailResult},
    event::{Event, EventId},
};

#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
    positions: HashMap<EventId, usize>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `event` could be appended without storing it.
    pub fn check_appendable(&self, event: &Event) -> VeritrailResult<()> {
        if self.positions.contains_key(&event.id) {
            return Err(VeritrailError::DuplicateEventId {
                event_id: event.id.to_string(),
            });
        }
        if let Some(basis) = &event.basis_id {
            if !self.positions.contains_key(basis) {
                return Err(VeritrailError::UnknownBasis {
                    basis_id: basis.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Append `event` and return its position.
    pub fn append(&mut self, event: Event) -> VeritrailResult<usize> {
        self.check_appendable(&event)?;
        let index = self.events.len();
        self.positions.insert(event.id.clone(), index);
        self.events.push(event);
        Ok(index)
    }

    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.positions.get(id).map(|&i| &self.events[i])
    }

    pub fn position(&self, id: &EventId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    /// The latest `n` events, oldest first.
    pub fn recent(&self, n: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use veritrail_contracts::event::EventKind;

    use super::*;

    fn event(basis: Option<EventId>) -> Event {
        Event::new("tool", EventKind::Observation, json!({}), json!(null), basis)
    }

    #[test]
    fn append_assigns_positions_in_order() {
        let mut store = EventStore::new();
        let a = event(None);
        let b = event(Some(a.id.clone()));
        assert_eq!(store.append(a.clone()).unwrap(), 0);
        assert_eq!(store.append(b.clone()).unwrap(), 1);
        assert_eq!(store.position(&b.id), Some(1));
        assert_eq!(store.get(&a.id), Some(&a));
        assert_eq!(store.last(), Some(&b));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut store = EventStore::new();
        let a = event(None);
        store.append(a.clone()).unwrap();
        assert!(matches!(store.append(a), Err(VeritrailError::DuplicateEventId { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn basis_must_already_be_stored() {
        let mut store = EventStore::new();
        let orphan = event(Some(EventId::from("never-recorded")));
        let err = store.append(orphan).unwrap_err();
        assert!(matches!(err, VeritrailError::UnknownBasis { ref basis_id } if basis_id == "never-recorded"));
        assert!(store.is_empty());
    }

    #[test]
    fn recent_returns_tail_oldest_first() {
        let mut store = EventStore::new();
        let ids: Vec<EventId> = (0..5)
            .map(|_| {
                let e = event(None);
                let id = e.id.clone();
                store.append(e).unwrap();
                id
            })
            .collect();
        let tail: Vec<&EventId> = store.recent(2).iter().map(|e| &e.id).collect();
        assert_eq!(tail, vec![&ids[3], &ids[4]]);
        assert_eq!(store.recent(50).len(), 5);
        assert!(store.recent(0).is_empty());
    }
}
