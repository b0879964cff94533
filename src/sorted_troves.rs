//! # Sorted troves
//!
//! A doubly linked list of active troves ordered by descending ICR: the head is the safest trove, the tail the
//! riskiest. Nodes carry no key. Every position is checked against the current ICR of the neighbours, which the
//! caller supplies through `icr_of`, so a price move never leaves stale keys behind.
//!
//! Insertion is positioned with caller-supplied hints. A hint that went stale is corrected by walking the list,
//! but never further than `max_walk` nodes; past that the caller has to fetch fresh hints.
//!
//! The nodes live in the [`LedgerStore`]; only the ends and the size are kept here.

use crate::errors::*;
use crate::shared_structs::TroveId;
use crate::storage::LedgerStore;
use scrypto::prelude::*;

#[derive(ScryptoSbor, Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub prev: Option<TroveId>,
    pub next: Option<TroveId>,
}

#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct SortedTroves {
    head: Option<TroveId>,
    tail: Option<TroveId>,
    size: u64,
}

impl SortedTroves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains<S: LedgerStore>(&self, store: &S, id: &TroveId) -> bool {
        store.node(id).is_some()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Trove with the highest ICR.
    pub fn first(&self) -> Option<&TroveId> {
        self.head.as_ref()
    }

    /// Trove with the lowest ICR.
    pub fn last(&self) -> Option<&TroveId> {
        self.tail.as_ref()
    }

    /// Neighbour towards the tail.
    pub fn next<S: LedgerStore>(&self, store: &S, id: &TroveId) -> Option<TroveId> {
        store.node(id).and_then(|node| node.next)
    }

    /// Neighbour towards the head.
    pub fn prev<S: LedgerStore>(&self, store: &S, id: &TroveId) -> Option<TroveId> {
        store.node(id).and_then(|node| node.prev)
    }

    /// Whether `icr` fits between `prev` and `next`.
    pub fn valid_insert_position<S, F>(
        &self,
        store: &S,
        icr: Decimal,
        prev: Option<&TroveId>,
        next: Option<&TroveId>,
        icr_of: &F,
    ) -> LedgerResult<bool>
    where
        S: LedgerStore,
        F: Fn(&TroveId) -> LedgerResult<Decimal>,
    {
        Ok(match (prev, next) {
            (None, None) => self.is_empty(),
            (None, Some(next)) => self.head.as_ref() == Some(next) && icr >= icr_of(next)?,
            (Some(prev), None) => self.tail.as_ref() == Some(prev) && icr <= icr_of(prev)?,
            (Some(prev), Some(next)) => {
                self.next(store, prev).as_ref() == Some(next)
                    && icr_of(prev)? >= icr
                    && icr >= icr_of(next)?
            }
        })
    }

    /// Finds the `(prev, next)` pair `icr` belongs between, starting from the hints.
    ///
    /// Hints that are not in the list or sit on the wrong side of `icr` are dropped. Without any usable hint the
    /// search starts at the head.
    pub fn find_insert_position<S, F>(
        &self,
        store: &S,
        icr: Decimal,
        prev_hint: Option<&TroveId>,
        next_hint: Option<&TroveId>,
        max_walk: u32,
        icr_of: &F,
    ) -> LedgerResult<(Option<TroveId>, Option<TroveId>)>
    where
        S: LedgerStore,
        F: Fn(&TroveId) -> LedgerResult<Decimal>,
    {
        let prev = self.usable_hint(store, prev_hint, icr_of, |hint_icr| icr <= hint_icr)?;
        let next = self.usable_hint(store, next_hint, icr_of, |hint_icr| icr >= hint_icr)?;

        match (prev, next) {
            (None, None) => match self.head.as_ref() {
                Some(head) => self.descend_list(store, icr, head, max_walk, icr_of),
                None => Ok((None, None)),
            },
            (None, Some(next)) => self.ascend_list(store, icr, next, max_walk, icr_of),
            (Some(prev), _) => self.descend_list(store, icr, prev, max_walk, icr_of),
        }
    }

    /// Links `id` between `prev` and `next`, a pair returned by `find_insert_position`.
    pub fn insert<S: LedgerStore>(
        &mut self,
        store: &mut S,
        id: &TroveId,
        prev: Option<TroveId>,
        next: Option<TroveId>,
    ) -> LedgerResult<()> {
        if self.contains(store, id) {
            return Err(LedgerError::AlreadyInList(id.clone()));
        }

        match &prev {
            Some(prev_id) => {
                let mut prev_node = store
                    .node(prev_id)
                    .ok_or(LedgerError::CorruptList(prev_id.clone()))?;
                prev_node.next = Some(id.clone());
                store.insert_node(prev_id.clone(), prev_node);
            }
            None => self.head = Some(id.clone()),
        }
        match &next {
            Some(next_id) => {
                let mut next_node = store
                    .node(next_id)
                    .ok_or(LedgerError::CorruptList(next_id.clone()))?;
                next_node.prev = Some(id.clone());
                store.insert_node(next_id.clone(), next_node);
            }
            None => self.tail = Some(id.clone()),
        }
        store.insert_node(id.clone(), Node { prev, next });
        self.size += 1;
        Ok(())
    }

    pub fn remove<S: LedgerStore>(&mut self, store: &mut S, id: &TroveId) -> LedgerResult<()> {
        let node = store.node(id).ok_or(LedgerError::NotInList(id.clone()))?;

        match &node.prev {
            Some(prev) => {
                let mut prev_node = store.node(prev).ok_or(LedgerError::CorruptList(id.clone()))?;
                prev_node.next = node.next.clone();
                store.insert_node(prev.clone(), prev_node);
            }
            None => self.head = node.next.clone(),
        }
        match &node.next {
            Some(next) => {
                let mut next_node = store.node(next).ok_or(LedgerError::CorruptList(id.clone()))?;
                next_node.prev = node.prev.clone();
                store.insert_node(next.clone(), next_node);
            }
            None => self.tail = node.prev.clone(),
        }
        store.remove_node(id);
        self.size -= 1;
        Ok(())
    }

    fn usable_hint<'a, S, F>(
        &self,
        store: &S,
        hint: Option<&'a TroveId>,
        icr_of: &F,
        fits: impl Fn(Decimal) -> bool,
    ) -> LedgerResult<Option<&'a TroveId>>
    where
        S: LedgerStore,
        F: Fn(&TroveId) -> LedgerResult<Decimal>,
    {
        match hint {
            Some(hint) if self.contains(store, hint) => Ok(fits(icr_of(hint)?).then_some(hint)),
            _ => Ok(None),
        }
    }

    /// Walks towards the tail from `start` until `icr` fits.
    fn descend_list<S, F>(
        &self,
        store: &S,
        icr: Decimal,
        start: &TroveId,
        max_walk: u32,
        icr_of: &F,
    ) -> LedgerResult<(Option<TroveId>, Option<TroveId>)>
    where
        S: LedgerStore,
        F: Fn(&TroveId) -> LedgerResult<Decimal>,
    {
        if self.head.as_ref() == Some(start) && icr >= icr_of(start)? {
            return Ok((None, Some(start.clone())));
        }

        let mut prev = Some(start.clone());
        let mut next = self.next(store, start);
        let mut steps = 0u32;
        while let Some(current) = prev.clone() {
            if self.valid_insert_position(store, icr, Some(&current), next.as_ref(), icr_of)? {
                return Ok((prev, next));
            }
            if steps >= max_walk {
                return Err(LedgerError::StaleInsertHint);
            }
            steps += 1;
            prev = next;
            next = prev.as_ref().and_then(|prev| self.next(store, prev));
        }
        Err(LedgerError::StaleInsertHint)
    }

    /// Walks towards the head from `start` until `icr` fits.
    fn ascend_list<S, F>(
        &self,
        store: &S,
        icr: Decimal,
        start: &TroveId,
        max_walk: u32,
        icr_of: &F,
    ) -> LedgerResult<(Option<TroveId>, Option<TroveId>)>
    where
        S: LedgerStore,
        F: Fn(&TroveId) -> LedgerResult<Decimal>,
    {
        if self.tail.as_ref() == Some(start) && icr <= icr_of(start)? {
            return Ok((Some(start.clone()), None));
        }

        let mut next = Some(start.clone());
        let mut prev = self.prev(store, start);
        let mut steps = 0u32;
        while let Some(current) = next.clone() {
            if self.valid_insert_position(store, icr, prev.as_ref(), Some(&current), icr_of)? {
                return Ok((prev, next));
            }
            if steps >= max_walk {
                return Err(LedgerError::StaleInsertHint);
            }
            steps += 1;
            next = prev;
            prev = next.as_ref().and_then(|next| self.prev(store, next));
        }
        Err(LedgerError::StaleInsertHint)
    }

    /// Iterates from the head towards the tail.
    pub fn iter<'a, S: LedgerStore>(&self, store: &'a S) -> SortedTrovesIter<'a, S> {
        SortedTrovesIter {
            store,
            current: self.head.clone(),
        }
    }
}

pub struct SortedTrovesIter<'a, S> {
    store: &'a S,
    current: Option<TroveId>,
}

impl<S: LedgerStore> Iterator for SortedTrovesIter<'_, S> {
    type Item = TroveId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current.take()?;
        self.current = self.store.node(&id).and_then(|node| node.next);
        Some(id)
    }
}
