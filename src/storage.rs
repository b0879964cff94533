//! # Ledger storage
//!
//! Everything the ledger keeps per trove lives behind [`LedgerStore`]: the trove records, the sorted list nodes,
//! the owner array and the surplus claims. An operation only loads the entries it touches, so its cost does not
//! grow with the number of troves.
//!
//! - [`ComponentStore`] keeps the tables in `KeyValueStore`s and is what the `TroveManager` component holds.
//! - [`MemoryStore`] keeps them in hash maps, for native use of the ledger.
//! - [`StagedStore`] buffers the writes of one operation on top of either of them. The ledger commits the buffer
//!   when the operation succeeds and drops it when it fails.

use crate::shared_structs::{Trove, TroveId};
use crate::sorted_troves::Node;
use crate::token_amounts::TokenAmounts;
use scrypto::prelude::*;

/// Per-trove tables of the ledger. Getters hand out copies; a change only lands through one of the setters.
pub trait LedgerStore {
    fn trove(&self, id: &TroveId) -> Option<Trove>;
    fn insert_trove(&mut self, id: TroveId, trove: Trove);

    fn node(&self, id: &TroveId) -> Option<Node>;
    fn insert_node(&mut self, id: TroveId, node: Node);
    fn remove_node(&mut self, id: &TroveId);

    /// Active trove at `index` of the owner array.
    fn owner(&self, index: u64) -> Option<TroveId>;
    fn insert_owner(&mut self, index: u64, id: TroveId);
    fn remove_owner(&mut self, index: u64);

    fn claim(&self, id: &TroveId) -> Option<TokenAmounts>;
    fn insert_claim(&mut self, id: TroveId, amounts: TokenAmounts);
    fn remove_claim(&mut self, id: &TroveId);
}

#[derive(ScryptoSbor)]
pub struct ComponentStore {
    troves: KeyValueStore<TroveId, Trove>,
    nodes: KeyValueStore<TroveId, Node>,
    owners: KeyValueStore<u64, TroveId>,
    claims: KeyValueStore<TroveId, TokenAmounts>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self {
            troves: KeyValueStore::new(),
            nodes: KeyValueStore::new(),
            owners: KeyValueStore::new(),
            claims: KeyValueStore::new(),
        }
    }
}

impl LedgerStore for ComponentStore {
    fn trove(&self, id: &TroveId) -> Option<Trove> {
        self.troves.get(id).map(|entry| (*entry).clone())
    }

    fn insert_trove(&mut self, id: TroveId, trove: Trove) {
        self.troves.insert(id, trove);
    }

    fn node(&self, id: &TroveId) -> Option<Node> {
        self.nodes.get(id).map(|entry| (*entry).clone())
    }

    fn insert_node(&mut self, id: TroveId, node: Node) {
        self.nodes.insert(id, node);
    }

    fn remove_node(&mut self, id: &TroveId) {
        self.nodes.remove(id);
    }

    fn owner(&self, index: u64) -> Option<TroveId> {
        self.owners.get(&index).map(|entry| (*entry).clone())
    }

    fn insert_owner(&mut self, index: u64, id: TroveId) {
        self.owners.insert(index, id);
    }

    fn remove_owner(&mut self, index: u64) {
        self.owners.remove(&index);
    }

    fn claim(&self, id: &TroveId) -> Option<TokenAmounts> {
        self.claims.get(id).map(|entry| (*entry).clone())
    }

    fn insert_claim(&mut self, id: TroveId, amounts: TokenAmounts) {
        self.claims.insert(id, amounts);
    }

    fn remove_claim(&mut self, id: &TroveId) {
        self.claims.remove(id);
    }
}

#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    troves: HashMap<TroveId, Trove>,
    nodes: HashMap<TroveId, Node>,
    owners: HashMap<u64, TroveId>,
    claims: HashMap<TroveId, TokenAmounts>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn trove(&self, id: &TroveId) -> Option<Trove> {
        self.troves.get(id).cloned()
    }

    fn insert_trove(&mut self, id: TroveId, trove: Trove) {
        self.troves.insert(id, trove);
    }

    fn node(&self, id: &TroveId) -> Option<Node> {
        self.nodes.get(id).cloned()
    }

    fn insert_node(&mut self, id: TroveId, node: Node) {
        self.nodes.insert(id, node);
    }

    fn remove_node(&mut self, id: &TroveId) {
        self.nodes.remove(id);
    }

    fn owner(&self, index: u64) -> Option<TroveId> {
        self.owners.get(&index).cloned()
    }

    fn insert_owner(&mut self, index: u64, id: TroveId) {
        self.owners.insert(index, id);
    }

    fn remove_owner(&mut self, index: u64) {
        self.owners.remove(&index);
    }

    fn claim(&self, id: &TroveId) -> Option<TokenAmounts> {
        self.claims.get(id).cloned()
    }

    fn insert_claim(&mut self, id: TroveId, amounts: TokenAmounts) {
        self.claims.insert(id, amounts);
    }

    fn remove_claim(&mut self, id: &TroveId) {
        self.claims.remove(id);
    }
}

/// Write buffer over a store. Reads see the buffered writes first. `None` marks a removed entry.
#[derive(ScryptoSbor, Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedStore<S> {
    inner: S,
    troves: HashMap<TroveId, Trove>,
    nodes: HashMap<TroveId, Option<Node>>,
    owners: HashMap<u64, Option<TroveId>>,
    claims: HashMap<TroveId, Option<TokenAmounts>>,
}

impl<S: LedgerStore> StagedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            troves: HashMap::new(),
            nodes: HashMap::new(),
            owners: HashMap::new(),
            claims: HashMap::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn has_staged_writes(&self) -> bool {
        !(self.troves.is_empty() && self.nodes.is_empty() && self.owners.is_empty() && self.claims.is_empty())
    }

    /// Writes every buffered change through to the inner store.
    pub fn commit(&mut self) {
        for (id, trove) in self.troves.drain() {
            self.inner.insert_trove(id, trove);
        }
        for (id, node) in self.nodes.drain() {
            match node {
                Some(node) => self.inner.insert_node(id, node),
                None => self.inner.remove_node(&id),
            }
        }
        for (index, owner) in self.owners.drain() {
            match owner {
                Some(owner) => self.inner.insert_owner(index, owner),
                None => self.inner.remove_owner(index),
            }
        }
        for (id, claim) in self.claims.drain() {
            match claim {
                Some(amounts) => self.inner.insert_claim(id, amounts),
                None => self.inner.remove_claim(&id),
            }
        }
    }

    /// Drops every buffered change.
    pub fn discard(&mut self) {
        self.troves.clear();
        self.nodes.clear();
        self.owners.clear();
        self.claims.clear();
    }
}

impl<S: LedgerStore> LedgerStore for StagedStore<S> {
    fn trove(&self, id: &TroveId) -> Option<Trove> {
        match self.troves.get(id) {
            Some(trove) => Some(trove.clone()),
            None => self.inner.trove(id),
        }
    }

    fn insert_trove(&mut self, id: TroveId, trove: Trove) {
        self.troves.insert(id, trove);
    }

    fn node(&self, id: &TroveId) -> Option<Node> {
        match self.nodes.get(id) {
            Some(staged) => staged.clone(),
            None => self.inner.node(id),
        }
    }

    fn insert_node(&mut self, id: TroveId, node: Node) {
        self.nodes.insert(id, Some(node));
    }

    fn remove_node(&mut self, id: &TroveId) {
        self.nodes.insert(id.clone(), None);
    }

    fn owner(&self, index: u64) -> Option<TroveId> {
        match self.owners.get(&index) {
            Some(staged) => staged.clone(),
            None => self.inner.owner(index),
        }
    }

    fn insert_owner(&mut self, index: u64, id: TroveId) {
        self.owners.insert(index, Some(id));
    }

    fn remove_owner(&mut self, index: u64) {
        self.owners.insert(index, None);
    }

    fn claim(&self, id: &TroveId) -> Option<TokenAmounts> {
        match self.claims.get(id) {
            Some(staged) => staged.clone(),
            None => self.inner.claim(id),
        }
    }

    fn insert_claim(&mut self, id: TroveId, amounts: TokenAmounts) {
        self.claims.insert(id, Some(amounts));
    }

    fn remove_claim(&mut self, id: &TroveId) {
        self.claims.insert(id.clone(), None);
    }
}
