use scrypto::prelude::*;
use trove_protocol::errors::*;
use trove_protocol::sorted_troves::SortedTroves;
use trove_protocol::storage::MemoryStore;

fn id(n: u64) -> NonFungibleLocalId {
    NonFungibleLocalId::integer(n)
}

/// A list with its node store and the current ICR of every listed trove.
struct List {
    list: SortedTroves,
    store: MemoryStore,
    icrs: HashMap<NonFungibleLocalId, Decimal>,
}

impl List {
    fn new() -> Self {
        Self {
            list: SortedTroves::new(),
            store: MemoryStore::new(),
            icrs: HashMap::new(),
        }
    }

    /// Troves 1 to 5 with ICRs 5 to 1.
    fn five_nodes() -> Self {
        let mut list = Self::new();
        for n in 1..=5u64 {
            list.insert(n, Decimal::from(6 - n), None, None, 100)
                .unwrap();
        }
        list
    }

    fn insert(
        &mut self,
        n: u64,
        icr: Decimal,
        prev_hint: Option<u64>,
        next_hint: Option<u64>,
        max_walk: u32,
    ) -> LedgerResult<()> {
        let icrs = &self.icrs;
        let icr_of = |trove: &NonFungibleLocalId| {
            icrs.get(trove)
                .copied()
                .ok_or(LedgerError::TroveNotActive(trove.clone()))
        };
        let (prev, next) = self.list.find_insert_position(
            &self.store,
            icr,
            prev_hint.map(id).as_ref(),
            next_hint.map(id).as_ref(),
            max_walk,
            &icr_of,
        )?;
        self.list.insert(&mut self.store, &id(n), prev, next)?;
        self.icrs.insert(id(n), icr);
        Ok(())
    }

    fn remove(&mut self, n: u64) -> LedgerResult<()> {
        self.list.remove(&mut self.store, &id(n))?;
        self.icrs.remove(&id(n));
        Ok(())
    }

    fn valid(&self, icr: Decimal, prev: Option<u64>, next: Option<u64>) -> bool {
        let icr_of = |trove: &NonFungibleLocalId| Ok(self.icrs[trove]);
        self.list
            .valid_insert_position(&self.store, icr, prev.map(id).as_ref(), next.map(id).as_ref(), &icr_of)
            .unwrap()
    }

    fn ids(&self) -> Vec<NonFungibleLocalId> {
        self.list.iter(&self.store).collect()
    }
}

#[test]
fn test_insert_keeps_descending_order() {
    let list = List::five_nodes();

    assert_eq!(list.ids(), vec![id(1), id(2), id(3), id(4), id(5)]);
    assert_eq!(list.list.first(), Some(&id(1)));
    assert_eq!(list.list.last(), Some(&id(5)));
    assert_eq!(list.list.size(), 5);
    assert_eq!(list.list.next(&list.store, &id(2)), Some(id(3)));
    assert_eq!(list.list.prev(&list.store, &id(2)), Some(id(1)));
}

#[test]
fn test_insert_with_exact_hints_needs_no_walk() {
    let mut list = List::five_nodes();

    list.insert(6, dec!("3.5"), Some(2), Some(3), 0).unwrap();

    assert_eq!(list.ids(), vec![id(1), id(2), id(6), id(3), id(4), id(5)]);
}

#[test]
fn test_stale_prev_hint_falls_back_to_head() {
    let mut list = List::five_nodes();

    assert_eq!(
        list.insert(6, dec!("3.5"), Some(4), None, 0),
        Err(LedgerError::StaleInsertHint)
    );
    assert!(!list.list.contains(&list.store, &id(6)));

    list.insert(6, dec!("3.5"), Some(4), None, 1).unwrap();
    assert_eq!(list.list.prev(&list.store, &id(6)), Some(id(2)));
}

#[test]
fn test_next_hint_alone_ascends_the_list() {
    let mut list = List::five_nodes();

    list.insert(6, dec!("2.5"), None, Some(5), 100).unwrap();

    assert_eq!(list.ids(), vec![id(1), id(2), id(3), id(6), id(4), id(5)]);
}

#[test]
fn test_walk_is_bounded() {
    let mut list = List::five_nodes();

    assert_eq!(
        list.insert(6, dec!("0.5"), None, None, 2),
        Err(LedgerError::StaleInsertHint)
    );

    list.insert(6, dec!("0.5"), None, None, 4).unwrap();
    assert_eq!(list.list.last(), Some(&id(6)));
}

#[test]
fn test_insert_at_head_and_into_empty_list() {
    let mut list = List::new();
    assert!(list.list.is_empty());
    assert!(list.valid(dec!(1), None, None));

    list.insert(1, dec!(1), None, None, 0).unwrap();
    assert_eq!(list.list.first(), Some(&id(1)));
    assert_eq!(list.list.last(), Some(&id(1)));

    list.insert(2, dec!(10), None, None, 0).unwrap();
    assert_eq!(list.ids(), vec![id(2), id(1)]);
}

#[test]
fn test_equal_icrs_go_before_existing_node() {
    let mut list = List::five_nodes();

    list.insert(6, dec!(3), None, None, 100).unwrap();

    assert_eq!(list.ids(), vec![id(1), id(2), id(6), id(3), id(4), id(5)]);
    assert!(list.valid(dec!(3), Some(6), Some(3)));
}

#[test]
fn test_positions_follow_current_icr_after_a_price_move() {
    let mut list = List::five_nodes();
    // every trove halves, as after a price drop of their common collateral
    for icr in list.icrs.values_mut() {
        *icr = *icr / dec!(2);
    }

    // before the move 1.75 belonged between trove 4 and 5
    assert!(!list.valid(dec!("1.75"), Some(4), Some(5)));
    assert!(list.valid(dec!("1.75"), Some(2), Some(3)));

    list.insert(6, dec!("1.75"), Some(4), Some(5), 100).unwrap();

    assert_eq!(list.ids(), vec![id(1), id(2), id(6), id(3), id(4), id(5)]);
}

#[test]
fn test_membership_errors() {
    let mut list = List::five_nodes();

    assert_eq!(
        list.insert(1, dec!(7), None, None, 100),
        Err(LedgerError::AlreadyInList(id(1)))
    );
    assert_eq!(list.remove(9), Err(LedgerError::NotInList(id(9))));
}

#[test]
fn test_remove_updates_head_and_tail() {
    let mut list = List::five_nodes();

    list.remove(1).unwrap();
    list.remove(5).unwrap();
    list.remove(3).unwrap();

    assert_eq!(list.ids(), vec![id(2), id(4)]);
    assert_eq!(list.list.first(), Some(&id(2)));
    assert_eq!(list.list.last(), Some(&id(4)));
    assert_eq!(list.list.prev(&list.store, &id(4)), Some(id(2)));
    assert_eq!(list.list.size(), 2);
}
