//! Per-instrument order book (spec §3, §4.2).
//!
//! Each side is a `BTreeMap<u32, PriceLevel>` keyed by price; each
//! `PriceLevel` threads its resting orders through an intrusive doubly
//! linked list carved out of a single arena of slots, so adding, executing,
//! and deleting an order are all O(1) plus the O(log P) price lookup — no
//! per-order heap allocation once the arena has warmed up. A side-agnostic
//! `order_id -> location` index (`ahash`-backed, matching the teacher's own
//! hashing choice) gives O(1) dispatch for execute/delete.

use std::collections::BTreeMap;

use ahash::AHashMap;
use tracing::warn;

use crate::event::{Event, EventKind, Side, STATE_CONTINUOUS_TRADING};

const NO_SLOT: u32 = u32::MAX;

/// Above this, an execute quantity is treated as feed noise worth a warning
/// (spec §4.2 "Warnings (non-fatal)"), though it is still applied as-is.
const MAX_SANE_EXECUTE_QUANTITY: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy)]
struct Slot {
    quantity: u64,
    ranking_seq: u32,
    ranking_time: u64,
    prev: u32,
    next: u32,
    generation: u32,
    occupied: bool,
}

impl Slot {
    fn vacant(generation: u32) -> Slot {
        Slot {
            quantity: 0,
            ranking_seq: 0,
            ranking_time: 0,
            prev: NO_SLOT,
            next: NO_SLOT,
            generation,
            occupied: false,
        }
    }
}

/// A stable reference to one resting order's slot. The generation guards
/// against a handle outliving its slot's reuse; on a correct feed this
/// should never trip, but it turns a would-be silent-corruption bug into a
/// defensive `None` (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn alloc(&mut self, quantity: u64, ranking_seq: u32, ranking_time: u64) -> OrderHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.quantity = quantity;
            slot.ranking_seq = ranking_seq;
            slot.ranking_time = ranking_time;
            slot.prev = NO_SLOT;
            slot.next = NO_SLOT;
            slot.occupied = true;
            OrderHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                quantity,
                ranking_seq,
                ranking_time,
                prev: NO_SLOT,
                next: NO_SLOT,
                generation: 0,
                occupied: true,
            });
            OrderHandle { index, generation: 0 }
        }
    }

    fn free(&mut self, handle: OrderHandle) {
        let slot = &mut self.slots[handle.index as usize];
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
    }

    fn get(&self, handle: OrderHandle) -> Option<&Slot> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.occupied && slot.generation == handle.generation).then_some(slot)
    }

    fn get_mut(&mut self, handle: OrderHandle) -> Option<&mut Slot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.occupied && slot.generation == handle.generation {
            Some(slot)
        } else {
            None
        }
    }

    fn slot(&self, index: u32) -> &Slot {
        &self.slots[index as usize]
    }

    fn slot_mut(&mut self, index: u32) -> &mut Slot {
        &mut self.slots[index as usize]
    }
}

#[derive(Debug)]
struct PriceLevel {
    head: u32,
    tail: u32,
    aggregate_quantity: u64,
    order_count: u32,
}

impl PriceLevel {
    fn new() -> PriceLevel {
        PriceLevel {
            head: NO_SLOT,
            tail: NO_SLOT,
            aggregate_quantity: 0,
            order_count: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.order_count == 0
    }
}

/// Inserts `handle` into `level`'s FIFO immediately before the first node
/// whose (ranking_time, ranking_seq) strictly exceeds `handle`'s; ties keep
/// existing order and the new order lands after them (spec §4.2).
fn insert_sorted(arena: &mut Arena, level: &mut PriceLevel, handle: OrderHandle) {
    let new_index = handle.index;
    let new_key = {
        let s = arena.slot(new_index);
        (s.ranking_time, s.ranking_seq)
    };

    let mut cursor = level.head;
    let mut insert_before = NO_SLOT;
    while cursor != NO_SLOT {
        let s = arena.slot(cursor);
        if (s.ranking_time, s.ranking_seq) > new_key {
            insert_before = cursor;
            break;
        }
        cursor = s.next;
    }

    if insert_before == NO_SLOT {
        let old_tail = level.tail;
        arena.slot_mut(new_index).prev = old_tail;
        arena.slot_mut(new_index).next = NO_SLOT;
        if old_tail == NO_SLOT {
            level.head = new_index;
        } else {
            arena.slot_mut(old_tail).next = new_index;
        }
        level.tail = new_index;
    } else {
        let before_prev = arena.slot(insert_before).prev;
        arena.slot_mut(new_index).next = insert_before;
        arena.slot_mut(new_index).prev = before_prev;
        arena.slot_mut(insert_before).prev = new_index;
        if before_prev == NO_SLOT {
            level.head = new_index;
        } else {
            arena.slot_mut(before_prev).next = new_index;
        }
    }
}

fn unlink(arena: &mut Arena, level: &mut PriceLevel, index: u32) {
    let (prev, next) = {
        let s = arena.slot(index);
        (s.prev, s.next)
    };
    if prev == NO_SLOT {
        level.head = next;
    } else {
        arena.slot_mut(prev).next = next;
    }
    if next == NO_SLOT {
        level.tail = prev;
    } else {
        arena.slot_mut(next).prev = prev;
    }
}

#[derive(Debug, Clone, Copy)]
struct OrderLocation {
    side: Side,
    price: u32,
    handle: OrderHandle,
}

fn pick_side_map<'a>(
    bids: &'a BTreeMap<u32, PriceLevel>,
    asks: &'a BTreeMap<u32, PriceLevel>,
    side: Side,
) -> Option<&'a BTreeMap<u32, PriceLevel>> {
    match side {
        Side::Buy => Some(bids),
        Side::Sell => Some(asks),
        Side::Unknown => None,
    }
}

fn pick_side_map_mut<'a>(
    bids: &'a mut BTreeMap<u32, PriceLevel>,
    asks: &'a mut BTreeMap<u32, PriceLevel>,
    side: Side,
) -> Option<&'a mut BTreeMap<u32, PriceLevel>> {
    match side {
        Side::Buy => Some(bids),
        Side::Sell => Some(asks),
        Side::Unknown => None,
    }
}

/// A single instrument's reconstructed book plus the trading-state and
/// last-trade fields the strategy reads (spec §3, §4.2).
#[derive(Debug)]
pub struct OrderBook {
    bids: BTreeMap<u32, PriceLevel>,
    asks: BTreeMap<u32, PriceLevel>,
    arena: Arena,
    order_index: AHashMap<u64, OrderLocation>,
    trading_open: bool,
    last_exec_price: u32,
}

impl OrderBook {
    pub fn new() -> OrderBook {
        OrderBook {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            arena: Arena::default(),
            order_index: AHashMap::default(),
            trading_open: false,
            last_exec_price: 0,
        }
    }

    pub fn trading_open(&self) -> bool {
        self.trading_open
    }

    pub fn last_exec_price(&self) -> u32 {
        self.last_exec_price
    }

    pub fn has_top(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    pub fn best_bid(&self) -> (u32, u64) {
        self.bids
            .iter()
            .next_back()
            .map(|(p, l)| (*p, l.aggregate_quantity))
            .unwrap_or((0, 0))
    }

    pub fn best_ask(&self) -> (u32, u64) {
        self.asks
            .iter()
            .next()
            .map(|(p, l)| (*p, l.aggregate_quantity))
            .unwrap_or((0, 0))
    }

    /// Up to `n` (price, aggregate quantity) pairs per side, bids from best
    /// (highest) down, asks from best (lowest) up, skipping any level whose
    /// aggregate has drained to zero.
    pub fn snapshot_n(&self, n: usize) -> (Vec<(u32, u64)>, Vec<(u32, u64)>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .filter(|(_, l)| l.aggregate_quantity != 0)
            .take(n)
            .map(|(p, l)| (*p, l.aggregate_quantity))
            .collect();
        let asks = self
            .asks
            .iter()
            .filter(|(_, l)| l.aggregate_quantity != 0)
            .take(n)
            .map(|(p, l)| (*p, l.aggregate_quantity))
            .collect();
        (bids, asks)
    }

    pub fn order_index_len(&self) -> usize {
        self.order_index.len()
    }

    pub fn total_order_count(&self) -> u32 {
        self.bids.values().map(|l| l.order_count).sum::<u32>()
            + self.asks.values().map(|l| l.order_count).sum::<u32>()
    }

    pub fn apply(&mut self, event: &Event) {
        match event.kind {
            EventKind::StateChange => self.apply_state_change(event),
            EventKind::AddOrder => self.apply_add(event),
            EventKind::ExecuteOrder => self.apply_execute(event),
            EventKind::DeleteOrder => self.apply_delete(event),
            EventKind::Other => {}
        }
    }

    fn apply_state_change(&mut self, event: &Event) {
        self.trading_open = event.state_string == STATE_CONTINUOUS_TRADING;
    }

    fn apply_add(&mut self, event: &Event) {
        if event.side == Side::Unknown {
            warn!(order_id = event.order_id, "add order with unknown side, ignoring");
            return;
        }
        if self.order_index.contains_key(&event.order_id) {
            warn!(order_id = event.order_id, "duplicate add order id, rejecting");
            return;
        }
        if event.price == 0 {
            warn!(order_id = event.order_id, "add order with zero price");
        }
        if event.quantity == 0 {
            warn!(order_id = event.order_id, "add order with zero quantity");
        }

        let handle = self
            .arena
            .alloc(event.quantity, event.ranking_seq, event.ranking_time);
        let side_map = pick_side_map_mut(&mut self.bids, &mut self.asks, event.side)
            .expect("unknown side already rejected above");
        let level = side_map.entry(event.price).or_insert_with(PriceLevel::new);
        insert_sorted(&mut self.arena, level, handle);
        level.aggregate_quantity += event.quantity;
        level.order_count += 1;

        self.order_index.insert(
            event.order_id,
            OrderLocation {
                side: event.side,
                price: event.price,
                handle,
            },
        );
    }

    fn apply_execute(&mut self, event: &Event) {
        if event.quantity == 0 {
            warn!(order_id = event.order_id, "execute with zero quantity");
        } else if event.quantity > MAX_SANE_EXECUTE_QUANTITY {
            warn!(
                order_id = event.order_id,
                quantity = event.quantity,
                "execute with suspiciously large quantity"
            );
        }

        let location = match self.order_index.get(&event.order_id).copied() {
            Some(loc) => loc,
            None => {
                warn!(order_id = event.order_id, "execute for unknown order id");
                return;
            }
        };

        let remaining = match self.arena.get(location.handle) {
            Some(s) => s.quantity,
            None => {
                warn!(order_id = event.order_id, "execute: stale order handle, dropping index entry");
                self.order_index.remove(&event.order_id);
                return;
            }
        };

        let side_map = pick_side_map_mut(&mut self.bids, &mut self.asks, location.side)
            .expect("indexed order always has a concrete side");
        let level = match side_map.get_mut(&location.price) {
            Some(l) => l,
            None => {
                warn!(order_id = event.order_id, "execute: price level missing for indexed order");
                self.order_index.remove(&event.order_id);
                return;
            }
        };

        if event.quantity >= remaining {
            unlink(&mut self.arena, level, location.handle.index);
            self.arena.free(location.handle);
            debug_assert!(
                level.aggregate_quantity >= remaining,
                "level aggregate {} below removed order's own quantity {}",
                level.aggregate_quantity,
                remaining
            );
            debug_assert!(level.order_count >= 1, "order_count underflow on execute");
            level.aggregate_quantity = level.aggregate_quantity.saturating_sub(remaining);
            level.order_count = level.order_count.saturating_sub(1);
            self.order_index.remove(&event.order_id);
        } else {
            let slot = self
                .arena
                .get_mut(location.handle)
                .expect("handle validated above");
            slot.quantity -= event.quantity;
            debug_assert!(
                level.aggregate_quantity >= event.quantity,
                "level aggregate {} below executed quantity {}",
                level.aggregate_quantity,
                event.quantity
            );
            level.aggregate_quantity = level.aggregate_quantity.saturating_sub(event.quantity);
        }

        self.normalize_empty_level(location.side, location.price);
        self.last_exec_price = if event.price != 0 { event.price } else { location.price };
    }

    fn apply_delete(&mut self, event: &Event) {
        let location = match self.order_index.remove(&event.order_id) {
            Some(loc) => loc,
            None => {
                warn!(order_id = event.order_id, "delete for unknown order id");
                return;
            }
        };

        let remaining = self.arena.get(location.handle).map(|s| s.quantity).unwrap_or(0);
        let side_map = pick_side_map_mut(&mut self.bids, &mut self.asks, location.side)
            .expect("indexed order always has a concrete side");
        match side_map.get_mut(&location.price) {
            Some(level) => {
                unlink(&mut self.arena, level, location.handle.index);
                debug_assert!(
                    level.aggregate_quantity >= remaining,
                    "level aggregate {} below deleted order's own quantity {}",
                    level.aggregate_quantity,
                    remaining
                );
                debug_assert!(level.order_count >= 1, "order_count underflow on delete");
                level.aggregate_quantity = level.aggregate_quantity.saturating_sub(remaining);
                level.order_count = level.order_count.saturating_sub(1);
            }
            None => {
                warn!(order_id = event.order_id, "delete: price level missing for indexed order");
            }
        }
        self.arena.free(location.handle);
        self.normalize_empty_level(location.side, location.price);
    }

    /// Erases a level once its order count hits zero, coercing a stale
    /// nonzero aggregate to zero first (documented behavior, DESIGN.md).
    fn normalize_empty_level(&mut self, side: Side, price: u32) {
        let side_map = match pick_side_map_mut(&mut self.bids, &mut self.asks, side) {
            Some(m) => m,
            None => return,
        };
        if let Some(level) = side_map.get_mut(&price) {
            if level.is_empty() {
                if level.aggregate_quantity != 0 {
                    debug_assert!(
                        level.aggregate_quantity == 0,
                        "empty level {price} has stale nonzero aggregate {}",
                        level.aggregate_quantity
                    );
                    warn!(
                        price,
                        stale_quantity = level.aggregate_quantity,
                        "empty price level had nonzero aggregate quantity, coercing to zero"
                    );
                    level.aggregate_quantity = 0;
                }
                side_map.remove(&price);
            }
        }
    }
}

impl Default for OrderBook {
    fn default() -> OrderBook {
        OrderBook::new()
    }
}

#[cfg(test)]
impl OrderBook {
    fn fifo_quantity_sum(&self, side: Side, price: u32) -> u64 {
        let side_map = pick_side_map(&self.bids, &self.asks, side).expect("concrete side in test");
        let level = match side_map.get(&price) {
            Some(l) => l,
            None => return 0,
        };
        let mut sum = 0u64;
        let mut cursor = level.head;
        while cursor != NO_SLOT {
            let s = self.arena.slot(cursor);
            sum += s.quantity;
            cursor = s.next;
        }
        sum
    }

    fn fifo_len(&self, side: Side, price: u32) -> usize {
        let side_map = pick_side_map(&self.bids, &self.asks, side).expect("concrete side in test");
        let level = match side_map.get(&price) {
            Some(l) => l,
            None => return 0,
        };
        let mut count = 0usize;
        let mut cursor = level.head;
        while cursor != NO_SLOT {
            count += 1;
            cursor = self.arena.slot(cursor).next;
        }
        count
    }

    fn fifo_keys(&self, side: Side, price: u32) -> Vec<(u64, u32)> {
        let side_map = pick_side_map(&self.bids, &self.asks, side).expect("concrete side in test");
        let level = match side_map.get(&price) {
            Some(l) => l,
            None => return Vec::new(),
        };
        let mut keys = Vec::new();
        let mut cursor = level.head;
        while cursor != NO_SLOT {
            let s = self.arena.slot(cursor);
            keys.push((s.ranking_time, s.ranking_seq));
            cursor = s.next;
        }
        keys
    }
}
