//! The tight→gap spread-capture strategy (spec §4.4).
//!
//! A pure state machine over top-of-book snapshots taken once per completed
//! batch. It never touches the book beyond reading queries off it, and it
//! never fails — a blocked trade (position limits) is silently a no-trade,
//! per spec §7's "strategy-level block" taxonomy entry.

use tracing::info;

use crate::book::OrderBook;
use crate::event::{Event, EventKind, Side, STATE_END_OF_DAY};
use crate::output::Line;

/// Tunable parameters (spec §4.4); `price_tick` defaults to 10 minor-units.
#[derive(Debug, Clone, Copy)]
pub struct StrategyParams {
    pub order_qty: u64,
    pub max_pos: i64,
    pub min_pos: i64,
    pub price_tick: u32,
}

impl StrategyParams {
    pub const DEFAULT_PRICE_TICK: u32 = 10;
}

#[derive(Debug)]
pub struct Strategy {
    params: StrategyParams,
    tight_spread: i64,
    gap_spread: i64,
    position: i64,
    realized_pnl: i64,
    prev_bid: u32,
    prev_ask: u32,
    have_prev: bool,
    day_started: bool,
    day_closed: bool,
}

impl Strategy {
    pub fn new(params: StrategyParams) -> Strategy {
        let tight_spread = params.price_tick as i64;
        let gap_spread = tight_spread * 2;
        Strategy {
            params,
            tight_spread,
            gap_spread,
            position: 0,
            realized_pnl: 0,
            prev_bid: 0,
            prev_ask: 0,
            have_prev: false,
            day_started: false,
            day_closed: false,
        }
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn realized_pnl(&self) -> i64 {
        self.realized_pnl
    }

    pub fn day_closed(&self) -> bool {
        self.day_closed
    }

    /// Runs one batch through the state machine, returning the output lines
    /// it produced (spec §4.4 steps 1–6, plus the DAY START/END lines
    /// spec §6 attaches to the trading-state transitions).
    pub fn on_batch(&mut self, book: &OrderBook, batch: &[Event]) -> Vec<Line> {
        let mut lines = Vec::new();

        if !self.day_started && book.trading_open() {
            self.day_started = true;
            lines.push(Line::DayStart);
        }

        if self.day_closed {
            return lines;
        }

        let end_of_day = batch
            .iter()
            .any(|e| e.kind == EventKind::StateChange && e.state_string == STATE_END_OF_DAY);
        if end_of_day {
            lines.push(Line::DayEnd);
            lines.push(self.settle_eod(book));
            return lines;
        }

        if !book.trading_open() || !book.has_top() || !self.have_prev {
            let (bid, _) = book.best_bid();
            let (ask, _) = book.best_ask();
            self.have_prev = book.has_top();
            self.prev_bid = bid;
            self.prev_ask = ask;
            return lines;
        }

        let (curr_bid, _) = book.best_bid();
        let (curr_ask, _) = book.best_ask();
        let curr_spread = curr_ask as i64 - curr_bid as i64;
        let prev_spread = self.prev_ask as i64 - self.prev_bid as i64;
        let price_tick = self.params.price_tick as i64;

        if prev_spread == self.tight_spread && curr_spread == self.gap_spread {
            let vanished_ask = curr_bid == self.prev_bid
                && (curr_ask as i64 - self.prev_ask as i64) == price_tick;
            let vanished_bid = curr_ask == self.prev_ask
                && (self.prev_bid as i64 - curr_bid as i64) == price_tick;

            if vanished_ask {
                if let Some(line) = self.try_buy(self.prev_ask) {
                    lines.push(line);
                }
            } else if vanished_bid {
                if let Some(line) = self.try_sell(self.prev_bid) {
                    lines.push(line);
                }
            }
        }

        self.prev_bid = curr_bid;
        self.prev_ask = curr_ask;
        lines
    }

    fn try_buy(&mut self, price: u32) -> Option<Line> {
        let headroom = (self.params.max_pos - self.position).max(0) as u64;
        if headroom == 0 {
            return None;
        }
        let fill = self.params.order_qty.min(headroom);
        self.realized_pnl -= fill as i64 * price as i64;
        self.position += fill as i64;
        info!(qty = fill, price, position = self.position, "strategy BUY");
        Some(Line::Trade {
            side: Side::Buy,
            qty: fill,
            price,
            position: self.position,
            pnl: self.realized_pnl,
        })
    }

    fn try_sell(&mut self, price: u32) -> Option<Line> {
        let headroom = (self.position - self.params.min_pos).max(0) as u64;
        if headroom == 0 {
            return None;
        }
        let fill = self.params.order_qty.min(headroom);
        self.realized_pnl += fill as i64 * price as i64;
        self.position -= fill as i64;
        info!(qty = fill, price, position = self.position, "strategy SELL");
        Some(Line::Trade {
            side: Side::Sell,
            qty: fill,
            price,
            position: self.position,
            pnl: self.realized_pnl,
        })
    }

    /// Settles remaining inventory at the last execution price. Idempotent:
    /// a second call leaves `realized_pnl`/`position` unchanged (P6) but
    /// still returns a fresh `Line::Eod` reflecting current state.
    pub fn settle_eod(&mut self, book: &OrderBook) -> Line {
        if !self.day_closed {
            if self.position != 0 && book.last_exec_price() != 0 {
                self.realized_pnl += self.position * book.last_exec_price() as i64;
            }
            self.day_closed = true;
        }
        Line::Eod {
            last_exec_price: book.last_exec_price(),
            position: self.position,
            pnl: self.realized_pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn params() -> StrategyParams {
        StrategyParams {
            order_qty: 100,
            max_pos: 500,
            min_pos: 0,
            price_tick: 10,
        }
    }

    fn opened_book() -> OrderBook {
        let mut book = OrderBook::new();
        book.apply(&Event::state_change(0, 123, "P_SUREKLI_ISLEM".to_string()));
        book
    }

    #[test]
    fn p6_settlement_is_idempotent() {
        let mut strategy = Strategy::new(params());
        strategy.position = 100;
        let mut book = opened_book();
        // force last_exec_price via a real execute against a resting order
        book.apply(&Event::add_order(0, 1, 123, Side::Buy, 1, 100, 130, 1));
        book.apply(&Event::execute_order(0, 1, 123, Side::Buy, 100, 0));

        let first = strategy.settle_eod(&book);
        let pnl_after_first = strategy.realized_pnl();
        let second = strategy.settle_eod(&book);
        assert_eq!(strategy.realized_pnl(), pnl_after_first);
        assert_eq!(first, second);
    }

    #[test]
    fn p7_fills_never_breach_position_bounds() {
        let mut strategy = Strategy::new(StrategyParams {
            order_qty: 1000,
            max_pos: 150,
            min_pos: -150,
            price_tick: 10,
        });
        for _ in 0..5 {
            if let Some(line) = strategy.try_buy(100) {
                if let Line::Trade { position, .. } = line {
                    assert!(position <= 150 && position >= -150);
                }
            }
        }
        for _ in 0..5 {
            if let Some(line) = strategy.try_sell(100) {
                if let Line::Trade { position, .. } = line {
                    assert!(position <= 150 && position >= -150);
                }
            }
        }
    }

    #[test]
    fn day_start_fires_once_on_trading_open_transition() {
        let mut strategy = Strategy::new(params());
        let mut book = OrderBook::new();
        let lines = strategy.on_batch(&book, &[]);
        assert!(lines.is_empty());

        book.apply(&Event::state_change(0, 123, "P_SUREKLI_ISLEM".to_string()));
        let lines = strategy.on_batch(&book, &[]);
        assert_eq!(lines, vec![Line::DayStart]);

        let lines = strategy.on_batch(&book, &[]);
        assert!(lines.is_empty());
    }

    #[test]
    fn no_trade_when_spreads_do_not_match_tight_then_gap_pattern() {
        let mut strategy = Strategy::new(params());
        let mut book = opened_book();
        book.apply(&Event::add_order(0, 1, 123, Side::Buy, 1, 100, 100, 1));
        book.apply(&Event::add_order(0, 2, 123, Side::Sell, 1, 100, 130, 1));
        let lines = strategy.on_batch(&book, &[]);
        assert!(lines.is_empty());

        book.apply(&Event::add_order(0, 3, 123, Side::Sell, 1, 100, 140, 1));
        let lines = strategy.on_batch(&book, &[]);
        assert!(lines.iter().all(|l| !matches!(l, Line::Trade { .. })));
    }
}
