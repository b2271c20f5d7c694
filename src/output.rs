//! Renders the fixed-text output lines (spec §6) to a generic sink.
//!
//! Kept separate from `strategy.rs` so the state machine stays pure data in,
//! lines out — generalizes the small formatting helpers in the teacher's
//! `text_output_tool.rs` to write through an injected `Write` instead of
//! going straight to `println!`, so tests can capture what would be printed.

use std::io::{self, Write};

use crate::event::Side;

/// One renderable output line. Trade lines carry `Side::Buy`/`Side::Sell`
/// only — the strategy never constructs a trade with `Side::Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    DayStart,
    DayEnd,
    Trade {
        side: Side,
        qty: u64,
        price: u32,
        position: i64,
        pnl: i64,
    },
    Eod {
        last_exec_price: u32,
        position: i64,
        pnl: i64,
    },
    /// The per-batch verbose line, suppressed by `--quiet` (spec §6,
    /// concrete format supplemented in SPEC_FULL.md §6).
    Batch {
        ns: u32,
        event_count: usize,
        bid_price: u32,
        bid_qty: u64,
        ask_price: u32,
        ask_qty: u64,
    },
    Final {
        batches: u64,
        messages: u64,
        position: i64,
        pnl: i64,
    },
}

impl Line {
    /// Whether this line is suppressed under `--quiet` (spec §6: only the
    /// per-batch line is quiet-gated; everything else is unconditional).
    pub fn is_quiet_gated(&self) -> bool {
        matches!(self, Line::Batch { .. })
    }
}

pub fn render(line: &Line) -> String {
    match line {
        Line::DayStart => "[DAY START] Continuous trading begins.".to_string(),
        Line::DayEnd => "[DAY END] Market closed.".to_string(),
        Line::Trade {
            side,
            qty,
            price,
            position,
            pnl,
        } => {
            let verb = match side {
                Side::Buy => "BUY",
                Side::Sell => "SELL",
                Side::Unknown => "UNKNOWN",
            };
            format!("[TRADE] {verb} {qty} @ {price} pos={position} pnl={pnl}")
        }
        Line::Eod {
            last_exec_price,
            position,
            pnl,
        } => {
            format!(
                "[EOD] Close. last_exec_price={last_exec_price} final_pos={position} final_pnl={pnl}"
            )
        }
        Line::Batch {
            ns,
            event_count,
            bid_price,
            bid_qty,
            ask_price,
            ask_qty,
        } => {
            format!(
                "[BATCH] ns={ns} events={event_count} bid={bid_price}x{bid_qty} ask={ask_price}x{ask_qty}"
            )
        }
        Line::Final {
            batches,
            messages,
            position,
            pnl,
        } => {
            let tl = *pnl as f64 / 1000.0;
            format!(
                "[FINAL] batches={batches} msgs={messages} pos={position} pnl={pnl} converted to TL: {tl:.2} TL)"
            )
        }
    }
}

/// Writes `line` followed by a newline to `out`, honoring `quiet` for the
/// lines spec §6 says `--quiet` suppresses.
pub fn write_line<W: Write>(out: &mut W, line: &Line, quiet: bool) -> io::Result<()> {
    if quiet && line.is_quiet_gated() {
        return Ok(());
    }
    writeln!(out, "{}", render(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_line_matches_literal_format() {
        let line = Line::Trade {
            side: Side::Buy,
            qty: 100,
            price: 110,
            position: 100,
            pnl: -11_000,
        };
        assert_eq!(render(&line), "[TRADE] BUY 100 @ 110 pos=100 pnl=-11000");
    }

    #[test]
    fn final_line_converts_pnl_to_tl() {
        let line = Line::Final {
            batches: 3,
            messages: 10,
            position: 100,
            pnl: 13_000,
        };
        assert_eq!(
            render(&line),
            "[FINAL] batches=3 msgs=10 pos=100 pnl=13000 converted to TL: 13.00 TL)"
        );
    }

    #[test]
    fn batch_line_is_quiet_gated_others_are_not() {
        let mut buf = Vec::new();
        write_line(&mut buf, &Line::DayStart, true).unwrap();
        assert!(!buf.is_empty());

        let mut buf = Vec::new();
        write_line(
            &mut buf,
            &Line::Batch {
                ns: 1,
                event_count: 1,
                bid_price: 1,
                bid_qty: 1,
                ask_price: 1,
                ask_qty: 1,
            },
            true,
        )
        .unwrap();
        assert!(buf.is_empty());
    }
}
