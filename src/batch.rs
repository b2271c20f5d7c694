//! The pull-based driver loop (spec §4.3): decode packets, filter to the
//! target instrument, batch consecutive same-nanosecond events, apply each
//! to the book before handing the completed batch to the strategy.
//!
//! Owns exactly one `Decoder`, one `OrderBook`, and one `Strategy` for the
//! run (spec §9: "the driver instantiates exactly one book and one
//! strategy"), generalizing the top-level `loop { }` shape of the teacher's
//! `main.rs` into a self-contained, testable driver.

use std::io::{self, Read, Write};

use crate::book::OrderBook;
use crate::decoder::Decoder;
use crate::event::{Event, EventKind, STATE_END_OF_DAY};
use crate::output::{write_line, Line};
use crate::strategy::{Strategy, StrategyParams};

pub struct BatchLoop<R> {
    decoder: Decoder<R>,
    book: OrderBook,
    strategy: Strategy,
    target_instrument: u32,
    current_batch: Vec<Event>,
    current_ns: u32,
    have_batch: bool,
    terminated: bool,
    batches: u64,
    messages: u64,
}

impl<R: Read> BatchLoop<R> {
    pub fn new(reader: R, target_instrument: u32, strategy_params: StrategyParams) -> Self {
        BatchLoop {
            decoder: Decoder::new(reader),
            book: OrderBook::new(),
            strategy: Strategy::new(strategy_params),
            target_instrument,
            current_batch: Vec::new(),
            current_ns: 0,
            have_batch: false,
            terminated: false,
            batches: 0,
            messages: 0,
        }
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    /// Runs to input exhaustion (or early termination on the end-of-day
    /// sentinel), writing every produced line to `out`. Returns once the
    /// final `[FINAL]` line has been written.
    pub fn run<W: Write>(&mut self, out: &mut W, quiet: bool) -> io::Result<()> {
        'outer: while let Some(events) = self.decoder.next_packet() {
            for event in events {
                if event.instrument_id != self.target_instrument {
                    continue;
                }

                if !self.have_batch || event.nanosec != self.current_ns {
                    self.flush(out, quiet)?;
                    self.current_ns = event.nanosec;
                    self.have_batch = true;
                }

                self.book.apply(&event);
                self.messages += 1;

                let is_end_of_day =
                    event.kind == EventKind::StateChange && event.state_string == STATE_END_OF_DAY;
                self.current_batch.push(event);

                if is_end_of_day {
                    self.flush(out, quiet)?;
                    self.terminated = true;
                    break 'outer;
                }
            }
        }

        if !self.terminated {
            self.flush(out, quiet)?;
        }

        let final_line = Line::Final {
            batches: self.batches,
            messages: self.messages,
            position: self.strategy.position(),
            pnl: self.strategy.realized_pnl(),
        };
        write_line(out, &final_line, quiet)
    }

    fn flush<W: Write>(&mut self, out: &mut W, quiet: bool) -> io::Result<()> {
        if self.current_batch.is_empty() {
            return Ok(());
        }
        let ns = self.current_ns;
        let event_count = self.current_batch.len();
        let batch = std::mem::take(&mut self.current_batch);

        for line in self.strategy.on_batch(&self.book, &batch) {
            write_line(out, &line, quiet)?;
        }

        let (bid_price, bid_qty) = self.book.best_bid();
        let (ask_price, ask_qty) = self.book.best_ask();
        write_line(
            out,
            &Line::Batch {
                ns,
                event_count,
                bid_price,
                bid_qty,
                ask_price,
                ask_qty,
            },
            quiet,
        )?;

        self.batches += 1;
        Ok(())
    }
}
