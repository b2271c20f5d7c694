//! Command-line configuration (spec §6's "CLI surface" external collaborator).
//!
//! `clap` derive, following the `#[derive(Parser)]` convention used
//! throughout `cooprefr-bettersys/rust-backend`'s binaries — replaces the
//! teacher's hand-rolled `--flag=value` loop that used to live here.

use std::path::PathBuf;

use clap::Parser;

use crate::strategy::StrategyParams;

#[derive(Debug, Parser)]
#[command(
    name = "spreadwatch",
    about = "Replays a framed order-entry feed and runs the tight-to-gap spread capture strategy"
)]
pub struct Config {
    /// Path to the framed feed file to replay.
    pub input: PathBuf,

    /// Instrument id to track; events for any other instrument are ignored.
    #[arg(long, default_value_t = 123)]
    pub instrument: u32,

    /// Suppress the per-batch line; [DAY START]/[DAY END]/[TRADE]/[FINAL] stay unconditional.
    #[arg(short, long)]
    pub quiet: bool,

    #[arg(long, default_value_t = 100)]
    pub order_qty: u64,

    #[arg(long, default_value_t = 500)]
    pub max_pos: i64,

    #[arg(long, default_value_t = 0)]
    pub min_pos: i64,

    #[arg(long, default_value_t = StrategyParams::DEFAULT_PRICE_TICK)]
    pub price_tick: u32,
}

impl Config {
    pub fn strategy_params(&self) -> StrategyParams {
        StrategyParams {
            order_qty: self.order_qty,
            max_pos: self.max_pos,
            min_pos: self.min_pos,
            price_tick: self.price_tick,
        }
    }
}
