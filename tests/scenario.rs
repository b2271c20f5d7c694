//! End-to-end scenarios driven through the real decoder/book/batch/strategy
//! pipeline — the six literal scenarios and boundary cases from spec §8.

use std::io::Cursor;

use spreadwatch::batch::BatchLoop;
use spreadwatch::event::Side as WireSide;
use spreadwatch::strategy::StrategyParams;

fn header(count: u16) -> Vec<u8> {
    let mut h = vec![0u8; 20];
    h[0..10].copy_from_slice(b"SESSION001");
    h[10..18].copy_from_slice(&1u64.to_be_bytes());
    h[18..20].copy_from_slice(&count.to_be_bytes());
    h
}

fn framed(msg: &[u8]) -> Vec<u8> {
    let mut out = (msg.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(msg);
    out
}

fn state_msg(ns: u32, instrument: u32, state: &str) -> Vec<u8> {
    let mut m = vec![b'O'];
    m.extend_from_slice(&ns.to_be_bytes());
    m.extend_from_slice(&instrument.to_be_bytes());
    let mut padded = state.as_bytes().to_vec();
    padded.resize(20, b' ');
    m.extend_from_slice(&padded);
    m
}

#[allow(clippy::too_many_arguments)]
fn add_msg(
    ns: u32,
    order_id: u64,
    instrument: u32,
    side: WireSide,
    seq: u32,
    qty: u64,
    price: u32,
    rtime: u64,
) -> Vec<u8> {
    let mut m = vec![b'A'];
    m.extend_from_slice(&ns.to_be_bytes());
    m.extend_from_slice(&order_id.to_be_bytes());
    m.extend_from_slice(&instrument.to_be_bytes());
    m.push(if side == WireSide::Buy { b'B' } else { b'S' });
    m.extend_from_slice(&seq.to_be_bytes());
    m.extend_from_slice(&qty.to_be_bytes());
    m.extend_from_slice(&price.to_be_bytes());
    m.extend_from_slice(&[0u8; 2]);
    m.push(0);
    m.extend_from_slice(&rtime.to_be_bytes());
    m
}

fn execute_msg(ns: u32, order_id: u64, instrument: u32, side: WireSide, qty: u64) -> Vec<u8> {
    let mut m = vec![b'E'];
    m.extend_from_slice(&ns.to_be_bytes());
    m.extend_from_slice(&order_id.to_be_bytes());
    m.extend_from_slice(&instrument.to_be_bytes());
    m.push(if side == WireSide::Buy { b'B' } else { b'S' });
    m.extend_from_slice(&qty.to_be_bytes());
    m
}

fn delete_msg(ns: u32, order_id: u64, instrument: u32, side: WireSide) -> Vec<u8> {
    let mut m = vec![b'D'];
    m.extend_from_slice(&ns.to_be_bytes());
    m.extend_from_slice(&order_id.to_be_bytes());
    m.extend_from_slice(&instrument.to_be_bytes());
    m.push(if side == WireSide::Buy { b'B' } else { b'S' });
    m
}

fn packet(messages: &[Vec<u8>]) -> Vec<u8> {
    let mut p = header(messages.len() as u16);
    for m in messages {
        p.extend(framed(m));
    }
    p
}

fn default_params() -> StrategyParams {
    StrategyParams {
        order_qty: 100,
        max_pos: 500,
        min_pos: 0,
        price_tick: 10,
    }
}

#[test]
fn scenario_1_tight_seed_produces_no_trade() {
    let stream = packet(&[
        state_msg(100, 123, "P_SUREKLI_ISLEM"),
        add_msg(100, 1, 123, WireSide::Buy, 1, 1000, 100, 1),
        add_msg(100, 2, 123, WireSide::Buy, 1, 1000, 90, 2),
        add_msg(100, 3, 123, WireSide::Sell, 1, 1000, 110, 3),
        add_msg(100, 4, 123, WireSide::Sell, 1, 1000, 120, 4),
    ]);

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert_eq!(run.book().best_bid(), (100, 1000));
    assert_eq!(run.book().best_ask(), (110, 1000));
    assert_eq!(run.strategy().position(), 0);
    assert_eq!(run.strategy().realized_pnl(), 0);
}

#[test]
fn scenario_2_vanished_ask_triggers_buy() {
    let mut stream = packet(&[
        state_msg(100, 123, "P_SUREKLI_ISLEM"),
        add_msg(100, 1, 123, WireSide::Buy, 1, 1000, 100, 1),
        add_msg(100, 2, 123, WireSide::Buy, 1, 1000, 90, 2),
        add_msg(100, 3, 123, WireSide::Sell, 1, 1000, 110, 3),
        add_msg(100, 4, 123, WireSide::Sell, 1, 1000, 120, 4),
    ]);
    stream.extend(packet(&[execute_msg(110, 3, 123, WireSide::Sell, 1000)]));

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert_eq!(run.book().best_bid(), (100, 1000));
    assert_eq!(run.book().best_ask(), (120, 1000));
    assert_eq!(run.strategy().position(), 100);
    assert_eq!(run.strategy().realized_pnl(), -11_000);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[TRADE] BUY 100 @ 110 pos=100 pnl=-11000"));
}

#[test]
fn scenario_3_retighten_produces_no_trade() {
    let mut stream = packet(&[
        state_msg(100, 123, "P_SUREKLI_ISLEM"),
        add_msg(100, 1, 123, WireSide::Buy, 1, 1000, 100, 1),
        add_msg(100, 2, 123, WireSide::Buy, 1, 1000, 90, 2),
        add_msg(100, 3, 123, WireSide::Sell, 1, 1000, 110, 3),
        add_msg(100, 4, 123, WireSide::Sell, 1, 1000, 120, 4),
    ]);
    stream.extend(packet(&[execute_msg(110, 3, 123, WireSide::Sell, 1000)]));
    stream.extend(packet(&[add_msg(120, 5, 123, WireSide::Sell, 1, 1000, 110, 5)]));

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert_eq!(run.book().best_bid(), (100, 1000));
    assert_eq!(run.book().best_ask(), (110, 1000));
    // position unchanged since the retighten batch (ns=120)
    assert_eq!(run.strategy().position(), 100);
}

#[test]
fn scenario_4_phantom_same_nanosecond_exec_and_add_produces_no_extra_trade() {
    let mut stream = packet(&[
        state_msg(100, 123, "P_SUREKLI_ISLEM"),
        add_msg(100, 1, 123, WireSide::Buy, 1, 1000, 100, 1),
        add_msg(100, 2, 123, WireSide::Buy, 1, 1000, 90, 2),
        add_msg(100, 3, 123, WireSide::Sell, 1, 1000, 110, 3),
        add_msg(100, 4, 123, WireSide::Sell, 1, 1000, 120, 4),
    ]);
    stream.extend(packet(&[execute_msg(110, 3, 123, WireSide::Sell, 1000)]));
    stream.extend(packet(&[add_msg(120, 5, 123, WireSide::Sell, 1, 1000, 110, 5)]));
    // same-ns execute then re-add at the same price
    stream.extend(packet(&[
        execute_msg(130, 5, 123, WireSide::Sell, 1000),
        add_msg(130, 6, 123, WireSide::Sell, 1, 1000, 110, 6),
    ]));

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert_eq!(run.book().best_bid(), (100, 1000));
    assert_eq!(run.book().best_ask(), (110, 1000));
    // still just the one fill from scenario 2 — the phantom batch traded nothing
    assert_eq!(run.strategy().position(), 100);
    assert_eq!(run.strategy().realized_pnl(), -11_000);
}

#[test]
fn scenario_5_vanished_bid_triggers_sell() {
    let mut stream = packet(&[
        state_msg(100, 123, "P_SUREKLI_ISLEM"),
        add_msg(100, 1, 123, WireSide::Buy, 1, 1000, 100, 1),
        add_msg(100, 2, 123, WireSide::Buy, 1, 1000, 90, 2),
        add_msg(100, 3, 123, WireSide::Sell, 1, 1000, 110, 3),
        add_msg(100, 4, 123, WireSide::Sell, 1, 1000, 120, 4),
    ]);
    stream.extend(packet(&[execute_msg(110, 3, 123, WireSide::Sell, 1000)]));
    stream.extend(packet(&[add_msg(120, 5, 123, WireSide::Sell, 1, 1000, 110, 5)]));
    stream.extend(packet(&[
        execute_msg(130, 5, 123, WireSide::Sell, 1000),
        add_msg(130, 6, 123, WireSide::Sell, 1, 1000, 110, 6),
    ]));
    // clean step-up to bid=120/ask=130: retire the 100/110 resting orders that
    // would otherwise cross, in the same batch as the new top-of-book orders.
    stream.extend(packet(&[
        delete_msg(140, 1, 123, WireSide::Buy),
        add_msg(140, 7, 123, WireSide::Buy, 1, 1000, 120, 7),
        delete_msg(140, 6, 123, WireSide::Sell),
        delete_msg(140, 4, 123, WireSide::Sell),
        add_msg(140, 8, 123, WireSide::Sell, 1, 1000, 130, 8),
    ]));
    // a fallback bid one tick below, so the vanishing top bid leaves exactly
    // a one-tick gap rather than falling through to order 2's stale 90.
    stream.extend(packet(&[add_msg(150, 9, 123, WireSide::Buy, 1, 1000, 110, 9)]));

    // now best_bid=120, best_ask=130 (tight spread 10); execute the bid fully
    stream.extend(packet(&[execute_msg(160, 7, 123, WireSide::Buy, 1000)]));

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert_eq!(run.book().best_bid(), (110, 1000));
    assert_eq!(run.book().best_ask(), (130, 1000));
    // scenario 2's buy (+100) then this sell (-100) nets position back to 0
    assert_eq!(run.strategy().position(), 0);
    assert_eq!(run.strategy().realized_pnl(), -11_000 + 100 * 120);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains(&format!(
        "[TRADE] SELL 100 @ 120 pos=0 pnl={}",
        -11_000 + 100 * 120
    )));
}

#[test]
fn scenario_6_end_of_day_settles_open_position() {
    let mut stream = packet(&[
        state_msg(100, 123, "P_SUREKLI_ISLEM"),
        add_msg(100, 1, 123, WireSide::Buy, 1, 1000, 100, 1),
        add_msg(100, 2, 123, WireSide::Buy, 1, 1000, 90, 2),
        add_msg(100, 3, 123, WireSide::Sell, 1, 1000, 110, 3),
        add_msg(100, 4, 123, WireSide::Sell, 1, 1000, 120, 4),
    ]);
    stream.extend(packet(&[execute_msg(110, 3, 123, WireSide::Sell, 1000)]));
    // execute against the order resting at 130 so last_exec_price becomes 130
    stream.extend(packet(&[add_msg(120, 9, 123, WireSide::Sell, 1, 1000, 130, 9)]));
    stream.extend(packet(&[execute_msg(125, 9, 123, WireSide::Sell, 1000)]));
    stream.extend(packet(&[state_msg(200, 123, "P_MARJ_YAYIN_KAPANIS")]));

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert!(run.strategy().day_closed());
    assert_eq!(run.strategy().position(), 100);
    assert_eq!(run.strategy().realized_pnl(), -11_000 + 100 * 130);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[DAY END] Market closed."));
    assert!(text.contains(&format!(
        "[EOD] Close. last_exec_price=130 final_pos=100 final_pnl={}",
        -11_000 + 100 * 130
    )));
}

#[test]
fn boundary_empty_input_yields_zero_everything() {
    let mut run = BatchLoop::new(Cursor::new(Vec::<u8>::new()), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert_eq!(run.batches(), 0);
    assert_eq!(run.messages(), 0);
    assert_eq!(run.strategy().position(), 0);
    assert_eq!(run.strategy().realized_pnl(), 0);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[FINAL] batches=0 msgs=0 pos=0 pnl=0 converted to TL: 0.00 TL)"));
}

#[test]
fn boundary_add_then_delete_leaves_book_and_index_empty() {
    let stream = packet(&[
        add_msg(100, 1, 123, WireSide::Buy, 1, 1000, 100, 1),
        delete_msg(100, 1, 123, WireSide::Buy),
    ]);

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert!(!run.book().has_top());
    assert_eq!(run.book().order_index_len(), 0);
}

#[test]
fn boundary_execute_quantity_exceeding_remaining_is_full_removal() {
    let stream = packet(&[
        add_msg(100, 1, 123, WireSide::Buy, 1, 500, 100, 1),
        execute_msg(100, 1, 123, WireSide::Buy, 10_000),
    ]);

    let mut run = BatchLoop::new(Cursor::new(stream), 123, default_params());
    let mut out = Vec::new();
    run.run(&mut out, true).unwrap();

    assert_eq!(run.book().best_bid(), (0, 0));
    assert_eq!(run.book().order_index_len(), 0);
}
