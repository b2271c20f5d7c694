//! Framed binary protocol decoder (spec §4.1).
//!
//! Wire format: a 20-byte packet header (10-byte session id, 8-byte
//! big-endian sequence number, 2-byte big-endian message count) followed by
//! `count` length-prefixed messages. All multi-byte integers are
//! big-endian. The decoder never panics on malformed input: it discards
//! unrecoverable packets and marks undersized messages as `Other`,
//! continuing with whatever comes next in the stream (spec §4.1, §4.5).

use std::io::{self, Read};

use tracing::warn;

use crate::event::{Event, Side};

/// Per-message length prefix is 16 bits, so no single message can exceed this.
pub const MAX_MESSAGE_LENGTH: usize = 65_535;

const SESSION_ID_LEN: usize = 10;
const HEADER_LEN: usize = SESSION_ID_LEN + 8 + 2;
const MAX_MESSAGE_COUNT: u16 = 10_000;

/// Reads framed packets off a byte source and decodes them into [`Event`]s.
pub struct Decoder<R> {
    reader: R,
    /// Reused across calls; resized up as needed but never shrunk below
    /// `MAX_MESSAGE_LENGTH`, so steady-state operation allocates nothing.
    scratch: Vec<u8>,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Decoder {
            reader,
            scratch: vec![0u8; MAX_MESSAGE_LENGTH],
        }
    }

    /// Reads and decodes the next packet's worth of events.
    ///
    /// Returns `None` on a clean end-of-source (no bytes available where a
    /// header was expected). Returns `Some(events)` for every packet that
    /// was at least partially read, where `events` may be empty (a
    /// discarded packet, e.g. a bad message count) — the driver must keep
    /// pulling in that case, it is not end-of-stream.
    pub fn next_packet(&mut self) -> Option<Vec<Event>> {
        let mut header = [0u8; HEADER_LEN];
        if !self.read_full(&mut header) {
            return None;
        }

        let count = u16::from_be_bytes([header[18], header[19]]);
        if count == 0 || count > MAX_MESSAGE_COUNT {
            warn!(count, "discarding packet with out-of-range message count");
            return Some(Vec::new());
        }

        let mut events = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut len_prefix = [0u8; 2];
            if !self.read_full(&mut len_prefix) {
                warn!("short read on message length prefix, truncating packet");
                break;
            }
            let len = u16::from_be_bytes(len_prefix) as usize;
            if len < 1 {
                warn!("zero-length message, truncating packet");
                break;
            }

            if self.scratch.len() < len {
                self.scratch.resize(len, 0);
            }
            let body = &mut self.scratch[..len];
            if !read_full(&mut self.reader, body) {
                warn!(len, "short read on message payload, truncating packet");
                break;
            }

            events.push(decode_message(body));
        }

        Some(events)
    }

    /// Reads exactly `buf.len()` bytes. Returns `false` on any short read,
    /// including a clean EOF with zero bytes consumed.
    fn read_full(&mut self, buf: &mut [u8]) -> bool {
        read_full(&mut self.reader, buf)
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> bool {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return false,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return false,
        }
    }
    true
}

/// Decodes a single message body (kind byte + payload) into an [`Event`].
/// An unrecognized kind byte, or a payload too short for its kind, yields
/// `Event::other()` rather than failing the whole packet (spec §4.1).
fn decode_message(body: &[u8]) -> Event {
    if body.is_empty() {
        return Event::other();
    }
    match body[0] {
        b'O' => decode_state(body).unwrap_or_else(Event::other),
        b'A' => decode_add(body).unwrap_or_else(Event::other),
        b'E' => decode_execute(body).unwrap_or_else(Event::other),
        b'D' => decode_delete(body).unwrap_or_else(Event::other),
        _ => Event::other(),
    }
}

// Layouts below are offsets *after* the 1-byte kind discriminator (spec §4.1).

fn decode_state(body: &[u8]) -> Option<Event> {
    // ns(4) instrument(4) state(20, space-padded)
    const LEN: usize = 1 + 4 + 4 + 20;
    if body.len() < LEN {
        return None;
    }
    let ns = be_u32(body, 1);
    let instrument_id = be_u32(body, 5);
    let raw_state = &body[9..29];
    let state_string = trim_trailing_spaces(raw_state);
    Some(Event::state_change(ns, instrument_id, state_string))
}

fn decode_add(body: &[u8]) -> Option<Event> {
    // ns(4) order_id(8) instrument(4) side(1) ranking_seq(4) quantity(8)
    // price(4) attrs(2, skipped) lot_type(1, skipped) ranking_time(8)
    const LEN: usize = 1 + 4 + 8 + 4 + 1 + 4 + 8 + 4 + 2 + 1 + 8;
    if body.len() < LEN {
        return None;
    }
    let ns = be_u32(body, 1);
    let order_id = be_u64(body, 5);
    let instrument_id = be_u32(body, 13);
    let side = Side::from_byte(body[17]);
    let ranking_seq = be_u32(body, 18);
    let quantity = be_u64(body, 22);
    let price = be_u32(body, 30);
    // body[34..36] attrs, body[36] lot_type: skipped, not part of the event model.
    let ranking_time = be_u64(body, 37);
    Some(Event::add_order(
        ns,
        order_id,
        instrument_id,
        side,
        ranking_seq,
        quantity,
        price,
        ranking_time,
    ))
}

fn decode_execute(body: &[u8]) -> Option<Event> {
    // ns(4) order_id(8) instrument(4) side(1) quantity(8)
    // An extended variant may follow (match_id(8) combo(4) reserved(7) reserved(7)),
    // carrying no fields our event model represents; present or not, it is
    // simply ignored. Executes always report at the resting order's price
    // (spec §4.2: book.apply falls back to the order's own price when the
    // event carries zero), so no price field is decoded here.
    const LEN: usize = 1 + 4 + 8 + 4 + 1 + 8;
    if body.len() < LEN {
        return None;
    }
    let ns = be_u32(body, 1);
    let order_id = be_u64(body, 5);
    let instrument_id = be_u32(body, 13);
    let side = Side::from_byte(body[17]);
    let quantity = be_u64(body, 18);
    Some(Event::execute_order(
        ns,
        order_id,
        instrument_id,
        side,
        quantity,
        0,
    ))
}

fn decode_delete(body: &[u8]) -> Option<Event> {
    // ns(4) order_id(8) instrument(4) side(1)
    const LEN: usize = 1 + 4 + 8 + 4 + 1;
    if body.len() < LEN {
        return None;
    }
    let ns = be_u32(body, 1);
    let order_id = be_u64(body, 5);
    let instrument_id = be_u32(body, 13);
    let side = Side::from_byte(body[17]);
    Some(Event::delete_order(ns, order_id, instrument_id, side))
}

fn trim_trailing_spaces(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[inline]
fn be_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
}

#[inline]
fn be_u64(buf: &[u8], offset: usize) -> u64 {
    u64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap())
}
