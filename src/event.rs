//! The decoded event: the single data record every downstream component
//! (book, batch loop, strategy) consumes.

/// Discriminates the kind of message a raw packet byte decoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    StateChange,
    AddOrder,
    ExecuteOrder,
    DeleteOrder,
    /// Unknown message kind byte, or a known kind whose payload was too
    /// short to decode. Carries no book-relevant data; the driver discards it.
    Other,
}

/// Order side. `Unknown` is not an error — an unrecognized side byte is
/// valid per the wire format (spec §4.1) and simply can't be routed to a
/// book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
    Unknown,
}

impl Side {
    pub fn from_byte(b: u8) -> Side {
        match b {
            b'B' => Side::Buy,
            b'S' => Side::Sell,
            _ => Side::Unknown,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
            Side::Unknown => Side::Unknown,
        }
    }
}

/// Maximum length of a state string payload (spec §4.1: 20 bytes, space-padded).
pub const STATE_STRING_MAX: usize = 20;

/// A single decoded feed message. Only the fields relevant to `kind` are
/// meaningfully populated; the rest default to zero/unknown (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub nanosec: u32,
    pub ranking_time: u64,
    pub instrument_id: u32,
    pub order_id: u64,
    pub side: Side,
    pub quantity: u64,
    pub price: u32,
    pub ranking_seq: u32,
    pub state_string: String,
}

impl Event {
    /// An `Other` event carrying no data, used for unknown/undersized messages.
    pub fn other() -> Event {
        Event {
            kind: EventKind::Other,
            nanosec: 0,
            ranking_time: 0,
            instrument_id: 0,
            order_id: 0,
            side: Side::Unknown,
            quantity: 0,
            price: 0,
            ranking_seq: 0,
            state_string: String::new(),
        }
    }

    pub fn state_change(nanosec: u32, instrument_id: u32, state_string: String) -> Event {
        Event {
            kind: EventKind::StateChange,
            nanosec,
            instrument_id,
            state_string,
            ..Event::other()
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_order(
        nanosec: u32,
        order_id: u64,
        instrument_id: u32,
        side: Side,
        ranking_seq: u32,
        quantity: u64,
        price: u32,
        ranking_time: u64,
    ) -> Event {
        Event {
            kind: EventKind::AddOrder,
            nanosec,
            order_id,
            instrument_id,
            side,
            ranking_seq,
            quantity,
            price,
            ranking_time,
            ..Event::other()
        }
    }

    pub fn execute_order(
        nanosec: u32,
        order_id: u64,
        instrument_id: u32,
        side: Side,
        quantity: u64,
        price: u32,
    ) -> Event {
        Event {
            kind: EventKind::ExecuteOrder,
            nanosec,
            order_id,
            instrument_id,
            side,
            quantity,
            price,
            ..Event::other()
        }
    }

    pub fn delete_order(nanosec: u32, order_id: u64, instrument_id: u32, side: Side) -> Event {
        Event {
            kind: EventKind::DeleteOrder,
            nanosec,
            order_id,
            instrument_id,
            side,
            ..Event::other()
        }
    }
}

/// Sentinel state strings (spec §6).
pub const STATE_CONTINUOUS_TRADING: &str = "P_SUREKLI_ISLEM";
pub const STATE_END_OF_DAY: &str = "P_MARJ_YAYIN_KAPANIS";
