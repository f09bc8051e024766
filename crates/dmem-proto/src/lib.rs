//! Fixed-width binary record codec for trade orders.
//!
//! Every order encodes to exactly 64 bytes at fixed field offsets,
//! so a record buffer can be addressed as `index × 64` without parsing.

pub mod order;
pub mod record;
pub mod codec;

pub use order::{Order, OrderType, Side};
pub use record::{OrderRecord, MAX_SYMBOL_LEN, RECORD_SIZE};
pub use codec::{decode, encode, encode_into, truncate_symbol, CodecError};
