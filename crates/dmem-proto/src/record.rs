//! Fixed-width binary record layout.
//!
//! One order occupies exactly 64 bytes so that `offset = index × 64`
//! always addresses a whole record. Little-endian byte order is used
//! throughout.

use bytemuck::{Pod, Zeroable};
use core::mem::size_of;

/// Size of one encoded order in bytes.
pub const RECORD_SIZE: usize = 64;

/// Maximum number of symbol bytes kept by the encoder.
pub const MAX_SYMBOL_LEN: usize = 31;

/// Byte offsets of each field inside a record.
pub mod offsets {
    pub const ID: usize = 0;
    pub const PRICE: usize = 4;
    pub const QUANTITY: usize = 12;
    pub const TIMESTAMP: usize = 16;
    pub const SIDE: usize = 24;
    pub const ORDER_TYPE: usize = 25;
    pub const SYMBOL_LEN: usize = 26;
    pub const SYMBOL: usize = 27;
    pub const RESERVED: usize = 58;
}

/// Encoded order (64 bytes total).
///
/// Numeric fields hold little-endian values; use the accessors rather
/// than reading fields directly on big-endian hosts.
#[derive(Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct OrderRecord {
    pub id: u32,                        // 4 bytes  @0
    pub price_bits: u64,                // 8 bytes  @4 (raw f64 bits)
    pub quantity: i32,                  // 4 bytes  @12
    pub timestamp: i64,                 // 8 bytes  @16
    pub side: u8,                       // 1 byte   @24 (1=Buy, 2=Sell)
    pub order_type: u8,                 // 1 byte   @25 (1=Market, 2=Limit)
    pub symbol_len: u8,                 // 1 byte   @26
    pub symbol: [u8; MAX_SYMBOL_LEN],   // 31 bytes @27
    pub _reserved: [u8; 6],             // 6 bytes  @58
}

const _: () = assert!(size_of::<OrderRecord>() == RECORD_SIZE);

// SAFETY: OrderRecord is packed plain-old-data; every bit pattern is valid
unsafe impl Pod for OrderRecord {}
unsafe impl Zeroable for OrderRecord {}

impl Default for OrderRecord {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl OrderRecord {
    /// Order identifier.
    #[inline(always)]
    pub fn id(&self) -> u32 {
        u32::from_le(self.id)
    }

    /// Price restored from its bit pattern.
    #[inline(always)]
    pub fn price(&self) -> f64 {
        f64::from_bits(u64::from_le(self.price_bits))
    }

    /// Order quantity.
    #[inline(always)]
    pub fn quantity(&self) -> i32 {
        i32::from_le(self.quantity)
    }

    /// Timestamp in nanoseconds.
    #[inline(always)]
    pub fn timestamp(&self) -> i64 {
        i64::from_le(self.timestamp)
    }

    /// Stored symbol bytes (length-prefixed, without padding).
    ///
    /// Returns `None` if the length byte exceeds the symbol field.
    #[inline]
    pub fn symbol_bytes(&self) -> Option<&[u8]> {
        let len = self.symbol_len as usize;
        if len > MAX_SYMBOL_LEN {
            return None;
        }
        // Alignment 1, so borrowing out of the packed struct is fine
        let symbol: &[u8; MAX_SYMBOL_LEN] = &self.symbol;
        Some(&symbol[..len])
    }
}
