//! Order ⇄ record codec.
//!
//! Uses bytemuck for safe transmutation between `OrderRecord` and raw
//! bytes. The codec is pure and shared unchanged by every buffer strategy.

use bytemuck::try_from_bytes;
use thiserror::Error;

use crate::order::{Order, OrderType, Side};
use crate::record::{OrderRecord, MAX_SYMBOL_LEN, RECORD_SIZE};

/// Decode error types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer than one record's worth of bytes at the offset.
    #[error("buffer too small: need {RECORD_SIZE} bytes at offset {offset}, have {available}")]
    BufferTooSmall { offset: usize, available: usize },
    /// Side byte is not a known side.
    #[error("invalid side byte {0:#04x}")]
    InvalidSide(u8),
    /// Order type byte is not a known type.
    #[error("invalid order type byte {0:#04x}")]
    InvalidOrderType(u8),
    /// Symbol length byte exceeds the symbol field.
    #[error("symbol length {0} exceeds {MAX_SYMBOL_LEN} bytes")]
    SymbolTooLong(u8),
    /// Symbol bytes are not valid UTF-8.
    #[error("symbol is not valid UTF-8")]
    InvalidSymbol,
}

/// Longest prefix of `symbol` that fits in a record without splitting
/// a UTF-8 character.
#[inline]
pub fn truncate_symbol(symbol: &str) -> &str {
    if symbol.len() <= MAX_SYMBOL_LEN {
        return symbol;
    }
    let mut end = MAX_SYMBOL_LEN;
    while !symbol.is_char_boundary(end) {
        end -= 1;
    }
    &symbol[..end]
}

/// Build the record for an order.
///
/// Over-length symbols are truncated, never rejected.
#[inline]
pub fn to_record(order: &Order) -> OrderRecord {
    let symbol = truncate_symbol(&order.symbol).as_bytes();
    let mut symbol_field = [0u8; MAX_SYMBOL_LEN];
    symbol_field[..symbol.len()].copy_from_slice(symbol);

    OrderRecord {
        id: order.id.to_le(),
        price_bits: order.price.to_bits().to_le(),
        quantity: order.quantity.to_le(),
        timestamp: order.timestamp.to_le(),
        side: order.side as u8,
        order_type: order.order_type as u8,
        symbol_len: symbol.len() as u8,
        symbol: symbol_field,
        _reserved: [0; 6],
    }
}

/// Rebuild an order from its record.
#[inline]
pub fn from_record(record: &OrderRecord) -> Result<Order, CodecError> {
    let side = Side::try_from(record.side).map_err(CodecError::InvalidSide)?;
    let order_type =
        OrderType::try_from(record.order_type).map_err(CodecError::InvalidOrderType)?;
    let symbol_bytes = record
        .symbol_bytes()
        .ok_or(CodecError::SymbolTooLong(record.symbol_len))?;
    let symbol = core::str::from_utf8(symbol_bytes).map_err(|_| CodecError::InvalidSymbol)?;

    Ok(Order {
        id: record.id(),
        symbol: symbol.to_owned(),
        price: record.price(),
        quantity: record.quantity(),
        side,
        order_type,
        timestamp: record.timestamp(),
    })
}

/// Encode an order into a caller-provided staging buffer (no allocation).
#[inline(always)]
pub fn encode_into(order: &Order, out: &mut [u8; RECORD_SIZE]) {
    *out = bytemuck::cast(to_record(order));
}

/// Encode an order into a fresh 64-byte record.
#[inline(always)]
pub fn encode(order: &Order) -> [u8; RECORD_SIZE] {
    bytemuck::cast(to_record(order))
}

/// Decode the record starting at `offset` in `bytes`.
#[inline]
pub fn decode(bytes: &[u8], offset: usize) -> Result<Order, CodecError> {
    let end = offset
        .checked_add(RECORD_SIZE)
        .filter(|&end| end <= bytes.len())
        .ok_or(CodecError::BufferTooSmall {
            offset,
            available: bytes.len().saturating_sub(offset),
        })?;

    // Alignment of OrderRecord is 1 and the length is exact, so this cannot fail
    let record: &OrderRecord = try_from_bytes(&bytes[offset..end]).map_err(|_| {
        CodecError::BufferTooSmall {
            offset,
            available: bytes.len().saturating_sub(offset),
        }
    })?;
    from_record(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::offsets;
    use proptest::prelude::*;

    fn sample_order() -> Order {
        Order::new(123, "EURUSD", Side::Sell, OrderType::Limit, 1.2345, 1000, 1_700_000_000_000)
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&sample_order());

        assert_eq!(&bytes[offsets::ID..offsets::ID + 4], &123u32.to_le_bytes());
        assert_eq!(
            &bytes[offsets::PRICE..offsets::PRICE + 8],
            &1.2345f64.to_bits().to_le_bytes()
        );
        assert_eq!(&bytes[offsets::QUANTITY..offsets::QUANTITY + 4], &1000i32.to_le_bytes());
        assert_eq!(bytes[offsets::SIDE], 2);
        assert_eq!(bytes[offsets::ORDER_TYPE], 2);
        assert_eq!(bytes[offsets::SYMBOL_LEN], 6);
        assert_eq!(&bytes[offsets::SYMBOL..offsets::SYMBOL + 6], b"EURUSD");
        assert!(bytes[offsets::SYMBOL + 6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_at_offset() {
        let mut buffer = vec![0u8; RECORD_SIZE * 3];
        let order = sample_order();
        buffer[RECORD_SIZE * 2..].copy_from_slice(&encode(&order));

        assert_eq!(decode(&buffer, RECORD_SIZE * 2), Ok(order));
    }

    #[test]
    fn test_decode_buffer_too_small() {
        let buffer = [0u8; RECORD_SIZE + 10];
        assert_eq!(
            decode(&buffer, 20),
            Err(CodecError::BufferTooSmall { offset: 20, available: 54 })
        );
        assert!(matches!(
            decode(&buffer, usize::MAX),
            Err(CodecError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_decode_zeroed_slot_is_rejected() {
        let buffer = [0u8; RECORD_SIZE];
        assert_eq!(decode(&buffer, 0), Err(CodecError::InvalidSide(0)));
    }

    #[test]
    fn test_decode_corrupt_symbol_length() {
        let mut bytes = encode(&sample_order());
        bytes[offsets::SYMBOL_LEN] = 40;
        assert_eq!(decode(&bytes, 0), Err(CodecError::SymbolTooLong(40)));
    }

    #[test]
    fn test_empty_symbol_decodes_to_empty_string() {
        let order = Order::new(7, "", Side::Buy, OrderType::Market, 10.0, 1, 0);
        let decoded = decode(&encode(&order), 0).unwrap();
        assert_eq!(decoded.symbol, "");
        assert_eq!(decoded.order_type, OrderType::Market);
    }

    #[test]
    fn test_long_symbol_is_truncated() {
        let long = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let order = Order::new(1, long, Side::Buy, OrderType::Limit, 1.0, 1, 0);
        let decoded = decode(&encode(&order), 0).unwrap();
        assert_eq!(decoded.symbol, &long[..MAX_SYMBOL_LEN]);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 30 ASCII bytes followed by a 2-byte character straddling byte 31
        let symbol = format!("{}é", "A".repeat(30));
        assert_eq!(symbol.len(), 32);
        assert_eq!(truncate_symbol(&symbol), "A".repeat(30));
    }

    #[test]
    fn test_encode_into_matches_encode() {
        let order = sample_order();
        let mut staged = [0xFFu8; RECORD_SIZE];
        encode_into(&order, &mut staged);
        assert_eq!(staged, encode(&order));
    }

    fn arb_order() -> impl Strategy<Value = Order> {
        (
            any::<u32>(),
            "\\PC{0,40}",
            any::<f64>(),
            any::<i32>(),
            any::<bool>(),
            any::<bool>(),
            any::<i64>(),
        )
            .prop_map(|(id, symbol, price, quantity, buy, market, timestamp)| Order {
                id,
                symbol,
                price,
                quantity,
                side: if buy { Side::Buy } else { Side::Sell },
                order_type: if market { OrderType::Market } else { OrderType::Limit },
                timestamp,
            })
    }

    proptest! {
        #[test]
        fn prop_round_trip_preserves_fields(order in arb_order()) {
            let decoded = decode(&encode(&order), 0).unwrap();

            prop_assert_eq!(decoded.id, order.id);
            prop_assert_eq!(decoded.price.to_bits(), order.price.to_bits());
            prop_assert_eq!(decoded.quantity, order.quantity);
            prop_assert_eq!(decoded.side, order.side);
            prop_assert_eq!(decoded.order_type, order.order_type);
            prop_assert_eq!(decoded.timestamp, order.timestamp);
            prop_assert!(decoded.symbol.len() <= MAX_SYMBOL_LEN);
            prop_assert!(order.symbol.starts_with(&decoded.symbol));
            prop_assert_eq!(decoded.symbol.as_str(), truncate_symbol(&order.symbol));
        }
    }
}
