//! Order value type carried in and out of the record buffer.

/// Side of the order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Bid side (buyers).
    #[default]
    Buy = 1,
    /// Ask side (sellers).
    Sell = 2,
}

impl Side {
    /// Check if this is the buy side.
    #[inline(always)]
    pub const fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl TryFrom<u8> for Side {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(Side::Buy),
            2 => Ok(Side::Sell),
            other => Err(other),
        }
    }
}

/// Order type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OrderType {
    /// Execute immediately at the best available price.
    Market = 1,
    /// Rest at the given price or better.
    #[default]
    Limit = 2,
}

impl TryFrom<u8> for OrderType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(OrderType::Market),
            2 => Ok(OrderType::Limit),
            other => Err(other),
        }
    }
}

/// A trade order.
///
/// Validation (positive price and quantity, non-empty symbol) is the
/// caller's job; the codec stores whatever it is given.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Order {
    /// Order identifier.
    pub id: u32,
    /// Instrument symbol. Only the first 31 UTF-8 bytes are stored.
    pub symbol: String,
    /// Limit price.
    pub price: f64,
    /// Order quantity.
    pub quantity: i32,
    /// Order side (buy/sell).
    pub side: Side,
    /// Order type (market/limit).
    pub order_type: OrderType,
    /// Creation time in nanoseconds.
    pub timestamp: i64,
}

impl Order {
    /// Create a new order.
    #[inline]
    pub fn new(
        id: u32,
        symbol: impl Into<String>,
        side: Side,
        order_type: OrderType,
        price: f64,
        quantity: i32,
        timestamp: i64,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            price,
            quantity,
            side,
            order_type,
            timestamp,
        }
    }

    /// Check if this is a buy order.
    #[inline(always)]
    pub const fn is_buy(&self) -> bool {
        self.side.is_buy()
    }
}
