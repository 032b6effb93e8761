use crate::domain::Decimal;

/// Convert a network fee paid in native currency into the quote currency.
///
/// `native_price` must already have fallback applied; it is never the
/// unavailable sentinel here. `None` on overflow.
pub fn to_quote(network_fee: Decimal, native_price: Decimal) -> Option<Decimal> {
    network_fee.checked_mul(native_price)
}
