//! Money calculation using rust_decimal
//!
//! Amounts are stored and serialized as `f64`; every sum and product is
//! done in `Decimal` and rounded once per stored field.

use rust_decimal::prelude::*;

use super::error::OrderError;

/// 2 decimal places, half away from zero
const DECIMAL_PLACES: u32 = 2;

/// Maximum allowed quantity per cart line
pub const MAX_QUANTITY: i32 = 9999;

/// Upper bound for tip / discount (€1,000,000)
const MAX_ADJUSTMENT: f64 = 1_000_000.0;

#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Back to `f64` for storage, rounded to cents
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    round(value).to_f64().unwrap_or_default()
}

#[inline]
fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn require_adjustment(value: f64, field: &str) -> Result<(), OrderError> {
    if !value.is_finite() {
        return Err(OrderError::InvalidAmount(format!(
            "{field} must be a finite number, got {value}"
        )));
    }
    if value < 0.0 {
        return Err(OrderError::InvalidAmount(format!(
            "{field} must be non-negative, got {value}"
        )));
    }
    if value > MAX_ADJUSTMENT {
        return Err(OrderError::InvalidAmount(format!(
            "{field} exceeds maximum allowed ({MAX_ADJUSTMENT}), got {value}"
        )));
    }
    Ok(())
}

pub fn validate_quantity(product_id: i64, quantity: i32) -> Result<(), OrderError> {
    if quantity <= 0 || quantity > MAX_QUANTITY {
        return Err(OrderError::InvalidQuantity {
            product_id,
            quantity,
        });
    }
    Ok(())
}

/// Tip and discount checks that do not need the subtotal
pub fn validate_adjustments(tip: f64, discount: f64) -> Result<(), OrderError> {
    require_adjustment(tip, "tip")?;
    require_adjustment(discount, "discount")
}

/// Order amounts, rounded to cents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub tip: f64,
    pub discount: f64,
    pub total: f64,
}

/// Compute order totals from `(unit_price, quantity)` lines.
///
/// `tax = subtotal × tax_rate`, `total = subtotal + tax + tip − discount`.
/// A discount larger than the subtotal is rejected.
pub fn compute_totals(
    lines: &[(f64, i32)],
    tax_rate: f64,
    tip: f64,
    discount: f64,
) -> Result<Totals, OrderError> {
    validate_adjustments(tip, discount)?;
    if !tax_rate.is_finite() || tax_rate < 0.0 {
        return Err(OrderError::InvalidAmount(format!(
            "tax rate must be a non-negative fraction, got {tax_rate}"
        )));
    }

    let mut subtotal = Decimal::ZERO;
    for (price, quantity) in lines {
        if !price.is_finite() || *price < 0.0 {
            return Err(OrderError::InvalidAmount(format!("invalid unit price {price}")));
        }
        subtotal += to_decimal(*price) * Decimal::from(*quantity);
    }
    let subtotal = round(subtotal);

    let discount = round(to_decimal(discount));
    if discount > subtotal {
        return Err(OrderError::InvalidAmount(format!(
            "discount {discount} exceeds subtotal {subtotal}"
        )));
    }

    let tax = round(subtotal * to_decimal(tax_rate));
    let tip = round(to_decimal(tip));
    let total = subtotal + tax + tip - discount;

    Ok(Totals {
        subtotal: to_f64(subtotal),
        tax: to_f64(tax),
        tip: to_f64(tip),
        discount: to_f64(discount),
        total: to_f64(total),
    })
}
