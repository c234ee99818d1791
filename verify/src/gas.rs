//! Gas-price band checks.
//!
//! Fees are accepted inside a ±20% band around the configured price. The
//! comparison is cross-multiplied so it stays in integer arithmetic and
//! every validator computes the identical verdict. Both band edges are
//! accepted.

use crate::error::VerifyError;
use custos_types::{Amount, BPS_DENOMINATOR};

/// Lower band edge: 80% of the configured price.
pub const GAS_BAND_LOW_BPS: u128 = 8_000;
/// Upper band edge: 120% of the configured price.
pub const GAS_BAND_HIGH_BPS: u128 = 12_000;

/// UTXO form: the whole-transaction fee against
/// `configured_price × estimated_size_kb`.
pub fn check_gas_price_band(
    cost_fee: Amount,
    estimated_size_kb: u128,
    configured_price: Amount,
) -> Result<(), VerifyError> {
    let paid = cost_fee.raw().saturating_mul(BPS_DENOMINATOR);
    let reference = configured_price.raw().saturating_mul(estimated_size_kb);
    if paid < reference.saturating_mul(GAS_BAND_LOW_BPS) {
        return Err(VerifyError::GasPriceTooLow);
    }
    if paid > reference.saturating_mul(GAS_BAND_HIGH_BPS) {
        return Err(VerifyError::GasPriceTooHigh);
    }
    Ok(())
}

/// Account form: the transaction's per-unit gas price directly against the
/// configured one.
pub fn check_gas_price_value(
    gas_price: Amount,
    configured_price: Amount,
) -> Result<(), VerifyError> {
    let paid = gas_price.raw().saturating_mul(BPS_DENOMINATOR);
    let reference = configured_price.raw();
    if paid < reference.saturating_mul(GAS_BAND_LOW_BPS) {
        return Err(VerifyError::GasPriceTooLow);
    }
    if paid > reference.saturating_mul(GAS_BAND_HIGH_BPS) {
        return Err(VerifyError::GasPriceTooHigh);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_band_edges_are_accepted() {
        let configured = Amount::new(1_000);
        assert_eq!(check_gas_price_value(Amount::new(800), configured), Ok(()));
        assert_eq!(check_gas_price_value(Amount::new(1_200), configured), Ok(()));
        assert_eq!(
            check_gas_price_value(Amount::new(799), configured),
            Err(VerifyError::GasPriceTooLow)
        );
        assert_eq!(
            check_gas_price_value(Amount::new(1_201), configured),
            Err(VerifyError::GasPriceTooHigh)
        );
    }

    #[test]
    fn utxo_band_scales_with_size() {
        // 2 kb at configured 10_000/kb: reference fee 20_000, band [16_000, 24_000].
        let configured = Amount::new(10_000);
        assert_eq!(check_gas_price_band(Amount::new(16_000), 2, configured), Ok(()));
        assert_eq!(check_gas_price_band(Amount::new(24_000), 2, configured), Ok(()));
        assert_eq!(
            check_gas_price_band(Amount::new(15_999), 2, configured),
            Err(VerifyError::GasPriceTooLow)
        );
        assert_eq!(
            check_gas_price_band(Amount::new(24_001), 2, configured),
            Err(VerifyError::GasPriceTooHigh)
        );
    }
}
