//! # Final Price Formulas
//!
//! The one place a `finalPrice` is computed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Form preview (DRAFT)  ──┐                                              │
//! │                          ├──► compute_final_price(&PriceSpec) ──► Money │
//! │  Upsert / bulk / import ─┘                                              │
//! │                                                                         │
//! │  TierDiscount  percentage:  base × (1 - bps/10000)                      │
//! │                fixed:       base - value                                │
//! │  ClientFixed                price                                       │
//! │  ClientMarkup  percentage:  base × (1 + bps/10000)                      │
//! │                fixed:       base + value                                │
//! │                                                                         │
//! │  Every result is floored at 0.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::money::Money;
use crate::types::{Adjustment, ClientPricing};

/// Inputs to a final price computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSpec {
    TierDiscount { base: Money, discount: Adjustment },
    ClientFixed { price: Money },
    ClientMarkup { base: Money, markup: Adjustment },
}

impl From<ClientPricing> for PriceSpec {
    fn from(pricing: ClientPricing) -> Self {
        match pricing {
            ClientPricing::Fixed { price } => PriceSpec::ClientFixed { price },
            ClientPricing::Markup { base, markup } => PriceSpec::ClientMarkup { base, markup },
        }
    }
}

/// Computes the derived final price, clamped to zero.
///
/// ```rust
/// use tariff_core::money::Money;
/// use tariff_core::pricing::{compute_final_price, PriceSpec};
/// use tariff_core::types::Adjustment;
///
/// let spec = PriceSpec::ClientMarkup {
///     base: Money::from_cents(20_000),
///     markup: Adjustment::percentage_bps(2000),
/// };
/// assert_eq!(compute_final_price(&spec).cents(), 24_000);
/// ```
pub fn compute_final_price(spec: &PriceSpec) -> Money {
    let raw = match *spec {
        PriceSpec::TierDiscount { base, discount } => discount.discount(base),
        PriceSpec::ClientFixed { price } => price,
        PriceSpec::ClientMarkup { base, markup } => markup.markup(base),
    };
    raw.floor_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(base: i64, discount: Adjustment) -> Money {
        compute_final_price(&PriceSpec::TierDiscount {
            base: Money::from_cents(base),
            discount,
        })
    }

    #[test]
    fn test_percentage_discount() {
        assert_eq!(tier(10_000, Adjustment::percentage_bps(1000)).cents(), 9_000);
    }

    #[test]
    fn test_fixed_discount() {
        let discount = Adjustment::fixed(Money::from_cents(1_500));
        assert_eq!(tier(10_000, discount).cents(), 8_500);
    }

    #[test]
    fn test_percentage_markup() {
        let spec = PriceSpec::ClientMarkup {
            base: Money::from_cents(20_000),
            markup: Adjustment::percentage_bps(2000),
        };
        assert_eq!(compute_final_price(&spec).cents(), 24_000);
    }

    #[test]
    fn test_fixed_markup_and_fixed_price() {
        let markup = PriceSpec::ClientMarkup {
            base: Money::from_cents(20_000),
            markup: Adjustment::fixed(Money::from_cents(2_550)),
        };
        assert_eq!(compute_final_price(&markup).cents(), 22_550);

        let fixed = PriceSpec::ClientFixed {
            price: Money::from_cents(70_000),
        };
        assert_eq!(compute_final_price(&fixed).cents(), 70_000);
    }

    #[test]
    fn test_scenario_tier_price() {
        // 850.00 less 15%
        assert_eq!(tier(85_000, Adjustment::percentage_bps(1500)).cents(), 72_250);
    }

    #[test]
    fn test_floor_invariant() {
        for base in [0, 1, 99, 10_000, 85_000, 1_000_000_000] {
            let price = tier(base, Adjustment::percentage_bps(15_000));
            assert_eq!(price, Money::zero(), "base {base}");
        }
        let fixed = tier(1_000, Adjustment::fixed(Money::from_cents(5_000)));
        assert_eq!(fixed, Money::zero());
    }

    #[test]
    fn test_huge_adjustments_do_not_overflow() {
        let markup = PriceSpec::ClientMarkup {
            base: Money::from_cents(85_000),
            markup: Adjustment::fixed(Money::from_cents(i64::MAX)),
        };
        assert_eq!(compute_final_price(&markup).cents(), i64::MAX);

        let discount = tier(85_000, Adjustment::fixed(Money::from_cents(i64::MAX)));
        assert_eq!(discount, Money::zero());
        let discount = tier(85_000, Adjustment::percentage_bps(i64::MAX));
        assert_eq!(discount, Money::zero());
    }

    #[test]
    fn test_client_pricing_conversion() {
        let pricing = ClientPricing::Markup {
            base: Money::from_cents(10_000),
            markup: Adjustment::percentage_bps(500),
        };
        assert_eq!(compute_final_price(&pricing.into()).cents(), 10_500);
    }
}
