#![deny(warnings)]

//! Financial derivation for buyback scenarios.
//!
//! Pure, total functions from a [`ScenarioInput`] to the derived metrics
//! record. Every recomputation replaces the record wholesale; nothing here
//! retains state between calls. All money math runs on `rust_decimal`, so
//! the accounting identity `total_cost + net_profit == retail_price` holds
//! exactly, with no floating-point drift.

use reman_core::ScenarioInput;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fixed buyback-ratio probe set for the local sensitivity curve. The
/// probes are evaluated regardless of the scenario's current ratio.
pub const PROBE_RATIOS: [i64; 5] = [55, 60, 65, 70, 75];

/// Net profit at one probed buyback ratio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    /// Probed buyback ratio, percent of retail price.
    pub ratio_pct: Decimal,
    /// Per-unit net profit at that ratio, CNY.
    pub net_profit: Decimal,
}

/// Metrics derived from one scenario. Owned by the derivation engine and
/// recreated on every input change; no field is ever mutated independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Amount paid to acquire one used unit, CNY.
    pub buyback_value: Decimal,
    /// Buyback plus refurbishment plus logistics/warranty, CNY.
    pub total_cost: Decimal,
    /// Retail price minus total cost, CNY. May be negative.
    pub net_profit: Decimal,
    /// Net profit as a percentage of retail price.
    pub margin_pct: Decimal,
    /// Cost floor excluding the buyback consideration, CNY.
    pub break_even_price: Decimal,
    /// Local profit curve over [`PROBE_RATIOS`].
    pub sensitivity: Vec<SensitivityPoint>,
}

/// Net profit with the buyback ratio overridden and every other field held
/// fixed. Shared kernel of [`derive`] and the sensitivity table, so the
/// headline number and the table cannot drift apart.
pub fn profit_at_ratio(input: &ScenarioInput, ratio_pct: Decimal) -> Decimal {
    let buyback = input.retail_price * ratio_pct / Decimal::ONE_HUNDRED;
    input.retail_price - (buyback + input.refurb_cost + input.logistics_warranty)
}

/// Derives the full metrics record for one scenario.
///
/// Total over the clamped input domain: the retail-price range excludes
/// zero, so the margin division cannot fault.
pub fn derive(input: &ScenarioInput) -> DerivedMetrics {
    let buyback_value = input.retail_price * input.buyback_ratio / Decimal::ONE_HUNDRED;
    let total_cost = buyback_value + input.refurb_cost + input.logistics_warranty;
    let net_profit = input.retail_price - total_cost;
    let margin_pct = net_profit / input.retail_price * Decimal::ONE_HUNDRED;
    let break_even_price = input.refurb_cost + input.logistics_warranty;
    let sensitivity = PROBE_RATIOS
        .iter()
        .map(|&r| {
            let ratio_pct = Decimal::from(r);
            SensitivityPoint {
                ratio_pct,
                net_profit: profit_at_ratio(input, ratio_pct),
            }
        })
        .collect();
    DerivedMetrics {
        buyback_value,
        total_cost,
        net_profit,
        margin_pct,
        break_even_price,
        sensitivity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reman_core::{ScenarioField, RETAIL_PRICE_MIN};

    fn input(retail: i64, ratio: i64, refurb: i64, logistics: i64) -> ScenarioInput {
        ScenarioInput::default()
            .apply(ScenarioField::RetailPrice(Decimal::from(retail)))
            .apply(ScenarioField::BuybackRatio(Decimal::from(ratio)))
            .apply(ScenarioField::RefurbCost(Decimal::from(refurb)))
            .apply(ScenarioField::LogisticsWarranty(Decimal::from(logistics)))
    }

    #[test]
    fn baseline_scenario_metrics() {
        let m = derive(&ScenarioInput::default());
        assert_eq!(m.buyback_value, Decimal::new(402935, 2)); // 4029.35
        assert_eq!(m.total_cost, Decimal::new(525935, 2)); // 5259.35
        assert_eq!(m.net_profit, Decimal::new(93965, 2)); // 939.65
        assert_eq!(m.margin_pct.round_dp(1), Decimal::new(152, 1)); // ~15.2%
        assert_eq!(m.break_even_price, Decimal::from(1230));
    }

    #[test]
    fn sensitivity_sweeps_fixed_probes_not_current_ratio() {
        let m = derive(&input(6199, 50, 750, 480));
        let ratios: Vec<Decimal> = m.sensitivity.iter().map(|p| p.ratio_pct).collect();
        assert_eq!(ratios, PROBE_RATIOS.map(Decimal::from).to_vec());
        // Each point matches a full re-derivation at that ratio.
        for p in &m.sensitivity {
            let probed = derive(&input(6199, 50, 750, 480).apply(ScenarioField::BuybackRatio(p.ratio_pct)));
            assert_eq!(p.net_profit, probed.net_profit);
        }
    }

    #[test]
    fn ratio_bounds_derive_without_error() {
        let low = derive(&input(6199, 50, 750, 480));
        let high = derive(&input(6199, 85, 750, 480));
        assert!(low.net_profit > high.net_profit);
    }

    #[test]
    fn worst_case_boundary_goes_negative_but_still_adds_up() {
        let m = derive(&input(9500, 85, 1500, 480));
        assert!(m.net_profit < Decimal::ZERO);
        assert!(m.margin_pct < Decimal::ZERO);
        assert_eq!(m.total_cost + m.net_profit, Decimal::from(9500));
    }

    #[test]
    fn margin_division_cannot_hit_zero() {
        // The domain floor keeps retail_price strictly positive, so the
        // margin division is total. Clamping enforces the floor even for a
        // hostile update.
        assert!(RETAIL_PRICE_MIN > 0);
        let s = ScenarioInput::default().apply(ScenarioField::RetailPrice(Decimal::ZERO));
        assert!(s.retail_price > Decimal::ZERO);
        let _ = derive(&s);
    }

    #[test]
    fn derivation_is_deterministic() {
        let s = input(8000, 72, 1100, 600);
        assert_eq!(derive(&s), derive(&s));
    }

    proptest! {
        #[test]
        fn profit_identity_holds_exactly(
            retail in 4000i64..=9500,
            ratio in 50i64..=85,
            refurb in 300i64..=1500,
            logistics in 0i64..=5000,
        ) {
            let s = input(retail, ratio, refurb, logistics);
            let m = derive(&s);
            prop_assert_eq!(m.total_cost + m.net_profit, s.retail_price);
        }

        #[test]
        fn margin_is_a_function_of_the_other_fields(
            retail in 4000i64..=9500,
            ratio in 50i64..=85,
            refurb in 300i64..=1500,
            logistics in 0i64..=5000,
        ) {
            let s = input(retail, ratio, refurb, logistics);
            let m = derive(&s);
            prop_assert_eq!(m.margin_pct, m.net_profit / s.retail_price * Decimal::ONE_HUNDRED);
        }

        #[test]
        fn profit_strictly_decreases_in_buyback_ratio(
            retail in 4000i64..=9500,
            ratio in 50i64..85,
            refurb in 300i64..=1500,
            logistics in 0i64..=5000,
        ) {
            let s = input(retail, ratio, refurb, logistics);
            let lower = profit_at_ratio(&s, Decimal::from(ratio));
            let higher = profit_at_ratio(&s, Decimal::from(ratio + 1));
            prop_assert!(higher < lower);
        }
    }
}
