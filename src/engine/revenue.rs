//! Per-tick revenue from attendance and facility tiers.

use crate::domain::{FacilityLevels, Money, RevenueSnapshot};
use rust_decimal::Decimal;

/// Suites added per VIP tier.
pub const SUITES_PER_TIER: u32 = 4;

/// Spend rates per fan (or per suite) per tick, before tier bonuses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevenueRates {
    pub ticket_per_fan: Decimal,
    pub concessions_per_fan: Decimal,
    pub parking_per_fan: Decimal,
    pub vip_per_suite: Decimal,
    pub merchandise_per_fan: Decimal,
}

impl Default for RevenueRates {
    fn default() -> Self {
        Self {
            ticket_per_fan: Decimal::new(1, 2),
            concessions_per_fan: Decimal::new(2, 3),
            parking_per_fan: Decimal::new(8, 4),
            vip_per_suite: Decimal::new(5, 2),
            merchandise_per_fan: Decimal::new(1, 3),
        }
    }
}

/// Turns (attendance, facility tiers) into a revenue breakdown.
///
/// Output depends only on the inputs and the accumulator's own fields;
/// `demand_factor` is the one knob for injecting variation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevenueAccumulator {
    rates: RevenueRates,
    demand_factor: Decimal,
}

impl Default for RevenueAccumulator {
    fn default() -> Self {
        Self::new(RevenueRates::default())
    }
}

impl RevenueAccumulator {
    pub fn new(rates: RevenueRates) -> Self {
        Self {
            rates,
            demand_factor: Decimal::ONE,
        }
    }

    /// Scale every fan-driven stream by `factor` (clamped at zero).
    pub fn with_demand_factor(mut self, factor: Decimal) -> Self {
        self.demand_factor = factor.max(Decimal::ZERO);
        self
    }

    /// Revenue for one tick. The returned snapshot carries `tick = 0`; the
    /// caller stamps the tick it belongs to.
    pub fn compute_tick(&self, attendance: u32, levels: &FacilityLevels) -> RevenueSnapshot {
        let levels = levels.clamped();
        let fans = Decimal::from(attendance) * self.demand_factor;

        let ticket = fans * self.rates.ticket_per_fan;
        let concessions =
            fans * self.rates.concessions_per_fan * tier_bonus(levels.concessions, 25);
        let parking = fans * self.rates.parking_per_fan * tier_bonus(levels.parking, 20);
        let suites = Decimal::from(SUITES_PER_TIER * levels.vip_suites as u32);
        let vip = suites * self.rates.vip_per_suite;
        let merchandise =
            fans * self.rates.merchandise_per_fan * tier_bonus(levels.merchandising, 30);

        RevenueSnapshot::new(
            0,
            cents(ticket),
            cents(concessions),
            cents(parking),
            cents(vip),
            cents(merchandise),
        )
    }
}

/// 1 + tier * pct%.
fn tier_bonus(tier: u8, pct_per_tier: u32) -> Decimal {
    Decimal::ONE + Decimal::new((tier as u32 * pct_per_tier) as i64, 2)
}

fn cents(value: Decimal) -> Money {
    Money::new(value).round_cents()
}
