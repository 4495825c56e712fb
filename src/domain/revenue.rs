use super::money::Money;
use serde::{Deserialize, Serialize};

/// Revenue earned during one tick, broken down by stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSnapshot {
    pub tick: u64,
    pub ticket: Money,
    pub concessions: Money,
    pub parking: Money,
    pub vip: Money,
    pub merchandise: Money,
    pub total: Money,
}

impl RevenueSnapshot {
    /// Build a snapshot whose `total` is the sum of its parts.
    pub fn new(
        tick: u64,
        ticket: Money,
        concessions: Money,
        parking: Money,
        vip: Money,
        merchandise: Money,
    ) -> Self {
        Self {
            tick,
            ticket,
            concessions,
            parking,
            vip,
            merchandise,
            total: ticket + concessions + parking + vip + merchandise,
        }
    }
}
