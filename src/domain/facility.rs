use serde::{Deserialize, Serialize};

/// Highest upgrade tier any facility can reach.
pub const MAX_TIER: u8 = 5;

/// Stadium upgrade tiers, snapshotted when the match is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FacilityLevels {
    pub capacity: u8,
    pub concessions: u8,
    pub parking: u8,
    pub vip_suites: u8,
    pub merchandising: u8,
    pub lighting_screens: u8,
    pub security: u8,
}

impl FacilityLevels {
    /// Copy with every tier clamped to `MAX_TIER`.
    pub fn clamped(&self) -> Self {
        Self {
            capacity: self.capacity.min(MAX_TIER),
            concessions: self.concessions.min(MAX_TIER),
            parking: self.parking.min(MAX_TIER),
            vip_suites: self.vip_suites.min(MAX_TIER),
            merchandising: self.merchandising.min(MAX_TIER),
            lighting_screens: self.lighting_screens.min(MAX_TIER),
            security: self.security.min(MAX_TIER),
        }
    }

    /// Seats available at this capacity tier.
    pub fn seat_capacity(&self) -> u32 {
        5_000 + 2_500 * self.capacity.min(MAX_TIER) as u32
    }

    /// Attendance for a match at these tiers: seats times a fill rate that
    /// lighting/screens and security push toward a sell-out.
    pub fn attendance(&self) -> u32 {
        let tiers = self.clamped();
        let fill_pct = 60 + 5 * tiers.lighting_screens as u32 + 3 * tiers.security as u32;
        let seats = tiers.seat_capacity();
        (seats * fill_pct.min(100)) / 100
    }
}
