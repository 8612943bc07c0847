//! Bomb and rocket counters.
//!
//! The chain count is authoritative. Confirmed local actions add a delta on
//! top of the last authoritative read so the UI reacts before the next
//! re-read; a re-read replaces the count and drops the delta, so nothing is
//! counted twice.

use serde::Serialize;

use crate::canvas::selection::Weapon;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeaponCount {
    /// Last count read from the chain, if any.
    pub confirmed: Option<u64>,
    /// Local adjustment since that read.
    pub delta: i64,
}

impl WeaponCount {
    pub fn effective(&self) -> u64 {
        let base = self.confirmed.unwrap_or(0) as i64;
        (base + self.delta).max(0) as u64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub bombs: WeaponCount,
    pub rockets: WeaponCount,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, weapon: Weapon) -> &mut WeaponCount {
        match weapon {
            Weapon::Bomb => &mut self.bombs,
            Weapon::Rocket => &mut self.rockets,
        }
    }

    pub fn count(&self, weapon: Weapon) -> u64 {
        match weapon {
            Weapon::Bomb => self.bombs.effective(),
            Weapon::Rocket => self.rockets.effective(),
        }
    }

    /// Confirmed purchase of `quantity` units.
    pub fn credit(&mut self, weapon: Weapon, quantity: u32) {
        self.slot(weapon).delta += quantity as i64;
    }

    /// Confirmed use of one unit.
    pub fn debit(&mut self, weapon: Weapon) {
        self.slot(weapon).delta -= 1;
    }

    /// Authoritative re-read; overrides any local delta.
    pub fn reconcile(&mut self, weapon: Weapon, on_chain: u64) {
        let slot = self.slot(weapon);
        if slot.delta != 0 && slot.effective() != on_chain {
            tracing::debug!(
                "{} count reconciled: local {} -> chain {}",
                weapon.label(),
                slot.effective(),
                on_chain
            );
        }
        *slot = WeaponCount {
            confirmed: Some(on_chain),
            delta: 0,
        };
    }
}
