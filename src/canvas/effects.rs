//! Transient blast visuals. Purely cosmetic; never consulted for pixel state.

use std::time::{Duration, Instant};

use super::rasterizer::AreaEffect;
use crate::{
    constants::{BOOM_EFFECT_TTL_MS, ROCKET_EFFECT_TTL_MS},
    models::GridCell,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Boom,
    Rocket,
}

impl EffectKind {
    pub fn ttl(&self) -> Duration {
        match self {
            EffectKind::Boom => Duration::from_millis(BOOM_EFFECT_TTL_MS),
            EffectKind::Rocket => Duration::from_millis(ROCKET_EFFECT_TTL_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectEvent {
    pub kind: EffectKind,
    pub center: GridCell,
    pub radius: u32,
    pub created_at: Instant,
}

impl EffectEvent {
    pub fn expires_at(&self) -> Instant {
        self.created_at + self.kind.ttl()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }

    /// Fraction of the lifetime elapsed, in [0, 1].
    pub fn progress(&self, now: Instant) -> f32 {
        let total = self.kind.ttl().as_secs_f32();
        let elapsed = now.saturating_duration_since(self.created_at).as_secs_f32();
        (elapsed / total).clamp(0.0, 1.0)
    }

    pub fn area(&self) -> AreaEffect {
        AreaEffect::new(self.center, self.radius)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EffectQueue {
    events: Vec<EffectEvent>,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, kind: EffectKind, center: GridCell, radius: u32, now: Instant) {
        self.events.push(EffectEvent {
            kind,
            center,
            radius,
            created_at: now,
        });
    }

    /// Drop expired events; returns how many were removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.events.len();
        self.events.retain(|e| !e.is_expired(now));
        before - self.events.len()
    }

    pub fn active(&self, now: Instant) -> impl Iterator<Item = &EffectEvent> {
        self.events.iter().filter(move |e| !e.is_expired(now))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Earliest instant at which the queue changes on its own.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.events.iter().map(EffectEvent::expires_at).min()
    }
}
