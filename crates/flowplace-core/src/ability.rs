//! Per-server ability bookkeeping.
//!
//! A server's ability bounds how many more local tasks it could take:
//! `min(|preferred|, slot)` at the start, consumed as the server commits
//! tasks and clamped as other servers claim tasks from its preferred set.
//! Ability never exceeds the server's remaining room.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;

use crate::config::TieBreak;
use crate::session::{Move, pick_best};
use crate::types::{ServerId, TaskId};

#[derive(Debug, Clone)]
pub(crate) struct AbilityTable {
    preferred: BTreeMap<ServerId, BTreeSet<TaskId>>,
    /// Slots not yet consumed by commits.
    room: BTreeMap<ServerId, u32>,
    ability: BTreeMap<ServerId, u32>,
}

impl AbilityTable {
    pub fn new(
        preferred: BTreeMap<ServerId, BTreeSet<TaskId>>,
        slots: &BTreeMap<ServerId, u32>,
    ) -> Self {
        let ability = slots
            .iter()
            .map(|(server, slot)| {
                let local = preferred.get(server).map_or(0, BTreeSet::len);
                (*server, cap(local, *slot))
            })
            .collect();
        Self {
            preferred,
            room: slots.clone(),
            ability,
        }
    }

    pub fn get(&self, server: ServerId) -> u32 {
        self.ability.get(&server).copied().unwrap_or(0)
    }

    pub fn set(&mut self, server: ServerId, value: u32) {
        self.ability.insert(server, value);
    }

    pub fn total(&self) -> u64 {
        self.ability.values().map(|a| u64::from(*a)).sum()
    }

    /// Account for one task changing hands.
    pub fn record(&mut self, mv: &Move) {
        if let Some(prev) = mv.from {
            self.restore(prev);
        }
        self.strike(mv.task, mv.to);
        self.consume(mv.to);
    }

    fn restore(&mut self, server: ServerId) {
        if let Some(r) = self.room.get_mut(&server) {
            *r += 1;
        }
        if let Some(a) = self.ability.get_mut(&server) {
            *a += 1;
        }
    }

    /// Remove `task` from every preferred set but `keeper`'s and clamp the
    /// affected abilities.
    fn strike(&mut self, task: TaskId, keeper: ServerId) {
        for (server, set) in self.preferred.iter_mut() {
            if *server == keeper || !set.remove(&task) {
                continue;
            }
            let room = self.room.get(server).copied().unwrap_or(0);
            if let Some(a) = self.ability.get_mut(server) {
                *a = (*a).min(cap(set.len(), room));
            }
        }
    }

    fn consume(&mut self, server: ServerId) {
        if let Some(r) = self.room.get_mut(&server) {
            *r = r.saturating_sub(1);
        }
        if let Some(a) = self.ability.get_mut(&server) {
            *a = a.saturating_sub(1);
        }
    }

    /// Highest-ability server among `order`, skipping `skip`.
    pub fn select_max<R: Rng + ?Sized>(
        &self,
        order: &[ServerId],
        skip: &BTreeSet<ServerId>,
        tie: TieBreak,
        rng: &mut R,
    ) -> Option<(ServerId, u32)> {
        pick_best(
            order
                .iter()
                .filter(|s| !skip.contains(s))
                .map(|s| (*s, self.get(*s))),
            tie,
            rng,
        )
    }
}

fn cap(local: usize, slot: u32) -> u32 {
    u32::try_from(local).unwrap_or(u32::MAX).min(slot)
}
