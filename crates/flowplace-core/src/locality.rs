//! Locality-maximizing scheduler.
//!
//! Saturates servers in order of ability, each augmentation placing one
//! more task on a replica-holding server (possibly rerouting tasks that
//! were already placed). Once ability is spent everywhere, the remaining
//! servers with spare room are searched until none yields a path; whatever
//! is still waiting goes to the server with the most spare room.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::ability::AbilityTable;
use crate::config::{SchedulerConfig, Strategy};
use crate::error::ScheduleResult;
use crate::outcome::ScheduleOutcome;
use crate::path::find_path;
use crate::session::{Session, pick_best};
use crate::types::{ServerId, Workload};

#[derive(Debug, Clone, Default)]
pub struct LocalityScheduler {
    config: SchedulerConfig,
}

impl LocalityScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn schedule<R: Rng + ?Sized>(
        &self,
        workload: &Workload,
        rng: &mut R,
    ) -> ScheduleResult<ScheduleOutcome> {
        let mut session = Session::new(workload)?;
        let mut abilities = AbilityTable::new(workload.replicas().clone(), session.slots());

        let augmentations = self.saturate(&mut session, &mut abilities, rng)?;
        let fallback = self.fill_by_capacity(&mut session, rng)?;
        session.verify()?;

        let outcome = session.into_outcome(workload, Strategy::Locality.label(), None);
        info!(
            strategy = Strategy::Locality.label(),
            placed = outcome.placed_count(),
            augmentations,
            fallback,
            "schedule complete"
        );
        if !outcome.unplaced.is_empty() {
            warn!(
                unplaced = outcome.unplaced.len(),
                "could not place all tasks, insufficient slot capacity"
            );
        }
        Ok(outcome)
    }

    /// Augment until no server can reach the sink. Returns the number of
    /// paths applied.
    fn saturate<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        abilities: &mut AbilityTable,
        rng: &mut R,
    ) -> ScheduleResult<usize> {
        // A server without a path never regains one: augmentation only
        // adds arcs along the augmented path, which did not reach it.
        let mut exhausted: BTreeSet<ServerId> = BTreeSet::new();
        let mut augmentations = 0;

        while !session.unassigned().is_empty() {
            let by_ability = abilities
                .select_max(session.servers(), &exhausted, self.config.tie_break, rng)
                .filter(|(_, ability)| *ability > 0)
                .map(|(server, _)| server);

            let origin = match by_ability {
                Some(server) => server,
                None => {
                    let spare = session
                        .servers()
                        .iter()
                        .copied()
                        .find(|s| !exhausted.contains(s) && session.spare(*s) > 0);
                    match spare {
                        Some(server) => server,
                        None => break,
                    }
                }
            };

            if session.spare(origin) == 0 {
                abilities.set(origin, 0);
                exhausted.insert(origin);
                continue;
            }

            match find_path(session.graph(), origin) {
                Some(path) => {
                    debug!(
                        server = %origin,
                        ability = abilities.get(origin),
                        length = path.len(),
                        "applying augmenting path"
                    );
                    session.apply_path(&path, |mv| abilities.record(&mv))?;
                    augmentations += 1;
                }
                None => {
                    debug!(server = %origin, "no augmenting path");
                    exhausted.insert(origin);
                }
            }
        }

        Ok(augmentations)
    }

    /// Give every task still waiting to the server with the most spare
    /// room, ignoring locality. Returns how many were placed.
    fn fill_by_capacity<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        rng: &mut R,
    ) -> ScheduleResult<usize> {
        let pending: Vec<_> = session.unassigned().iter().copied().collect();
        let mut placed = 0;
        for task in pending {
            let candidates: Vec<_> = session
                .servers()
                .iter()
                .map(|s| (*s, session.spare(*s)))
                .filter(|(_, spare)| *spare > 0)
                .collect();
            let Some((server, spare)) = pick_best(candidates, self.config.tie_break, rng) else {
                break;
            };
            session.place_direct(task, server)?;
            placed += 1;
            debug!(task = %task, server = %server, spare, "fallback placement");
        }
        Ok(placed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Server, TaskId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn workload(slots: &[u32], tasks: u32, replicas: &[(u32, u32)]) -> Workload {
        let servers = slots
            .iter()
            .enumerate()
            .map(|(i, &slot)| Server::new(ServerId(i as u32 + 1), slot))
            .collect();
        Workload::new(servers, (1..=tasks).map(TaskId).collect())
            .unwrap()
            .with_replicas(replicas.iter().map(|&(s, t)| (ServerId(s), TaskId(t))))
            .unwrap()
    }

    fn run(w: &Workload) -> ScheduleOutcome {
        let mut rng = StdRng::seed_from_u64(0);
        LocalityScheduler::default().schedule(w, &mut rng).unwrap()
    }

    #[test]
    fn places_single_replica_task_on_its_server() {
        // s1(2), s2(2); t1, t2 on both; t3 only on s1.
        let w = workload(&[2, 2], 3, &[(1, 1), (2, 1), (1, 2), (2, 2), (1, 3)]);
        let outcome = run(&w);

        assert_eq!(outcome.server_of(TaskId(3)), Some(ServerId(1)));
        assert_eq!(outcome.servers[0].tasks.len(), 2);
        assert_eq!(outcome.servers[1].tasks.len(), 1);
        assert!(outcome.fallback.is_empty());
        assert!(outcome.unplaced.is_empty());
        assert_eq!(outcome.local_placements(&w), 3);
    }

    #[test]
    fn falls_back_to_most_spare_server() {
        // t2 has no replica anywhere.
        let w = workload(&[1, 3], 2, &[(1, 1)]);
        let outcome = run(&w);

        assert_eq!(outcome.server_of(TaskId(1)), Some(ServerId(1)));
        assert_eq!(outcome.server_of(TaskId(2)), Some(ServerId(2)));
        assert_eq!(outcome.fallback, vec![TaskId(2)]);
    }

    #[test]
    fn reports_shortfall_when_oversubscribed() {
        let w = workload(&[1], 3, &[(1, 1), (1, 2), (1, 3)]);
        let outcome = run(&w);

        assert_eq!(outcome.placed_count(), 1);
        assert_eq!(outcome.unplaced.len(), 2);
        assert_eq!(outcome.shortfall().unwrap().unplaced.len(), 2);
    }

    #[test]
    fn respects_slots() {
        let w = workload(&[1, 1, 2], 4, &[(1, 1), (1, 2), (1, 3), (1, 4), (2, 1), (3, 2)]);
        let outcome = run(&w);

        for server in &outcome.servers {
            assert!(server.tasks.len() as u32 <= server.slot, "{} over slot", server.id);
        }
        assert_eq!(outcome.placed_count(), 4);
    }

    #[test]
    fn empty_workload() {
        let w = workload(&[2], 0, &[]);
        let outcome = run(&w);
        assert_eq!(outcome.placed_count(), 0);
        assert!(outcome.shortfall().is_none());
    }
}
