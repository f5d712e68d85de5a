//! Scheduling properties checked over seeded generated workloads.

use std::collections::BTreeSet;

use flowplace_core::{
    AffinityMatrix, AffinityScheduler, LoadBalanceScheduler, LocalityScheduler, ScheduleOutcome,
    SchedulerConfig, Server, ServerId, Strategy, TaskId, Workload, WorkloadConfig, schedule,
};
use flowplace_workload::{RandomPlacement, WorkloadGenerator};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

const SEEDS: u64 = 24;

fn generator() -> WorkloadGenerator {
    WorkloadGenerator::new(WorkloadConfig {
        servers: 8,
        tasks: 30,
        replication: 2,
        min_slot: 1,
        max_slot: 6,
        max_affinity: 9,
    })
}

fn config(strategy: Strategy) -> SchedulerConfig {
    SchedulerConfig {
        strategy,
        ..SchedulerConfig::default()
    }
}

fn assert_invariants(outcome: &ScheduleOutcome, workload: &Workload, label: &str) {
    let mut seen = BTreeSet::new();
    for server in &outcome.servers {
        assert!(
            server.tasks.len() as u32 <= server.slot,
            "{label}: {} holds {} tasks with {} slots",
            server.id,
            server.tasks.len(),
            server.slot
        );
        for task in &server.tasks {
            assert!(seen.insert(*task), "{label}: {task} placed twice");
        }
    }
    for task in &outcome.unplaced {
        assert!(!seen.contains(task), "{label}: {task} both placed and unplaced");
    }
    assert_eq!(
        outcome.placed_count() + outcome.unplaced.len(),
        workload.tasks().len(),
        "{label}: tasks not conserved"
    );
}

/// A workload where every task has a home server with room for it, plus
/// one random extra replica, so a fully local assignment exists.
fn homed_workload(rng: &mut StdRng, servers: u32, slot: u32) -> Workload {
    let tasks = servers * slot;
    let mut w = Workload::new(
        (0..servers).map(|i| Server::new(ServerId(i), slot)).collect(),
        (0..tasks).map(TaskId).collect(),
    )
    .unwrap();
    let ids: Vec<ServerId> = (0..servers).map(ServerId).collect();
    for t in 0..tasks {
        w.add_replica(ServerId(t / slot), TaskId(t)).unwrap();
        let extra = *ids.choose(rng).unwrap();
        w.add_replica(extra, TaskId(t)).unwrap();
    }
    w
}

#[test]
fn every_strategy_keeps_capacity_uniqueness_and_conservation() {
    for seed in 0..SEEDS {
        let generated = generator().generate(&mut StdRng::seed_from_u64(seed)).unwrap();
        let w = &generated.workload;

        for strategy in [Strategy::Locality, Strategy::LoadBalance, Strategy::Affinity] {
            let mut rng = StdRng::seed_from_u64(seed);
            let outcome = schedule(&config(strategy), w, Some(&generated.affinity), &mut rng).unwrap();
            assert_invariants(&outcome, w, &format!("{} seed {seed}", strategy.label()));
        }

        let random = RandomPlacement::assign(w, &mut StdRng::seed_from_u64(seed)).unwrap();
        assert_invariants(&random, w, &format!("random seed {seed}"));
    }
}

#[test]
fn load_balance_places_only_locally() {
    for seed in 0..SEEDS {
        let generated = generator().generate(&mut StdRng::seed_from_u64(seed)).unwrap();
        let w = &generated.workload;
        let outcome = LoadBalanceScheduler::new(config(Strategy::LoadBalance))
            .schedule(w, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        assert_eq!(outcome.local_placements(w), outcome.placed_count(), "seed {seed}");
        for server in &outcome.servers {
            assert_eq!(server.load as usize, server.tasks.len(), "seed {seed}");
        }
    }
}

#[test]
fn locality_places_everything_locally_when_possible() {
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let slot = rng.random_range(1..=4);
        let w = homed_workload(&mut rng, 6, slot);

        let outcome = LocalityScheduler::new(config(Strategy::Locality))
            .schedule(&w, &mut rng)
            .unwrap();
        assert!(outcome.fallback.is_empty(), "seed {seed}: fallback {:?}", outcome.fallback);
        assert!(outcome.unplaced.is_empty(), "seed {seed}");
        assert_eq!(outcome.local_placements(&w), w.tasks().len(), "seed {seed}");
    }
}

#[test]
fn load_balance_fills_identical_servers_evenly() {
    // Four servers of three slots; task i lives on servers i%4 and (i+1)%4.
    let mut w = Workload::new(
        (0..4).map(|i| Server::new(ServerId(i), 3)).collect(),
        (0..12).map(TaskId).collect(),
    )
    .unwrap();
    for t in 0..12 {
        w.add_replica(ServerId(t % 4), TaskId(t)).unwrap();
        w.add_replica(ServerId((t + 1) % 4), TaskId(t)).unwrap();
    }

    let outcome = LoadBalanceScheduler::new(config(Strategy::LoadBalance))
        .schedule(&w, &mut StdRng::seed_from_u64(0))
        .unwrap();
    for server in &outcome.servers {
        assert_eq!(server.tasks.len(), 3, "{} load", server.id);
    }

    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let w = homed_workload(&mut rng, 5, 4);
        let outcome = LoadBalanceScheduler::new(config(Strategy::LoadBalance))
            .schedule(&w, &mut rng)
            .unwrap();
        for server in &outcome.servers {
            assert!(server.tasks.len().abs_diff(4) <= 1, "seed {seed}: {} load", server.id);
        }
    }
}

#[test]
fn affinity_beats_random_with_the_same_kernels() {
    // Two servers of three slots sharing six tasks; {0,1,2} and {3,4,5}
    // attract each other, the clusters do not.
    let w = Workload::new(
        vec![Server::new(ServerId(0), 3), Server::new(ServerId(1), 3)],
        (0..6).map(TaskId).collect(),
    )
    .unwrap()
    .with_replicas((0..6).flat_map(|t| [(ServerId(0), TaskId(t)), (ServerId(1), TaskId(t))]))
    .unwrap();
    let mut m = AffinityMatrix::new(6);
    for cluster in [[0, 1, 2], [3, 4, 5]] {
        for a in cluster {
            for b in cluster {
                m.set(TaskId(a), TaskId(b), 9);
            }
        }
    }

    for seed in 0..SEEDS {
        let outcome = AffinityScheduler::new(config(Strategy::Affinity))
            .schedule(&w, &m, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        assert!(outcome.unplaced.is_empty(), "seed {seed}");

        let mut rng = StdRng::seed_from_u64(seed + 1000);
        for _ in 0..8 {
            let random = RandomPlacement::assign_with_pinned(&w, &outcome.kernels, &mut rng).unwrap();
            assert!(
                outcome.kernel_affinity(&m) >= random.kernel_affinity(&m),
                "seed {seed}: {} < {}",
                outcome.kernel_affinity(&m),
                random.kernel_affinity(&m)
            );
        }
    }
}

#[test]
fn fixed_seed_reproduces_every_strategy() {
    for seed in [3, 17] {
        let generated = generator().generate(&mut StdRng::seed_from_u64(seed)).unwrap();
        for strategy in [Strategy::Locality, Strategy::LoadBalance, Strategy::Affinity] {
            let run = || {
                schedule(
                    &config(strategy),
                    &generated.workload,
                    Some(&generated.affinity),
                    &mut StdRng::seed_from_u64(seed),
                )
                .unwrap()
            };
            assert_eq!(run(), run(), "{} seed {seed}", strategy.label());
        }
    }
}
