use std::collections::{BTreeSet, HashMap, HashSet};
use std::iter;
use std::num::NonZeroUsize;

use itertools::Itertools;

use super::{Order, Planner, ResourceAccess, WakeupState};
use crate::system::SystemId;
use crate::util::DbgTypeId;

/// Stores the topology of the schedule,
/// including the dependency and exclusion relationship.
#[derive(Debug)]
pub(crate) struct Topology {
    /// If `dependents[a].contains(b)`, `b` depends on `a`.
    /// This means `b` is a wakeup candidate when `a` completes.
    dependents: HashMap<SystemId, Vec<SystemId>>,

    /// If `exclusions[a].contains(b)`, `a` and `b` must not execute concurrently.
    /// `exclusions[a].contains(b)` if and only if `exclusions[b].contains(a)`.
    exclusions: HashMap<SystemId, Vec<SystemId>>,

    /// The [`Planner`] reset state every cycle.
    initial_planner: Planner,
}

impl Topology {
    pub(crate) fn init(
        system_count: usize,
        orders: &[Order],
        resources: &HashMap<DbgTypeId, HashMap<SystemId, Vec<ResourceAccess>>>,
        describe: impl Fn(SystemId) -> String,
    ) -> Self {
        let systems = (0..system_count).map(SystemId);

        let dependents = build_dependents_map(systems.clone(), orders);
        scan_cycles(&dependents, describe);
        let initial_planner = build_initial_planner(systems.clone(), orders);
        let exclusions = build_exclusions(systems, resources);

        Self { dependents, exclusions, initial_planner }
    }

    pub(crate) fn dependents_of(&self, system: SystemId) -> &[SystemId] {
        self.dependents.get(&system).expect("invalid system id")
    }

    pub(crate) fn exclusions_of(&self, system: SystemId) -> &[SystemId] {
        self.exclusions.get(&system).expect("invalid system id")
    }

    pub(crate) fn initial_planner(&self) -> &Planner { &self.initial_planner }
}

fn build_dependents_map(
    systems: impl Iterator<Item = SystemId>,
    orders: &[Order],
) -> HashMap<SystemId, Vec<SystemId>> {
    let mut dependents: HashMap<SystemId, Vec<SystemId>> =
        systems.map(|system| (system, Vec::new())).collect();
    for order in orders {
        let list = dependents.get_mut(&order.before).expect("invalid system id");
        if !list.contains(&order.after) {
            list.push(order.after);
        }
    }
    dependents
}

fn scan_cycles(map: &HashMap<SystemId, Vec<SystemId>>, describe: impl Fn(SystemId) -> String) {
    let mut remaining: BTreeSet<SystemId> = map.keys().copied().collect();
    let mut exited = HashSet::new();
    let mut stack = Vec::new();

    while let Some(&system) = remaining.iter().next() {
        scan_cycles_from(map, system, &mut remaining, &mut exited, &mut stack, &describe);
    }
}

fn scan_cycles_from(
    map: &HashMap<SystemId, Vec<SystemId>>,
    system: SystemId,
    remaining: &mut BTreeSet<SystemId>,
    exited: &mut HashSet<SystemId>,
    stack: &mut Vec<SystemId>,
    describe: &impl Fn(SystemId) -> String,
) {
    if exited.contains(&system) {
        return; // already scanned
    }

    if !remaining.remove(&system) {
        let path = stack
            .iter()
            .copied()
            .skip_while(|&ancestor| ancestor != system)
            .chain(iter::once(system))
            .map(describe)
            .join(" -> ");
        panic!("Scheduled systems have a cyclic dependency: {path}");
    }

    stack.push(system);

    for &dependent in map.get(&system).expect("invalid system id") {
        scan_cycles_from(map, dependent, remaining, exited, stack, describe);
    }

    let popped = stack.pop();
    debug_assert_eq!(Some(system), popped);

    let new_exit = exited.insert(system);
    assert!(new_exit, "exited is inserted recursively but no cycles were detected");
}

fn build_initial_planner(
    systems: impl Iterator<Item = SystemId> + Clone,
    orders: &[Order],
) -> Planner {
    let mut dependency_counts: HashMap<SystemId, usize> =
        systems.clone().map(|system| (system, 0)).collect();

    let mut seen = HashSet::new();
    for order in orders {
        // duplicate edges are only counted once, matching `build_dependents_map`
        if seen.insert(*order) {
            *dependency_counts.get_mut(&order.after).expect("invalid system id") += 1;
        }
    }

    let runnable: BTreeSet<SystemId> = dependency_counts
        .iter()
        .filter_map(|(&system, &count)| (count == 0).then_some(system))
        .collect();

    let wakeup_state: HashMap<SystemId, WakeupState> = dependency_counts
        .into_iter()
        .map(|(system, count)| match NonZeroUsize::new(count) {
            Some(count) => (system, WakeupState::Blocked { count }),
            None => (system, WakeupState::Pending),
        })
        .collect();

    Planner { wakeup_state, runnable, remaining_systems: systems.count(), aborted: false }
}

fn build_exclusions(
    systems: impl Iterator<Item = SystemId>,
    resources: &HashMap<DbgTypeId, HashMap<SystemId, Vec<ResourceAccess>>>,
) -> HashMap<SystemId, Vec<SystemId>> {
    let mut exclusions: HashMap<SystemId, HashSet<SystemId>> =
        systems.map(|system| (system, HashSet::new())).collect();

    for accessors in resources.values() {
        for (&system1, accesses1) in accessors {
            for (&system2, accesses2) in accessors {
                if system1 == system2 {
                    continue;
                }

                if accesses1.iter().any(|access1| {
                    accesses2.iter().any(|access2| access1.check_conflicts_with(access2).is_err())
                }) {
                    exclusions.get_mut(&system1).expect("invalid system id").insert(system2);
                }
            }
        }
    }

    exclusions
        .into_iter()
        .map(|(system, set)| (system, set.into_iter().sorted().collect()))
        .collect()
}
