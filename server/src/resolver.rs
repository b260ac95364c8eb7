//! Round resolution: King paths against Bandit ambushes
//!
//! Each King path is an independent interception question. Its edges are
//! keyed order-independently and every well-formed ambush is looked up in
//! that sequence. When several ambushes hit the same path, the one closest to
//! the castle wins (smallest distance remaining from the hit to the path's
//! end); ties go to the ambush submitted first.
//!
//! The rewarded side gets `max(8, 15 * ring - travelled * decay)` of the
//! origin field's resource, where `travelled` is the remaining distance for an
//! interception and the full edge count for a completed walk. Wagon workers
//! decay at half the regular rate.

use crate::map_gen::ResourceMap;
use log::{debug, warn};
use shared::{
    AmbushEdge, PathOutcome, PathSubmission, Resources, RoundReport, WorkersLost,
    MIN_PATH_VALUE, VALUE_PER_RING, WAGON_DECAY_PER_EDGE, WORKER_DECAY_PER_EDGE,
};

/// Edge-decay rate for a worker.
pub fn decay_per_edge(is_wagon_worker: bool) -> f64 {
    if is_wagon_worker {
        WAGON_DECAY_PER_EDGE
    } else {
        WORKER_DECAY_PER_EDGE
    }
}

/// Resource value of a walk that covered `travelled_edges` edges, starting
/// `distance_from_center` rings out. Never below the floor of 8.
pub fn path_value(distance_from_center: u32, travelled_edges: u32, is_wagon_worker: bool) -> f64 {
    let base = distance_from_center as f64 * VALUE_PER_RING;
    let decayed = base - travelled_edges as f64 * decay_per_edge(is_wagon_worker);
    decayed.max(MIN_PATH_VALUE)
}

/// The ambush that catches a path, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interception {
    pub ambush_index: usize,
    /// 0-based position of the ambushed edge, counted from the origin.
    pub edge_index: usize,
    /// Edges from the ambush to the end of the path.
    pub distance: usize,
}

/// Finds the deciding ambush for a single path.
pub fn find_interception(path: &PathSubmission, ambushes: &[AmbushEdge]) -> Option<Interception> {
    let edges = path.edge_keys();
    let length = edges.len();
    let mut best: Option<Interception> = None;

    for (ambush_index, ambush) in ambushes.iter().enumerate() {
        if !ambush.is_well_formed() {
            continue;
        }

        // A revisited edge is caught at its visit nearest the castle.
        let Some(edge_index) = edges.iter().rposition(|edge| *edge == ambush.key()) else {
            continue;
        };

        let distance = length - edge_index;
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(Interception {
                ambush_index,
                edge_index,
                distance,
            });
        }
    }

    best
}

/// Result of resolving one round, before it is applied to the match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub outcomes: Vec<PathOutcome>,
    pub king_bonus: Resources,
    pub bandit_bonus: Resources,
    pub workers_lost: WorkersLost,
    pub lost_worker_paths: Vec<usize>,
}

impl Resolution {
    pub fn into_report(
        self,
        round_number: u32,
        king_paths: Vec<PathSubmission>,
        bandit_ambushes: Vec<AmbushEdge>,
    ) -> RoundReport {
        RoundReport {
            round_number,
            king_paths,
            bandit_ambushes,
            bandit_bonus: self.bandit_bonus,
            king_bonus: self.king_bonus,
            outcome: self.outcomes,
            workers_lost: self.workers_lost,
            lost_worker_paths: self.lost_worker_paths,
        }
    }
}

/// Resolves every submitted path against the Bandit's ambushes.
pub fn resolve(
    paths: &[PathSubmission],
    ambushes: &[AmbushEdge],
    map: &ResourceMap,
) -> Resolution {
    for (index, ambush) in ambushes.iter().enumerate() {
        if !ambush.is_well_formed() {
            warn!(
                "Skipping malformed ambush {}: {:?} and {:?} are not neighbours",
                index,
                ambush.corner_a(),
                ambush.corner_b()
            );
        }
    }

    let mut resolution = Resolution::default();

    for (path_index, path) in paths.iter().enumerate() {
        let interception = find_interception(path, ambushes);
        let travelled_edges =
            interception.map_or(path.edge_count(), |hit| hit.distance) as u32;

        let origin = path.origin_field.coord();
        let field = map.field_at(origin);
        if field.is_none() {
            warn!(
                "Path {} starts on {:?}, which is not on the map; no reward",
                path_index, origin
            );
        }
        if let Some(field) = field.filter(|f| *f != path.origin_field.field_type) {
            warn!(
                "Path {} declares {:?} at {:?} but the map has {:?}",
                path_index, path.origin_field.field_type, origin, field
            );
        }

        let resource = field.and_then(|f| f.yield_kind());
        let value = match resource {
            Some(_) => path_value(
                origin.distance_from_center(),
                travelled_edges,
                path.is_wagon_worker,
            )
            .floor() as u32,
            None => 0,
        };

        let rewarded = if interception.is_some() {
            &mut resolution.bandit_bonus
        } else {
            &mut resolution.king_bonus
        };
        if let Some(kind) = resource {
            rewarded.credit(kind, value);
        }

        if interception.is_some() {
            if path.is_wagon_worker {
                resolution.workers_lost.wagon += 1;
            } else {
                resolution.workers_lost.regular += 1;
            }
            resolution.lost_worker_paths.push(path_index);
        }

        debug!(
            "Path {}: intercepted={} travelled={} value={} {:?}",
            path_index,
            interception.is_some(),
            travelled_edges,
            value,
            resource
        );

        resolution.outcomes.push(PathOutcome {
            path_index,
            intercepted: interception.is_some(),
            ambush_index: interception.map(|hit| hit.ambush_index),
            travelled_edges,
            value,
            resource,
        });
    }

    resolution
}
