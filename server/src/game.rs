//! Authoritative per-lobby match state and its turn state machine
//!
//! ```text
//! Setup --start--> KingPlanning --paths--> BanditPlanning --ambushes--> Executing
//! Executing --no winner--> KingPlanning (round + 1)
//! Executing --winner--> GameOver
//! any --quit--> GameOver
//! ```
//!
//! Only the role owning the current planning phase may change anything;
//! everyone else gets [`GameError::InvalidActionForPhase`] and the state is
//! left untouched. Purchases that cannot be paid for are not errors but a
//! [`Purchase::Denied`] outcome.

use crate::error::GameError;
use crate::map_gen::ResourceMap;
use crate::resolver::{self, Resolution};
use crate::victory::{self, Verdict};
use log::{info, warn};
use shared::{
    AmbushEdge, HexCoord, PathSubmission, ResourceKind, Resources, Role, RoundReport, AMBUSH_COST,
    BANDIT_STARTING_RESOURCES, CENTER, KING_STARTING_RESOURCES, WAGON_WOOD_COST,
    WORKER_GRAIN_COST, WORKER_WOOD_COST,
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    KingPlanning,
    BanditPlanning,
    Executing,
    GameOver,
}

/// Answer to a purchase or upgrade request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purchase<T> {
    Approved(T),
    Denied(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerCounts {
    pub purchased: u32,
    pub wagon: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmbushReceipt {
    pub paid_with: ResourceKind,
    pub purchased: u32,
}

/// What the delayed end-of-round step should announce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEnd {
    NextRound(u32),
    Finished(Verdict),
}

pub fn worker_cost() -> Resources {
    Resources::new(0, WORKER_WOOD_COST, WORKER_GRAIN_COST)
}

pub fn wagon_cost() -> Resources {
    Resources::new(0, WAGON_WOOD_COST, 0)
}

#[derive(Debug, Clone)]
pub struct MatchState {
    phase: Phase,
    round_number: u32,
    /// Bumped on every start and reset so delayed round completions can
    /// tell whether they still belong to the same match.
    generation: u64,
    pub king_resources: Resources,
    pub bandit_resources: Resources,
    king_purchased_workers: u32,
    king_wagon_workers: u32,
    /// What each of this round's ambushes was paid with, oldest first.
    ambush_ledger: Vec<ResourceKind>,
    map: Option<ResourceMap>,
    submitted_paths: Vec<PathSubmission>,
    submitted_ambushes: Vec<AmbushEdge>,
    verdict: Option<Verdict>,
    verdict_announced: bool,
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Setup,
            round_number: 0,
            generation: 0,
            king_resources: KING_STARTING_RESOURCES,
            bandit_resources: BANDIT_STARTING_RESOURCES,
            king_purchased_workers: 0,
            king_wagon_workers: 0,
            ambush_ledger: Vec::new(),
            map: None,
            submitted_paths: Vec::new(),
            submitted_ambushes: Vec::new(),
            verdict: None,
            verdict_announced: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn is_in_progress(&self) -> bool {
        !matches!(self.phase, Phase::Setup | Phase::GameOver)
    }

    pub fn map(&self) -> Option<&ResourceMap> {
        self.map.as_ref()
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn workers(&self) -> WorkerCounts {
        WorkerCounts {
            purchased: self.king_purchased_workers,
            wagon: self.king_wagon_workers,
        }
    }

    pub fn purchased_ambushes(&self) -> u32 {
        self.ambush_ledger.len() as u32
    }

    pub fn submitted_paths(&self) -> &[PathSubmission] {
        &self.submitted_paths
    }

    pub fn submitted_ambushes(&self) -> &[AmbushEdge] {
        &self.submitted_ambushes
    }

    pub fn resources_of(&self, role: Role) -> Resources {
        match role {
            Role::King => self.king_resources,
            Role::Bandit => self.bandit_resources,
            Role::Unassigned => Resources::default(),
        }
    }

    /// Setup -> KingPlanning with a fresh economy on the given map.
    pub fn start(&mut self, map: ResourceMap) -> Result<(), GameError> {
        if self.phase != Phase::Setup {
            return Err(GameError::phase(self.phase, Role::Unassigned));
        }

        *self = MatchState {
            generation: self.generation + 1,
            map: Some(map),
            round_number: 1,
            ..MatchState::new()
        };
        self.enter_king_planning();
        Ok(())
    }

    /// Back to Setup, keeping nothing but the generation counter.
    pub fn reset(&mut self) {
        *self = MatchState {
            generation: self.generation + 1,
            ..MatchState::new()
        };
    }

    /// A player gave up; the other side wins immediately.
    pub fn quit(&mut self, role: Role) -> Result<Verdict, GameError> {
        if !self.is_in_progress() {
            return Err(GameError::phase(self.phase, role));
        }

        let verdict = Verdict::new(role.opponent(), "opponent quit");
        self.phase = Phase::GameOver;
        self.verdict = Some(verdict.clone());
        self.verdict_announced = true;
        info!("{:?} quit in round {}", role, self.round_number);
        Ok(verdict)
    }

    fn require(&self, role: Role, expected_role: Role, expected_phase: Phase) -> Result<(), GameError> {
        if role != expected_role || self.phase != expected_phase {
            return Err(GameError::phase(self.phase, role));
        }
        Ok(())
    }

    // The single place where submission buffers are cleared.
    fn enter_king_planning(&mut self) {
        self.submitted_paths.clear();
        self.submitted_ambushes.clear();
        self.ambush_ledger.clear();
        self.phase = Phase::KingPlanning;
    }

    pub fn buy_worker(&mut self, role: Role) -> Result<Purchase<WorkerCounts>, GameError> {
        self.require(role, Role::King, Phase::KingPlanning)?;

        if !self.king_resources.try_spend(&worker_cost()) {
            return Ok(Purchase::Denied(format!(
                "a worker costs {} grain and {} wood",
                WORKER_GRAIN_COST, WORKER_WOOD_COST
            )));
        }

        self.king_purchased_workers += 1;
        Ok(Purchase::Approved(self.workers()))
    }

    pub fn upgrade_worker_to_wagon(
        &mut self,
        role: Role,
    ) -> Result<Purchase<WorkerCounts>, GameError> {
        self.require(role, Role::King, Phase::KingPlanning)?;

        if self.king_purchased_workers <= self.king_wagon_workers {
            return Ok(Purchase::Denied("no regular worker to upgrade".to_string()));
        }
        if !self.king_resources.try_spend(&wagon_cost()) {
            return Ok(Purchase::Denied(format!(
                "a wagon costs {} wood",
                WAGON_WOOD_COST
            )));
        }

        self.king_wagon_workers += 1;
        Ok(Purchase::Approved(self.workers()))
    }

    /// Refunds one worker (and its wagon, if it had one). Drafted paths live
    /// on the client until `submit_paths`, so there is no path to drop here.
    pub fn delete_path(
        &mut self,
        role: Role,
        is_wagon_worker: bool,
    ) -> Result<WorkerCounts, GameError> {
        self.require(role, Role::King, Phase::KingPlanning)?;

        let regular = self.king_purchased_workers - self.king_wagon_workers;
        if (is_wagon_worker && self.king_wagon_workers == 0) || (!is_wagon_worker && regular == 0)
        {
            return Err(GameError::NothingToRefund);
        }

        self.king_resources.refund(&worker_cost());
        self.king_purchased_workers -= 1;
        if is_wagon_worker {
            self.king_resources.refund(&wagon_cost());
            self.king_wagon_workers -= 1;
        }

        Ok(self.workers())
    }

    /// Ambushes are paid from whichever of wood or grain the Bandit holds
    /// more of, as the server sees it.
    pub fn buy_ambush(&mut self, role: Role) -> Result<Purchase<AmbushReceipt>, GameError> {
        self.require(role, Role::Bandit, Phase::BanditPlanning)?;

        let wallet = &self.bandit_resources;
        let paid_with = if wallet.wood >= wallet.grain {
            ResourceKind::Wood
        } else {
            ResourceKind::Grain
        };

        if !self
            .bandit_resources
            .try_spend(&Resources::single(paid_with, AMBUSH_COST))
        {
            return Ok(Purchase::Denied(format!(
                "an ambush costs {} wood or grain",
                AMBUSH_COST
            )));
        }

        self.ambush_ledger.push(paid_with);
        Ok(Purchase::Approved(AmbushReceipt {
            paid_with,
            purchased: self.purchased_ambushes(),
        }))
    }

    /// Refunds the most recently bought ambush in the resource it was paid with.
    pub fn delete_ambush(&mut self, role: Role) -> Result<AmbushReceipt, GameError> {
        self.require(role, Role::Bandit, Phase::BanditPlanning)?;

        let paid_with = self.ambush_ledger.pop().ok_or(GameError::NothingToRefund)?;
        self.bandit_resources
            .refund(&Resources::single(paid_with, AMBUSH_COST));

        Ok(AmbushReceipt {
            paid_with,
            purchased: self.purchased_ambushes(),
        })
    }

    fn validate_path(&self, index: usize, path: &PathSubmission) -> Result<(), GameError> {
        let invalid = |reason: &str| GameError::InvalidPath {
            index,
            reason: reason.to_string(),
        };

        if path.vertices.len() < 2 {
            return Err(invalid("needs at least two vertices"));
        }
        if !path.is_connected() {
            return Err(invalid("consecutive vertices must share an edge"));
        }
        let mut walked = HashSet::new();
        if !path.edge_keys().into_iter().all(|edge| walked.insert(edge)) {
            return Err(invalid("must not walk the same edge twice"));
        }

        let origin = path.origin_field.coord();
        match self.map.as_ref().and_then(|m| m.field_at(origin)) {
            None => return Err(invalid("origin field is not on the map")),
            Some(field) if field.is_reserved() => {
                return Err(invalid("origin field must not be castle or moat"))
            }
            Some(_) => {}
        }

        let (Some(first), Some(last)) = (path.vertices.first(), path.vertices.last()) else {
            return Err(invalid("needs at least two vertices"));
        };
        if !first.touches(origin) {
            return Err(invalid("must start on a corner of its origin field"));
        }
        if !last.touches(CENTER) {
            return Err(invalid("must end on a corner of the castle"));
        }

        Ok(())
    }

    /// The King's finalize: buffers the paths and hands the turn to the
    /// Bandit. Returns the origin hex of every worker sent out.
    pub fn submit_paths(
        &mut self,
        role: Role,
        paths: Vec<PathSubmission>,
    ) -> Result<Vec<HexCoord>, GameError> {
        self.require(role, Role::King, Phase::KingPlanning)?;

        if paths.len() > self.king_purchased_workers as usize {
            return Err(GameError::TooManyPaths {
                paths: paths.len(),
                workers: self.king_purchased_workers,
            });
        }
        let wagon_paths = paths.iter().filter(|p| p.is_wagon_worker).count();
        if wagon_paths > self.king_wagon_workers as usize {
            return Err(GameError::TooManyPaths {
                paths: wagon_paths,
                workers: self.king_wagon_workers,
            });
        }
        for (index, path) in paths.iter().enumerate() {
            self.validate_path(index, path)?;
        }

        let locations = paths.iter().map(|p| p.origin_field.coord()).collect();
        self.submitted_paths = paths;
        self.phase = Phase::BanditPlanning;
        Ok(locations)
    }

    /// The Bandit's finalize: buffers the ambushes, resolves the round and
    /// applies the outcome. Ends the match at once if someone has won.
    pub fn submit_ambushes(
        &mut self,
        role: Role,
        ambushes: Vec<AmbushEdge>,
    ) -> Result<RoundReport, GameError> {
        self.require(role, Role::Bandit, Phase::BanditPlanning)?;

        if ambushes.len() > self.ambush_ledger.len() {
            return Err(GameError::TooManyAmbushes {
                ambushes: ambushes.len(),
                purchased: self.purchased_ambushes(),
            });
        }

        self.submitted_ambushes = ambushes;
        self.phase = Phase::Executing;

        let Some(map) = self.map.as_ref() else {
            // Unreachable once started; treat as an empty round rather than panic.
            warn!("Resolving round {} without a map", self.round_number);
            return Ok(self.finish_resolution(Resolution::default()));
        };

        let resolution = resolver::resolve(&self.submitted_paths, &self.submitted_ambushes, map);
        Ok(self.finish_resolution(resolution))
    }

    fn finish_resolution(&mut self, resolution: Resolution) -> RoundReport {
        self.king_resources.add(&resolution.king_bonus);
        self.bandit_resources.add(&resolution.bandit_bonus);

        let lost = resolution.workers_lost;
        self.king_wagon_workers = self.king_wagon_workers.saturating_sub(lost.wagon);
        self.king_purchased_workers = self.king_purchased_workers.saturating_sub(lost.total());
        self.king_wagon_workers = self.king_wagon_workers.min(self.king_purchased_workers);

        info!(
            "Round {} resolved: king +{:?}, bandit +{:?}, {} workers lost",
            self.round_number,
            resolution.king_bonus,
            resolution.bandit_bonus,
            lost.total()
        );

        if let Some(verdict) = victory::evaluate(
            &self.king_resources,
            &self.bandit_resources,
            self.king_purchased_workers,
        ) {
            info!("Round {}: {:?} wins ({})", self.round_number, verdict.winner, verdict.reason);
            self.phase = Phase::GameOver;
            self.verdict = Some(verdict);
            self.verdict_announced = false;
        }

        resolution.into_report(
            self.round_number,
            self.submitted_paths.clone(),
            self.submitted_ambushes.clone(),
        )
    }

    /// Runs after the theater delay. Returns `None` when the match moved on
    /// in the meantime (reset, quit, or already completed).
    pub fn complete_round(&mut self, generation: u64) -> Option<RoundEnd> {
        if generation != self.generation {
            return None;
        }

        match self.phase {
            Phase::Executing => {
                self.round_number += 1;
                self.enter_king_planning();
                Some(RoundEnd::NextRound(self.round_number))
            }
            Phase::GameOver if !self.verdict_announced => {
                self.verdict_announced = true;
                self.verdict.clone().map(RoundEnd::Finished)
            }
            _ => None,
        }
    }
}
