//! Win and loss checks run once after every resolved round

use shared::{Resources, Role, AMBUSH_COST, BANDIT_GOLD_TO_WIN, KING_GOLD_TO_WIN};
use shared::{WORKER_GRAIN_COST, WORKER_WOOD_COST};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub winner: Role,
    pub reason: String,
}

impl Verdict {
    pub fn new(winner: Role, reason: impl Into<String>) -> Self {
        Self {
            winner,
            reason: reason.into(),
        }
    }
}

/// Checks the end conditions in priority order; the first one that holds
/// decides the match.
pub fn evaluate(king: &Resources, bandit: &Resources, king_workers: u32) -> Option<Verdict> {
    if king.gold >= KING_GOLD_TO_WIN {
        return Some(Verdict::new(
            Role::King,
            format!("King collected {} gold", KING_GOLD_TO_WIN),
        ));
    }

    if bandit.gold >= BANDIT_GOLD_TO_WIN {
        return Some(Verdict::new(
            Role::Bandit,
            format!("Bandit collected {} gold", BANDIT_GOLD_TO_WIN),
        ));
    }

    let king_can_recruit = king.grain >= WORKER_GRAIN_COST && king.wood >= WORKER_WOOD_COST;
    if king_workers == 0 && !king_can_recruit {
        return Some(Verdict::new(
            Role::Bandit,
            "King has no workers and cannot afford another",
        ));
    }

    if bandit.wood.max(bandit.grain) < AMBUSH_COST {
        return Some(Verdict::new(Role::King, "Bandit cannot afford an ambush"));
    }

    None
}
