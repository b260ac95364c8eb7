//! Faults a client can trigger; each one becomes an `error` frame for the sender

use crate::game::Phase;
use shared::{ProtocolError, Role};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("InvalidActionForPhase: {role:?} cannot do that during {phase:?}")]
    InvalidActionForPhase { phase: Phase, role: Role },
    #[error("SessionNotFound: no lobby with id '{0}'")]
    SessionNotFound(String),
    #[error("SessionFull: lobby '{0}' already has two players")]
    SessionFull(String),
    #[error("already in a lobby")]
    AlreadyInLobby,
    #[error("not in a lobby")]
    NotInLobby,
    #[error("invalid path {index}: {reason}")]
    InvalidPath { index: usize, reason: String },
    #[error("{paths} paths submitted for {workers} workers")]
    TooManyPaths { paths: usize, workers: u32 },
    #[error("{ambushes} ambushes placed but only {purchased} purchased")]
    TooManyAmbushes { ambushes: usize, purchased: u32 },
    #[error("nothing to refund")]
    NothingToRefund,
}

impl GameError {
    /// Shorthand for the usual wrong-phase rejection.
    pub fn phase(phase: Phase, role: Role) -> Self {
        GameError::InvalidActionForPhase { phase, role }
    }
}
