//! Seeded hex resource map generation
//!
//! The castle sits at the center and is ringed by moat; every ring beyond
//! that is filled from a shuffled deck of field types in fixed proportions.
//! The same seed always yields the same map.

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{FieldAssignment, FieldType, HexCoord};
use std::collections::HashMap;

/// Largest integer a JavaScript client can hold without losing precision.
pub const MAX_SEED: u64 = (1 << 53) - 1;

const WOOD_SHARE: f64 = 0.3;
const WHEAT_SHARE: f64 = 0.3;
const ORE_SHARE: f64 = 0.2;

/// Draws a fresh seed for a new match.
pub fn fresh_seed() -> u64 {
    rand::random::<u64>() & MAX_SEED
}

/// Builds the full field assignment for a map of the given radius.
pub fn generate_map(seed: u64, radius: u32) -> Vec<FieldAssignment> {
    let mut assignments = Vec::new();
    let mut place = |hex: HexCoord, field_type: FieldType| {
        assignments.push(FieldAssignment {
            q: hex.q,
            r: hex.r,
            field_type,
        })
    };

    for hex in HexCoord::ring(0) {
        place(hex, FieldType::Castle);
    }
    if radius >= 1 {
        for hex in HexCoord::ring(1) {
            place(hex, FieldType::Moat);
        }
    }

    let outer: Vec<HexCoord> = (2..=radius).flat_map(HexCoord::ring).collect();
    let mut deck = field_deck(outer.len());
    let mut rng = StdRng::seed_from_u64(seed);
    deck.shuffle(&mut rng);

    for (hex, field_type) in outer.into_iter().zip(deck) {
        place(hex, field_type);
    }

    debug!("Generated map with seed {} ({} fields)", seed, assignments.len());
    assignments
}

fn field_deck(size: usize) -> Vec<FieldType> {
    let wood = (size as f64 * WOOD_SHARE).round() as usize;
    let wheat = (size as f64 * WHEAT_SHARE).round() as usize;
    let ore = (size as f64 * ORE_SHARE).round() as usize;
    let desert = size.saturating_sub(wood + wheat + ore);

    let mut deck = Vec::with_capacity(size);
    deck.extend(std::iter::repeat(FieldType::Wood).take(wood));
    deck.extend(std::iter::repeat(FieldType::Wheat).take(wheat));
    deck.extend(std::iter::repeat(FieldType::Ore).take(ore));
    deck.extend(std::iter::repeat(FieldType::Desert).take(desert));
    deck.truncate(size);
    deck
}

/// Lookup view over one match's generated map
#[derive(Debug, Clone)]
pub struct ResourceMap {
    seed: u64,
    assignments: Vec<FieldAssignment>,
    fields: HashMap<HexCoord, FieldType>,
}

impl ResourceMap {
    pub fn generate(seed: u64, radius: u32) -> Self {
        Self::from_assignments(seed, generate_map(seed, radius))
    }

    pub fn from_assignments(seed: u64, assignments: Vec<FieldAssignment>) -> Self {
        let fields = assignments
            .iter()
            .map(|a| (a.coord(), a.field_type))
            .collect();
        Self {
            seed,
            assignments,
            fields,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn field_at(&self, hex: HexCoord) -> Option<FieldType> {
        self.fields.get(&hex).copied()
    }

    pub fn assignments(&self) -> &[FieldAssignment] {
        &self.assignments
    }

    /// Castle and moat only: what the Bandit is allowed to see.
    pub fn reserved_view(&self) -> Vec<FieldAssignment> {
        self.assignments
            .iter()
            .filter(|a| a.field_type.is_reserved())
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
