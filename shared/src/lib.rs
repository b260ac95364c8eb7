use serde::{Deserialize, Serialize};

pub mod hex;
pub mod protocol;

pub use hex::{AmbushEdge, Corner, EdgeKey, HexCoord, HexVertex, VertexKey, CENTER};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};

pub const WORKER_GRAIN_COST: u32 = 20;
pub const WORKER_WOOD_COST: u32 = 8;
pub const WAGON_WOOD_COST: u32 = 25;
pub const AMBUSH_COST: u32 = 12;

pub const KING_GOLD_TO_WIN: u32 = 200;
pub const BANDIT_GOLD_TO_WIN: u32 = 100;

pub const VALUE_PER_RING: f64 = 15.0;
pub const MIN_PATH_VALUE: f64 = 8.0;
pub const WORKER_DECAY_PER_EDGE: f64 = 3.0;
pub const WAGON_DECAY_PER_EDGE: f64 = 1.5;

pub const KING_STARTING_RESOURCES: Resources = Resources {
    gold: 0,
    wood: 40,
    grain: 60,
};
pub const BANDIT_STARTING_RESOURCES: Resources = Resources {
    gold: 0,
    wood: 36,
    grain: 36,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    King,
    Bandit,
    Unassigned,
}

impl Role {
    pub fn opponent(&self) -> Role {
        match self {
            Role::King => Role::Bandit,
            Role::Bandit => Role::King,
            Role::Unassigned => Role::Unassigned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Gold,
    Wood,
    Grain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Castle,
    Moat,
    Wood,
    Wheat,
    Ore,
    Desert,
}

impl FieldType {
    /// Castle and moat make up the ring both players can always see.
    pub fn is_reserved(&self) -> bool {
        matches!(self, FieldType::Castle | FieldType::Moat)
    }

    /// The resource a completed or intercepted path from this field pays out.
    pub fn yield_kind(&self) -> Option<ResourceKind> {
        match self {
            FieldType::Ore => Some(ResourceKind::Gold),
            FieldType::Wood => Some(ResourceKind::Wood),
            FieldType::Wheat => Some(ResourceKind::Grain),
            FieldType::Castle | FieldType::Moat | FieldType::Desert => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub gold: u32,
    pub wood: u32,
    pub grain: u32,
}

impl Resources {
    pub const fn new(gold: u32, wood: u32, grain: u32) -> Self {
        Self { gold, wood, grain }
    }

    pub fn get(&self, kind: ResourceKind) -> u32 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Wood => self.wood,
            ResourceKind::Grain => self.grain,
        }
    }

    pub fn credit(&mut self, kind: ResourceKind, amount: u32) {
        match kind {
            ResourceKind::Gold => self.gold += amount,
            ResourceKind::Wood => self.wood += amount,
            ResourceKind::Grain => self.grain += amount,
        }
    }

    pub fn can_afford(&self, cost: &Resources) -> bool {
        self.gold >= cost.gold && self.wood >= cost.wood && self.grain >= cost.grain
    }

    /// Deducts `cost` if every component is covered. Leaves `self` untouched
    /// and returns false otherwise.
    pub fn try_spend(&mut self, cost: &Resources) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.gold -= cost.gold;
        self.wood -= cost.wood;
        self.grain -= cost.grain;
        true
    }

    pub fn refund(&mut self, cost: &Resources) {
        self.gold += cost.gold;
        self.wood += cost.wood;
        self.grain += cost.grain;
    }

    pub fn add(&mut self, other: &Resources) {
        self.refund(other);
    }

    pub fn single(kind: ResourceKind, amount: u32) -> Resources {
        let mut resources = Resources::default();
        resources.credit(kind, amount);
        resources
    }
}

/// One hex of a generated resource map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAssignment {
    pub q: i32,
    pub r: i32,
    #[serde(rename = "fieldType")]
    pub field_type: FieldType,
}

impl FieldAssignment {
    pub fn coord(&self) -> HexCoord {
        HexCoord::new(self.q, self.r)
    }
}

/// The field a King path departs from, as declared by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginField {
    #[serde(deserialize_with = "hex::bounded_coordinate")]
    pub q: i32,
    #[serde(deserialize_with = "hex::bounded_coordinate")]
    pub r: i32,
    #[serde(rename = "fieldType")]
    pub field_type: FieldType,
}

impl OriginField {
    pub fn coord(&self) -> HexCoord {
        HexCoord::new(self.q, self.r)
    }
}

/// A walk one King worker takes from a resource field to the castle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSubmission {
    pub vertices: Vec<HexVertex>,
    #[serde(rename = "originField")]
    pub origin_field: OriginField,
    #[serde(rename = "isWagonWorker", default)]
    pub is_wagon_worker: bool,
}

impl PathSubmission {
    pub fn edge_count(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    /// Order-independent keys of the path's edges, from the origin onwards.
    pub fn edge_keys(&self) -> Vec<EdgeKey> {
        self.vertices
            .windows(2)
            .map(|pair| EdgeKey::between(&pair[0], &pair[1]))
            .collect()
    }

    /// At least one edge, and every step moves to a neighbouring vertex.
    pub fn is_connected(&self) -> bool {
        self.vertices.len() >= 2
            && self
                .vertices
                .windows(2)
                .all(|pair| pair[0].is_adjacent(&pair[1]))
    }
}

/// How a single King path fared in a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathOutcome {
    #[serde(rename = "pathIndex")]
    pub path_index: usize,
    pub intercepted: bool,
    /// Index into the round's ambush list of the ambush that caught this path.
    #[serde(rename = "ambushIndex")]
    pub ambush_index: Option<usize>,
    #[serde(rename = "travelledEdges")]
    pub travelled_edges: u32,
    pub value: u32,
    pub resource: Option<ResourceKind>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkersLost {
    pub regular: u32,
    pub wagon: u32,
}

impl WorkersLost {
    pub fn total(&self) -> u32 {
        self.regular + self.wagon
    }
}

/// Everything clients need to replay a resolved round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    #[serde(rename = "roundNumber")]
    pub round_number: u32,
    #[serde(rename = "kingPaths")]
    pub king_paths: Vec<PathSubmission>,
    #[serde(rename = "banditAmbushes")]
    pub bandit_ambushes: Vec<AmbushEdge>,
    #[serde(rename = "banditBonus")]
    pub bandit_bonus: Resources,
    #[serde(rename = "kingBonus")]
    pub king_bonus: Resources,
    pub outcome: Vec<PathOutcome>,
    #[serde(rename = "workersLost")]
    pub workers_lost: WorkersLost,
    #[serde(rename = "lostWorkerPaths")]
    pub lost_worker_paths: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn path(vertices: Vec<HexVertex>) -> PathSubmission {
        PathSubmission {
            vertices,
            origin_field: OriginField {
                q: 2,
                r: -1,
                field_type: FieldType::Wood,
            },
            is_wagon_worker: false,
        }
    }

    #[test]
    fn test_wagons_decay_at_half_rate() {
        assert_approx_eq!(WAGON_DECAY_PER_EDGE * 2.0, WORKER_DECAY_PER_EDGE);
        assert_approx_eq!(VALUE_PER_RING - 3.0 * WORKER_DECAY_PER_EDGE, 6.0);
    }

    #[test]
    fn test_yield_kinds() {
        assert_eq!(FieldType::Ore.yield_kind(), Some(ResourceKind::Gold));
        assert_eq!(FieldType::Wood.yield_kind(), Some(ResourceKind::Wood));
        assert_eq!(FieldType::Wheat.yield_kind(), Some(ResourceKind::Grain));
        assert_eq!(FieldType::Desert.yield_kind(), None);
        assert_eq!(FieldType::Castle.yield_kind(), None);
        assert!(FieldType::Moat.is_reserved());
        assert!(!FieldType::Ore.is_reserved());
    }

    #[test]
    fn test_role_opponent() {
        assert_eq!(Role::King.opponent(), Role::Bandit);
        assert_eq!(Role::Bandit.opponent(), Role::King);
        assert_eq!(Role::Unassigned.opponent(), Role::Unassigned);
    }

    #[test]
    fn test_try_spend_is_all_or_nothing() {
        let mut wallet = Resources::new(0, 5, 30);
        let cost = Resources::new(0, WORKER_WOOD_COST, WORKER_GRAIN_COST);

        assert!(!wallet.try_spend(&cost));
        assert_eq!(wallet, Resources::new(0, 5, 30));

        wallet.credit(ResourceKind::Wood, 3);
        assert!(wallet.try_spend(&cost));
        assert_eq!(wallet, Resources::new(0, 0, 10));
    }

    #[test]
    fn test_spend_then_refund_restores_wallet() {
        let start = Resources::new(7, 40, 60);
        let mut wallet = start;
        let cost = Resources::new(0, WORKER_WOOD_COST, WORKER_GRAIN_COST);

        assert!(wallet.try_spend(&cost));
        assert!(wallet.try_spend(&cost));
        wallet.refund(&cost);
        wallet.refund(&cost);
        assert_eq!(wallet, start);
    }

    #[test]
    fn test_path_edges() {
        let p = path(vec![
            HexVertex::new(1, 0, Corner::S),
            HexVertex::new(1, 0, Corner::SW),
            HexVertex::new(0, 0, Corner::SE),
        ]);
        // SW(1,0) and SE(0,0) are the same point, so the last step is not an edge.
        assert_eq!(p.edge_count(), 2);
        assert!(!p.is_connected());

        let p = path(vec![
            HexVertex::new(1, 0, Corner::S),
            HexVertex::new(1, 0, Corner::SW),
            HexVertex::new(1, 0, Corner::NW),
        ]);
        assert!(p.is_connected());
        assert_eq!(p.edge_keys().len(), 2);

        assert!(!path(vec![HexVertex::new(0, 0, Corner::N)]).is_connected());
    }

    #[test]
    fn test_path_submission_wire_names() {
        let json = serde_json::json!({
            "vertices": [
                {"q": 2, "r": -1, "direction": "N"},
                {"q": 2, "r": -1, "direction": "NE"}
            ],
            "originField": {"q": 2, "r": -1, "fieldType": "wood"},
            "isWagonWorker": true
        });
        let p: PathSubmission = serde_json::from_value(json).unwrap();
        assert!(p.is_wagon_worker);
        assert_eq!(p.origin_field.field_type, FieldType::Wood);
        assert_eq!(p.vertices[1].direction, Corner::NE);
    }
}
