//! Axial hex geometry for the board's vertex graph
//!
//! The board is a field of pointy-top hexes addressed by axial `(q, r)`
//! coordinates, with the castle at `(0, 0)`. Workers walk along hex edges, so
//! the interesting graph is the one formed by hex *corners*.
//!
//! Every physical corner is shared by up to three hexes, which means the same
//! point can arrive over the wire as three different `(hex, corner)` pairs
//! depending on which hex the sender happened to use as reference. All
//! comparisons therefore go through [`VertexKey`], which folds every corner
//! onto either the north or the south corner of exactly one hex:
//!
//! - `NE(q, r)` is `S(q + 1, r - 1)`
//! - `SE(q, r)` is `N(q, r + 1)`
//! - `SW(q, r)` is `N(q - 1, r + 1)`
//! - `NW(q, r)` is `S(q, r - 1)`
//!
//! Edges are keyed by their two sorted endpoint keys ([`EdgeKey`]), so an edge
//! compares equal no matter which end it was described from.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::hash::{Hash, Hasher};

/// Axial neighbour offsets, in ring-walk order (E, NE, NW, W, SW, SE).
const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

/// The castle hex every King path must end on.
pub const CENTER: HexCoord = HexCoord { q: 0, r: 0 };

/// Largest `|q|` or `|r|` accepted from a client. Far beyond any board, and
/// small enough that neighbour and distance arithmetic cannot overflow.
pub const MAX_WIRE_COORDINATE: i32 = 1 << 20;

/// Rejects client coordinates outside `±MAX_WIRE_COORDINATE`.
pub fn bounded_coordinate<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i32::deserialize(deserializer)?;
    if value.unsigned_abs() > MAX_WIRE_COORDINATE as u32 {
        return Err(D::Error::custom(format!(
            "coordinate {} is out of range",
            value
        )));
    }
    Ok(value)
}

/// Axial coordinate of a single hex cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexCoord {
    pub q: i32,
    pub r: i32,
}

impl HexCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Third cube coordinate, `s = -q - r`.
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    pub fn offset(&self, dq: i32, dr: i32) -> HexCoord {
        HexCoord::new(self.q.saturating_add(dq), self.r.saturating_add(dr))
    }

    /// Cube distance between two hexes.
    pub fn distance(&self, other: &HexCoord) -> u32 {
        let dq = i64::from(self.q) - i64::from(other.q);
        let dr = i64::from(self.r) - i64::from(other.r);
        let steps = (dq.abs() + (dq + dr).abs() + dr.abs()) / 2;
        u32::try_from(steps).unwrap_or(u32::MAX)
    }

    pub fn distance_from_center(&self) -> u32 {
        self.distance(&CENTER)
    }

    /// Returns every hex exactly `radius` steps from the center, walking the
    /// ring from its south-west end. Radius 0 is the center alone.
    pub fn ring(radius: u32) -> Vec<HexCoord> {
        if radius == 0 {
            return vec![CENTER];
        }

        let radius = radius as i32;
        let (start_q, start_r) = DIRECTIONS[4];
        let mut hex = HexCoord::new(start_q * radius, start_r * radius);
        let mut ring = Vec::with_capacity(6 * radius as usize);

        for (dq, dr) in DIRECTIONS {
            for _ in 0..radius {
                ring.push(hex);
                hex = hex.offset(dq, dr);
            }
        }

        ring
    }

    /// Canonical keys of this hex's six corners.
    pub fn corner_keys(&self) -> [VertexKey; 6] {
        Corner::ALL.map(|corner| VertexKey::of(*self, corner))
    }
}

/// One of the six corners of a pointy-top hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    N,
    NE,
    SE,
    S,
    SW,
    NW,
}

impl Corner {
    pub const ALL: [Corner; 6] = [
        Corner::N,
        Corner::NE,
        Corner::SE,
        Corner::S,
        Corner::SW,
        Corner::NW,
    ];
}

/// Which of the two canonical corners a [`VertexKey`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pole {
    North,
    South,
}

/// Canonical identity of a board vertex
///
/// Two [`HexVertex`] values describe the same point exactly when their keys
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexKey {
    pub hex: HexCoord,
    pub pole: Pole,
}

impl VertexKey {
    pub fn of(hex: HexCoord, corner: Corner) -> Self {
        let (hex, pole) = match corner {
            Corner::N => (hex, Pole::North),
            Corner::NE => (hex.offset(1, -1), Pole::South),
            Corner::SE => (hex.offset(0, 1), Pole::North),
            Corner::S => (hex, Pole::South),
            Corner::SW => (hex.offset(-1, 1), Pole::North),
            Corner::NW => (hex.offset(0, -1), Pole::South),
        };
        Self { hex, pole }
    }

    /// The three vertices one edge away.
    pub fn neighbors(&self) -> [VertexKey; 3] {
        let h = self.hex;
        match self.pole {
            Pole::North => [
                VertexKey::of(h, Corner::NE),
                VertexKey::of(h, Corner::NW),
                VertexKey::of(h.offset(1, -2), Corner::S),
            ],
            Pole::South => [
                VertexKey::of(h, Corner::SE),
                VertexKey::of(h, Corner::SW),
                VertexKey::of(h.offset(-1, 2), Corner::N),
            ],
        }
    }

    pub fn is_adjacent(&self, other: &VertexKey) -> bool {
        self.neighbors().contains(other)
    }
}

/// A vertex as it travels over the wire: a reference hex plus a corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexVertex {
    #[serde(deserialize_with = "bounded_coordinate")]
    pub q: i32,
    #[serde(deserialize_with = "bounded_coordinate")]
    pub r: i32,
    pub direction: Corner,
}

impl HexVertex {
    pub const fn new(q: i32, r: i32, direction: Corner) -> Self {
        Self { q, r, direction }
    }

    pub fn hex(&self) -> HexCoord {
        HexCoord::new(self.q, self.r)
    }

    pub fn key(&self) -> VertexKey {
        VertexKey::of(self.hex(), self.direction)
    }

    /// Whether both vertices name the same physical point.
    pub fn same_point(&self, other: &HexVertex) -> bool {
        self.key() == other.key()
    }

    pub fn is_adjacent(&self, other: &HexVertex) -> bool {
        self.key().is_adjacent(&other.key())
    }

    /// Whether this vertex is one of `hex`'s six corners.
    pub fn touches(&self, hex: HexCoord) -> bool {
        hex.corner_keys().contains(&self.key())
    }
}

/// Order-independent identity of an edge between two vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    low: VertexKey,
    high: VertexKey,
}

impl EdgeKey {
    pub fn new(a: VertexKey, b: VertexKey) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn between(a: &HexVertex, b: &HexVertex) -> Self {
        Self::new(a.key(), b.key())
    }

    pub fn endpoints(&self) -> (VertexKey, VertexKey) {
        (self.low, self.high)
    }

    /// False for degenerate or non-neighbouring endpoints.
    pub fn is_edge(&self) -> bool {
        self.low.is_adjacent(&self.high)
    }
}

/// Wire shape of an ambush: two corners in whatever order the client sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmbushEdgeWire {
    #[serde(rename = "cornerA")]
    corner_a: HexVertex,
    #[serde(rename = "cornerB")]
    corner_b: HexVertex,
}

/// An edge the Bandit lies in wait on
///
/// The corners are kept exactly as received so they can be echoed back to
/// clients, while equality and hashing use the [`EdgeKey`] computed once at
/// construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "AmbushEdgeWire", into = "AmbushEdgeWire")]
pub struct AmbushEdge {
    corner_a: HexVertex,
    corner_b: HexVertex,
    key: EdgeKey,
}

impl AmbushEdge {
    pub fn new(corner_a: HexVertex, corner_b: HexVertex) -> Self {
        Self {
            corner_a,
            corner_b,
            key: EdgeKey::between(&corner_a, &corner_b),
        }
    }

    pub fn corner_a(&self) -> HexVertex {
        self.corner_a
    }

    pub fn corner_b(&self) -> HexVertex {
        self.corner_b
    }

    pub fn key(&self) -> EdgeKey {
        self.key
    }

    /// The two corners must be graph neighbours.
    pub fn is_well_formed(&self) -> bool {
        self.key.is_edge()
    }
}

impl From<AmbushEdgeWire> for AmbushEdge {
    fn from(wire: AmbushEdgeWire) -> Self {
        AmbushEdge::new(wire.corner_a, wire.corner_b)
    }
}

impl From<AmbushEdge> for AmbushEdgeWire {
    fn from(edge: AmbushEdge) -> Self {
        AmbushEdgeWire {
            corner_a: edge.corner_a,
            corner_b: edge.corner_b,
        }
    }
}

impl PartialEq for AmbushEdge {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AmbushEdge {}

impl Hash for AmbushEdge {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
