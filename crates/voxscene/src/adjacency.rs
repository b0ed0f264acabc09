//! # Adjacency Graph Reconstruction
//!
//! Chunk documents store bare point clouds. This module infers which points
//! are lattice neighbors and gives every chunk a deterministic visitation
//! order.
//!
//! ## Predicates
//!
//! | Strictness | Neighbors when                                 |
//! |------------|------------------------------------------------|
//! | `Loose`    | any axis differs by 1                          |
//! | `Strict`   | one axis differs by 1, the other two by 0      |
//!
//! Differences are compared with a tolerance (`epsilon`).
//!
//! ## Methods
//!
//! - `AllPairs`: O(N²) scan, works for any input
//! - `SpatialHash`: integer cell map probing the 6 face neighbors, near
//!   linear, strict lattice-aligned input only
//! - `Auto`: spatial hash for large strict lattice input, else all pairs
//!
//! ## Ordering
//!
//! Points are sorted by Euclidean distance from the componentwise minimum
//! corner of the chunk, ties broken by index.

use std::collections::{BTreeMap, HashMap};
use std::thread;

use crossbeam_channel::unbounded;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::chunk::{Chunk, Point3};
use crate::config::AdjacencyConfig;
use crate::error::{VoxSceneError, VoxSceneResult};

/// Rows scanned between cancellation polls.
const POLL_INTERVAL: usize = 64;

/// Face-neighbor cell offsets.
const FACE_OFFSETS: [[i64; 3]; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];

/// Neighbor predicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Any axis differs by one unit, whatever the other axes hold, so
    /// `(1,0,0)` and `(0,0,1)` are neighbors.
    #[default]
    Loose,
    /// Exactly one axis differs by one unit, the others are equal.
    Strict,
}

/// Pair discovery strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Compare every pair.
    AllPairs,
    /// Integer cell map (strict rule only).
    SpatialHash,
    /// Pick per chunk.
    #[default]
    Auto,
}

/// The pass was cancelled before the graph was complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interrupted;

/// Neighbor graph of one chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdjacencyGraph {
    order: Vec<u32>,
    edges: Vec<(u32, u32)>,
    offsets: Vec<usize>,
    neighbors: Vec<u32>,
}

impl AdjacencyGraph {
    fn from_parts(order: Vec<u32>, mut edges: Vec<(u32, u32)>) -> Self {
        edges.sort_unstable();
        edges.dedup();

        let n = order.len();
        let mut degree = vec![0usize; n];
        for &(a, b) in &edges {
            degree[a as usize] += 1;
            degree[b as usize] += 1;
        }
        let mut offsets = Vec::with_capacity(n + 1);
        let mut total = 0;
        offsets.push(total);
        for d in &degree {
            total += d;
            offsets.push(total);
        }
        let mut cursor = offsets[..n].to_vec();
        let mut neighbors = vec![0u32; edges.len() * 2];
        for &(a, b) in &edges {
            neighbors[cursor[a as usize]] = b;
            cursor[a as usize] += 1;
            neighbors[cursor[b as usize]] = a;
            cursor[b as usize] += 1;
        }

        Self {
            order,
            edges,
            offsets,
            neighbors,
        }
    }

    /// Number of points.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true for a graph over no points.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Point indices in visitation order.
    #[must_use]
    pub fn order(&self) -> &[u32] {
        &self.order
    }

    /// Unordered pairs, each stored once as `(low, high)`, sorted.
    #[must_use]
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if `i` and `j` are neighbors, in either direction.
    #[must_use]
    pub fn contains(&self, i: u32, j: u32) -> bool {
        let key = if i <= j { (i, j) } else { (j, i) };
        self.edges.binary_search(&key).is_ok()
    }

    /// Neighbors of `i`, ascending. Empty for out-of-range indices.
    #[must_use]
    pub fn neighbors(&self, i: u32) -> &[u32] {
        let i = i as usize;
        if i >= self.order.len() {
            return &[];
        }
        &self.neighbors[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Number of neighbors of `i`.
    #[must_use]
    pub fn degree(&self, i: u32) -> usize {
        self.neighbors(i).len()
    }

    /// Edges as a flat `a, b, a, b, ...` index buffer.
    #[must_use]
    pub fn flat_edges(&self) -> Vec<u32> {
        self.edges.iter().flat_map(|&(a, b)| [a, b]).collect()
    }

    /// Edges renumbered by visitation rank, each as `(low, high)`, sorted.
    #[must_use]
    pub fn renumbered_edges(&self) -> Vec<(u32, u32)> {
        let mut rank = vec![0u32; self.order.len()];
        for (position, &index) in self.order.iter().enumerate() {
            rank[index as usize] = position as u32;
        }
        let mut edges: Vec<(u32, u32)> = self
            .edges
            .iter()
            .map(|&(a, b)| {
                let (ra, rb) = (rank[a as usize], rank[b as usize]);
                if ra <= rb {
                    (ra, rb)
                } else {
                    (rb, ra)
                }
            })
            .collect();
        edges.sort_unstable();
        edges
    }
}

/// Builds adjacency graphs under one configuration.
#[derive(Clone, Debug)]
pub struct AdjacencyBuilder {
    strictness: Strictness,
    method: Method,
    epsilon: f64,
    threshold: usize,
}

impl Default for AdjacencyBuilder {
    fn default() -> Self {
        Self::from_config(&AdjacencyConfig::default())
    }
}

impl AdjacencyBuilder {
    /// Creates a builder from configuration.
    #[must_use]
    pub fn from_config(config: &AdjacencyConfig) -> Self {
        Self {
            strictness: config.strictness,
            method: config.method,
            epsilon: config.epsilon,
            threshold: config.spatial_hash_threshold,
        }
    }

    /// Sets the neighbor predicate.
    #[must_use]
    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    /// Sets the discovery method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Neighbor test for two points.
    #[must_use]
    pub fn is_adjacent(&self, p: Point3, q: Point3) -> bool {
        let eps = self.epsilon;
        let d = [
            (f64::from(p.x) - f64::from(q.x)).abs(),
            (f64::from(p.y) - f64::from(q.y)).abs(),
            (f64::from(p.z) - f64::from(q.z)).abs(),
        ];
        let unit = |v: f64| (v - 1.0).abs() <= eps;
        match self.strictness {
            Strictness::Loose => d.iter().copied().any(unit),
            Strictness::Strict => {
                let units = d.iter().copied().filter(|&v| unit(v)).count();
                let zeros = d.iter().filter(|&&v| v <= eps).count();
                units == 1 && zeros == 2
            }
        }
    }

    /// Method actually used for `points`.
    #[must_use]
    pub fn effective_method(&self, points: &[Point3]) -> Method {
        let hashable =
            self.strictness == Strictness::Strict && is_lattice_aligned(points, self.epsilon);
        match self.method {
            Method::SpatialHash if hashable => Method::SpatialHash,
            Method::Auto if hashable && points.len() > self.threshold => Method::SpatialHash,
            _ => Method::AllPairs,
        }
    }

    /// Builds the graph for one point set.
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if `cancel` fires before completion.
    pub fn build(&self, points: &[Point3], cancel: &CancelToken) -> Result<AdjacencyGraph, Interrupted> {
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        let order = visitation_order(points);
        let edges = match self.effective_method(points) {
            Method::SpatialHash => self.hashed_pairs(points, cancel)?,
            _ => self.all_pairs(points, cancel)?,
        };
        Ok(AdjacencyGraph::from_parts(order, edges))
    }

    fn all_pairs(&self, points: &[Point3], cancel: &CancelToken) -> Result<Vec<(u32, u32)>, Interrupted> {
        let mut edges = Vec::new();
        for (i, &p) in points.iter().enumerate() {
            if i % POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(Interrupted);
            }
            for (j, &q) in points.iter().enumerate().skip(i + 1) {
                if self.is_adjacent(p, q) {
                    edges.push((i as u32, j as u32));
                }
            }
        }
        Ok(edges)
    }

    fn hashed_pairs(&self, points: &[Point3], cancel: &CancelToken) -> Result<Vec<(u32, u32)>, Interrupted> {
        let mut cells: HashMap<[i64; 3], Vec<u32>> = HashMap::with_capacity(points.len());
        for (i, &p) in points.iter().enumerate() {
            cells.entry(cell_of(p)).or_default().push(i as u32);
        }

        let mut edges = Vec::new();
        for (i, &p) in points.iter().enumerate() {
            if i % POLL_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(Interrupted);
            }
            let [x, y, z] = cell_of(p);
            for [dx, dy, dz] in FACE_OFFSETS {
                let Some(hits) = cells.get(&[x + dx, y + dy, z + dz]) else {
                    continue;
                };
                for &j in hits {
                    if j as usize > i && self.is_adjacent(p, points[j as usize]) {
                        edges.push((i as u32, j));
                    }
                }
            }
        }
        Ok(edges)
    }
}

fn cell_of(p: Point3) -> [i64; 3] {
    [
        f64::from(p.x).round() as i64,
        f64::from(p.y).round() as i64,
        f64::from(p.z).round() as i64,
    ]
}

/// Returns true if every coordinate is finite and within `epsilon` of an
/// integer.
#[must_use]
pub fn is_lattice_aligned(points: &[Point3], epsilon: f64) -> bool {
    points.iter().flat_map(|p| p.to_array()).all(|c| {
        let c = f64::from(c);
        c.is_finite() && c.abs() < 1e15 && (c - c.round()).abs() <= epsilon
    })
}

/// Componentwise minimum, or `None` for no points.
#[must_use]
pub fn min_corner(points: &[Point3]) -> Option<Point3> {
    points.iter().copied().reduce(Point3::min)
}

/// Indices sorted by distance from the minimum corner, ties by index.
#[must_use]
pub fn visitation_order(points: &[Point3]) -> Vec<u32> {
    let Some(corner) = min_corner(points) else {
        return Vec::new();
    };
    let mut keyed: Vec<(f64, u32)> = points
        .iter()
        .enumerate()
        .map(|(i, &p)| (p.distance(corner), i as u32))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, i)| i).collect()
}

/// Builds graphs for every chunk on a worker pool.
///
/// Chunks are queued on a channel and drained by scoped worker threads;
/// results are keyed by chunk name.
///
/// # Errors
///
/// Returns `AdjacencyInterrupted` naming the first interrupted chunk (by
/// name) if `cancel` fires. No partial graphs are returned.
pub fn build_all(
    chunks: &[Chunk],
    config: &AdjacencyConfig,
    cancel: &CancelToken,
) -> VoxSceneResult<BTreeMap<String, AdjacencyGraph>> {
    if chunks.is_empty() {
        return Ok(BTreeMap::new());
    }
    let builder = AdjacencyBuilder::from_config(config);
    let workers = config.worker_count(chunks.len());

    let (job_tx, job_rx) = unbounded::<&Chunk>();
    let (result_tx, result_rx) = unbounded();
    for chunk in chunks {
        if job_tx.send(chunk).is_err() {
            break;
        }
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let builder = &builder;
            scope.spawn(move || {
                for chunk in job_rx.iter() {
                    let outcome = builder.build(&chunk.points, cancel);
                    if let Ok(graph) = &outcome {
                        debug!(
                            chunk = %chunk.name,
                            points = chunk.len(),
                            edges = graph.edge_count(),
                            "built adjacency"
                        );
                    }
                    if result_tx.send((chunk.name.clone(), outcome)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let outcomes: BTreeMap<String, Result<AdjacencyGraph, Interrupted>> =
        result_rx.try_iter().collect();
    if let Some((name, _)) = outcomes.iter().find(|(_, o)| o.is_err()) {
        warn!(chunk = %name, "adjacency pass interrupted");
        return Err(VoxSceneError::AdjacencyInterrupted(name.clone()));
    }
    let graphs = outcomes
        .into_iter()
        .filter_map(|(name, outcome)| outcome.ok().map(|g| (name, g)))
        .collect();
    Ok(graphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxscene_stage::SdfPath;

    fn pts(raw: &[[f32; 3]]) -> Vec<Point3> {
        raw.iter().copied().map(Point3::from).collect()
    }

    fn scenario() -> Vec<Point3> {
        pts(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [5.0, 5.0, 5.0]])
    }

    fn build(points: &[Point3], strictness: Strictness, method: Method) -> AdjacencyGraph {
        AdjacencyBuilder::default()
            .with_strictness(strictness)
            .with_method(method)
            .build(points, &CancelToken::new())
            .unwrap()
    }

    #[test]
    fn test_strict_scenario() {
        let graph = build(&scenario(), Strictness::Strict, Method::AllPairs);
        assert_eq!(graph.edges(), &[(0, 1), (0, 2)]);
        assert_eq!(graph.order()[0], 0);
        assert_eq!(graph.degree(3), 0);
    }

    #[test]
    fn test_loose_scenario() {
        // (1,0,0) and (0,0,1) differ by 1 on X, so the loose rule links them.
        let graph = build(&scenario(), Strictness::Loose, Method::AllPairs);
        assert_eq!(graph.edges(), &[(0, 1), (0, 2), (1, 2)]);
        assert_eq!(graph.neighbors(3), &[] as &[u32]);
    }

    #[test]
    fn test_symmetry_and_no_self_loops() {
        let points = pts(&[
            [0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0],
        ]);
        let graph = build(&points, Strictness::Loose, Method::AllPairs);
        for &(a, b) in graph.edges() {
            assert!(a < b);
            assert!(graph.contains(a, b) && graph.contains(b, a));
            assert!(graph.neighbors(a).contains(&b) && graph.neighbors(b).contains(&a));
        }
        // exact duplicates are never adjacent to each other
        assert!(!graph.contains(0, 3));
        for i in 0..4 {
            assert!(!graph.contains(i, i));
        }
    }

    #[test]
    fn test_loose_ignores_other_axes() {
        let points = pts(&[[0.0, 0.0, 0.0], [1.0, 7.0, -3.0]]);
        assert_eq!(build(&points, Strictness::Loose, Method::AllPairs).edge_count(), 1);
        assert_eq!(build(&points, Strictness::Strict, Method::AllPairs).edge_count(), 0);
    }

    #[test]
    fn test_epsilon_tolerance() {
        let points = pts(&[[0.0, 0.0, 0.0], [1.000_001, 0.0, 0.0], [0.0, 1.1, 0.0]]);
        let graph = build(&points, Strictness::Strict, Method::AllPairs);
        assert_eq!(graph.edges(), &[(0, 1)]);
    }

    #[test]
    fn test_spatial_hash_matches_all_pairs() {
        let mut raw = Vec::new();
        for x in 0..6 {
            for y in 0..4 {
                for z in 0..5 {
                    if (x * 7 + y * 3 + z) % 4 != 0 {
                        raw.push([x as f32, y as f32, z as f32]);
                    }
                }
            }
        }
        raw.push([2.0, 2.0, 2.0]);
        let points = pts(&raw);
        let hashed = build(&points, Strictness::Strict, Method::SpatialHash);
        let scanned = build(&points, Strictness::Strict, Method::AllPairs);
        assert!(hashed.edge_count() > 0);
        assert_eq!(hashed, scanned);
    }

    #[test]
    fn test_effective_method() {
        let lattice = pts(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let off = pts(&[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0]]);
        let strict = AdjacencyBuilder::default().with_strictness(Strictness::Strict);
        let hash = strict.clone().with_method(Method::SpatialHash);
        assert_eq!(hash.effective_method(&lattice), Method::SpatialHash);
        assert_eq!(hash.effective_method(&off), Method::AllPairs);
        assert_eq!(
            AdjacencyBuilder::default()
                .with_method(Method::SpatialHash)
                .effective_method(&lattice),
            Method::AllPairs
        );
        // below the threshold auto scans
        assert_eq!(strict.effective_method(&lattice), Method::AllPairs);
    }

    #[test]
    fn test_auto_hashes_above_threshold() {
        let config = AdjacencyConfig {
            strictness: Strictness::Strict,
            spatial_hash_threshold: 3,
            ..AdjacencyConfig::default()
        };
        let auto = AdjacencyBuilder::from_config(&config);
        let points = pts(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [5.0, 5.0, 5.0],
        ]);
        assert_eq!(auto.effective_method(&points), Method::SpatialHash);
        assert_eq!(auto.effective_method(&points[..3]), Method::AllPairs);

        let cancel = CancelToken::new();
        let hashed = auto.build(&points, &cancel).unwrap();
        let scanned = auto
            .clone()
            .with_method(Method::AllPairs)
            .build(&points, &cancel)
            .unwrap();
        assert_eq!(hashed, scanned);
        assert_eq!(hashed.edges(), &[(0, 1), (0, 2), (1, 3), (2, 3)]);

        // default threshold
        let side = 13u8;
        let mut cube = Vec::new();
        for x in 0..side {
            for y in 0..side {
                for z in 0..side {
                    cube.push(Point3::new(f32::from(x), f32::from(y), f32::from(z)));
                }
            }
        }
        let strict = AdjacencyBuilder::default().with_strictness(Strictness::Strict);
        assert!(cube.len() > AdjacencyConfig::default().spatial_hash_threshold);
        assert_eq!(strict.effective_method(&cube), Method::SpatialHash);
    }

    #[test]
    fn test_order_by_distance_then_index() {
        let points = pts(&[[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        let graph = build(&points, Strictness::Loose, Method::AllPairs);
        assert_eq!(graph.order(), &[3, 2, 0, 1]);
    }

    #[test]
    fn test_order_without_exact_corner() {
        let points = pts(&[[3.0, 3.0, 3.0], [0.0, 5.0, 0.0], [1.0, 0.0, 1.0]]);
        assert_eq!(min_corner(&points), Some(Point3::new(0.0, 0.0, 0.0)));
        let order = visitation_order(&points);
        assert_eq!(order[0], 2);
        let corner = min_corner(&points).unwrap();
        let distances: Vec<f64> = order
            .iter()
            .map(|&i| points[i as usize].distance(corner))
            .collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_renumbered_and_flat_edges() {
        let points = pts(&[[5.0, 0.0, 0.0], [4.0, 0.0, 0.0], [0.0, 0.0, 0.0]]);
        let graph = build(&points, Strictness::Strict, Method::AllPairs);
        assert_eq!(graph.order(), &[2, 1, 0]);
        assert_eq!(graph.edges(), &[(0, 1)]);
        assert_eq!(graph.flat_edges(), vec![0, 1]);
        assert_eq!(graph.renumbered_edges(), vec![(1, 2)]);
    }

    #[test]
    fn test_empty_input() {
        let graph = build(&[], Strictness::Strict, Method::Auto);
        assert!(graph.is_empty());
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.neighbors(0), &[] as &[u32]);
    }

    #[test]
    fn test_cancelled_build() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = AdjacencyBuilder::default().build(&scenario(), &cancel);
        assert_eq!(result, Err(Interrupted));
    }

    fn chunk(name: &str, points: Vec<Point3>) -> Chunk {
        let count = points.len();
        Chunk {
            name: name.to_string(),
            path: SdfPath::root().child(name),
            points,
            instance_indices: vec![0; count],
            prototypes: vec![SdfPath::root().child("Block_1_0")],
        }
    }

    #[test]
    fn test_build_all_parallel() {
        let chunks: Vec<Chunk> = (0..9)
            .map(|i| chunk(&format!("Chunk_{i}"), scenario()))
            .collect();
        let config = AdjacencyConfig {
            workers: 3,
            ..AdjacencyConfig::default()
        };
        let graphs = build_all(&chunks, &config, &CancelToken::new()).unwrap();
        assert_eq!(graphs.len(), 9);
        for graph in graphs.values() {
            assert_eq!(graph.edges(), &[(0, 1), (0, 2), (1, 2)]);
        }
    }

    #[test]
    fn test_build_all_interrupted() {
        let chunks = vec![chunk("Chunk_a", scenario()), chunk("Chunk_b", scenario())];
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = build_all(&chunks, &AdjacencyConfig::default(), &cancel).unwrap_err();
        assert!(matches!(err, VoxSceneError::AdjacencyInterrupted(ref name) if name == "Chunk_a"));
    }
}
