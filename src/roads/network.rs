//! Merge per-asset paths into one road network
//!
//! Build order: snap nearby path vertices onto a shared vertex, drop edges
//! whose removal still leaves every connected asset reachable from the
//! entrance (longest first), prune dangling spurs, then merge runs of
//! degree-2 vertices into segments.

use ahash::AHashMap;
use geo::Coord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use crate::core::config::{RoadConfig, RoadSurface};
use crate::core::types::{distance, AssetId};
use crate::navigation::{AssetRoute, NavigationGraph, NodeId};

const GRADE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoadVertex {
    pub id: usize,
    pub position: Coord,
    pub elevation: f64,
}

/// Polyline between two junctions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadSegment {
    pub id: usize,
    pub from: usize,
    pub to: usize,
    pub points: Vec<Coord>,
    pub elevations: Vec<f64>,
    pub length: f64,
    pub max_grade: f64,
    pub width: f64,
    pub surface: RoadSurface,
    /// Built from switchback legs
    pub switchback: bool,
    /// Assets whose path uses this segment
    pub source_assets: Vec<AssetId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAccess {
    pub asset_id: AssetId,
    pub vertex: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadNetwork {
    pub vertices: Vec<RoadVertex>,
    pub segments: Vec<RoadSegment>,
    pub entrance: Option<usize>,
    pub asset_access: Vec<AssetAccess>,
}

impl RoadNetwork {
    pub fn total_length(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    pub fn max_grade(&self, include_switchbacks: bool) -> f64 {
        self.segments
            .iter()
            .filter(|s| include_switchbacks || !s.switchback)
            .map(|s| s.max_grade)
            .fold(0.0, f64::max)
    }

    /// Vertices reachable from the entrance over segments
    pub fn reachable_vertices(&self) -> Vec<bool> {
        let mut seen = vec![false; self.vertices.len()];
        let Some(entrance) = self.entrance.filter(|&e| e < seen.len()) else {
            return seen;
        };
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.vertices.len()];
        for s in &self.segments {
            adjacency[s.from].push(s.to);
            adjacency[s.to].push(s.from);
        }
        seen[entrance] = true;
        let mut queue = VecDeque::from([entrance]);
        while let Some(u) = queue.pop_front() {
            for &v in &adjacency[u] {
                if !seen[v] {
                    seen[v] = true;
                    queue.push_back(v);
                }
            }
        }
        seen
    }

    pub fn is_asset_connected(&self, asset_id: &AssetId) -> bool {
        let reachable = self.reachable_vertices();
        self.asset_access
            .iter()
            .any(|a| &a.asset_id == asset_id && reachable.get(a.vertex).copied().unwrap_or(false))
    }

    /// Assets from `expected` that the network does not reach
    pub fn disconnected_assets<'a>(&self, expected: impl IntoIterator<Item = &'a AssetId>) -> Vec<AssetId> {
        let reachable = self.reachable_vertices();
        expected
            .into_iter()
            .filter(|id| {
                !self
                    .asset_access
                    .iter()
                    .any(|a| &a.asset_id == *id && reachable.get(a.vertex).copied().unwrap_or(false))
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone)]
struct WorkEdge {
    a: usize,
    b: usize,
    switchback: bool,
    assets: BTreeSet<usize>,
}

#[derive(Debug, Clone)]
pub struct RoadNetworkBuilder {
    width: f64,
    surface: RoadSurface,
    snap_tolerance: f64,
    max_grade: f64,
}

impl RoadNetworkBuilder {
    pub fn new(config: &RoadConfig, cell_size: f64, max_grade_percent: f64) -> Self {
        Self {
            width: config.width,
            surface: config.surface,
            snap_tolerance: config.snap_tolerance.unwrap_or(0.75 * cell_size),
            max_grade: max_grade_percent,
        }
    }

    pub fn build(&self, graph: &NavigationGraph, routes: &[AssetRoute]) -> RoadNetwork {
        // Local vertex table over every node any path touches
        let mut local: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut positions: Vec<Coord> = Vec::new();
        let mut elevations: Vec<f64> = Vec::new();
        let mut intern = |node: NodeId, positions: &mut Vec<Coord>, elevations: &mut Vec<f64>| {
            *local.entry(node).or_insert_with(|| {
                positions.push(graph.node(node).position);
                elevations.push(graph.node(node).elevation);
                positions.len() - 1
            })
        };

        let mut raw_edges: Vec<WorkEdge> = Vec::new();
        let mut entrance = None;
        let mut terminals: Vec<(usize, usize)> = Vec::new();
        for (asset_index, route) in routes.iter().enumerate() {
            let Ok(path) = &route.result else {
                continue;
            };
            let Some(&first) = path.nodes.first() else {
                continue;
            };
            let first = intern(first, &mut positions, &mut elevations);
            entrance.get_or_insert(first);
            let mut previous = first;
            for (i, &node) in path.nodes.iter().enumerate().skip(1) {
                let current = intern(node, &mut positions, &mut elevations);
                raw_edges.push(WorkEdge {
                    a: previous,
                    b: current,
                    switchback: path.segments.get(i - 1).is_some_and(|s| s.switchback),
                    assets: BTreeSet::from([asset_index]),
                });
                previous = current;
            }
            terminals.push((asset_index, previous));
        }

        let Some(entrance) = entrance else {
            return RoadNetwork::default();
        };

        let rep = self.snap(&positions, &elevations, &raw_edges);
        let mut edges = merge_edges(&raw_edges, &rep);
        let entrance = rep[entrance];
        let terminals: Vec<(usize, usize)> = terminals.into_iter().map(|(a, v)| (a, rep[v])).collect();
        let required: BTreeSet<usize> = terminals.iter().map(|&(_, v)| v).chain([entrance]).collect();

        let before = edges.len();
        remove_redundant(&mut edges, &positions, positions.len(), entrance, &required);
        prune_spurs(&mut edges, positions.len(), &required);
        debug!(
            vertices = positions.len(),
            edges_before = before,
            edges_after = edges.len(),
            "Simplified road topology"
        );

        let network = self.assemble(&positions, &elevations, &edges, entrance, &required, &terminals, routes);
        debug!(
            segments = network.segments.len(),
            length = network.total_length(),
            "Built road network"
        );
        network
    }

    /// Representative vertex per vertex after snapping
    ///
    /// A vertex joins an earlier representative within the tolerance only if
    /// every non-switchback edge it carries stays within the grade limit.
    fn snap(&self, positions: &[Coord], elevations: &[f64], edges: &[WorkEdge]) -> Vec<usize> {
        let n = positions.len();
        let mut rep: Vec<usize> = (0..n).collect();
        let tol = self.snap_tolerance;
        if tol <= 0.0 {
            return rep;
        }

        let mut incident: Vec<Vec<(usize, bool)>> = vec![Vec::new(); n];
        for e in edges {
            incident[e.a].push((e.b, e.switchback));
            incident[e.b].push((e.a, e.switchback));
        }

        let bucket = |p: Coord| ((p.x / tol).floor() as i64, (p.y / tol).floor() as i64);
        let mut buckets: AHashMap<(i64, i64), Vec<usize>> = AHashMap::new();
        for v in 0..n {
            let (bx, by) = bucket(positions[v]);
            let mut target = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    let Some(reps) = buckets.get(&(bx + dx, by + dy)) else {
                        continue;
                    };
                    for &r in reps {
                        if distance(positions[v], positions[r]) > tol {
                            continue;
                        }
                        let keeps_grade = incident[v].iter().all(|&(u, switchback)| {
                            let u = rep[u];
                            switchback || u == r || grade(positions, elevations, r, u) <= self.max_grade + GRADE_EPSILON
                        });
                        if keeps_grade {
                            target = Some(r);
                            break 'search;
                        }
                    }
                }
            }
            match target {
                Some(r) => rep[v] = r,
                None => buckets.entry((bx, by)).or_default().push(v),
            }
        }

        // Neighbors snapped later can still steepen an edge; undo those snaps
        loop {
            let mut changed = false;
            for e in edges.iter().filter(|e| !e.switchback) {
                let (ra, rb) = (rep[e.a], rep[e.b]);
                if ra == rb || grade(positions, elevations, ra, rb) <= self.max_grade + GRADE_EPSILON {
                    continue;
                }
                for v in [e.a, e.b] {
                    if rep[v] != v {
                        rep[v] = v;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        rep
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        positions: &[Coord],
        elevations: &[f64],
        edges: &[WorkEdge],
        entrance: usize,
        required: &BTreeSet<usize>,
        terminals: &[(usize, usize)],
        routes: &[AssetRoute],
    ) -> RoadNetwork {
        let n = positions.len();
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, e) in edges.iter().enumerate() {
            incident[e.a].push(i);
            incident[e.b].push(i);
        }
        let is_junction = |v: usize| {
            let inc = &incident[v];
            inc.len() != 2 || required.contains(&v) || edges[inc[0]].switchback != edges[inc[1]].switchback
        };

        let mut vertex_ids: BTreeMap<usize, usize> = BTreeMap::new();
        let mut vertices = Vec::new();
        let mut vertex_id = |v: usize, vertices: &mut Vec<RoadVertex>| {
            *vertex_ids.entry(v).or_insert_with(|| {
                vertices.push(RoadVertex {
                    id: vertices.len(),
                    position: positions[v],
                    elevation: elevations[v],
                });
                vertices.len() - 1
            })
        };
        let entrance_id = vertex_id(entrance, &mut vertices);

        let mut visited = vec![false; edges.len()];
        let mut segments = Vec::new();
        let mut starts: Vec<usize> = (0..n).filter(|&v| !incident[v].is_empty() && is_junction(v)).collect();
        // Closed loops without a junction are picked up from any of their vertices
        starts.extend((0..n).filter(|&v| !incident[v].is_empty()));

        for start in starts {
            for &first in &incident[start] {
                if visited[first] {
                    continue;
                }
                let mut chain_vertices = vec![start];
                let mut chain_edges = Vec::new();
                let mut edge = first;
                let mut at = start;
                loop {
                    visited[edge] = true;
                    chain_edges.push(edge);
                    let e = &edges[edge];
                    at = if e.a == at { e.b } else { e.a };
                    chain_vertices.push(at);
                    if at == start || is_junction(at) {
                        break;
                    }
                    match incident[at].iter().copied().find(|&next| !visited[next]) {
                        Some(next) => edge = next,
                        None => break,
                    }
                }

                let from = vertex_id(start, &mut vertices);
                let to = vertex_id(at, &mut vertices);
                let mut assets: BTreeSet<usize> = BTreeSet::new();
                let mut max_grade: f64 = 0.0;
                let mut length = 0.0;
                for &ei in &chain_edges {
                    let e = &edges[ei];
                    assets.extend(e.assets.iter().copied());
                    max_grade = max_grade.max(grade(positions, elevations, e.a, e.b));
                    length += distance(positions[e.a], positions[e.b]);
                }
                segments.push(RoadSegment {
                    id: segments.len(),
                    from,
                    to,
                    points: chain_vertices.iter().map(|&v| positions[v]).collect(),
                    elevations: chain_vertices.iter().map(|&v| elevations[v]).collect(),
                    length,
                    max_grade,
                    width: self.width,
                    surface: self.surface,
                    switchback: edges[first].switchback,
                    source_assets: assets.into_iter().map(|i| routes[i].asset_id.clone()).collect(),
                });
            }
        }

        let asset_access = terminals
            .iter()
            .map(|&(asset, v)| AssetAccess {
                asset_id: routes[asset].asset_id.clone(),
                vertex: vertex_id(v, &mut vertices),
            })
            .collect();

        RoadNetwork {
            vertices,
            segments,
            entrance: Some(entrance_id),
            asset_access,
        }
    }
}

fn grade(positions: &[Coord], elevations: &[f64], a: usize, b: usize) -> f64 {
    let run = distance(positions[a], positions[b]);
    if run <= f64::EPSILON {
        return 0.0;
    }
    (elevations[b] - elevations[a]).abs() / run * 100.0
}

/// Re-point edges at their representatives, dropping loops and duplicates
fn merge_edges(raw: &[WorkEdge], rep: &[usize]) -> Vec<WorkEdge> {
    let mut merged: BTreeMap<(usize, usize), WorkEdge> = BTreeMap::new();
    for e in raw {
        let (a, b) = (rep[e.a], rep[e.b]);
        if a == b {
            continue;
        }
        let key = (a.min(b), a.max(b));
        merged
            .entry(key)
            .and_modify(|m| {
                m.switchback |= e.switchback;
                m.assets.extend(e.assets.iter().copied());
            })
            .or_insert_with(|| WorkEdge {
                a: key.0,
                b: key.1,
                switchback: e.switchback,
                assets: e.assets.clone(),
            });
    }
    merged.into_values().collect()
}

fn reaches_all(edges: &[WorkEdge], alive: &[bool], n: usize, entrance: usize, required: &BTreeSet<usize>) -> bool {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (e, &live) in edges.iter().zip(alive) {
        if live {
            adjacency[e.a].push(e.b);
            adjacency[e.b].push(e.a);
        }
    }
    let mut seen = vec![false; n];
    seen[entrance] = true;
    let mut queue = VecDeque::from([entrance]);
    while let Some(u) = queue.pop_front() {
        for &v in &adjacency[u] {
            if !seen[v] {
                seen[v] = true;
                queue.push_back(v);
            }
        }
    }
    required.iter().all(|&v| seen[v])
}

/// Drop edges, longest first, whose removal keeps every required vertex
/// reachable from the entrance
fn remove_redundant(
    edges: &mut Vec<WorkEdge>,
    positions: &[Coord],
    n: usize,
    entrance: usize,
    required: &BTreeSet<usize>,
) {
    let mut order: Vec<usize> = (0..edges.len()).collect();
    let length = |e: &WorkEdge| distance(positions[e.a], positions[e.b]);
    order.sort_by(|&x, &y| {
        length(&edges[y])
            .total_cmp(&length(&edges[x]))
            .then((edges[x].a, edges[x].b).cmp(&(edges[y].a, edges[y].b)))
    });

    let mut alive = vec![true; edges.len()];
    for i in order {
        alive[i] = false;
        if !reaches_all(&edges[..], &alive, n, entrance, required) {
            alive[i] = true;
        }
    }
    let mut keep = alive.into_iter();
    edges.retain(|_| keep.next().unwrap_or(true));
}

/// Remove dead-end edges that lead to no required vertex
fn prune_spurs(edges: &mut Vec<WorkEdge>, n: usize, required: &BTreeSet<usize>) {
    loop {
        let mut degree = vec![0usize; n];
        for e in edges.iter() {
            degree[e.a] += 1;
            degree[e.b] += 1;
        }
        let before = edges.len();
        edges.retain(|e| {
            let dangling = |v: usize| degree[v] == 1 && !required.contains(&v);
            !(dangling(e.a) || dangling(e.b))
        });
        if edges.len() == before {
            break;
        }
    }
}
