//! A* pathfinding over the navigation graph
//!
//! Straight-line distance is admissible because every edge costs at least its
//! length. Among equal-cost routes the one with the lower steepest segment
//! wins, then the one with fewer turns.

use geo::Coord;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use tracing::{debug, warn};

use super::graph::{AccessPoint, NavigationGraph, NodeId};
use super::switchback::{insert_switchbacks, SwitchbackReport};
use crate::core::cancel::CancellationToken;
use crate::core::config::NavigationConfig;
use crate::core::types::{distance, AssetId};

/// Expansions between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Costs within this are equal for tie-breaking
const COST_EPSILON: f64 = 1e-9;

/// Node in the A* open set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathNode {
    f_cost: OrderedFloat<f64>,
    g_cost: OrderedFloat<f64>,
    max_grade: OrderedFloat<f64>,
    turns: u32,
    node: NodeId,
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .f_cost
            .cmp(&self.f_cost)
            .then_with(|| other.max_grade.cmp(&self.max_grade))
            .then_with(|| other.turns.cmp(&self.turns))
            .then_with(|| other.node.cmp(&self.node))
            .then_with(|| other.g_cost.cmp(&self.g_cost))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best known way to reach a node
#[derive(Debug, Clone, Copy)]
struct Label {
    g_cost: f64,
    max_grade: f64,
    turns: u32,
    came_from: Option<NodeId>,
}

impl Label {
    fn improves_on(&self, other: &Label) -> bool {
        if self.g_cost < other.g_cost - COST_EPSILON {
            return true;
        }
        if self.g_cost > other.g_cost + COST_EPSILON {
            return false;
        }
        if self.max_grade < other.max_grade - COST_EPSILON {
            return true;
        }
        if self.max_grade > other.max_grade + COST_EPSILON {
            return false;
        }
        self.turns < other.turns
    }
}

/// One leg of a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub length: f64,
    pub grade: f64,
    pub switchback: bool,
}

/// Cumulative distance and elevation along a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    pub distance: f64,
    pub elevation: f64,
}

/// Route from the entrance node to an asset's access node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub points: Vec<Coord>,
    pub elevations: Vec<f64>,
    /// `segments[i]` joins `nodes[i]` and `nodes[i + 1]`
    pub segments: Vec<PathSegment>,
    pub cost: f64,
}

impl Path {
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    pub fn max_grade(&self) -> f64 {
        self.segments.iter().map(|s| s.grade).fold(0.0, f64::max)
    }

    pub fn has_switchback(&self) -> bool {
        self.segments.iter().any(|s| s.switchback)
    }

    pub fn turns(&self) -> usize {
        self.points
            .windows(3)
            .filter(|w| is_turn(w[0], w[1], w[2]))
            .count()
    }

    pub fn profile(&self) -> Vec<ProfilePoint> {
        let mut travelled = 0.0;
        let mut profile = Vec::with_capacity(self.points.len());
        for (i, &elevation) in self.elevations.iter().enumerate() {
            if i > 0 {
                travelled += self.segments[i - 1].length;
            }
            profile.push(ProfilePoint {
                distance: travelled,
                elevation,
            });
        }
        profile
    }
}

fn is_turn(a: Coord, b: Coord, c: Coord) -> bool {
    let (ux, uy) = (b.x - a.x, b.y - a.y);
    let (vx, vy) = (c.x - b.x, c.y - b.y);
    let cross = ux * vy - uy * vx;
    let dot = ux * vx + uy * vy;
    let scale = (ux.hypot(uy) * vx.hypot(vy)).max(f64::EPSILON);
    cross.abs() / scale > 1e-6 || dot < 0.0
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    Found(Path),
    NoPath,
    Cancelled,
}

/// Find the cheapest path using A*
pub fn find_path(
    graph: &NavigationGraph,
    start: NodeId,
    goal: NodeId,
    cancel: &CancellationToken,
) -> SearchResult {
    if cancel.is_cancelled() {
        return SearchResult::Cancelled;
    }
    if start == goal {
        return SearchResult::Found(reconstruct_path(graph, &[], start, 0.0));
    }

    let goal_pos = graph.node(goal).position;
    let heuristic = |n: NodeId| distance(graph.node(n).position, goal_pos);

    let mut labels: Vec<Option<Label>> = vec![None; graph.node_count()];
    let mut open_set = BinaryHeap::new();
    labels[start] = Some(Label {
        g_cost: 0.0,
        max_grade: 0.0,
        turns: 0,
        came_from: None,
    });
    open_set.push(PathNode {
        f_cost: OrderedFloat(heuristic(start)),
        g_cost: OrderedFloat(0.0),
        max_grade: OrderedFloat(0.0),
        turns: 0,
        node: start,
    });

    let mut expansions = 0usize;
    while let Some(current) = open_set.pop() {
        let Some(label) = labels[current.node] else {
            continue;
        };
        // Skip entries superseded by a better label
        if current.g_cost.0 != label.g_cost || current.max_grade.0 != label.max_grade || current.turns != label.turns {
            continue;
        }
        if current.node == goal {
            let nodes = collect_nodes(&labels, goal);
            return SearchResult::Found(reconstruct_path(graph, &nodes, goal, label.g_cost));
        }

        expansions += 1;
        if expansions % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return SearchResult::Cancelled;
        }

        let here = graph.node(current.node).position;
        for edge in graph.neighbors(current.node) {
            if edge.grade > graph.max_grade() + COST_EPSILON {
                continue;
            }
            let turned = label
                .came_from
                .is_some_and(|prev| is_turn(graph.node(prev).position, here, graph.node(edge.to).position));
            let candidate = Label {
                g_cost: label.g_cost + edge.cost,
                max_grade: label.max_grade.max(edge.grade),
                turns: label.turns + u32::from(turned),
                came_from: Some(current.node),
            };
            let better = match &labels[edge.to] {
                Some(existing) => candidate.improves_on(existing),
                None => true,
            };
            if better {
                labels[edge.to] = Some(candidate);
                open_set.push(PathNode {
                    f_cost: OrderedFloat(candidate.g_cost + heuristic(edge.to)),
                    g_cost: OrderedFloat(candidate.g_cost),
                    max_grade: OrderedFloat(candidate.max_grade),
                    turns: candidate.turns,
                    node: edge.to,
                });
            }
        }
    }

    SearchResult::NoPath
}

/// Node sequence from the start to `goal`, start first
fn collect_nodes(labels: &[Option<Label>], goal: NodeId) -> Vec<NodeId> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(prev) = labels[current].and_then(|l| l.came_from) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

fn reconstruct_path(graph: &NavigationGraph, nodes: &[NodeId], only: NodeId, cost: f64) -> Path {
    let nodes: Vec<NodeId> = if nodes.is_empty() { vec![only] } else { nodes.to_vec() };
    let segments = nodes
        .windows(2)
        .map(|w| {
            let edge = graph
                .neighbors(w[0])
                .iter()
                .filter(|e| e.to == w[1])
                .min_by(|a, b| a.cost.total_cmp(&b.cost));
            match edge {
                Some(e) => PathSegment {
                    length: e.length,
                    grade: e.grade,
                    switchback: e.switchback,
                },
                None => PathSegment {
                    length: distance(graph.node(w[0]).position, graph.node(w[1]).position),
                    grade: 0.0,
                    switchback: false,
                },
            }
        })
        .collect();
    Path {
        points: nodes.iter().map(|&n| graph.node(n).position).collect(),
        elevations: nodes.iter().map(|&n| graph.node(n).elevation).collect(),
        nodes,
        segments,
        cost,
    }
}

/// Why an asset could not be connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unreachable {
    /// No free cell next to the footprint
    NoAccessNode,
    /// No free cell near the entrance
    NoEntranceNode,
    /// Separated from the entrance by obstacles or the parcel edge
    Blocked,
    /// Connected only over terrain steeper than the grade limit, and no
    /// switchback fit
    GradeLimit,
    Cancelled,
}

impl fmt::Display for Unreachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Unreachable::NoAccessNode => "no free ground next to the asset footprint",
            Unreachable::NoEntranceNode => "no free ground near the entrance",
            Unreachable::Blocked => "separated from the entrance by blocking constraints or assets",
            Unreachable::GradeLimit => "every route exceeds the maximum grade and no switchback fits",
            Unreachable::Cancelled => "search cancelled",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRoute {
    pub asset_id: AssetId,
    pub result: Result<Path, Unreachable>,
}

/// All routes of one arrangement
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingOutcome {
    pub routes: Vec<AssetRoute>,
    /// Present when the graph had to be relaxed
    pub switchbacks: Option<SwitchbackReport>,
    pub cancelled: bool,
}

/// Per-asset searches from the entrance
pub struct PathfindingEngine<'g> {
    graph: &'g NavigationGraph,
    parallel: bool,
}

impl<'g> PathfindingEngine<'g> {
    pub fn new(graph: &'g NavigationGraph, parallel: bool) -> Self {
        Self { graph, parallel }
    }

    pub fn route(&self, access: &AccessPoint, cancel: &CancellationToken) -> Result<Path, Unreachable> {
        let start = self.graph.entrance().ok_or(Unreachable::NoEntranceNode)?;
        let goal = access.node.ok_or(Unreachable::NoAccessNode)?;
        match find_path(self.graph, start, goal, cancel) {
            SearchResult::Found(path) => Ok(path),
            SearchResult::Cancelled => Err(Unreachable::Cancelled),
            SearchResult::NoPath if self.graph.connected_ignoring_grade(start, goal) => {
                Err(Unreachable::GradeLimit)
            }
            SearchResult::NoPath => Err(Unreachable::Blocked),
        }
    }

    /// Route a set of access points; output order follows input order
    pub fn route_all(&self, access: &[AccessPoint], cancel: &CancellationToken) -> Vec<AssetRoute> {
        let route = |a: &AccessPoint| AssetRoute {
            asset_id: a.asset_id.clone(),
            result: self.route(a, cancel),
        };
        if self.parallel {
            access.par_iter().map(route).collect()
        } else {
            access.iter().map(route).collect()
        }
    }
}

/// Route every asset, relaxing the graph with switchbacks if any asset is
/// cut off only by grade
pub fn route_assets(
    graph: &mut NavigationGraph,
    config: &NavigationConfig,
    parallel: bool,
    cancel: &CancellationToken,
) -> RoutingOutcome {
    let access = graph.access_points().to_vec();
    let mut routes = PathfindingEngine::new(graph, parallel).route_all(&access, cancel);

    let grade_limited: Vec<usize> = routes
        .iter()
        .enumerate()
        .filter(|(_, r)| r.result == Err(Unreachable::GradeLimit))
        .map(|(i, _)| i)
        .collect();

    let mut switchbacks = None;
    if !grade_limited.is_empty() && !cancel.is_cancelled() {
        debug!(assets = grade_limited.len(), "Relaxing navigation graph with switchbacks");
        switchbacks = Some(insert_switchbacks(graph, config));
        let retry: Vec<AccessPoint> = grade_limited.iter().map(|&i| access[i].clone()).collect();
        let retried = PathfindingEngine::new(graph, parallel).route_all(&retry, cancel);
        for (&i, route) in grade_limited.iter().zip(retried) {
            routes[i] = route;
        }
    }

    for route in &routes {
        if let Err(reason) = &route.result {
            warn!(asset = %route.asset_id, %reason, "Asset not connected");
        }
    }

    RoutingOutcome {
        cancelled: routes.iter().any(|r| r.result == Err(Unreachable::Cancelled)),
        routes,
        switchbacks,
    }
}
