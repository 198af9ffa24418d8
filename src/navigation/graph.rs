//! Terrain-weighted navigation grid for one fixed arrangement
//!
//! Nodes sit at cell centers over the parcel's bounding box. A cell is free
//! when its center is inside the parcel and its square touches neither a
//! road-blocking constraint nor an asset footprint. Free cells are
//! 8-connected without corner cutting. Edges steeper than the grade limit are
//! left out of the graph and remembered for switchback relaxation.

use geo::{BoundingRect, Coord, Intersects, Polygon, Rect};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::core::config::NavigationConfig;
use crate::core::types::{distance, AssetId};
use crate::site::{PlacedAsset, SiteInput};
use crate::spatial::geometry::{point_polygon_distance, rectangle_footprint};
use crate::spatial::Grid;

pub type NodeId = usize;

const NO_COMPONENT: u32 = u32::MAX;

const NEIGHBORS: [(i64, i64); 8] = [
    (1, 0),
    (0, 1),
    (-1, 0),
    (0, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
    (1, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavNode {
    pub position: Coord,
    pub elevation: f64,
    pub buildable: bool,
    /// Inserted by switchback relaxation rather than sampled from the grid
    pub synthetic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavEdge {
    pub to: NodeId,
    /// Horizontal length
    pub length: f64,
    /// Percent grade, always non-negative
    pub grade: f64,
    pub cost: f64,
    pub switchback: bool,
}

/// A grid adjacency left out because it exceeds the grade limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteepEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub grade: f64,
    pub orthogonal: bool,
}

/// Where an asset meets the road network
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPoint {
    pub asset_id: AssetId,
    pub node: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub cells: usize,
    pub nodes: usize,
    pub edges: usize,
    pub blocked_cells: usize,
    pub steep_excluded: usize,
    pub switchback_nodes: usize,
}

/// Edge cost: `length * (1 + w * (grade / max)^4 + off_zone)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub max_grade: f64,
    pub grade_penalty_weight: f64,
    pub off_zone_penalty: f64,
}

impl CostModel {
    pub fn cost(&self, length: f64, grade: f64, buildable: bool) -> f64 {
        let ratio = grade / self.max_grade;
        let off_zone = if buildable { 0.0 } else { self.off_zone_penalty };
        length * (1.0 + self.grade_penalty_weight * ratio.powi(4) + off_zone)
    }
}

#[derive(Debug, Clone)]
pub struct NavigationGraph {
    nodes: Vec<NavNode>,
    adjacency: Vec<Vec<NavEdge>>,
    cells: Grid<Option<NodeId>>,
    steep: Vec<SteepEdge>,
    /// Connected components over free cells ignoring grade
    terrain_component: Vec<u32>,
    entrance_point: Coord,
    entrance: Option<NodeId>,
    access: Vec<AccessPoint>,
    cost_model: CostModel,
    blocked_cells: usize,
}

impl NavigationGraph {
    /// Build the graph for a fixed arrangement
    pub fn build(
        site: &SiteInput,
        assets: &[PlacedAsset],
        entrance: Coord,
        config: &NavigationConfig,
        max_grade_percent: f64,
    ) -> Self {
        let bounds = site.boundary.bounds();
        let cell_size = effective_cell_size(&bounds, config.cell_size, config.max_nodes);
        let cols = ((bounds.width() / cell_size).ceil() as usize).max(1);
        let rows = ((bounds.height() / cell_size).ceil() as usize).max(1);
        let mut cells: Grid<Option<NodeId>> =
            Grid::new(cols, rows, cell_size, [bounds.min().x, bounds.min().y]);

        let footprints: Vec<(Rect<f64>, &Polygon<f64>)> = assets
            .iter()
            .filter_map(|a| a.footprint().bounding_rect().map(|r| (r, a.footprint())))
            .collect();

        let mut nodes = Vec::new();
        let mut blocked_cells = 0;
        for y in 0..rows {
            for x in 0..cols {
                let center = cells.cell_center(x, y);
                if !site.boundary.contains_point(center) {
                    continue;
                }
                let square = rectangle_footprint(center, cell_size, cell_size, 0.0);
                let half = cell_size / 2.0;
                let cell_rect = Rect::new(
                    Coord {
                        x: center.x - half,
                        y: center.y - half,
                    },
                    Coord {
                        x: center.x + half,
                        y: center.y + half,
                    },
                );
                let blocked = site
                    .constraints
                    .query_overlapping(&square)
                    .iter()
                    .any(|c| c.blocks_roads())
                    || footprints
                        .iter()
                        .any(|(rect, footprint)| rect.intersects(&cell_rect) && footprint.intersects(&square));
                if blocked {
                    blocked_cells += 1;
                    continue;
                }
                cells.set(x, y, Some(nodes.len()));
                nodes.push(NavNode {
                    position: center,
                    elevation: site.terrain.elevation_at(center),
                    buildable: site.terrain.is_buildable(center),
                    synthetic: false,
                });
            }
        }

        let cost_model = CostModel {
            max_grade: max_grade_percent,
            grade_penalty_weight: config.grade_penalty_weight,
            off_zone_penalty: config.off_zone_penalty,
        };
        let mut graph = Self {
            adjacency: vec![Vec::new(); nodes.len()],
            nodes,
            cells,
            steep: Vec::new(),
            terrain_component: Vec::new(),
            entrance_point: entrance,
            entrance: None,
            access: Vec::new(),
            cost_model,
            blocked_cells,
        };
        graph.connect_grid();
        graph.label_terrain_components();
        graph.entrance = graph.nearest_node(entrance);
        graph.access = graph.assign_access_points(assets);

        let stats = graph.stats();
        debug!(
            cells = stats.cells,
            nodes = stats.nodes,
            edges = stats.edges,
            blocked = stats.blocked_cells,
            steep = stats.steep_excluded,
            cell_size,
            "Built navigation graph"
        );
        graph
    }

    fn connect_grid(&mut self) {
        let (cols, rows) = (self.cells.width as i64, self.cells.height as i64);
        for y in 0..rows {
            for x in 0..cols {
                let Some(a) = self.cell_node(x, y) else {
                    continue;
                };
                for &(dx, dy) in &NEIGHBORS {
                    let Some(b) = self.cell_node(x + dx, y + dy) else {
                        continue;
                    };
                    // Each undirected pair once
                    if b < a {
                        continue;
                    }
                    let diagonal = dx != 0 && dy != 0;
                    if diagonal && (self.cell_node(x + dx, y).is_none() || self.cell_node(x, y + dy).is_none()) {
                        continue;
                    }
                    let grade = self.grade_between(a, b);
                    if grade > self.cost_model.max_grade {
                        self.steep.push(SteepEdge {
                            from: a,
                            to: b,
                            grade,
                            orthogonal: !diagonal,
                        });
                    } else {
                        self.connect(a, b, false);
                    }
                }
            }
        }
    }

    fn cell_node(&self, x: i64, y: i64) -> Option<NodeId> {
        if x < 0 || y < 0 {
            return None;
        }
        self.cells.get(x as usize, y as usize).copied().flatten()
    }

    fn grade_between(&self, a: NodeId, b: NodeId) -> f64 {
        let (na, nb) = (&self.nodes[a], &self.nodes[b]);
        let run = distance(na.position, nb.position);
        if run <= f64::EPSILON {
            return 0.0;
        }
        (nb.elevation - na.elevation).abs() / run * 100.0
    }

    /// Add an undirected edge between two nodes, costed by the grade model
    pub(crate) fn connect(&mut self, a: NodeId, b: NodeId, switchback: bool) {
        let length = distance(self.nodes[a].position, self.nodes[b].position);
        let grade = self.grade_between(a, b);
        let buildable = self.nodes[a].buildable && self.nodes[b].buildable;
        let cost = self.cost_model.cost(length, grade, buildable);
        self.adjacency[a].push(NavEdge {
            to: b,
            length,
            grade,
            cost,
            switchback,
        });
        self.adjacency[b].push(NavEdge {
            to: a,
            length,
            grade,
            cost,
            switchback,
        });
    }

    pub(crate) fn add_node(&mut self, node: NavNode) -> NodeId {
        self.nodes.push(node);
        self.adjacency.push(Vec::new());
        self.terrain_component.push(NO_COMPONENT);
        self.nodes.len() - 1
    }

    fn label_terrain_components(&mut self) {
        let n = self.nodes.len();
        let mut extra: Vec<Vec<NodeId>> = vec![Vec::new(); n];
        for s in &self.steep {
            extra[s.from].push(s.to);
            extra[s.to].push(s.from);
        }
        let mut labels = vec![NO_COMPONENT; n];
        let mut next = 0;
        for start in 0..n {
            if labels[start] != NO_COMPONENT {
                continue;
            }
            labels[start] = next;
            let mut queue = VecDeque::from([start]);
            while let Some(u) = queue.pop_front() {
                let neighbors = self.adjacency[u].iter().map(|e| e.to).chain(extra[u].iter().copied());
                for v in neighbors {
                    if labels[v] == NO_COMPONENT {
                        labels[v] = next;
                        queue.push_back(v);
                    }
                }
            }
            next += 1;
        }
        self.terrain_component = labels;
    }

    /// Nodes reachable from `start` over the current edges
    pub fn reachable_from(&self, start: NodeId) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        if start >= seen.len() {
            return seen;
        }
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            for e in &self.adjacency[u] {
                if !seen[e.to] {
                    seen[e.to] = true;
                    queue.push_back(e.to);
                }
            }
        }
        seen
    }

    /// Whether two nodes would connect if grade were ignored
    pub fn connected_ignoring_grade(&self, a: NodeId, b: NodeId) -> bool {
        match (self.terrain_component.get(a), self.terrain_component.get(b)) {
            (Some(&ca), Some(&cb)) => ca != NO_COMPONENT && ca == cb,
            _ => false,
        }
    }

    /// Closest grid node to a point
    pub fn nearest_node(&self, point: Coord) -> Option<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.synthetic)
            .min_by(|(ia, a), (ib, b)| {
                distance(a.position, point)
                    .total_cmp(&distance(b.position, point))
                    .then(ia.cmp(ib))
            })
            .map(|(i, _)| i)
    }

    /// Access node per asset: prefer nodes reachable from the entrance, then the
    /// closest to the footprint, then the closest to the entrance
    fn assign_access_points(&self, assets: &[PlacedAsset]) -> Vec<AccessPoint> {
        let reachable = match self.entrance {
            Some(e) => self.reachable_from(e),
            None => vec![false; self.nodes.len()],
        };
        let window = 2.0 * self.cells.cell_size;

        assets
            .iter()
            .map(|asset| {
                let footprint = asset.footprint();
                let mut local: Vec<NodeId> = match footprint.bounding_rect() {
                    Some(r) => self.nodes_in_rect(r, window),
                    None => Vec::new(),
                };
                if local.is_empty() {
                    local = (0..self.nodes.len()).filter(|&i| !self.nodes[i].synthetic).collect();
                }
                let key = |i: NodeId| {
                    let p = self.nodes[i].position;
                    (
                        !reachable[i],
                        point_polygon_distance(p, footprint),
                        distance(p, self.entrance_point),
                        i,
                    )
                };
                let node = local.iter().min_by(|a, b| {
                    let (ka, kb) = (key(**a), key(**b));
                    ka.0.cmp(&kb.0)
                        .then(ka.1.total_cmp(&kb.1))
                        .then(ka.2.total_cmp(&kb.2))
                        .then(ka.3.cmp(&kb.3))
                });
                AccessPoint {
                    asset_id: asset.id().clone(),
                    node: node.copied(),
                }
            })
            .collect()
    }

    fn nodes_in_rect(&self, rect: Rect<f64>, margin: f64) -> Vec<NodeId> {
        let lo = self.cells.world_to_cell(Coord {
            x: rect.min().x - margin,
            y: rect.min().y - margin,
        });
        let hi = self.cells.world_to_cell(Coord {
            x: rect.max().x + margin,
            y: rect.max().y + margin,
        });
        let mut found = Vec::new();
        for y in lo.1..=hi.1 {
            for x in lo.0..=hi.0 {
                if let Some(Some(id)) = self.cells.get(x, y) {
                    found.push(*id);
                }
            }
        }
        found
    }

    /// Whether a point falls in a free cell
    pub fn is_free(&self, point: Coord) -> bool {
        self.cells.covers(point) && self.cells.sample(point).copied().flatten().is_some()
    }

    pub fn nodes(&self) -> &[NavNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &NavNode {
        &self.nodes[id]
    }

    pub fn neighbors(&self, id: NodeId) -> &[NavEdge] {
        &self.adjacency[id]
    }

    /// Every undirected edge once, as `(from, edge)` with `from < edge.to`
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, &NavEdge)> {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(from, edges)| edges.iter().filter(move |e| from < e.to).map(move |e| (from, e)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn steep_edges(&self) -> &[SteepEdge] {
        &self.steep
    }

    pub fn entrance(&self) -> Option<NodeId> {
        self.entrance
    }

    pub fn entrance_point(&self) -> Coord {
        self.entrance_point
    }

    pub fn access_points(&self) -> &[AccessPoint] {
        &self.access
    }

    pub fn access_node(&self, asset_id: &AssetId) -> Option<NodeId> {
        self.access
            .iter()
            .find(|a| &a.asset_id == asset_id)
            .and_then(|a| a.node)
    }

    pub fn max_grade(&self) -> f64 {
        self.cost_model.max_grade
    }

    pub fn cell_size(&self) -> f64 {
        self.cells.cell_size
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            cells: self.cells.width * self.cells.height,
            nodes: self.nodes.len(),
            edges: self.edge_count(),
            blocked_cells: self.blocked_cells,
            steep_excluded: self.steep.len(),
            switchback_nodes: self.nodes.iter().filter(|n| n.synthetic).count(),
        }
    }
}

/// Grow the cell size until the grid holds at most `max_nodes` cells
fn effective_cell_size(bounds: &Rect<f64>, cell_size: f64, max_nodes: usize) -> f64 {
    let area = bounds.width() * bounds.height();
    let mut cell = cell_size.max((area / max_nodes.max(1) as f64).sqrt());
    let count = |cell: f64| ((bounds.width() / cell).ceil() * (bounds.height() / cell).ceil()) as usize;
    while count(cell) > max_nodes {
        cell *= 1.05;
    }
    cell
}
