//! Switchback relaxation
//!
//! An orthogonal grid edge that is too steep to drive directly is replaced by
//! a zig-zag of equal legs. Each leg shifts sideways by the switchback width
//! while advancing `d / n` along the edge, so the chain is
//! `sqrt(d² + n²w²)` long and every leg climbs at or under the grade limit.
//! Inner vertices must land in free cells.

use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::graph::{NavNode, NavigationGraph, NodeId};
use crate::core::config::NavigationConfig;
use crate::core::types::distance;

/// Legs are planned against this fraction of the limit so rounding never
/// pushes a leg over it
const GRADE_MARGIN: f64 = 0.98;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchbackReport {
    pub candidates: usize,
    pub inserted: usize,
    pub nodes_added: usize,
    /// Steeper than `max_switchback_ratio` allows
    pub too_steep: usize,
    /// Needed more than `max_switchback_legs`
    pub too_long: usize,
    /// No side had free cells for every inner vertex
    pub no_room: usize,
}

/// Insert switchbacks along every eligible excluded edge
pub fn insert_switchbacks(graph: &mut NavigationGraph, config: &NavigationConfig) -> SwitchbackReport {
    let mut report = SwitchbackReport::default();
    let max_grade = graph.max_grade();
    let width = config.switchback_width.unwrap_or(2.0 * graph.cell_size());
    let steep: Vec<_> = graph
        .steep_edges()
        .iter()
        .filter(|s| s.orthogonal)
        .copied()
        .collect();

    for edge in steep {
        report.candidates += 1;
        if edge.grade > max_grade * config.max_switchback_ratio {
            report.too_steep += 1;
            continue;
        }
        let Some(legs) = leg_count(graph, edge.from, edge.to, width, max_grade) else {
            report.too_long += 1;
            continue;
        };
        if legs > config.max_switchback_legs {
            report.too_long += 1;
            continue;
        }
        match plan_vertices(graph, edge.from, edge.to, legs, width) {
            Some(vertices) => {
                report.nodes_added += vertices.len();
                report.inserted += 1;
                insert_chain(graph, edge.from, edge.to, &vertices);
            }
            None => report.no_room += 1,
        }
    }

    debug!(
        candidates = report.candidates,
        inserted = report.inserted,
        nodes = report.nodes_added,
        too_steep = report.too_steep,
        too_long = report.too_long,
        no_room = report.no_room,
        "Switchback relaxation"
    );
    report
}

/// Smallest even leg count whose zig-zag is long enough; `None` if the
/// lateral width is degenerate
fn leg_count(graph: &NavigationGraph, a: NodeId, b: NodeId, width: f64, max_grade: f64) -> Option<usize> {
    if width <= 0.0 {
        return None;
    }
    let (na, nb) = (graph.node(a), graph.node(b));
    let run = distance(na.position, nb.position);
    let rise = (nb.elevation - na.elevation).abs();
    let required = rise / (max_grade * GRADE_MARGIN / 100.0);
    let lateral = (required * required - run * run).max(0.0).sqrt();
    let mut legs = ((lateral / width).ceil() as usize).max(2);
    if legs % 2 == 1 {
        legs += 1;
    }
    Some(legs)
}

/// Inner vertices `(position, elevation)` on whichever side fits
fn plan_vertices(
    graph: &NavigationGraph,
    a: NodeId,
    b: NodeId,
    legs: usize,
    width: f64,
) -> Option<Vec<(Coord, f64)>> {
    let (na, nb) = (graph.node(a), graph.node(b));
    let run = distance(na.position, nb.position);
    if run <= f64::EPSILON {
        return None;
    }
    let dir = Coord {
        x: (nb.position.x - na.position.x) / run,
        y: (nb.position.y - na.position.y) / run,
    };
    let perp = Coord { x: -dir.y, y: dir.x };

    for side in [1.0, -1.0] {
        let vertices: Vec<(Coord, f64)> = (1..legs)
            .map(|k| {
                let t = k as f64 / legs as f64;
                let offset = if k % 2 == 1 { side * width } else { 0.0 };
                let position = Coord {
                    x: na.position.x + dir.x * run * t + perp.x * offset,
                    y: na.position.y + dir.y * run * t + perp.y * offset,
                };
                (position, na.elevation + (nb.elevation - na.elevation) * t)
            })
            .collect();
        if vertices.iter().all(|(p, _)| graph.is_free(*p)) {
            return Some(vertices);
        }
    }
    None
}

fn insert_chain(graph: &mut NavigationGraph, a: NodeId, b: NodeId, vertices: &[(Coord, f64)]) {
    let buildable = graph.node(a).buildable && graph.node(b).buildable;
    let mut previous = a;
    for &(position, elevation) in vertices {
        let id = graph.add_node(NavNode {
            position,
            elevation,
            buildable,
            synthetic: true,
        });
        graph.connect(previous, id, true);
        previous = id;
    }
    graph.connect(previous, b, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintStore;
    use crate::site::{PropertyBoundary, SiteInput, TerrainModel};
    use crate::spatial::Grid;

    fn stepped_site(step_height: f64) -> SiteInput {
        // Flat shelves at x < 50 and x >= 50, joined by one steep step
        let cols = 20;
        let values: Vec<f64> = (0..cols * 20)
            .map(|i| if i % cols < 10 { 100.0 } else { 100.0 + step_height })
            .collect();
        SiteInput {
            boundary: PropertyBoundary::rectangle([0.0, 0.0], [100.0, 100.0]).unwrap(),
            terrain: TerrainModel::flat()
                .with_elevation(Grid::from_rows(cols, 20, 5.0, [0.0, 0.0], values).unwrap()),
            constraints: ConstraintStore::new(),
            assets: vec![],
        }
    }

    #[test]
    fn test_switchbacks_connect_shelves_within_grade() {
        let site = stepped_site(1.5);
        let config = NavigationConfig::default();
        let mut graph = NavigationGraph::build(&site, &[], Coord { x: 0.0, y: 0.0 }, &config, 10.0);
        let entrance = graph.entrance().unwrap();
        let east = graph.nearest_node(Coord { x: 97.5, y: 50.0 }).unwrap();
        assert!(!graph.reachable_from(entrance)[east]);

        let report = insert_switchbacks(&mut graph, &config);
        assert!(report.inserted > 0);
        assert!(graph.reachable_from(entrance)[east]);
        for (_, edge) in graph.edges() {
            assert!(edge.grade <= 10.0 + 1e-9, "edge grade {}", edge.grade);
        }
        assert!(graph.edges().any(|(_, e)| e.switchback));
    }

    #[test]
    fn test_cliff_beyond_ratio_is_skipped() {
        let site = stepped_site(50.0);
        let config = NavigationConfig::default();
        let mut graph = NavigationGraph::build(&site, &[], Coord { x: 0.0, y: 0.0 }, &config, 10.0);
        let report = insert_switchbacks(&mut graph, &config);
        assert_eq!(report.inserted, 0);
        assert!(report.too_steep > 0);
    }

    #[test]
    fn test_leg_count_is_even_and_sufficient() {
        let site = stepped_site(1.5);
        let graph = NavigationGraph::build(&site, &[], Coord { x: 0.0, y: 0.0 }, &NavigationConfig::default(), 10.0);
        let edge = graph.steep_edges().iter().find(|e| e.orthogonal).copied().unwrap();
        let legs = leg_count(&graph, edge.from, edge.to, 10.0, 10.0).unwrap();
        assert_eq!(legs % 2, 0);
        let run = distance(graph.node(edge.from).position, graph.node(edge.to).position);
        let length = (run * run + (legs as f64 * 10.0).powi(2)).sqrt();
        let rise = (graph.node(edge.to).elevation - graph.node(edge.from).elevation).abs();
        assert!(rise / length * 100.0 <= 10.0);
    }
}
