//! Terrain-aware navigation graph and road pathfinding

pub mod graph;
pub mod pathfinding;
pub mod switchback;

pub use graph::{AccessPoint, CostModel, GraphStats, NavEdge, NavNode, NavigationGraph, NodeId, SteepEdge};
pub use pathfinding::{
    find_path, route_assets, AssetRoute, Path, PathSegment, PathfindingEngine, ProfilePoint, RoutingOutcome,
    SearchResult, Unreachable,
};
pub use switchback::{insert_switchbacks, SwitchbackReport};
