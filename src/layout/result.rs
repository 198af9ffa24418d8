use serde::{Deserialize, Serialize};

use super::earthwork::EarthworkSummary;
use crate::constraints::Violation;
use crate::core::types::AssetId;
use crate::navigation::{SwitchbackReport, Unreachable};
use crate::optimizer::FitnessResult;
use crate::roads::RoadNetwork;
use crate::site::PlacedAsset;

/// An asset the road network could not reach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnconnectedAsset {
    pub asset_id: AssetId,
    pub reason: Unreachable,
    pub message: String,
}

impl UnconnectedAsset {
    pub fn new(asset_id: AssetId, reason: Unreachable) -> Self {
        Self {
            message: reason.to_string(),
            asset_id,
            reason,
        }
    }
}

/// Final arrangement, roads and diagnostics of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub assets: Vec<PlacedAsset>,
    pub road_network: RoadNetwork,
    pub fitness: FitnessResult,
    /// No BLOCKING violation in the selected arrangement
    pub feasible: bool,
    pub generations_run: usize,
    pub converged: bool,
    pub cancelled: bool,
    /// Ids of `unconnected`, in asset order
    pub unconnected_asset_ids: Vec<AssetId>,
    pub unconnected: Vec<UnconnectedAsset>,
    /// Violations of the selected arrangement, BLOCKING first
    pub violations: Vec<Violation>,
    /// Best fitness after initialization and after each generation
    pub fitness_history: Vec<f64>,
    pub earthwork: EarthworkSummary,
    /// Present when the navigation graph needed switchbacks
    pub switchbacks: Option<SwitchbackReport>,
}

impl LayoutResult {
    pub fn is_connected(&self, asset_id: &AssetId) -> bool {
        !self.unconnected_asset_ids.contains(asset_id)
    }

    pub fn asset(&self, asset_id: &AssetId) -> Option<&PlacedAsset> {
        self.assets.iter().find(|a| a.id() == asset_id)
    }

    pub fn blocking_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_blocking())
    }

    pub fn to_json(&self, pretty: bool) -> crate::core::Result<String> {
        Ok(if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        })
    }
}

/// BLOCKING first, then higher priority, keeping input order within ties
pub(crate) fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| {
        b.is_blocking()
            .cmp(&a.is_blocking())
            .then_with(|| b.priority().weight().total_cmp(&a.priority().weight()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{ConstraintType, Priority, Severity, ViolationKind};
    use crate::core::types::ConstraintId;

    #[test]
    fn test_unconnected_message_follows_reason() {
        let u = UnconnectedAsset::new(AssetId::new("barn_0"), Unreachable::GradeLimit);
        assert_eq!(u.message, Unreachable::GradeLimit.to_string());
    }

    #[test]
    fn test_blocking_violations_sort_first() {
        let mut violations = vec![
            Violation {
                asset_id: AssetId::new("a"),
                kind: ViolationKind::Constraint {
                    constraint_id: ConstraintId::new("easement"),
                    constraint_type: ConstraintType::Easement,
                    severity: Severity::Warning,
                    priority: Priority::Critical,
                },
            },
            Violation {
                asset_id: AssetId::new("a"),
                kind: ViolationKind::OutsideBoundary,
            },
        ];
        sort_violations(&mut violations);
        assert!(violations[0].is_blocking());
        assert!(!violations[1].is_blocking());
    }
}
