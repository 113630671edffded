// swgkit-parsers/src/building/positions.rs
//! World-relative cell positions from portal connectivity

use std::collections::{BTreeMap, VecDeque};

use swgkit_core::Vec3;

use super::Building;

/// Offset applied when a portal carries no door hardpoint.
///
/// A placement heuristic; there is no geometric source for the value.
pub const FALLBACK_CELL_OFFSET: Vec3 = Vec3::new(0.0, 20.0, 0.0);

/// Breadth-first walk from cell 0 (the exterior anchor at the origin).
///
/// Each portal record is a directed edge to its connecting cell. A cell reached
/// through a record with a door hardpoint is placed at the parent's position
/// plus the hardpoint translation; otherwise [`FALLBACK_CELL_OFFSET`] is used.
/// Cells not reachable from cell 0 are absent from the result.
pub fn cell_positions(building: &Building) -> BTreeMap<usize, Vec3> {
    let mut positions = BTreeMap::new();
    if building.cells.is_empty() {
        return positions;
    }

    let mut queue = VecDeque::new();
    positions.insert(0, Vec3::ZERO);
    queue.push_back(0usize);

    while let Some(current) = queue.pop_front() {
        let origin = positions.get(&current).copied().unwrap_or(Vec3::ZERO);

        for record in &building.cells[current].portals {
            let Some(target) = usize::try_from(record.connecting_cell)
                .ok()
                .filter(|&t| t < building.cells.len())
            else {
                continue;
            };
            if positions.contains_key(&target) {
                continue;
            }

            let offset = record
                .door_hardpoint
                .map(|t| t.translation)
                .unwrap_or(FALLBACK_CELL_OFFSET);
            positions.insert(target, origin + offset);
            queue.push_back(target);
        }
    }

    tracing::debug!(
        cells = building.cells.len(),
        placed = positions.len(),
        "Reconstructed cell positions"
    );
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::{BuildingVersion, Cell, PortalRecord};
    use swgkit_core::Transform;

    fn translated(x: f32, y: f32, z: f32) -> Transform {
        Transform {
            translation: Vec3::new(x, y, z),
            ..Transform::IDENTITY
        }
    }

    #[test]
    fn test_hardpoint_and_fallback() {
        let mut building = Building::new(BuildingVersion::V4);
        building.add_cell(Cell::new("r0", "").with_portal(PortalRecord::new(0, 1).with_hardpoint(translated(5.0, 0.0, 0.0))));
        building.add_cell(Cell::new("r1", "").with_portal(PortalRecord::new(1, 2)));
        building.add_cell(Cell::new("r2", ""));
        building.add_cell(Cell::new("island", ""));

        let positions = cell_positions(&building);
        assert_eq!(positions.get(&0), Some(&Vec3::ZERO));
        assert_eq!(positions.get(&1), Some(&Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(positions.get(&2), Some(&Vec3::new(5.0, 20.0, 0.0)));
        assert!(!positions.contains_key(&3));
    }

    #[test]
    fn test_invalid_targets_ignored() {
        let mut building = Building::new(BuildingVersion::V3);
        building.add_cell(
            Cell::new("r0", "")
                .with_portal(PortalRecord::new(0, -1))
                .with_portal(PortalRecord::new(1, 42)),
        );
        let positions = cell_positions(&building);
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn test_first_visit_wins() {
        let mut building = Building::new(BuildingVersion::V4);
        building.add_cell(
            Cell::new("r0", "")
                .with_portal(PortalRecord::new(0, 1).with_hardpoint(translated(1.0, 0.0, 0.0)))
                .with_portal(PortalRecord::new(1, 1).with_hardpoint(translated(9.0, 0.0, 0.0))),
        );
        building.add_cell(Cell::new("r1", ""));
        assert_eq!(cell_positions(&building)[&1], Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_empty_building() {
        assert!(cell_positions(&Building::new(BuildingVersion::V3)).is_empty());
    }
}
