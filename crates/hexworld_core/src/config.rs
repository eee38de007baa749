//! World configuration.
//!
//! Tunables are plain serde data so a game can ship them as RON next to
//! its other data files.
//!
//! # Example RON
//!
//! ```ron
//! WorldConfig(
//!     pathfinding: PathfindingConfig(
//!         base_cost: 4294967296,          // 1.0 as raw I32F32 bits
//!         protected_penalty: 15032385536, // 3.5
//!         heuristic_weight: 2147483648,   // 0.5
//!     ),
//!     corrector_queue_capacity: 4096,
//!     max_pocket_size: 64,
//!     max_stack_size: 8,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::math::{fixed_serde, ratio, Fixed};

/// Cost model constants shared by all search algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Cost of one step.
    #[serde(with = "fixed_serde")]
    pub base_cost: Fixed,
    /// Multiplier applied when stepping off a protected tile.
    #[serde(with = "fixed_serde")]
    pub protected_penalty: Fixed,
    /// Heuristic cost per unit of `|dx| + |dy|`.
    #[serde(with = "fixed_serde")]
    pub heuristic_weight: Fixed,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            base_cost: Fixed::ONE,
            protected_penalty: ratio(7, 2),
            heuristic_weight: ratio(1, 2),
        }
    }
}

impl PathfindingConfig {
    /// Whether the heuristic never overestimates the remaining cost.
    ///
    /// One hex step changes `|dx| + |dy|` by at most two and costs at least
    /// `base_cost`, so the heuristic stays admissible while
    /// `2 * heuristic_weight <= base_cost` and the penalty does not discount.
    #[must_use]
    pub fn is_admissible(&self) -> bool {
        self.heuristic_weight * Fixed::from_num(2) <= self.base_cost
            && self.protected_penalty >= Fixed::ONE
    }
}

/// Top-level world configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Path cost constants.
    pub pathfinding: PathfindingConfig,
    /// Capacity of each corrector's dirty-tile queue.
    pub corrector_queue_capacity: usize,
    /// Largest enclosed neutral pocket the landmark corrector adopts.
    pub max_pocket_size: usize,
    /// Maximum height of a material stack.
    pub max_stack_size: u8,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            pathfinding: PathfindingConfig::default(),
            corrector_queue_capacity: 4096,
            max_pocket_size: 64,
            max_stack_size: 8,
        }
    }
}

impl WorldConfig {
    /// Parse a configuration from RON. Missing fields take their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| GridError::Config(e.to_string()))?;
        if !config.pathfinding.is_admissible() {
            tracing::warn!(
                heuristic_weight = %config.pathfinding.heuristic_weight,
                base_cost = %config.pathfinding.base_cost,
                "Heuristic weight is not admissible; A* paths may be suboptimal"
            );
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_admissible() {
        let config = WorldConfig::default();
        assert!(config.pathfinding.is_admissible());
        assert_eq!(config.pathfinding.protected_penalty, Fixed::from_num(3.5));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = WorldConfig::from_ron_str("(max_stack_size: 4)").unwrap();
        assert_eq!(config.max_stack_size, 4);
        assert_eq!(config.corrector_queue_capacity, 4096);
        assert_eq!(config.pathfinding, PathfindingConfig::default());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = WorldConfig {
            max_pocket_size: 10,
            ..WorldConfig::default()
        };
        let text = ron::to_string(&config).unwrap();
        assert_eq!(WorldConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_bad_ron_is_config_error() {
        assert!(matches!(
            WorldConfig::from_ron_str("(max_stack_size: \"eight\")"),
            Err(GridError::Config(_))
        ));
    }

    #[test]
    fn test_heavy_heuristic_is_not_admissible() {
        let config = PathfindingConfig {
            heuristic_weight: Fixed::ONE,
            ..PathfindingConfig::default()
        };
        assert!(!config.is_admissible());
    }
}
