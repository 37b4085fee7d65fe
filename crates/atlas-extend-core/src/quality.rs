use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Global texture detail setting, finest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Full,
    Half,
    Quarter,
    Eighth,
}

impl QualityTier {
    /// Finest resolution levels skipped in live arrays. Quarter is the floor:
    /// Eighth keeps Quarter's resolution.
    pub fn resolution_offset(self) -> usize {
        match self {
            QualityTier::Full => 0,
            QualityTier::Half => 1,
            QualityTier::Quarter | QualityTier::Eighth => 2,
        }
    }

    /// True for tiers already at the minimum live resolution.
    pub fn is_floor(self) -> bool {
        matches!(self, QualityTier::Quarter | QualityTier::Eighth)
    }

    /// Map a numeric settings value (0 = full) to a tier; larger values clamp.
    pub fn from_setting(value: u32) -> Self {
        match value {
            0 => QualityTier::Full,
            1 => QualityTier::Half,
            2 => QualityTier::Quarter,
            _ => QualityTier::Eighth,
        }
    }
}

impl FromStr for QualityTier {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" | "0" => Ok(Self::Full),
            "half" | "1" => Ok(Self::Half),
            "quarter" | "2" => Ok(Self::Quarter),
            "eighth" | "3" => Ok(Self::Eighth),
            _ => Err(()),
        }
    }
}

/// What a tier observation requires from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierTransition {
    /// First tier seen; arrays are assumed to already match it.
    Initialized(QualityTier),
    Unchanged(QualityTier),
    /// Both tiers share the floor resolution; only the stored value changes.
    FloorEquivalent { from: QualityTier, to: QualityTier },
    /// Every registered entry has to be written again.
    Repatch { from: QualityTier, to: QualityTier },
}

impl TierTransition {
    pub fn needs_repatch(&self) -> bool {
        matches!(self, TierTransition::Repatch { .. })
    }

    pub fn tier(&self) -> QualityTier {
        match *self {
            TierTransition::Initialized(t) | TierTransition::Unchanged(t) => t,
            TierTransition::FloorEquivalent { to, .. } | TierTransition::Repatch { to, .. } => to,
        }
    }
}

/// Tracks the active tier and classifies changes to it.
#[derive(Debug, Clone, Default)]
pub struct QualityTierController {
    current: Option<QualityTier>,
}

impl QualityTierController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<QualityTier> {
        self.current
    }

    pub fn observe(&mut self, tier: QualityTier) -> TierTransition {
        let transition = match self.current {
            None => TierTransition::Initialized(tier),
            Some(from) if from == tier => TierTransition::Unchanged(tier),
            Some(from) if from.is_floor() && tier.is_floor() => {
                TierTransition::FloorEquivalent { from, to: tier }
            }
            Some(from) => TierTransition::Repatch { from, to: tier },
        };
        self.current = Some(tier);
        transition
    }
}
