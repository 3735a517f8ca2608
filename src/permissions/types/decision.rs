/*!
 * Decision Types
 * Tri-state decisions and the effects and kinds that produce them
 */

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one permission program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i8)]
pub enum Decision {
    Deny = -1,
    #[default]
    Unset = 0,
    Allow = 1,
}

impl Decision {
    #[inline]
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    #[inline]
    pub fn is_unset(self) -> bool {
        self == Decision::Unset
    }

    /// The effect carried by a set decision
    pub fn effect(self) -> Option<Effect> {
        match self {
            Decision::Allow => Some(Effect::Allow),
            Decision::Deny => Some(Effect::Deny),
            Decision::Unset => None,
        }
    }
}

/// Free-function form used by dispatch code
#[inline]
pub fn is_allowed(decision: Decision) -> bool {
    decision.is_allowed()
}

/// Effect of a grant or a declared default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

impl From<Effect> for Decision {
    #[inline]
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Allow => Decision::Allow,
            Effect::Deny => Decision::Deny,
        }
    }
}

/// Whether an entry targets one leaf or a whole prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Exact,
    Star,
}
