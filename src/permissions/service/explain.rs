/*!
 * Decision Explanations
 *
 * Every check produces a [`Verdict`] naming the layer that decided. The hot
 * path only reads its decision; `explain` renders it for operators.
 */

use crate::core::types::{Rank, RoleId, SegmentId};
use crate::permissions::program::ProgramMatch;
use crate::permissions::registry::Namespace;
use crate::permissions::types::{normalize_local, Decision, Kind};
use serde::Serialize;

/// Deciding layer of one check, unrendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    User(ProgramMatch),
    Role { role_id: RoleId, matched: ProgramMatch },
    Default(ProgramMatch),
    /// The reference no longer points into the catalog
    Undeclared,
}

impl Verdict {
    /// Fail-closed: anything but an explicit allow is a deny
    #[inline]
    pub fn decision(&self) -> Decision {
        match self {
            Verdict::User(m) | Verdict::Role { matched: m, .. } | Verdict::Default(m) => {
                m.decision()
            }
            Verdict::Undeclared => Decision::Deny,
        }
    }
}

/// Where a decision came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layer", rename_all = "snake_case")]
pub enum DecisionSource {
    /// The node string did not resolve against the catalog
    Unresolved,
    UserOverride {
        node: String,
        kind: Kind,
    },
    Role {
        role_id: RoleId,
        rank: Rank,
        node: String,
        kind: Kind,
    },
    CatalogDefault {
        node: String,
        kind: Kind,
    },
    Undeclared,
}

/// Decision plus the layer and node that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub node: String,
    pub decision: Decision,
    pub source: DecisionSource,
    /// Assigned roles in the order they were consulted
    pub roles_considered: Vec<RoleId>,
}

impl Explanation {
    pub fn unresolved(node: &str) -> Self {
        Self {
            node: node.to_string(),
            decision: Decision::Deny,
            source: DecisionSource::Unresolved,
            roles_considered: Vec::new(),
        }
    }

    #[inline]
    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }
}

/// Render the node a match points at, e.g. `A.cmd.*`
pub(crate) fn matched_node(ns: &Namespace, path: &[SegmentId], matched: &ProgramMatch) -> String {
    let prefix = &path[..matched.depth.min(path.len())];
    let local = ns.interner().render(prefix);
    format!("{}.{}", ns.key(), normalize_local(matched.kind, &local))
}

pub(crate) fn describe(
    verdict: Verdict,
    ns: &Namespace,
    path: &[SegmentId],
    rank_of: impl Fn(RoleId) -> Rank,
) -> DecisionSource {
    match verdict {
        Verdict::User(m) => DecisionSource::UserOverride {
            node: matched_node(ns, path, &m),
            kind: m.kind,
        },
        Verdict::Role { role_id, matched } => DecisionSource::Role {
            role_id,
            rank: rank_of(role_id),
            node: matched_node(ns, path, &matched),
            kind: matched.kind,
        },
        Verdict::Default(m) => DecisionSource::CatalogDefault {
            node: matched_node(ns, path, &m),
            kind: m.kind,
        },
        Verdict::Undeclared => DecisionSource::Undeclared,
    }
}
