/*!
 * Permission Nodes
 *
 * The `<namespace>.<local>` grammar and the compiled forms it is parsed into.
 * Strings are parsed once at the edge; everything past the resolver works on
 * interned segment paths.
 */

use super::decision::{Effect, Kind};
use super::rows::{GrantRow, Subject};
use crate::core::limits::{MAX_NODE_LENGTH, MAX_NODE_SEGMENTS};
use crate::core::types::{NamespaceIndex, SegmentId, Version};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const WILDCARD: &str = "*";
const STAR_SUFFIX: &str = ".*";

/// Local part of a grant or declaration string, after grammar checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantTarget<'a> {
    /// An exact leaf such as `cmd.reload`
    Exact(&'a str),
    /// A prefix wildcard; `""` is the root star `*`
    Star(&'a str),
}

impl<'a> GrantTarget<'a> {
    pub fn kind(&self) -> Kind {
        match self {
            GrantTarget::Exact(_) => Kind::Exact,
            GrantTarget::Star(_) => Kind::Star,
        }
    }

    /// The dotted path without any wildcard suffix
    pub fn local(&self) -> &'a str {
        match *self {
            GrantTarget::Exact(local) | GrantTarget::Star(local) => local,
        }
    }

    /// Canonical string form (`cmd.reload`, `cmd.*`, `*`)
    pub fn normalized(&self) -> String {
        normalize_local(self.kind(), self.local())
    }
}

/// Canonical local string for a kind and a bare path
pub fn normalize_local(kind: Kind, local: &str) -> String {
    match (kind, local.is_empty()) {
        (Kind::Star, true) => WILDCARD.to_string(),
        (Kind::Star, false) => format!("{local}{STAR_SUFFIX}"),
        (Kind::Exact, _) => local.to_string(),
    }
}

/// Split `<namespace>.<local>` at the first dot; both halves non-empty
pub fn split_node(node: &str) -> Option<(&str, &str)> {
    if node.len() > MAX_NODE_LENGTH {
        return None;
    }
    let (namespace, local) = node.split_once('.')?;
    if namespace.is_empty() || local.is_empty() || namespace.contains('*') {
        return None;
    }
    Some((namespace, local))
}

/// Parse a node used for authorization: no wildcard anywhere in the local
pub fn parse_lookup(node: &str) -> Option<(&str, &str)> {
    let (namespace, local) = split_node(node)?;
    valid_path(local).then_some((namespace, local))
}

/// Parse a node used for grants and declarations: exact, `prefix.*` or `*`
pub fn parse_grant(node: &str) -> Option<(&str, GrantTarget<'_>)> {
    let (namespace, local) = split_node(node)?;
    if local == WILDCARD {
        return Some((namespace, GrantTarget::Star("")));
    }
    if let Some(prefix) = local.strip_suffix(STAR_SUFFIX) {
        return valid_path(prefix).then_some((namespace, GrantTarget::Star(prefix)));
    }
    valid_path(local).then_some((namespace, GrantTarget::Exact(local)))
}

fn valid_path(local: &str) -> bool {
    let mut count = 0;
    for segment in local.split('.') {
        count += 1;
        if segment.is_empty() || segment.contains('*') || count > MAX_NODE_SEGMENTS {
            return false;
        }
    }
    true
}

/// Compiled address of an entry inside one namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeAddress {
    Exact(Arc<[SegmentId]>),
    Star(Arc<[SegmentId]>),
}

impl NodeAddress {
    pub fn new(kind: Kind, path: Arc<[SegmentId]>) -> Self {
        match kind {
            Kind::Exact => NodeAddress::Exact(path),
            Kind::Star => NodeAddress::Star(path),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            NodeAddress::Exact(_) => Kind::Exact,
            NodeAddress::Star(_) => Kind::Star,
        }
    }

    pub fn path(&self) -> &[SegmentId] {
        match self {
            NodeAddress::Exact(path) | NodeAddress::Star(path) => path,
        }
    }
}

/// A resolved, interned pointer into one namespace's catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub namespace: NamespaceIndex,
    pub path: Arc<[SegmentId]>,
    /// Namespace version when this reference was produced
    pub version: Version,
}

/// A grant string validated against the live catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGrant {
    pub node: NodeRef,
    pub namespace_key: Arc<str>,
    pub kind: Kind,
    /// Canonical local (`cmd.reload`, `cmd.*`, `*`)
    pub normalized_local: String,
}

impl ResolvedGrant {
    /// The bare dotted path as stored in grant rows (`""` for the root star)
    pub fn local(&self) -> &str {
        match self.kind {
            Kind::Exact => &self.normalized_local,
            Kind::Star => self
                .normalized_local
                .strip_suffix(STAR_SUFFIX)
                .unwrap_or(""),
        }
    }

    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.kind, self.node.path.clone())
    }

    /// Full node string; resolving it again yields an equal grant
    pub fn node_string(&self) -> String {
        format!("{}.{}", self.namespace_key, self.normalized_local)
    }

    pub fn to_row(&self, subject: Subject, effect: Effect) -> GrantRow {
        GrantRow {
            subject,
            namespace: self.namespace_key.to_string(),
            kind: self.kind,
            local: self.local().to_string(),
            effect,
        }
    }
}

/// Serializable view of a catalog entry, used for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CatalogEntry {
    pub node: String,
    pub kind: Kind,
    pub default: Effect,
}
