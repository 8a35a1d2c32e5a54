//! Catalog of known pieces (trigger and action capabilities).
//!
//! A [`Catalog`] is an immutable snapshot. It is either `Live` (synced from
//! the engine) or `Fallback` (the built-in minimal set used when a sync
//! fails), so callers can tell which mode they are validating against.

pub mod fallback;
pub mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use registry::{CatalogRegistry, PieceSource};

/// Default number of pieces exposed to the producer prompt.
pub const COMPACT_LIMIT: usize = 50;
const MAX_SUGGESTIONS: usize = 5;
const COMPACT_DESCRIPTION_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceDescriptor {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub triggers: BTreeMap<String, OperationDescriptor>,
    #[serde(default)]
    pub actions: BTreeMap<String, OperationDescriptor>,
}

impl PieceDescriptor {
    /// Fill operation names from their map keys (the engine omits them).
    pub fn normalized(mut self) -> Self {
        for (key, op) in self.triggers.iter_mut().chain(self.actions.iter_mut()) {
            if op.name.is_empty() {
                op.name = key.clone();
            }
            if op.display_name.is_empty() {
                op.display_name = key.clone();
            }
        }
        self
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.actions.contains_key(name) || self.triggers.contains_key(name)
    }
}

/// Prompt-sized summary of one piece.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactPiece {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub triggers: Vec<CompactOperation>,
    pub actions: Vec<CompactOperation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactOperation {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_pieces: usize,
    pub total_triggers: usize,
    pub total_actions: usize,
    pub categories: Vec<String>,
    pub last_sync: DateTime<Utc>,
    pub fallback: bool,
}

/// Why a piece reference did not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    UnknownPiece {
        piece: String,
        suggestions: Vec<String>,
    },
    UnknownOperation {
        piece: String,
        operation: String,
        available: Vec<String>,
    },
}

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceError::UnknownPiece { piece, suggestions } if suggestions.is_empty() => {
                write!(f, "piece '{piece}' is not in the catalog")
            }
            ReferenceError::UnknownPiece { piece, suggestions } => write!(
                f,
                "piece '{piece}' is not in the catalog (did you mean {}?)",
                suggestions.join(", ")
            ),
            ReferenceError::UnknownOperation {
                piece,
                operation,
                available,
            } => write!(
                f,
                "'{operation}' is not an operation of '{piece}' (available: {})",
                available.join(", ")
            ),
        }
    }
}

/// Immutable set of pieces plus the time it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSnapshot {
    pieces: BTreeMap<String, PieceDescriptor>,
    synced_at: DateTime<Utc>,
}

impl CatalogSnapshot {
    pub fn new(pieces: impl IntoIterator<Item = PieceDescriptor>) -> Self {
        CatalogSnapshot {
            pieces: pieces
                .into_iter()
                .map(|p| {
                    let p = p.normalized();
                    (p.name.clone(), p)
                })
                .collect(),
            synced_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Catalog {
    Live(Arc<CatalogSnapshot>),
    Fallback(Arc<CatalogSnapshot>),
}

impl Catalog {
    pub fn live(pieces: impl IntoIterator<Item = PieceDescriptor>) -> Self {
        Catalog::Live(Arc::new(CatalogSnapshot::new(pieces)))
    }

    /// The built-in minimal catalog.
    pub fn fallback() -> Self {
        Catalog::Fallback(Arc::new(CatalogSnapshot::new(fallback::pieces())))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Catalog::Fallback(_))
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        match self {
            Catalog::Live(s) | Catalog::Fallback(s) => s,
        }
    }

    pub fn lookup(&self, piece: &str) -> Option<&PieceDescriptor> {
        self.snapshot().pieces.get(piece)
    }

    /// Pieces whose name contains `piece`, or is contained in it (case-insensitive).
    /// A blank `piece` matches nothing.
    pub fn find_similar(&self, piece: &str) -> Vec<String> {
        let needle = piece.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.snapshot()
            .pieces
            .keys()
            .filter(|name| {
                let name = name.to_lowercase();
                name.contains(&needle) || needle.contains(&name)
            })
            .take(MAX_SUGGESTIONS)
            .cloned()
            .collect()
    }

    /// Resolve a piece and, when given, one of its actions or triggers.
    pub fn validate_reference(
        &self,
        piece: &str,
        operation: Option<&str>,
    ) -> Result<&PieceDescriptor, ReferenceError> {
        let Some(descriptor) = self.lookup(piece) else {
            return Err(ReferenceError::UnknownPiece {
                piece: piece.to_string(),
                suggestions: self.find_similar(piece),
            });
        };

        match operation {
            Some(op) if !op.is_empty() && !descriptor.has_operation(op) => {
                Err(ReferenceError::UnknownOperation {
                    piece: descriptor.display_name.clone(),
                    operation: op.to_string(),
                    available: descriptor
                        .actions
                        .keys()
                        .chain(descriptor.triggers.keys())
                        .cloned()
                        .collect(),
                })
            }
            _ => Ok(descriptor),
        }
    }

    /// At most `limit` pieces, trimmed for prompt use.
    pub fn list_compact(&self, limit: usize) -> Vec<CompactPiece> {
        let compact_ops = |ops: &BTreeMap<String, OperationDescriptor>| {
            ops.iter()
                .map(|(key, op)| CompactOperation {
                    name: key.clone(),
                    display_name: if op.display_name.is_empty() {
                        key.clone()
                    } else {
                        op.display_name.clone()
                    },
                })
                .collect()
        };

        self.snapshot()
            .pieces
            .values()
            .take(limit)
            .map(|p| CompactPiece {
                name: p.name.clone(),
                display_name: p.display_name.clone(),
                description: p.description.chars().take(COMPACT_DESCRIPTION_CHARS).collect(),
                triggers: compact_ops(&p.triggers),
                actions: compact_ops(&p.actions),
            })
            .collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let snapshot = self.snapshot();
        let mut categories: Vec<String> = snapshot
            .pieces
            .values()
            .flat_map(|p| p.categories.iter().cloned())
            .collect();
        categories.sort();
        categories.dedup();

        CatalogStats {
            total_pieces: snapshot.pieces.len(),
            total_triggers: snapshot.pieces.values().map(|p| p.triggers.len()).sum(),
            total_actions: snapshot.pieces.values().map(|p| p.actions.len()).sum(),
            categories,
            last_sync: snapshot.synced_at,
            fallback: self.is_fallback(),
        }
    }
}
