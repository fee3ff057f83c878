//! Memory and relation records
//!
//! The unit of stored knowledge, plus the typed, weighted edges between
//! units. Keys are caller-chosen strings, unique within a scope.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{MemoryError, Result};

/// Retention intent of a memory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Knowledge tied to one project
    Project,
    /// Knowledge that applies everywhere
    Global,
    /// A reusable pattern or convention
    Pattern,
    /// A design decision and its rationale
    Decision,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Global => "global",
            Self::Pattern => "pattern",
            Self::Decision => "decision",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "project" => Ok(Self::Project),
            "global" => Ok(Self::Global),
            "pattern" => Ok(Self::Pattern),
            "decision" => Ok(Self::Decision),
            other => Err(MemoryError::Validation(format!(
                "unknown category '{}' (expected project, global, pattern, or decision)",
                other
            ))),
        }
    }
}

/// How one memory relates to another
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    RelatedTo,
    DependsOn,
    Implements,
    Extends,
    Uses,
    References,
    PartOf,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelatedTo => "related_to",
            Self::DependsOn => "depends_on",
            Self::Implements => "implements",
            Self::Extends => "extends",
            Self::Uses => "uses",
            Self::References => "references",
            Self::PartOf => "part_of",
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "related_to" => Ok(Self::RelatedTo),
            "depends_on" => Ok(Self::DependsOn),
            "implements" => Ok(Self::Implements),
            "extends" => Ok(Self::Extends),
            "uses" => Ok(Self::Uses),
            "references" => Ok(Self::References),
            "part_of" => Ok(Self::PartOf),
            other => Err(MemoryError::Validation(format!(
                "unknown relation type '{}' (expected related_to, depends_on, implements, \
                 extends, uses, references, or part_of)",
                other
            ))),
        }
    }
}

/// A single memory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Caller-chosen identifier, unique within its scope
    pub key: String,
    /// The stored content
    pub value: String,
    /// Retention intent
    pub category: Category,
    /// When this memory was first saved
    pub created_at: DateTime<Utc>,
    /// When the value was last overwritten
    pub updated_at: DateTime<Utc>,
    /// Number of times recalled
    pub access_count: u32,
}

impl MemoryRecord {
    /// Create a new memory
    pub fn new(key: impl Into<String>, value: impl Into<String>, category: Category) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            value: value.into(),
            category,
            created_at: now,
            updated_at: now,
            access_count: 0,
        }
    }

    /// Overwrite the value in place, preserving `created_at` and `access_count`
    pub fn overwrite(&mut self, value: impl Into<String>, category: Category) {
        let now = Utc::now();
        // Coarse clocks can return the same instant for back-to-back saves;
        // updated_at must still move forward.
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::nanoseconds(1)
        };
        self.value = value.into();
        self.category = category;
    }

    /// Record that this memory was recalled
    pub fn mark_recalled(&mut self) {
        self.access_count += 1;
    }
}

/// A typed, weighted edge between two memories in the same scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRecord {
    pub source_key: String,
    pub target_key: String,
    pub relation_type: RelationType,
    /// Edge weight in [0.0, 1.0]
    pub strength: f64,
    pub bidirectional: bool,
    pub created_at: DateTime<Utc>,
}

impl RelationRecord {
    pub fn new(
        source_key: impl Into<String>,
        target_key: impl Into<String>,
        relation_type: RelationType,
        strength: f64,
        bidirectional: bool,
    ) -> Self {
        Self {
            source_key: source_key.into(),
            target_key: target_key.into(),
            relation_type,
            strength,
            bidirectional,
            created_at: Utc::now(),
        }
    }

    /// The mirrored edge stored alongside a bidirectional relation
    pub fn inverse(&self) -> Self {
        Self {
            source_key: self.target_key.clone(),
            target_key: self.source_key.clone(),
            ..self.clone()
        }
    }
}

/// Validate a relation strength into [0.0, 1.0]
pub fn validate_strength(strength: f64) -> Result<f64> {
    // NaN fails the range check and is rejected with everything else
    if (0.0..=1.0).contains(&strength) {
        Ok(strength)
    } else {
        Err(MemoryError::Validation(format!(
            "strength must be between 0.0 and 1.0, got {}",
            strength
        )))
    }
}
