//! Scope identity - project path normalization and the global sentinel

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Sentinel identity used when no project path is supplied
pub const GLOBAL_SCOPE: &str = "global";

/// An isolated namespace of memories and relations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Project(String),
}

impl Scope {
    /// Resolve a caller-supplied project path into a scope identity.
    ///
    /// Resolution is idempotent: the same path string always maps to the
    /// same scope, and cosmetic differences (trailing slashes, backslash
    /// separators, surrounding whitespace) do not create distinct scopes.
    pub fn resolve(project_path: Option<&str>) -> Self {
        match project_path {
            Some(raw) => {
                let normalized = normalize_path(raw);
                if normalized.is_empty() {
                    Self::Global
                } else {
                    Self::Project(normalized)
                }
            }
            None => Self::Global,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Global => GLOBAL_SCOPE,
            Self::Project(path) => path,
        }
    }

    /// File this scope persists to, relative to the data root.
    ///
    /// Project paths are fingerprinted so that arbitrary paths become
    /// filesystem-safe names that cannot collide across projects.
    pub fn storage_file(&self, root: &Path) -> PathBuf {
        match self {
            Self::Global => root.join("global.json"),
            Self::Project(path) => {
                let mut fingerprint: String = Sha256::digest(path.as_bytes())
                    .iter()
                    .map(|b| format!("{:02x}", b))
                    .collect();
                fingerprint.truncate(12);
                root.join("scopes")
                    .join(format!("{}-{}.json", slug(path), fingerprint))
            }
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim().replace('\\', "/");
    while path.contains("//") {
        path = path.replace("//", "/");
    }
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    path
}

/// Human-readable tail of the path, sanitized for filesystem use
fn slug(path: &str) -> String {
    let tail = path
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or("scope");
    let mut slug: String = tail
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    slug.truncate(40);
    if slug.is_empty() {
        slug.push_str("scope");
    }
    slug
}
