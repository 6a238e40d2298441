//! Resolution fingerprints
//!
//! A blake3 digest over everything that can change a resolution result: the
//! root declarations (in declaration order, since it breaks mediation ties),
//! the request exclusions, the repository identities in priority order and
//! the consuming scope. Exclusion lists are sorted first, their order has no
//! effect.

use std::fmt;

use super::resolver::ResolveRequest;
use crate::domain::{DependencyDeclaration, Exclusion};

/// Stable identity of a resolution request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

fn field(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn sorted_exclusions(exclusions: &[Exclusion]) -> Vec<String> {
    let mut all: Vec<String> = exclusions.iter().map(|e| e.to_string()).collect();
    all.sort();
    all.dedup();
    all
}

fn hash_declaration(hasher: &mut blake3::Hasher, decl: &DependencyDeclaration) {
    field(hasher, &decl.group);
    field(hasher, &decl.name);
    field(hasher, &decl.version.to_string());
    field(hasher, decl.scope.as_str());
    field(hasher, if decl.optional { "optional" } else { "required" });
    field(hasher, decl.classifier.as_deref().unwrap_or(""));
    field(hasher, &decl.extension);

    let exclusions = sorted_exclusions(&decl.exclusions);
    hasher.update(&(exclusions.len() as u64).to_le_bytes());
    for e in &exclusions {
        field(hasher, e);
    }
}

impl Fingerprint {
    pub fn of(request: &ResolveRequest, repositories: &[String]) -> Self {
        let mut hasher = blake3::Hasher::new();

        field(&mut hasher, "roots");
        hasher.update(&(request.roots.len() as u64).to_le_bytes());
        for root in &request.roots {
            hash_declaration(&mut hasher, root);
        }

        field(&mut hasher, "exclusions");
        let exclusions = sorted_exclusions(&request.exclusions);
        hasher.update(&(exclusions.len() as u64).to_le_bytes());
        for e in &exclusions {
            field(&mut hasher, e);
        }

        field(&mut hasher, "repositories");
        hasher.update(&(repositories.len() as u64).to_le_bytes());
        for id in repositories {
            field(&mut hasher, id);
        }

        field(&mut hasher, "scope");
        field(&mut hasher, request.scope.as_str());

        Self(*hasher.finalize().as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// First 12 hex characters, for log lines
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
