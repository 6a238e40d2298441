//! Dependency scopes
//!
//! A scope classifies a dependency edge by the build phase that needs it.
//! Scopes narrow along a dependency path: a transitive dependency can never be
//! visible in more places than the edge that brought it in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown dependency scope '{0}'")]
pub struct ScopeError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Needed everywhere
    #[default]
    Compile,
    /// Supplied by the runtime environment; compile and test only
    Provided,
    /// Needed when running, not when compiling
    Runtime,
    /// Needed by test tasks only
    Test,
    /// Like provided, but pinned to a file on the local system
    System,
}

impl Scope {
    pub const ALL: [Scope; 5] = [
        Scope::Compile,
        Scope::Provided,
        Scope::Runtime,
        Scope::Test,
        Scope::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Provided => "provided",
            Scope::Runtime => "runtime",
            Scope::Test => "test",
            Scope::System => "system",
        }
    }

    /// Returns true if a dependency declared in `declared` scope is visible
    /// to tasks consuming dependencies in this scope
    pub fn accepts(&self, declared: Scope) -> bool {
        use Scope::*;
        match self {
            Compile => matches!(declared, Compile | Provided | System),
            Runtime => matches!(declared, Runtime | Compile),
            Test => true,
            Provided => declared == Provided,
            System => declared == System,
        }
    }

    /// Whether edges declared in this scope are inherited below the root
    pub fn is_transitive(&self) -> bool {
        matches!(self, Scope::Compile | Scope::Runtime)
    }

    /// Scope of a transitive dependency reached through a `self`-scoped path
    /// and declared as `child`. `None` means the edge is not inherited.
    pub fn derive(&self, child: Scope) -> Option<Scope> {
        use Scope::*;
        match child {
            Compile => Some(*self),
            Runtime => match self {
                Compile | Runtime => Some(Runtime),
                other => Some(*other),
            },
            Provided | Test | System => None,
        }
    }

    /// Breadth rank: higher is visible in more places
    pub fn breadth(&self) -> u8 {
        match self {
            Scope::Compile => 4,
            Scope::Runtime => 3,
            Scope::Provided => 2,
            Scope::System => 1,
            Scope::Test => 0,
        }
    }

    /// Returns true if this scope is visible everywhere `other` is
    pub fn covers(&self, other: Scope) -> bool {
        Scope::ALL
            .into_iter()
            .all(|consumer| !consumer.accepts(other) || consumer.accepts(*self))
    }

    /// Parses a scope keyword; empty means compile
    pub fn parse(keyword: &str) -> Result<Self, ScopeError> {
        let k = keyword.trim();
        if k.is_empty() {
            return Ok(Scope::Compile);
        }
        Scope::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(k))
            .ok_or_else(|| ScopeError(k.to_string()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A small set of scopes, used for the effective scopes of a resolved node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScopeSet(u8);

impl ScopeSet {
    fn bit(scope: Scope) -> u8 {
        1 << (scope as u8)
    }

    pub fn single(scope: Scope) -> Self {
        Self(Self::bit(scope))
    }

    /// Adds a scope; returns true if it was not present yet
    pub fn insert(&mut self, scope: Scope) -> bool {
        let before = self.0;
        self.0 |= Self::bit(scope);
        before != self.0
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0 & Self::bit(scope) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> {
        let set = *self;
        Scope::ALL.into_iter().filter(move |s| set.contains(*s))
    }

    /// Returns true if some scope in the set already covers `scope`
    pub fn covers(&self, scope: Scope) -> bool {
        self.iter().any(|s| s.covers(scope))
    }

    /// The broadest member visible to `consumer`
    pub fn effective_for(&self, consumer: Scope) -> Option<Scope> {
        self.iter()
            .filter(|s| consumer.accepts(*s))
            .max_by_key(|s| s.breadth())
    }
}
