//! Artifact versions and version requirements
//!
//! Versions follow the ordering rules used by Maven repositories:
//! - numeric segments compare numerically (`1.10 > 1.9`)
//! - trailing zero / release segments are insignificant (`1 == 1.0 == 1.0.0`)
//! - qualifiers rank `alpha < beta < milestone < rc < snapshot < release < sp`,
//!   unknown qualifiers sort after `sp` lexically
//!
//! Requirements are either a plain version (`1.2`) or a union of ranges
//! (`[1.0,2.0)`, `(,1.5]`, `[1.0,1.2),[1.3,)`, `[1.5]`).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("Empty version")]
    Empty,

    #[error("Invalid version range '{0}'")]
    InvalidRange(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Number(u64),
    Qualifier(String),
}

/// Rank of a well-known qualifier; release is the neutral element.
fn qualifier_rank(q: &str) -> usize {
    match q {
        "alpha" | "a" => 0,
        "beta" | "b" => 1,
        "milestone" | "m" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => 5,
        "sp" => 6,
        _ => 7,
    }
}

const RELEASE_RANK: usize = 5;

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    let (ra, rb) = (qualifier_rank(a), qualifier_rank(b));
    if ra == 7 && rb == 7 {
        a.cmp(b)
    } else {
        ra.cmp(&rb)
    }
}

impl Item {
    fn is_null(&self) -> bool {
        match self {
            Item::Number(n) => *n == 0,
            Item::Qualifier(q) => qualifier_rank(q) == RELEASE_RANK,
        }
    }

    /// Compares this item against an absent one
    fn cmp_missing(&self) -> Ordering {
        match self {
            Item::Number(n) => n.cmp(&0),
            Item::Qualifier(q) => qualifier_rank(q).cmp(&RELEASE_RANK),
        }
    }

    fn cmp_item(&self, other: &Item) -> Ordering {
        match (self, other) {
            (Item::Number(a), Item::Number(b)) => a.cmp(b),
            (Item::Number(_), Item::Qualifier(_)) => Ordering::Greater,
            (Item::Qualifier(_), Item::Number(_)) => Ordering::Less,
            (Item::Qualifier(a), Item::Qualifier(b)) => compare_qualifiers(a, b),
        }
    }
}

fn push_token(current: &mut String, digits: bool, items: &mut Vec<Item>) {
    if current.is_empty() {
        return;
    }
    let token = std::mem::take(current);
    let item = if digits {
        // Oversized numbers saturate rather than fail
        Item::Number(token.parse().unwrap_or(u64::MAX))
    } else {
        Item::Qualifier(token)
    };
    items.push(item);
}

fn tokenize(raw: &str) -> Vec<Item> {
    let lower = raw.to_ascii_lowercase();
    let mut items = Vec::new();
    let mut current = String::new();
    let mut digits = false;

    for c in lower.chars() {
        if matches!(c, '.' | '-' | '_' | '+') {
            push_token(&mut current, digits, &mut items);
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != digits {
            push_token(&mut current, digits, &mut items);
        }
        digits = is_digit;
        current.push(c);
    }
    push_token(&mut current, digits, &mut items);

    while items.last().is_some_and(Item::is_null) {
        items.pop();
    }
    items
}

/// A concrete artifact version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    items: Vec<Item>,
}

impl Version {
    /// Parses a version string; only the empty string is rejected
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }
        Ok(Self {
            raw: raw.to_string(),
            items: tokenize(raw),
        })
    }

    /// Returns the version exactly as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true for `-SNAPSHOT` versions
    pub fn is_snapshot(&self) -> bool {
        self.raw.to_ascii_uppercase().ends_with("SNAPSHOT")
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.items.len().max(other.items.len());
        for i in 0..len {
            let ord = match (self.items.get(i), other.items.get(i)) {
                (Some(a), Some(b)) => a.cmp_item(b),
                (Some(a), None) => a.cmp_missing(),
                (None, Some(b)) => b.cmp_missing().reverse(),
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Normalized items, so equal versions hash equally
        for item in &self.items {
            match item {
                Item::Number(n) => {
                    0u8.hash(state);
                    n.hash(state);
                }
                Item::Qualifier(q) => {
                    1u8.hash(state);
                    let rank = qualifier_rank(q);
                    rank.hash(state);
                    // known aliases (`a`/`alpha`) compare equal and must hash equally
                    if rank == 7 {
                        q.hash(state);
                    }
                }
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.raw
    }
}

/// One bound of a range interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A single `[lower,upper)` style interval; `None` means unbounded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl Interval {
    pub fn contains(&self, v: &Version) -> bool {
        let above = match &self.lower {
            None => true,
            Some(b) if b.inclusive => v >= &b.version,
            Some(b) => v > &b.version,
        };
        let below = match &self.upper {
            None => true,
            Some(b) if b.inclusive => v <= &b.version,
            Some(b) => v < &b.version,
        };
        above && below
    }

    /// True for intervals like `(1.0,1.0)` that no version satisfies
    pub fn is_empty(&self) -> bool {
        matches!(
            (&self.lower, &self.upper),
            (Some(l), Some(u)) if l.version == u.version && !(l.inclusive && u.inclusive)
        )
    }

    fn parse(text: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidRange(text.to_string());
        let open = text.chars().next().ok_or_else(invalid)?;
        let close = text.chars().last().ok_or_else(invalid)?;
        if text.len() < 2 || !matches!(open, '[' | '(') || !matches!(close, ']' | ')') {
            return Err(invalid());
        }
        let lower_inclusive = open == '[';
        let upper_inclusive = close == ']';
        let body = &text[1..text.len() - 1];

        match body.split_once(',') {
            None => {
                // `[1.5]` pins a single version
                if !(lower_inclusive && upper_inclusive) || body.trim().is_empty() {
                    return Err(invalid());
                }
                let version = Version::parse(body).map_err(|_| invalid())?;
                Ok(Self {
                    lower: Some(Bound {
                        version: version.clone(),
                        inclusive: true,
                    }),
                    upper: Some(Bound {
                        version,
                        inclusive: true,
                    }),
                })
            }
            Some((lo, hi)) => {
                if hi.contains(',') {
                    return Err(invalid());
                }
                let bound = |s: &str, inclusive: bool| -> Result<Option<Bound>, VersionError> {
                    if s.trim().is_empty() {
                        Ok(None)
                    } else {
                        Ok(Some(Bound {
                            version: Version::parse(s).map_err(|_| invalid())?,
                            inclusive,
                        }))
                    }
                };
                let lower = bound(lo, lower_inclusive)?;
                let upper = bound(hi, upper_inclusive)?;
                if let (Some(l), Some(u)) = (&lower, &upper) {
                    if l.version > u.version {
                        return Err(invalid());
                    }
                }
                Ok(Self { lower, upper })
            }
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(u)) = (&self.lower, &self.upper) {
            if l.inclusive && u.inclusive && l.version == u.version {
                return write!(f, "[{}]", l.version);
            }
        }
        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
            None => f.write_str(")"),
        }
    }
}

/// A requested version: either a plain version or a set of ranges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionRequirement {
    Exact(Version),
    Ranges(Vec<Interval>),
}

impl VersionRequirement {
    pub fn exact(version: Version) -> Self {
        VersionRequirement::Exact(version)
    }

    pub fn is_range(&self) -> bool {
        matches!(self, VersionRequirement::Ranges(_))
    }

    pub fn matches(&self, v: &Version) -> bool {
        match self {
            VersionRequirement::Exact(exact) => exact == v,
            VersionRequirement::Ranges(ranges) => ranges.iter().any(|r| r.contains(v)),
        }
    }

    /// False when no version could ever match
    pub fn is_satisfiable(&self) -> bool {
        match self {
            VersionRequirement::Exact(_) => true,
            VersionRequirement::Ranges(ranges) => ranges.iter().any(|r| !r.is_empty()),
        }
    }

    /// Picks the highest of `available` that satisfies this requirement
    pub fn select_highest<'a>(&self, available: &'a [Version]) -> Option<&'a Version> {
        available.iter().filter(|v| self.matches(v)).max()
    }
}

/// Splits `[1,2),[3,4]` into its top-level intervals
fn split_intervals(s: &str) -> Result<Vec<&str>, VersionError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '(' => {
                if depth != 0 {
                    return Err(VersionError::InvalidRange(s.to_string()));
                }
                depth = 1;
                start = Some(i);
            }
            ']' | ')' => {
                let begin = start
                    .take()
                    .ok_or_else(|| VersionError::InvalidRange(s.to_string()))?;
                depth = 0;
                parts.push(&s[begin..=i]);
            }
            ',' if depth == 0 => {}
            c if depth == 0 && !c.is_whitespace() => {
                return Err(VersionError::InvalidRange(s.to_string()));
            }
            _ => {}
        }
    }
    if depth != 0 || parts.is_empty() {
        return Err(VersionError::InvalidRange(s.to_string()));
    }
    Ok(parts)
}

impl FromStr for VersionRequirement {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('[') || s.starts_with('(') {
            let ranges = split_intervals(s)?
                .into_iter()
                .map(Interval::parse)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(VersionRequirement::Ranges(ranges))
        } else {
            Ok(VersionRequirement::Exact(Version::parse(s)?))
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequirement::Exact(v) => write!(f, "{}", v),
            VersionRequirement::Ranges(ranges) => {
                for (i, r) in ranges.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", r)?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<String> for VersionRequirement {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionRequirement> for String {
    fn from(r: VersionRequirement) -> Self {
        r.to_string()
    }
}

impl From<Version> for VersionRequirement {
    fn from(v: Version) -> Self {
        VersionRequirement::Exact(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn numeric_segments_compare_numerically() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0") > v("1.99.99"));
        assert!(v("1.0.1") > v("1.0"));
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1.0.0"), v("1"));
        assert_eq!(v("1.0-final"), v("1"));
    }

    #[test]
    fn qualifier_ordering() {
        assert!(v("1.0-alpha") < v("1.0-beta"));
        assert!(v("1.0-beta") < v("1.0-rc1"));
        assert!(v("1.0-rc1") < v("1.0-SNAPSHOT"));
        assert!(v("1.0-SNAPSHOT") < v("1.0"));
        assert!(v("1.0") < v("1.0-sp1"));
        assert!(v("1.0-sp1") < v("1.0.1"));
        assert!(v("1.0a1") < v("1.0b1"));
    }

    #[test]
    fn unknown_qualifiers_sort_after_release() {
        assert!(v("1.0-jre") > v("1.0"));
        assert!(v("1.0-android") < v("1.0-jre"));
    }

    #[test]
    fn snapshot_detection() {
        assert!(v("1.0-SNAPSHOT").is_snapshot());
        assert!(!v("1.0").is_snapshot());
    }

    #[test]
    fn empty_version_rejected() {
        assert_eq!(Version::parse("  "), Err(VersionError::Empty));
    }

    #[test]
    fn display_keeps_written_text() {
        assert_eq!(v("1.0.0-RC1").to_string(), "1.0.0-RC1");
    }

    #[test]
    fn parse_half_open_range() {
        let req: VersionRequirement = "[1.0,2.0)".parse().unwrap();
        assert!(req.is_range());
        assert!(req.matches(&v("1.0")));
        assert!(req.matches(&v("1.9.9")));
        assert!(!req.matches(&v("2.0")));
        assert!(!req.matches(&v("0.9")));
    }

    #[test]
    fn parse_unbounded_ranges() {
        let upper: VersionRequirement = "(,1.5]".parse().unwrap();
        assert!(upper.matches(&v("0.1")));
        assert!(upper.matches(&v("1.5")));
        assert!(!upper.matches(&v("1.6")));

        let lower: VersionRequirement = "(1.5,)".parse().unwrap();
        assert!(!lower.matches(&v("1.5")));
        assert!(lower.matches(&v("100")));
    }

    #[test]
    fn parse_pinned_and_union() {
        let pinned: VersionRequirement = "[1.5]".parse().unwrap();
        assert!(pinned.matches(&v("1.5")));
        assert!(!pinned.matches(&v("1.5.1")));

        let union: VersionRequirement = "[1.0,1.2),[1.3,)".parse().unwrap();
        assert!(union.matches(&v("1.1")));
        assert!(!union.matches(&v("1.2")));
        assert!(union.matches(&v("1.3")));
    }

    #[test]
    fn invalid_ranges_rejected() {
        assert!("[1.0,2.0".parse::<VersionRequirement>().is_err());
        assert!("[2.0,1.0]".parse::<VersionRequirement>().is_err());
        assert!("(1.5)".parse::<VersionRequirement>().is_err());
        assert!("[1,2,3]".parse::<VersionRequirement>().is_err());
        assert!("[1,2]x".parse::<VersionRequirement>().is_err());
    }

    #[test]
    fn empty_interval_is_unsatisfiable() {
        let empty: VersionRequirement = "(1.0,1.0)".parse().unwrap();
        assert!(!empty.is_satisfiable());
        assert!("[1.0]".parse::<VersionRequirement>().unwrap().is_satisfiable());
        assert!("(1.0,1.0),[2,)".parse::<VersionRequirement>().unwrap().is_satisfiable());
    }

    #[test]
    fn select_highest_in_range() {
        let available = vec![v("1.5"), v("1.9"), v("2.0"), v("0.9")];
        let req: VersionRequirement = "[1.0,2.0)".parse().unwrap();
        assert_eq!(req.select_highest(&available), Some(&v("1.9")));

        let none: VersionRequirement = "[3.0,)".parse().unwrap();
        assert_eq!(none.select_highest(&available), None);
    }

    #[test]
    fn requirement_display_roundtrip() {
        for text in ["[1.0,2.0)", "(,1.5]", "[1.5]", "[1.0,1.2),[1.3,)", "3.1"] {
            let req: VersionRequirement = text.parse().unwrap();
            assert_eq!(req.to_string(), text);
        }
    }

    proptest! {
        #[test]
        fn ordering_is_antisymmetric(a in "[0-9]{1,3}(\\.[0-9]{1,3}){0,3}(-(alpha|beta|rc|SNAPSHOT|sp)[0-9]?)?",
                                     b in "[0-9]{1,3}(\\.[0-9]{1,3}){0,3}(-(alpha|beta|rc|SNAPSHOT|sp)[0-9]?)?") {
            let (va, vb) = (v(&a), v(&b));
            prop_assert_eq!(va.cmp(&vb), vb.cmp(&va).reverse());
        }

        #[test]
        fn appending_zero_segment_keeps_equality(a in "[1-9][0-9]{0,2}(\\.[0-9]{1,3}){0,3}") {
            let padded = format!("{}.0", a);
            prop_assert_eq!(v(&a), v(&padded));
        }
    }
}
