//! Actor Paths
//!
//! Hierarchical, immutable addresses of positions in the actor tree.
//! `/user/orders/worker-1` names the child `worker-1` of `orders`, which is
//! supervised by the user guardian. The root guardian is `/`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Immutable hierarchical address of an actor
///
/// Equality, ordering and hashing all go through the canonical `/`-joined
/// form, so two paths built differently but naming the same position are the
/// same key.
#[derive(Clone)]
pub struct ActorPath {
    segments: Vec<String>,
    joined: String,
}

impl ActorPath {
    /// Path of the root guardian (`/`)
    pub fn root() -> Self {
        Self::from_segments(Vec::<String>::new())
    }

    /// Parse `/a/b/c`; empty segments are dropped so `a//b/` equals `/a/b`
    pub fn parse(path: &str) -> Self {
        Self::from_segments(path.split('/').filter(|s| !s.is_empty()))
    }

    /// Build from an ordered segment sequence
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let joined = if segments.is_empty() {
            "/".to_string()
        } else {
            let mut joined = String::with_capacity(segments.iter().map(|s| s.len() + 1).sum());
            for segment in &segments {
                joined.push('/');
                joined.push_str(segment);
            }
            joined
        };
        Self { segments, joined }
    }

    /// Path of the child `name` of this path
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self::from_segments(segments)
    }

    /// Parent path; `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self::from_segments(
            self.segments[..self.segments.len() - 1].iter().cloned(),
        ))
    }

    /// Top-level segment (`user` for `/user/a/b`)
    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Last segment; empty for the root
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &ActorPath) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    pub fn as_str(&self) -> &str {
        &self.joined
    }
}

impl PartialEq for ActorPath {
    fn eq(&self, other: &Self) -> bool {
        self.joined == other.joined
    }
}

impl Eq for ActorPath {}

impl Hash for ActorPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.joined.hash(state);
    }
}

impl PartialOrd for ActorPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.joined.cmp(&other.joined)
    }
}

impl fmt::Display for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined)
    }
}

impl fmt::Debug for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorPath({})", self.joined)
    }
}

impl From<&str> for ActorPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for ActorPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

// Paths cross the remote boundary in their textual form
impl Serialize for ActorPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined)
    }
}

impl<'de> Deserialize<'de> for ActorPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

/// One step of a selection expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathElement {
    /// `.` or an empty segment: jump to the root guardian
    Root,
    /// `..`
    Parent,
    /// `*`: every current child
    Wildcard,
    /// Literal child name
    Child(String),
}

impl PathElement {
    /// Split a selection expression into steps
    ///
    /// A leading `/` yields `Root` (absolute selection). A trailing `/` is
    /// ignored, and repeated slashes act like a single root jump.
    pub fn parse_selection(expr: &str) -> Vec<PathElement> {
        let parts: Vec<&str> = expr.split('/').collect();
        let last = parts.len().saturating_sub(1);
        parts
            .iter()
            .enumerate()
            .filter(|(i, part)| !(part.is_empty() && *i == last && *i != 0))
            .map(|(_, part)| match *part {
                "" | "." => PathElement::Root,
                ".." => PathElement::Parent,
                "*" => PathElement::Wildcard,
                name => PathElement::Child(name.to_string()),
            })
            .collect()
    }
}
