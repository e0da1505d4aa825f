use std::fmt;

use super::domain::PathwayReference;
use crate::reference_data::normalize_name;

/// Location of a node: the names of its ancestors followed by its own kind,
/// e.g. `/Sundhedsfagligt grundforløb/Sygepleje/Indsatser/basketGrantReference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralPath(Vec<String>);

impl fmt::Display for StructuralPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// Slash-separated pattern where `*` stands for exactly one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment {
                "*" => Segment::Wildcard,
                literal => Segment::Literal(normalize_name(literal)),
            })
            .collect();

        Self {
            raw: raw.trim().to_string(),
            segments,
        }
    }

    pub fn matches(&self, path: &StructuralPath) -> bool {
        self.segments.len() == path.0.len()
            && self
                .segments
                .iter()
                .zip(&path.0)
                .all(|(pattern, segment)| match pattern {
                    Segment::Wildcard => true,
                    Segment::Literal(expected) => *expected == normalize_name(segment),
                })
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A node selected by [`filter_references`] together with the path it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceMatch<'a> {
    pub path: StructuralPath,
    pub reference: &'a PathwayReference,
}

/// Depth-first walk over the pathway trees returning nodes whose path matches
/// `pattern`, in discovery order. With `active_only` the subtrees of inactive
/// (historical) pathways are not visited.
pub fn filter_references<'a>(
    roots: &'a [PathwayReference],
    pattern: &PathPattern,
    active_only: bool,
) -> Vec<ReferenceMatch<'a>> {
    let mut matches = Vec::new();
    let mut ancestors = Vec::new();
    for root in roots {
        collect(root, pattern, active_only, &mut ancestors, &mut matches);
    }
    matches
}

/// Narrows an earlier result to the entries matching `pattern`.
pub fn refine<'a>(matches: &[ReferenceMatch<'a>], pattern: &PathPattern) -> Vec<ReferenceMatch<'a>> {
    matches
        .iter()
        .filter(|entry| pattern.matches(&entry.path))
        .cloned()
        .collect()
}

fn collect<'a>(
    node: &'a PathwayReference,
    pattern: &PathPattern,
    active_only: bool,
    ancestors: &mut Vec<String>,
    matches: &mut Vec<ReferenceMatch<'a>>,
) {
    if active_only && !node.active {
        return;
    }

    let mut segments = ancestors.clone();
    segments.push(node.kind.clone());
    let path = StructuralPath(segments);
    if pattern.matches(&path) {
        matches.push(ReferenceMatch {
            path,
            reference: node,
        });
    }

    ancestors.push(node.name.clone());
    for child in &node.children {
        collect(child, pattern, active_only, ancestors, matches);
    }
    ancestors.pop();
}

/// First node, depth-first, whose name equals `name` exactly.
pub fn find_by_name<'a>(roots: &'a [PathwayReference], name: &str) -> Option<&'a PathwayReference> {
    roots.iter().find_map(|root| {
        if root.name == name {
            Some(root)
        } else {
            find_by_name(&root.children, name)
        }
    })
}
