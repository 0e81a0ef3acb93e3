//! Path string tokenizer.

use std::fmt;

/// One navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// `""` group: jump to the tree root.
    Root,
    /// `".."` group: move to the parent.
    Parent,
    /// `"."` group: stay at the current node.
    Current,
    /// Named child of an object or index into an array.
    Child(String),
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Root => f.write_str("<root>"),
            PathToken::Parent => f.write_str(".."),
            PathToken::Current => f.write_str("."),
            PathToken::Child(name) => f.write_str(name),
        }
    }
}

/// Tokenize a dependency path.
///
/// Empty fragments produced by sub-splitting a group (as in `a..b`) become
/// `Child("")`, which never resolves.
pub fn parse_path(path: &str) -> Vec<PathToken> {
    path.split('/')
        .flat_map(|group| -> Vec<PathToken> {
            match group {
                "" => vec![PathToken::Root],
                "." => vec![PathToken::Current],
                ".." => vec![PathToken::Parent],
                _ => group
                    .split('.')
                    .map(|t| PathToken::Child(t.to_string()))
                    .collect(),
            }
        })
        .collect()
}
