//! Token-by-token resolution against a live control tree.

use super::parser::{parse_path, PathToken};

/// Navigation primitives the resolver needs from a control tree.
pub trait ControlNavigator {
    type Id: Copy;

    fn root(&self) -> Self::Id;

    fn parent(&self, id: Self::Id) -> Option<Self::Id>;

    /// Named child of an object node, or element `segment` (parsed as an
    /// index) of an array node.
    fn child(&self, id: Self::Id, segment: &str) -> Option<Self::Id>;
}

/// Resolve `path` starting at `anchor`.
pub fn resolve_path<N: ControlNavigator + ?Sized>(nav: &N, anchor: N::Id, path: &str) -> Option<N::Id> {
    resolve_tokens(nav, anchor, &parse_path(path))
}

pub fn resolve_tokens<N: ControlNavigator + ?Sized>(
    nav: &N,
    anchor: N::Id,
    tokens: &[PathToken],
) -> Option<N::Id> {
    tokens.iter().try_fold(anchor, |current, token| match token {
        PathToken::Root => Some(nav.root()),
        PathToken::Parent => nav.parent(current),
        PathToken::Current => Some(current),
        PathToken::Child(segment) => nav.child(current, segment),
    })
}
