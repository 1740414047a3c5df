//! Legacy-marker prefilter: one Aho-Corasick pass per script file.
//!
//! A script without any framework marker cannot produce a registration, an
//! HTTP fact or a route, so it never reaches tree-sitter. Bundled third-party
//! code is the usual beneficiary.

use aho_corasick::{AhoCorasick, MatchKind};
use std::sync::OnceLock;

/// Substrings that any fact-bearing legacy script contains.
const LEGACY_MARKERS: &[&str] = &[
    ".controller(",
    ".service(",
    ".factory(",
    ".provider(",
    ".directive(",
    ".config(",
    "$inject",
    "$http",
    "$q",
    "$scope",
    "$stateProvider",
    "$routeProvider",
    "$urlRouterProvider",
];

static MARKER_AUTOMATON: OnceLock<Option<AhoCorasick>> = OnceLock::new();

fn automaton() -> Option<&'static AhoCorasick> {
    MARKER_AUTOMATON
        .get_or_init(|| {
            AhoCorasick::builder()
                .match_kind(MatchKind::LeftmostFirst)
                .build(LEGACY_MARKERS)
                .ok()
        })
        .as_ref()
}

/// `true` if `source` contains at least one legacy marker.
///
/// If the automaton cannot be built every file is treated as a candidate.
pub fn has_legacy_markers(source: &[u8]) -> bool {
    match automaton() {
        Some(ac) => ac.find(source).is_some(),
        None => true,
    }
}

/// Distinct markers found in `source`, in marker-table order.
pub fn markers_in(source: &[u8]) -> Vec<&'static str> {
    let Some(ac) = automaton() else {
        return Vec::new();
    };
    let mut seen = vec![false; LEGACY_MARKERS.len()];
    for mat in ac.find_iter(source) {
        seen[mat.pattern().as_usize()] = true;
    }
    LEGACY_MARKERS
        .iter()
        .zip(seen)
        .filter(|(_, hit)| *hit)
        .map(|(m, _)| *m)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_script_has_no_markers() {
        assert!(!has_legacy_markers(b"export function add(a, b) { return a + b; }"));
    }

    #[test]
    fn test_controller_registration_is_detected() {
        let src = b"angular.module('app').controller('UserController', ['$scope', function ($scope) {}]);";
        assert!(has_legacy_markers(src));
        let found = markers_in(src);
        assert!(found.contains(&".controller("));
        assert!(found.contains(&"$scope"));
    }
}
