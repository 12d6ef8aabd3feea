// stave-core/src/artifact/ordering.rs
use std::cmp::Ordering;
use std::collections::HashMap;

use lazy_static::lazy_static;

use super::{Artifact, ArtifactKind};

/// Execution order over artifact *kinds*. Flight blocks that run before
/// anything else come first, cleanup directives for the previous version
/// before new payloads land, payload installers before file placement, file
/// placement before the lightweight symlinks that point into it, and `zap`
/// strictly last. Instances of the same kind keep declaration order.
pub const KIND_PRIORITY: &[ArtifactKind] = &[
    ArtifactKind::Preflight,
    ArtifactKind::Uninstall,
    ArtifactKind::Installer,
    ArtifactKind::Pkg,
    ArtifactKind::App,
    ArtifactKind::Suite,
    ArtifactKind::Binary,
    ArtifactKind::Manpage,
    ArtifactKind::Postflight,
    ArtifactKind::Zap,
];

lazy_static! {
    static ref ORDERING_RANKS: HashMap<ArtifactKind, usize> = KIND_PRIORITY
        .iter()
        .enumerate()
        .map(|(rank, kind)| (*kind, rank))
        .collect();
}

/// Stable for the process lifetime; O(1) after the one-time table build.
pub fn ordering_rank(kind: ArtifactKind) -> usize {
    ORDERING_RANKS[&kind]
}

/// Artifacts compare by the rank of their kinds. Same-kind artifacts are
/// `Equal`, so a stable sort preserves their declaration order.
pub fn cmp_artifacts(a: &Artifact, b: &Artifact) -> Ordering {
    ordering_rank(a.kind()).cmp(&ordering_rank(b.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::directives::DirectiveSet;
    use crate::artifact::moved::MovedArtifact;
    use crate::artifact::symlinked::SymlinkedArtifact;

    #[test]
    fn every_kind_has_a_rank() {
        for kind in KIND_PRIORITY {
            // Would panic on a kind missing from the table.
            ordering_rank(*kind);
        }
        assert_eq!(KIND_PRIORITY.len(), 10);
    }

    #[test]
    fn ranks_follow_the_priority_list_for_all_pairs() {
        for (i, a) in KIND_PRIORITY.iter().enumerate() {
            for b in &KIND_PRIORITY[i + 1..] {
                assert!(
                    ordering_rank(*a) < ordering_rank(*b),
                    "{a} should precede {b}"
                );
            }
        }
    }

    #[test]
    fn flight_blocks_precede_uninstall_and_zap_is_last() {
        assert!(ordering_rank(ArtifactKind::Preflight) < ordering_rank(ArtifactKind::Uninstall));
        assert!(ordering_rank(ArtifactKind::Uninstall) < ordering_rank(ArtifactKind::Installer));
        assert!(ordering_rank(ArtifactKind::Pkg) < ordering_rank(ArtifactKind::App));
        assert!(ordering_rank(ArtifactKind::Suite) < ordering_rank(ArtifactKind::Binary));
        for kind in KIND_PRIORITY {
            if *kind != ArtifactKind::Zap {
                assert!(ordering_rank(*kind) < ordering_rank(ArtifactKind::Zap));
            }
        }
    }

    #[test]
    fn same_kind_artifacts_compare_equal() {
        let a = Artifact::Binary(SymlinkedArtifact::binary("a", "a", None));
        let b = Artifact::Binary(SymlinkedArtifact::binary("b", "b", None));
        assert_eq!(cmp_artifacts(&a, &b), Ordering::Equal);
    }

    #[test]
    fn uninstall_sorts_before_app_regardless_of_declaration_order() {
        let app = Artifact::App(MovedArtifact::new("Foo.app", "Foo.app"));
        let uninstall = Artifact::Uninstall(DirectiveSet::default());
        assert_eq!(cmp_artifacts(&uninstall, &app), Ordering::Less);
        assert_eq!(cmp_artifacts(&app, &uninstall), Ordering::Greater);
    }
}
