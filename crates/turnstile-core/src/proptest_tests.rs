//! Property-based tests for turnstile-core types.

use proptest::prelude::*;

use crate::{AdmissionError, Namespace, ServerName, ValidationVerdict, Verdicts};
use crate::{PackageDeclaration, RegistryType};

/// Strategy for generating namespace labels.
fn label_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9_-]{0,12}"
}

/// Strategy for generating valid namespaces.
fn namespace_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(label_strategy(), 1..5).prop_map(|labels| labels.join("."))
}

proptest! {
    /// Every generated namespace parses and keeps its text.
    #[test]
    fn namespace_parse_preserves_text(raw in namespace_strategy()) {
        let ns = Namespace::parse(&raw).unwrap();
        prop_assert_eq!(ns.as_str(), raw.as_str());
    }

    /// A namespace covers itself and every dotted child.
    #[test]
    fn namespace_covers_children(raw in namespace_strategy(), label in label_strategy()) {
        let parent = Namespace::parse(&raw).unwrap();
        let child = parent.child(&label).unwrap();
        prop_assert!(parent.covers(&parent));
        prop_assert!(parent.covers(&child));
        prop_assert!(!child.covers(&parent));
    }

    /// Extending the last label never yields a covered namespace.
    #[test]
    fn namespace_does_not_cover_sibling_prefix(raw in namespace_strategy(), suffix in "[a-z0-9]{1,4}") {
        let ns = Namespace::parse(&raw).unwrap();
        let sibling = Namespace::parse(&format!("{raw}{suffix}")).unwrap();
        prop_assert!(!ns.covers(&sibling));
    }

    /// Reversing to a domain twice restores the namespace.
    #[test]
    fn namespace_domain_is_involution(raw in namespace_strategy()) {
        let ns = Namespace::parse(&raw).unwrap();
        let back = Namespace::parse(&ns.to_domain()).unwrap();
        prop_assert_eq!(back.to_domain(), raw);
    }

    /// Server names split at the only slash.
    #[test]
    fn server_name_splits(raw in namespace_strategy(), name in "[a-z][a-z0-9._-]{0,20}") {
        let server = ServerName::parse(&format!("{raw}/{name}")).unwrap();
        prop_assert_eq!(server.namespace().as_str(), raw.as_str());
        prop_assert_eq!(server.name(), name.as_str());
    }

    /// The first rejection is the one with the lowest index, whatever the
    /// order verdicts were collected in.
    #[test]
    fn first_rejection_is_order_independent(
        failing in prop::collection::btree_set(0usize..16, 1..6),
        seed in any::<u64>(),
    ) {
        let pkg = PackageDeclaration::new(RegistryType::Npm, "pkg");
        let mut verdicts: Vec<_> = (0..16)
            .map(|i| {
                if failing.contains(&i) {
                    ValidationVerdict::rejected(i, &pkg, &AdmissionError::policy(format!("bad {i}")))
                } else {
                    ValidationVerdict::accepted(i, &pkg)
                }
            })
            .collect();
        let len = verdicts.len();
        verdicts.rotate_left(usize::try_from(seed % len as u64).unwrap());

        let expected = *failing.iter().next().unwrap();
        let collected: Verdicts = verdicts.into_iter().collect();
        prop_assert_eq!(collected.first_rejection().unwrap().index, expected);
    }
}
