//! Properties of the commit hash.

use docanchor_anchor::generate_commit_hash;
use docanchor_core::{AnchorId, DocRoot, IssuerId};
use proptest::prelude::*;
use sha3::{Digest, Keccak256};

proptest! {
    #[test]
    fn deterministic(a in any::<[u8; 32]>(), i in any::<[u8; 6]>(), r in any::<[u8; 32]>()) {
        let (a, i, r) = (AnchorId::from_bytes(a), IssuerId::from_bytes(i), DocRoot::from_bytes(r));
        prop_assert_eq!(generate_commit_hash(&a, &i, &r), generate_commit_hash(&a, &i, &r));
    }

    #[test]
    fn order_sensitive(a in any::<[u8; 32]>(), i in any::<[u8; 6]>(), r in any::<[u8; 32]>()) {
        prop_assume!(a != r);
        let hash = generate_commit_hash(
            &AnchorId::from_bytes(a),
            &IssuerId::from_bytes(i),
            &DocRoot::from_bytes(r),
        );

        // anchor and root swapped
        let swapped = generate_commit_hash(
            &AnchorId::from_bytes(r),
            &IssuerId::from_bytes(i),
            &DocRoot::from_bytes(a),
        );
        prop_assert_ne!(hash, swapped);

        // issuer moved ahead of the root
        let mut reordered = Vec::new();
        reordered.extend_from_slice(&a);
        reordered.extend_from_slice(&i);
        reordered.extend_from_slice(&r);
        let reordered: [u8; 32] = Keccak256::digest(&reordered).into();
        prop_assert_ne!(hash, reordered);
    }

    #[test]
    fn every_field_contributes(a in any::<[u8; 32]>(), i in any::<[u8; 6]>(), r in any::<[u8; 32]>(), flip in 1u8..=255) {
        let base = generate_commit_hash(&AnchorId::from_bytes(a), &IssuerId::from_bytes(i), &DocRoot::from_bytes(r));
        let mut i2 = i;
        i2[0] ^= flip;
        prop_assert_ne!(base, generate_commit_hash(&AnchorId::from_bytes(a), &IssuerId::from_bytes(i2), &DocRoot::from_bytes(r)));
    }
}
