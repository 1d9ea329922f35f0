//! Properties of git tree ordering: member order is stable under the
//! codec and always agrees with the name comparator.

use std::cmp::Ordering;

use gitdb_hash::ObjectId;
use gitdb_object::{compare_names, Tree};
use proptest::prelude::*;

proptest! {
    #[test]
    fn members_sorted_and_codec_stable(names in prop::collection::vec("[a-z.-]{1,8}", 1..20)) {
        let mut tree = Tree::new();
        let oid = ObjectId::from_raw([1u8; 20]);

        for (i, name) in names.iter().enumerate() {
            // Alternate kinds so files and directories mix; collisions with
            // existing entries are simply skipped.
            let added = if i % 2 == 0 {
                tree.add_tree(name.as_bytes())
            } else {
                tree.add_file(name.as_bytes())
            };
            if let Ok(id) = added {
                tree.set_id(id, oid);
            }
        }

        let members = tree.members(tree.root()).unwrap();
        for pair in members.windows(2) {
            let a = pair[0];
            let b = pair[1];
            prop_assert_eq!(
                compare_names(
                    tree.name(a).as_ref(),
                    tree.is_tree(a),
                    tree.name(b).as_ref(),
                    tree.is_tree(b),
                ),
                Ordering::Less
            );
        }

        // decode(encode(tree)) yields the same byte sequence and member
        // names in the same order.
        let encoded = tree.encode(tree.root()).unwrap();
        let mut decoded = Tree::from_bytes(&encoded).unwrap();
        prop_assert_eq!(&decoded.encode(decoded.root()).unwrap(), &encoded);

        let decoded_members = decoded.members(decoded.root()).unwrap();
        prop_assert_eq!(members.len(), decoded_members.len());
        for (&a, &b) in members.iter().zip(decoded_members.iter()) {
            prop_assert_eq!(tree.name(a), decoded.name(b));
            prop_assert_eq!(tree.is_tree(a), decoded.is_tree(b));
        }
    }
}
