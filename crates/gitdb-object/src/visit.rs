//! Pre/post-order traversal over a tree.

use bitflags::bitflags;

use crate::{EntryId, ObjectError, Tree};

bitflags! {
    /// Options controlling [`Tree::traverse`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TraverseFlags: u32 {
        /// Skip entries and subtrees that carry an identifier.
        const MODIFIED_ONLY = 1 << 0;
        /// Do not hydrate unloaded subtrees; their children are not
        /// visited.
        const LOADED_ONLY = 1 << 1;
        /// Iterate a snapshot of each directory's members so the visitor
        /// may mutate the tree while it runs.
        const CONCURRENT_MODIFICATION = 1 << 2;
    }
}

/// Callbacks invoked by [`Tree::traverse`].
///
/// Directories get a pre-order `start_tree` and a post-order `end_tree`;
/// leaves get a single callback. All callbacks may mutate the tree (pair
/// with [`TraverseFlags::CONCURRENT_MODIFICATION`] when mutating the part
/// being walked).
pub trait TreeVisitor {
    fn start_tree(&mut self, tree: &mut Tree, id: EntryId) -> Result<(), ObjectError> {
        let _ = (tree, id);
        Ok(())
    }

    fn end_tree(&mut self, tree: &mut Tree, id: EntryId) -> Result<(), ObjectError> {
        let _ = (tree, id);
        Ok(())
    }

    fn visit_file(&mut self, tree: &mut Tree, id: EntryId) -> Result<(), ObjectError> {
        let _ = (tree, id);
        Ok(())
    }

    fn visit_symlink(&mut self, tree: &mut Tree, id: EntryId) -> Result<(), ObjectError> {
        let _ = (tree, id);
        Ok(())
    }
}

impl Tree {
    /// Walk the subtree rooted at `start`, invoking the visitor's
    /// callbacks in depth-first order.
    pub fn traverse(
        &mut self,
        start: EntryId,
        flags: TraverseFlags,
        visitor: &mut dyn TreeVisitor,
    ) -> Result<(), ObjectError> {
        if self.is_tree(start) {
            self.walk_dir(start, flags, visitor)
        } else {
            self.walk_leaf(start, flags, visitor)
        }
    }

    fn walk_dir(
        &mut self,
        dir: EntryId,
        flags: TraverseFlags,
        visitor: &mut dyn TreeVisitor,
    ) -> Result<(), ObjectError> {
        if flags.contains(TraverseFlags::MODIFIED_ONLY) && !self.is_modified(dir) {
            return Ok(());
        }
        let descend = self.is_loaded(dir) || !flags.contains(TraverseFlags::LOADED_ONLY);

        visitor.start_tree(self, dir)?;
        if descend {
            self.ensure_loaded(dir)?;
            if flags.contains(TraverseFlags::CONCURRENT_MODIFICATION) {
                for child in self.children_snapshot(dir) {
                    // The visitor may have detached this entry already.
                    if self.parent(child) != Some(dir) {
                        continue;
                    }
                    self.walk_entry(child, flags, visitor)?;
                }
            } else {
                let mut i = 0;
                while let Some(child) = self.child_at_raw(dir, i) {
                    self.walk_entry(child, flags, visitor)?;
                    i += 1;
                }
            }
        }
        visitor.end_tree(self, dir)
    }

    fn walk_entry(
        &mut self,
        id: EntryId,
        flags: TraverseFlags,
        visitor: &mut dyn TreeVisitor,
    ) -> Result<(), ObjectError> {
        if self.is_tree(id) {
            self.walk_dir(id, flags, visitor)
        } else {
            self.walk_leaf(id, flags, visitor)
        }
    }

    fn walk_leaf(
        &mut self,
        id: EntryId,
        flags: TraverseFlags,
        visitor: &mut dyn TreeVisitor,
    ) -> Result<(), ObjectError> {
        if flags.contains(TraverseFlags::MODIFIED_ONLY) && !self.is_modified(id) {
            return Ok(());
        }
        if self.is_file(id) {
            visitor.visit_file(self, id)
        } else {
            visitor.visit_symlink(self, id)
        }
    }
}
