//! The tree object: an ordered directory snapshot.
//!
//! A [`Tree`] is an arena of entries addressed by [`EntryId`]; parent links
//! are arena indices, so back-references never create an ownership cycle.
//! Children of a directory are kept in git tree order: names compare as
//! unsigned bytes with a virtual trailing `'/'` on directories and a
//! virtual NUL on everything else. This is what makes a file `abc` sort
//! before a sibling directory `abc`, and `abc` (file) sort before `abc-`.
//!
//! An entry's identifier doubles as its clean/dirty state: `None` means
//! modified. Every structural change clears the identifier of the touched
//! directory and all its ancestors. A directory with a known identifier can
//! drop its children (`unload`) and will re-read them from the attached
//! [`ObjectSource`] the next time they are needed.

use std::cmp::Ordering;
use std::rc::Rc;

use bstr::{BStr, BString, ByteSlice};
use gitdb_hash::ObjectId;

use crate::{FileMode, ObjectError, ObjectKind, ObjectSource};

/// Handle to an entry inside a [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u32);

impl EntryId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone)]
enum Payload {
    File { executable: bool },
    Symlink,
    Dir { children: Vec<EntryId>, loaded: bool },
}

#[derive(Clone)]
struct Node {
    parent: Option<EntryId>,
    name: BString,
    /// `None` while the entry is modified.
    id: Option<ObjectId>,
    payload: Payload,
}

/// A directory snapshot: the root entry plus the arena holding its
/// descendants.
pub struct Tree {
    nodes: Vec<Node>,
    source: Option<Rc<dyn ObjectSource>>,
}

impl Tree {
    /// Create an empty root tree. Empty trees are loaded and modified:
    /// their content is novel and has no identifier yet.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                name: BString::from(""),
                id: None,
                payload: Payload::Dir {
                    children: Vec::new(),
                    loaded: true,
                },
            }],
            source: None,
        }
    }

    /// Create an unloaded root tree bound to an object source.
    ///
    /// The children are read and decoded the first time they are queried.
    pub fn with_source(source: Rc<dyn ObjectSource>, id: ObjectId) -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                name: BString::from(""),
                id: Some(id),
                payload: Payload::Dir {
                    children: Vec::new(),
                    loaded: false,
                },
            }],
            source: Some(source),
        }
    }

    /// Decode a serialized tree into a fresh root.
    ///
    /// The root itself stays modified (it has no recorded identifier), but
    /// every decoded child is clean.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ObjectError> {
        let mut tree = Self::new();
        tree.decode_into(tree.root(), data)?;
        Ok(tree)
    }

    /// The root entry.
    pub fn root(&self) -> EntryId {
        EntryId(0)
    }

    /// The entry's name. Empty for the root.
    pub fn name(&self, id: EntryId) -> &BStr {
        self.nodes[id.index()].name.as_bstr()
    }

    /// The `/`-joined path from the root. Empty for the root itself.
    pub fn full_name(&self, id: EntryId) -> BString {
        let mut parts: Vec<&[u8]> = Vec::new();
        let mut cur = id;
        while let Some(parent) = self.nodes[cur.index()].parent {
            parts.push(self.nodes[cur.index()].name.as_bytes());
            cur = parent;
        }
        parts.reverse();
        BString::from(parts.join(&b'/'))
    }

    /// The entry's identifier, absent while it is modified.
    pub fn id(&self, id: EntryId) -> Option<ObjectId> {
        self.nodes[id.index()].id
    }

    /// The containing directory, `None` for the root and detached entries.
    pub fn parent(&self, id: EntryId) -> Option<EntryId> {
        self.nodes[id.index()].parent
    }

    /// The entry's file mode.
    pub fn mode(&self, id: EntryId) -> FileMode {
        match &self.nodes[id.index()].payload {
            Payload::File { executable: false } => FileMode::Regular,
            Payload::File { executable: true } => FileMode::Executable,
            Payload::Symlink => FileMode::Symlink,
            Payload::Dir { .. } => FileMode::Tree,
        }
    }

    /// Whether the entry is a directory.
    pub fn is_tree(&self, id: EntryId) -> bool {
        matches!(self.nodes[id.index()].payload, Payload::Dir { .. })
    }

    /// Whether the entry is a file.
    pub fn is_file(&self, id: EntryId) -> bool {
        matches!(self.nodes[id.index()].payload, Payload::File { .. })
    }

    /// Whether a file entry carries the executable bit.
    pub fn executable(&self, id: EntryId) -> bool {
        matches!(
            self.nodes[id.index()].payload,
            Payload::File { executable: true }
        )
    }

    /// Whether the entry has unsaved changes (no identifier).
    pub fn is_modified(&self, id: EntryId) -> bool {
        self.nodes[id.index()].id.is_none()
    }

    /// Whether a directory's children are materialized. Leaves are always
    /// loaded.
    pub fn is_loaded(&self, id: EntryId) -> bool {
        match &self.nodes[id.index()].payload {
            Payload::Dir { loaded, .. } => *loaded,
            _ => true,
        }
    }

    /// Record the entry's identifier, marking it clean.
    pub fn set_id(&mut self, id: EntryId, oid: ObjectId) {
        self.nodes[id.index()].id = Some(oid);
    }

    /// Flip a file entry's executable bit. Marks the entry and its
    /// ancestors modified when the bit actually changes.
    pub fn set_executable(&mut self, id: EntryId, executable: bool) {
        if let Payload::File { executable: e } = &mut self.nodes[id.index()].payload {
            if *e != executable {
                *e = executable;
                self.invalidate_up(id);
            }
        }
    }

    /// The directory's members in git tree order, hydrating if necessary.
    pub fn members(&mut self, dir: EntryId) -> Result<Vec<EntryId>, ObjectError> {
        self.ensure_loaded(dir)?;
        Ok(self.children_ref(dir).to_vec())
    }

    /// Number of members of a directory, hydrating if necessary.
    pub fn member_count(&mut self, dir: EntryId) -> Result<usize, ObjectError> {
        self.ensure_loaded(dir)?;
        Ok(self.children_ref(dir).len())
    }

    /// Look up an entry by `/`-separated path.
    ///
    /// The empty path names the root. Intermediate components resolve only
    /// against directories; the final component matches any kind, files
    /// first.
    pub fn find_member(&mut self, path: impl AsRef<[u8]>) -> Result<Option<EntryId>, ObjectError> {
        let path = path.as_ref();
        if path.is_empty() {
            return Ok(Some(self.root()));
        }
        let components: Vec<&[u8]> = path.split(|&b| b == b'/').collect();
        let Some((leaf, dirs)) = components.split_last() else {
            return Ok(None);
        };

        let mut cur = self.root();
        for comp in dirs {
            validate_name(comp)?;
            self.ensure_loaded(cur)?;
            match self.search_child(cur, comp, true) {
                Ok(pos) => cur = self.child(cur, pos),
                Err(_) => return Ok(None),
            }
        }

        validate_name(leaf)?;
        self.ensure_loaded(cur)?;
        if let Ok(pos) = self.search_child(cur, leaf, false) {
            return Ok(Some(self.child(cur, pos)));
        }
        if let Ok(pos) = self.search_child(cur, leaf, true) {
            return Ok(Some(self.child(cur, pos)));
        }
        Ok(None)
    }

    /// Whether any entry exists at the path.
    pub fn exists(&mut self, path: impl AsRef<[u8]>) -> Result<bool, ObjectError> {
        Ok(self.find_member(path)?.is_some())
    }

    /// Whether a non-directory entry exists at the path.
    pub fn exists_blob(&mut self, path: impl AsRef<[u8]>) -> Result<bool, ObjectError> {
        Ok(self
            .find_member(path)?
            .is_some_and(|id| !self.is_tree(id)))
    }

    /// Whether a directory exists at the path.
    pub fn exists_tree(&mut self, path: impl AsRef<[u8]>) -> Result<bool, ObjectError> {
        Ok(self.find_member(path)?.is_some_and(|id| self.is_tree(id)))
    }

    /// Add a file entry at a `/`-separated path, creating intermediate
    /// directories.
    ///
    /// Fails with [`ObjectError::EntryExists`] when any entry already
    /// occupies the final name, or when an intermediate component exists as
    /// a non-directory.
    pub fn add_file(&mut self, path: impl AsRef<[u8]>) -> Result<EntryId, ObjectError> {
        let path = path.as_ref();
        let components: Vec<&[u8]> = path.split(|&b| b == b'/').collect();
        let Some((leaf, dirs)) = components.split_last() else {
            return Err(ObjectError::InvalidName(BString::from(path)));
        };

        let (cur, mut walked) = self.walk_creating(dirs)?;
        validate_name(leaf)?;
        self.ensure_loaded(cur)?;
        if !walked.is_empty() {
            walked.push(b'/');
        }
        walked.extend_from_slice(leaf);

        let pos = match self.search_child(cur, leaf, false) {
            Ok(_) => return Err(ObjectError::EntryExists(walked)),
            Err(pos) => pos,
        };
        if self.search_child(cur, leaf, true).is_ok() {
            return Err(ObjectError::EntryExists(walked));
        }
        Ok(self.insert_child(cur, pos, leaf, None, Payload::File { executable: false }))
    }

    /// Add a directory entry at a `/`-separated path, creating intermediate
    /// directories. Idempotent: an existing directory at the final name is
    /// returned as-is.
    pub fn add_tree(&mut self, path: impl AsRef<[u8]>) -> Result<EntryId, ObjectError> {
        let path = path.as_ref();
        let components: Vec<&[u8]> = path.split(|&b| b == b'/').collect();
        let Some((leaf, dirs)) = components.split_last() else {
            return Err(ObjectError::InvalidName(BString::from(path)));
        };

        let (cur, _) = self.walk_creating(dirs)?;
        self.ensure_subtree(cur, leaf)
    }

    /// Look up a directory member by name within `dir`.
    pub fn subtree_named(
        &mut self,
        dir: EntryId,
        name: &[u8],
    ) -> Result<Option<EntryId>, ObjectError> {
        validate_name(name)?;
        self.ensure_loaded(dir)?;
        match self.search_child(dir, name, true) {
            Ok(pos) => Ok(Some(self.child(dir, pos))),
            Err(_) => Ok(None),
        }
    }

    /// Get or create a directory member by name within `dir`.
    pub fn ensure_subtree(&mut self, dir: EntryId, name: &[u8]) -> Result<EntryId, ObjectError> {
        validate_name(name)?;
        self.ensure_loaded(dir)?;
        match self.search_child(dir, name, true) {
            Ok(pos) => Ok(self.child(dir, pos)),
            Err(pos) => Ok(self.insert_child(
                dir,
                pos,
                name,
                None,
                Payload::Dir {
                    children: Vec::new(),
                    loaded: true,
                },
            )),
        }
    }

    /// Insert a file member with a known blob identifier directly into
    /// `dir`.
    pub fn put_file(
        &mut self,
        dir: EntryId,
        name: &[u8],
        oid: ObjectId,
        executable: bool,
    ) -> Result<EntryId, ObjectError> {
        validate_name(name)?;
        self.ensure_loaded(dir)?;
        let pos = match self.search_child(dir, name, false) {
            Ok(_) => {
                let mut full = self.full_name(dir);
                if !full.is_empty() {
                    full.push(b'/');
                }
                full.extend_from_slice(name);
                return Err(ObjectError::EntryExists(full));
            }
            Err(pos) => pos,
        };
        Ok(self.insert_child(dir, pos, name, Some(oid), Payload::File { executable }))
    }

    /// Detach an entry from its parent.
    ///
    /// The parent (and its ancestors) become modified; the entry's parent
    /// link is cleared. Detaching the root is a no-op.
    pub fn remove(&mut self, id: EntryId) {
        let Some(parent) = self.nodes[id.index()].parent else {
            return;
        };
        if let Payload::Dir { children, .. } = &mut self.nodes[parent.index()].payload {
            children.retain(|&c| c != id);
        }
        self.nodes[id.index()].parent = None;
        self.invalidate_up(parent);
    }

    /// Drop a clean directory's children; they reload from the identifier
    /// on next access.
    ///
    /// Fails when the directory is modified, since its content exists
    /// nowhere else. Leaves carry no load state and are unaffected.
    pub fn unload(&mut self, dir: EntryId) -> Result<(), ObjectError> {
        if !self.is_tree(dir) {
            return Ok(());
        }
        if self.nodes[dir.index()].id.is_none() {
            return Err(ObjectError::UnloadDirty(self.full_name(dir)));
        }
        if let Payload::Dir { children, loaded } = &mut self.nodes[dir.index()].payload {
            children.clear();
            *loaded = false;
        }
        Ok(())
    }

    /// Serialize a directory's members in wire format:
    /// `<octal-mode> SP <name> NUL <20 id bytes>` per member.
    pub fn encode(&mut self, dir: EntryId) -> Result<Vec<u8>, ObjectError> {
        self.ensure_loaded(dir)?;
        let children = self.children_ref(dir).to_vec();
        let mut out = Vec::new();
        for child in children {
            let oid = self.nodes[child.index()]
                .id
                .ok_or_else(|| ObjectError::UnresolvedEntry(self.full_name(child)))?;
            out.extend_from_slice(self.mode(child).as_octal_bytes());
            out.push(b' ');
            out.extend_from_slice(self.nodes[child.index()].name.as_bytes());
            out.push(0);
            out.extend_from_slice(oid.as_bytes());
        }
        Ok(out)
    }

    /// Hydrate an unloaded directory from the object source.
    pub(crate) fn ensure_loaded(&mut self, dir: EntryId) -> Result<(), ObjectError> {
        let pending = {
            let node = &self.nodes[dir.index()];
            match &node.payload {
                Payload::Dir { loaded: false, .. } => Some(node.id),
                _ => None,
            }
        };
        let oid = match pending {
            None => return Ok(()),
            Some(Some(oid)) => oid,
            // An unloaded directory always has an identifier; a bare one
            // can only be empty.
            Some(None) => {
                if let Payload::Dir { loaded, .. } = &mut self.nodes[dir.index()].payload {
                    *loaded = true;
                }
                return Ok(());
            }
        };

        let source = self
            .source
            .clone()
            .ok_or(ObjectError::NoSource(oid))?;
        let data = source
            .open_object(&oid)?
            .ok_or(ObjectError::MissingObject(oid))?;
        if data.kind() != ObjectKind::Tree {
            return Err(ObjectError::IncorrectKind {
                oid,
                expected: ObjectKind::Tree,
                actual: data.kind(),
            });
        }
        self.decode_into(dir, data.bytes())
    }

    /// Parse serialized tree content into `dir`, replacing its children.
    fn decode_into(&mut self, dir: EntryId, data: &[u8]) -> Result<(), ObjectError> {
        let mut children = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let space = data[pos..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ObjectError::CorruptTree {
                    offset: pos,
                    reason: "missing space after mode".into(),
                })?
                + pos;
            let mode = FileMode::from_octal_bytes(&data[pos..space]).map_err(|_| {
                ObjectError::CorruptTree {
                    offset: pos,
                    reason: "illegal mode".into(),
                }
            })?;

            let name_start = space + 1;
            let null = data[name_start..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ObjectError::CorruptTree {
                    offset: name_start,
                    reason: "missing NUL after name".into(),
                })?
                + name_start;
            let name = &data[name_start..null];
            if name.is_empty() || name.contains(&b'/') {
                return Err(ObjectError::CorruptTree {
                    offset: name_start,
                    reason: "invalid entry name".into(),
                });
            }

            let id_start = null + 1;
            if id_start + 20 > data.len() {
                return Err(ObjectError::CorruptTree {
                    offset: id_start,
                    reason: "truncated identifier".into(),
                });
            }
            let oid = ObjectId::from_bytes(&data[id_start..id_start + 20])?;

            let payload = match mode {
                FileMode::Regular => Payload::File { executable: false },
                FileMode::Executable => Payload::File { executable: true },
                FileMode::Symlink => Payload::Symlink,
                FileMode::Tree => Payload::Dir {
                    children: Vec::new(),
                    loaded: false,
                },
                FileMode::Missing => {
                    return Err(ObjectError::CorruptTree {
                        offset: pos,
                        reason: "illegal mode".into(),
                    })
                }
            };

            self.nodes.push(Node {
                parent: Some(dir),
                name: BString::from(name),
                id: Some(oid),
                payload,
            });
            children.push(EntryId(self.nodes.len() as u32 - 1));
            pos = id_start + 20;
        }

        if let Payload::Dir {
            children: slot,
            loaded,
        } = &mut self.nodes[dir.index()].payload
        {
            *slot = children;
            *loaded = true;
        }
        Ok(())
    }

    /// Walk intermediate components, creating directories as needed.
    /// Returns the final directory and the path walked so far.
    fn walk_creating(&mut self, dirs: &[&[u8]]) -> Result<(EntryId, BString), ObjectError> {
        let mut cur = self.root();
        let mut walked = BString::from("");
        for comp in dirs {
            validate_name(comp)?;
            self.ensure_loaded(cur)?;
            if !walked.is_empty() {
                walked.push(b'/');
            }
            walked.extend_from_slice(comp);

            cur = match self.search_child(cur, comp, true) {
                Ok(pos) => self.child(cur, pos),
                Err(pos) => {
                    if self.search_child(cur, comp, false).is_ok() {
                        // The name is taken by a non-directory.
                        return Err(ObjectError::EntryExists(walked));
                    }
                    self.insert_child(
                        cur,
                        pos,
                        comp,
                        None,
                        Payload::Dir {
                            children: Vec::new(),
                            loaded: true,
                        },
                    )
                }
            };
        }
        Ok((cur, walked))
    }

    /// Binary search `dir`'s children for `name` with the given kind probe.
    ///
    /// `Ok(position)` on a hit, `Err(insertion_point)` otherwise. The
    /// children must already be loaded.
    fn search_child(&self, dir: EntryId, name: &[u8], as_dir: bool) -> Result<usize, usize> {
        let children = self.children_ref(dir);
        let mut lo = 0usize;
        let mut hi = children.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let node = &self.nodes[children[mid].index()];
            let node_is_dir = matches!(node.payload, Payload::Dir { .. });
            match compare_names(node.name.as_bytes(), node_is_dir, name, as_dir) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    fn child(&self, dir: EntryId, pos: usize) -> EntryId {
        self.children_ref(dir)[pos]
    }

    fn children_ref(&self, dir: EntryId) -> &[EntryId] {
        match &self.nodes[dir.index()].payload {
            Payload::Dir { children, .. } => children,
            _ => &[],
        }
    }

    pub(crate) fn child_at_raw(&self, dir: EntryId, pos: usize) -> Option<EntryId> {
        self.children_ref(dir).get(pos).copied()
    }

    pub(crate) fn children_snapshot(&self, dir: EntryId) -> Vec<EntryId> {
        self.children_ref(dir).to_vec()
    }

    /// Allocate a node and wire it into `dir` at `pos`, invalidating the
    /// identifiers of `dir` and its ancestors.
    fn insert_child(
        &mut self,
        dir: EntryId,
        pos: usize,
        name: &[u8],
        id: Option<ObjectId>,
        payload: Payload,
    ) -> EntryId {
        self.nodes.push(Node {
            parent: Some(dir),
            name: BString::from(name),
            id,
            payload,
        });
        let new_id = EntryId(self.nodes.len() as u32 - 1);
        if let Payload::Dir { children, .. } = &mut self.nodes[dir.index()].payload {
            children.insert(pos, new_id);
        }
        self.invalidate_up(dir);
        new_id
    }

    /// Clear the identifier of `id` and every ancestor up to the root.
    fn invalidate_up(&mut self, mut id: EntryId) {
        loop {
            let node = &mut self.nodes[id.index()];
            node.id = None;
            match node.parent {
                Some(parent) => id = parent,
                None => break,
            }
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Git's tree entry name comparison.
///
/// After the common prefix, the next byte is the name's own byte where one
/// exists, a virtual `'/'` for directories at end of name, and a virtual
/// NUL for everything else at end of name.
pub fn compare_names(name1: &[u8], is_dir1: bool, name2: &[u8], is_dir2: bool) -> Ordering {
    let min_len = name1.len().min(name2.len());
    let cmp = name1[..min_len].cmp(&name2[..min_len]);
    if cmp != Ordering::Equal {
        return cmp;
    }
    let c1 = if name1.len() > min_len {
        name1[min_len]
    } else if is_dir1 {
        b'/'
    } else {
        0
    };
    let c2 = if name2.len() > min_len {
        name2[min_len]
    } else if is_dir2 {
        b'/'
    } else {
        0
    };
    c1.cmp(&c2)
}

/// Entry names are non-empty and contain neither `'/'` nor NUL.
fn validate_name(name: &[u8]) -> Result<(), ObjectError> {
    if name.is_empty() || name.contains(&b'/') || name.contains(&0) {
        return Err(ObjectError::InvalidName(BString::from(name)));
    }
    Ok(())
}
