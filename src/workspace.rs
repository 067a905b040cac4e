//! Scoped temporary workspace for intermediate sorted units.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log;
use tempfile;

use crate::chunk::SortedUnit;

/// Private workspace directory owned by a single sort invocation.
///
/// Unit paths are allocated from a monotonic counter so names never collide.
/// Dropping the workspace removes the directory and everything left in it,
/// on success and on every failure path alike.
pub struct Workspace {
    dir: tempfile::TempDir,
    next_unit_id: u64,
}

impl Workspace {
    /// Creates the workspace directory under `parent`, or under the OS
    /// temporary directory if `parent` is [`None`].
    pub fn create(parent: Option<&Path>) -> io::Result<Self> {
        let dir = match parent {
            Some(parent) => tempfile::tempdir_in(parent),
            None => tempfile::tempdir(),
        }?;

        log::info!("using {} as a temporary workspace", dir.path().display());

        return Ok(Workspace { dir, next_unit_id: 0 });
    }

    /// Path of the workspace directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Allocates a fresh file path for an intermediate unit.
    pub fn allocate_unit_path(&mut self) -> PathBuf {
        let path = self.dir.path().join(format!("unit-{}", self.next_unit_id));
        self.next_unit_id += 1;
        return path;
    }

    /// Moves the final unit to `dest` with a rename: O(1), never a copy, and
    /// on failure `dest` is left untouched. An existing file at `dest` is
    /// replaced.
    pub fn promote(&self, unit: SortedUnit, dest: &Path) -> io::Result<()> {
        fs::rename(unit.into_path(), dest)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use rstest::*;

    use super::Workspace;
    use crate::chunk::SortedUnit;

    #[rstest]
    fn test_unit_paths_are_unique() {
        let mut workspace = Workspace::create(None).unwrap();

        let first = workspace.allocate_unit_path();
        let second = workspace.allocate_unit_path();

        assert_ne!(first, second);
    }

    #[rstest]
    fn test_drop_removes_workspace() {
        let parent = tempfile::tempdir().unwrap();

        let mut workspace = Workspace::create(Some(parent.path())).unwrap();
        let workspace_path = workspace.path().to_path_buf();
        SortedUnit::create(&mut workspace, vec![b"x\n".to_vec()], None).unwrap();
        assert!(workspace_path.exists());

        drop(workspace);

        assert!(!workspace_path.exists());
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[rstest]
    fn test_promotion_renames_unit() {
        let parent = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::create(Some(parent.path())).unwrap();

        let unit = SortedUnit::create(&mut workspace, vec![b"a\n".to_vec()], None).unwrap();
        let unit_path = unit.path().to_path_buf();

        let dest = parent.path().join("result.txt");
        workspace.promote(unit, &dest).unwrap();

        assert!(!unit_path.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"a\n");
    }

    #[rstest]
    fn test_promotion_replaces_existing_destination() {
        let parent = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::create(Some(parent.path())).unwrap();

        let dest = parent.path().join("result.txt");
        fs::write(&dest, b"stale\n").unwrap();

        let unit = SortedUnit::create(&mut workspace, vec![b"fresh\n".to_vec()], None).unwrap();
        workspace.promote(unit, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"fresh\n");
    }
}
