//! ops::tree_paths
//!
//! Every blob path under a tree, depth first, in tree order.

use crate::engine::{Callback, Task, TaskError};
use crate::git::Tree;
use crate::lock::ResourceSet;

/// Collect the `/`-joined paths of all blobs reachable from a tree.
///
/// Submodule entries are not blobs and are not reported.
pub struct GetTreePaths {
    tree: Tree,
    resources: ResourceSet,
    callback: Callback<Vec<String>>,
}

impl GetTreePaths {
    const NAME: &'static str = "Tree.getPaths";

    pub fn new(tree: &Tree, callback: Callback<Vec<String>>) -> Self {
        Self {
            tree: tree.clone(),
            resources: ResourceSet::new().with(tree),
            callback,
        }
    }
}

fn walk(
    repo: &git2::Repository,
    tree: &git2::Tree<'_>,
    prefix: &str,
    out: &mut Vec<String>,
) -> Result<(), TaskError> {
    for entry in tree.iter() {
        let name = String::from_utf8_lossy(entry.name_bytes());
        let path = if prefix.is_empty() {
            name.into_owned()
        } else {
            format!("{}/{}", prefix, name)
        };

        match entry.kind() {
            Some(git2::ObjectType::Blob) => out.push(path),
            Some(git2::ObjectType::Tree) => {
                let child = repo.find_tree(entry.id()).map_err(|e| {
                    TaskError::inconsistent(
                        GetTreePaths::NAME,
                        format!("subtree {} ({}) is unreadable: {}", path, entry.id(), e.message()),
                    )
                })?;
                walk(repo, &child, &path, out)?;
            }
            _ => {}
        }
    }
    Ok(())
}

impl Task for GetTreePaths {
    type Output = Vec<String>;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<Self::Output, TaskError> {
        let root_id = self.tree.raw_id();
        self.tree.repository().with_raw(|repo| {
            let root = repo
                .find_tree(root_id)
                .map_err(|e| TaskError::engine(Self::NAME, e))?;
            let mut out = Vec::new();
            walk(repo, &root, "", &mut out)?;
            Ok(out)
        })
    }

    fn on_success(self, output: Self::Output) {
        (self.callback)(Ok(output))
    }

    fn on_failure(self, error: TaskError) {
        (self.callback)(Err(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{run_op, TestRepo};

    #[test]
    fn collects_nested_blob_paths() {
        let fixture = TestRepo::new();
        fixture.write("README.md", "readme\n");
        fixture.write("src/lib.rs", "lib\n");
        fixture.write("src/engine/mod.rs", "mod\n");
        fixture.write("tests/it.rs", "it\n");
        fixture.git(&["add", "."]);
        fixture.git(&["commit", "-q", "-m", "tree"]);
        let repo = fixture.open();
        let tree = repo.find_tree("HEAD").unwrap();

        let paths = run_op(|cb| GetTreePaths::new(&tree, cb)).unwrap();

        assert_eq!(
            paths,
            vec!["README.md", "src/engine/mod.rs", "src/lib.rs", "tests/it.rs"]
        );
    }

    #[test]
    fn subtree_can_be_walked_directly() {
        let fixture = TestRepo::new();
        fixture.write("src/a.rs", "a\n");
        fixture.write("src/b/c.rs", "c\n");
        fixture.git(&["add", "."]);
        fixture.git(&["commit", "-q", "-m", "tree"]);
        let repo = fixture.open();
        let tree = repo.find_tree("HEAD:src").unwrap();

        let paths = run_op(|cb| GetTreePaths::new(&tree, cb)).unwrap();
        assert_eq!(paths, vec!["a.rs", "b/c.rs"]);
    }

    #[test]
    fn missing_subtree_is_inconsistent() {
        let fixture = TestRepo::new();
        fixture.write("keep.txt", "keep\n");
        fixture.write("gone/file.txt", "gone\n");
        fixture.git(&["add", "."]);
        fixture.git(&["commit", "-q", "-m", "tree"]);
        let subtree = fixture.git(&["rev-parse", "HEAD:gone"]);
        let repo = fixture.open();
        let tree = repo.find_tree("HEAD").unwrap();

        let object = fixture
            .path()
            .join(".git/objects")
            .join(&subtree[..2])
            .join(&subtree[2..]);
        std::fs::remove_file(object).unwrap();

        let err = run_op(|cb| GetTreePaths::new(&tree, cb)).unwrap_err();
        assert!(matches!(err, TaskError::Inconsistent { function: "Tree.getPaths", .. }));
    }
}
