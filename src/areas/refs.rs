//! Git references (HEAD, branches, remote-tracking refs, tags)
//!
//! References are human-readable names pointing to objects. They can be:
//! - Direct: containing a 40-character object id
//! - Symbolic: `ref: <name>` pointing to another reference (HEAD -> refs/heads/main)
//!
//! The shallow list (`.git/shallow`) lives here too: it records the commits whose
//! parents were cut off by a depth-limited clone.

use crate::artifacts::branch::REF_ALIASES;
use crate::artifacts::branch::branch_name::{
    BranchName, HEADS_PREFIX, REMOTES_PREFIX, SymRefName, TAGS_PREFIX,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::vfs::{FileSystem, FsError};
use anyhow::Context;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

/// Longest chain of symbolic refs followed before giving up
const MAX_SYMREF_DEPTH: usize = 5;

#[derive(Debug)]
pub struct Refs {
    fs: Arc<dyn FileSystem>,
    /// Path to the git directory
    path: PathBuf,
}

/// Content of a ref file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymRefOrOid {
    SymRef { sym_ref_name: SymRefName },
    Oid(ObjectId),
}

impl Refs {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Refs { fs, path }
    }

    fn ref_path(&self, name: &SymRefName) -> PathBuf {
        self.path.join(name.as_ref_path())
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join(HEAD_REF_NAME)
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn shallow_path(&self) -> PathBuf {
        self.path.join("shallow")
    }

    /// Raw content of a ref, `None` when the ref does not exist
    pub fn read_raw(&self, name: &SymRefName) -> anyhow::Result<Option<SymRefOrOid>> {
        let path = self.ref_path(name);
        let content = match self.fs.read_file(&path) {
            Ok(content) => content,
            // a directory of refs is not a ref itself
            Err(err)
                if err.is_not_found()
                    || matches!(err, FsError::IsADirectory(_) | FsError::NotADirectory(_)) =>
            {
                return Ok(None);
            }
            Err(err) => {
                return Err(err).context(format!("failed to read ref file at {}", path.display()));
            }
        };
        let content = String::from_utf8_lossy(&content);
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            Ok(Some(SymRefOrOid::SymRef {
                sym_ref_name: SymRefName::new(symref_match[1].to_string()),
            }))
        } else {
            Ok(Some(SymRefOrOid::Oid(ObjectId::try_parse(
                content.to_string(),
            )?)))
        }
    }

    /// Last ref of the symbolic chain starting at `source` (HEAD by default)
    ///
    /// For `HEAD -> refs/heads/main` this is `refs/heads/main`, whether or not the
    /// branch has been born yet. A detached HEAD yields `HEAD` itself.
    pub fn current_ref(&self, source: Option<SymRefName>) -> anyhow::Result<SymRefName> {
        let mut current = source.unwrap_or_else(SymRefName::head);

        for _ in 0..MAX_SYMREF_DEPTH {
            match self.read_raw(&current)? {
                Some(SymRefOrOid::SymRef { sym_ref_name }) => current = sym_ref_name,
                Some(SymRefOrOid::Oid(_)) | None => return Ok(current),
            }
        }

        anyhow::bail!("too many levels of symbolic refs at {current}")
    }

    /// Follow `name` to an object id
    pub fn read_oid(&self, name: &SymRefName) -> anyhow::Result<Option<ObjectId>> {
        let target = self.current_ref(Some(name.clone()))?;
        match self.read_raw(&target)? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            _ => Ok(None),
        }
    }

    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        self.read_oid(&SymRefName::head())
    }

    /// Branch HEAD points at, `None` when detached
    pub fn current_branch(&self) -> anyhow::Result<Option<BranchName>> {
        let current = self.current_ref(None)?;
        if current.is_branch() {
            Ok(Some(BranchName::try_parse_sym_ref_name(&current)?))
        } else {
            Ok(None)
        }
    }

    /// Point the ref at the end of HEAD's chain to `oid`
    ///
    /// On an unborn branch this creates the branch file.
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let target = self.current_ref(None)?;
        self.update_ref(&target, oid)
    }

    pub fn set_head_to_branch(&self, branch: &BranchName) -> anyhow::Result<()> {
        self.write_symref(&SymRefName::head(), &branch.to_ref_name())
    }

    pub fn set_head_detached(&self, oid: &ObjectId) -> anyhow::Result<()> {
        self.update_ref_file(&self.head_path(), format!("{oid}\n"))
    }

    pub fn update_ref(&self, name: &SymRefName, oid: &ObjectId) -> anyhow::Result<()> {
        tracing::debug!(%name, %oid, "updating ref");
        self.update_ref_file(&self.ref_path(name), format!("{oid}\n"))
    }

    pub fn write_symref(&self, name: &SymRefName, target: &SymRefName) -> anyhow::Result<()> {
        self.update_ref_file(&self.ref_path(name), format!("ref: {target}\n"))
    }

    fn update_ref_file(&self, path: &Path, raw_ref: String) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .with_context(|| format!("invalid ref file path {}", path.display()))?;
        self.fs
            .mkdir_all(parent)
            .with_context(|| format!("failed to create parent directories for {}", path.display()))?;

        self.fs
            .write_file(path, raw_ref.as_bytes())
            .with_context(|| format!("failed to write ref file at {}", path.display()))
    }

    /// Full ref name matching a short name
    ///
    /// Candidates are tried the way git does: the name itself, then under `refs/`,
    /// `refs/tags/`, `refs/heads/`, `refs/remotes/`, and finally a remote's `HEAD`.
    pub fn expand_ref(&self, name: &str) -> anyhow::Result<Option<SymRefName>> {
        let name = REF_ALIASES.get(name).copied().unwrap_or(name);

        let candidates = [
            name.to_string(),
            format!("refs/{name}"),
            format!("{TAGS_PREFIX}{name}"),
            format!("{HEADS_PREFIX}{name}"),
            format!("{REMOTES_PREFIX}{name}"),
            format!("{REMOTES_PREFIX}{name}/{HEAD_REF_NAME}"),
        ];

        for candidate in candidates {
            let candidate = SymRefName::new(candidate);
            let is_ref_name =
                candidate.is_head() || candidate.as_ref_path().starts_with("refs/");
            if is_ref_name && self.read_raw(&candidate)?.is_some() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    /// Object id of a ref given by its short or full name
    pub fn resolve(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        match self.expand_ref(name)? {
            Some(full_name) => self.read_oid(&full_name),
            None => Ok(None),
        }
    }

    /// Every ref file below `refs/<prefix>`, sorted
    pub fn list_refs(&self, prefix: &str) -> anyhow::Result<Vec<SymRefName>> {
        let root = self.path.join(prefix.trim_end_matches('/'));
        if !self.fs.is_dir(&root) {
            return Ok(Vec::new());
        }

        let mut refs = self
            .fs
            .walk_files(&root)?
            .into_iter()
            .filter_map(|path| {
                let relative_path = path.strip_prefix(&self.path).ok()?;
                Some(SymRefName::new(relative_path.to_string_lossy().to_string()))
            })
            .collect::<Vec<_>>();
        refs.sort();

        Ok(refs)
    }

    pub fn list_branches(&self) -> anyhow::Result<Vec<SymRefName>> {
        self.list_refs(HEADS_PREFIX)
    }

    pub fn list_tags(&self) -> anyhow::Result<Vec<SymRefName>> {
        self.list_refs(TAGS_PREFIX)
    }

    pub fn list_remote_branches(&self, remote: &str) -> anyhow::Result<Vec<SymRefName>> {
        self.list_refs(&format!("{REMOTES_PREFIX}{remote}/"))
    }

    /// Commits whose parents are missing on purpose
    pub fn read_shallow(&self) -> anyhow::Result<BTreeSet<ObjectId>> {
        let content = match self.fs.read_file(&self.shallow_path()) {
            Ok(content) => content,
            Err(err) if err.is_not_found() => return Ok(BTreeSet::new()),
            Err(err) => return Err(err).context("failed to read the shallow file"),
        };

        String::from_utf8_lossy(&content)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| ObjectId::try_parse(line.to_string()))
            .collect()
    }

    /// Replace the shallow list; an empty list removes the file
    pub fn write_shallow(&self, oids: &BTreeSet<ObjectId>) -> anyhow::Result<()> {
        let path = self.shallow_path();
        if oids.is_empty() {
            if self.fs.exists(&path) {
                self.fs.unlink(&path)?;
            }
            return Ok(());
        }

        let content = oids
            .iter()
            .map(|oid| format!("{oid}\n"))
            .collect::<String>();
        self.fs
            .write_file(&path, content.as_bytes())
            .context("failed to write the shallow file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    const OID_A: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";
    const OID_B: &str = "ce013625030ba8dba906f756967f9e9ca394464a";

    fn oid(hex: &str) -> ObjectId {
        ObjectId::try_parse(hex.to_string()).unwrap()
    }

    fn branch(name: &str) -> BranchName {
        BranchName::try_parse(name.to_string()).unwrap()
    }

    #[fixture]
    fn refs() -> Refs {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        fs.mkdir_all(Path::new("/repo/.git/refs/heads")).unwrap();
        let refs = Refs::new(fs, PathBuf::from("/repo/.git"));
        refs.set_head_to_branch(&branch("master")).unwrap();
        refs
    }

    #[rstest]
    fn an_unborn_branch_has_no_head_commit(refs: Refs) {
        assert_eq!(refs.read_head().unwrap(), None);
        assert_eq!(
            refs.current_ref(None).unwrap().as_ref(),
            "refs/heads/master"
        );
        assert_eq!(refs.current_branch().unwrap(), Some(branch("master")));
    }

    #[rstest]
    fn updating_head_creates_the_branch_it_points_to(refs: Refs) {
        refs.update_head(&oid(OID_A)).unwrap();

        assert_eq!(refs.read_head().unwrap(), Some(oid(OID_A)));
        assert_eq!(refs.resolve("master").unwrap(), Some(oid(OID_A)));
        assert_eq!(
            refs.read_raw(&SymRefName::head()).unwrap(),
            Some(SymRefOrOid::SymRef {
                sym_ref_name: SymRefName::new("refs/heads/master".to_string())
            })
        );
    }

    #[rstest]
    fn a_detached_head_is_updated_in_place(refs: Refs) {
        refs.set_head_detached(&oid(OID_A)).unwrap();
        refs.update_head(&oid(OID_B)).unwrap();

        assert_eq!(refs.read_head().unwrap(), Some(oid(OID_B)));
        assert_eq!(refs.current_branch().unwrap(), None);
        assert_eq!(refs.resolve("master").unwrap(), None);
    }

    #[rstest]
    fn short_names_resolve_like_git(refs: Refs) {
        let origin_main = branch("main").to_remote_ref_name("origin");
        refs.update_ref(&origin_main, &oid(OID_A)).unwrap();
        refs.write_symref(
            &SymRefName::new("refs/remotes/origin/HEAD".to_string()),
            &origin_main,
        )
        .unwrap();
        refs.update_ref(&SymRefName::new("refs/tags/v1".to_string()), &oid(OID_B))
            .unwrap();
        refs.update_head(&oid(OID_B)).unwrap();

        assert_eq!(refs.resolve("origin/main").unwrap(), Some(oid(OID_A)));
        assert_eq!(refs.resolve("origin").unwrap(), Some(oid(OID_A)));
        assert_eq!(refs.resolve("v1").unwrap(), Some(oid(OID_B)));
        assert_eq!(refs.resolve("@").unwrap(), Some(oid(OID_B)));
        assert_eq!(refs.resolve("refs/heads/master").unwrap(), Some(oid(OID_B)));
        assert_eq!(refs.resolve("nope").unwrap(), None);
    }

    #[rstest]
    fn refs_are_listed_by_namespace(refs: Refs) {
        refs.update_ref(&branch("topic/b").to_ref_name(), &oid(OID_A))
            .unwrap();
        refs.update_ref(&branch("a").to_ref_name(), &oid(OID_A))
            .unwrap();
        refs.update_ref(&branch("a").to_remote_ref_name("origin"), &oid(OID_A))
            .unwrap();

        let branches = refs.list_branches().unwrap();
        assert_eq!(
            branches.iter().map(|b| b.as_ref()).collect::<Vec<_>>(),
            vec!["refs/heads/a", "refs/heads/topic/b"]
        );
        assert_eq!(refs.list_remote_branches("origin").unwrap().len(), 1);
        assert!(refs.list_tags().unwrap().is_empty());
    }

    #[rstest]
    fn the_shallow_list_round_trips_and_empties_away(refs: Refs) {
        assert!(refs.read_shallow().unwrap().is_empty());

        let shallow = BTreeSet::from([oid(OID_A), oid(OID_B)]);
        refs.write_shallow(&shallow).unwrap();
        assert_eq!(refs.read_shallow().unwrap(), shallow);

        refs.write_shallow(&BTreeSet::new()).unwrap();
        assert!(!refs.fs.exists(&refs.shallow_path()));
    }

    #[rstest]
    fn symref_loops_are_errors(refs: Refs) {
        let a = SymRefName::new("refs/heads/a".to_string());
        let b = SymRefName::new("refs/heads/b".to_string());
        refs.write_symref(&a, &b).unwrap();
        refs.write_symref(&b, &a).unwrap();

        assert!(refs.read_oid(&a).is_err());
    }
}
