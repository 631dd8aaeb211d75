use crate::areas::config::Config;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::vfs::FileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Name of the git directory inside the repository
pub const GIT_DIR: &str = ".git";

/// A repository directory on a virtual filesystem
///
/// Creating a `Repository` touches nothing; `init` (or any operation that
/// initializes lazily) creates the `.git` layout.
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
    config: Config,
}

impl Repository {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = crate::vfs::normalize(path.as_ref())?;
        let git_path = path.join(GIT_DIR);

        let index = Index::new(fs.clone(), git_path.join("index"));
        let database = Database::new(fs.clone(), git_path.join("objects"));
        let workspace = Workspace::new(fs.clone(), path.clone());
        let refs = Refs::new(fs.clone(), git_path.clone());
        let config = Config::new(fs.clone(), git_path.join("config"));

        Ok(Repository {
            path,
            fs,
            index: Arc::new(Mutex::new(index)),
            database,
            workspace,
            refs,
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> PathBuf {
        self.path.join(GIT_DIR)
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Whether `.git` has been laid out
    pub fn is_initialized(&self) -> bool {
        self.fs.is_file(&self.git_path().join("HEAD"))
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
