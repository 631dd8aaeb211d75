use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use anyhow::Context;

pub const DEFAULT_BRANCH: &str = "master";

const CORE_CONFIG: [(&str, &str); 6] = [
    ("repositoryformatversion", "0"),
    ("filemode", "false"),
    ("bare", "false"),
    ("logallrefupdates", "true"),
    ("symlinks", "false"),
    ("ignorecase", "true"),
];

impl Repository {
    /// Lay out `.git`, returning whether the repository was created
    ///
    /// An existing repository is left as it is.
    pub fn init(&self) -> anyhow::Result<bool> {
        if self.is_initialized() {
            return Ok(false);
        }

        for dir in [
            self.database().objects_path().to_path_buf(),
            self.refs().refs_path().join("heads"),
            self.refs().refs_path().join("tags"),
        ] {
            self.fs()
                .mkdir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let mut config = self.config().load()?;
        for (key, value) in CORE_CONFIG {
            config.set("core", None, key, value);
        }
        self.config()
            .save(&config)
            .context("Failed to write .git/config")?;

        let default_branch = BranchName::try_parse(DEFAULT_BRANCH.to_string())?;
        self.refs()
            .set_head_to_branch(&default_branch)
            .context("Failed to create initial HEAD reference")?;

        tracing::info!(path = %self.path().display(), "initialized empty repository");
        Ok(true)
    }

    /// Initialize on first write, as add and commit do
    pub(crate) fn ensure_initialized(&self) -> anyhow::Result<()> {
        self.init().map(|_| ())
    }
}
