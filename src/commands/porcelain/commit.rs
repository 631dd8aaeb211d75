use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;

/// Identities for a new commit; unset ones are looked up
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub author: Option<Author>,
    pub committer: Option<Author>,
}

impl Repository {
    /// Record the index as a new commit on top of HEAD
    pub async fn commit(&self, message: &str, options: CommitOptions) -> anyhow::Result<ObjectId> {
        self.ensure_initialized()?;

        let author = match options.author {
            Some(author) => author,
            None => self.default_author()?,
        };
        let committer = options.committer.unwrap_or_else(|| author.clone());

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let tree_id = self.store_index_trees(&index)?;
        let parents = self.refs().read_head()?.into_iter().collect::<Vec<_>>();

        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }

        let commit = Commit::new(parents, tree_id, author, committer, message);
        let commit_id = self.database().store(&commit)?;
        self.refs().update_head(&commit_id)?;

        tracing::info!(oid = %commit_id, message = commit.short_message(), "committed");
        Ok(commit_id)
    }

    /// `GIT_AUTHOR_*` from the environment, else `user.name`/`user.email` from config
    fn default_author(&self) -> anyhow::Result<Author> {
        if let Some(author) = Author::load_from_env() {
            return Ok(author);
        }

        match self.configured_author()? {
            Some(author) => Ok(author),
            None => anyhow::bail!(
                "Author identity unknown: set GIT_AUTHOR_NAME and GIT_AUTHOR_EMAIL, or user.name and user.email in .git/config"
            ),
        }
    }

    fn configured_author(&self) -> anyhow::Result<Option<Author>> {
        let config = self.config().load()?;
        let name = config.get("user", None, "name");
        let email = config.get("user", None, "email");

        Ok(name
            .zip(email)
            .map(|(name, email)| Author::new(name.to_string(), email.to_string())))
    }
}
