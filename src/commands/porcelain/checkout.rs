use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::inspector::{HeadTree, Inspector};
use serde::Serialize;

/// Where HEAD ended up after a checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOutcome {
    pub oid: ObjectId,
    /// `None` for a detached HEAD
    pub branch: Option<String>,
}

impl Repository {
    /// Switch the working tree, the index and HEAD to a branch or commit
    ///
    /// Local branch names attach HEAD; anything else detaches it.
    pub async fn checkout(&self, target: &str) -> anyhow::Result<CheckoutOutcome> {
        let revision = Revision::try_parse(target)?;
        let oid = revision.resolve(self)?;

        self.checkout_tree(&oid).await?;

        let branch = self
            .refs()
            .expand_ref(target)?
            .filter(|name| name.is_branch())
            .map(|name| BranchName::try_parse_sym_ref_name(&name))
            .transpose()?;

        match &branch {
            Some(branch) => self.refs().set_head_to_branch(branch)?,
            None => self.refs().set_head_detached(&oid)?,
        }
        tracing::info!(%oid, branch = ?branch.as_ref().map(|b| b.to_string()), "checked out");

        Ok(CheckoutOutcome {
            oid,
            branch: branch.map(|branch| branch.to_string()),
        })
    }

    /// Bring the working tree and index from HEAD's tree to the tree of `oid`
    ///
    /// HEAD itself is not moved.
    pub(crate) async fn checkout_tree(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let database = self.database();
        let current = Inspector::new(self).load_head_tree()?;
        let target: HeadTree = database.flatten_tree(&database.tree_oid_of(oid)?)?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut migration = Migration::new(self, &mut index, current, target);
        migration.apply_changes()?;
        tracing::debug!(changes = migration.actions().len(), "migrated working tree");

        index.write_updates()
    }
}
