use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::{
    BranchName, HEADS_PREFIX, REMOTES_PREFIX, SymRefName, TAGS_PREFIX,
};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::transport::advertisement::{AdvertisedRef, RefAdvertisement};
use crate::transport::capabilities::Capabilities;
use crate::transport::pack::PackFile;
use crate::transport::request::UploadPackRequest;
use crate::transport::response::UploadPackResponse;
use crate::transport::{RemoteTransport, agent};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeSet;

pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// Branch or tag to check out instead of the remote HEAD
    pub reference: Option<String>,
    pub single_branch: bool,
    pub depth: Option<usize>,
    pub remote: String,
    pub no_checkout: bool,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            reference: None,
            single_branch: false,
            depth: None,
            remote: DEFAULT_REMOTE.to_string(),
            no_checkout: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneOutcome {
    /// Checked out commit, `None` for an empty remote
    pub head: Option<ObjectId>,
    /// Local branch HEAD is attached to
    pub branch: Option<String>,
    pub object_count: usize,
    pub shallow: Vec<ObjectId>,
}

impl Repository {
    /// Fetch a remote into this (empty) repository and check out its default branch
    pub async fn clone(
        &self,
        transport: &dyn RemoteTransport,
        options: CloneOptions,
    ) -> anyhow::Result<CloneOutcome> {
        if self.refs().read_head()?.is_some() {
            anyhow::bail!(
                "destination {} already contains a repository with commits",
                self.path().display()
            );
        }
        self.init()?;

        tracing::info!(url = transport.url(), "discovering refs");
        let advertisement = transport.discover().await?;

        if advertisement.is_empty() {
            tracing::warn!(url = transport.url(), "cloned an empty repository");
            let branch = advertisement
                .head_symref()
                .map(|target| BranchName::try_parse_sym_ref_name(&SymRefName::new(target.to_string())))
                .transpose()?;
            if let Some(branch) = &branch {
                self.refs().set_head_to_branch(branch)?;
            }
            self.write_remote_config(transport.url(), &options, branch.as_ref())?;

            return Ok(CloneOutcome {
                head: None,
                branch: branch.map(|branch| branch.to_string()),
                object_count: 0,
                shallow: Vec::new(),
            });
        }

        let selected = select_ref(&advertisement, options.reference.as_deref())?;
        let branch = selected
            .name
            .starts_with(HEADS_PREFIX)
            .then(|| BranchName::try_parse_sym_ref_name(&SymRefName::new(selected.name.clone())))
            .transpose()?;

        let offered = advertisement.offered();
        if options.depth.is_some() && !offered.contains(Capabilities::SHALLOW) {
            anyhow::bail!("{} does not support shallow clones", transport.url());
        }
        let capabilities = Capabilities::for_clone(offered);

        let request = UploadPackRequest {
            wants: wanted_oids(&advertisement, selected, options.single_branch),
            depth: options.depth,
            capabilities,
            agent: agent(),
        };
        tracing::debug!(wants = request.wants.len(), depth = ?request.depth, "requesting pack");
        let body = transport.upload_pack(request.to_bytes()).await?;
        let response = UploadPackResponse::parse(body, capabilities.uses_side_band())?;

        let object_count = self.unpack(&response.pack)?;

        let shallow = response
            .shallow
            .iter()
            .filter(|oid| !response.unshallow.contains(oid))
            .cloned()
            .collect::<BTreeSet<_>>();
        if !shallow.is_empty() {
            self.refs().write_shallow(&shallow)?;
        }

        self.write_remote_refs(&advertisement, selected, branch.as_ref(), &options)?;

        let head = self.database().peel(&selected.oid)?;
        let head_type = self.database().object_type(&head)?;
        if head_type != ObjectType::Commit {
            anyhow::bail!("{} points at a {head_type}, not a commit", selected.name);
        }

        // HEAD is still unborn here so the checkout starts from an empty tree
        if !options.no_checkout {
            self.checkout_tree(&head).await?;
        }

        match &branch {
            Some(branch) => {
                self.refs().update_ref(&branch.to_ref_name(), &head)?;
                self.refs().set_head_to_branch(branch)?;
            }
            None => self.refs().set_head_detached(&head)?,
        }
        self.write_remote_config(transport.url(), &options, branch.as_ref())?;

        tracing::info!(%head, objects = object_count, "clone complete");
        Ok(CloneOutcome {
            head: Some(head),
            branch: branch.map(|branch| branch.to_string()),
            object_count,
            shallow: shallow.into_iter().collect(),
        })
    }

    /// Store every object of a packfile as a loose object
    fn unpack(&self, pack: &[u8]) -> anyhow::Result<usize> {
        let pack = PackFile::parse(pack)?;
        tracing::debug!(version = pack.version(), entries = pack.len(), "parsed packfile");

        let database = self.database();
        let objects = pack.resolve(|oid| database.load_raw(oid).ok())?;

        for packed in &objects {
            let stored = database.store_raw(packed.object.object_type(), packed.object.content())?;
            if stored != packed.oid {
                anyhow::bail!("object {} was stored as {stored}", packed.oid);
            }
        }

        Ok(objects.len())
    }

    fn write_remote_refs(
        &self,
        advertisement: &RefAdvertisement,
        selected: &AdvertisedRef,
        branch: Option<&BranchName>,
        options: &CloneOptions,
    ) -> anyhow::Result<()> {
        let refs = self.refs();
        let database = self.database();
        let remote = options.remote.as_str();

        for advertised in advertisement.branches() {
            if options.single_branch && advertised.name != selected.name {
                continue;
            }
            let name = BranchName::try_parse_sym_ref_name(&SymRefName::new(advertised.name.clone()))?;
            refs.update_ref(&name.to_remote_ref_name(remote), &advertised.oid)?;
        }

        if let Some(branch) = branch {
            refs.write_symref(
                &SymRefName::new(format!("{REMOTES_PREFIX}{remote}/HEAD")),
                &branch.to_remote_ref_name(remote),
            )?;
        }

        // tags whose objects did not come with the pack are left out
        for tag in advertisement.tags() {
            if database.exists(&tag.oid) {
                refs.update_ref(&SymRefName::try_parse(tag.name.clone())?, &tag.oid)?;
            }
        }

        Ok(())
    }

    fn write_remote_config(
        &self,
        url: &str,
        options: &CloneOptions,
        branch: Option<&BranchName>,
    ) -> anyhow::Result<()> {
        let remote = options.remote.as_str();
        let mut config = self.config().load()?;

        config.set("remote", Some(remote), "url", url);
        let fetch = match branch {
            Some(branch) if options.single_branch => {
                format!("+{HEADS_PREFIX}{branch}:{REMOTES_PREFIX}{remote}/{branch}")
            }
            _ => format!("+{HEADS_PREFIX}*:{REMOTES_PREFIX}{remote}/*"),
        };
        config.set("remote", Some(remote), "fetch", &fetch);

        if let Some(branch) = branch {
            let name = branch.to_string();
            config.set("branch", Some(&name), "remote", remote);
            config.set("branch", Some(&name), "merge", branch.to_ref_name().as_ref());
        }

        self.config().save(&config)
    }
}

/// Ref to check out: the requested branch or tag, else whatever the remote HEAD names
fn select_ref<'a>(
    advertisement: &'a RefAdvertisement,
    requested: Option<&str>,
) -> anyhow::Result<&'a AdvertisedRef> {
    if let Some(name) = requested {
        return [
            format!("{HEADS_PREFIX}{name}"),
            format!("{TAGS_PREFIX}{name}"),
            name.to_string(),
        ]
        .iter()
        .find_map(|candidate| advertisement.find(candidate))
        .with_context(|| format!("Remote branch {name} not found in upstream"));
    }

    if let Some(target) = advertisement.head_symref()
        && let Some(reference) = advertisement.find(target)
    {
        return Ok(reference);
    }

    // without a symref, the branch sharing HEAD's commit stands in for it
    if let Some(head) = advertisement.head()
        && let Some(branch) = advertisement.branches().find(|branch| branch.oid == head.oid)
    {
        return Ok(branch);
    }

    advertisement
        .branches()
        .next()
        .or_else(|| advertisement.head())
        .context("remote advertised no branches")
}

fn wanted_oids(
    advertisement: &RefAdvertisement,
    selected: &AdvertisedRef,
    single_branch: bool,
) -> Vec<ObjectId> {
    let mut wants = vec![selected.oid.clone()];
    if single_branch {
        return wants;
    }

    for reference in advertisement.branches().chain(advertisement.tags()) {
        if !wants.contains(&reference.oid) {
            wants.push(reference.oid.clone());
        }
    }
    wants
}
