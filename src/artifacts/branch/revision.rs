use crate::areas::repository::Repository;
use crate::artifacts::branch::REF_ALIASES;
use crate::artifacts::objects::OBJECT_ID_LENGTH;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;

/// Shortest abbreviation accepted for an object id
const MIN_ABBREV_LENGTH: usize = 4;

/// A name that identifies a commit
///
/// Accepted forms:
/// - `HEAD` and its alias `@`
/// - branch, tag and remote-tracking names, short (`main`, `origin/main`) or full
///   (`refs/heads/main`)
/// - full or abbreviated object ids
///
/// Ref names win over object ids when both match, the same way git resolves them.
/// Annotated tags are peeled to the commit they point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(String);

impl Revision {
    pub fn try_parse(revision: &str) -> anyhow::Result<Self> {
        let revision = revision.trim();
        if revision.is_empty() || revision.contains(char::is_whitespace) {
            anyhow::bail!("invalid revision '{revision}'");
        }

        let resolved = REF_ALIASES.get(revision).copied().unwrap_or(revision);
        Ok(Revision(resolved.to_string()))
    }

    pub fn head() -> Self {
        Revision("HEAD".to_string())
    }

    pub fn resolve(&self, repository: &Repository) -> anyhow::Result<ObjectId> {
        if let Some(oid) = repository.refs().resolve(&self.0)? {
            let oid = repository.database().peel(&oid)?;
            Self::ensure_commit(&oid, repository)?;
            return Ok(oid);
        }

        if Self::looks_like_oid(&self.0) {
            return Self::resolve_oid(&self.0, repository);
        }

        anyhow::bail!("unknown revision '{}'", self.0)
    }

    fn resolve_oid(prefix: &str, repository: &Repository) -> anyhow::Result<ObjectId> {
        if prefix.len() == OBJECT_ID_LENGTH {
            let oid = ObjectId::try_parse(prefix.to_string())?;
            let oid = repository
                .database()
                .peel(&oid)
                .with_context(|| format!("unknown revision '{prefix}'"))?;
            Self::ensure_commit(&oid, repository)?;
            return Ok(oid);
        }

        let commits = repository
            .database()
            .find_objects_by_prefix(prefix)?
            .into_iter()
            .filter(|oid| {
                matches!(
                    repository.database().object_type(oid),
                    Ok(ObjectType::Commit)
                )
            })
            .collect::<Vec<_>>();

        match commits.as_slice() {
            [] => anyhow::bail!("unknown revision '{prefix}'"),
            [oid] => Ok(oid.clone()),
            candidates => {
                let mut message = format!("short object id {prefix} is ambiguous");
                for oid in candidates {
                    message.push_str(&format!("\nhint:   {} commit", oid.to_short_oid()));
                }
                anyhow::bail!(message)
            }
        }
    }

    fn ensure_commit(oid: &ObjectId, repository: &Repository) -> anyhow::Result<()> {
        let object_type = repository
            .database()
            .object_type(oid)
            .with_context(|| format!("object {oid} not found"))?;

        if object_type != ObjectType::Commit {
            anyhow::bail!(
                "object {} is a {}, not a commit",
                oid.to_short_oid(),
                object_type
            );
        }

        Ok(())
    }

    fn looks_like_oid(s: &str) -> bool {
        (MIN_ABBREV_LENGTH..=OBJECT_ID_LENGTH).contains(&s.len())
            && s.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
