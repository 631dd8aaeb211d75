use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::log::log_entry::LogEntry;
use crate::artifacts::log::rev_list::RevList;

/// Error for a history walk on a repository without commits
pub const NOTHING_COMMITTED: &str = "Nothing Committed in Repo Yet";

impl Repository {
    /// History reachable from `reference` (HEAD by default), newest first
    pub fn log(&self, reference: Option<&str>, depth: Option<usize>) -> anyhow::Result<Vec<LogEntry>> {
        let start = match reference {
            Some(reference) => Revision::try_parse(reference)?.resolve(self)?,
            None => match self.refs().read_head()? {
                Some(_) => Revision::head().resolve(self)?,
                None => anyhow::bail!(NOTHING_COMMITTED),
            },
        };

        RevList::new(self, &start, depth)?.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::commit::Author;
    use crate::commands::porcelain::commit::CommitOptions;
    use crate::vfs::{FileSystem, MemoryFs};
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn options(time: i64) -> CommitOptions {
        let when = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .timestamp_opt(time, 0)
            .unwrap();
        CommitOptions {
            author: Some(Author::new_with_timestamp(
                "Moon Walker".to_string(),
                "mw@example.com".to_string(),
                when,
            )),
            committer: None,
        }
    }

    async fn repository_with_history(messages: &[&str]) -> Repository {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        let repository = Repository::new(fs, "/moonwalk").unwrap();

        for (n, message) in messages.iter().enumerate() {
            repository
                .write_file(Path::new("README.md"), &format!("version {n}\n"))
                .unwrap();
            repository.add(&[PathBuf::from("README.md")]).await.unwrap();
            repository
                .commit(message, options(1_700_000_000 + n as i64 * 60))
                .await
                .unwrap();
        }

        repository
    }

    #[tokio::test]
    async fn an_empty_repository_has_nothing_to_log() {
        let repository = repository_with_history(&[]).await;
        repository.init().unwrap();

        let error = repository.log(None, None).unwrap_err();
        assert_eq!(error.to_string(), NOTHING_COMMITTED);
    }

    #[tokio::test]
    async fn history_is_listed_newest_first() {
        let repository = repository_with_history(&["one", "two", "three"]).await;

        let entries = repository.log(None, None).unwrap();
        let messages = entries.iter().map(LogEntry::short_message).collect::<Vec<_>>();
        assert_eq!(messages, vec!["three", "two", "one"]);
        assert_eq!(entries[0].commit.parent, vec![entries[1].oid.clone()]);
        assert!(entries[2].commit.parent.is_empty());
    }

    #[rstest]
    #[case(Some(1), 1)]
    #[case(Some(2), 2)]
    #[case(Some(10), 3)]
    #[case(None, 3)]
    #[tokio::test]
    async fn depth_limits_the_walk(#[case] depth: Option<usize>, #[case] expected: usize) {
        let repository = repository_with_history(&["one", "two", "three"]).await;

        assert_eq!(repository.log(None, depth).unwrap().len(), expected);
    }

    #[tokio::test]
    async fn log_starts_from_any_revision() {
        let repository = repository_with_history(&["one", "two"]).await;
        let first = repository.log(None, None).unwrap()[1].oid.clone();

        for name in ["master", "refs/heads/master", "@", "HEAD"] {
            assert_eq!(repository.log(Some(name), None).unwrap().len(), 2, "{name}");
        }
        let from_abbrev = repository.log(Some(&first.to_short_oid()), None).unwrap();
        assert_eq!(from_abbrev.len(), 1);
        assert_eq!(from_abbrev[0].oid, first);

        assert!(repository.log(Some("nope"), None).is_err());
    }

    #[tokio::test]
    async fn entries_serialize_like_the_browser_client() {
        let repository = repository_with_history(&["one"]).await;

        let entries = repository.log(None, None).unwrap();
        let json = serde_json::to_value(&entries[0]).unwrap();

        assert_eq!(json["message"], "one\n");
        assert_eq!(json["author"]["timestamp"], 1_700_000_000);
        assert_eq!(json["author"]["timezoneOffset"], 300);
        assert_eq!(json["committer"]["name"], "Moon Walker");
        assert!(json.get("gpgsig").is_none());
        assert_eq!(json["oid"], entries[0].oid.as_ref());
        assert!(json.get("commit").is_none());
    }
}
