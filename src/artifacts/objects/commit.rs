//! Git commit object
//!
//! Commits represent snapshots of the repository at specific points in time.
//! They contain:
//! - A tree object ID (directory snapshot)
//! - Parent commit ID(s) (for history)
//! - Author and committer information
//! - Optional extra headers (`gpgsig`, `mergetag`, `encoding`, ...)
//! - Commit message
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//! gpgsig -----BEGIN PGP SIGNATURE-----
//!  <continuation lines start with a space>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::object::{Object, Packable, Unpackable, with_header};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone};
use std::io::BufRead;

/// Author or committer information
///
/// Contains name, email, and timestamp with timezone information.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Author {
    /// Create a new author with the current local timestamp
    pub fn new(name: String, email: String) -> Self {
        Author {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(name: String, email: String, timestamp: DateTime<FixedOffset>) -> Self {
        Author {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// "Name <email@example.com>"
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// "Name <email> timestamp timezone", as stored in commit objects
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Load author information from environment variables
    ///
    /// Reads GIT_AUTHOR_NAME, GIT_AUTHOR_EMAIL, and optionally GIT_AUTHOR_DATE
    /// (RFC 2822, `%Y-%m-%d %H:%M:%S %z` or git's internal `<seconds> <±HHMM>`).
    /// Returns `None` when name or email is missing.
    pub fn load_from_env() -> Option<Self> {
        let name = std::env::var("GIT_AUTHOR_NAME").ok()?;
        let email = std::env::var("GIT_AUTHOR_EMAIL").ok()?;
        let timestamp = std::env::var("GIT_AUTHOR_DATE")
            .ok()
            .and_then(|date| parse_date(&date));

        match timestamp {
            Some(ts) => Some(Author::new_with_timestamp(name, email, ts)),
            None => Some(Author::new(name, email)),
        }
    }

    /// "Mon Jan 1 12:34:56 2024 +0000"
    pub fn readable_timestamp(&self) -> String {
        self.timestamp
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string()
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }
}

fn parse_date(date: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S %z"))
        .ok()
        .or_else(|| {
            let (seconds, timezone) = date.split_once(' ')?;
            at_offset(seconds.parse().ok()?, timezone)
        })
}

/// Build a timestamp from unix seconds and a `±HHMM` offset
fn at_offset(seconds: i64, timezone: &str) -> Option<DateTime<FixedOffset>> {
    let (sign, digits) = match timezone.as_bytes().first()? {
        b'-' => (-1, &timezone[1..]),
        b'+' => (1, &timezone[1..]),
        _ => (1, timezone),
    };
    if digits.len() != 4 || !digits.bytes().all(|digit| digit.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;

    let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?;
    offset.timestamp_opt(seconds, 0).single()
}

impl TryFrom<&str> for Author {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // "name <email> timestamp timezone", split from the right
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(anyhow::anyhow!("Invalid author format"));
        }

        let timezone = parts[0];
        let timestamp = parts[1]
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("Invalid timestamp"))?;
        let name_email_part = parts[2];

        let email_start = name_email_part
            .find('<')
            .ok_or_else(|| anyhow::anyhow!("Invalid author format: missing '<'"))?;
        let email_end = name_email_part
            .rfind('>')
            .ok_or_else(|| anyhow::anyhow!("Invalid author format: missing '>'"))?;
        if email_end < email_start {
            anyhow::bail!("Invalid author format: '>' before '<'");
        }

        let name = name_email_part[..email_start].trim().to_string();
        let email = name_email_part[email_start + 1..email_end].to_string();

        let timestamp =
            at_offset(timestamp, timezone).ok_or_else(|| anyhow::anyhow!("Invalid timezone"))?;

        Ok(Author {
            name,
            email,
            timestamp,
        })
    }
}

/// Git commit object
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Commit {
    /// Empty for a root commit, several for merges
    parents: Vec<ObjectId>,
    tree_oid: ObjectId,
    author: Author,
    committer: Author,
    /// Headers after `committer`, values keep their embedded newlines
    extra_headers: Vec<(String, String)>,
    /// Verbatim message, trailing newline included
    message: String,
}

impl Commit {
    pub fn new(
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        author: Author,
        committer: Author,
        message: String,
    ) -> Self {
        Commit {
            parents,
            tree_oid,
            author,
            committer,
            extra_headers: Vec::new(),
            message,
        }
    }

    /// First line of the message (`git log --oneline`)
    pub fn short_message(&self) -> String {
        self.message.lines().next().unwrap_or("").to_string()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    pub fn parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn committer(&self) -> &Author {
        &self.committer
    }

    pub fn extra_headers(&self) -> &[(String, String)] {
        &self.extra_headers
    }

    /// Committer time, which orders history walks
    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.committer.timestamp()
    }

    fn content(&self) -> String {
        let mut lines = vec![format!("tree {}", self.tree_oid)];
        for parent in &self.parents {
            lines.push(format!("parent {parent}"));
        }
        lines.push(format!("author {}", self.author.display()));
        lines.push(format!("committer {}", self.committer.display()));
        for (key, value) in &self.extra_headers {
            lines.push(format!("{key} {}", value.replace('\n', "\n ")));
        }
        lines.push(String::new());
        lines.push(self.message.to_string());

        lines.join("\n")
    }
}

impl Packable for Commit {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(with_header(self.object_type(), self.content().as_bytes()))
    }
}

impl Unpackable for Commit {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;

        let (headers, message) = content
            .split_once("\n\n")
            .unwrap_or((content.trim_end_matches('\n'), ""));

        let mut tree_oid = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut extra_headers: Vec<(String, String)> = Vec::new();

        for line in headers.lines() {
            if let Some(continuation) = line.strip_prefix(' ') {
                let (_, value) = extra_headers
                    .last_mut()
                    .context("Invalid commit object: continuation without a header")?;
                value.push('\n');
                value.push_str(continuation);
                continue;
            }

            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            match key {
                "tree" => tree_oid = Some(ObjectId::try_parse(value.to_string())?),
                "parent" => parents.push(ObjectId::try_parse(value.to_string())?),
                "author" => author = Some(Author::try_from(value)?),
                "committer" => committer = Some(Author::try_from(value)?),
                _ => extra_headers.push((key.to_string(), value.to_string())),
            }
        }

        let author = author.context("Invalid commit object: missing author line")?;
        Ok(Commit {
            parents,
            tree_oid: tree_oid.context("Invalid commit object: missing tree line")?,
            committer: committer.unwrap_or_else(|| author.clone()),
            author,
            extra_headers,
            message: message.to_string(),
        })
    }
}

impl Object for Commit {
    fn object_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn display(&self) -> String {
        self.content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const SIGNED_COMMIT: &str = "tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
parent e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\n\
author Mr. Test <mrtest@example.com> 1262356920 +0100\n\
committer Mr. Test <mrtest@example.com> 1262356920 +0100\n\
gpgsig -----BEGIN PGP SIGNATURE-----\n \n iQEzBAABCAAdFiEE\n -----END PGP SIGNATURE-----\n\
\n\
Delete package.json and overwrite README.\n";

    fn parse(content: &str) -> Commit {
        Commit::deserialize(Cursor::new(content.as_bytes().to_vec())).unwrap()
    }

    #[test]
    fn signed_commits_keep_their_signature_and_message() {
        let commit = parse(SIGNED_COMMIT);

        assert_eq!(commit.parents().len(), 1);
        assert_eq!(commit.author().name(), "Mr. Test");
        assert_eq!(commit.author().email(), "mrtest@example.com");
        assert_eq!(commit.extra_headers()[0].0, "gpgsig");
        assert_eq!(
            commit.extra_headers()[0].1,
            "-----BEGIN PGP SIGNATURE-----\n\niQEzBAABCAAdFiEE\n-----END PGP SIGNATURE-----"
        );
        assert_eq!(commit.message(), "Delete package.json and overwrite README.\n");
    }

    #[test]
    fn reserializing_a_parsed_commit_preserves_its_bytes() {
        let commit = parse(SIGNED_COMMIT);
        let serialized = commit.serialize().unwrap();

        let expected = with_header(ObjectType::Commit, SIGNED_COMMIT.as_bytes());
        assert_eq!(serialized, expected);
    }

    #[test]
    fn author_lines_keep_their_timezone() {
        let author = Author::try_from("A U Thor <author@example.com> 1112911993 -0700").unwrap();

        assert_eq!(author.timestamp().timestamp(), 1112911993);
        assert_eq!(author.timestamp().offset().local_minus_utc(), -7 * 3600);
        assert_eq!(author.display(), "A U Thor <author@example.com> 1112911993 -0700");
    }

    #[test]
    fn git_internal_dates_are_accepted() {
        let date = parse_date("1262356920 +0100").unwrap();
        assert_eq!(date.timestamp(), 1262356920);
        assert_eq!(date.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn a_commit_without_a_tree_is_rejected() {
        let result = Commit::deserialize(Cursor::new(
            b"author A <a@b.c> 1 +0000\n\nmsg\n".to_vec(),
        ));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_author_lines_are_errors() {
        assert!(Author::try_from("a <b> 1 +1\u{e9}1").is_err());
        assert!(Author::try_from("a <b> 1 +01:0").is_err());
        assert!(Author::try_from("x> <y 1 +0000").is_err());
        assert!(Author::try_from("a b> 1 +0000").is_err());
    }

    #[test]
    fn a_commit_with_a_malformed_committer_is_rejected() {
        let result = Commit::deserialize(Cursor::new(
            b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
author A <a@b.c> 1 +0000\n\
committer x> <y 1 +0000\n\nmsg\n"
                .to_vec(),
        ));
        assert!(result.is_err());
    }
}
