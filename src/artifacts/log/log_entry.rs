use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::Serialize;

/// A commit as reported by `log`, serialized flat: `oid` next to the commit fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub oid: ObjectId,
    #[serde(flatten)]
    pub commit: CommitRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub message: String,
    pub tree: ObjectId,
    pub parent: Vec<ObjectId>,
    pub author: PersonRecord,
    pub committer: PersonRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpgsig: Option<String>,
}

/// Identity plus time of an author or committer
///
/// `timezone_offset` is in minutes with the sign inverted, so `+0200` becomes `-120`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    pub timezone_offset: i32,
}

impl LogEntry {
    pub fn new(oid: ObjectId, commit: &Commit) -> Self {
        let gpgsig = commit
            .extra_headers()
            .iter()
            .find(|(key, _)| key == "gpgsig")
            .map(|(_, value)| value.clone());

        LogEntry {
            oid,
            commit: CommitRecord {
                message: commit.message().to_string(),
                tree: commit.tree_oid().clone(),
                parent: commit.parents().to_vec(),
                author: PersonRecord::from(commit.author()),
                committer: PersonRecord::from(commit.committer()),
                gpgsig,
            },
        }
    }

    pub fn short_message(&self) -> &str {
        self.commit.message.lines().next().unwrap_or_default()
    }
}

impl PersonRecord {
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        FixedOffset::west_opt(self.timezone_offset * 60)?
            .timestamp_opt(self.timestamp, 0)
            .single()
    }

    /// "Mon Jan 1 12:34:56 2024 +0000"
    pub fn readable_date(&self) -> String {
        self.date()
            .map(|date| date.format("%a %b %-d %H:%M:%S %Y %z").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

impl From<&Author> for PersonRecord {
    fn from(author: &Author) -> Self {
        let timestamp = author.timestamp();

        PersonRecord {
            name: author.name().to_string(),
            email: author.email().to_string(),
            timestamp: timestamp.timestamp(),
            timezone_offset: -timestamp.offset().local_minus_utc() / 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn author(offset_hours: i32) -> Author {
        let offset = FixedOffset::east_opt(offset_hours * 3600).unwrap();
        Author::new_with_timestamp(
            "Ada".to_string(),
            "ada@example.com".to_string(),
            offset.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn timezone_offsets_are_inverted_minutes() {
        assert_eq!(PersonRecord::from(&author(2)).timezone_offset, -120);
        assert_eq!(PersonRecord::from(&author(-5)).timezone_offset, 300);
        assert_eq!(PersonRecord::from(&author(0)).timezone_offset, 0);
    }

    #[test]
    fn dates_survive_the_offset_conversion() {
        let person = PersonRecord::from(&author(2));

        assert_eq!(person.date().unwrap(), author(2).timestamp());
        assert!(person.readable_date().ends_with("+0200"));
    }

    #[test]
    fn entries_serialize_flat() {
        let tree = ObjectId::try_parse("4b825dc642cb6eb9a060e54bf8d69288fbee4904".to_string())
            .unwrap();
        let commit = Commit::new(
            vec![],
            tree.clone(),
            author(0),
            author(0),
            "first\n".to_string(),
        );
        let oid = ObjectId::try_parse("a".repeat(40)).unwrap();
        let entry = LogEntry::new(oid, &commit);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["oid"], "a".repeat(40));
        assert_eq!(json["message"], "first\n");
        assert_eq!(json["tree"], tree.as_ref());
        assert_eq!(json["parent"], serde_json::json!([]));
        assert_eq!(json["author"]["timezoneOffset"], 0);
        assert!(json.get("gpgsig").is_none());
        assert!(json.get("commit").is_none());
        assert_eq!(entry.short_message(), "first");
    }
}
