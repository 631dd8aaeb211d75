use crate::areas::repository::Repository;
use crate::artifacts::log::log_entry::LogEntry;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// Commit waiting in the walk queue
///
/// Newer commits come out first; among equal timestamps the one discovered
/// earlier wins.
#[derive(Debug, PartialEq, Eq)]
struct Pending {
    timestamp: i64,
    sequence: Reverse<u64>,
    oid: ObjectId,
    commit: Commit,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.timestamp, self.sequence).cmp(&(other.timestamp, other.sequence))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// History walk starting at one commit, newest first
///
/// Every commit is reported once, merges included. Parents of commits listed in
/// `.git/shallow` are not followed since their objects are not in the store.
pub struct RevList<'r> {
    repository: &'r Repository,
    depth: Option<usize>,
    queue: BinaryHeap<Pending>,
    seen: HashSet<ObjectId>,
    shallow: HashSet<ObjectId>,
    sequence: u64,
    emitted: usize,
}

impl<'r> RevList<'r> {
    pub fn new(
        repository: &'r Repository,
        start: &ObjectId,
        depth: Option<usize>,
    ) -> anyhow::Result<Self> {
        let shallow = repository.refs().read_shallow()?.into_iter().collect();

        let mut rev_list = RevList {
            repository,
            depth,
            queue: BinaryHeap::new(),
            seen: HashSet::new(),
            shallow,
            sequence: 0,
            emitted: 0,
        };
        rev_list.enqueue(start)?;

        Ok(rev_list)
    }

    fn enqueue(&mut self, oid: &ObjectId) -> anyhow::Result<()> {
        if !self.seen.insert(oid.clone()) {
            return Ok(());
        }

        let commit = self
            .repository
            .database()
            .parse_object_as_commit(oid)
            .with_context(|| format!("unable to read commit {oid}"))?
            .with_context(|| format!("object {oid} is not a commit"))?;

        self.sequence += 1;
        self.queue.push(Pending {
            timestamp: commit.timestamp().timestamp(),
            sequence: Reverse(self.sequence),
            oid: oid.clone(),
            commit,
        });

        Ok(())
    }

    fn advance(&mut self) -> anyhow::Result<Option<LogEntry>> {
        if self.depth.is_some_and(|depth| self.emitted >= depth) {
            return Ok(None);
        }
        let Some(pending) = self.queue.pop() else {
            return Ok(None);
        };

        if !self.shallow.contains(&pending.oid) {
            for parent in pending.commit.parents() {
                self.enqueue(parent)?;
            }
        }

        self.emitted += 1;
        Ok(Some(LogEntry::new(pending.oid, &pending.commit)))
    }
}

impl Iterator for RevList<'_> {
    type Item = anyhow::Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}
