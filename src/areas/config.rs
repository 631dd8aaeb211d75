//! Repository configuration (`.git/config`)
//!
//! The file is git's INI dialect:
//!
//! ```text
//! [core]
//! 	repositoryformatversion = 0
//! [remote "origin"]
//! 	url = https://github.com/isomorphic-git/isomorphic-git
//! 	fetch = +refs/heads/*:refs/remotes/origin/*
//! ```
//!
//! Section and key names are case-insensitive, subsection names are not. Values may
//! be double-quoted; `#` and `;` start comments outside quotes.

use crate::vfs::FileSystem;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    subsection: Option<String>,
    entries: Vec<(String, String)>,
}

impl Section {
    fn matches(&self, name: &str, subsection: Option<&str>) -> bool {
        self.name.eq_ignore_ascii_case(name) && self.subsection.as_deref() == subsection
    }
}

/// Parsed contents of a config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub name: String,
    pub url: String,
    pub fetch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchConfig {
    pub name: String,
    pub remote: String,
    pub merge: String,
}

impl ConfigFile {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut sections: Vec<Section> = Vec::new();

        for (line_number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let header = header
                    .split_once(']')
                    .map(|(header, _)| header)
                    .with_context(|| format!("bad config line {}: {line}", line_number + 1))?;
                sections.push(Self::parse_section_header(header));
                continue;
            }

            let section = sections
                .last_mut()
                .with_context(|| format!("key outside of a section on line {}", line_number + 1))?;
            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), Self::parse_value(value)),
                // a bare key is boolean true
                None => (line, "true".to_string()),
            };
            section
                .entries
                .push((key.to_ascii_lowercase(), value));
        }

        Ok(ConfigFile { sections })
    }

    fn parse_section_header(header: &str) -> Section {
        match header.split_once(char::is_whitespace) {
            Some((name, subsection)) => Section {
                name: name.to_ascii_lowercase(),
                subsection: Some(
                    subsection
                        .trim()
                        .trim_matches('"')
                        .replace("\\\"", "\"")
                        .replace("\\\\", "\\"),
                ),
                entries: Vec::new(),
            },
            None => Section {
                name: header.trim().to_ascii_lowercase(),
                subsection: None,
                entries: Vec::new(),
            },
        }
    }

    fn parse_value(raw: &str) -> String {
        let mut value = String::new();
        let mut in_quotes = false;
        // everything up to here was quoted or escaped and keeps its whitespace
        let mut kept = 0;
        let mut chars = raw.trim().chars();

        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    in_quotes = !in_quotes;
                    kept = value.len();
                }
                '\\' => {
                    match chars.next() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(other) => value.push(other),
                        None => {}
                    }
                    kept = value.len();
                }
                '#' | ';' if !in_quotes => break,
                _ => value.push(c),
            }
        }

        let unquoted_end = value[kept..].trim_end().len();
        value.truncate(kept + unquoted_end);
        value
    }

    fn format_value(value: &str) -> String {
        let needs_quotes = value.starts_with(' ')
            || value.ends_with(' ')
            || value.contains(['#', ';', '"', '\\']);
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\t', "\\t");

        if needs_quotes {
            format!("\"{escaped}\"")
        } else {
            escaped
        }
    }

    /// Last value of `section[.subsection].key`
    pub fn get(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&str> {
        self.get_all(section, subsection, key).last().copied()
    }

    /// Every value of a multi-valued key, in file order
    pub fn get_all(&self, section: &str, subsection: Option<&str>, key: &str) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.matches(section, subsection))
            .flat_map(|s| s.entries.iter())
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Replace the value of a key, appending the section or key when missing
    pub fn set(&mut self, section: &str, subsection: Option<&str>, key: &str, value: &str) {
        let key = key.to_ascii_lowercase();

        let existing = self
            .sections
            .iter_mut()
            .rev()
            .filter(|s| s.matches(section, subsection))
            .flat_map(|s| s.entries.iter_mut())
            .find(|(k, _)| *k == key);
        if let Some((_, existing_value)) = existing {
            *existing_value = value.to_string();
            return;
        }

        match self
            .sections
            .iter_mut()
            .rev()
            .find(|s| s.matches(section, subsection))
        {
            Some(s) => s.entries.push((key, value.to_string())),
            None => self.sections.push(Section {
                name: section.to_ascii_lowercase(),
                subsection: subsection.map(str::to_string),
                entries: vec![(key, value.to_string())],
            }),
        }
    }

    /// Subsection names of every `[section "..."]`, in file order
    pub fn subsections(&self, section: &str) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for s in &self.sections {
            if let Some(sub) = &s.subsection
                && s.name.eq_ignore_ascii_case(section)
                && !names.contains(&sub.as_str())
            {
                names.push(sub);
            }
        }
        names
    }

    pub fn remote(&self, name: &str) -> Option<RemoteConfig> {
        Some(RemoteConfig {
            name: name.to_string(),
            url: self.get("remote", Some(name), "url")?.to_string(),
            fetch: self.get("remote", Some(name), "fetch").map(str::to_string),
        })
    }

    pub fn remotes(&self) -> Vec<RemoteConfig> {
        self.subsections("remote")
            .into_iter()
            .filter_map(|name| self.remote(name))
            .collect()
    }

    pub fn branch(&self, name: &str) -> Option<BranchConfig> {
        Some(BranchConfig {
            name: name.to_string(),
            remote: self.get("branch", Some(name), "remote")?.to_string(),
            merge: self.get("branch", Some(name), "merge")?.to_string(),
        })
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            match &section.subsection {
                Some(sub) => out.push_str(&format!(
                    "[{} \"{}\"]\n",
                    section.name,
                    sub.replace('\\', "\\\\").replace('"', "\\\"")
                )),
                None => out.push_str(&format!("[{}]\n", section.name)),
            }
            for (key, value) in &section.entries {
                out.push_str(&format!("\t{key} = {}\n", Self::format_value(value)));
            }
        }
        out
    }
}

/// `.git/config` on the virtual filesystem
#[derive(Debug)]
pub struct Config {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl Config {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf) -> Self {
        Config { fs, path }
    }

    /// Current contents; a missing file is an empty config
    pub fn load(&self) -> anyhow::Result<ConfigFile> {
        match self.fs.read_file(&self.path) {
            Ok(content) => ConfigFile::parse(&String::from_utf8_lossy(&content))
                .with_context(|| format!("Invalid config file {}", self.path.display())),
            Err(err) if err.is_not_found() => Ok(ConfigFile::default()),
            Err(err) => {
                Err(err).with_context(|| format!("Unable to read {}", self.path.display()))
            }
        }
    }

    pub fn save(&self, config: &ConfigFile) -> anyhow::Result<()> {
        self.fs
            .write_file(&self.path, config.serialize().as_bytes())
            .with_context(|| format!("Unable to write {}", self.path.display()))
    }

    pub fn get(&self, section: &str, subsection: Option<&str>, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.load()?.get(section, subsection, key).map(str::to_string))
    }

    /// Load, change one key, write back
    pub fn set(&self, section: &str, subsection: Option<&str>, key: &str, value: &str) -> anyhow::Result<()> {
        let mut config = self.load()?;
        config.set(section, subsection, key, value);
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const CLONED_CONFIG: &str = "[core]
\trepositoryformatversion = 0
\tfilemode = false
\tbare = false
\tlogallrefupdates = true
\tsymlinks = false
\tignorecase = true
[remote \"origin\"]
\turl = https://github.com/isomorphic-git/isomorphic-git
\tfetch = +refs/heads/master:refs/remotes/origin/master
[branch \"master\"]
\tremote = origin
\tmerge = refs/heads/master
";

    #[test]
    fn a_cloned_config_exposes_its_remote_and_branch() {
        let config = ConfigFile::parse(CLONED_CONFIG).unwrap();

        assert_eq!(config.get("core", None, "bare"), Some("false"));
        assert_eq!(config.get("CORE", None, "IgnoreCase"), Some("true"));
        assert_eq!(
            config.remote("origin"),
            Some(RemoteConfig {
                name: "origin".to_string(),
                url: "https://github.com/isomorphic-git/isomorphic-git".to_string(),
                fetch: Some("+refs/heads/master:refs/remotes/origin/master".to_string()),
            })
        );
        assert_eq!(config.branch("master").unwrap().merge, "refs/heads/master");
        assert_eq!(config.remotes().len(), 1);
    }

    #[test]
    fn serializing_a_parsed_config_reproduces_it() {
        let config = ConfigFile::parse(CLONED_CONFIG).unwrap();
        assert_eq!(config.serialize(), CLONED_CONFIG);
    }

    #[test]
    fn quotes_comments_and_bare_keys_are_understood() {
        let config = ConfigFile::parse(
            "# leading comment\n[user]\n\tname = \"Mr. Test\" ; trailing\n\temail = mrtest@example.com # note\n[core]\n\tbare\n",
        )
        .unwrap();

        assert_eq!(config.get("user", None, "name"), Some("Mr. Test"));
        assert_eq!(config.get("user", None, "email"), Some("mrtest@example.com"));
        assert_eq!(config.get("core", None, "bare"), Some("true"));
    }

    #[test]
    fn setting_keys_updates_or_appends() {
        let mut config = ConfigFile::parse("[core]\n\tbare = false\n").unwrap();
        config.set("core", None, "bare", "true");
        config.set("remote", Some("origin"), "url", "https://example.com/repo.git");

        assert_eq!(
            config.serialize(),
            "[core]\n\tbare = true\n[remote \"origin\"]\n\turl = https://example.com/repo.git\n"
        );
    }

    #[test]
    fn values_that_need_quoting_survive_a_round_trip() {
        let mut config = ConfigFile::default();
        config.set("user", None, "name", " padded # name ");

        let reparsed = ConfigFile::parse(&config.serialize()).unwrap();
        assert_eq!(reparsed.get("user", None, "name"), Some(" padded # name "));
    }

    #[test]
    fn keys_before_any_section_are_rejected() {
        assert!(ConfigFile::parse("bare = true\n").is_err());
    }

    #[test]
    fn missing_config_files_load_empty() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFs::new());
        fs.mkdir_all(Path::new("/repo/.git")).unwrap();
        let config = Config::new(fs, PathBuf::from("/repo/.git/config"));

        assert_eq!(config.load().unwrap(), ConfigFile::default());
        config.set("user", None, "name", "Mr. Test").unwrap();
        assert_eq!(
            config.get("user", None, "name").unwrap(),
            Some("Mr. Test".to_string())
        );
    }
}
