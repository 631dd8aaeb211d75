use crate::artifacts::branch::INVALID_BRANCH_NAME_REGEX;
use anyhow::Context;
use derive_new::new;

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// Full name of a ref, relative to the git directory (`HEAD`, `refs/heads/main`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, new)]
pub struct SymRefName(String);

impl SymRefName {
    /// Check a full ref name received from outside: `HEAD`, or `refs/` followed by
    /// components git would accept
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        if !is_valid_ref_name(&name) {
            anyhow::bail!("invalid ref name: {}", name);
        }
        Ok(Self(name))
    }

    pub fn head() -> Self {
        SymRefName("HEAD".to_string())
    }

    pub fn is_head(&self) -> bool {
        self.0 == "HEAD"
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    pub fn is_tag(&self) -> bool {
        self.0.starts_with(TAGS_PREFIX)
    }

    pub fn as_ref_path(&self) -> &str {
        &self.0
    }

    /// Name without its `refs/heads/`, `refs/tags/` or `refs/remotes/` prefix
    pub fn short_name(&self) -> &str {
        [HEADS_PREFIX, TAGS_PREFIX, REMOTES_PREFIX]
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or(&self.0)
    }
}

impl AsRef<str> for SymRefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SymRefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn is_valid_ref_name(name: &str) -> bool {
    if name == "HEAD" {
        return true;
    }
    let Some(rest) = name.strip_prefix("refs/") else {
        return false;
    };
    match regex::Regex::new(INVALID_BRANCH_NAME_REGEX) {
        Ok(re) => !rest.is_empty() && !re.is_match(rest),
        Err(_) => false,
    }
}

/// A validated branch name (`main`, `feature/login`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        if name.is_empty() {
            anyhow::bail!("branch name cannot be empty");
        }

        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .with_context(|| format!("invalid branch name regex: {INVALID_BRANCH_NAME_REGEX}"))?;

        if re.is_match(&name) || name == "@" {
            anyhow::bail!("invalid branch name: {}", name);
        }

        Ok(Self(name))
    }

    /// Branch name of a `refs/heads/...` ref
    pub fn try_parse_sym_ref_name(sym_ref_name: &SymRefName) -> anyhow::Result<Self> {
        match sym_ref_name.0.strip_prefix(HEADS_PREFIX) {
            Some(name) => Self::try_parse(name.to_string()),
            None => anyhow::bail!(
                "symbolic ref name must start with '{}', got '{}'",
                HEADS_PREFIX,
                sym_ref_name.0
            ),
        }
    }

    pub fn to_ref_name(&self) -> SymRefName {
        SymRefName(format!("{HEADS_PREFIX}{}", self.0))
    }

    /// `refs/remotes/<remote>/<branch>`
    pub fn to_remote_ref_name(&self, remote: &str) -> SymRefName {
        SymRefName(format!("{REMOTES_PREFIX}{remote}/{}", self.0))
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::proptest;

    #[test]
    fn ref_names_cannot_leave_the_refs_directory() {
        assert!(SymRefName::try_parse("refs/tags/../../../x".to_string()).is_err());
        assert!(SymRefName::try_parse("refs//tags/v1".to_string()).is_err());
        assert!(SymRefName::try_parse("refs/tags/v1.lock".to_string()).is_err());
        assert!(SymRefName::try_parse("refs/tags/v\x01".to_string()).is_err());
        assert!(SymRefName::try_parse("config".to_string()).is_err());
        assert!(SymRefName::try_parse("/refs/heads/main".to_string()).is_err());
    }

    #[test]
    fn well_formed_ref_names_are_accepted() {
        assert_eq!(
            SymRefName::try_parse("refs/tags/v1.0".to_string()).unwrap(),
            SymRefName::new("refs/tags/v1.0".to_string())
        );
        assert!(SymRefName::try_parse("refs/heads/feature/login".to_string()).is_ok());
        assert!(SymRefName::try_parse("HEAD".to_string()).unwrap().is_head());
    }

    proptest! {
        #[test]
        fn plain_names_are_valid(branch_name in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(branch_name).is_ok());
        }

        #[test]
        fn hierarchical_names_are_valid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}/{suffix}")).is_ok());
        }

        #[test]
        fn names_starting_with_a_dot_are_invalid(suffix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!(".{suffix}")).is_err());
        }

        #[test]
        fn names_ending_with_lock_are_invalid(prefix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!("{prefix}.lock")).is_err());
        }

        #[test]
        fn names_with_consecutive_dots_are_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}..{suffix}")).is_err());
        }

        #[test]
        fn names_with_empty_components_are_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}//{suffix}")).is_err());
            assert!(BranchName::try_parse(format!("/{suffix}")).is_err());
            assert!(BranchName::try_parse(format!("{prefix}/")).is_err());
        }

        #[test]
        fn names_with_at_brace_are_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}@{{{suffix}}}")).is_err());
        }

        #[test]
        fn names_with_special_characters_are_invalid(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            special_char in r"[\*:\?\[\\^~ \x00]"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}{special_char}{suffix}")).is_err());
        }
    }

    #[test]
    fn empty_names_and_the_head_alias_are_invalid() {
        assert!(BranchName::try_parse(String::new()).is_err());
        assert!(BranchName::try_parse("@".to_string()).is_err());
    }

    #[test]
    fn ref_names_strip_their_namespace() {
        let branch = BranchName::try_parse("feature/login".to_string()).unwrap();

        assert_eq!(branch.to_ref_name().as_ref(), "refs/heads/feature/login");
        assert_eq!(branch.to_ref_name().short_name(), "feature/login");
        assert_eq!(
            branch.to_remote_ref_name("origin").short_name(),
            "origin/feature/login"
        );
        assert_eq!(
            BranchName::try_parse_sym_ref_name(&branch.to_ref_name()).unwrap(),
            branch
        );
    }

    #[test]
    fn only_heads_refs_name_branches() {
        let tag = SymRefName::new("refs/tags/v1.0".to_string());
        assert!(tag.is_tag());
        assert!(BranchName::try_parse_sym_ref_name(&tag).is_err());
        assert!(BranchName::try_parse_sym_ref_name(&SymRefName::head()).is_err());
    }
}
