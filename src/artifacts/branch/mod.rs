//! Branch and reference names
//!
//! - `branch_name`: validated branch names and full ref names
//! - `revision`: names that resolve to a commit (refs, `@`, object ids)

pub mod branch_name;
pub mod revision;

/// Names git refuses for branches: leading dots, `..`, empty components, a `.lock`
/// suffix, `@{`, control characters and the revision syntax characters
pub const INVALID_BRANCH_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\/\/|\.lock$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

pub const REF_ALIASES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "@" => "HEAD",
};
