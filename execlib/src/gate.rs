//! Advisory deny-list applied to command strings before execution.
//!
//! This is defense-in-depth against a handful of known-destructive
//! invocations, not a security boundary: the list is narrow by design and
//! false negatives are expected. Access control belongs to the deployment
//! (e.g. a reverse proxy), not here.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Deny-list sources, tested in order; the first match wins and its source
/// text is quoted back in the rejection reason.
const BLOCKED_PATTERNS: [&str; 2] = [
    // rm -rf / (optionally sudo'd, optionally forced)
    r"^(sudo\s+)?rm\s+(-[a-z]*f[a-z]*\s+)?/\s*$",
    // ls -R and friends: recursive listings of large trees
    r"^(sudo\s+)?ls\s+(-[a-z]*r[a-z]*)",
];

static BLOCKED: Lazy<Vec<Regex>> = Lazy::new(|| {
    BLOCKED_PATTERNS
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .expect("valid deny-list pattern")
        })
        .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Check a command string against the deny-list.
///
/// Whitespace is collapsed before matching so that spacing tricks do not
/// dodge a pattern. Returns the human-readable rejection reason, or `None`
/// if the command is allowed.
pub fn check(command: &str) -> Option<String> {
    let normalized = WHITESPACE.replace_all(command.trim(), " ");
    for (regex, pattern) in BLOCKED.iter().zip(BLOCKED_PATTERNS) {
        if regex.is_match(&normalized) {
            return Some(format!(
                "Blocked: command matches dangerous pattern ({})",
                pattern
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_rm_rf_root() {
        assert!(check("rm -rf /").is_some());
        assert!(check("sudo rm -rf /").is_some());
        assert!(check("rm /").is_some());
    }

    #[test]
    fn blocks_recursive_ls() {
        assert!(check("ls -R").is_some());
        assert!(check("ls -laR /").is_some());
        assert!(check("sudo ls -R /etc").is_some());
    }

    #[test]
    fn normalizes_whitespace_before_matching() {
        assert!(check("  rm   -rf   /  ").is_some());
        assert!(check("\trm\t-rf\t/").is_some());
    }

    #[test]
    fn reason_names_the_pattern() {
        let reason = check("rm -rf /").expect("should be blocked");
        assert!(reason.starts_with("Blocked: command matches dangerous pattern ("));
        assert!(reason.contains(r"rm\s+"));
    }

    #[test]
    fn allows_ordinary_commands() {
        assert!(check("echo hello").is_none());
        assert!(check("ls -l /tmp").is_none());
        assert!(check("cat /etc/hostname").is_none());
    }

    #[test]
    fn deny_list_is_narrow_by_design() {
        // Destructive but not on the list: advisory gate, not a sandbox.
        assert!(check("rm -rf /tmp/scratch").is_none());
        assert!(check("dd if=/dev/zero of=/dev/sda").is_none());
    }
}
