//! Mount argument strings.
//!
//! Clients pass mount tuning as a comma-separated token string, which the
//! engine only inspects for a few tokens of its own; the rest travels
//! through to the filesystem helpers untouched.

/// Token requesting an update of an existing mount instead of a new one.
pub const MOUNT_ARGUMENT_UPDATE: &str = "update";

/// Argument the unmount helper understands as "unmount even if busy".
pub const UNMOUNT_ARGUMENT_FORCE: &str = "force";

/// Mount point URL of a volume mounted at the root of the filesystem.
pub const ROOT_MOUNT_POINT: &str = "file://localhost/";

/// Whether the comma-separated `arguments` string contains `argument`.
///
/// Tokens are trimmed and matched ignoring ASCII case.
pub fn contains_argument(arguments: &str, argument: &str) -> bool {
    arguments
        .split(',')
        .map(str::trim)
        .any(|token| token.eq_ignore_ascii_case(argument))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_tokens() {
        assert!(contains_argument("update", MOUNT_ARGUMENT_UPDATE));
        assert!(contains_argument("-u,nodev", "-u"));
        assert!(contains_argument("nodev, update ,nosuid", "update"));
        assert!(contains_argument("UPDATE", "update"));
    }

    #[test]
    fn rejects_partial_tokens() {
        assert!(!contains_argument("noupdate", "update"));
        assert!(!contains_argument("update!", "update"));
        assert!(!contains_argument("", "update"));
    }
}
