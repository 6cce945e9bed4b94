//! Placeholder substitution for pipeline and path templates
//!
//! Templates exchanged between nodes embed literal marker tokens that are
//! resolved against node-local directories just before use. The tokens are
//! part of the wire contract with the remote peer and must stay literal;
//! they are never parsed as paths before substitution.

/// Resolved against the app-writable root of the local node.
pub const APP_RW_PATH: &str = "@APP_RW_PATH@";

/// Resolved against the app-writable root of the node that receives the
/// template (the remote peer from the template author's point of view).
pub const REMOTE_APP_RW_PATH: &str = "@REMOTE_APP_RW_PATH@";

/// Resolved against the already-rewritten trained-model path. Because its
/// resolution value is itself path-dependent, this token must be
/// substituted after the root tokens have been resolved.
pub const TRAINED_MODEL_FILE: &str = "@TRAINED_MODEL_FILE@";

const TOKENS: [&str; 3] = [APP_RW_PATH, REMOTE_APP_RW_PATH, TRAINED_MODEL_FILE];

/// Replace every occurrence of `token` in `template` with `value`,
/// left-to-right and non-overlapping. A template without the token is
/// returned unchanged; this is a no-op, not an error.
pub fn substitute(template: &str, token: &str, value: &str) -> String {
    template.replace(token, value)
}

/// Returns true if any recognized placeholder token remains in `text`.
pub fn has_placeholder(text: &str) -> bool {
    TOKENS.iter().any(|token| text.contains(token))
}
