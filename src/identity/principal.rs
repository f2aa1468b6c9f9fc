use std::collections::HashSet;

/// Identity attached to requests in the no-accounts-configured mode.
pub const ANONYMOUS_USERNAME: &str = "tonearm-user";

/// The authorization context the gate attaches to a request. Exactly one
/// variant per request; the variants are mutually exclusive interpretations
/// of the presented token (or of its absence, for `AnonymousAdmin`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Authenticated account session.
    User {
        username: String,
        vpaths: HashSet<String>,
        admin: bool,
    },
    /// Share grant: may only touch the files it names.
    Share { allowed_files: HashSet<String> },
    /// Federation invite grant: valid for the invite exchange only.
    Invite,
    /// No accounts configured: single trusted local operator with every
    /// configured folder in scope.
    AnonymousAdmin { vpaths: HashSet<String> },
}

impl Principal {
    pub fn username(&self) -> &str {
        match self {
            Principal::User { username, .. } => username,
            Principal::Share { .. } => "share-grant",
            Principal::Invite => "invite-grant",
            Principal::AnonymousAdmin { .. } => ANONYMOUS_USERNAME,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::User { admin: true, .. } | Principal::AnonymousAdmin { .. })
    }

    /// The virtual folder names this context may browse, if it browses at all.
    pub fn vpaths(&self) -> Option<&HashSet<String>> {
        match self {
            Principal::User { vpaths, .. } | Principal::AnonymousAdmin { vpaths } => Some(vpaths),
            Principal::Share { .. } | Principal::Invite => None,
        }
    }

    pub fn allowed_files(&self) -> Option<&HashSet<String>> {
        match self {
            Principal::Share { allowed_files } => Some(allowed_files),
            _ => None,
        }
    }
}
