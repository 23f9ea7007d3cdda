//! The authenticated identity carried through a request.
//!
//! Modeled as a tagged variant rather than a trait object: every kind of
//! caller differs only through the fields below, never through behavior, so
//! there is no seam that needs dynamic dispatch.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Anonymous,
    User,
    ApiKey,
    OAuth,
    Admin,
}

/// Write/read scope granted to a caller. `ReadWrite` implies `ReadOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    All,
    ReadOnly,
    ReadWrite,
}

impl Scope {
    #[must_use]
    pub const fn allows_write(self) -> bool {
        matches!(self, Self::All | Self::ReadWrite)
    }

    #[must_use]
    pub fn from_str_field(s: &str) -> Option<Self> {
        match s {
            "*" => Some(Self::All),
            "readonly" => Some(Self::ReadOnly),
            "readwrite" => Some(Self::ReadWrite),
            _ => None,
        }
    }

    /// Parses an OAuth grant's space-separated scope string (the same
    /// `{"*","readonly","readwrite"}` vocabulary as an API key's `scope`)
    /// into the most permissive recognized token. Unrecognized tokens are
    /// ignored; an empty or fully-unrecognized string defaults to the least
    /// privileged `ReadOnly` rather than silently granting write access.
    #[must_use]
    pub fn from_oauth_scope_string(s: &str) -> Self {
        s.split_whitespace()
            .filter_map(Self::from_str_field)
            .max_by_key(|scope| match scope {
                Self::ReadOnly => 0,
                Self::ReadWrite => 1,
                Self::All => 2,
            })
            .unwrap_or(Self::ReadOnly)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub user_id: Option<Uuid>,
    pub app_id: Option<Uuid>,
    pub scope: Scope,
    /// `None` means every table is reachable.
    pub allowed_tables: Option<Vec<String>>,
    pub oauth_scopes: Option<Vec<String>>,
    pub key_id: Option<Uuid>,
}

impl Principal {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            kind: PrincipalKind::Anonymous,
            user_id: None,
            app_id: None,
            scope: Scope::ReadOnly,
            allowed_tables: None,
            oauth_scopes: None,
            key_id: None,
        }
    }

    #[must_use]
    pub const fn admin() -> Self {
        Self {
            kind: PrincipalKind::Admin,
            user_id: None,
            app_id: None,
            scope: Scope::All,
            allowed_tables: None,
            oauth_scopes: None,
            key_id: None,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self.kind, PrincipalKind::Admin)
    }

    #[must_use]
    pub fn may_touch_table(&self, table: &str) -> bool {
        self.allowed_tables
            .as_ref()
            .is_none_or(|tables| tables.iter().any(|t| t == table))
    }

    #[must_use]
    pub fn rls_user_id(&self) -> Option<Uuid> {
        self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_all_and_readwrite_allow_writes() {
        assert!(Scope::All.allows_write());
        assert!(Scope::ReadWrite.allows_write());
        assert!(!Scope::ReadOnly.allows_write());
    }

    #[test]
    fn no_allow_list_means_every_table_is_reachable() {
        let p = Principal::admin();
        assert!(p.may_touch_table("anything"));
    }

    #[test]
    fn allow_list_restricts_to_named_tables() {
        let mut p = Principal::anonymous();
        p.allowed_tables = Some(vec!["posts".to_string()]);
        assert!(p.may_touch_table("posts"));
        assert!(!p.may_touch_table("users"));
    }

    #[test]
    fn oauth_scope_string_picks_most_permissive_recognized_token() {
        assert_eq!(Scope::from_oauth_scope_string("readonly"), Scope::ReadOnly);
        assert_eq!(Scope::from_oauth_scope_string("readonly readwrite"), Scope::ReadWrite);
        assert_eq!(Scope::from_oauth_scope_string("*"), Scope::All);
        assert_eq!(Scope::from_oauth_scope_string("unknown"), Scope::ReadOnly);
        assert_eq!(Scope::from_oauth_scope_string(""), Scope::ReadOnly);
    }
}
