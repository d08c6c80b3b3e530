//! Access scopes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AuthzError;

/// Capability level a principal holds on a resource.
///
/// Levels are ordered `None < Reader < Writer < Owner`, and a higher level
/// satisfies every lower requirement.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// No access. Never stored; an absent entry reads as `None`.
    #[default]
    None,
    /// Read access.
    Reader,
    /// Read and write access.
    Writer,
    /// Full control, including changing other principals' scopes.
    Owner,
}

impl Scope {
    /// All scopes, lowest first.
    pub const ALL: [Scope; 4] = [Scope::None, Scope::Reader, Scope::Writer, Scope::Owner];

    /// Returns `true` if holding `self` grants `required`.
    #[must_use]
    pub fn satisfies(self, required: Scope) -> bool {
        self >= required
    }

    /// Returns the canonical upper-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::None => "NONE",
            Scope::Reader => "READER",
            Scope::Writer => "WRITER",
            Scope::Owner => "OWNER",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AuthzError::InvalidArgument(format!("unknown scope: {s}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_owner_satisfies_every_requirement() {
        for required in Scope::ALL {
            assert!(Scope::Owner.satisfies(required));
        }
        assert!(!Scope::Reader.satisfies(Scope::Writer));
        assert!(!Scope::None.satisfies(Scope::Reader));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("writer".parse::<Scope>().unwrap(), Scope::Writer);
        assert_eq!("OWNER".parse::<Scope>().unwrap(), Scope::Owner);
        assert_eq!(Scope::Reader.to_string(), "READER");
        assert!(matches!("admin".parse::<Scope>(), Err(AuthzError::InvalidArgument(_))));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Scope::Owner).unwrap(), "\"OWNER\"");
        assert_eq!(serde_json::from_str::<Scope>("\"READER\"").unwrap(), Scope::Reader);
    }

    fn arb_scope() -> impl Strategy<Value = Scope> {
        prop::sample::select(Scope::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn satisfies_is_transitive(a in arb_scope(), b in arb_scope(), c in arb_scope()) {
            if a.satisfies(b) && b.satisfies(c) {
                prop_assert!(a.satisfies(c));
            }
        }

        #[test]
        fn every_scope_satisfies_itself(a in arb_scope()) {
            prop_assert!(a.satisfies(a));
        }
    }
}
