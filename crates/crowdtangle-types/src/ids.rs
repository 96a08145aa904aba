//! Type-safe identifier wrappers.
//!
//! CrowdTangle hands out numeric ids for accounts and dashboards and opaque
//! string ids for posts (`"{account}|{platform post}"`). Each gets its own
//! newtype so an account id can never be bound where a dashboard id belongs.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around an `i64` with standard derives.
macro_rules! define_int_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the inner `i64` value.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_int_id! {
    /// CrowdTangle account identifier.
    AccountId
}

define_int_id! {
    /// CrowdTangle dashboard identifier.
    DashboardId
}

/// CrowdTangle post identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    /// Create a post identifier from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for PostId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn int_ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&AccountId(42)).unwrap();
        assert_eq!(json, "42");
        let back: DashboardId = serde_json::from_str("7").unwrap();
        assert_eq!(back, DashboardId(7));
    }

    #[test]
    fn post_id_serializes_as_bare_string() {
        let id = PostId::new("100|200");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"100|200\"");
        assert_eq!(id.to_string(), "100|200");
    }

    #[test]
    fn ids_order_by_value() {
        assert!(AccountId(1) < AccountId(2));
        assert!(PostId::from("a") < PostId::from("b"));
    }
}
