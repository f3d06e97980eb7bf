use serde::{Deserialize, Serialize};

/// Declares an opaque string identifier.
///
/// Identifiers arrive in event payloads as strings (usually UUIDs) and are
/// compared verbatim; no parsing or case folding is applied.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the identifier with dashes removed, as used in stream names.
            pub fn compact(&self) -> String {
                self.0.replace('-', "")
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of an estate, the tenant that owns a set of merchants.
    EstateId
);

string_id!(
    /// Identifier of a merchant; the key that partitions balance state.
    MerchantId
);

string_id!(
    /// Identifier of a sale transaction.
    TransactionId
);
