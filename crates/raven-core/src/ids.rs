//! Identifier newtypes shared by gateway and client.
//!
//! All identifiers are document names issued by the remote document service and
//! travel on the wire as bare strings (`#[serde(transparent)]`).

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Channel document name (`Raven Channel`). DMs are channels too.
    ChannelId
);

string_id!(
    /// User document name (`Raven User`), usually an email address.
    UserId
);

string_id!(
    /// One connected client instance. A user may hold several.
    SessionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_strings() {
        let c = ChannelId::from("general");
        assert_eq!(serde_json::to_string(&c).ok().as_deref(), Some("\"general\""));
        let back: Option<ChannelId> = serde_json::from_str("\"general\"").ok();
        assert_eq!(back, Some(c));
    }
}
