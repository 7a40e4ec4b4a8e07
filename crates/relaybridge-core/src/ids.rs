use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// UUIDv7 — time-sortable, so ids correlate naturally in logs and audit rows.
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
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
    };
}

id_newtype!(SessionId, "Identifies one supervised child-process lifetime.");
id_newtype!(PromptId, "Identifies one detected prompt, unique for its lifetime.");
id_newtype!(AuditEventId, "Identifies one row in the hash-chained audit log.");

/// Single-use token attached to a [`crate::reply::Reply`] to prevent duplicate
/// callback injection (spec invariant: at most one reply per prompt is ever accepted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(pub String);

impl Nonce {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `"channel:user_id"` — the identity a reply or chat message arrived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelIdentity(pub String);

impl ChannelIdentity {
    pub fn new(channel: &str, user_id: &str) -> Self {
        Self(format!("{channel}:{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into `(channel, user_id)`. Returns `None` if malformed.
    pub fn split(&self) -> Option<(&str, &str)> {
        self.0.split_once(':')
    }
}

impl fmt::Display for ChannelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
