//! Opaque stable identifiers for the core entities.
//!
//! Each id wraps a UUID string rather than a bare `String` so the compiler
//! catches a `JobId` passed where a `RoutineId` was expected, the same
//! reasoning the teacher applied to `ComplexityScore` wrapping a bare `u32`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Generates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Wraps an existing id string (e.g. one loaded from the store).
            pub fn from_string(value: String) -> Self {
                Self(value)
            }

            /// Returns the id as a borrowed string.
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
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_id!(RoutineId);
opaque_id!(SceneId);
opaque_id!(JobId);
opaque_id!(SceneExecutionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(RoutineId::new(), RoutineId::new());
    }

    #[test]
    fn round_trips_through_string() {
        let id = JobId::from("fixed-id");
        assert_eq!(id.as_str(), "fixed-id");
        assert_eq!(id.to_string(), "fixed-id");
    }
}
