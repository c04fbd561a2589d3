//! Newtype wrappers around `i64` for domain entity identifiers.
//!
//! Identifiers are PostgreSQL `BIGINT` keys. Distinct types prevent passing
//! a `VideoFileId` where a `StorageId` is expected. With the `sqlx` feature
//! each ID type also implements `sqlx::Type`, `Encode` and `Decode`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Macro to define a newtype ID wrapper around `i64`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw database key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Return the raw database key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }

        #[cfg(feature = "sqlx")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'q> sqlx::Encode<'q, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Postgres as sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <i64 as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }

        #[cfg(feature = "sqlx")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: <sqlx::Postgres as sqlx::Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                <i64 as sqlx::Decode<'r, sqlx::Postgres>>::decode(value).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a configured storage backend.
    StorageId
);

define_id!(
    /// Unique identifier for one encoded rendition of a video.
    VideoFileId
);

define_id!(
    /// Unique identifier for a video (the asset owning several renditions).
    VideoId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id = StorageId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(" 42 ".parse::<StorageId>().unwrap(), id);
        assert!("abc".parse::<StorageId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let id = VideoFileId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        let back: VideoFileId = serde_json::from_str("7").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        assert!(StorageId::new(1) < StorageId::new(2));
    }
}
