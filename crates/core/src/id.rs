// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier service: snowflake-style 64-bit IDs and typed wrappers.
//!
//! Layout: 41 bits of milliseconds since [`ID_EPOCH_MS`], 10 bits of node id,
//! 12 bits of per-millisecond sequence. IDs generated by one node are strictly
//! monotonic; IDs across nodes sort by creation time to millisecond grain.
//!
//! All IDs serialize as decimal strings so they survive JSON consumers that
//! round-trip numbers through 64-bit floats. Deserialization accepts either
//! a string or an integer.

use crate::clock::Clock;
use parking_lot::Mutex;

/// Custom epoch: 2024-01-01T00:00:00Z.
pub const ID_EPOCH_MS: u64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQ_BITS: u32 = 12;
const NODE_MAX: u16 = (1 << NODE_BITS) - 1;
const SEQ_MAX: u16 = (1 << SEQ_BITS) - 1;

/// Source of unique 64-bit identifiers.
pub trait IdGen: Send + Sync {
    fn next(&self) -> u64;
}

/// Snowflake-style generator. One instance per process, cheap to share.
pub struct Snowflake<C: Clock> {
    clock: C,
    node: u16,
    state: Mutex<SnowflakeState>,
}

struct SnowflakeState {
    last_ms: u64,
    seq: u16,
}

impl<C: Clock> Snowflake<C> {
    /// Create a generator for the given node id (truncated to 10 bits).
    pub fn new(clock: C, node: u16) -> Self {
        Self {
            clock,
            node: node & NODE_MAX,
            state: Mutex::new(SnowflakeState { last_ms: 0, seq: 0 }),
        }
    }
}

impl<C: Clock> IdGen for Snowflake<C> {
    fn next(&self) -> u64 {
        let mut state = self.state.lock();
        // Never move backwards: a clock regression reuses the last observed
        // millisecond and keeps counting its sequence.
        let mut ms = self.clock.epoch_ms().max(state.last_ms);

        if ms == state.last_ms {
            if state.seq == SEQ_MAX {
                // Sequence exhausted within one millisecond: borrow the next
                // millisecond instead of sleeping.
                ms += 1;
                state.seq = 0;
            } else {
                state.seq += 1;
            }
        } else {
            state.seq = 0;
        }
        state.last_ms = ms;

        let ts = ms.saturating_sub(ID_EPOCH_MS);
        (ts << (NODE_BITS + SEQ_BITS)) | ((self.node as u64) << SEQ_BITS) | state.seq as u64
    }
}

/// Define a `u64` newtype ID with string serialization.
macro_rules! define_u64_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u64);

        impl $name {
            /// Sentinel for "not assigned yet" / "not execution scoped".
            pub const NONE: Self = Self(0);

            pub fn as_u64(&self) -> u64 {
                self.0
            }

            pub fn is_none(&self) -> bool {
                self.0 == 0
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                struct IdVisitor;

                impl serde::de::Visitor<'_> for IdVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "a u64 or its decimal string form")
                    }

                    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<$name, E> {
                        Ok($name(v))
                    }

                    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<$name, E> {
                        u64::try_from(v).map($name).map_err(E::custom)
                    }

                    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<$name, E> {
                        v.parse().map($name).map_err(E::custom)
                    }
                }

                d.deserialize_any(IdVisitor)
            }
        }
    };
}

define_u64_id! {
    /// Identifies one run of a playbook.
    pub struct ExecutionId;
}

define_u64_id! {
    /// Identifies one immutable event record.
    pub struct EventId;
}

define_u64_id! {
    /// Identifies one durable queue row.
    pub struct QueueId;
}

define_u64_id! {
    /// Identifies one registered playbook version.
    pub struct CatalogId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
