//! Proptest strategies over the fieldsync data model.

use proptest::prelude::*;
use serde_json::json;

use fieldsync_core::{CacheEntry, MutationKind, PendingMutation};

pub fn mutation_kind() -> impl Strategy<Value = MutationKind> {
    prop_oneof![
        Just(MutationKind::Insert),
        Just(MutationKind::Update),
        Just(MutationKind::Delete),
    ]
}

/// Resource names the way call sites write them.
pub fn resource() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{2,15}"
}

/// Small object payloads with an id and a few fields.
pub fn payload() -> impl Strategy<Value = serde_json::Value> {
    ("[a-z0-9-]{1,12}", any::<bool>(), 0u32..1_000).prop_map(|(id, done, n)| {
        json!({"id": id, "done": done, "n": n})
    })
}

pub fn pending_mutation() -> impl Strategy<Value = PendingMutation> {
    (
        mutation_kind(),
        resource(),
        payload(),
        0u32..5,
        0i64..2_000_000_000_000,
    )
        .prop_map(|(kind, resource, payload, max_retries, created_at)| {
            PendingMutation::new(kind, resource, payload, max_retries, created_at)
        })
}

/// Cache entries with arbitrary fetch times and freshness windows.
pub fn cache_entry() -> impl Strategy<Value = CacheEntry> {
    (payload(), 0i64..2_000_000_000_000, 0u64..86_400_000).prop_map(|(data, fetched_at, ttl_ms)| {
        CacheEntry {
            data,
            fetched_at,
            ttl_ms: ttl_ms as i64,
        }
    })
}
