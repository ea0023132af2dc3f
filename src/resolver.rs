//! Snapshot Resolver
//!
//! Edit/delete callbacks often carry keys that do not match how the message
//! was ingested: a deletion event may report a scope the message never had,
//! or a message id belonging to a sibling message in the same batch. The
//! resolver turns such an imprecise (scope, chat, message) query into the
//! single best-matching snapshot.
//!
//! Resolution order:
//! 1. Exact match on (scope, chat, message)
//! 2. Exact match on (chat, message) ignoring scope, most recent first
//! 3. Nearest match within ±radius on (scope, chat) - only for a non-empty scope
//! 4. Nearest match within ±radius on (chat) ignoring scope
//!
//! A total miss is an explicit `NotFound` outcome, never an error. The
//! resolver reads only the snapshot store; falling through to the media
//! cache after `NotFound` is the caller's decision.

use crate::Result;
use crate::snapshot::MessageSnapshot;
use crate::storage::SnapshotStore;

/// Default search radius for the nearest-match tiers.
///
/// Message ids are monotonic within a chat, so a bounded window recovers
/// off-by-a-few callback ids without false-matching unrelated history.
pub const DEFAULT_NEARBY_RADIUS: i64 = 10;

/// Result of resolving a query
#[derive(Debug)]
pub enum ResolveOutcome {
    /// A snapshot matched on some tier
    Found {
        snapshot: MessageSnapshot,
        tier: ResolveTier,
    },
    /// No tier matched; genuinely unavailable history
    NotFound,
}

impl ResolveOutcome {
    pub fn into_snapshot(self) -> Option<MessageSnapshot> {
        match self {
            ResolveOutcome::Found { snapshot, .. } => Some(snapshot),
            ResolveOutcome::NotFound => None,
        }
    }
}

/// Tier that produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveTier {
    /// Full-key match
    ExactScoped,
    /// (chat, message) match ignoring scope
    ExactAnyScope,
    /// Nearest id within the radius, same scope
    NearbyScoped,
    /// Nearest id within the radius, any scope
    NearbyAnyScope,
}

impl ResolveTier {
    /// Short label for logs and audit output
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactScoped => "exact",
            Self::ExactAnyScope => "any-scope",
            Self::NearbyScoped => "nearby",
            Self::NearbyAnyScope => "nearby-any-scope",
        }
    }
}

/// Tiered fallback resolver over the snapshot store
pub struct Resolver<'a> {
    store: &'a SnapshotStore,
    radius: i64,
}

impl<'a> Resolver<'a> {
    /// Create a resolver with the default radius
    pub fn new(store: &'a SnapshotStore) -> Self {
        Self {
            store,
            radius: DEFAULT_NEARBY_RADIUS,
        }
    }

    /// Override the nearest-match radius
    pub fn with_radius(mut self, radius: i64) -> Self {
        self.radius = radius;
        self
    }

    /// Resolve a (scope, chat, message) query to its best snapshot.
    ///
    /// Negative and zero ids are ordinary keys; the id space belongs to the
    /// platform, not to us.
    pub fn resolve(&self, scope: &str, chat_id: i64, message_id: i64) -> Result<ResolveOutcome> {
        // 1. Exact match on the full key
        if let Some(snapshot) = self.store.get_exact(scope, chat_id, message_id)? {
            return Ok(found(snapshot, ResolveTier::ExactScoped));
        }

        // 2. Exact (chat, message), newest ingestion wins
        if let Some(snapshot) = self.store.get_by_chat_message(chat_id, message_id)? {
            return Ok(found(snapshot, ResolveTier::ExactAnyScope));
        }

        // 3. Nearest within the radius on the supplied scope
        if !scope.is_empty() {
            if let Some(snapshot) =
                self.store
                    .get_nearby(Some(scope), chat_id, message_id, self.radius)?
            {
                return Ok(found(snapshot, ResolveTier::NearbyScoped));
            }
        }

        // 4. Nearest within the radius, any scope
        if let Some(snapshot) = self.store.get_nearby(None, chat_id, message_id, self.radius)? {
            return Ok(found(snapshot, ResolveTier::NearbyAnyScope));
        }

        tracing::debug!(scope, chat = chat_id, msg = message_id, "resolve miss");
        Ok(ResolveOutcome::NotFound)
    }
}

fn found(snapshot: MessageSnapshot, tier: ResolveTier) -> ResolveOutcome {
    tracing::debug!(
        tier = tier.label(),
        chat = snapshot.chat_id,
        msg = snapshot.message_id,
        "resolve hit"
    );
    ResolveOutcome::Found { snapshot, tier }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MessageSnapshot;

    fn store_with(rows: &[(&str, i64, i64, &str)]) -> SnapshotStore {
        let store = SnapshotStore::open_in_memory().unwrap();
        for (scope, chat, msg, text) in rows {
            store
                .upsert(&MessageSnapshot::new(*scope, *chat, *msg, *text))
                .unwrap();
        }
        store
    }

    fn resolve(store: &SnapshotStore, scope: &str, chat: i64, msg: i64) -> ResolveOutcome {
        Resolver::new(store).resolve(scope, chat, msg).unwrap()
    }

    #[test]
    fn test_exact_match_wins() {
        let store = store_with(&[("S", 1, 50, "scoped"), ("", 1, 50, "plain")]);

        match resolve(&store, "S", 1, 50) {
            ResolveOutcome::Found { snapshot, tier } => {
                assert_eq!(snapshot.text, "scoped");
                assert_eq!(tier, ResolveTier::ExactScoped);
            }
            ResolveOutcome::NotFound => panic!("expected a hit"),
        }
    }

    #[test]
    fn test_falls_back_across_scopes() {
        // Ingested under a business scope, queried without one.
        let store = store_with(&[("S", 1, 50, "scoped only")]);

        match resolve(&store, "", 1, 50) {
            ResolveOutcome::Found { snapshot, tier } => {
                assert_eq!(snapshot.text, "scoped only");
                assert_eq!(tier, ResolveTier::ExactAnyScope);
            }
            ResolveOutcome::NotFound => panic!("expected tier-2 hit"),
        }
    }

    #[test]
    fn test_nearby_within_radius() {
        let store = store_with(&[("", 1, 55, "neighbor")]);

        match resolve(&store, "", 1, 50) {
            ResolveOutcome::Found { snapshot, tier } => {
                assert_eq!(snapshot.message_id, 55);
                assert_eq!(tier, ResolveTier::NearbyAnyScope);
            }
            ResolveOutcome::NotFound => panic!("expected nearby hit"),
        }
    }

    #[test]
    fn test_nearby_bounded_by_radius() {
        let store = store_with(&[("", 1, 55, "neighbor")]);
        let outcome = Resolver::new(&store)
            .with_radius(3)
            .resolve("", 1, 50)
            .unwrap();
        assert!(matches!(outcome, ResolveOutcome::NotFound));
    }

    #[test]
    fn test_scoped_nearby_precedes_unscoped() {
        let store = store_with(&[("S", 1, 57, "scoped far"), ("", 1, 51, "plain close")]);

        // With a scope supplied, tier 3 runs before tier 4 even when the
        // unscoped row is closer.
        match resolve(&store, "S", 1, 50) {
            ResolveOutcome::Found { snapshot, tier } => {
                assert_eq!(snapshot.text, "scoped far");
                assert_eq!(tier, ResolveTier::NearbyScoped);
            }
            ResolveOutcome::NotFound => panic!("expected scoped nearby hit"),
        }
    }

    #[test]
    fn test_equal_distance_is_deterministic() {
        let store = store_with(&[("", 1, 48, "lower"), ("", 1, 52, "upper")]);

        for _ in 0..5 {
            let snap = resolve(&store, "", 1, 50).into_snapshot().unwrap();
            assert_eq!(snap.message_id, 48);
        }
    }

    #[test]
    fn test_total_miss_is_not_found() {
        let store = store_with(&[]);
        let outcome = resolve(&store, "S", 9, 999);
        assert!(matches!(outcome, ResolveOutcome::NotFound));
    }

    #[test]
    fn test_found_but_empty_is_distinct_from_miss() {
        let store = store_with(&[("", 1, 50, "")]);
        let snap = resolve(&store, "", 1, 50).into_snapshot().unwrap();
        assert_eq!(snap.text, "");
    }
}
