//! Unit-name allocation and operator-identifier resolution.
//!
//! Allocation probes the live registry for the first free `ww-<slug>[-N]`
//! name. Resolution classifies an arbitrary operator token into one of three
//! shapes (exact unit name, numeric PID, friendly name) and maps it to
//! exactly one live unit. Classification order is load-bearing: a token that
//! already looks like a unit name is never re-read as a friendly name, and
//! vice versa. Both are uncached linear scans; the service set can change
//! between listing and use, and correctness-over-staleness is the accepted
//! trade.

use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::slug::{friendly_name, looks_like_unit_name, normalize_unit_name, unit_name_from_slug};

/// Finds the first unused unit name for `base_slug` by probing the registry:
/// no suffix first, then `-2`, `-3`, and so on. Bounded in practice by the
/// registry size; only a registry-lookup failure propagates.
///
/// Allocation and the later create call are not atomic across the RPC
/// boundary; a concurrent allocator can take the same name in between. Known
/// limitation, resolved by the create call's own conflict behavior.
pub async fn allocate_unit_name<R: Registry>(base_slug: &str, registry: &R) -> Result<String> {
    let mut attempt = 1u64;
    loop {
        let candidate = if attempt == 1 {
            unit_name_from_slug(base_slug)
        } else {
            unit_name_from_slug(&format!("{base_slug}-{attempt}"))
        };
        if !registry.unit_exists(&candidate).await? {
            debug!(unit = %candidate, attempt, "allocated unit name");
            return Ok(candidate);
        }
        attempt += 1;
    }
}

/// Resolves an operator-supplied token to a live unit name.
///
/// Rules, first match wins:
/// 1. Exact-name shape (carries the extension or the prefix): normalize and
///    probe; absent means [`Error::UnitNotFound`]. Friendly-name collisions
///    are ignored entirely.
/// 2. Numeric shape: match against each live unit's main PID; no match means
///    [`Error::NoMatch`].
/// 3. Anything else is a friendly name, matched case-sensitively against the
///    derived friendly names of all live units: zero matches is
///    [`Error::NoMatch`], two or more is [`Error::AmbiguousName`] carrying
///    every colliding unit name.
pub async fn resolve_identifier<R: Registry>(token: &str, registry: &R) -> Result<String> {
    if looks_like_unit_name(token) {
        let unit = normalize_unit_name(token);
        if registry.unit_exists(&unit).await? {
            return Ok(unit);
        }
        return Err(Error::UnitNotFound(unit));
    }

    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        let pid: u32 = token
            .parse()
            .map_err(|_| Error::NoMatch(token.to_string()))?;
        for listing in registry.list_units().await? {
            let status = match registry.unit_status(&listing.name).await {
                Ok(status) => status,
                // A unit can vanish between listing and probing; skip it.
                Err(_) => continue,
            };
            if status.main_pid == pid && pid != 0 {
                return Ok(listing.name);
            }
        }
        return Err(Error::NoMatch(token.to_string()));
    }

    let mut matches = Vec::new();
    for listing in registry.list_units().await? {
        if friendly_name(&listing.name) == token {
            matches.push(listing.name);
        }
    }
    match matches.len() {
        0 => Err(Error::NoMatch(token.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::AmbiguousName {
            name: token.to_string(),
            candidates: matches,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testutil::MemoryRegistry;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    #[test]
    fn allocator_skips_taken_names() {
        let registry = MemoryRegistry::new();
        let run = rt();
        assert_eq!(
            run.block_on(allocate_unit_name("foo", &registry)).unwrap(),
            "ww-foo.service"
        );

        registry.insert_with_pid("ww-foo.service", 10);
        assert_eq!(
            run.block_on(allocate_unit_name("foo", &registry)).unwrap(),
            "ww-foo-2.service"
        );

        registry.insert_with_pid("ww-foo-2.service", 11);
        assert_eq!(
            run.block_on(allocate_unit_name("foo", &registry)).unwrap(),
            "ww-foo-3.service"
        );
    }

    #[test]
    fn exact_name_shape_wins_and_probes_verbatim() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-foo.service", 10);
        // A different unit whose friendly name equals the raw token must not
        // interfere with exact-shape resolution.
        registry.insert_with_pid("ww-ww-foo.service", 11);
        let run = rt();

        assert_eq!(
            run.block_on(resolve_identifier("ww-foo.service", &registry))
                .unwrap(),
            "ww-foo.service"
        );
        assert_eq!(
            run.block_on(resolve_identifier("ww-foo", &registry)).unwrap(),
            "ww-foo.service"
        );
        assert!(matches!(
            run.block_on(resolve_identifier("ww-missing", &registry)),
            Err(Error::UnitNotFound(name)) if name == "ww-missing.service"
        ));
    }

    #[test]
    fn numeric_token_matches_pid() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-a.service", 41);
        registry.insert_with_pid("ww-b.service", 42);
        let run = rt();

        assert_eq!(
            run.block_on(resolve_identifier("42", &registry)).unwrap(),
            "ww-b.service"
        );
        assert!(matches!(
            run.block_on(resolve_identifier("43", &registry)),
            Err(Error::NoMatch(t)) if t == "43"
        ));
    }

    #[test]
    fn numeric_zero_never_matches_stopped_units() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-a.service", 0);
        let run = rt();
        assert!(matches!(
            run.block_on(resolve_identifier("0", &registry)),
            Err(Error::NoMatch(_))
        ));
    }

    #[test]
    fn friendly_name_resolution_and_ambiguity() {
        let registry = MemoryRegistry::new();
        registry.insert_with_pid("ww-worker.service", 10);
        registry.insert_with_pid("ww-api.service", 11);
        let run = rt();

        assert_eq!(
            run.block_on(resolve_identifier("api", &registry)).unwrap(),
            "ww-api.service"
        );
        assert!(matches!(
            run.block_on(resolve_identifier("missing", &registry)),
            Err(Error::NoMatch(_))
        ));

        // Both of these derive the friendly name "worker".
        registry.insert_with_pid("ww-worker", 12);
        match run.block_on(resolve_identifier("worker", &registry)) {
            Err(Error::AmbiguousName { name, candidates }) => {
                assert_eq!(name, "worker");
                assert_eq!(
                    candidates,
                    vec!["ww-worker.service".to_string(), "ww-worker".to_string()]
                );
            }
            other => panic!("expected AmbiguousName, got {other:?}"),
        }
    }
}
