//! Slug derivation and the fixed unit-name shape.
//!
//! Every managed service is named `ww-<slug>[-N].service`. The slug is derived
//! from the file or directory the operator pointed at; the prefix and
//! extension let us recognize our own units in the registry and strip back to
//! a friendly name for display.

/// Fixed prefix for every managed unit.
pub const UNIT_PREFIX: &str = "ww-";
/// Fixed extension for every managed unit.
pub const UNIT_SUFFIX: &str = ".service";

/// Lower-cases `name`, replaces runs of characters outside `[a-z0-9._-]` with
/// a single hyphen, collapses repeated hyphens, and strips leading/trailing
/// hyphens. Total: empty input yields empty output.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.trim().chars().flat_map(char::to_lowercase) {
        let keep = ch.is_ascii_lowercase()
            || ch.is_ascii_digit()
            || matches!(ch, '.' | '_' | '-');
        if keep && ch != '-' {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// Wraps a slug in the full unit-name shape. Idempotent on names that already
/// carry the extension.
pub fn unit_name_from_slug(slug: &str) -> String {
    if slug.ends_with(UNIT_SUFFIX) {
        return slug.to_string();
    }
    format!("{UNIT_PREFIX}{slug}{UNIT_SUFFIX}")
}

/// Strips the fixed prefix and extension, yielding the operator-facing name.
pub fn friendly_name(unit: &str) -> String {
    let mut name = unit;
    if let Some(stripped) = name.strip_suffix(UNIT_SUFFIX) {
        name = stripped;
    }
    if let Some(stripped) = name.strip_prefix(UNIT_PREFIX) {
        name = stripped;
    }
    name.to_string()
}

/// Shape test shared by the identifier resolver and the command router: a
/// token already carrying the extension, or starting with the prefix, is
/// treated as a unit name and never as a friendly name or subcommand.
pub fn looks_like_unit_name(token: &str) -> bool {
    token.ends_with(UNIT_SUFFIX) || token.starts_with(UNIT_PREFIX)
}

/// Appends the extension if absent. Used after the shape test.
pub fn normalize_unit_name(token: &str) -> String {
    if token.ends_with(UNIT_SUFFIX) {
        token.to_string()
    } else {
        format!("{token}{UNIT_SUFFIX}")
    }
}

/// True if every managed unit filter would accept this registry entry.
pub fn is_managed_unit(unit: &str) -> bool {
    unit.starts_with(UNIT_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("My Cool App"), "my-cool-app");
        assert_eq!(slugify("  --weird__NAME--  "), "weird__name");
        assert_eq!(slugify("a///b"), "a-b");
        assert_eq!(slugify("v1.2.3"), "v1.2.3");
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_is_idempotent() {
        for input in ["Hello World", "a--b", "Ünïcödé", "x.y_z-9"] {
            let once = slugify(input);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn slugify_output_shape() {
        for input in ["Some App!", "__main__", "trailing-", "-leading"] {
            let slug = slugify(input);
            assert!(!slug.starts_with('-') && !slug.ends_with('-'), "{slug}");
            assert!(!slug.contains("--"), "{slug}");
            assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c)));
        }
    }

    #[test]
    fn unit_name_round_trip() {
        assert_eq!(unit_name_from_slug("foo"), "ww-foo.service");
        assert_eq!(unit_name_from_slug("ww-foo.service"), "ww-foo.service");
        assert_eq!(friendly_name("ww-foo.service"), "foo");
        assert_eq!(friendly_name("ww-foo-2.service"), "foo-2");
    }

    #[test]
    fn unit_shape_test() {
        assert!(looks_like_unit_name("ww-foo.service"));
        assert!(looks_like_unit_name("ww-foo"));
        assert!(looks_like_unit_name("other.service"));
        assert!(!looks_like_unit_name("foo"));
        assert!(!looks_like_unit_name("42"));
        assert_eq!(normalize_unit_name("ww-foo"), "ww-foo.service");
    }
}
