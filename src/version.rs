//! Minimal npm-style version range checks.
//!
//! Supported expressions:
//!
//! | Expression | Meaning |
//! |------------|---------|
//! | `1.2.3` | exact version |
//! | `^1.2.3` | `>=1.2.3 <2.0.0` |
//! | `~1.2.3` | `>=1.2.3 <1.3.0` |
//! | `>=1.0.0 <2.0.0` | every space-separated comparator must hold |
//!
//! Matching against compromised lists is exact; this is a standalone helper.

use semver::Version;

/// Parses a version, tolerating a leading `v` and missing minor/patch parts.
fn parse_version(raw: &str) -> Option<Version> {
    let raw = raw.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }

    let mut parts = raw.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}

fn comparator_holds(installed: &Version, token: &str) -> Option<bool> {
    let holds = if let Some(rest) = token.strip_prefix(">=") {
        *installed >= parse_version(rest)?
    } else if let Some(rest) = token.strip_prefix('>') {
        *installed > parse_version(rest)?
    } else if let Some(rest) = token.strip_prefix("<=") {
        *installed <= parse_version(rest)?
    } else if let Some(rest) = token.strip_prefix('<') {
        *installed < parse_version(rest)?
    } else if let Some(rest) = token.strip_prefix("==") {
        *installed == parse_version(rest)?
    } else if let Some(rest) = token.strip_prefix('=') {
        *installed == parse_version(rest)?
    } else {
        *installed == parse_version(token)?
    };
    Some(holds)
}

/// Returns true when `installed` falls inside `expr`.
///
/// Unparseable versions or expressions never match. When a tilde base's
/// minor is at the numeric limit its bound is the next major; a bound that
/// cannot be represented at all is left open.
pub fn satisfies(installed: &str, expr: &str) -> bool {
    let Some(installed) = parse_version(installed) else {
        return false;
    };
    let expr = expr.trim();

    if let Some(base) = expr.strip_prefix('^') {
        return parse_version(base).is_some_and(|base| {
            let upper = base.major.checked_add(1).map(|major| Version::new(major, 0, 0));
            installed >= base && upper.is_none_or(|upper| installed < upper)
        });
    }

    if let Some(base) = expr.strip_prefix('~') {
        return parse_version(base).is_some_and(|base| {
            let upper = match base.minor.checked_add(1) {
                Some(minor) => Some(Version::new(base.major, minor, 0)),
                None => base.major.checked_add(1).map(|major| Version::new(major, 0, 0)),
            };
            installed >= base && upper.is_none_or(|upper| installed < upper)
        });
    }

    let tokens: Vec<&str> = expr.split_whitespace().collect();
    if tokens.is_empty() {
        return false;
    }
    tokens
        .iter()
        .all(|token| comparator_holds(&installed, token).unwrap_or(false))
}
