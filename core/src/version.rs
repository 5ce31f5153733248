//! Semantic version progression.
//!
//! Parses release tags such as `v1.2.3`, `1.2.3-rc.2` or describe-style
//! strings like `v1.8.58-5-g98e9b2b`, and computes the next tag for a
//! requested [`Bump`].
//!
//! # Examples
//!
//! ```
//! use dvc_core::next_version;
//!
//! assert_eq!(next_version("v1.2.3", "").unwrap(), "v1.2.4");
//! assert_eq!(next_version("1.2.3", "major").unwrap(), "2.0.0");
//! assert_eq!(next_version("v1.2.3", "alpha").unwrap(), "v1.3.0-alpha.1");
//! assert!(next_version("1.2.3-rc.1", "beta").is_err());
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static CORE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("version core regex"));

static ALPHA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-alpha\.([0-9]+)").expect("alpha regex"));
static BETA_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-beta\.([0-9]+)").expect("beta regex"));
static RC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-rc\.([0-9]+)").expect("rc regex"));

/// Errors produced while parsing or advancing a version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The requested transition kind is not one of the known names.
    #[error("invalid version type: {0}")]
    InvalidKind(String),
    /// The input is not `[v]MAJOR.MINOR.PATCH` with an optional `-…` tail.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    /// The transition would move a pre-release backwards (e.g. rc → beta).
    #[error("regressive tagging: cannot move from {from} to {to}")]
    RegressiveTransition {
        from: PreReleaseKind,
        to: PreReleaseKind,
    },
    /// A numeric component would exceed `u64::MAX`.
    #[error("version component overflow")]
    Overflow,
}

/// Pre-release channel, ordered `Alpha < Beta < Rc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseKind {
    Alpha,
    Beta,
    Rc,
}

impl PreReleaseKind {
    /// All kinds, lowest first.
    pub const ALL: [PreReleaseKind; 3] = [Self::Alpha, Self::Beta, Self::Rc];

    /// Tag name as it appears in a version string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::Alpha => &ALPHA_PATTERN,
            Self::Beta => &BETA_PATTERN,
            Self::Rc => &RC_PATTERN,
        }
    }
}

impl fmt::Display for PreReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-release tag such as `-beta.3`. `number` is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    pub kind: PreReleaseKind,
    pub number: u64,
}

/// Requested version transition.
///
/// The empty kind is not a `Bump`; [`next_version`] treats it as "infer
/// from the input" via [`Version::default_bump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bump {
    Major,
    Minor,
    Patch,
    Alpha,
    Beta,
    Rc,
    Release,
}

impl From<PreReleaseKind> for Bump {
    fn from(kind: PreReleaseKind) -> Self {
        match kind {
            PreReleaseKind::Alpha => Self::Alpha,
            PreReleaseKind::Beta => Self::Beta,
            PreReleaseKind::Rc => Self::Rc,
        }
    }
}

impl FromStr for Bump {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            "rc" => Ok(Self::Rc),
            "release" => Ok(Self::Release),
            _ => Err(VersionError::InvalidKind(s.to_string())),
        }
    }
}

/// A parsed `[v]MAJOR.MINOR.PATCH[-kind.N]` version.
///
/// The `v` prefix is carried through [`Display`](fmt::Display) but is
/// ignored by equality and ordering. A release sorts above any pre-release
/// of the same numbers.
///
/// # Examples
///
/// ```
/// use dvc_core::{Bump, Version};
///
/// let rc: Version = "1.2.3-rc.2".parse().unwrap();
/// let release = rc.bump(Bump::Release).unwrap();
/// assert_eq!(release.to_string(), "1.2.3");
/// assert!(release > rc);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub prefixed: bool,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<PreRelease>,
}

impl Version {
    /// Creates a release version without a `v` prefix.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            prefixed: false,
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// Counter of the given pre-release channel, 0 when not on it.
    pub fn pre_release_number(&self, kind: PreReleaseKind) -> u64 {
        self.pre
            .filter(|pre| pre.kind == kind)
            .map_or(0, |pre| pre.number)
    }

    /// Transition used when no kind is requested: continue the current
    /// pre-release channel, otherwise bump the patch.
    pub fn default_bump(&self) -> Bump {
        self.pre.map_or(Bump::Patch, |pre| pre.kind.into())
    }

    /// Returns the version that follows `self` under `bump`.
    ///
    /// # Errors
    ///
    /// [`VersionError::RegressiveTransition`] when asking for a lower
    /// pre-release channel than the current one, and
    /// [`VersionError::Overflow`] when a component cannot be incremented.
    pub fn bump(&self, bump: Bump) -> Result<Version, VersionError> {
        let mut next = *self;
        match bump {
            Bump::Major => {
                next.major = increment(self.major)?;
                next.minor = 0;
                next.patch = 0;
                next.pre = None;
            }
            Bump::Minor => {
                next.minor = increment(self.minor)?;
                next.patch = 0;
                next.pre = None;
            }
            Bump::Patch => {
                next.patch = increment(self.patch)?;
                next.pre = None;
            }
            Bump::Release => next.pre = None,
            Bump::Alpha => return self.advance_pre_release(PreReleaseKind::Alpha),
            Bump::Beta => return self.advance_pre_release(PreReleaseKind::Beta),
            Bump::Rc => return self.advance_pre_release(PreReleaseKind::Rc),
        }
        Ok(next)
    }

    fn advance_pre_release(&self, kind: PreReleaseKind) -> Result<Version, VersionError> {
        let mut next = *self;
        match self.pre {
            Some(current) if current.kind > kind => {
                return Err(VersionError::RegressiveTransition {
                    from: current.kind,
                    to: kind,
                });
            }
            Some(_) => {}
            None => {
                next.minor = increment(self.minor)?;
                next.patch = 0;
            }
        }
        next.pre = Some(PreRelease {
            kind,
            number: increment(self.pre_release_number(kind))?,
        });
        Ok(next)
    }
}

fn increment(value: u64) -> Result<u64, VersionError> {
    value.checked_add(1).ok_or(VersionError::Overflow)
}

/// Extracts a `-kind.N` counter from `input`.
///
/// Returns `input` truncated before the tag (dropping any trailing `-…`)
/// together with `N`, or `(input, 0)` when the tag is absent.
///
/// # Errors
///
/// [`VersionError::InvalidFormat`] when `N` does not fit in a `u64`.
///
/// # Examples
///
/// ```
/// use dvc_core::{PreReleaseKind, parse_pre_release};
///
/// assert_eq!(
///     parse_pre_release("0.4.0-rc.2-1-gfd4c000", PreReleaseKind::Rc).unwrap(),
///     ("0.4.0", 2)
/// );
/// assert_eq!(
///     parse_pre_release("0.4.0", PreReleaseKind::Beta).unwrap(),
///     ("0.4.0", 0)
/// );
/// ```
pub fn parse_pre_release(input: &str, kind: PreReleaseKind) -> Result<(&str, u64), VersionError> {
    let Some(tag) = kind.pattern().find(input) else {
        return Ok((input, 0));
    };
    // Skip the leading `-` and the `.` after the kind name.
    let digits = &tag.as_str()[kind.as_str().len() + 2..];
    let number = digits
        .parse::<u64>()
        .map_err(|_| VersionError::InvalidFormat(input.to_string()))?;
    Ok((&input[..tag.start()], number))
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let lowered = input.to_ascii_lowercase();
        let (prefixed, body) = match lowered.strip_prefix('v') {
            Some(rest) => (true, rest),
            None => (false, lowered.as_str()),
        };

        // Every channel is read from the full string; when several are
        // present the highest one wins.
        let mut pre: Option<PreRelease> = None;
        for kind in PreReleaseKind::ALL {
            let (_, number) = parse_pre_release(body, kind)?;
            if number > 0 {
                pre = pre.max(Some(PreRelease { kind, number }));
            }
        }

        let core = body.split('-').next().unwrap_or(body);
        if !CORE_PATTERN.is_match(core) {
            return Err(VersionError::InvalidFormat(input.to_string()));
        }

        let numbers = core
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::InvalidFormat(input.to_string()))?;
        let [major, minor, patch] = numbers[..] else {
            return Err(VersionError::InvalidFormat(input.to_string()));
        };

        Ok(Self {
            prefixed,
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefixed {
            f.write_str("v")?;
        }
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.pre {
            write!(f, "-{}.{}", pre.kind, pre.number)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre, other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

/// Computes the next version string for `input` under the transition
/// named by `kind`.
///
/// An empty `kind` infers the transition from the input (see
/// [`Version::default_bump`]). The `v` prefix is reproduced iff the input
/// carried it.
///
/// # Errors
///
/// [`VersionError::InvalidKind`] for an unknown `kind`,
/// [`VersionError::InvalidFormat`] when `input` is not a version, and
/// [`VersionError::RegressiveTransition`] for backwards pre-release moves.
pub fn next_version(input: &str, kind: &str) -> Result<String, VersionError> {
    let requested = if kind.is_empty() {
        None
    } else {
        Some(kind.parse::<Bump>()?)
    };
    let version: Version = input.parse()?;
    let bump = requested.unwrap_or_else(|| version.default_bump());
    Ok(version.bump(bump)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infers_patch_and_keeps_prefix() {
        assert_eq!(next_version("v1.2.3", "").unwrap(), "v1.2.4");
    }

    #[test]
    fn test_major_resets_lower_components() {
        assert_eq!(next_version("1.2.3", "major").unwrap(), "2.0.0");
        assert_eq!(next_version("1.2.3-beta.2", "major").unwrap(), "2.0.0");
    }

    #[test]
    fn test_minor_and_patch() {
        assert_eq!(next_version("1.2.3", "minor").unwrap(), "1.3.0");
        assert_eq!(next_version("1.2.3-rc.1", "patch").unwrap(), "1.2.4");
    }

    #[test]
    fn test_uppercase_input_without_dot_is_not_a_counter() {
        assert_eq!(next_version("v1.2.3-RC1", "rc").unwrap(), "v1.3.0-rc.1");
    }

    #[test]
    fn test_release_drops_suffix() {
        assert_eq!(next_version("1.2.3-rc.2", "release").unwrap(), "1.2.3");
        assert_eq!(next_version("v0.9.1-alpha.7", "release").unwrap(), "v0.9.1");
        assert_eq!(next_version("1.2.3", "release").unwrap(), "1.2.3");
    }

    #[test]
    fn test_alpha_from_release_bumps_minor() {
        assert_eq!(next_version("v1.2.3", "alpha").unwrap(), "v1.3.0-alpha.1");
        assert_eq!(next_version("1.3.0-alpha.1", "alpha").unwrap(), "1.3.0-alpha.2");
    }

    #[test]
    fn test_beta_after_alpha_keeps_numbers() {
        assert_eq!(next_version("0.2.0-alpha.4", "beta").unwrap(), "0.2.0-beta.1");
        assert_eq!(next_version("0.2.0-beta.1", "").unwrap(), "0.2.0-beta.2");
    }

    #[test]
    fn test_rc_after_beta_keeps_numbers() {
        assert_eq!(next_version("0.2.0-beta.3", "rc").unwrap(), "0.2.0-rc.1");
        assert_eq!(next_version("0.2.0-rc.1", "").unwrap(), "0.2.0-rc.2");
        assert_eq!(next_version("0.2.0", "rc").unwrap(), "0.3.0-rc.1");
    }

    #[test]
    fn test_describe_suffixes_are_tolerated() {
        assert_eq!(next_version("v1.8.58-5-g98e9b2b", "").unwrap(), "v1.8.59");
        assert_eq!(next_version("0.4.0-rc.2-1-gfd4c000", "patch").unwrap(), "0.4.1");
        assert_eq!(next_version("0.4.0-rc.2-1-gfd4c000", "").unwrap(), "0.4.0-rc.3");
    }

    #[test]
    fn test_regressive_transitions() {
        assert!(matches!(
            next_version("1.2.3-beta.1", "alpha"),
            Err(VersionError::RegressiveTransition {
                from: PreReleaseKind::Beta,
                to: PreReleaseKind::Alpha
            })
        ));
        assert!(matches!(
            next_version("1.2.3-rc.1", "alpha"),
            Err(VersionError::RegressiveTransition { .. })
        ));
        assert!(matches!(
            next_version("1.2.3-rc.1", "beta"),
            Err(VersionError::RegressiveTransition { .. })
        ));
    }

    #[test]
    fn test_invalid_kind() {
        assert_eq!(
            next_version("1.2.3", "gamma"),
            Err(VersionError::InvalidKind("gamma".into()))
        );
    }

    #[test]
    fn test_invalid_format() {
        for input in ["", "1.2", "1.2.x", "version1.2.3", "vv1.2.3", "1.2.3.4"] {
            assert!(
                matches!(next_version(input, ""), Err(VersionError::InvalidFormat(_))),
                "expected invalid format for {input:?}"
            );
        }
    }

    #[test]
    fn test_oversized_component_is_invalid_format() {
        assert!(matches!(
            next_version("1.2.99999999999999999999", "patch"),
            Err(VersionError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_oversized_counter_is_invalid_format() {
        assert!(matches!(
            next_version("1.2.3-rc.99999999999999999999", ""),
            Err(VersionError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_pre_release("1.2.3-beta.99999999999999999999", PreReleaseKind::Beta),
            Err(VersionError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_non_ascii_digits_are_not_counters() {
        assert_eq!(next_version("1.2.3-rc.\u{0661}", "").unwrap(), "1.2.4");
        assert_eq!(
            parse_pre_release("1.2.3-alpha.\u{0663}", PreReleaseKind::Alpha).unwrap(),
            ("1.2.3-alpha.\u{0663}", 0)
        );
        assert!(matches!(
            next_version("1.\u{0662}.3", "patch"),
            Err(VersionError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_increment_overflow() {
        let input = format!("1.2.{}", u64::MAX);
        assert_eq!(next_version(&input, "patch"), Err(VersionError::Overflow));
    }

    #[test]
    fn test_multiple_tags_take_highest_channel() {
        let version: Version = "1.2.3-alpha.1-beta.2".parse().unwrap();
        assert_eq!(
            version.pre,
            Some(PreRelease {
                kind: PreReleaseKind::Beta,
                number: 2
            })
        );
        assert_eq!(next_version("1.2.3-alpha.1-beta.2", "").unwrap(), "1.2.3-beta.3");
    }

    #[test]
    fn test_zero_counter_is_absent() {
        let version: Version = "1.2.3-rc.0".parse().unwrap();
        assert_eq!(version.pre, None);
    }

    #[test]
    fn test_parse_pre_release_truncates_tail() {
        assert_eq!(
            parse_pre_release("1.0.0-beta.12-3-gabc", PreReleaseKind::Beta).unwrap(),
            ("1.0.0", 12)
        );
        assert_eq!(
            parse_pre_release("1.0.0-beta12", PreReleaseKind::Beta).unwrap(),
            ("1.0.0-beta12", 0)
        );
    }

    #[test]
    fn test_ordering() {
        let parse = |s: &str| s.parse::<Version>().unwrap();
        assert!(parse("1.2.3") > parse("1.2.3-rc.9"));
        assert!(parse("1.2.3-rc.1") > parse("1.2.3-beta.9"));
        assert!(parse("1.2.3-beta.1") > parse("1.2.3-alpha.9"));
        assert!(parse("1.2.3-alpha.2") > parse("1.2.3-alpha.1"));
        assert!(parse("1.2.4-alpha.1") > parse("1.2.3"));
        assert_eq!(parse("v1.2.3"), parse("1.2.3"));
    }

    #[test]
    fn test_serde_as_string() {
        let version: Version = "v2.0.0-rc.1".parse().unwrap();
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"v2.0.0-rc.1\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), "v2.0.0-rc.1");
        assert!(serde_json::from_str::<Version>("\"nope\"").is_err());
    }

    #[test]
    fn test_bump_kind_parsing_is_case_insensitive() {
        assert_eq!("RC".parse::<Bump>().unwrap(), Bump::Rc);
        assert_eq!("Release".parse::<Bump>().unwrap(), Bump::Release);
    }
}
