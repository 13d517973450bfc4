//! Version parsing and total ordering for the bootstrapper.
//!
//! The versions this tool has to order are not quite SemVer 2.0: release
//! tags carry an optional fourth build segment (`2.57.1.456`) and a
//! prerelease suffix whose tag and build number are split on `.` after the
//! first `-` (`2.57.1.456-alpha.3`). The `semver` crate cannot represent
//! that shape, so parsing and comparison are implemented here.
//!
//! Two deliberate quirks are preserved from the upstream release history:
//!
//! - A release (no prerelease tag, prerelease build `"0"`) sorts *above*
//!   any prerelease of the same `major.minor.patch.build`.
//! - For equal prerelease names, a missing prerelease number sorts above a
//!   present one (`-pre` > `-pre2`).
//!
//! Equality is structural over all fields including the original text, so
//! `"1.0"` and `"1.0.0"` compare [`Ordering::Equal`] but are not `==`.
//! Because of that, the type exposes [`SemVer::compare`] instead of
//! implementing `Ord`.

use std::cmp::Ordering;

use anyhow::Result;

use crate::core::BootstrapError;

/// A prerelease tag parsed from the text after the first `-`.
///
/// The pattern is `^(letters)(digits?)$`: `"alpha"` has no number,
/// `"alpha3"` has number 3. Text that does not match the pattern yields no
/// prerelease at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreRelease {
    /// The raw text the tag was parsed from.
    pub origin: String,
    /// The alphabetic part of the tag.
    pub name: String,
    /// The trailing number, when present.
    pub number: Option<i64>,
}

impl PreRelease {
    /// Parse a prerelease tag, returning `None` when the text does not
    /// match `^(letters)(digits?)$`.
    pub fn parse(text: &str) -> Option<PreRelease> {
        if text.is_empty() {
            return None;
        }

        let digits_at = text.find(|c: char| c.is_ascii_digit()).unwrap_or(text.len());
        let (name, digits) = text.split_at(digits_at);

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let number = if digits.is_empty() { None } else { digits.parse::<i64>().ok() };

        Some(PreRelease {
            origin: text.to_string(),
            name: name.to_string(),
            number,
        })
    }

    /// Order by name, then by number with the inverted direction the
    /// upstream releases rely on: for equal names a missing number beats a
    /// present one.
    pub fn compare(&self, other: &PreRelease) -> Ordering {
        match self.name.cmp(&other.name) {
            Ordering::Equal => match (self.number, other.number) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            },
            ord => ord,
        }
    }
}

/// An immutable parsed version string.
///
/// The original text always round-trips through [`SemVer::original`];
/// missing numeric segments default to `0` and a missing build segment to
/// `"0"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Fourth version segment; kept as text because upstream tags have
    /// used non-numeric build metadata. Any further `.`-joined segments
    /// are folded in.
    pub build: String,
    pub pre_release: Option<PreRelease>,
    /// The piece after the `.` in the prerelease suffix, `"0"` when absent.
    pub pre_release_build: String,
    /// The exact text this value was parsed from.
    pub original: String,
}

impl SemVer {
    /// Parse a version string.
    ///
    /// Fails only when a *present* major/minor/patch segment is not a
    /// number; everything else is defaulted or carried verbatim.
    pub fn create(text: &str) -> Result<SemVer> {
        let trimmed = text.trim();
        let (version_part, pre_part) = match trimmed.split_once('-') {
            Some((v, p)) => (v, Some(p)),
            None => (trimmed, None),
        };

        let mut segments = version_part.split('.');
        let major = Self::numeric_segment(segments.next(), trimmed)?;
        let minor = Self::numeric_segment(segments.next(), trimmed)?;
        let patch = Self::numeric_segment(segments.next(), trimmed)?;

        let rest: Vec<&str> = segments.collect();
        let build = if rest.is_empty() { "0".to_string() } else { rest.join(".") };

        let (pre_release, pre_release_build) = match pre_part {
            Some(p) => {
                let mut pieces = p.splitn(2, '.');
                let tag = pieces.next().unwrap_or("");
                let pre_build = pieces.next().unwrap_or("0");
                (PreRelease::parse(tag), pre_build.to_string())
            }
            None => (None, "0".to_string()),
        };

        Ok(SemVer {
            major,
            minor,
            patch,
            build,
            pre_release,
            pre_release_build,
            original: text.to_string(),
        })
    }

    /// The lowest possible version, remembering the text it stands in for.
    ///
    /// Used when sorting candidates that may not parse: a bad candidate
    /// sorts below every valid version instead of aborting the sort.
    pub fn zero(original: &str) -> SemVer {
        SemVer {
            major: 0,
            minor: 0,
            patch: 0,
            build: "0".to_string(),
            pre_release: None,
            pre_release_build: "0".to_string(),
            original: original.to_string(),
        }
    }

    /// True when this version carries a prerelease suffix.
    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some() || self.pre_release_build != "0"
    }

    /// Strict total order over parsed fields.
    ///
    /// Compares major, minor, patch, then the build segment (numerically
    /// when both sides parse as integers, lexicographically otherwise),
    /// then prerelease status: a release outranks any prerelease of the
    /// same numeric version, prereleases order by tag then prerelease
    /// build.
    pub fn compare(&self, other: &SemVer) -> Ordering {
        let numeric = self
            .major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then(compare_build(&self.build, &other.build));
        if numeric != Ordering::Equal {
            return numeric;
        }

        let self_release = self.pre_release.is_none() && self.pre_release_build == "0";
        let other_release = other.pre_release.is_none() && other.pre_release_build == "0";
        match (self_release, other_release) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let tags = match (&self.pre_release, &other.pre_release) {
                    (Some(a), Some(b)) => a.compare(b),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                tags.then_with(|| self.pre_release_build.cmp(&other.pre_release_build))
            }
        }
    }

    fn numeric_segment(segment: Option<&str>, input: &str) -> Result<u32> {
        match segment {
            None | Some("") => Ok(0),
            Some(s) => s.parse::<u32>().map_err(|_| {
                BootstrapError::InvalidVersion {
                    input: input.to_string(),
                    reason: format!("segment '{s}' is not a number"),
                }
                .into()
            }),
        }
    }
}

/// Build segments compare numerically when both sides are integers,
/// lexicographically otherwise.
fn compare_build(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Pick the highest version among candidate strings, skipping candidates
/// that are empty or fail to parse. Returns the winning original string.
pub fn max_version<I, S>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut best: Option<SemVer> = None;
    for candidate in candidates {
        let text = candidate.as_ref();
        if text.is_empty() {
            continue;
        }
        if let Ok(parsed) = SemVer::create(text) {
            let better = match &best {
                None => true,
                Some(current) => parsed.compare(current) == Ordering::Greater,
            };
            if better {
                best = Some(parsed);
            }
        }
    }
    best.map(|v| v.original)
}

/// Prefix match used by up-to-date checks: a local file version
/// `"1.2.3.4"` satisfies a target of `"1.2.3"`. The boundary must fall on
/// a `.` so `"1.2.30"` does not satisfy `"1.2.3"`.
pub fn version_satisfies(local: &str, target: &str) -> bool {
    if local.is_empty() || target.is_empty() {
        return false;
    }
    local == target || local.starts_with(&format!("{target}."))
}
