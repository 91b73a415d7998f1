use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// CPython runtime version representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionId {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub prerelease: Option<String>,
}

impl VersionId {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    /// Attach a pre-release tag (e.g. "rc1", "b2") to the version
    pub fn with_prerelease<T: Into<String>>(mut self, prerelease: T) -> Self {
        let prerelease = prerelease.into();
        if prerelease.is_empty() {
            self.prerelease = None;
        } else {
            self.prerelease = Some(prerelease);
        }
        self
    }

    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(prerelease) = &self.prerelease {
            write!(f, "{}", prerelease)?;
        }
        Ok(())
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Pre-release sorts before the same numeric release without one.
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Split a numeric component from an optional glued pre-release suffix,
/// e.g. "7rc1" -> (7, Some("rc1")).
fn split_component(raw: &str, full: &str) -> crate::error::Result<(u32, Option<String>)> {
    let digits_end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, suffix) = raw.split_at(digits_end);

    let number = digits
        .parse::<u32>()
        .map_err(|_| crate::error::PyvmError::InvalidVersion(full.to_string()))?;

    if suffix.is_empty() {
        return Ok((number, None));
    }

    // Suffix must be lowercase letters followed by digits, no separator.
    let letters_end = suffix
        .find(|c: char| !c.is_ascii_lowercase())
        .unwrap_or(suffix.len());
    let (letters, tag_digits) = suffix.split_at(letters_end);
    if letters.is_empty()
        || tag_digits.is_empty()
        || !tag_digits.chars().all(|c| c.is_ascii_digit())
    {
        return Err(crate::error::PyvmError::InvalidVersion(full.to_string()));
    }

    Ok((number, Some(suffix.to_string())))
}

impl FromStr for VersionId {
    type Err = crate::error::PyvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();

        if parts.len() < 2 || parts.len() > 3 {
            return Err(crate::error::PyvmError::InvalidVersion(s.to_string()));
        }

        let major = parts[0]
            .parse::<u32>()
            .map_err(|_| crate::error::PyvmError::InvalidVersion(s.to_string()))?;

        let (minor, patch, prerelease) = if parts.len() == 2 {
            // Patch omitted: defaults to 0, suffix may ride on the minor part.
            let (minor, prerelease) = split_component(parts[1], trimmed)?;
            (minor, 0, prerelease)
        } else {
            let minor = parts[1]
                .parse::<u32>()
                .map_err(|_| crate::error::PyvmError::InvalidVersion(s.to_string()))?;
            let (patch, prerelease) = split_component(parts[2], trimmed)?;
            (minor, patch, prerelease)
        };

        Ok(VersionId {
            major,
            minor,
            patch,
            prerelease,
        })
    }
}
