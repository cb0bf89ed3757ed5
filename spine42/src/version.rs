//! Spine export version detection.

use crate::Error;

/// Export format revisions with distinct binary layouts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SpineVersion {
    V37,
    V38,
    /// 4.0 and 4.1 share one layout.
    V41,
    V42,
}

impl SpineVersion {
    /// Whether this crate's binary decoder understands the layout.
    pub fn is_supported(self) -> bool {
        self == Self::V42
    }
}

/// Maps an embedded version string (eg. `"4.2.43"`) to a format revision.
pub fn detect_spine_version(value: &str) -> Result<SpineVersion, Error> {
    let unsupported = || Error::UnsupportedVersion {
        value: value.to_string(),
    };
    let mut parts = value.trim().split('.');
    let major: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(unsupported)?;
    let minor: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(unsupported)?;
    match (major, minor) {
        (3, 7) => Ok(SpineVersion::V37),
        (3, 8) => Ok(SpineVersion::V38),
        (4, 0) | (4, 1) => Ok(SpineVersion::V41),
        (4, 2) => Ok(SpineVersion::V42),
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_known_revisions() {
        assert_eq!(detect_spine_version("3.7.94").unwrap(), SpineVersion::V37);
        assert_eq!(detect_spine_version("3.8.99").unwrap(), SpineVersion::V38);
        assert_eq!(detect_spine_version("4.0.64").unwrap(), SpineVersion::V41);
        assert_eq!(detect_spine_version("4.1.23").unwrap(), SpineVersion::V41);
        assert_eq!(detect_spine_version("4.2.43").unwrap(), SpineVersion::V42);
        assert!(SpineVersion::V42.is_supported());
        assert!(!SpineVersion::V38.is_supported());
        assert!(!SpineVersion::V41.is_supported());
    }

    #[test]
    fn rejects_unknown_or_malformed_versions() {
        for value in ["", "4", "4.x", "5.0.1", "2.1.27"] {
            assert!(matches!(
                detect_spine_version(value),
                Err(Error::UnsupportedVersion { .. })
            ));
        }
    }
}
