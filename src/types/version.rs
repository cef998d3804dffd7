use jsonschema::Draft;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The OpenAPI dialect the document declares. 3.0.x validates against JSON
/// Schema Draft 4 and keeps the `nullable` keyword; 3.1.x validates against
/// Draft 2020-12 where `nullable` no longer exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiVersion {
    V30x,
    V31x,
}

impl FromStr for OpenApiVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("3.1") {
            Ok(OpenApiVersion::V31x)
        } else if s.starts_with("3.0") {
            Ok(OpenApiVersion::V30x)
        } else {
            Err(VersionError::Unsupported(s.to_string()))
        }
    }
}

impl OpenApiVersion {
    pub(crate) fn get_draft(&self) -> Draft {
        match self {
            OpenApiVersion::V30x => Draft::Draft4,
            OpenApiVersion::V31x => Draft::Draft202012,
        }
    }

    /// Whether the dialect still carries the `nullable` keyword. 3.1+
    /// documents using it fail schema compilation with a pointed diagnostic.
    pub(crate) fn supports_nullable(&self) -> bool {
        matches!(self, OpenApiVersion::V30x)
    }
}

impl Display for OpenApiVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenApiVersion::V30x => write!(f, "3.0.x"),
            OpenApiVersion::V31x => write!(f, "3.1.x"),
        }
    }
}

#[derive(Debug)]
pub enum VersionError {
    Unsupported(String),
}

impl Display for VersionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionError::Unsupported(version) => write!(
                f,
                "Provided version '{}' does not match either 3.1.x or 3.0.x",
                version
            ),
        }
    }
}

impl std::error::Error for VersionError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("3.0.2".parse::<OpenApiVersion>().unwrap(), OpenApiVersion::V30x);
        assert_eq!("3.1.0".parse::<OpenApiVersion>().unwrap(), OpenApiVersion::V31x);
        assert!("2.0".parse::<OpenApiVersion>().is_err());
        assert!("4.0.0".parse::<OpenApiVersion>().is_err());
    }

    #[test]
    fn test_nullable_support() {
        assert!(OpenApiVersion::V30x.supports_nullable());
        assert!(!OpenApiVersion::V31x.supports_nullable());
    }
}
