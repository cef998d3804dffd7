pub mod json_path;
pub mod operation;
pub mod primitive;
pub mod version;

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "query",
            ParameterLocation::Path => "path",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }

    /// Capitalized form used in user-facing messages ("Query parameter 'x'…").
    pub fn label(&self) -> &'static str {
        match self {
            ParameterLocation::Query => "Query",
            ParameterLocation::Path => "Path",
            ParameterLocation::Header => "Header",
            ParameterLocation::Cookie => "Cookie",
        }
    }
}

impl Display for ParameterLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ParameterLocation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(ParameterLocation::Query),
            "path" => Ok(ParameterLocation::Path),
            "header" => Ok(ParameterLocation::Header),
            "cookie" => Ok(ParameterLocation::Cookie),
            _ => Err(()),
        }
    }
}

/// Cooperative cancellation flag checked between validation steps.
///
/// Cancelling does not roll anything back; caches that were partially
/// populated stay populated, which is safe because entries are pure functions
/// of immutable inputs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_location_round_trip() {
        for loc in [
            ParameterLocation::Query,
            ParameterLocation::Path,
            ParameterLocation::Header,
            ParameterLocation::Cookie,
        ] {
            assert_eq!(loc.as_str().parse::<ParameterLocation>().unwrap(), loc);
        }
        assert!("body".parse::<ParameterLocation>().is_err());
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
