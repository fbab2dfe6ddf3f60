//! Supported geographies and their naming conventions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A market with its own trained model bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Geography {
    France,
    Spain,
    Germany,
}

impl Geography {
    /// All geographies, in the order the dashboard queries them.
    pub const ALL: [Geography; 3] = [Geography::France, Geography::Germany, Geography::Spain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Geography::France => "France",
            Geography::Spain => "Spain",
            Geography::Germany => "Germany",
        }
    }

    /// Localized country name shown in dashboard tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            Geography::France => "Франция",
            Geography::Spain => "Испания",
            Geography::Germany => "Германия",
        }
    }

    /// File stem of the persisted bundle, e.g. `model_france`.
    pub fn bundle_stem(&self) -> &'static str {
        match self {
            Geography::France => "model_france",
            Geography::Spain => "model_spain",
            Geography::Germany => "model_germany",
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no supported geography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGeography(pub String);

impl FromStr for Geography {
    type Err = UnknownGeography;

    /// Exact match on the wire value; no case folding.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "France" => Ok(Geography::France),
            "Spain" => Ok(Geography::Spain),
            "Germany" => Ok(Geography::Germany),
            other => Err(UnknownGeography(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported() {
        assert_eq!("France".parse::<Geography>(), Ok(Geography::France));
        assert_eq!("Spain".parse::<Geography>(), Ok(Geography::Spain));
        assert_eq!("Germany".parse::<Geography>(), Ok(Geography::Germany));
    }

    #[test]
    fn test_parse_rejects_unknown_and_case_variants() {
        assert_eq!(
            "Italy".parse::<Geography>(),
            Err(UnknownGeography("Italy".to_string()))
        );
        assert!("france".parse::<Geography>().is_err());
        assert!(" France".parse::<Geography>().is_err());
    }

    #[test]
    fn test_bundle_stems() {
        let stems: Vec<&str> = Geography::ALL.iter().map(|g| g.bundle_stem()).collect();
        assert_eq!(stems, vec!["model_france", "model_germany", "model_spain"]);
    }
}
