// src/models/frontier.rs

//! Frontier categories: the "hot" id lists a crawl can be seeded from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A list of current ids published by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frontier {
    Top,
    New,
    Best,
    Ask,
    Show,
    Job,
}

impl Frontier {
    /// Endpoint path relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Frontier::Top => "topstories.json",
            Frontier::New => "newstories.json",
            Frontier::Best => "beststories.json",
            Frontier::Ask => "askstories.json",
            Frontier::Show => "showstories.json",
            Frontier::Job => "jobstories.json",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frontier::Top => "top",
            Frontier::New => "new",
            Frontier::Best => "best",
            Frontier::Ask => "ask",
            Frontier::Show => "show",
            Frontier::Job => "job",
        }
    }

    pub fn all() -> [Frontier; 6] {
        [
            Frontier::Top,
            Frontier::New,
            Frontier::Best,
            Frontier::Ask,
            Frontier::Show,
            Frontier::Job,
        ]
    }
}

impl fmt::Display for Frontier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frontier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frontier::all()
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::validation(format!("unknown frontier category '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frontier() {
        assert_eq!("top".parse::<Frontier>().unwrap(), Frontier::Top);
        assert_eq!(" Show ".parse::<Frontier>().unwrap(), Frontier::Show);
        assert!("hot".parse::<Frontier>().is_err());
    }

    #[test]
    fn test_frontier_paths() {
        assert_eq!(Frontier::Ask.path(), "askstories.json");
        assert_eq!(Frontier::Job.path(), "jobstories.json");
    }
}
