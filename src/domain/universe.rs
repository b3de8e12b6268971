//! Instrument universe for a scan run.
//!
//! The universe preserves the order the provider lists instruments in; the
//! scanner walks it in that order and the report keeps discovery order.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub code: String,
    pub name: String,
}

impl Instrument {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Universe {
    instruments: Vec<Instrument>,
}

impl Universe {
    /// Builds a universe from a provider listing. Blank codes are dropped and
    /// the first occurrence of a repeated code wins.
    pub fn from_listing(listing: Vec<Instrument>) -> Self {
        let mut seen = HashSet::new();
        let instruments = listing
            .into_iter()
            .filter(|i| !i.code.trim().is_empty())
            .filter(|i| seen.insert(i.code.clone()))
            .collect();
        Self { instruments }
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn count(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Keeps only the listed codes, in universe order. Codes the provider
    /// does not list are returned separately.
    pub fn restrict(self, codes: &[String]) -> (Universe, Vec<String>) {
        let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();
        let missing = codes
            .iter()
            .filter(|c| !self.instruments.iter().any(|i| &i.code == *c))
            .cloned()
            .collect();
        let instruments = self
            .instruments
            .into_iter()
            .filter(|i| wanted.contains(i.code.as_str()))
            .collect();
        (Universe { instruments }, missing)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_string();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}
