//! Structured identifiers for proposals and results.
//!
//! A proposal is written by a match function under its pending key
//! `proposal.<timestamp>.<matchObjectID>.<profileID>`. Evaluation renames it to
//! the result key `<matchObjectID>.<profileID>`, which is also the form used on
//! the pending-profiles queue to request a match.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Leading segment marking a key as pending evaluation.
pub const PROPOSAL_PREFIX: &str = "proposal";

const SEPARATOR: char = '.';

fn check_component(kind: &'static str, value: &str, component: &str) -> Result<()> {
    if component.is_empty() {
        return Err(Error::invalid_id(kind, value, "empty component"));
    }
    if component.contains(SEPARATOR) {
        return Err(Error::invalid_id(
            kind,
            value,
            format!("component '{}' contains '{}'", component, SEPARATOR),
        ));
    }
    Ok(())
}

/// Final identity of a match: the key callers poll for results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResultId {
    pub match_object_id: String,
    pub profile_id: String,
}

impl ResultId {
    pub fn new(match_object_id: impl Into<String>, profile_id: impl Into<String>) -> Result<Self> {
        let id = Self {
            match_object_id: match_object_id.into(),
            profile_id: profile_id.into(),
        };
        let rendered = id.to_string();
        check_component("result", &rendered, &id.match_object_id)?;
        check_component("result", &rendered, &id.profile_id)?;
        Ok(id)
    }

    /// Pending proposal key for a worker run started at `timestamp`.
    pub fn proposal_id(&self, timestamp: i64) -> ProposalId {
        ProposalId {
            timestamp,
            match_object_id: self.match_object_id.clone(),
            profile_id: self.profile_id.clone(),
        }
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.match_object_id, SEPARATOR, self.profile_id)
    }
}

impl FromStr for ResultId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        match parts.as_slice() {
            [mo, profile] => Self::new(*mo, *profile),
            _ => Err(Error::invalid_id(
                "result",
                s,
                format!("expected 2 segments, found {}", parts.len()),
            )),
        }
    }
}

/// Identity of a proposal awaiting evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId {
    pub timestamp: i64,
    pub match_object_id: String,
    pub profile_id: String,
}

impl ProposalId {
    pub fn new(
        timestamp: i64,
        match_object_id: impl Into<String>,
        profile_id: impl Into<String>,
    ) -> Result<Self> {
        let result = ResultId::new(match_object_id, profile_id)?;
        Ok(result.proposal_id(timestamp))
    }

    /// The key this proposal is renamed to once evaluated.
    pub fn result_id(&self) -> ResultId {
        ResultId {
            match_object_id: self.match_object_id.clone(),
            profile_id: self.profile_id.clone(),
        }
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{prefix}{sep}{ts}{sep}{mo}{sep}{profile}",
            prefix = PROPOSAL_PREFIX,
            sep = SEPARATOR,
            ts = self.timestamp,
            mo = self.match_object_id,
            profile = self.profile_id,
        )
    }
}

impl FromStr for ProposalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        let [prefix, ts, mo, profile] = parts.as_slice() else {
            return Err(Error::invalid_id(
                "proposal",
                s,
                format!("expected 4 segments, found {}", parts.len()),
            ));
        };
        if *prefix != PROPOSAL_PREFIX {
            return Err(Error::invalid_id(
                "proposal",
                s,
                format!("missing '{}' prefix", PROPOSAL_PREFIX),
            ));
        }
        let timestamp = ts
            .parse::<i64>()
            .map_err(|e| Error::invalid_id("proposal", s, format!("bad timestamp: {}", e)))?;
        Self::new(timestamp, *mo, *profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_id_display() {
        let id = ProposalId::new(1700000000, "mo1", "ranked").unwrap();
        assert_eq!(id.to_string(), "proposal.1700000000.mo1.ranked");
        assert_eq!(id.result_id().to_string(), "mo1.ranked");
    }

    #[test]
    fn test_proposal_id_parse() {
        let id: ProposalId = "proposal.42.abc.casual".parse().unwrap();
        assert_eq!(id.timestamp, 42);
        assert_eq!(id.match_object_id, "abc");
        assert_eq!(id.profile_id, "casual");
    }

    #[test]
    fn test_proposal_id_rejects_bad_shapes() {
        assert!("abc.casual".parse::<ProposalId>().is_err());
        assert!("result.42.abc.casual".parse::<ProposalId>().is_err());
        assert!("proposal.notanumber.abc.casual".parse::<ProposalId>().is_err());
        assert!("proposal.42..casual".parse::<ProposalId>().is_err());
        assert!("proposal.42.abc.casual.extra".parse::<ProposalId>().is_err());
    }

    #[test]
    fn test_result_id_parse() {
        let id: ResultId = "abc.casual".parse().unwrap();
        assert_eq!(id.match_object_id, "abc");
        assert_eq!(id.profile_id, "casual");
        assert_eq!(id.proposal_id(7).to_string(), "proposal.7.abc.casual");
    }

    #[test]
    fn test_result_id_rejects_bad_shapes() {
        assert!("abc".parse::<ResultId>().is_err());
        assert!("a.b.c".parse::<ResultId>().is_err());
        assert!(".casual".parse::<ResultId>().is_err());
        assert!(ResultId::new("a.b", "c").is_err());
    }
}
