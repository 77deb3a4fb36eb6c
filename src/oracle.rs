//! The `oracle` module decides whether a derived stake address counts as a
//! match, either against user-supplied target addresses or against the
//! Blockfrost chain oracle.
//!

use crate::{RecoveryError, RecoveryResult};
use std::thread::sleep;
use std::time::Duration;

/// The ellipsis that separates the prefix and suffix of an abbreviated target.
const ELLIPSIS: &str = "...";
/// The base URL of the Blockfrost mainnet API.
const BLOCKFROST_MAINNET_URL: &str = "https://cardano-mainnet.blockfrost.io/api/v0";
/// The number of attempts for a chain oracle query.
const ORACLE_ATTEMPTS: u32 = 3;
/// The initial backoff delay between oracle attempts.
const ORACLE_BACKOFF: Duration = Duration::from_secs(1);

/// A user-supplied target address, either literal or abbreviated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// The full address.
    Exact(String),
    /// An abbreviated address with the middle elided.
    Abbreviated {
        /// The part before the ellipsis.
        prefix: String,
        /// The part after the ellipsis.
        suffix: String,
    },
}

impl Target {
    /// The function parses a target address string.
    ///
    /// A string containing `...` is split into a prefix and a suffix;
    /// anything else is an exact address.
    ///
    /// * `target` - The target address string.
    pub fn parse(target: &str) -> Self {
        match target.find(ELLIPSIS) {
            Some(position) => Target::Abbreviated {
                prefix: target[..position].to_string(),
                suffix: target[position + ELLIPSIS.len()..].to_string(),
            },
            None => Target::Exact(target.to_string()),
        }
    }

    /// The function returns true if the given address matches the target.
    ///
    /// * `address` - The bech32 stake address.
    pub fn matches(&self, address: &str) -> bool {
        match self {
            Target::Exact(target) => address == target,
            Target::Abbreviated { prefix, suffix } => {
                address.len() >= prefix.len() + suffix.len()
                    && address.starts_with(prefix.as_str())
                    && address.ends_with(suffix.as_str())
            }
        }
    }
}

/// The reason why an address is reported as a match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchReason {
    /// The address matches the user target with the given index.
    UserTarget(usize),
    /// The chain oracle reports on-chain activity for the address.
    ChainActive,
    /// No targets and no oracle are configured; the address is printed.
    Printed,
}

/// The verdict for a derived address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The address is a match.
    Match(MatchReason),
    /// The address is not a match.
    NoMatch,
    /// The chain oracle could not be reached; the activity is unknown.
    UnknownActivity,
}

/// The activity reported by the chain oracle.
enum Activity {
    Active,
    Inactive,
    Unknown,
}

/// This struct queries the Blockfrost account endpoint.
pub struct BlockfrostClient {
    /// The HTTP agent.
    agent: ureq::Agent,
    /// The project API key.
    api_key: String,
    /// The base URL of the API.
    base_url: String,
}

impl BlockfrostClient {
    /// The function creates a client for the mainnet API.
    ///
    /// * `api_key` - The Blockfrost project key.
    pub fn new(api_key: &str) -> Self {
        BlockfrostClient::with_base_url(api_key, BLOCKFROST_MAINNET_URL)
    }

    /// The function creates a client for the given base URL.
    ///
    /// * `api_key` - The Blockfrost project key.
    /// * `base_url` - The base URL of the API.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        BlockfrostClient {
            agent,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The function performs a single account lookup.
    ///
    /// * `address` - The bech32 stake address.
    fn query(&self, address: &str) -> RecoveryResult<Activity> {
        let url = format!("{}/accounts/{}", self.base_url, address);
        match self.agent.get(&url).set("project_id", &self.api_key).call() {
            Ok(response) => {
                // A known account with a non-empty activity payload is active.
                let body = response
                    .into_string()
                    .map_err(|error| RecoveryError::OracleTransient(error.to_string()))?;
                if body.trim().is_empty() {
                    Ok(Activity::Inactive)
                } else {
                    Ok(Activity::Active)
                }
            }
            // An unknown account is simply inactive.
            Err(ureq::Error::Status(404, _)) => Ok(Activity::Inactive),
            // An authorization failure aborts the search.
            Err(ureq::Error::Status(status, _)) if status == 401 || status == 403 => {
                Err(RecoveryError::OracleAuth(format!(
                    "The chain oracle rejected the API key (status {}).",
                    status
                )))
            }
            // Everything else is transient.
            Err(error) => Err(RecoveryError::OracleTransient(error.to_string())),
        }
    }

    /// The function looks up the activity of an account, with retries.
    ///
    /// Transient failures are retried with exponential backoff; after the
    /// final attempt the activity is reported as unknown so that the search
    /// can continue.
    ///
    /// * `address` - The bech32 stake address.
    fn activity(&self, address: &str) -> RecoveryResult<Activity> {
        let mut backoff = ORACLE_BACKOFF;
        for attempt in 1..=ORACLE_ATTEMPTS {
            match self.query(address) {
                Ok(activity) => return Ok(activity),
                Err(RecoveryError::OracleTransient(_)) if attempt < ORACLE_ATTEMPTS => {
                    sleep(backoff);
                    backoff *= 2;
                }
                Err(RecoveryError::OracleTransient(_)) => return Ok(Activity::Unknown),
                Err(error) => return Err(error),
            }
        }
        Ok(Activity::Unknown)
    }
}

/// This struct classifies derived addresses.
///
/// User targets are checked first and short-circuit the chain oracle. If
/// neither targets nor an oracle are configured, every address is reported
/// as a match so that the search acts as a printer.
pub struct MatchOracle {
    /// The user-supplied targets.
    targets: Vec<Target>,
    /// The optional chain oracle.
    blockfrost: Option<BlockfrostClient>,
}

impl MatchOracle {
    /// The function creates a match oracle.
    ///
    /// * `targets` - The user-supplied targets.
    /// * `blockfrost` - The optional chain oracle client.
    pub fn new(targets: Vec<Target>, blockfrost: Option<BlockfrostClient>) -> Self {
        MatchOracle {
            targets,
            blockfrost,
        }
    }

    /// The function returns the number of distinct user targets.
    pub fn num_targets(&self) -> usize {
        self.targets.len()
    }

    /// The function returns true if a chain oracle is configured.
    pub fn has_chain_oracle(&self) -> bool {
        self.blockfrost.is_some()
    }

    /// The function classifies a derived address.
    ///
    /// * `address` - The bech32 stake address.
    pub fn classify(&self, address: &str) -> RecoveryResult<Verdict> {
        // User targets short-circuit the chain oracle.
        for (index, target) in self.targets.iter().enumerate() {
            if target.matches(address) {
                return Ok(Verdict::Match(MatchReason::UserTarget(index)));
            }
        }
        if let Some(client) = &self.blockfrost {
            return match client.activity(address)? {
                Activity::Active => Ok(Verdict::Match(MatchReason::ChainActive)),
                Activity::Inactive => Ok(Verdict::NoMatch),
                Activity::Unknown => Ok(Verdict::UnknownActivity),
            };
        }
        if self.targets.is_empty() {
            // Without targets and without an oracle, every candidate is reported.
            Ok(Verdict::Match(MatchReason::Printed))
        } else {
            Ok(Verdict::NoMatch)
        }
    }
}

// ******************************** TESTS ********************************

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "stake1u9t04dtwptk5776eluj6ruyd782k66npnf55tdrp6dvwnzs24r8yq";

    #[test]
    /// The function tests the parsing of target addresses.
    fn test_target_parsing() {
        assert_eq!(
            Target::parse(ADDRESS),
            Target::Exact(ADDRESS.to_string())
        );
        assert_eq!(
            Target::parse("stake1u9...24r8yq"),
            Target::Abbreviated {
                prefix: "stake1u9".to_string(),
                suffix: "24r8yq".to_string(),
            }
        );
    }

    #[test]
    /// The function tests exact target matching.
    fn test_exact_matching() {
        let target = Target::parse(ADDRESS);
        assert!(target.matches(ADDRESS));
        assert!(!target.matches("stake1u8p0gksk5e59v9h9vmqqlsyplevl30t6keu7u90fecsrg3sv33m94"));
    }

    #[test]
    /// The function tests abbreviated target matching.
    fn test_abbreviated_matching() {
        let target = Target::parse("stake1u9...24r8yq");
        assert!(target.matches(ADDRESS));
        // The prefix alone is not sufficient.
        assert!(!target.matches("stake1u9aaaaaa"));
        // The suffix alone is not sufficient.
        assert!(!target.matches("stake1u8aaaaaa24r8yq"));
        // The address must be long enough to hold both parts.
        let target = Target::parse("stake1u9t04...t04dtw");
        assert!(!target.matches("stake1u9t04dtw"));
    }

    #[test]
    /// The function tests that user targets are classified by index.
    fn test_classify_user_targets() {
        let oracle = MatchOracle::new(
            vec![
                Target::parse("stake1xxx...yyy"),
                Target::parse("stake1u9...24r8yq"),
            ],
            None,
        );
        assert_eq!(
            oracle.classify(ADDRESS).unwrap(),
            Verdict::Match(MatchReason::UserTarget(1))
        );
        assert_eq!(
            oracle.classify("stake1aaaa").unwrap(),
            Verdict::NoMatch
        );
    }

    #[test]
    /// The function tests the printer mode without targets and oracle.
    fn test_classify_printer_mode() {
        let oracle = MatchOracle::new(vec![], None);
        assert_eq!(
            oracle.classify(ADDRESS).unwrap(),
            Verdict::Match(MatchReason::Printed)
        );
    }
}
