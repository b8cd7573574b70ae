use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RenewalError;

/// Longest accepted resource name, matching the DNS limit.
pub const MAX_RESOURCE_NAME_LEN: usize = 253;
/// Longest accepted single label between dots.
pub const MAX_LABEL_LEN: usize = 63;

/// Which notification threshold a delivery corresponds to.
///
/// The set is closed on purpose: delivery records are keyed by these tags,
/// so adding a variant changes the dedup key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntervalTag {
    #[serde(rename = "30-day")]
    ThirtyDay,
    #[serde(rename = "7-day")]
    SevenDay,
    #[serde(rename = "1-day")]
    OneDay,
    #[serde(rename = "post-expiry")]
    PostExpiry,
}

impl IntervalTag {
    /// Thresholds that map onto a tag. `PostExpiry` has no threshold; it is due
    /// whenever the resource has run out.
    pub const THRESHOLDS: [(i64, IntervalTag); 3] = [
        (30, IntervalTag::ThirtyDay),
        (7, IntervalTag::SevenDay),
        (1, IntervalTag::OneDay),
    ];

    /// Tag for an exact days-remaining threshold, if one exists.
    pub fn for_threshold(days: i64) -> Option<Self> {
        Self::THRESHOLDS
            .iter()
            .find(|(d, _)| *d == days)
            .map(|(_, tag)| *tag)
    }

    /// Days remaining this tag fires at. `None` for `PostExpiry`.
    pub fn threshold_days(&self) -> Option<i64> {
        Self::THRESHOLDS
            .iter()
            .find(|(_, tag)| tag == self)
            .map(|(d, _)| *d)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalTag::ThirtyDay => "30-day",
            IntervalTag::SevenDay => "7-day",
            IntervalTag::OneDay => "1-day",
            IntervalTag::PostExpiry => "post-expiry",
        }
    }
}

impl fmt::Display for IntervalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IntervalTag {
    type Err = RenewalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "30-day" => Ok(IntervalTag::ThirtyDay),
            "7-day" => Ok(IntervalTag::SevenDay),
            "1-day" => Ok(IntervalTag::OneDay),
            "post-expiry" => Ok(IntervalTag::PostExpiry),
            other => Err(RenewalError::UnknownInterval(other.to_string())),
        }
    }
}

/// How the post-expiry notice is keyed in delivery records.
///
/// `SharedWithFinalDay` reproduces a deployment where the expired notice and
/// the 1-day notice share one dedup key: whichever is delivered first
/// suppresses the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostExpiryKey {
    #[default]
    Distinct,
    SharedWithFinalDay,
}

impl PostExpiryKey {
    /// The tag a delivery for `tag` is recorded (and looked up) under.
    pub fn dedup_key(&self, tag: IntervalTag) -> IntervalTag {
        match (self, tag) {
            (PostExpiryKey::SharedWithFinalDay, IntervalTag::PostExpiry) => IntervalTag::OneDay,
            (_, tag) => tag,
        }
    }
}

/// A validated resource name: lowercase dot-separated labels of
/// `[a-z0-9-]`, no label starting or ending with a hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceName(String);

impl ResourceName {
    /// Normalise (trim + lowercase) and validate `raw`.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let name = raw.trim().to_ascii_lowercase();
        let invalid = |reason: &str| RenewalError::InvalidResourceName {
            name: raw.trim().to_string(),
            reason: reason.to_string(),
        };

        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.len() > MAX_RESOURCE_NAME_LEN {
            return Err(invalid("name is too long"));
        }
        for label in name.split('.') {
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(invalid("label is too long"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(invalid("labels cannot start or end with '-'"));
            }
            if !label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Err(invalid("only letters, digits and '-' are allowed"));
            }
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_through_str() {
        for tag in [
            IntervalTag::ThirtyDay,
            IntervalTag::SevenDay,
            IntervalTag::OneDay,
            IntervalTag::PostExpiry,
        ] {
            assert_eq!(tag.as_str().parse::<IntervalTag>().unwrap(), tag);
        }
        assert!("2-day".parse::<IntervalTag>().is_err());
    }

    #[test]
    fn tag_serializes_as_kebab_label() {
        let json = serde_json::to_string(&IntervalTag::SevenDay).unwrap();
        assert_eq!(json, r#""7-day""#);
    }

    #[test]
    fn thresholds_are_exact() {
        assert_eq!(IntervalTag::for_threshold(30), Some(IntervalTag::ThirtyDay));
        assert_eq!(IntervalTag::for_threshold(7), Some(IntervalTag::SevenDay));
        assert_eq!(IntervalTag::for_threshold(1), Some(IntervalTag::OneDay));
        assert_eq!(IntervalTag::for_threshold(29), None);
        assert_eq!(IntervalTag::for_threshold(0), None);
        assert_eq!(IntervalTag::PostExpiry.threshold_days(), None);
    }

    #[test]
    fn shared_policy_collapses_post_expiry_onto_one_day() {
        let shared = PostExpiryKey::SharedWithFinalDay;
        assert_eq!(shared.dedup_key(IntervalTag::PostExpiry), IntervalTag::OneDay);
        assert_eq!(shared.dedup_key(IntervalTag::SevenDay), IntervalTag::SevenDay);
        let distinct = PostExpiryKey::Distinct;
        assert_eq!(distinct.dedup_key(IntervalTag::PostExpiry), IntervalTag::PostExpiry);
    }

    #[test]
    fn resource_name_normalises_case() {
        let name = ResourceName::parse("  Alice.ETH ").unwrap();
        assert_eq!(name.as_str(), "alice.eth");
    }

    #[test]
    fn resource_name_rejects_malformed_input() {
        assert!(ResourceName::parse("").is_err());
        assert!(ResourceName::parse("alice..eth").is_err());
        assert!(ResourceName::parse("-alice.eth").is_err());
        assert!(ResourceName::parse("al ice.eth").is_err());
        assert!(ResourceName::parse(&"a".repeat(64)).is_err());
        let err = ResourceName::parse("bad_name").unwrap_err();
        assert!(err.is_input_error());
    }
}
