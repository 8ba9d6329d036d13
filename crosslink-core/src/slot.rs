use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The flat form of a graph: slot identifier to flattened record.
///
/// Each value is a JSON array (flattened sequence) or object (flattened
/// record) whose composite members are reference strings. A primitive root
/// is stored directly under `@0`.
pub type DumpTable = IndexMap<SlotId, serde_json::Value>;

/// Identifier of one entry of a dump table, written `@<n>`.
///
/// Slots are minted in discovery order during a dump; the root is always `@0`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u32);

impl SlotId {
    pub const ROOT: SlotId = SlotId(0);

    pub fn new(n: u32) -> Self {
        SlotId(n)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The slot minted after this one.
    pub fn next(self) -> Self {
        SlotId(self.0 + 1)
    }

    /// Parses the canonical form `@<n>`: no sign, no leading zeros, and a
    /// number that fits in a `u32`.
    pub fn parse(s: &str) -> Option<Self> {
        if !is_reference_shaped(s) {
            return None;
        }
        let digits = &s[1..];
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        digits.parse().ok().map(SlotId)
    }
}

/// Whether `s` looks like a reference: `@` followed by one or more ASCII
/// digits. Such a string is never plain data, even when it is not a valid
/// slot identifier.
pub(crate) fn is_reference_shaped(s: &str) -> bool {
    s.strip_prefix('@')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotId({})", self)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl Serialize for SlotId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SlotVisitor;

        impl serde::de::Visitor<'_> for SlotVisitor {
            type Value = SlotId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a slot identifier like \"@0\"")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                SlotId::parse(v)
                    .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_str(SlotVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reference_shapes() {
        assert_eq!(SlotId::parse("@0"), Some(SlotId::ROOT));
        assert_eq!(SlotId::parse("@12"), Some(SlotId::new(12)));
        assert_eq!(SlotId::parse("@"), None);
        assert_eq!(SlotId::parse("12"), None);
        assert_eq!(SlotId::parse("@1a"), None);
        assert_eq!(SlotId::parse("@-1"), None);
        assert_eq!(SlotId::parse(" @1"), None);
        assert_eq!(SlotId::parse("@99999999999999"), None);
    }

    #[test]
    fn parse_rejects_leading_zeros() {
        assert_eq!(SlotId::parse("@01"), None);
        assert_eq!(SlotId::parse("@00"), None);
        assert_eq!(SlotId::parse("@007"), None);
        assert_eq!(SlotId::parse("@10"), Some(SlotId::new(10)));
        assert!(serde_json::from_str::<SlotId>("\"@01\"").is_err());
    }

    #[test]
    fn reference_shape() {
        assert!(is_reference_shaped("@0"));
        assert!(is_reference_shaped("@01"));
        assert!(is_reference_shaped("@4294967296"));
        assert!(!is_reference_shaped("@"));
        assert!(!is_reference_shaped("@x"));
        assert!(!is_reference_shaped("a@1"));
    }

    #[test]
    fn display_and_next() {
        assert_eq!(SlotId::ROOT.to_string(), "@0");
        assert_eq!(SlotId::ROOT.next().next().to_string(), "@2");
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&SlotId::new(7)).unwrap();
        assert_eq!(json, "\"@7\"");
        let back: SlotId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SlotId::new(7));
        assert!(serde_json::from_str::<SlotId>("\"x7\"").is_err());
    }
}
