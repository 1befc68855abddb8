use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// The label holding the address of a target.
pub const ADDRESS_LABEL: &str = "__address__";

/// A set of labels, ordered by name.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns the union of both sets, values of `other` win when the same
    /// name shows up in both.
    pub fn merge(mut self, other: LabelSet) -> LabelSet {
        self.0.extend(other.0);
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        LabelSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One element of the array returned by the discovery endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawDiscoveryEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub targets: Vec<String>,

    /// Labels in document order, repeated names are kept so the merge
    /// decides which value survives.
    #[serde(default, deserialize_with = "ordered_labels")]
    pub labels: Vec<(String, String)>,
}

/// Decode a response body. A `null` body is an empty response and a `null`
/// entry is an entry without targets or labels.
pub fn decode(body: &[u8]) -> Result<Vec<RawDiscoveryEntry>, serde_json::Error> {
    let entries = serde_json::from_slice::<Option<Vec<Option<RawDiscoveryEntry>>>>(body)?;

    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn ordered_labels<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<(String, String)>, D::Error> {
    Ok(Option::<OrderedPairs>::deserialize(deserializer)?
        .map(|pairs| pairs.0)
        .unwrap_or_default())
}

struct OrderedPairs(Vec<(String, String)>);

impl<'de> Deserialize<'de> for OrderedPairs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = OrderedPairs;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of label names to label values")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or_default());
                while let Some(pair) = map.next_entry::<String, String>()? {
                    pairs.push(pair);
                }
                Ok(OrderedPairs(pairs))
            }
        }

        deserializer.deserialize_map(Visitor)
    }
}

/// TargetGroup is a set of targets with common labels.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetGroup {
    /// An identifier of the group, unique within one poll response.
    pub source: String,

    /// Each target is a label set holding at least the address label.
    pub targets: Vec<LabelSet>,

    /// Labels common across all targets in the group.
    pub labels: LabelSet,
}

impl TargetGroup {
    /// Addresses of all targets, in order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.targets
            .iter()
            .filter_map(|target| target.get(ADDRESS_LABEL))
    }
}

/// Converts the decoded response into target groups, the position of an
/// entry becomes the source of its group.
///
/// Addresses are passed through as they are, it's up to the consumer to
/// reject malformed ones.
pub fn build(raw: Vec<RawDiscoveryEntry>) -> Vec<TargetGroup> {
    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let targets = entry
                .targets
                .into_iter()
                .map(|addr| LabelSet::from_iter([(ADDRESS_LABEL, addr)]))
                .collect::<Vec<_>>();

            let labels = entry
                .labels
                .into_iter()
                .fold(LabelSet::new(), |acc, (name, value)| {
                    acc.merge(LabelSet::from_iter([(name, value)]))
                });

            TargetGroup {
                source: index.to_string(),
                targets,
                labels,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn decode(text: &str) -> Vec<RawDiscoveryEntry> {
        super::decode(text.as_bytes()).unwrap()
    }

    #[test]
    fn sources_follow_position() {
        let groups = build(decode(
            r#"[
                {"targets": ["a:1"]},
                {"targets": ["b:1"]},
                {"targets": ["c:1"]}
            ]"#,
        ));

        let sources = groups.iter().map(|g| g.source.as_str()).collect::<Vec<_>>();
        assert_eq!(sources, vec!["0", "1", "2"]);
    }

    #[test]
    fn one_label_set_per_target() {
        let groups = build(decode(r#"[{"targets": ["a:1", "b:2"]}]"#));

        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].targets,
            vec![
                LabelSet::from_iter([(ADDRESS_LABEL, "a:1")]),
                LabelSet::from_iter([(ADDRESS_LABEL, "b:2")]),
            ]
        );
        for target in &groups[0].targets {
            assert_eq!(target.len(), 1);
        }
    }

    #[test]
    fn last_label_wins() {
        let groups = build(decode(
            r#"[{"targets": [], "labels": {"env": "staging", "job": "node", "env": "prod"}}]"#,
        ));

        assert_eq!(groups[0].labels.get("env"), Some("prod"));
        assert_eq!(groups[0].labels.get("job"), Some("node"));
        assert_eq!(groups[0].labels.len(), 2);
    }

    #[test]
    fn merge_prefers_other() {
        let staging = LabelSet::from_iter([("env", "staging"), ("dc", "eu")]);
        let prod = LabelSet::from_iter([("env", "prod")]);

        let merged = staging.merge(prod);
        assert_eq!(merged, LabelSet::from_iter([("dc", "eu"), ("env", "prod")]));
    }

    #[test]
    fn empty_targets_keep_group() {
        let groups = build(decode(
            r#"[
                {"targets": [], "labels": {"env": "prod"}},
                {"labels": {"env": "dev"}},
                {"targets": null, "labels": null}
            ]"#,
        ));

        assert_eq!(groups.len(), 3);
        for group in &groups {
            assert!(group.targets.is_empty());
        }
        assert!(groups[2].labels.is_empty());
    }

    #[test]
    fn malformed_address_passes_through() {
        let groups = build(decode(r#"[{"targets": ["not an address", ""]}]"#));

        let addrs = groups[0].addresses().collect::<Vec<_>>();
        assert_eq!(addrs, vec!["not an address", ""]);
    }

    #[test]
    fn empty_response() {
        assert!(build(decode("[]")).is_empty());
    }

    #[test]
    fn schema_mismatch_rejected() {
        for text in [
            r#"{"targets": ["a:1"]}"#,
            r#"[{"targets": "a:1"}]"#,
            r#"[{"labels": {"env": 1}}]"#,
            r#"[{"targets": ["a:1"]"#,
        ] {
            assert!(super::decode(text.as_bytes()).is_err(), "{text}");
        }
    }

    #[test]
    fn null_body_is_empty() {
        assert!(build(decode("null")).is_empty());
        assert!(build(decode(" null\n")).is_empty());
    }

    #[test]
    fn null_entry_is_empty_group() {
        let groups = build(decode(r#"[null, {"targets": ["a:1"]}]"#));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].source, "0");
        assert!(groups[0].targets.is_empty());
        assert!(groups[0].labels.is_empty());
        assert_eq!(groups[1].addresses().collect::<Vec<_>>(), vec!["a:1"]);
    }
}
