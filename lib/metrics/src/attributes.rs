use std::borrow::Cow;
use std::collections::BTreeMap;

/// A set of key-value pairs identifying one series of a `Metric`.
///
/// Keys are static, values can be owned, so things like a polled URL or a
/// status code can be used as values without leaking.
#[derive(Debug, Clone, Default, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Attributes(BTreeMap<&'static str, Cow<'static, str>>);

impl Attributes {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(key, value)| (*key, value.as_ref()))
    }

    /// Sets the given key, the previous value is replaced if any.
    pub fn insert(&mut self, key: &'static str, value: impl Into<Cow<'static, str>>) {
        assert_legal_key(key);
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(AsRef::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<&[(&'static str, &'static str); N]> for Attributes {
    fn from(pairs: &[(&'static str, &'static str); N]) -> Self {
        let mut attrs = Attributes::default();
        for (key, value) in pairs {
            attrs.insert(key, Cow::Borrowed(*value));
        }
        attrs
    }
}

impl<const N: usize> From<[(&'static str, Cow<'static, str>); N]> for Attributes {
    fn from(pairs: [(&'static str, Cow<'static, str>); N]) -> Self {
        let mut attrs = Attributes::default();
        for (key, value) in pairs {
            attrs.insert(key, value);
        }
        attrs
    }
}

/// Panics unless the key matches `[a-z_][0-9a-z_]*`
pub(crate) fn assert_legal_key(s: &str) {
    assert!(!s.is_empty(), "key must not be empty");
    assert!(
        !s.starts_with(|c: char| c.is_ascii_digit()),
        "key must not start with a digit, got: \"{s}\""
    );
    assert!(
        s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='z' | '_')),
        "key must be [0-9a-z_]+ got: \"{s}\""
    )
}
