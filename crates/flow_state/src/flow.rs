//! Flow identifiers

use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::fmt;

/// Name of a flow: the key of a step sequence in the registry.
///
/// Kept as a string so that documents naming a flow this build does not know
/// still load; the dispatcher then resets them to [`FlowName::MAIN_MENU`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowName(Cow<'static, str>);

impl FlowName {
    /// The default flow. Always registered, always valid at step 0.
    pub const MAIN_MENU: FlowName = FlowName::from_static("main_menu");

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FlowName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_static_and_owned_names_are_equal() {
        assert_eq!(FlowName::new("main_menu"), FlowName::MAIN_MENU);

        let mut map = HashMap::new();
        map.insert(FlowName::MAIN_MENU, 1);
        assert_eq!(map.get("main_menu"), Some(&1));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&FlowName::MAIN_MENU).unwrap();
        assert_eq!(json, "\"main_menu\"");
        let back: FlowName = serde_json::from_str("\"search\"").unwrap();
        assert_eq!(back.as_str(), "search");
    }
}
