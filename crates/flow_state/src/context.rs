//! Per-step scratch context
//!
//! A `Context` belongs to exactly one state node. Pushing a flow hands the new
//! node its own value, so nothing a child step writes is visible to the parent
//! once the child is popped.

use band_core::{MediaRef, MessageId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of an ad-hoc context field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Flag(bool),
    Number(i64),
    Text(String),
    TextList(Vec<String>),
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Flag(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Number(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(value: Vec<String>) -> Self {
        ContextValue::TextList(value)
    }
}

impl From<RecordId> for ContextValue {
    fn from(value: RecordId) -> Self {
        ContextValue::Text(value.to_string())
    }
}

/// One option shown to the user: an id and the label it was shown with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub label: String,
}

impl Listing {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// Pagination cursor.
///
/// `token` fetched the page on screen (`None` for the first page), `next`
/// fetches the one after it, and `previous` links back to the cursor of the
/// page before, so going back needs no walk from the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Box<PageToken>>,
}

impl PageToken {
    pub fn first(next: Option<String>) -> Self {
        Self {
            token: None,
            next,
            previous: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// 1-based page number.
    pub fn number(&self) -> usize {
        1 + self.previous.as_ref().map_or(0, |p| p.number())
    }

    /// Cursor of the following page, given the host's `next` token for it.
    /// `None` on the last page.
    pub fn followed_by(self, next: Option<String>) -> Option<Self> {
        let token = self.next.clone()?;
        Some(Self {
            token: Some(token),
            next,
            previous: Some(Box::new(self)),
        })
    }

    /// Cursor of the page before. `None` on the first page.
    pub fn back(self) -> Option<Self> {
        self.previous.map(|previous| *previous)
    }
}

/// Scratch space of one state node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Currently selected item id(s).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected: Vec<String>,

    /// Bot messages to remove once the flow moves on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retract: Vec<MessageId>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, ContextValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<PageToken>,

    /// Options shown by the last prompt, for resolving the user's pick.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listing: Vec<Listing>,

    /// Media captured outside the normal step order (voice notes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Context::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_media(mut self, media: MediaRef) -> Self {
        self.media = Some(media);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.fields.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.fields.remove(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(ContextValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn number(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(ContextValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(ContextValue::Flag(true)))
    }

    pub fn text_list(&self, key: &str) -> &[String] {
        match self.fields.get(key) {
            Some(ContextValue::TextList(list)) => list,
            _ => &[],
        }
    }

    /// A record id stored with [`Context::set`].
    pub fn record_id(&self, key: &str) -> Option<RecordId> {
        self.text(key).and_then(|text| text.parse().ok())
    }

    /// Replace the shown options and clear the selection they supersede.
    pub fn show_listing(&mut self, listing: Vec<Listing>) {
        self.listing = listing;
        self.selected.clear();
    }

    pub fn listing_by_id(&self, id: &str) -> Option<&Listing> {
        self.listing.iter().find(|entry| entry.id == id)
    }

    /// Case-insensitive match on the shown label.
    pub fn listing_by_label(&self, label: &str) -> Option<&Listing> {
        let label = label.trim();
        self.listing
            .iter()
            .find(|entry| entry.label.eq_ignore_ascii_case(label))
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.selected = vec![id.into()];
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.first().map(String::as_str)
    }

    /// Remember a prompt message for later retraction.
    pub fn track(&mut self, message: MessageId) {
        if !self.retract.contains(&message) {
            self.retract.push(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_accessors() {
        let id = RecordId::new();
        let mut ctx = Context::new()
            .with("name", "Sunday service")
            .with("count", 3i64)
            .with("confirmed", true)
            .with("song_id", id)
            .with("parts", vec!["Alto".to_string(), "Bass".to_string()]);

        assert_eq!(ctx.text("name"), Some("Sunday service"));
        assert_eq!(ctx.number("count"), Some(3));
        assert!(ctx.flag("confirmed"));
        assert!(!ctx.flag("missing"));
        assert_eq!(ctx.record_id("song_id"), Some(id));
        assert_eq!(ctx.text_list("parts").len(), 2);

        ctx.remove("name");
        assert_eq!(ctx.text("name"), None);
    }

    #[test]
    fn test_untagged_values_round_trip() {
        let ctx = Context::new()
            .with("flag", false)
            .with("n", -4i64)
            .with("list", vec!["a".to_string()]);
        let json = serde_json::to_string(&ctx).unwrap();
        let back: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_empty_context_serializes_compactly() {
        assert_eq!(serde_json::to_string(&Context::new()).unwrap(), "{}");
    }

    #[test]
    fn test_page_token_links() {
        let first = PageToken::first(Some("t2".to_string()));
        assert_eq!(first.number(), 1);
        assert!(!first.has_previous());

        let second = first.clone().followed_by(Some("t3".to_string())).unwrap();
        assert_eq!(second.token.as_deref(), Some("t2"));
        assert_eq!(second.number(), 2);

        let third = second.clone().followed_by(None).unwrap();
        assert!(!third.has_next());
        assert!(third.clone().followed_by(None).is_none());

        assert_eq!(third.back().unwrap(), second);
        assert!(first.back().is_none());
    }

    #[test]
    fn test_listing_lookup_and_tracking() {
        let mut ctx = Context::new();
        ctx.select("old");
        ctx.show_listing(vec![Listing::new("1", "Amazing Grace")]);
        assert!(ctx.selected.is_empty());
        assert_eq!(ctx.listing_by_label("amazing grace").map(|l| l.id.as_str()), Some("1"));
        assert!(ctx.listing_by_id("2").is_none());

        ctx.track(MessageId(5));
        ctx.track(MessageId(5));
        assert_eq!(ctx.retract, vec![MessageId(5)]);
    }
}
