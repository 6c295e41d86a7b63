//! Content store records
//!
//! These are the documents the content store keeps for a band: its songs,
//! the members using the bot, rehearsal events and recorded voice parts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::hosting::FileRef;
use crate::ids::{RecordId, UserId};
use crate::message::MediaRef;

/// A record kept in a [`Collection`](crate::store::Collection).
pub trait Record: Clone + Send + Sync + 'static {
    /// Collection name, used in logs and error messages.
    const KIND: &'static str;

    fn id(&self) -> RecordId;

    /// Whether the record satisfies every filter of `query` that applies to
    /// this kind of record. Filters that do not apply are ignored.
    fn matches(&self, query: &Query) -> bool;

    /// Sort key used by list queries.
    fn sort_key(&self) -> String;
}

/// Filter for [`Collection::find`](crate::store::Collection::find).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub band_id: Option<RecordId>,
    /// Owning record, e.g. the song of a voice part.
    pub parent_id: Option<RecordId>,
    pub member: Option<UserId>,
    /// Case-insensitive substring of the record's display name.
    pub text: Option<String>,
    /// Hosting file id of a song.
    pub file_id: Option<String>,
    /// Earliest event date, inclusive.
    pub from_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn band(mut self, band_id: RecordId) -> Self {
        self.band_id = Some(band_id);
        self
    }

    pub fn parent(mut self, parent_id: RecordId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn member(mut self, user_id: UserId) -> Self {
        self.member = Some(user_id);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn from_date(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn text_matches(&self, name: &str) -> bool {
        match &self.text {
            Some(text) => name.to_lowercase().contains(&text.trim().to_lowercase()),
            None => true,
        }
    }
}

fn same<T: PartialEq>(filter: &Option<T>, value: &T) -> bool {
    filter.as_ref().map_or(true, |f| f == value)
}

fn same_opt<T: PartialEq>(filter: &Option<T>, value: &Option<T>) -> bool {
    match filter {
        Some(f) => value.as_ref() == Some(f),
        None => true,
    }
}

/// A song: a sheet-music document on the file host plus cached metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_id: Option<RecordId>,
    pub file: FileRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
}

impl Song {
    pub fn from_file(file: FileRef, band_id: Option<RecordId>) -> Self {
        Self {
            id: RecordId::new(),
            band_id,
            file,
            key: None,
            bpm: None,
            time_signature: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }
}

impl Record for Song {
    const KIND: &'static str = "songs";

    fn id(&self) -> RecordId {
        self.id
    }

    fn matches(&self, query: &Query) -> bool {
        same_opt(&query.band_id, &self.band_id)
            && same(&query.file_id, &self.file.id)
            && query.text_matches(&self.file.name)
    }

    fn sort_key(&self) -> String {
        self.file.name.to_lowercase()
    }
}

/// A band: the group whose songs and events the members share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub admin_ids: Vec<UserId>,
}

impl Band {
    pub fn new(name: impl Into<String>, admin: UserId) -> Self {
        Self {
            id: RecordId::new(),
            name: name.into(),
            admin_ids: vec![admin],
        }
    }
}

impl Record for Band {
    const KIND: &'static str = "bands";

    fn id(&self) -> RecordId {
        self.id
    }

    fn matches(&self, query: &Query) -> bool {
        query.member.map_or(true, |m| self.admin_ids.contains(&m)) && query.text_matches(&self.name)
    }

    fn sort_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// A bot user and the band they currently work in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: RecordId,
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band_id: Option<RecordId>,
}

impl Member {
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            name: name.into(),
            band_id: None,
        }
    }
}

impl Record for Member {
    const KIND: &'static str = "members";

    fn id(&self) -> RecordId {
        self.id
    }

    fn matches(&self, query: &Query) -> bool {
        same(&query.member, &self.user_id)
            && same_opt(&query.band_id, &self.band_id)
            && query.text_matches(&self.name)
    }

    fn sort_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// A rehearsal or service the band prepares a setlist for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: RecordId,
    pub band_id: RecordId,
    pub name: String,
    pub date: NaiveDate,
    /// Setlist, in performance order.
    #[serde(default)]
    pub song_ids: Vec<RecordId>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

impl Event {
    pub fn new(band_id: RecordId, name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: RecordId::new(),
            band_id,
            name: name.into(),
            date,
            song_ids: Vec::new(),
            created_by: None,
        }
    }

    /// Heading shown in lists, e.g. `2024-05-12 Sunday service`.
    pub fn title(&self) -> String {
        format!("{} {}", self.date.format("%Y-%m-%d"), self.name)
    }
}

impl Record for Event {
    const KIND: &'static str = "events";

    fn id(&self) -> RecordId {
        self.id
    }

    fn matches(&self, query: &Query) -> bool {
        same(&query.band_id, &self.band_id)
            && query.from_date.map_or(true, |from| self.date >= from)
            && query.text_matches(&self.name)
    }

    fn sort_key(&self) -> String {
        self.title().to_lowercase()
    }
}

/// A recorded part (soprano, bass line, ...) attached to a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: RecordId,
    pub song_id: RecordId,
    pub name: String,
    pub media: MediaRef,
}

impl Voice {
    pub fn new(song_id: RecordId, name: impl Into<String>, media: MediaRef) -> Self {
        Self {
            id: RecordId::new(),
            song_id,
            name: name.into(),
            media,
        }
    }
}

impl Record for Voice {
    const KIND: &'static str = "voices";

    fn id(&self) -> RecordId {
        self.id
    }

    fn matches(&self, query: &Query) -> bool {
        same(&query.parent_id, &self.song_id) && query.text_matches(&self.name)
    }

    fn sort_key(&self) -> String {
        self.name.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> FileRef {
        FileRef::new(format!("file-{name}"), name)
    }

    #[test]
    fn test_song_query_filters() {
        let band = RecordId::new();
        let song = Song::from_file(file("Amazing Grace"), Some(band));

        assert!(song.matches(&Query::new().text("grace")));
        assert!(song.matches(&Query::new().band(band).file("file-Amazing Grace")));
        assert!(!song.matches(&Query::new().band(RecordId::new())));
        assert!(!song.matches(&Query::new().text("holy")));
    }

    #[test]
    fn test_event_from_date_is_inclusive() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 12).unwrap();
        let event = Event::new(RecordId::new(), "Service", date);

        assert!(event.matches(&Query::new().from_date(date)));
        assert!(!event.matches(&Query::new().from_date(date.succ_opt().unwrap())));
        assert_eq!(event.title(), "2024-05-12 Service");
    }

    #[test]
    fn test_unrelated_filters_are_ignored() {
        let voice = Voice::new(RecordId::new(), "Alto", MediaRef::new("tg-file"));
        assert!(voice.matches(&Query::new().from_date(NaiveDate::MIN)));
    }
}
