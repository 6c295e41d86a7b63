//! End-to-end tests of the band assistant flows

use async_trait::async_trait;
use band_core::{
    Band, Body, Callback, ChatId, Event, FileHosting, FileRef, HostingError, InboundEvent,
    Keyboard, MediaRef, Member, MessageId, Messenger, OutboundMessage, Query, SearchPage,
    Services, Song, TransportError, UserId,
};
use band_flows::{labels, names, registry};
use bytes::Bytes;
use chrono::{Duration, Local};
use flow_engine::{DispatchOutcome, Dispatcher};
use flow_state::{FlowName, Session};
use session_store::{MemorySessionStorage, SessionManager};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

const USER: UserId = UserId(7);

// ========== Collaborators ==========

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<OutboundMessage>>,
    next_id: AtomicI32,
}

impl RecordingMessenger {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|message| message.text_body().map(str::to_string))
            .collect()
    }

    fn last_text(&self) -> String {
        self.texts().pop().unwrap_or_default()
    }

    /// Id of the latest message that carried inline buttons.
    fn last_keyboard(&self) -> MessageId {
        let sent = self.sent.lock().unwrap();
        let index = sent
            .iter()
            .rposition(|message| matches!(message.keyboard, Keyboard::Inline(_)))
            .expect("no inline keyboard was sent");
        MessageId(index as i32 + 1)
    }

    fn documents(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|message| match &message.body {
                Body::Document { name, content } => {
                    Some((name.clone(), String::from_utf8_lossy(content).into_owned()))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, _chat: ChatId, message: OutboundMessage) -> Result<MessageId, TransportError> {
        self.sent.lock().unwrap().push(message);
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn retract(&self, _chat: ChatId, _message: MessageId) -> Result<(), TransportError> {
        Ok(())
    }
}

/// File host with two results per page; page tokens are offsets.
struct FakeHosting {
    files: Vec<(FileRef, &'static str)>,
}

impl FakeHosting {
    const PAGE: usize = 2;

    fn new() -> Self {
        Self {
            files: vec![
                (
                    FileRef::new("f1", "Amazing Grace.txt"),
                    "G       D      Em  C\nAmazing grace how sweet the sound\n",
                ),
                (FileRef::new("f2", "Grace Alone.txt"), "C F G\nGrace alone\n"),
                (FileRef::new("f3", "Saving Grace.txt"), "D A Bm G\nSaving grace\n"),
                (FileRef::new("f4", "Cornerstone.txt"), "C G Am F\nChrist alone\n"),
            ],
        }
    }
}

#[async_trait]
impl FileHosting for FakeHosting {
    async fn search(&self, text: &str, page_token: Option<&str>) -> Result<SearchPage, HostingError> {
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| HostingError::InvalidPageToken(token.to_string()))?,
            None => 0,
        };
        let matching: Vec<FileRef> = self
            .files
            .iter()
            .filter(|(file, _)| file.name.to_lowercase().contains(&text.to_lowercase()))
            .map(|(file, _)| file.clone())
            .collect();
        let end = (offset + Self::PAGE).min(matching.len());
        Ok(SearchPage {
            files: matching.get(offset..end).unwrap_or_default().to_vec(),
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn download(&self, file: &FileRef) -> Result<Bytes, HostingError> {
        self.files
            .iter()
            .find(|(known, _)| known.id == file.id)
            .map(|(_, content)| Bytes::from_static(content.as_bytes()))
            .ok_or_else(|| HostingError::NotFound(file.id.clone()))
    }
}

// ========== Harness ==========

struct Harness {
    dispatcher: Dispatcher,
    services: Arc<Services>,
    messenger: Arc<RecordingMessenger>,
}

fn harness() -> Harness {
    let messenger = Arc::new(RecordingMessenger::default());
    let services = Arc::new(Services::in_memory(
        Arc::new(FakeHosting::new()),
        messenger.clone(),
    ));
    let dispatcher = Dispatcher::new(
        Arc::new(SessionManager::new(Arc::new(MemorySessionStorage::new()))),
        services.clone(),
        Arc::new(registry().unwrap()),
    )
    .with_interceptor(band_flows::cancel_interceptor())
    .with_interceptor(band_flows::capture_interceptor());

    Harness {
        dispatcher,
        services,
        messenger,
    }
}

impl Harness {
    async fn send(&self, text: &str) -> DispatchOutcome {
        let outcome = self.dispatcher.dispatch(InboundEvent::text(USER, text)).await;
        assert!(outcome.is_completed(), "{text}: {outcome:?}");
        outcome
    }

    async fn press(&self, callback: Callback) -> DispatchOutcome {
        let token = callback.encode().unwrap();
        let outcome = self
            .dispatcher
            .dispatch(InboundEvent::callback(
                USER,
                token,
                self.messenger.last_keyboard(),
            ))
            .await;
        assert!(outcome.is_completed(), "{callback:?}: {outcome:?}");
        outcome
    }

    async fn session(&self) -> Session {
        self.dispatcher
            .sessions()
            .peek(USER)
            .await
            .unwrap()
            .unwrap()
    }

    async fn assert_at(&self, flow: &FlowName, step: i32) {
        let session = self.session().await;
        assert!(
            session.current().is_at(flow, step),
            "expected {flow}:{step}, at {}:{}",
            session.flow(),
            session.step()
        );
    }

    /// Search "grace" and open the first result.
    async fn open_amazing_grace(&self) {
        self.send("grace").await;
        self.press(Callback::select("0")).await;
        self.assert_at(&names::SONG_ACTIONS, 1).await;
    }

    /// A band the user is a member of.
    async fn join_band(&self) -> Band {
        let band = self
            .services
            .bands
            .upsert(Band::new("The Chorale", USER))
            .await
            .unwrap();
        let mut member = Member::new(USER, "Ana");
        member.band_id = Some(band.id);
        self.services.members.upsert(member).await.unwrap();
        band
    }
}

// ========== Registry ==========

#[test]
fn test_registry_holds_every_flow() {
    let registry = registry().unwrap();
    let all = [
        names::MAIN_MENU,
        names::SEARCH,
        names::SONG_ACTIONS,
        names::TRANSPOSE,
        names::DELETE_SONG,
        names::GET_VOICES,
        names::UPLOAD_VOICE,
        names::CHOOSE_BAND,
        names::CREATE_BAND,
        names::CREATE_EVENT,
        names::GET_EVENTS,
        names::EVENT_ACTIONS,
        names::ADD_EVENT_SONG,
        names::REMOVE_EVENT_SONG,
        names::DELETE_EVENT,
    ];
    for name in &all {
        assert!(registry.contains(name), "{name} is not registered");
    }
    assert_eq!(registry.flow_names().len(), all.len());
    assert_eq!(registry.flow_len(&names::UPLOAD_VOICE), Some(4));
}

// ========== Search and songs ==========

#[tokio::test]
async fn test_menu_text_searches_and_pages() {
    let h = harness();
    h.send("/start").await;
    h.assert_at(&names::MAIN_MENU, 0).await;

    h.send("grace").await;
    h.assert_at(&names::SEARCH, 1).await;
    let context = h.session().await.context().clone();
    assert_eq!(context.listing.len(), 2);
    assert!(context.page.as_ref().is_some_and(|page| page.has_next()));
    assert!(h.messenger.last_text().contains("(page 1)"));

    h.press(Callback::Page(band_core::PageDirection::Next)).await;
    let context = h.session().await.context().clone();
    assert_eq!(context.listing.len(), 1);
    assert_eq!(context.listing[0].label, "Saving Grace.txt");
    assert!(h.messenger.last_text().contains("(page 2)"));

    h.send(labels::PREV_PAGE).await;
    let context = h.session().await.context().clone();
    assert_eq!(context.listing[0].label, "Amazing Grace.txt");
    assert_eq!(context.page.map(|page| page.number()), Some(1));
}

#[tokio::test]
async fn test_search_without_results_keeps_asking() {
    let h = harness();
    h.send("kumbaya").await;
    h.assert_at(&names::SEARCH, 0).await;
    assert!(h.messenger.last_text().contains("Nothing found"));

    // A new query from the search prompt.
    h.send("cornerstone").await;
    h.assert_at(&names::SEARCH, 1).await;
}

#[tokio::test]
async fn test_buttons_from_a_replaced_listing_are_ignored() {
    let h = harness();
    h.send("cornerstone").await;
    let stale = h.messenger.last_keyboard();

    h.send("grace").await;
    h.assert_at(&names::SEARCH, 1).await;
    assert_ne!(h.messenger.last_keyboard(), stale);

    // Index 0 of the old listing was Cornerstone; it must not open
    // Amazing Grace, which sits at index 0 now.
    let select = Callback::select("0").encode().unwrap();
    let outcome = h
        .dispatcher
        .dispatch(InboundEvent::callback(USER, select, stale))
        .await;
    assert!(outcome.is_completed());
    h.assert_at(&names::SEARCH, 1).await;
    assert!(h.messenger.documents().is_empty());

    let next = Callback::Page(band_core::PageDirection::Next).encode().unwrap();
    h.dispatcher
        .dispatch(InboundEvent::callback(USER, next, stale))
        .await;
    let context = h.session().await.context().clone();
    assert_eq!(context.listing[0].label, "Amazing Grace.txt");
    assert_eq!(context.page.map(|page| page.number()), Some(1));

    h.press(Callback::select("0")).await;
    h.assert_at(&names::SONG_ACTIONS, 1).await;
    assert_eq!(h.messenger.documents()[0].0, "Amazing Grace.txt");
}

#[tokio::test]
async fn test_opening_a_result_stores_the_song_and_sends_the_sheet() {
    let h = harness();
    h.open_amazing_grace().await;

    let songs = h.services.songs.find(&Query::new()).await.unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0].file.id, "f1");
    assert_eq!(h.messenger.documents()[0].0, "Amazing Grace.txt");

    // Opening it again reuses the record.
    h.send(labels::BACK).await;
    h.assert_at(&names::SEARCH, 1).await;
    h.press(Callback::select("0")).await;
    assert_eq!(h.services.songs.find(&Query::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transpose_sends_shifted_sheet_and_returns() {
    let h = harness();
    h.open_amazing_grace().await;

    h.send(labels::TRANSPOSE).await;
    h.assert_at(&names::TRANSPOSE, 1).await;

    h.send("H#").await;
    assert!(h.messenger.last_text().contains("is not a key"));
    h.assert_at(&names::TRANSPOSE, 1).await;

    h.press(Callback::Key("A".to_string())).await;
    let (name, content) = h.messenger.documents().pop().unwrap();
    assert_eq!(name, "Amazing Grace (A).txt");
    assert!(content.contains("F#m"));
    assert!(content.contains("Amazing grace how sweet the sound"));
    h.assert_at(&names::SONG_ACTIONS, 1).await;
}

#[tokio::test]
async fn test_delete_song_needs_confirmation() {
    let h = harness();
    h.open_amazing_grace().await;

    h.send(labels::DELETE).await;
    h.assert_at(&names::DELETE_SONG, 1).await;
    h.send(labels::NO).await;
    h.assert_at(&names::SONG_ACTIONS, 1).await;
    assert_eq!(h.services.songs.find(&Query::new()).await.unwrap().len(), 1);

    h.send(labels::DELETE).await;
    h.press(Callback::Confirm(true)).await;
    assert!(h.services.songs.find(&Query::new()).await.unwrap().is_empty());
    // Both the confirmation and the song's actions are gone.
    h.assert_at(&names::SEARCH, 1).await;
}

// ========== Voices ==========

#[tokio::test]
async fn test_voice_on_open_song_skips_to_naming() {
    let h = harness();
    h.open_amazing_grace().await;

    h.dispatcher
        .dispatch(InboundEvent::voice(USER, MediaRef::new("clip-1")))
        .await;
    h.assert_at(&names::UPLOAD_VOICE, 2).await;

    h.send("Alto").await;
    let voices = h.services.voices.find(&Query::new()).await.unwrap();
    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0].name, "Alto");
    assert_eq!(voices[0].media.file_id, "clip-1");
    h.assert_at(&names::SONG_ACTIONS, 1).await;

    h.send(labels::VOICES).await;
    h.assert_at(&names::GET_VOICES, 1).await;
    h.press(Callback::select("0")).await;
    let sent = h.messenger.sent.lock().unwrap().last().cloned().unwrap();
    assert!(matches!(sent.body, Body::Voice { ref media, .. } if media.file_id == "clip-1"));
}

#[tokio::test]
async fn test_voice_from_menu_asks_for_the_song() {
    let h = harness();
    let song = h
        .services
        .songs
        .upsert(Song::from_file(FileRef::new("f1", "Amazing Grace.txt"), None))
        .await
        .unwrap();

    h.dispatcher
        .dispatch(InboundEvent::voice(USER, MediaRef::new("clip-2")))
        .await;
    h.assert_at(&names::UPLOAD_VOICE, 1).await;

    h.send("amazing").await;
    h.assert_at(&names::UPLOAD_VOICE, 1).await;
    h.press(Callback::select("0")).await;
    h.assert_at(&names::UPLOAD_VOICE, 2).await;

    h.send("Bass").await;
    let voices = h.services.voices.find(&Query::new().parent(song.id)).await.unwrap();
    assert_eq!(voices.len(), 1);
    h.assert_at(&names::MAIN_MENU, 0).await;
}

// ========== Bands and events ==========

#[tokio::test]
async fn test_create_band_from_choose_band() {
    let h = harness();
    h.send(labels::CHANGE_BAND).await;
    h.assert_at(&names::CHOOSE_BAND, 1).await;

    h.send(labels::CREATE_BAND).await;
    h.assert_at(&names::CREATE_BAND, 0).await;
    assert_eq!(h.session().await.states.depth(), 3);

    h.send("The Chorale").await;
    let bands = h.services.bands.find(&Query::new()).await.unwrap();
    assert_eq!(bands.len(), 1);
    assert_eq!(bands[0].admin_ids, vec![USER]);

    let member = h
        .services
        .members
        .find_one(&Query::new().member(USER))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(member.band_id, Some(bands[0].id));
    h.assert_at(&names::MAIN_MENU, 0).await;
}

#[tokio::test]
async fn test_create_event_detours_through_band_creation() {
    let h = harness();
    h.send(labels::CREATE_EVENT).await;
    h.assert_at(&names::CHOOSE_BAND, 1).await;

    h.send(labels::CREATE_BAND).await;
    h.send("The Chorale").await;
    h.assert_at(&names::CREATE_EVENT, 0).await;
    assert_eq!(h.messenger.last_text(), "What is the event called?");

    h.send("Sunday service").await;
    h.assert_at(&names::CREATE_EVENT, 1).await;

    h.send("31.02.2030").await;
    assert!(h.messenger.last_text().contains("not a date"));
    h.assert_at(&names::CREATE_EVENT, 1).await;

    h.send("12.05.2030").await;
    h.assert_at(&names::CREATE_EVENT, 2).await;
    assert_eq!(h.messenger.last_text(), "Create 2030-05-12 Sunday service?");

    h.send(labels::YES).await;
    let events = h.services.events.find(&Query::new()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title(), "2030-05-12 Sunday service");
    assert_eq!(events[0].created_by, Some(USER));
    h.assert_at(&names::MAIN_MENU, 0).await;
}

#[tokio::test]
async fn test_cancelled_band_detour_leaves_create_event() {
    let h = harness();
    h.send(labels::CREATE_EVENT).await;
    h.assert_at(&names::CHOOSE_BAND, 1).await;

    h.send("/cancel").await;
    let session = h.session().await;
    assert!(session.states.is_main_menu());
    assert_eq!(session.states.depth(), 1);
    assert!(h.services.events.find(&Query::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_discarded_event_is_not_stored() {
    let h = harness();
    h.join_band().await;
    h.send(labels::CREATE_EVENT).await;
    h.send("Rehearsal").await;
    h.send(labels::TODAY).await;
    h.press(Callback::Confirm(false)).await;

    assert!(h.services.events.find(&Query::new()).await.unwrap().is_empty());
    assert_eq!(
        h.messenger.texts().iter().filter(|t| *t == "Event discarded.").count(),
        1
    );
    h.assert_at(&names::MAIN_MENU, 0).await;
}

#[tokio::test]
async fn test_event_setlist_add_remove_and_delete() {
    let h = harness();
    let band = h.join_band().await;
    h.services
        .songs
        .upsert(Song::from_file(FileRef::new("f1", "Amazing Grace.txt"), Some(band.id)))
        .await
        .unwrap();
    let date = Local::now().date_naive() + Duration::days(30);
    let event = h
        .services
        .events
        .upsert(Event::new(band.id, "Sunday service", date))
        .await
        .unwrap();
    h.services
        .events
        .upsert(Event::new(band.id, "Last year", date - Duration::days(400)))
        .await
        .unwrap();

    h.send(labels::SCHEDULE).await;
    h.assert_at(&names::GET_EVENTS, 1).await;
    assert_eq!(h.session().await.context().listing.len(), 1);

    h.press(Callback::select("0")).await;
    h.assert_at(&names::EVENT_ACTIONS, 1).await;
    assert!(h.messenger.last_text().ends_with("No songs yet."));

    h.send(labels::ADD_SONG).await;
    h.send("grace").await;
    h.assert_at(&names::ADD_EVENT_SONG, 1).await;
    h.press(Callback::select("0")).await;
    h.assert_at(&names::EVENT_ACTIONS, 1).await;
    assert!(h.messenger.last_text().ends_with("1. Amazing Grace.txt"));
    let stored = h.services.events.get(&event.id).await.unwrap();
    assert_eq!(stored.song_ids.len(), 1);

    h.send(labels::REMOVE_SONG).await;
    h.assert_at(&names::REMOVE_EVENT_SONG, 1).await;
    h.press(Callback::select("0")).await;
    let stored = h.services.events.get(&event.id).await.unwrap();
    assert!(stored.song_ids.is_empty());

    h.send(labels::DELETE).await;
    h.assert_at(&names::DELETE_EVENT, 1).await;
    h.press(Callback::Confirm(true)).await;
    assert!(h.services.events.find_by_id(&event.id).await.unwrap().is_none());
    // Nothing upcoming is left, so the schedule closes too.
    assert!(h.messenger.texts().contains(&"No upcoming events.".to_string()));
    h.assert_at(&names::MAIN_MENU, 0).await;
}

#[tokio::test]
async fn test_users_do_not_share_sessions() {
    let h = harness();
    h.send("grace").await;

    let other = UserId(8);
    h.dispatcher
        .dispatch(InboundEvent::text(other, labels::CHANGE_BAND))
        .await;

    h.assert_at(&names::SEARCH, 1).await;
    let theirs = h.dispatcher.sessions().peek(other).await.unwrap().unwrap();
    assert!(theirs.current().is_at(&names::CHOOSE_BAND, 1));
}
