//! Rehearsal events and their setlists

use band_core::{Event, Keyboard, OutboundMessage, Query, RecordId};
use chrono::{Local, NaiveDate};
use flow_engine::{register_flow, FlowDef, FlowError, Turn};
use flow_state::{Context, Listing, Session};

use crate::labels;
use crate::names::{self, fields};
use crate::ui::{self, is_label};

fn create_event() -> FlowDef {
    FlowDef::new(names::CREATE_EVENT)
        .step(ask_name)
        .step(ask_date)
        .step(save)
}

fn get_events() -> FlowDef {
    FlowDef::new(names::GET_EVENTS)
        .step(list_events)
        .step(choose_event)
}

fn event_actions() -> FlowDef {
    FlowDef::new(names::EVENT_ACTIONS).step(show).step(act)
}

fn add_event_song() -> FlowDef {
    FlowDef::new(names::ADD_EVENT_SONG)
        .step(find_song)
        .step(add_song)
}

fn remove_event_song() -> FlowDef {
    FlowDef::new(names::REMOVE_EVENT_SONG)
        .step(list_setlist)
        .step(remove_song)
}

fn delete_event() -> FlowDef {
    FlowDef::new(names::DELETE_EVENT)
        .step(confirm_delete)
        .step(delete)
}

register_flow!(create_event);
register_flow!(get_events);
register_flow!(event_actions);
register_flow!(add_event_song);
register_flow!(remove_event_song);
register_flow!(delete_event);

/// Set once the user was sent to choose_band from this flow.
const BAND_DETOUR: &str = "band_detour";

fn today() -> NaiveDate {
    Local::now().date_naive()
}

enum BandCheck {
    Ready(RecordId, Session),
    Left(Session),
}

/// The member's band. Without one the user goes through choose_band once;
/// coming back still without a band leaves the flow.
async fn require_band(turn: &Turn, mut session: Session) -> Result<BandCheck, FlowError> {
    if let Some(band_id) = ui::member(turn).await?.band_id {
        session.context_mut().set(fields::BAND_ID, band_id);
        return Ok(BandCheck::Ready(band_id, session));
    }

    if session.context().flag(BAND_DETOUR) {
        turn.say("Events belong to a band. Join one first.").await?;
        return Ok(BandCheck::Left(turn.finish(session).await?));
    }

    session.context_mut().set(BAND_DETOUR, true);
    turn.say("Join or create a band first.").await?;
    let session = turn
        .start(session, names::CHOOSE_BAND, Context::new())
        .await?;
    Ok(BandCheck::Left(session))
}

async fn event_of(turn: &Turn, session: &Session) -> Result<Option<Event>, FlowError> {
    match session.context().record_id(fields::EVENT_ID) {
        Some(id) => Ok(turn.services().events.find_by_id(&id).await?),
        None => Ok(None),
    }
}

fn record_id(entry: &Listing) -> Result<RecordId, FlowError> {
    entry.id.parse().map_err(|_| {
        FlowError::Internal(anyhow::anyhow!(
            "listing holds invalid record id {}",
            entry.id
        ))
    })
}

fn event_context(event_id: RecordId) -> Context {
    Context::new().with(fields::EVENT_ID, event_id)
}

// ========== create_event ==========

async fn ask_name(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    let mut session = match require_band(turn, session).await? {
        BandCheck::Ready(_, session) => session,
        BandCheck::Left(session) => return Ok(session),
    };

    let Some(name) = turn.text() else {
        turn.ask("What is the event called?", ui::cancel_keyboard())
            .await?;
        return Ok(session);
    };

    session.context_mut().set(fields::NAME, name);
    session.advance();
    turn.enter(session).await
}

async fn ask_date(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(text) = turn.text() else {
        turn.ask(
            "When is it? Send the date as YYYY-MM-DD or DD.MM.YYYY.",
            Keyboard::column([labels::TODAY, labels::CANCEL]),
        )
        .await?;
        return Ok(session);
    };

    let Some(date) = ui::parse_date(text, today()) else {
        turn.say(format!("\"{text}\" is not a date I understand. Use YYYY-MM-DD or DD.MM.YYYY."))
            .await?;
        return Ok(session);
    };

    session
        .context_mut()
        .set(fields::DATE, date.format("%Y-%m-%d").to_string());
    session.advance();
    turn.enter(session).await
}

/// Show the summary and create the event on "yes".
async fn save(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let context = session.context();
    let draft = (
        context.record_id(fields::BAND_ID),
        context.text(fields::NAME).map(str::to_string),
        context
            .text(fields::DATE)
            .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()),
    );
    let (Some(band_id), Some(name), Some(date)) = draft else {
        session.set_step(0);
        return turn.enter(session).await;
    };

    let mut event = Event::new(band_id, name, date);
    event.created_by = Some(turn.user_id());

    let Some(answer) = ui::confirmation(turn) else {
        let message = OutboundMessage::text(format!("Create {}?", event.title()))
            .with_keyboard(ui::confirm_keyboard()?);
        turn.prompt(session.context_mut(), message).await?;
        return Ok(session);
    };
    turn.retract_stale(session.context_mut()).await;

    if !answer {
        turn.say("Event discarded.").await?;
        return turn.finish(session).await;
    }

    let event = turn.services().events.upsert(event).await?;
    tracing::info!(user_id = %turn.user_id(), event = %event.id, "event created");
    turn.say(format!("Event {} created.", event.title())).await?;
    turn.finish(session).await
}

// ========== get_events ==========

async fn list_events(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    let (band_id, mut session) = match require_band(turn, session).await? {
        BandCheck::Ready(band_id, session) => (band_id, session),
        BandCheck::Left(session) => return Ok(session),
    };

    let events = turn
        .services()
        .events
        .find(&Query::new().band(band_id).from_date(today()))
        .await?;
    if events.is_empty() {
        turn.say("No upcoming events.").await?;
        return turn.finish(session).await;
    }

    let context = session.context_mut();
    turn.retract_stale(context).await;
    context.show_listing(
        events
            .iter()
            .map(|event| Listing::new(event.id.to_string(), event.title()))
            .collect(),
    );
    ui::show_listing(turn, context, "Upcoming events:").await?;
    session.advance();
    Ok(session)
}

async fn choose_event(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(entry) = ui::picked(turn, session.context()) else {
        // Back from event_actions, or unusable input: list again.
        session.set_step(0);
        return turn.enter(session).await;
    };
    let event_id = record_id(&entry)?;
    turn.retract_stale(session.context_mut()).await;
    turn.start(session, names::EVENT_ACTIONS, event_context(event_id))
        .await
}

// ========== event_actions ==========

fn actions_keyboard() -> Keyboard {
    Keyboard::Reply(vec![
        vec![labels::ADD_SONG.to_string(), labels::REMOVE_SONG.to_string()],
        vec![labels::DELETE.to_string()],
        vec![labels::BACK.to_string()],
    ])
}

/// Title plus the numbered setlist.
async fn setlist_text(turn: &Turn, event: &Event) -> Result<String, FlowError> {
    let mut text = event.title();
    if event.song_ids.is_empty() {
        text.push_str("\n\nNo songs yet.");
        return Ok(text);
    }
    text.push('\n');
    let mut position = 0;
    for id in &event.song_ids {
        if let Some(song) = turn.services().songs.find_by_id(id).await? {
            position += 1;
            text.push_str(&format!("\n{position}. {}", song.name()));
        }
    }
    Ok(text)
}

async fn show(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(event) = event_of(turn, &session).await? else {
        turn.say("This event no longer exists.").await?;
        return turn.finish(session).await;
    };
    let text = setlist_text(turn, &event).await?;
    turn.ask(text, actions_keyboard()).await?;
    session.advance();
    Ok(session)
}

async fn act(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(event_id) = session.context().record_id(fields::EVENT_ID) else {
        return turn.finish(session).await;
    };

    match turn.text() {
        Some(text) if is_label(text, labels::ADD_SONG) => {
            turn.start(session, names::ADD_EVENT_SONG, event_context(event_id))
                .await
        }
        Some(text) if is_label(text, labels::REMOVE_SONG) => {
            turn.start(session, names::REMOVE_EVENT_SONG, event_context(event_id))
                .await
        }
        Some(text) if is_label(text, labels::DELETE) => {
            turn.start(session, names::DELETE_EVENT, event_context(event_id))
                .await
        }
        Some(text) if is_label(text, labels::BACK) => turn.finish(session).await,
        _ => {
            session.set_step(0);
            turn.enter(session).await
        }
    }
}

// ========== add_event_song ==========

async fn find_song(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(text) = turn.text() else {
        turn.ask("Send the name of the song to add.", ui::cancel_keyboard())
            .await?;
        return Ok(session);
    };
    let Some(event) = event_of(turn, &session).await? else {
        return turn.finish(session).await;
    };

    let songs = turn
        .services()
        .songs
        .find(
            &Query::new()
                .band(event.band_id)
                .text(text)
                .limit(ui::PAGE_SIZE),
        )
        .await?;
    if songs.is_empty() {
        turn.say(format!("The band has no song matching \"{text}\"."))
            .await?;
        return Ok(session);
    }

    let context = session.context_mut();
    turn.retract_stale(context).await;
    context.show_listing(
        songs
            .into_iter()
            .map(|song| Listing::new(song.id.to_string(), song.name()))
            .collect(),
    );
    ui::show_listing(turn, context, "Pick the song:").await?;
    session.advance();
    Ok(session)
}

async fn add_song(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(entry) = ui::picked(turn, session.context()) else {
        session.set_step(0);
        return if turn.text().is_some() {
            turn.forward(session).await
        } else {
            turn.enter(session).await
        };
    };
    let Some(mut event) = event_of(turn, &session).await? else {
        return turn.finish(session).await;
    };

    let song_id = record_id(&entry)?;
    if !event.song_ids.contains(&song_id) {
        event.song_ids.push(song_id);
        turn.services().events.upsert(event).await?;
    }
    turn.retract_stale(session.context_mut()).await;
    turn.say(format!("Added {}.", entry.label)).await?;
    turn.finish(session).await
}

// ========== remove_event_song ==========

async fn list_setlist(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(event) = event_of(turn, &session).await? else {
        return turn.finish(session).await;
    };

    let mut listing = Vec::with_capacity(event.song_ids.len());
    for id in &event.song_ids {
        if let Some(song) = turn.services().songs.find_by_id(id).await? {
            listing.push(Listing::new(id.to_string(), song.name()));
        }
    }
    if listing.is_empty() {
        turn.say("The setlist is empty.").await?;
        return turn.finish(session).await;
    }

    let context = session.context_mut();
    context.show_listing(listing);
    ui::show_listing(turn, context, "Which song should be removed?").await?;
    session.advance();
    Ok(session)
}

async fn remove_song(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(entry) = ui::picked(turn, session.context()) else {
        turn.retract_stale(session.context_mut()).await;
        session.set_step(0);
        return turn.enter(session).await;
    };
    let Some(mut event) = event_of(turn, &session).await? else {
        return turn.finish(session).await;
    };

    let song_id = record_id(&entry)?;
    event.song_ids.retain(|id| *id != song_id);
    turn.services().events.upsert(event).await?;
    turn.retract_stale(session.context_mut()).await;
    turn.say(format!("Removed {}.", entry.label)).await?;
    turn.finish(session).await
}

// ========== delete_event ==========

async fn confirm_delete(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    let Some(event) = event_of(turn, &session).await? else {
        return turn.finish(session).await;
    };
    ui::ask_confirmation(turn, session, format!("Delete {}?", event.title())).await
}

/// Deletes only on "yes", then leaves event_actions too.
async fn delete(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(answer) = ui::confirmation(turn) else {
        session.set_step(0);
        return turn.enter(session).await;
    };
    turn.retract_stale(session.context_mut()).await;

    if !answer {
        return turn.finish(session).await;
    }
    let Some(event_id) = session.context().record_id(fields::EVENT_ID) else {
        return turn.finish(session).await;
    };

    turn.services().events.remove(&event_id).await?;
    tracing::info!(user_id = %turn.user_id(), event = %event_id, "event deleted");
    turn.say("Event deleted.").await?;

    session.pop();
    turn.finish(session).await
}
