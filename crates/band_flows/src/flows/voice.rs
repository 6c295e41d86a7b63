//! Voice parts: listing them and capturing new ones

use band_core::{OutboundMessage, Query, Voice};
use flow_engine::{register_flow, FlowDef, FlowError, Turn};
use flow_state::{Listing, Session};

use crate::labels;
use crate::names::{self, fields};
use crate::ui::{self, is_label};

fn get_voices() -> FlowDef {
    FlowDef::new(names::GET_VOICES).step(list).step(send_voice)
}

/// Entered by the capture interceptor with the clip in `context.media`.
fn upload_voice() -> FlowDef {
    FlowDef::new(names::UPLOAD_VOICE)
        .step(ask_song)
        .step(choose_song)
        .step(ask_name)
        .step(save)
}

register_flow!(get_voices);
register_flow!(upload_voice);

// ========== get_voices ==========

async fn list(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(song_id) = session.context().record_id(fields::SONG_ID) else {
        return turn.finish(session).await;
    };
    let voices = turn
        .services()
        .voices
        .find(&Query::new().parent(song_id))
        .await?;
    if voices.is_empty() {
        turn.say("No voices yet. Send a voice note to add one.")
            .await?;
        return turn.finish(session).await;
    }

    let context = session.context_mut();
    context.show_listing(
        voices
            .into_iter()
            .map(|voice| Listing::new(voice.id.to_string(), voice.name))
            .collect(),
    );
    ui::show_listing(turn, context, "Voices:").await?;
    session.advance();
    Ok(session)
}

async fn send_voice(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if turn.text().is_some_and(|text| is_label(text, labels::BACK)) {
        turn.retract_stale(session.context_mut()).await;
        return turn.finish(session).await;
    }
    let Some(entry) = ui::picked(turn, session.context()) else {
        turn.retract_stale(session.context_mut()).await;
        session.set_step(0);
        return turn.enter(session).await;
    };

    let id = entry
        .id
        .parse()
        .map_err(|_| invalid_listing(&entry.id))?;
    let voice = turn.services().voices.get(&id).await?;
    turn.reply(OutboundMessage::voice(voice.media, Some(voice.name)))
        .await?;
    Ok(session)
}

fn invalid_listing(id: &str) -> FlowError {
    FlowError::Internal(anyhow::anyhow!("listing holds invalid record id {id}"))
}

// ========== upload_voice ==========

/// Skip straight to naming when the song is already known.
async fn ask_song(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if session.context().media.is_none() {
        return turn.finish(session).await;
    }
    if session.context().record_id(fields::SONG_ID).is_some() {
        session.set_step(2);
        return turn.enter(session).await;
    }

    turn.ask(
        "Which song is this voice for? Send its name.",
        ui::cancel_keyboard(),
    )
    .await?;
    session.advance();
    Ok(session)
}

async fn choose_song(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if let Some(entry) = ui::picked(turn, session.context()) {
        let context = session.context_mut();
        turn.retract_stale(context).await;
        context.set(fields::SONG_ID, entry.id);
        session.advance();
        return turn.enter(session).await;
    }

    let Some(text) = turn.text() else {
        turn.ask("Send the name of the song.", ui::cancel_keyboard())
            .await?;
        return Ok(session);
    };

    let member = ui::member(turn).await?;
    let mut query = Query::new().text(text).limit(ui::PAGE_SIZE);
    if let Some(band_id) = member.band_id {
        query = query.band(band_id);
    }
    let songs = turn.services().songs.find(&query).await?;
    if songs.is_empty() {
        turn.say(format!("No stored song matches \"{text}\". Open the song from a search first."))
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
    Ok(session)
}

async fn ask_name(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(name) = turn.text() else {
        turn.ask(
            "What part is it? (e.g. Alto, Bass, Piano)",
            ui::cancel_keyboard(),
        )
        .await?;
        return Ok(session);
    };

    session.context_mut().set(fields::NAME, name);
    session.advance();
    turn.enter(session).await
}

async fn save(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let context = session.context();
    let (Some(song_id), Some(name), Some(media)) = (
        context.record_id(fields::SONG_ID),
        context.text(fields::NAME).map(str::to_string),
        context.media.clone(),
    ) else {
        session.set_step(0);
        return turn.enter(session).await;
    };

    let song = turn.services().songs.get(&song_id).await?;
    let voice = turn
        .services()
        .voices
        .upsert(Voice::new(song_id, name, media))
        .await?;
    tracing::info!(user_id = %turn.user_id(), voice = %voice.id, song = %song_id, "voice saved");
    turn.say(format!("Saved \"{}\" for {}.", voice.name, song.name()))
        .await?;

    turn.finish(session).await
}
