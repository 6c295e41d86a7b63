//! Song actions and song deletion

use band_core::{FileRef, Keyboard, OutboundMessage, Query, Song};
use flow_engine::{register_flow, FlowDef, FlowError, Turn};
use flow_state::{Context, Session};

use crate::labels;
use crate::names::{self, fields};
use crate::ui::{self, is_label};

fn song_actions() -> FlowDef {
    FlowDef::new(names::SONG_ACTIONS).step(show).step(act)
}

fn delete_song() -> FlowDef {
    FlowDef::new(names::DELETE_SONG)
        .step(confirm_delete)
        .step(delete)
}

register_flow!(song_actions);
register_flow!(delete_song);

fn actions_keyboard() -> Keyboard {
    Keyboard::Reply(vec![
        vec![labels::VOICES.to_string(), labels::TRANSPOSE.to_string()],
        vec![labels::DELETE.to_string()],
        vec![labels::BACK.to_string()],
    ])
}

/// The song behind the file picked in a search, stored on first sight.
async fn resolve_song(turn: &Turn, context: &Context) -> Result<Option<Song>, FlowError> {
    let songs = &turn.services().songs;
    if let Some(id) = context.record_id(fields::SONG_ID) {
        return Ok(songs.find_by_id(&id).await?);
    }

    let Some(file_id) = context.text(fields::FILE_ID) else {
        return Ok(None);
    };
    if let Some(song) = songs.find_one(&Query::new().file(file_id)).await? {
        return Ok(Some(song));
    }

    let name = context.text(fields::FILE_NAME).unwrap_or(file_id);
    let band_id = ui::member(turn).await?.band_id;
    let song = Song::from_file(FileRef::new(file_id, name), band_id);
    tracing::info!(song = %song.id, file = file_id, "storing new song");
    Ok(Some(songs.upsert(song).await?))
}

/// Send the sheet and the action keyboard.
async fn show(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(song) = resolve_song(turn, session.context()).await? else {
        turn.say("This song is no longer available.").await?;
        return turn.finish(session).await;
    };
    session.context_mut().set(fields::SONG_ID, song.id);

    let content = turn.services().files.download(&song.file).await?;
    let mut caption = song.name().to_string();
    if let Some(key) = &song.key {
        caption.push_str(&format!(" ({key})"));
    }
    turn.reply(OutboundMessage::document(song.file.name.clone(), content))
        .await?;
    turn.ask(caption, actions_keyboard()).await?;

    session.advance();
    Ok(session)
}

async fn act(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    let Some(song_id) = session.context().record_id(fields::SONG_ID) else {
        return turn.finish(session).await;
    };
    let child = || Context::new().with(fields::SONG_ID, song_id);

    match turn.text() {
        Some(text) if is_label(text, labels::VOICES) => {
            turn.start(session, names::GET_VOICES, child()).await
        }
        Some(text) if is_label(text, labels::TRANSPOSE) => {
            turn.start(session, names::TRANSPOSE, child()).await
        }
        Some(text) if is_label(text, labels::DELETE) => {
            turn.start(session, names::DELETE_SONG, child()).await
        }
        Some(text) if is_label(text, labels::BACK) => turn.finish(session).await,
        _ => {
            turn.ask("What do you want to do with this song?", actions_keyboard())
                .await?;
            Ok(session)
        }
    }
}

async fn confirm_delete(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    let Some(song) = song_of(turn, &session).await? else {
        return turn.finish(session).await;
    };
    let question = format!("Delete \"{}\" and its voices?", song.name());
    ui::ask_confirmation(turn, session, question).await
}

/// Deletes only on "yes". A deleted song has no actions left, so "yes" leaves
/// song_actions as well.
async fn delete(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(answer) = ui::confirmation(turn) else {
        session.set_step(0);
        return turn.enter(session).await;
    };
    turn.retract_stale(session.context_mut()).await;

    if !answer {
        return turn.finish(session).await;
    }

    let Some(song_id) = session.context().record_id(fields::SONG_ID) else {
        return turn.finish(session).await;
    };
    let services = turn.services();
    for voice in services.voices.find(&Query::new().parent(song_id)).await? {
        services.voices.remove(&voice.id).await?;
    }
    services.songs.remove(&song_id).await?;
    tracing::info!(user_id = %turn.user_id(), song = %song_id, "song deleted");
    turn.say("Song deleted.").await?;

    session.pop();
    turn.finish(session).await
}

async fn song_of(turn: &Turn, session: &Session) -> Result<Option<Song>, FlowError> {
    match session.context().record_id(fields::SONG_ID) {
        Some(id) => Ok(turn.services().songs.find_by_id(&id).await?),
        None => Ok(None),
    }
}
