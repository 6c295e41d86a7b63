//! Chord-sheet transposition

use band_core::{transpose_text, Button, Callback, Key, Keyboard, OutboundMessage};
use flow_engine::{register_flow, FlowDef, FlowError, Turn};
use flow_state::Session;

use crate::names::{self, fields};

fn flow() -> FlowDef {
    FlowDef::new(names::TRANSPOSE).step(choose_key).step(apply)
}

register_flow!(flow);

fn keys_keyboard() -> Result<Keyboard, FlowError> {
    let mut rows = Vec::new();
    for chunk in Key::majors().chunks(4) {
        let mut row = Vec::with_capacity(chunk.len());
        for key in chunk {
            let name = key.to_string();
            row.push(Button::new(name.clone(), Callback::Key(name).encode()?));
        }
        rows.push(row);
    }
    Ok(Keyboard::Inline(rows))
}

async fn choose_key(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let message = OutboundMessage::text("Which key should the song be in?")
        .with_keyboard(keys_keyboard()?);
    turn.prompt(session.context_mut(), message).await?;
    session.advance();
    Ok(session)
}

/// Download the sheet, shift its chord lines and send the result back.
async fn apply(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let requested = match turn.callback() {
        Some(Callback::Key(key)) => Some(key),
        _ => turn.text().map(str::to_string),
    };
    let Some(requested) = requested else {
        session.set_step(0);
        return turn.enter(session).await;
    };
    let Ok(target) = Key::parse(&requested) else {
        turn.say(format!("\"{requested}\" is not a key. Try e.g. G, Bb or F#m."))
            .await?;
        return Ok(session);
    };

    let Some(song_id) = session.context().record_id(fields::SONG_ID) else {
        return turn.finish(session).await;
    };
    let song = turn.services().songs.get(&song_id).await?;
    let content = turn.services().files.download(&song.file).await?;
    let text = String::from_utf8_lossy(&content).into_owned();

    let source = match song.key.as_deref().map(Key::parse) {
        Some(Ok(key)) => Some(key),
        _ => Key::detect(&text),
    };
    turn.retract_stale(session.context_mut()).await;

    let Some(source) = source else {
        turn.say("Could not find any chords in this song.").await?;
        return turn.finish(session).await;
    };

    let transposed = transpose_text(&text, &source, &target);
    let name = format!("{} ({target}).txt", song.name().trim_end_matches(".txt"));
    turn.reply(OutboundMessage::document(name, transposed))
        .await?;
    tracing::debug!(song = %song.id, from = %source, to = %target, "song transposed");

    turn.finish(session).await
}
