//! Choosing and creating bands

use band_core::{Band, Keyboard, Query};
use flow_engine::{register_flow, FlowDef, FlowError, Turn};
use flow_state::{Context, Listing, Session};

use crate::labels;
use crate::names::{self, fields};
use crate::ui::{self, is_label};

fn choose_band() -> FlowDef {
    FlowDef::new(names::CHOOSE_BAND).step(list).step(choose)
}

fn create_band() -> FlowDef {
    FlowDef::new(names::CREATE_BAND).step(ask_name).step(save)
}

register_flow!(choose_band);
register_flow!(create_band);

async fn list(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let bands = turn.services().bands.find(&Query::new()).await?;

    turn.ask(
        "Pick your band, or create a new one.",
        Keyboard::column([labels::CREATE_BAND, labels::CANCEL]),
    )
    .await?;

    let context = session.context_mut();
    turn.retract_stale(context).await;
    context.show_listing(
        bands
            .into_iter()
            .map(|band| Listing::new(band.id.to_string(), band.name))
            .collect(),
    );
    if !context.listing.is_empty() {
        ui::show_listing(turn, context, "Bands:").await?;
    }
    session.advance();
    Ok(session)
}

async fn choose(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if turn.text().is_some_and(|text| is_label(text, labels::CREATE_BAND)) {
        return turn.start(session, names::CREATE_BAND, Context::new()).await;
    }

    let Some(entry) = ui::picked(turn, session.context()) else {
        // Back from create_band, or unusable input: list again.
        session.set_step(0);
        return turn.enter(session).await;
    };

    let band = match entry.id.parse() {
        Ok(id) => turn.services().bands.find_by_id(&id).await?,
        Err(_) => None,
    };
    let Some(band) = band else {
        turn.say("That band no longer exists.").await?;
        session.set_step(0);
        return turn.enter(session).await;
    };

    join(turn, &band).await?;
    turn.retract_stale(session.context_mut()).await;
    turn.say(format!("You are now in {}.", band.name)).await?;
    turn.finish(session).await
}

async fn ask_name(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(name) = turn.text() else {
        turn.ask("What is the band called?", ui::cancel_keyboard())
            .await?;
        return Ok(session);
    };

    session.context_mut().set(fields::NAME, name);
    session.advance();
    turn.enter(session).await
}

/// Create the band and join it. The user has a band now, so choose_band
/// underneath is left as well.
async fn save(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(name) = session.context().text(fields::NAME).map(str::to_string) else {
        session.set_step(0);
        return turn.enter(session).await;
    };

    let band = turn
        .services()
        .bands
        .upsert(Band::new(name, turn.user_id()))
        .await?;
    join(turn, &band).await?;
    tracing::info!(user_id = %turn.user_id(), band = %band.id, "band created");
    turn.say(format!("Band {} created. You are its admin.", band.name))
        .await?;

    if session.states.parent().is_some_and(|parent| parent.flow == names::CHOOSE_BAND) {
        session.pop();
    }
    turn.finish(session).await
}

async fn join(turn: &Turn, band: &Band) -> Result<(), FlowError> {
    let mut member = ui::member(turn).await?;
    member.band_id = Some(band.id);
    turn.services().members.upsert(member).await?;
    Ok(())
}
