//! Song search on the file host

use band_core::PageDirection;
use flow_engine::{register_flow, FlowDef, FlowError, Turn};
use flow_state::{Context, Listing, PageToken, Session};

use crate::names::{self, fields};
use crate::ui;

fn flow() -> FlowDef {
    FlowDef::new(names::SEARCH).step(query).step(choose)
}

register_flow!(flow);

/// Search for the typed text and list the first page of results.
async fn query(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(text) = turn.text() else {
        turn.ask("Send the name of the song.", ui::cancel_keyboard())
            .await?;
        return Ok(session);
    };

    let page = turn.services().files.search(text, None).await?;
    if page.files.is_empty() {
        turn.say(format!("Nothing found for \"{text}\". Try another name."))
            .await?;
        return Ok(session);
    }

    let context = session.context_mut();
    turn.retract_stale(context).await;
    context.query = Some(text.to_string());
    context.page = Some(PageToken::first(page.next_page_token));
    context.show_listing(listing(page.files));
    show_results(turn, context).await?;

    session.advance();
    Ok(session)
}

/// Pick a result, flip pages, or type a new query.
async fn choose(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if let Some(entry) = ui::picked(turn, session.context()) {
        let context = session.context_mut();
        turn.retract_stale(context).await;
        context.select(entry.id.clone());

        let child = Context::new()
            .with(fields::FILE_ID, entry.id)
            .with(fields::FILE_NAME, entry.label);
        return turn.start(session, names::SONG_ACTIONS, child).await;
    }

    if let Some(direction) = ui::page_direction(turn, session.context()) {
        return turn_page(turn, session, direction).await;
    }

    if turn.text().is_some() {
        session.set_step(0);
        return turn.forward(session).await;
    }

    // Back from a child flow, or input we cannot use: show the page again.
    if session.context().listing.is_empty() {
        session.set_step(0);
        return turn.enter(session).await;
    }
    let context = session.context_mut();
    turn.retract_stale(context).await;
    show_results(turn, context).await?;
    Ok(session)
}

async fn turn_page(
    turn: &Turn,
    mut session: Session,
    direction: PageDirection,
) -> Result<Session, FlowError> {
    let context = session.context_mut();
    let (Some(query), Some(page)) = (context.query.clone(), context.page.take()) else {
        session.set_step(0);
        return turn.enter(session).await;
    };

    let target = match direction {
        PageDirection::Next => page.next.clone().map(|token| (Some(token), page.clone())),
        PageDirection::Previous => page.clone().back().map(|previous| (previous.token.clone(), previous)),
    };
    let Some((token, base)) = target else {
        // Already on the first or last page.
        context.page = Some(page);
        return Ok(session);
    };

    let result = turn
        .services()
        .files
        .search(&query, token.as_deref())
        .await?;

    context.page = match direction {
        PageDirection::Next => base.followed_by(result.next_page_token),
        PageDirection::Previous => Some(base),
    };
    context.show_listing(listing(result.files));
    turn.retract_stale(context).await;
    show_results(turn, context).await?;
    Ok(session)
}

fn listing(files: Vec<band_core::FileRef>) -> Vec<Listing> {
    files
        .into_iter()
        .map(|file| Listing::new(file.id, file.name))
        .collect()
}

async fn show_results(turn: &Turn, context: &mut Context) -> Result<(), FlowError> {
    let page = context.page.as_ref().map_or(1, PageToken::number);
    let query = context.query.clone().unwrap_or_default();
    ui::show_listing(turn, context, format!("Results for \"{query}\" (page {page}):")).await
}
