//! Shared prompts, keyboards and input parsing for the flows

use band_core::{Button, Callback, Keyboard, Member, OutboundMessage, PageDirection, Query};
use chrono::NaiveDate;
use flow_engine::{FlowError, Turn};
use flow_state::{Context, Listing, Session};

use crate::labels;

/// Results per hosting search page.
pub const PAGE_SIZE: usize = 50;

pub fn is_label(text: &str, label: &str) -> bool {
    text.eq_ignore_ascii_case(label)
}

/// The user's member record, created on first contact.
pub async fn member(turn: &Turn) -> Result<Member, FlowError> {
    let members = &turn.services().members;
    if let Some(member) = members
        .find_one(&Query::new().member(turn.user_id()))
        .await?
    {
        return Ok(member);
    }

    let name = turn
        .user_name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("user {}", turn.user_id()));
    tracing::info!(user_id = %turn.user_id(), "registering new member");
    Ok(members.upsert(Member::new(turn.user_id(), name)).await?)
}

pub fn menu_keyboard() -> Keyboard {
    Keyboard::Reply(vec![
        vec![labels::SCHEDULE.to_string(), labels::CREATE_EVENT.to_string()],
        vec![labels::CHANGE_BAND.to_string()],
    ])
}

pub fn cancel_keyboard() -> Keyboard {
    Keyboard::column([labels::CANCEL])
}

/// Inline keyboard of the context's listing, plus page buttons when the
/// context holds a page cursor.
pub fn listing_keyboard(context: &Context) -> Result<Keyboard, FlowError> {
    let mut rows = Vec::with_capacity(context.listing.len() + 1);
    for (index, entry) in context.listing.iter().enumerate() {
        let token = Callback::select(index.to_string()).encode()?;
        rows.push(vec![Button::new(entry.label.clone(), token)]);
    }

    if let Some(page) = &context.page {
        let mut nav = Vec::new();
        if page.has_previous() {
            let token = Callback::Page(PageDirection::Previous).encode()?;
            nav.push(Button::new(labels::PREV_PAGE, token));
        }
        if page.has_next() {
            let token = Callback::Page(PageDirection::Next).encode()?;
            nav.push(Button::new(labels::NEXT_PAGE, token));
        }
        if !nav.is_empty() {
            rows.push(nav);
        }
    }
    Ok(Keyboard::Inline(rows))
}

/// Send `text` with the listing keyboard as a prompt that goes stale.
pub async fn show_listing(
    turn: &Turn,
    context: &mut Context,
    text: impl Into<String>,
) -> Result<(), FlowError> {
    let keyboard = listing_keyboard(context)?;
    turn.prompt(context, OutboundMessage::text(text).with_keyboard(keyboard))
        .await?;
    Ok(())
}

/// Whether the pressed button sits on a prompt still tracked in `context`.
/// Buttons on older keyboards refer to listings that are gone.
fn on_current_prompt(turn: &Turn, context: &Context) -> bool {
    turn.callback_message()
        .is_some_and(|message| context.retract.contains(&message))
}

/// The listed entry the user picked, by button or by typing its label.
pub fn picked(turn: &Turn, context: &Context) -> Option<Listing> {
    if let Some(Callback::Select(index)) = turn.callback() {
        if !on_current_prompt(turn, context) {
            tracing::debug!(user_id = %turn.user_id(), "ignoring stale listing button");
            return None;
        }
        return index
            .parse::<usize>()
            .ok()
            .and_then(|index| context.listing.get(index))
            .cloned();
    }
    turn.text()
        .and_then(|text| context.listing_by_label(text))
        .cloned()
}

pub fn page_direction(turn: &Turn, context: &Context) -> Option<PageDirection> {
    match turn.callback() {
        Some(Callback::Page(direction)) => {
            on_current_prompt(turn, context).then_some(direction)
        }
        _ => match turn.text() {
            Some(text) if is_label(text, labels::NEXT_PAGE) => Some(PageDirection::Next),
            Some(text) if is_label(text, labels::PREV_PAGE) => Some(PageDirection::Previous),
            _ => None,
        },
    }
}

pub fn confirm_keyboard() -> Result<Keyboard, FlowError> {
    Ok(Keyboard::Inline(vec![vec![
        Button::new(labels::YES, Callback::Confirm(true).encode()?),
        Button::new(labels::NO, Callback::Confirm(false).encode()?),
    ]]))
}

/// Yes or no, by button or label.
pub fn confirmation(turn: &Turn) -> Option<bool> {
    if let Some(Callback::Confirm(answer)) = turn.callback() {
        return Some(answer);
    }
    match turn.text() {
        Some(text) if is_label(text, labels::YES) => Some(true),
        Some(text) if is_label(text, labels::NO) => Some(false),
        _ => None,
    }
}

/// Ask a yes/no question and move on to the answer step.
pub async fn ask_confirmation(
    turn: &Turn,
    mut session: Session,
    question: String,
) -> Result<Session, FlowError> {
    let message = OutboundMessage::text(question).with_keyboard(confirm_keyboard()?);
    turn.prompt(session.context_mut(), message).await?;
    session.advance();
    Ok(session)
}

/// `YYYY-MM-DD`, `DD.MM.YYYY` or the "today" button.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if is_label(text, labels::TODAY) {
        return Some(today);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d.%m.%Y"))
        .ok()
}
