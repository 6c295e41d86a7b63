//! Integration tests for the dispatcher

use async_trait::async_trait;
use band_core::{
    ChatId, FileHosting, FileRef, HostingError, InboundEvent, MediaRef, MessageId, Messenger,
    OutboundMessage, SearchPage, Services, StoreError, TransportError, UserId,
};
use bytes::Bytes;
use flow_engine::{
    AuditReport, AuditSink, CancelInterceptor, CaptureInterceptor, DispatchOutcome, Dispatcher,
    FailureStage, FlowDef, FlowError, FlowRegistry, Turn, DEFAULT_FAILURE_NOTICE,
};
use flow_state::{Context, FlowName, Session, StateNode};
use mockall::mock;
use session_store::{MemorySessionStorage, SessionError, SessionManager, SessionStorage};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

const SEARCH: FlowName = FlowName::from_static("search");
const CREATE_EVENT: FlowName = FlowName::from_static("create_event");
const INGEST: FlowName = FlowName::from_static("ingest");
const BROKEN: FlowName = FlowName::from_static("broken");
const LOOP: FlowName = FlowName::from_static("loop");
const COUNTER: FlowName = FlowName::from_static("counter");

// ========== Collaborators ==========

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(ChatId, String)>>,
    retracted: Mutex<Vec<MessageId>>,
    next_id: AtomicI32,
}

impl RecordingMessenger {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn sent_to(&self, chat: ChatId) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == chat)
            .count()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, chat: ChatId, message: OutboundMessage) -> Result<MessageId, TransportError> {
        let text = message.text_body().unwrap_or_default().to_string();
        self.sent.lock().unwrap().push((chat, text));
        Ok(MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn retract(&self, _chat: ChatId, message: MessageId) -> Result<(), TransportError> {
        self.retracted.lock().unwrap().push(message);
        Ok(())
    }
}

struct NoFiles;

#[async_trait]
impl FileHosting for NoFiles {
    async fn search(&self, _text: &str, _page: Option<&str>) -> Result<SearchPage, HostingError> {
        Ok(SearchPage::default())
    }

    async fn download(&self, file: &FileRef) -> Result<Bytes, HostingError> {
        Err(HostingError::NotFound(file.id.clone()))
    }
}

#[derive(Default)]
struct RecordingAudit {
    reports: Mutex<Vec<AuditReport>>,
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn report(&self, report: AuditReport) {
        self.reports.lock().unwrap().push(report);
    }
}

mock! {
    pub Storage {}

    #[async_trait]
    impl SessionStorage for Storage {
        async fn load(&self, user_id: UserId) -> session_store::Result<Option<Session>>;
        async fn save(&self, session: &Session) -> session_store::Result<u64>;
    }
}

// ========== Test flows ==========

async fn menu(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    match turn.text() {
        Some("loop") => turn.start(session, LOOP, Context::new()).await,
        Some("broken") => turn.start(session, BROKEN, Context::new()).await,
        Some("count") => turn.start(session, COUNTER, Context::new()).await,
        Some(_) => {
            let mut session = session;
            session.push(SEARCH, Context::new());
            turn.forward(session).await
        }
        None => {
            turn.say("Main menu").await?;
            Ok(session)
        }
    }
}

async fn search_query(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(query) = turn.text() else {
        turn.say("What are you looking for?").await?;
        return Ok(session);
    };
    let context = session.context_mut();
    context.query = Some(query.to_string());
    context.set("results", vec![format!("{query}.pdf")]);
    let prompt = turn.say(format!("Results for {query}")).await?;
    context.track(prompt);
    session.advance();
    Ok(session)
}

async fn search_choose(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    if turn.text().is_some() {
        return turn.finish(session).await;
    }
    Ok(session)
}

async fn prompt_step(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if turn.text().is_some() {
        session.advance();
        return turn.enter(session).await;
    }
    turn.say(format!("{} step {}", session.flow(), session.step()))
        .await?;
    Ok(session)
}

async fn ingest_start(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if session.context().media.is_none() {
        return turn.finish(session).await;
    }
    turn.say("Name this recording").await?;
    session.advance();
    Ok(session)
}

async fn ingest_save(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(name) = turn.text() else {
        turn.say("Name this recording").await?;
        return Ok(session);
    };
    session.context_mut().set("name", name);
    turn.say(format!("Saved {name}")).await?;
    turn.finish(session).await
}

async fn fail_step(_turn: &Turn, _session: Session) -> Result<Session, FlowError> {
    Err(StoreError::Unavailable("database offline".to_string()).into())
}

async fn loop_step(turn: &Turn, session: Session) -> Result<Session, FlowError> {
    turn.enter(session).await
}

async fn count_step(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    if turn.text().is_some() {
        let count = session.context().number("count").unwrap_or(0);
        session.context_mut().set("count", count + 1);
        tokio::task::yield_now().await;
    }
    Ok(session)
}

fn registry() -> Arc<FlowRegistry> {
    Arc::new(
        FlowRegistry::builder()
            .flow(FlowDef::new(FlowName::MAIN_MENU).step(menu))
            .flow(FlowDef::new(SEARCH).step(search_query).step(search_choose))
            .flow(
                FlowDef::new(CREATE_EVENT)
                    .step(prompt_step)
                    .step(prompt_step)
                    .step(prompt_step),
            )
            .flow(FlowDef::new(INGEST).step(ingest_start).step(ingest_save))
            .flow(FlowDef::new(BROKEN).step(fail_step))
            .flow(FlowDef::new(LOOP).step(loop_step))
            .flow(FlowDef::new(COUNTER).step(count_step))
            .build()
            .unwrap(),
    )
}

struct Harness {
    dispatcher: Dispatcher,
    storage: Arc<dyn SessionStorage>,
    messenger: Arc<RecordingMessenger>,
    audit: Arc<RecordingAudit>,
}

fn harness_with(storage: Arc<dyn SessionStorage>) -> Harness {
    let messenger = Arc::new(RecordingMessenger::default());
    let audit = Arc::new(RecordingAudit::default());
    let services = Arc::new(Services::in_memory(Arc::new(NoFiles), messenger.clone()));
    let dispatcher = Dispatcher::new(
        Arc::new(SessionManager::new(storage.clone())),
        services,
        registry(),
    )
    .with_interceptor(CancelInterceptor::new("Cancel"))
    .with_interceptor(CaptureInterceptor::new(INGEST).carry("song_id"))
    .with_audit(audit.clone());

    Harness {
        dispatcher,
        storage,
        messenger,
        audit,
    }
}

fn harness() -> Harness {
    harness_with(Arc::new(MemorySessionStorage::new()))
}

const USER: UserId = UserId(42);

impl Harness {
    async fn send(&self, text: &str) -> DispatchOutcome {
        self.dispatcher
            .dispatch(InboundEvent::text(USER, text))
            .await
    }

    async fn stored(&self) -> Session {
        self.storage.load(USER).await.unwrap().unwrap()
    }

    async fn seed(&self, session: &Session) {
        self.storage.save(session).await.unwrap();
    }
}

fn at(flow: FlowName, step: i32) -> Session {
    let mut session = Session::new(USER);
    if flow != FlowName::MAIN_MENU {
        session.push(flow, Context::new());
    }
    session.set_step(step);
    session
}

// ========== Recovery ==========

#[tokio::test]
async fn test_out_of_range_step_resets_to_main_menu() {
    for session in [at(SEARCH, -1), at(SEARCH, 2), at(CREATE_EVENT, 3), at(FlowName::MAIN_MENU, -1)] {
        let h = harness();
        h.seed(&session).await;

        let outcome = h
            .dispatcher
            .dispatch(InboundEvent::callback(USER, "pg:next", MessageId(9)))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                flow: FlowName::MAIN_MENU,
                step: 0,
                depth: 1,
                version: 2,
            }
        );
        assert!(h.stored().await.states.is_main_menu());
        assert_eq!(h.messenger.texts(), vec!["Main menu".to_string()]);
        assert!(h.audit.reports.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_unknown_flow_resets_silently() {
    let h = harness();
    let mut session = Session::new(USER);
    session.goto(FlowName::new("retired_flow"), Context::new().with("x", 1i64));
    h.seed(&session).await;

    let outcome = h
        .dispatcher
        .dispatch(InboundEvent::callback(USER, "ok:y", MessageId(1)))
        .await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Completed { ref flow, step: 0, depth: 1, .. } if *flow == FlowName::MAIN_MENU
    ));
    assert_eq!(h.stored().await.current(), &StateNode::main_menu());
    assert!(!h.messenger.texts().contains(&DEFAULT_FAILURE_NOTICE.to_string()));
}

// ========== Cancel ==========

#[tokio::test]
async fn test_cancel_at_main_menu_is_a_no_op() {
    let h = harness();
    let outcome = h.send("Cancel").await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Completed { step: 0, depth: 1, .. }
    ));
    assert!(h.stored().await.states.is_main_menu());

    h.send("/cancel").await;
    let stored = h.stored().await;
    assert!(stored.states.is_main_menu());
    assert_eq!(stored.current(), &StateNode::main_menu());
}

#[tokio::test]
async fn test_search_then_cancel_discards_results() {
    let h = harness();
    h.seed(&at(SEARCH, 0)).await;

    h.send("Amazing Grace").await;
    let stored = h.stored().await;
    assert_eq!(stored.flow(), &SEARCH);
    assert_eq!(stored.step(), 1);
    assert_eq!(stored.context().query.as_deref(), Some("Amazing Grace"));
    assert_eq!(stored.context().text_list("results"), ["Amazing Grace.pdf"]);

    h.send("Cancel").await;
    let stored = h.stored().await;
    assert!(stored.states.is_main_menu());
    assert_eq!(stored.states.depth(), 1);
    assert!(stored.context().get("results").is_none());
    // The results prompt went stale with the flow.
    assert_eq!(h.messenger.retracted.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_restarts_parent_at_step_zero() {
    let h = harness();
    let mut session = at(CREATE_EVENT, 2);
    session.push(SEARCH, Context::new());
    session.advance();
    h.seed(&session).await;

    h.send("cancel").await;
    let stored = h.stored().await;
    assert_eq!(stored.flow(), &CREATE_EVENT);
    assert_eq!(stored.step(), 0);
    assert_eq!(
        h.messenger.texts().last().map(String::as_str),
        Some("create_event step 0")
    );
}

// ========== Out-of-band capture ==========

#[tokio::test]
async fn test_voice_mid_flow_resumes_exact_position() {
    let h = harness();
    let mut session = at(CREATE_EVENT, 2);
    session.context_mut().set("name", "Sunday service");
    session.context_mut().set("song_id", "song-7");
    session.context_mut().track(MessageId(77));
    h.seed(&session).await;
    let before = h.stored().await.current().clone();

    h.dispatcher
        .dispatch(InboundEvent::voice(USER, MediaRef::new("voice-1")))
        .await;
    let stored = h.stored().await;
    assert_eq!(stored.flow(), &INGEST);
    assert_eq!(stored.step(), 1);
    assert_eq!(stored.context().text("song_id"), Some("song-7"));
    let parent = stored.states.parent().unwrap();
    assert_eq!(parent, &before);
    assert!(h.messenger.retracted.lock().unwrap().is_empty());

    h.send("Alto").await;
    let stored = h.stored().await;
    assert_eq!(stored.current(), &before);
    assert_eq!(stored.context().retract, vec![MessageId(77)]);
    assert_eq!(stored.context().text("name"), Some("Sunday service"));
    assert_eq!(
        h.messenger.texts().last().map(String::as_str),
        Some("create_event step 2")
    );
}

// ========== Failures ==========

#[tokio::test]
async fn test_step_failure_leaves_session_untouched() {
    let h = harness();
    h.seed(&at(BROKEN, 0)).await;
    let seeded = h.stored().await;

    let outcome = h.send("anything").await;
    assert_eq!(outcome, DispatchOutcome::StepFailed);
    assert_eq!(h.stored().await, seeded);

    let reports = h.audit.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stage, FailureStage::Step);
    assert_eq!(reports[0].position, Some((BROKEN, 0)));
    assert!(reports[0].error.contains("database offline"));

    let texts = h.messenger.texts();
    assert_eq!(texts, vec![DEFAULT_FAILURE_NOTICE.to_string()]);
}

#[tokio::test]
async fn test_runaway_hops_fail_the_turn() {
    let h = harness();
    let outcome = h.send("loop").await;
    assert_eq!(outcome, DispatchOutcome::StepFailed);
    assert!(h.storage.load(USER).await.unwrap().is_none());
    assert!(h.audit.reports.lock().unwrap()[0]
        .error
        .contains("hops"));
}

#[tokio::test]
async fn test_load_failure_sends_notice_only() {
    let mut storage = MockStorage::new();
    storage.expect_load().returning(|_| {
        Err(SessionError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk gone",
        )))
    });
    storage.expect_save().never();
    let h = harness_with(Arc::new(storage));

    let outcome = h.send("hello").await;
    assert_eq!(outcome, DispatchOutcome::LoadFailed);
    assert_eq!(h.messenger.texts(), vec![DEFAULT_FAILURE_NOTICE.to_string()]);
    let reports = h.audit.reports.lock().unwrap();
    assert_eq!(reports[0].stage, FailureStage::Load);
    assert_eq!(reports[0].position, None);
}

#[tokio::test]
async fn test_save_failure_is_audited() {
    let mut storage = MockStorage::new();
    storage.expect_load().returning(|_| Ok(None));
    storage
        .expect_save()
        .times(1)
        .returning(|_| Err(SessionError::Task("worker panicked".to_string())));
    let h = harness_with(Arc::new(storage));

    let outcome = h.send("Cancel").await;
    assert_eq!(outcome, DispatchOutcome::SaveFailed);
    assert_eq!(h.audit.reports.lock().unwrap()[0].stage, FailureStage::Save);
}

#[tokio::test]
async fn test_conflicting_save_is_rejected_not_lost() {
    let mut storage = MockStorage::new();
    storage.expect_load().returning(|user_id| {
        let mut session = Session::new(user_id);
        session.version = 4;
        Ok(Some(session))
    });
    storage.expect_save().times(1).returning(|session| {
        Err(SessionError::Conflict {
            user_id: session.user_id,
            expected: session.version,
            found: 5,
        })
    });
    let h = harness_with(Arc::new(storage));

    let outcome = h.send("Cancel").await;
    assert_eq!(outcome, DispatchOutcome::Conflict);
    assert!(h.audit.reports.lock().unwrap().is_empty());
    assert_eq!(
        h.messenger.texts().last().map(String::as_str),
        Some(DEFAULT_FAILURE_NOTICE)
    );
}

// ========== Concurrency ==========

#[tokio::test]
async fn test_same_user_messages_are_serialized() {
    let h = Arc::new(harness());
    h.send("count").await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let h = h.clone();
            tokio::spawn(async move { h.send("+1").await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_completed());
    }

    let stored = h.stored().await;
    assert_eq!(stored.context().number("count"), Some(10));
    assert_eq!(stored.version, 11);
    assert_eq!(h.dispatcher.sessions().active_lanes(), 0);
    assert!(h.messenger.sent_to(ChatId(42)) >= 1);
}
