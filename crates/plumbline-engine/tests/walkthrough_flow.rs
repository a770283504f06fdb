//! Walkthrough pipeline tests over in-memory adapters: session start,
//! stepwise advance, completion, and the human-review rerun loop.

use async_trait::async_trait;
use plumbline_core::blob::{BlobError, BlobObject, BlobStore};
use plumbline_core::config::OrchestratorConfig;
use plumbline_core::conversation::ConversationRepository;
use plumbline_core::gateway::{CompletionGateway, GatewayError, Turn};
use plumbline_core::prompt::PromptResolver;
use plumbline_core::walkthrough::{AnalysisKind, WalkthroughRepository, WalkthroughSession};
use plumbline_engine::{
    ConversationEngine, ExchangeRequest, RerunRequest, StartSessionRequest, WalkthroughEngine,
};
use plumbline_infrastructure::{InMemoryConversationRepository, InMemoryWalkthroughRepository};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Gateway stub that records every submitted turn list and replies from a
/// script, repeating a fallback when the script runs out.
struct ScriptedGateway {
    replies: Mutex<VecDeque<String>>,
    recorded: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedGateway {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            recorded: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }

    fn last_prompt(&self) -> String {
        let recorded = self.recorded.lock().unwrap();
        recorded.last().unwrap().last().unwrap().text()
    }
}

#[async_trait]
impl CompletionGateway for ScriptedGateway {
    async fn complete(&self, turns: &[Turn]) -> Result<String, GatewayError> {
        self.recorded.lock().unwrap().push(turns.to_vec());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "scripted fallback".to_string()))
    }
}

/// Gateway stub replying with the text of the final submitted turn.
struct EchoGateway;

#[async_trait]
impl CompletionGateway for EchoGateway {
    async fn complete(&self, turns: &[Turn]) -> Result<String, GatewayError> {
        let last = turns.last().ok_or_else(|| GatewayError::InvalidRequest {
            message: "no turns".to_string(),
        })?;
        Ok(last.text())
    }
}

/// Resolver serving deterministic text for every (namespace, key) pair, so
/// caller-selected prompt keys resolve without a seeded catalog.
struct StaticResolver;

#[async_trait]
impl PromptResolver for StaticResolver {
    async fn get_prompt(&self, namespace: &str, key: &str) -> plumbline_core::Result<String> {
        Ok(format!("[{namespace}/{key}] directive text"))
    }
}

struct EmptyBlobStore;

#[async_trait]
impl BlobStore for EmptyBlobStore {
    async fn resolve(&self, reference: &str) -> Result<BlobObject, BlobError> {
        Err(BlobError::NotFound {
            reference: reference.to_string(),
        })
    }
}

struct Harness {
    gateway: Arc<ScriptedGateway>,
    conversations: Arc<InMemoryConversationRepository>,
    walkthroughs: Arc<InMemoryWalkthroughRepository>,
    conversation_engine: Arc<ConversationEngine>,
    engine: WalkthroughEngine,
}

fn harness(replies: &[&str]) -> Harness {
    let gateway = ScriptedGateway::new(replies);
    with_gateway(gateway.clone(), gateway)
}

fn with_gateway(
    gateway: Arc<ScriptedGateway>,
    completion: Arc<dyn CompletionGateway>,
) -> Harness {
    let conversations = Arc::new(InMemoryConversationRepository::new());
    let walkthroughs = Arc::new(InMemoryWalkthroughRepository::new());
    let resolver = Arc::new(StaticResolver);
    let conversation_engine = Arc::new(ConversationEngine::new(
        conversations.clone(),
        completion,
        resolver.clone(),
        Arc::new(EmptyBlobStore),
        OrchestratorConfig::default(),
    ));
    let engine = WalkthroughEngine::new(
        walkthroughs.clone(),
        conversation_engine.clone(),
        resolver,
    );
    Harness {
        gateway,
        conversations,
        walkthroughs,
        conversation_engine,
        engine,
    }
}

/// Runs the opening exchange and starts a `Selected` session over `keys`.
async fn open_selected_session(harness: &Harness, keys: &[&str]) -> WalkthroughSession {
    let opening = harness
        .conversation_engine
        .exchange_with_recovery(ExchangeRequest {
            user_id: "user-1".to_string(),
            prompt: "Analyse the attached bid package".to_string(),
            prompt_tags: vec!["bid_review".to_string()],
            is_analysis_turn: true,
            ..Default::default()
        })
        .await
        .unwrap();
    harness
        .engine
        .start_session(StartSessionRequest {
            user_id: "user-1".to_string(),
            job_ref: Some("JOB-100".to_string()),
            analysis_kind: AnalysisKind::Selected,
            selected_prompt_keys: keys.iter().map(|k| k.to_string()).collect(),
            conversation_id: opening.conversation_id,
            step_zero_response: opening.text,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_selected_session_runs_start_to_complete() {
    let harness = harness(&["Intake findings", "Line item findings"]);
    let session = open_selected_session(&harness, &["A", "B"]).await;

    assert_eq!(session.prompt_keys, vec!["A".to_string(), "B".to_string()]);

    let step = harness
        .engine
        .next_step(&session.id, "user-1", false)
        .await
        .unwrap();
    assert_eq!(step.step_index, 1);
    assert_eq!(step.prompt_key, "B");
    assert_eq!(step.response, "Line item findings");
    assert_eq!(step.conversation_id, session.conversation_id);

    let err = harness
        .engine
        .next_step(&session.id, "user-1", false)
        .await
        .unwrap_err();
    assert!(err.is_workflow_complete());

    let detail = harness
        .engine
        .session_detail(&session.id, "user-1")
        .await
        .unwrap();
    assert_eq!(detail.steps.len(), 2);
    assert_eq!(detail.steps[0].step_index, 0);
    assert_eq!(detail.steps[0].prompt_key, "A");
    assert_eq!(detail.steps[0].response, "Intake findings");
    assert_eq!(detail.steps[1].step_index, 1);

    // Opening exchange plus one step exchange, all on one conversation.
    assert_eq!(harness.gateway.calls(), 2);
    let messages = harness
        .conversations
        .messages(&session.conversation_id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 4);
}

#[tokio::test]
async fn test_canonical_kind_ignores_selected_keys() {
    let harness = harness(&["Intake findings"]);
    let opening = harness
        .conversation_engine
        .exchange_with_recovery(ExchangeRequest {
            user_id: "user-1".to_string(),
            prompt: "Analyse the attached bid package".to_string(),
            is_analysis_turn: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let session = harness
        .engine
        .start_session(StartSessionRequest {
            user_id: "user-1".to_string(),
            job_ref: None,
            analysis_kind: AnalysisKind::BidReview,
            selected_prompt_keys: vec!["ignored".to_string()],
            conversation_id: opening.conversation_id,
            step_zero_response: opening.text,
        })
        .await
        .unwrap();

    assert_eq!(
        session.prompt_keys,
        vec![
            "bid_review.intake".to_string(),
            "bid_review.scope_gaps".to_string(),
            "bid_review.cost_breakdown".to_string(),
            "bid_review.risk_register".to_string(),
            "bid_review.recommendation".to_string(),
        ]
    );
    let step_zero = harness
        .walkthroughs
        .find_step(&session.id, 0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(step_zero.prompt_key, "bid_review.intake");
}

#[tokio::test]
async fn test_selected_kind_requires_prompt_keys() {
    let harness = harness(&["Opening findings"]);
    let opening = harness
        .conversation_engine
        .exchange_with_recovery(ExchangeRequest {
            user_id: "user-1".to_string(),
            prompt: "Analyse this".to_string(),
            is_analysis_turn: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let err = harness
        .engine
        .start_session(StartSessionRequest {
            user_id: "user-1".to_string(),
            job_ref: None,
            analysis_kind: AnalysisKind::Selected,
            selected_prompt_keys: Vec::new(),
            conversation_id: opening.conversation_id,
            step_zero_response: opening.text,
        })
        .await
        .unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn test_next_step_appends_value_engineering_directive() {
    let harness = harness(&["Intake findings", "Optimised findings"]);
    let session = open_selected_session(&harness, &["A", "B"]).await;

    harness
        .engine
        .next_step(&session.id, "user-1", true)
        .await
        .unwrap();

    let prompt = harness.gateway.last_prompt();
    assert!(prompt.starts_with("[analysis/B]"));
    assert!(prompt.contains("[system/value_engineering]"));
}

#[tokio::test]
async fn test_step_indices_stay_dense_through_rerun() {
    let harness = harness(&[
        "Intake findings",
        "Scope findings",
        "Risk findings",
        "Revised scope findings",
    ]);
    let session = open_selected_session(&harness, &["A", "B", "C"]).await;

    harness.engine.next_step(&session.id, "user-1", false).await.unwrap();
    harness.engine.next_step(&session.id, "user-1", false).await.unwrap();

    let reran = harness
        .engine
        .rerun_step(
            &session.id,
            "user-1",
            1,
            RerunRequest {
                original_response: "Scope findings".to_string(),
                edited_response: "Scope findings, but masonry is excluded".to_string(),
                comments: Some("Check the masonry scope again".to_string()),
                apply_cost_optimisation: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(reran.step_index, 1);
    assert_eq!(reran.response, "Revised scope findings");
    assert_eq!(
        reran.edited_response.as_deref(),
        Some("Scope findings, but masonry is excluded")
    );
    assert_eq!(reran.comments.as_deref(), Some("Check the masonry scope again"));

    let steps = harness.walkthroughs.steps(&session.id).await.unwrap();
    let indices: Vec<usize> = steps.iter().map(|s| s.step_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(steps[1].response, "Revised scope findings");
    assert_eq!(steps[2].response, "Risk findings");

    // A rerun never advances the walkthrough.
    let next = harness
        .engine
        .next_step(&session.id, "user-1", false)
        .await
        .unwrap_err();
    assert!(next.is_workflow_complete());
}

#[tokio::test]
async fn test_rerun_prompt_preserves_edits_verbatim() {
    let gateway = ScriptedGateway::new(&[]);
    let harness = with_gateway(gateway, Arc::new(EchoGateway));
    let session = open_selected_session(&harness, &["A", "B"]).await;
    harness.engine.next_step(&session.id, "user-1", false).await.unwrap();

    let edited = "The quoted total is $940,000 after correcting line 7.";
    let reran = harness
        .engine
        .rerun_step(
            &session.id,
            "user-1",
            1,
            RerunRequest {
                original_response: "The quoted total is $990,000.".to_string(),
                edited_response: edited.to_string(),
                comments: Some("Line 7 was double-counted".to_string()),
                apply_cost_optimisation: true,
            },
        )
        .await
        .unwrap();

    // The echo gateway returns the revision prompt itself, so the response
    // shows exactly what the model was instructed with.
    assert!(reran.response.contains(edited));
    assert!(reran.response.contains("The quoted total is $990,000."));
    assert!(reran.response.contains("Line 7 was double-counted"));
    assert!(reran.response.contains("[analysis/B] directive text"));
    assert!(reran.response.contains("[system/value_engineering]"));
    assert!(reran.response.contains("Do not mention this revision process."));
}

#[tokio::test]
async fn test_rerun_of_missing_step_is_not_found() {
    let harness = harness(&["Intake findings"]);
    let session = open_selected_session(&harness, &["A", "B"]).await;

    let err = harness
        .engine
        .rerun_step(
            &session.id,
            "user-1",
            7,
            RerunRequest {
                original_response: String::new(),
                edited_response: String::new(),
                comments: None,
                apply_cost_optimisation: false,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_foreign_user_cannot_advance_session() {
    let harness = harness(&["Intake findings"]);
    let session = open_selected_session(&harness, &["A", "B"]).await;

    let err = harness
        .engine
        .next_step(&session.id, "user-2", false)
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_exhausted_session_executes_nothing() {
    let harness = harness(&["Intake findings"]);
    let session = open_selected_session(&harness, &["A"]).await;
    let calls_before = harness.gateway.calls();

    let err = harness
        .engine
        .next_step(&session.id, "user-1", false)
        .await
        .unwrap_err();
    assert!(err.is_workflow_complete());

    assert_eq!(harness.gateway.calls(), calls_before);
    assert_eq!(harness.walkthroughs.steps(&session.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_sessions_list_most_recent_first() {
    let harness = harness(&["first", "second"]);
    let earlier = open_selected_session(&harness, &["A"]).await;
    let later = open_selected_session(&harness, &["A"]).await;

    let sessions = harness.engine.sessions_for_user("user-1").await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].id, later.id);
    assert_eq!(sessions[1].id, earlier.id);
}
