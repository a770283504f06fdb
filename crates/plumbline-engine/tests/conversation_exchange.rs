//! Exchange behavior over in-memory adapters: turn reconstruction,
//! attachment inlining, persistence ordering, compaction, and sentinel
//! recovery.

use async_trait::async_trait;
use plumbline_core::blob::{BlobError, BlobObject, BlobStore};
use plumbline_core::config::OrchestratorConfig;
use plumbline_core::conversation::{ConversationRepository, MessageRole};
use plumbline_core::gateway::{CompletionGateway, GatewayError, Turn, TurnRole};
use plumbline_engine::{ConversationEngine, ExchangeRequest};
use plumbline_infrastructure::{
    CachedPromptResolver, InMemoryConversationRepository, PresetPromptResolver,
};
use std::collections::{HashMap, VecDeque};
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

    fn recorded_call(&self, index: usize) -> Vec<Turn> {
        self.recorded.lock().unwrap()[index].clone()
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

struct FailingGateway;

#[async_trait]
impl CompletionGateway for FailingGateway {
    async fn complete(&self, _turns: &[Turn]) -> Result<String, GatewayError> {
        Err(GatewayError::Http {
            status: 503,
            message: "overloaded".to_string(),
            retryable: true,
        })
    }
}

#[derive(Default)]
struct MapBlobStore {
    blobs: HashMap<String, BlobObject>,
}

#[async_trait]
impl BlobStore for MapBlobStore {
    async fn resolve(&self, reference: &str) -> Result<BlobObject, BlobError> {
        self.blobs.get(reference).cloned().ok_or_else(|| BlobError::NotFound {
            reference: reference.to_string(),
        })
    }
}

fn exchange_engine(
    gateway: Arc<dyn CompletionGateway>,
    config: OrchestratorConfig,
) -> (Arc<ConversationEngine>, Arc<InMemoryConversationRepository>) {
    let repository = Arc::new(InMemoryConversationRepository::new());
    let resolver = Arc::new(CachedPromptResolver::new(Arc::new(
        PresetPromptResolver::new(),
    )));
    let engine = Arc::new(ConversationEngine::new(
        repository.clone(),
        gateway,
        resolver,
        Arc::new(MapBlobStore::default()),
        config,
    ));
    (engine, repository)
}

fn request(prompt: &str) -> ExchangeRequest {
    ExchangeRequest {
        user_id: "user-1".to_string(),
        prompt: prompt.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_first_exchange_creates_conversation_and_persists_pair() {
    let gateway = ScriptedGateway::new(&["The bid names Acme Builders."]);
    let (engine, repository) = exchange_engine(gateway.clone(), OrchestratorConfig::default());

    let outcome = engine
        .exchange(ExchangeRequest {
            prompt_tags: vec!["bid_review".to_string()],
            ..request("Who is the bidder?\nCheck the cover letter.")
        })
        .await
        .unwrap();

    assert_eq!(outcome.text, "The bid names Acme Builders.");
    let conversation = repository
        .find_by_id(&outcome.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.title, "Who is the bidder?");
    assert_eq!(conversation.prompt_tags, vec!["bid_review".to_string()]);

    let messages = repository.messages(&outcome.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::User);
    assert_eq!(messages[0].content, "Who is the bidder?\nCheck the cover letter.");
    assert_eq!(messages[1].role, MessageRole::Model);
    assert_eq!(messages[1].content, "The bid names Acme Builders.");
}

#[tokio::test]
async fn test_turn_reconstruction_replays_persona_and_history() {
    let gateway = ScriptedGateway::new(&["first reply", "second reply"]);
    let (engine, _repository) = exchange_engine(gateway.clone(), OrchestratorConfig::default());

    let first = engine
        .exchange(ExchangeRequest {
            prompt_tags: vec!["bid_review".to_string()],
            ..request("first prompt")
        })
        .await
        .unwrap();
    engine
        .exchange(ExchangeRequest {
            conversation_id: Some(first.conversation_id),
            ..request("second prompt")
        })
        .await
        .unwrap();

    let turns = gateway.recorded_call(1);
    assert_eq!(turns.len(), 5);
    assert_eq!(turns[0].role, TurnRole::User);
    assert!(turns[0].text().contains("senior construction estimator"));
    assert_eq!(turns[1].role, TurnRole::Model);
    assert_eq!(turns[2].text(), "first prompt");
    assert_eq!(turns[3].text(), "first reply");
    assert_eq!(turns[3].role, TurnRole::Model);
    assert_eq!(turns[4].text(), "second prompt");

    // The persona head is identical across reconstructions.
    assert_eq!(gateway.recorded_call(0)[0], turns[0]);
    assert_eq!(gateway.recorded_call(0)[1], turns[1]);
}

#[tokio::test]
async fn test_untagged_conversation_has_no_persona_turn() {
    let gateway = ScriptedGateway::new(&["reply"]);
    let (engine, _repository) = exchange_engine(gateway.clone(), OrchestratorConfig::default());

    engine.exchange(request("plain question")).await.unwrap();

    let turns = gateway.recorded_call(0);
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].text(), "plain question");
}

#[tokio::test]
async fn test_gateway_failure_persists_no_messages() {
    let (engine, repository) =
        exchange_engine(Arc::new(FailingGateway), OrchestratorConfig::default());

    let err = engine.exchange(request("doomed prompt")).await.unwrap_err();
    assert!(err.is_gateway());
    assert!(err.is_retryable());

    // The conversation record exists, but the failed attempt left no turns.
    let conversations = engine.conversations_for_user("user-1").await.unwrap();
    assert_eq!(conversations.len(), 1);
    let messages = repository.messages(&conversations[0].id).await.unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_unknown_conversation_is_not_found() {
    let gateway = ScriptedGateway::new(&[]);
    let (engine, _repository) = exchange_engine(gateway, OrchestratorConfig::default());

    let err = engine
        .exchange(ExchangeRequest {
            conversation_id: Some("missing".to_string()),
            ..request("hello")
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_foreign_conversation_is_unauthorized() {
    let gateway = ScriptedGateway::new(&["reply"]);
    let (engine, _repository) = exchange_engine(gateway, OrchestratorConfig::default());

    let owned = engine.exchange(request("mine")).await.unwrap();
    let err = engine
        .exchange(ExchangeRequest {
            conversation_id: Some(owned.conversation_id),
            user_id: "user-2".to_string(),
            prompt: "theirs".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn test_resolved_attachments_inline_and_failures_skip() {
    let gateway = ScriptedGateway::new(&["reply"]);
    let repository = Arc::new(InMemoryConversationRepository::new());
    let mut blobs = HashMap::new();
    blobs.insert(
        "uploads/bid.pdf".to_string(),
        BlobObject {
            bytes: b"%PDF-1.7 bid".to_vec(),
            mime_type: "application/pdf".to_string(),
        },
    );
    let engine = ConversationEngine::new(
        repository,
        gateway.clone(),
        Arc::new(CachedPromptResolver::new(Arc::new(
            PresetPromptResolver::new(),
        ))),
        Arc::new(MapBlobStore { blobs }),
        OrchestratorConfig::default(),
    );

    engine
        .exchange(ExchangeRequest {
            attachments: vec![
                "uploads/bid.pdf".to_string(),
                "uploads/gone.pdf".to_string(),
            ],
            ..request("Analyse the attached bid")
        })
        .await
        .unwrap();

    let turns = gateway.recorded_call(0);
    let prompt_turn = turns.last().unwrap();
    assert_eq!(prompt_turn.attachments.len(), 1);
    assert_eq!(prompt_turn.attachments[0].mime_type, "application/pdf");
    assert_eq!(prompt_turn.attachments[0].data, b"%PDF-1.7 bid".to_vec());
}

#[tokio::test]
async fn test_recovery_issues_single_corrective_exchange() {
    let gateway = ScriptedGateway::new(&[
        "DOCUMENT UNUSABLE, the scan is rotated and illegible.",
        "On a second reading, pages 2-4 are legible: the bid totals $1.2M.",
    ]);
    let (engine, repository) = exchange_engine(gateway.clone(), OrchestratorConfig::default());

    let outcome = engine
        .exchange_with_recovery(ExchangeRequest {
            prompt_tags: vec!["bid_review".to_string()],
            ..request("Analyse the attached bid")
        })
        .await
        .unwrap();

    assert_eq!(gateway.calls(), 2);
    assert_eq!(
        outcome.text,
        "On a second reading, pages 2-4 are legible: the bid totals $1.2M."
    );

    // The failed attempt stays in history, followed by the corrective turn.
    let messages = repository.messages(&outcome.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 4);
    assert!(messages[1].content.contains("DOCUMENT UNUSABLE"));
    assert_eq!(messages[2].role, MessageRole::User);
    assert!(messages[2].content.contains("Re-examine"));
    assert!(messages[2].content.contains("Previous response:"));
    assert!(messages[2].content.contains("DOCUMENT UNUSABLE"));
}

#[tokio::test]
async fn test_recovery_is_single_shot() {
    let gateway = ScriptedGateway::new(&[
        "DOCUMENT UNUSABLE, nothing is legible.",
        "document unusable, still nothing legible.",
    ]);
    let (engine, _repository) = exchange_engine(gateway.clone(), OrchestratorConfig::default());

    let outcome = engine
        .exchange_with_recovery(request("Analyse the attached bid"))
        .await
        .unwrap();

    // The corrective outcome is final even when the sentinel reappears.
    assert_eq!(gateway.calls(), 2);
    assert_eq!(outcome.text, "document unusable, still nothing legible.");
}

#[tokio::test]
async fn test_clean_response_skips_recovery() {
    let gateway = ScriptedGateway::new(&["A clean, usable analysis."]);
    let (engine, _repository) = exchange_engine(gateway.clone(), OrchestratorConfig::default());

    let outcome = engine
        .exchange_with_recovery(request("Analyse the attached bid"))
        .await
        .unwrap();

    assert_eq!(gateway.calls(), 1);
    assert_eq!(outcome.text, "A clean, usable analysis.");
}

#[tokio::test]
async fn test_analysis_turns_skip_compaction_unless_configured() {
    let config = OrchestratorConfig {
        compaction_threshold_chars: 1,
        ..OrchestratorConfig::default()
    };

    let gateway = ScriptedGateway::new(&["answer"]);
    let (engine, repository) = exchange_engine(gateway.clone(), config.clone());
    let outcome = engine
        .exchange(ExchangeRequest {
            is_analysis_turn: true,
            ..request("analysis prompt")
        })
        .await
        .unwrap();
    assert_eq!(gateway.calls(), 1);
    let conversation = repository
        .find_by_id(&outcome.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert!(conversation.summary.is_none());

    let gateway = ScriptedGateway::new(&["answer", "summary text"]);
    let (engine, repository) = exchange_engine(
        gateway.clone(),
        OrchestratorConfig {
            compact_analysis_turns: true,
            ..config
        },
    );
    let outcome = engine
        .exchange(ExchangeRequest {
            is_analysis_turn: true,
            ..request("analysis prompt")
        })
        .await
        .unwrap();
    assert_eq!(gateway.calls(), 2);
    let conversation = repository
        .find_by_id(&outcome.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.summary.as_deref(), Some("summary text"));
}

#[tokio::test]
async fn test_compacted_history_replays_as_summary_turn() {
    let config = OrchestratorConfig {
        compaction_threshold_chars: 1,
        ..OrchestratorConfig::default()
    };
    let gateway = ScriptedGateway::new(&[
        "answer one",
        "summary text",
        "answer two",
        "merged summary",
    ]);
    let (engine, repository) = exchange_engine(gateway.clone(), config);

    let first = engine.exchange(request("first prompt")).await.unwrap();
    engine
        .exchange(ExchangeRequest {
            conversation_id: Some(first.conversation_id.clone()),
            ..request("second prompt")
        })
        .await
        .unwrap();

    // Call 2 is the second exchange: summary turn, acknowledgment, prompt.
    let turns = gateway.recorded_call(2);
    assert_eq!(turns.len(), 3);
    assert!(turns[0].text().starts_with("Summary of the conversation so far:"));
    assert!(turns[0].text().contains("summary text"));
    assert_eq!(turns[1].role, TurnRole::Model);
    assert_eq!(turns[2].text(), "second prompt");

    // Call 3 is the follow-up compaction, carrying the prior summary forward.
    let compaction_turns = gateway.recorded_call(3);
    assert_eq!(compaction_turns.len(), 1);
    assert!(compaction_turns[0].text().contains("Prior summary:"));
    assert!(compaction_turns[0].text().contains("summary text"));

    let conversation = repository
        .find_by_id(&first.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.summary.as_deref(), Some("merged summary"));
    assert!(
        repository
            .unsummarized_messages(&first.conversation_id)
            .await
            .unwrap()
            .is_empty()
    );
}
