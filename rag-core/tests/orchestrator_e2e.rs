//! End-to-end orchestrator scenarios over fake collaborators

use rag_core::chat::{RagOrchestrator, Role};
use rag_core::config::RagSettings;
use rag_core::embeddings::SharedEmbedder;
use rag_core::error::Error;
use rag_core::memory::{Recall, SearchOptions, VectorMemory};
use rag_core::store::FragmentStore;
use rag_core::types::FragmentDraft;
use rag_core::workers::{WorkerConfig, WorkerPool, WorkerPoolConfig};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{draft, legacy_fragment, FakeLlm, InMemoryFragmentStore, KeywordEmbedder};
use tokio_util::sync::CancellationToken;

const DIMENSION: usize = 64;
const FALLBACK: &str =
    "I don't have any relevant information in my knowledge base to answer that question.";

fn embedder() -> SharedEmbedder {
    SharedEmbedder::new(Arc::new(KeywordEmbedder::new(DIMENSION)), DIMENSION)
}

async fn pool_for(fake: &FakeLlm, capacity: usize, timeout: Duration) -> WorkerPool {
    let pool = WorkerPool::new(WorkerPoolConfig {
        capacity,
        worker: WorkerConfig {
            executable_path: fake.executable.clone(),
            model_path: fake.model.clone(),
            query_timeout: timeout,
        },
    });
    pool.warm_up(|_, _| {}).await.unwrap();
    pool
}

/// Settings with the threshold fully opened so keyword-embedder scores
/// never gate the behavior under test.
fn permissive_settings() -> RagSettings {
    RagSettings {
        min_score: -1.0,
        ..RagSettings::default()
    }
}

fn orchestrator_over(
    store: Arc<InMemoryFragmentStore>,
    pool: WorkerPool,
    settings: RagSettings,
) -> RagOrchestrator {
    let memory = Arc::new(VectorMemory::new(store, embedder(), "rules"));
    RagOrchestrator::new(memory, pool, settings)
}

#[tokio::test]
async fn test_empty_question_is_rejected() {
    let fake = FakeLlm::echoing("ok");
    let pool = pool_for(&fake, 1, Duration::from_secs(5)).await;
    let orchestrator = orchestrator_over(Arc::new(InMemoryFragmentStore::new()), pool, permissive_settings());

    let result = orchestrator.ask("   ", &CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::BadRequest(_))));
    assert!(orchestrator.conversation().is_empty());
}

#[tokio::test]
async fn test_empty_knowledge_base_falls_back_without_acquiring() {
    let fake = FakeLlm::echoing("should never run");
    let pool = pool_for(&fake, 2, Duration::from_secs(5)).await;
    let orchestrator =
        orchestrator_over(Arc::new(InMemoryFragmentStore::new()), pool.clone(), permissive_settings());

    let reply = orchestrator
        .ask("anything?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply, FALLBACK);

    // The pool was never touched.
    assert_eq!(pool.available(), 2);
    assert_eq!(pool.outstanding(), 0);

    // Exactly one user entry, no assistant entry.
    let log = orchestrator.conversation();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].role, Role::User);
}

#[tokio::test]
async fn test_single_match_retrieval_renders_relevance() {
    let store = Arc::new(InMemoryFragmentStore::new());
    let memory = VectorMemory::new(Arc::clone(&store) as Arc<dyn FragmentStore>, embedder(), "rules");
    memory
        .ingest(
            vec![draft("Combat", "Roll 2d6 to attack.")],
            "rules",
            false,
        )
        .await
        .unwrap();

    let options = SearchOptions {
        top_k: 1,
        min_score: 0.0,
        ..SearchOptions::default()
    };
    let rendered = memory
        .search("How do I roll to attack?", &options)
        .await
        .unwrap()
        .unwrap();
    assert!(rendered.contains("Roll 2d6 to attack."));
    assert!(rendered.contains("[Relevance: "));
    assert!(rendered.contains("[Combat]"));
}

#[tokio::test]
async fn test_successful_ask_logs_both_turns() {
    let fake = FakeLlm::echoing("Roll 2d6 and add your bonus.");
    let pool = pool_for(&fake, 1, Duration::from_secs(10)).await;
    let store = Arc::new(InMemoryFragmentStore::new());
    let orchestrator = orchestrator_over(Arc::clone(&store), pool, permissive_settings());
    orchestrator
        .ingest(vec![draft("Combat", "Roll 2d6 to attack.")], "rules", false)
        .await
        .unwrap();

    let reply = orchestrator
        .ask("How do I attack?", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(reply, "Roll 2d6 and add your bonus.");

    let log = orchestrator.conversation();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].role, Role::User);
    assert_eq!(log[0].text, "How do I attack?");
    assert_eq!(log[1].role, Role::Assistant);
    assert_eq!(log[1].text, "Roll 2d6 and add your bonus.");
}

#[tokio::test]
async fn test_collection_administration_via_orchestrator() {
    let fake = FakeLlm::echoing("ok");
    let pool = pool_for(&fake, 1, Duration::from_secs(5)).await;
    let orchestrator =
        orchestrator_over(Arc::new(InMemoryFragmentStore::new()), pool, permissive_settings());

    let written = orchestrator
        .ingest(
            vec![draft("Combat", "Roll 2d6 to attack."), draft("Magic", "Spend mana.")],
            "rules",
            false,
        )
        .await
        .unwrap();
    assert_eq!(written, 2);

    assert_eq!(orchestrator.list_collections().await.unwrap(), vec!["rules".to_string()]);

    let stats = orchestrator.stats("rules").await.unwrap();
    assert_eq!(stats.fragment_count, 2);
    assert_eq!(stats.embedded_count, 2);

    orchestrator.delete_collection("rules").await.unwrap();
    assert!(orchestrator.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_burst_of_asks_completes_within_capacity() {
    let fake = FakeLlm::slow("a terse answer", 120);
    let pool = pool_for(&fake, 2, Duration::from_secs(10)).await;
    let store = Arc::new(InMemoryFragmentStore::new());
    let orchestrator = Arc::new(orchestrator_over(Arc::clone(&store), pool.clone(), permissive_settings()));
    orchestrator
        .ingest(vec![draft("Combat", "Roll 2d6 to attack.")], "rules", false)
        .await
        .unwrap();

    let watcher = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let mut max_outstanding = 0;
            for _ in 0..200 {
                max_outstanding = max_outstanding.max(pool.outstanding());
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            max_outstanding
        })
    };

    let mut handles = Vec::new();
    for _ in 0..5 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            orchestrator
                .ask("How do I attack?", &CancellationToken::new())
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), "a terse answer");
    }

    assert!(watcher.await.unwrap() <= 2);
    assert_eq!(pool.available(), 2);
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test]
async fn test_generation_failure_renders_error_reply() {
    // Every query against this script times out with no answer.
    let fake = FakeLlm::silent();
    let pool = pool_for(&fake, 1, Duration::from_millis(300)).await;
    let store = Arc::new(InMemoryFragmentStore::new());
    let orchestrator = orchestrator_over(Arc::clone(&store), pool.clone(), permissive_settings());
    orchestrator
        .ingest(vec![draft("Combat", "Roll 2d6 to attack.")], "rules", false)
        .await
        .unwrap();

    let reply = orchestrator
        .ask("How do I attack?", &CancellationToken::new())
        .await
        .unwrap();
    assert!(reply.starts_with("[ERROR] Failed to get response: "));

    // Exactly one user entry, no assistant entry.
    let log = orchestrator.conversation();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].role, Role::User);

    // The failed worker went back through release and was dropped; the pool
    // still restores full capacity for the next caller.
    assert_eq!(pool.outstanding(), 0);
    let lease = pool.acquire(&CancellationToken::new()).await.unwrap();
    assert!(lease.worker().unwrap().is_healthy());
}

#[tokio::test]
async fn test_legacy_and_weighted_fragments_rank_together() {
    let store = Arc::new(InMemoryFragmentStore::new());

    // A legacy row: only the combined embedding, produced by hand.
    let embedder = embedder();
    let legacy_combined = embedder.embed("Magic\n\nSpend mana to cast spells.").await.unwrap();
    store
        .bulk_insert(&[legacy_fragment(
            "rules",
            "Magic",
            "Spend mana to cast spells.",
            legacy_combined,
        )])
        .await
        .unwrap();

    // A post-migration row through the normal ingestion path.
    let memory = VectorMemory::new(
        Arc::clone(&store) as Arc<dyn FragmentStore>,
        embedder,
        "rules",
    );
    memory
        .ingest(vec![draft("Combat", "Roll 2d6 to attack.")], "rules", false)
        .await
        .unwrap();

    let options = SearchOptions {
        top_k: 5,
        min_score: -1.0,
        ..SearchOptions::default()
    };
    let rendered = memory
        .search("How do I spend mana to cast spells?", &options)
        .await
        .unwrap()
        .unwrap();

    // Both scoring paths participate without exceptions.
    assert!(rendered.contains("Spend mana to cast spells."));
    assert!(rendered.contains("Roll 2d6 to attack."));
    // The spell question must rank the magic fragment first.
    let magic_pos = rendered.find("Magic").unwrap();
    let combat_pos = rendered.find("Combat").unwrap();
    assert!(magic_pos < combat_pos);
}

#[tokio::test]
async fn test_transient_store_failure_is_retried() {
    let store = Arc::new(InMemoryFragmentStore::new());
    let memory = VectorMemory::new(Arc::clone(&store) as Arc<dyn FragmentStore>, embedder(), "rules");
    memory
        .ingest(vec![draft("Combat", "Roll 2d6 to attack.")], "rules", false)
        .await
        .unwrap();

    store.inject_transient_failures(1);
    let options = SearchOptions {
        min_score: 0.0,
        ..SearchOptions::default()
    };
    let rendered = memory.search("How do I attack?", &options).await.unwrap();
    assert!(rendered.is_some());
}

#[tokio::test]
async fn test_cancelled_ask_propagates() {
    // Capacity 1 and a held lease force ask() to queue on acquire.
    let fake = FakeLlm::echoing("ok");
    let pool = pool_for(&fake, 1, Duration::from_secs(10)).await;
    let store = Arc::new(InMemoryFragmentStore::new());
    let orchestrator = Arc::new(orchestrator_over(Arc::clone(&store), pool.clone(), permissive_settings()));
    orchestrator
        .ingest(vec![draft("Combat", "Roll 2d6 to attack.")], "rules", false)
        .await
        .unwrap();

    let lease = pool.acquire(&CancellationToken::new()).await.unwrap();

    let cancel = CancellationToken::new();
    let asking = {
        let orchestrator = Arc::clone(&orchestrator);
        let cancel = cancel.clone();
        tokio::spawn(async move { orchestrator.ask("How do I attack?", &cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let result = asking.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));

    drop(lease);
    assert_eq!(pool.available(), 1);
}
