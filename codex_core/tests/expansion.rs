//! End-to-end expansion behaviour driven through the scripted backend.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use codex_core::topic_model::{normalize, NodeStatus};
use codex_core::{
    Article, ExpansionOrchestrator, GraphStore, Leased, ScriptedBackend, SessionOutcome,
    StoreEvent,
};

fn explorer(backend: ScriptedBackend) -> (ExpansionOrchestrator, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let store = Arc::new(GraphStore::default());
    (ExpansionOrchestrator::new(store, backend.clone()), backend)
}

#[tokio::test]
async fn test_end_to_end_expansion() {
    let (explorer, backend) = explorer(ScriptedBackend::new().with_article(
        "Artificial Intelligence",
        "Core AI",
        "Intro [[Machine Learning]] and [[Robotics]].",
    ));

    let activation = explorer.activate_or_expand("Artificial Intelligence", None).unwrap();
    assert!(activation.created);
    let outcome = activation.wait().await.unwrap();

    let references = match outcome {
        SessionOutcome::Completed { references, .. } => references,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(references, vec!["Machine Learning", "Robotics"]);

    let snapshot = explorer.snapshot();
    let root = normalize("Artificial Intelligence");
    assert_eq!(snapshot.nodes.len(), 3);
    assert_eq!(snapshot.edges.len(), 2);
    assert_eq!(snapshot.node(&root).unwrap().status, NodeStatus::Complete);
    assert_eq!(snapshot.node(&root).unwrap().category.as_deref(), Some("Core AI"));
    for child in ["Machine Learning", "Robotics"] {
        let id = normalize(child);
        assert!(snapshot.outgoing(&root).any(|e| e.target_id == id));
        let node = snapshot.node(&id).unwrap();
        assert_eq!(node.status, NodeStatus::Stub);
        assert_eq!(node.name, child);
        assert_eq!(node.parent_id.as_ref(), Some(&root));
    }
    assert_eq!(snapshot.focused, Some(root));
    assert_eq!(backend.total_opens(), 1);
}

#[tokio::test]
async fn test_equivalent_terms_share_one_node() {
    let (explorer, backend) = explorer(ScriptedBackend::new().with_article(
        "Machine Learning",
        "ML",
        "Learning from data",
    ));

    let first = explorer.activate_or_expand("Machine Learning", None).unwrap();
    let second = explorer.activate_or_expand("  machine   LEARNING ", None).unwrap();
    let third = explorer.activate_or_expand("machine-learning", None).unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert!(!third.created);
    assert_eq!(first.node_id, second.node_id);
    assert_eq!(first.node_id, third.node_id);
    assert!(second.session.is_none());
    assert!(third.session.is_none());

    first.wait().await;
    let snapshot = explorer.snapshot();
    assert_eq!(snapshot.nodes.len(), 1);
    assert_eq!(snapshot.nodes[0].name, "Machine Learning");
    assert_eq!(backend.open_count("machine learning"), 1);
}

#[tokio::test]
async fn test_repeated_activation_adds_one_edge() {
    let (explorer, _) = explorer(
        ScriptedBackend::new()
            .with_article("Physics", "Science", "Matter and energy")
            .with_article("Optics", "Science", "Light"),
    );
    let physics = explorer.activate_or_expand("Physics", None).unwrap();
    let physics_id = physics.node_id.clone();
    physics.wait().await;

    for _ in 0..5 {
        explorer.activate_or_expand("Optics", Some(&physics_id)).unwrap();
    }

    let snapshot = explorer.snapshot();
    let edges: Vec<_> = snapshot.outgoing(&physics_id).collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].target_id, normalize("Optics"));
}

#[tokio::test]
async fn test_streamed_content_only_grows() {
    let (explorer, backend) = explorer(ScriptedBackend::new().with_manual("Rust"));
    let mut events = explorer.store().subscribe();
    let id = normalize("Rust");

    let activation = explorer.activate_or_expand("Rust", None).unwrap();
    let feed = backend.next_feed("Rust").await;

    let chunks = ["Rust is ", "a systems ", "language with [[Cargo]]."];
    let mut seen = String::new();
    for chunk in chunks {
        assert!(feed.chunk(chunk));
        loop {
            let event = events.recv().await.unwrap();
            if let StoreEvent::ContentAppended { id: appended, length } = event {
                assert_eq!(appended, id);
                seen.push_str(chunk);
                assert_eq!(length, seen.len());
                break;
            }
        }
        let node = explorer.store().node(&id).unwrap();
        assert_eq!(node.status, NodeStatus::Streaming);
        assert_eq!(node.content, seen);
    }

    feed.complete(Article::new("Rust", "Languages", ""));
    assert!(activation.wait().await.unwrap().is_completed());

    let node = explorer.store().node(&id).unwrap();
    assert_eq!(node.status, NodeStatus::Complete);
    assert_eq!(node.content, chunks.concat());

    // Writes after completion are rejected.
    assert!(explorer.store().append_chunk(&id, "more").is_err());
    assert_eq!(explorer.store().node(&id).unwrap().content, chunks.concat());
}

#[tokio::test]
async fn test_completion_fans_out_without_fetching() {
    let (explorer, backend) = explorer(
        ScriptedBackend::new()
            .with_article("Biology", "Life", "Cells form [[Tissue]]")
            .with_article(
                "Cell",
                "Life",
                "See [[Biology]], [[DNA]], [[Organelle]] and [[dna]] again",
            ),
    );
    let biology = explorer.activate_or_expand("Biology", None).unwrap();
    let biology_id = biology.node_id.clone();
    biology.wait().await;
    let before = explorer.snapshot();

    let cell = explorer.activate_or_expand("Cell", Some(&biology_id)).unwrap();
    let cell_id = cell.node_id.clone();
    let references = match cell.wait().await.unwrap() {
        SessionOutcome::Completed { references, .. } => references,
        other => panic!("expected completion, got {other:?}"),
    };

    // Three distinct terms; Biology already existed.
    assert_eq!(references, vec!["Biology", "DNA", "Organelle"]);
    let after = explorer.snapshot();
    assert_eq!(after.nodes.len(), before.nodes.len() + 1 + 2);
    assert_eq!(after.outgoing(&cell_id).count(), references.len());
    assert!(after.node(&normalize("DNA")).unwrap().status == NodeStatus::Stub);
    assert_eq!(
        after.node(&biology_id).unwrap().parent_id,
        None,
        "existing nodes keep their first parent"
    );

    assert_eq!(backend.open_count("Cell"), 1);
    assert_eq!(backend.total_opens(), 2);
    assert_eq!(explorer.sessions().active_count(), 0);
}

#[tokio::test]
async fn test_superseded_session_cannot_write() {
    let (explorer, backend) = explorer(ScriptedBackend::new().with_manual("Chemistry"));
    let id = normalize("Chemistry");

    let first = explorer.activate_or_expand("Chemistry", None).unwrap();
    let first_feed = backend.next_feed("Chemistry").await;

    let second = explorer.refresh(&id).unwrap();
    let second_feed = backend.next_feed("Chemistry").await;
    second_feed.complete(Article::new("Chemistry", "Science", "Atoms and [[Bonds]]"));
    assert!(second.wait().await.is_completed());
    assert_eq!(first.wait().await, Some(SessionOutcome::Superseded));

    // The first connection was dropped with its task.
    assert!(!first_feed.complete(Article::new("Chemistry", "Stale", "old [[Alchemy]]")));

    let node = explorer.store().node(&id).unwrap();
    assert_eq!(node.status, NodeStatus::Complete);
    assert_eq!(node.content, "Atoms and [[Bonds]]");
    assert!(!explorer.store().contains(&normalize("Alchemy")));
}

#[tokio::test]
async fn test_out_of_order_completion_is_discarded() {
    let store = Arc::new(GraphStore::default());
    let id = normalize("Geology");
    store.create_stub(id.clone(), "Geology", None);

    let stale = store.begin_session(&id).unwrap();
    let current = store.begin_session(&id).unwrap();
    current.append_chunk("Rocks").unwrap();
    current.finalize(Some("Earth".into()), None).unwrap();

    assert!(stale.append_chunk("late chunk").unwrap().is_stale());
    assert!(stale.finalize(Some("Stale".into()), Some("stale".into())).unwrap().is_stale());
    assert!(matches!(stale.mark_failed("broken".into()), Ok(Leased::Stale)));

    let node = store.node(&id).unwrap();
    assert_eq!(node.content, "Rocks");
    assert_eq!(node.category.as_deref(), Some("Earth"));
    assert_eq!(node.status, NodeStatus::Complete);
}

#[tokio::test]
async fn test_backend_error_falls_back() {
    let (explorer, _) =
        explorer(ScriptedBackend::new().with_error("Quantum Foo", "model overloaded"));

    let activation = explorer.activate_or_expand("Quantum Foo", None).unwrap();
    let id = activation.node_id.clone();
    let outcome = activation.wait().await.unwrap();
    assert!(matches!(outcome, SessionOutcome::Failed { .. }));

    let snapshot = explorer.snapshot();
    let node = snapshot.node(&id).unwrap();
    assert_eq!(node.status, NodeStatus::Failed);
    assert!(!node.content.is_empty());
    assert!(node.content.contains("Quantum Foo"));
    assert_eq!(snapshot.outgoing(&id).count(), 0);
    assert_eq!(snapshot.focused, Some(id));
}

#[tokio::test]
async fn test_failure_does_not_affect_siblings() {
    let (explorer, _) = explorer(
        ScriptedBackend::new()
            .with_article("Root", "Hub", "[[Good]] and [[Bad]]")
            .with_chunks("Good", "Fine", &["All ", "well"])
            .with_error("Bad", "boom"),
    );
    let root = explorer.activate_or_expand("Root", None).unwrap();
    let root_id = root.node_id.clone();
    root.wait().await;

    let good = explorer.activate_or_expand("Good", Some(&root_id)).unwrap();
    let bad = explorer.activate_or_expand("Bad", Some(&root_id)).unwrap();
    let (good, bad) = tokio::join!(good.wait(), bad.wait());

    assert!(good.unwrap().is_completed());
    assert!(matches!(bad, Some(SessionOutcome::Failed { .. })));
    let snapshot = explorer.snapshot();
    assert_eq!(snapshot.node(&normalize("Good")).unwrap().content, "All well");
    assert_eq!(snapshot.node(&root_id).unwrap().status, NodeStatus::Complete);
    assert_eq!(snapshot.focused, Some(normalize("Bad")));
}

#[tokio::test]
async fn test_unscripted_topic_fails_gracefully() {
    let (explorer, _) = explorer(ScriptedBackend::new());

    let activation = explorer.seed_root("Nowhere").unwrap();
    let id = activation.node_id.clone();
    activation.wait().await;

    let node = explorer.store().node(&id).unwrap();
    assert_eq!(node.status, NodeStatus::Failed);
    assert!(node.is_root());
}
