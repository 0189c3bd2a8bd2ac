//! End-to-end processor behavior against the in-memory store and agent
//! doubles: transition sequences, retry accounting, and the deliberate
//! no-rollback contract.

use std::sync::Arc;

use shepherd::testing::{AgentCall, MockCodeAgent, MockTaskStore, StoreCall};
use shepherd::{AgentOutcome, Stage, Task, TaskProcessor, PLAN_PROPERTY};

fn processor(
    store: &Arc<MockTaskStore>,
    agent: &Arc<MockCodeAgent>,
    max_retries: u32,
) -> TaskProcessor<MockTaskStore, MockCodeAgent> {
    TaskProcessor::new(store.clone(), agent.clone(), max_retries, 2.0)
}

#[tokio::test(start_paused = true)]
async fn planning_task_failing_every_attempt_stays_in_progress() {
    let store = Arc::new(MockTaskStore::new());
    let agent = Arc::new(
        MockCodeAgent::new()
            .with_outcome(AgentOutcome::failed("network down"))
            .with_outcome(AgentOutcome::failed("still down")),
    );
    let task = Task::new("page-1", "Plan the parser", Stage::ToPlan);

    let ok = processor(&store, &agent, 2).process_task(&task).await;

    assert!(!ok);
    assert_eq!(agent.invocations(), 2, "both attempts must be consumed");
    assert_eq!(agent.calls(), vec![AgentCall::Planning, AgentCall::Planning]);

    let calls = store.calls();
    // In-progress write happened, done write never did: the task is left
    // at Planning in the store, with no rollback to ToPlan.
    assert_eq!(
        calls.first(),
        Some(&StoreCall::SetStage {
            id: "page-1".into(),
            stage: Stage::Planning,
        })
    );
    assert!(!calls
        .iter()
        .any(|c| matches!(c, StoreCall::SetStage { stage, .. } if *stage != Stage::Planning)));
    // The failure is reported through an annotation carrying the last error.
    let annotations: Vec<&StoreCall> = calls
        .iter()
        .filter(|c| matches!(c, StoreCall::Annotation { .. }))
        .collect();
    assert_eq!(annotations.len(), 1);
    if let StoreCall::Annotation { text, .. } = annotations[0] {
        assert!(text.contains("still down"), "annotation carries the last attempt's error");
    }
}

#[tokio::test(start_paused = true)]
async fn planning_task_recovering_on_second_attempt_reaches_planned() {
    let store = Arc::new(MockTaskStore::new());
    let agent = Arc::new(
        MockCodeAgent::new()
            .with_outcome(AgentOutcome::failed("transient"))
            .with_outcome(AgentOutcome::ok("# Plan\n1. do it", None)),
    );
    let task = Task::new("page-1", "Plan the parser", Stage::ToPlan);

    let ok = processor(&store, &agent, 2).process_task(&task).await;

    assert!(ok);
    assert_eq!(agent.invocations(), 2);

    let calls = store.calls();
    assert!(
        calls.iter().any(|c| matches!(
            c,
            StoreCall::TextProperty { property, text, .. }
                if property == PLAN_PROPERTY && text.contains("# Plan")
        )),
        "plan output must be written back"
    );
    assert_eq!(
        calls.last(),
        Some(&StoreCall::SetStage {
            id: "page-1".into(),
            stage: Stage::Planned,
        })
    );
}

#[tokio::test]
async fn implementation_task_first_try_success_sequence() {
    let store = Arc::new(MockTaskStore::new());
    let agent = Arc::new(MockCodeAgent::new().with_outcome(AgentOutcome::ok("changed files", None)));
    let task = Task::new("page-7", "Build the parser", Stage::ReadyToImplement);

    let ok = processor(&store, &agent, 2).process_task(&task).await;

    assert!(ok);
    assert_eq!(agent.invocations(), 1);
    assert_eq!(agent.calls(), vec![AgentCall::Implementation]);
    // Exact store sequence: in-progress, then done. No plan property write
    // for implementation runs.
    assert_eq!(
        store.calls(),
        vec![
            StoreCall::SetStage {
                id: "page-7".into(),
                stage: Stage::ImplementInProgress,
            },
            StoreCall::SetStage {
                id: "page-7".into(),
                stage: Stage::ImplementDone,
            },
        ]
    );
}

#[tokio::test]
async fn non_trigger_task_is_rejected_before_any_side_effect() {
    let store = Arc::new(MockTaskStore::new());
    let agent = Arc::new(MockCodeAgent::new().with_outcome(AgentOutcome::ok("unused", None)));
    for stage in [Stage::Requirement, Stage::Planning, Stage::ReviewDone, Stage::ReleaseDone] {
        let task = Task::new("page-1", "Not actionable", stage);
        assert!(!processor(&store, &agent, 2).process_task(&task).await);
    }
    assert_eq!(agent.invocations(), 0);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn empty_planning_output_skips_plan_property() {
    let store = Arc::new(MockTaskStore::new());
    let agent = Arc::new(MockCodeAgent::new().with_outcome(AgentOutcome::ok("", None)));
    let task = Task::new("page-1", "Plan the parser", Stage::ToPlan);

    assert!(processor(&store, &agent, 2).process_task(&task).await);
    assert!(!store
        .calls()
        .iter()
        .any(|c| matches!(c, StoreCall::TextProperty { .. })));
}

#[tokio::test]
async fn session_id_from_agent_is_recorded_for_resume() {
    let store = Arc::new(MockTaskStore::new());
    let agent = Arc::new(
        MockCodeAgent::new().with_outcome(AgentOutcome::ok("done", Some("sess-abc".into()))),
    );
    let task = Task::new("page-1", "Build it", Stage::ReadyToImplement);

    assert!(processor(&store, &agent, 1).process_task(&task).await);
    assert!(store.calls().iter().any(|c| match c {
        StoreCall::Annotation { text, .. } => text.contains("Session ID: sess-abc"),
        _ => false,
    }));
}
