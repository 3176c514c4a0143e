//! End-to-end tests of the agent loop's event contract.

use braidline_agent::{AgentLoop, ScriptedModel, ScriptedTurn};
use braidline_core::error::ModelError;
use braidline_core::event::LifecycleEvent;
use braidline_tools::{default_registry, CapabilityRegistry};
use std::sync::Arc;

async fn collect(mut rx: tokio::sync::mpsc::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn agent(model: ScriptedModel) -> AgentLoop {
    AgentLoop::new(Arc::new(model), Arc::new(default_registry()))
}

/// The terminal-event invariant: exactly one `done`, always last; at most
/// one `answer`; `error` (if present) immediately before `done`.
fn assert_terminal_invariant(events: &[LifecycleEvent]) {
    assert!(!events.is_empty());
    assert!(
        matches!(events.last().unwrap(), LifecycleEvent::Done),
        "last event must be done, got {:?}",
        events.last()
    );
    let dones = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::Done))
        .count();
    assert_eq!(dones, 1, "exactly one done event");
    let answers = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::Answer { .. }))
        .count();
    assert!(answers <= 1, "at most one answer event");
    if let Some(pos) = events
        .iter()
        .position(|e| matches!(e, LifecycleEvent::Error { .. }))
    {
        assert_eq!(pos, events.len() - 2, "error must be followed only by done");
    }
}

#[tokio::test]
async fn zero_tool_calls_answers_directly() {
    let rx = agent(ScriptedModel::single_text("Just a plain answer.")).run(
        "hello",
        vec![],
        "you are helpful",
    );
    let events = collect(rx).await;
    assert_terminal_invariant(&events);

    // Thoughts accumulate to the full model text.
    let thoughts: String = events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::Thought { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(thoughts, "Just a plain answer.");

    match &events[events.len() - 2] {
        LifecycleEvent::Answer { content } => assert_eq!(content, "Just a plain answer."),
        other => panic!("expected answer, got {other:?}"),
    }
}

#[tokio::test]
async fn echo_scenario_end_to_end() {
    // Registry has `echo` requiring `text`; the model emits a grammar
    // block then prose, and answers plainly on the second iteration.
    let model = ScriptedModel::tool_then_answer(
        "<tool_call name=\"echo\">{\"text\":\"hi\"}</tool_call> done",
        "The echo returned hi.",
    );
    let rx = agent(model).run("please echo hi", vec![], "use tools when needed");
    let events = collect(rx).await;
    assert_terminal_invariant(&events);

    let actions: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::Action { method, .. } => Some(method.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(actions, vec!["echo"]);

    let observations: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::Observation { envelope } => Some(envelope),
            _ => None,
        })
        .collect();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].result, Some(serde_json::json!("hi")));
    assert!(observations[0].error.is_none());

    match &events[events.len() - 2] {
        LifecycleEvent::Answer { content } => assert_eq!(content, "The echo returned hi."),
        other => panic!("expected answer, got {other:?}"),
    }
}

#[tokio::test]
async fn budget_exhaustion_yields_timeout_answer() {
    // maxIterations=2, model always emits a tool call: exactly two
    // action/observation pairs, then a generated timeout answer.
    let model = ScriptedModel::repeating(ScriptedTurn::whole(
        "<tool_call name=\"calculator\">{\"expression\":\"1+1\"}</tool_call>",
    ));
    let rx = agent(model)
        .with_max_iterations(2)
        .run("loop forever", vec![], "sys");
    let events = collect(rx).await;
    assert_terminal_invariant(&events);

    let actions = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::Action { .. }))
        .count();
    let observations = events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::Observation { .. }))
        .count();
    assert_eq!(actions, 2);
    assert_eq!(observations, 2);

    match &events[events.len() - 2] {
        LifecycleEvent::Answer { content } => assert!(content.contains("超时")),
        other => panic!("expected timeout answer, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_capability_becomes_observation_not_failure() {
    let model = ScriptedModel::tool_then_answer(
        "<tool_call name=\"no_such_tool\">{\"x\":1}</tool_call>",
        "Could not use that tool.",
    );
    let rx = agent(model).run("try it", vec![], "sys");
    let events = collect(rx).await;
    assert_terminal_invariant(&events);

    // The failure is an observation envelope, not a run error.
    assert!(!events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::Error { .. })));
    let envelope = events
        .iter()
        .find_map(|e| match e {
            LifecycleEvent::Observation { envelope } => Some(envelope),
            _ => None,
        })
        .unwrap();
    let err = envelope.error.as_ref().unwrap();
    assert_eq!(err.code, -32000);
    assert!(err.message.contains("no_such_tool"));
}

#[tokio::test]
async fn missing_required_parameter_becomes_observation() {
    let model = ScriptedModel::tool_then_answer(
        "<tool_call name=\"echo\">{}</tool_call>",
        "I forgot the text argument.",
    );
    let rx = agent(model).run("echo nothing", vec![], "sys");
    let events = collect(rx).await;
    assert_terminal_invariant(&events);

    let envelope = events
        .iter()
        .find_map(|e| match e {
            LifecycleEvent::Observation { envelope } => Some(envelope),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        envelope.error.as_ref().unwrap().message,
        "missing required parameter: text"
    );
}

#[tokio::test]
async fn model_failure_emits_error_then_done() {
    let model = ScriptedModel::new(vec![ScriptedTurn::Fail(ModelError::Network(
        "connection refused".into(),
    ))]);
    let rx = agent(model).run("hello", vec![], "sys");
    let events = collect(rx).await;
    assert_terminal_invariant(&events);

    assert_eq!(events.len(), 2);
    match &events[0] {
        LifecycleEvent::Error { message } => assert!(message.contains("connection refused")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn block_remnants_stripped_from_answer() {
    // A structurally complete block whose payload is not valid JSON
    // yields zero invocations (final-answer path) but must still be
    // stripped from the user-visible text.
    let model = ScriptedModel::single_text(
        "Here is your answer. <tool_call name=\"echo\">{broken}</tool_call>",
    );
    let rx = agent(model).run("q", vec![], "sys");
    let events = collect(rx).await;
    assert_terminal_invariant(&events);

    match &events[events.len() - 2] {
        LifecycleEvent::Answer { content } => {
            assert_eq!(content, "Here is your answer.");
        }
        other => panic!("expected answer, got {other:?}"),
    }
}

#[tokio::test]
async fn events_encode_to_frames_end_to_end() {
    // Agent events through the discrete encoder and back.
    let model = ScriptedModel::tool_then_answer(
        "<tool_call name=\"calculator\">{\"expression\":\"2+3\"}</tool_call>",
        "The result is 5",
    );
    let rx = agent(model).run("what is 2+3", vec![], "sys");

    let mut frames_rx = braidline_stream::encode_events(rx);
    let mut decoder = braidline_stream::SseDecoder::new();
    let mut decoded = Vec::new();
    while let Some(frame) = frames_rx.recv().await {
        decoded.extend(decoder.feed(&frame));
    }

    assert_eq!(decoded.last().unwrap().event, "done");
    assert!(decoded.iter().any(|f| f.event == "action"));
    assert!(decoded.iter().any(|f| f.event == "observation"));
    let answer = decoded.iter().find(|f| f.event == "answer").unwrap();
    assert_eq!(answer.data["content"], "The result is 5");
}

#[tokio::test]
async fn empty_registry_still_answers() {
    let model = ScriptedModel::single_text("No tools needed.");
    let agent = AgentLoop::new(Arc::new(model), Arc::new(CapabilityRegistry::new()));
    let events = collect(agent.run("hi", vec![], "sys")).await;
    assert_terminal_invariant(&events);
}
