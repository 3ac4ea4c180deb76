use std::sync::Arc;
use std::time::Duration;

use evalsh::console::{complete, lock, shared};
use evalsh::transcript::Printer;
use evalsh::{Console, Dispatcher, Effect, KeyPress, Pending, Transcript, TranscriptLine};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatched(effect: Effect) -> Pending {
    match effect {
        Effect::Dispatch(pending) => pending,
        other => panic!("expected dispatch, got {other:?}"),
    }
}

async fn evaluator_replying(
    code: &str,
    reply: serde_json::Value,
    delay: Duration,
    server: &MockServer,
) {
    Mock::given(method("POST"))
        .and(path("/eval"))
        .and(body_json(serde_json::json!({ "code": code })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply).set_delay(delay))
        .mount(server)
        .await;
}

#[tokio::test]
async fn submit_echoes_then_renders_result() {
    let server = MockServer::start().await;
    let reply = serde_json::json!({ "output": "4" });
    evaluator_replying("2+2", reply, Duration::ZERO, &server).await;
    let dispatcher = Dispatcher::new(&Url::parse(&server.uri()).unwrap(), None).unwrap();

    let (rendered_tx, mut rendered) = mpsc::unbounded_channel();
    let (lines, printer) = Printer::spawn(move |line: &TranscriptLine| {
        let _ = rendered_tx.send(line.clone());
    });
    let console = shared(Console::new(Transcript::with_sink(lines)));

    lock(&console).key(KeyPress::Edit("2+2".into()));
    let pending = dispatched(lock(&console).key(KeyPress::Submit { newline: false }));
    assert_eq!(rendered.recv().await, Some(TranscriptLine::normal(">> 2+2")));

    complete(&console, &dispatcher, pending).await;
    assert_eq!(rendered.recv().await, Some(TranscriptLine::normal("4")));
    assert_eq!(lock(&console).field(), "");

    assert_eq!(lock(&console).submit_line("   "), Effect::Handled);
    assert_eq!(lock(&console).history().len(), 1);

    lock(&console).detach_transcript();
    printer.join();
    assert_eq!(rendered.recv().await, None);
}

#[tokio::test]
async fn concurrent_dispatches_land_in_completion_order() {
    let server = MockServer::start().await;
    let slow_reply = serde_json::json!({ "output": "slow" });
    evaluator_replying("slow()", slow_reply, Duration::from_millis(300), &server).await;
    let bad_reply = serde_json::json!({ "error": "bad failed" });
    evaluator_replying("bad()", bad_reply, Duration::ZERO, &server).await;
    let dispatcher = Dispatcher::new(&Url::parse(&server.uri()).unwrap(), None).unwrap();
    let console = shared(Console::default());

    let slow = dispatched(lock(&console).submit_line("slow()"));
    let bad = dispatched(lock(&console).submit_line("bad()"));
    assert_eq!(lock(&console).in_flight(), 2);

    let slow_task = {
        let (console, dispatcher) = (Arc::clone(&console), dispatcher.clone());
        tokio::spawn(async move { complete(&console, &dispatcher, slow).await })
    };
    let bad_task = {
        let (console, dispatcher) = (Arc::clone(&console), dispatcher.clone());
        tokio::spawn(async move { complete(&console, &dispatcher, bad).await })
    };
    bad_task.await.unwrap();
    slow_task.await.unwrap();

    let console = lock(&console);
    assert_eq!(
        console.transcript().lines(),
        &[
            TranscriptLine::normal(">> slow()"),
            TranscriptLine::normal(">> bad()"),
            TranscriptLine::error("bad failed"),
            TranscriptLine::normal("slow"),
        ]
    );
    assert_eq!(console.in_flight(), 0);
}

#[tokio::test]
async fn timeout_is_reported_as_connection_error() {
    let server = MockServer::start().await;
    let reply = serde_json::json!({ "output": "never" });
    evaluator_replying("loop()", reply, Duration::from_secs(5), &server).await;
    let server_url = Url::parse(&server.uri()).unwrap();
    let dispatcher = Dispatcher::new(&server_url, Some(Duration::from_millis(100))).unwrap();
    let console = shared(Console::default());

    let pending = dispatched(lock(&console).submit_line("loop()"));
    complete(&console, &dispatcher, pending).await;

    let console = lock(&console);
    let last = console.transcript().last().unwrap();
    assert!(last.is_error());
    assert!(last.text.starts_with("Error connecting to server: "), "{}", last.text);
    assert_eq!(console.transcript().len(), 2);
    assert_eq!(console.history().entries(), &["loop()"]);
}
