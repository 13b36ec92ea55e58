use async_trait::async_trait;
use serde_json::{Value, json};
use sheetcmd::command::CommandKind;
use sheetcmd::graph::CellSnapshot;
use sheetcmd::request::SetCellsRequestCommand;
use sheetcmd::server::web::router;
use sheetcmd::{
    CellAuthority, CellRef, Command, CommandConfig, CommandError, Graph, HttpTransport, ItemId,
    RequestDispatcher, RequestEnvelope, RequestTransport, Result, ServerRequest,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn r(label: &str) -> CellRef {
    CellRef::parse(label).expect("cell reference")
}

fn numbered(seq: u64) -> ServerRequest {
    ServerRequest::new(CommandKind::ServerSetCells, ItemId(1), json!({ "seq": seq }))
}

/// Answers with the request's `seq`; earlier requests take longer.
#[derive(Default)]
struct SlowEcho {
    seen: Mutex<Vec<(String, u64)>>,
}

#[async_trait]
impl RequestTransport for SlowEcho {
    async fn send(&self, envelope: RequestEnvelope) -> Result<Value> {
        let seq = envelope.request.info["seq"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(seq * 4))).await;
        self.seen
            .lock()
            .expect("seen")
            .push((envelope.document.clone(), seq));
        Ok(json!({ "seq": seq }))
    }
}

struct Hanging;

#[async_trait]
impl RequestTransport for Hanging {
    async fn send(&self, _envelope: RequestEnvelope) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(json!({}))
    }
}

struct Refusing;

#[async_trait]
impl RequestTransport for Refusing {
    async fn send(&self, _envelope: RequestEnvelope) -> Result<Value> {
        Err(CommandError::Transport("connection refused".into()))
    }
}

/// In-process authority behind the transport seam.
struct Local(Mutex<CellAuthority>);

#[async_trait]
impl RequestTransport for Local {
    async fn send(&self, envelope: RequestEnvelope) -> Result<Value> {
        self.0.lock()?.handle(&envelope.request)
    }
}

#[tokio::test]
async fn requests_of_one_document_are_answered_in_order() {
    let transport = Arc::new(SlowEcho::default());
    let dispatcher = RequestDispatcher::new(transport.clone(), &CommandConfig::default());

    let replies = dispatcher
        .dispatch_all("doc", (0..5).map(numbered).collect())
        .await
        .expect("queued");
    let seqs: Vec<u64> = replies
        .into_iter()
        .map(|reply| reply.expect("answered")["seq"].as_u64().expect("seq"))
        .collect();
    assert_eq!(seqs, [0, 1, 2, 3, 4]);

    let seen = transport.seen.lock().expect("seen");
    let order: Vec<u64> = seen.iter().map(|(_, seq)| *seq).collect();
    assert_eq!(order, [0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn documents_get_independent_queues() {
    let transport = Arc::new(SlowEcho::default());
    let dispatcher = RequestDispatcher::new(transport.clone(), &CommandConfig::default());

    let (a, b) = tokio::join!(
        dispatcher.dispatch("doc-b", numbered(1)),
        dispatcher.dispatch("doc-a", numbered(2)),
    );
    assert_eq!(a.expect("doc-b")["seq"], json!(1));
    assert_eq!(b.expect("doc-a")["seq"], json!(2));
    assert_eq!(dispatcher.documents().expect("documents"), ["doc-a", "doc-b"]);
}

#[tokio::test]
async fn slow_server_times_out() {
    let config = CommandConfig::new().request_timeout(Duration::from_millis(30));
    let dispatcher = RequestDispatcher::new(Arc::new(Hanging), &config);

    let err = dispatcher
        .dispatch("doc", numbered(0))
        .await
        .expect_err("timed out");
    assert!(matches!(err, CommandError::Transport(msg) if msg.contains("timed out")));
}

#[tokio::test]
async fn transport_failure_goes_to_handle_error() {
    let mut graph = Graph::new();
    let sheet = graph.add_sheet();
    let dispatcher = RequestDispatcher::new(Arc::new(Refusing), &CommandConfig::default());

    let mut command = SetCellsRequestCommand::new(sheet, vec![CellSnapshot::new(r("A1"), "5")]);
    command.execute(&mut graph).expect("execute");

    let settled = dispatcher
        .execute_and_reconcile("doc", &mut command)
        .await
        .expect("failure is not fatal");
    assert!(!settled);
    assert_eq!(command.cells_replaced(), None);
    assert_eq!(graph.sheet(sheet).expect("sheet").text(&r("A1")), "5");

    let sent = dispatcher.undo_remote("doc", &mut command).await.expect("undo");
    assert!(!sent, "nothing to undo remotely before reconciliation");
}

#[tokio::test]
async fn execute_undo_and_redo_against_local_authority() {
    let mut local = Graph::new();
    let sheet = local.add_sheet();
    let mut remote = Graph::new();
    remote.add_sheet();
    let transport = Arc::new(Local(Mutex::new(CellAuthority::new(remote))));
    let dispatcher = RequestDispatcher::new(transport.clone(), &CommandConfig::default());

    let mut command = SetCellsRequestCommand::new(sheet, vec![CellSnapshot::new(r("B2"), "9")]);
    command.execute(&mut local).expect("execute");
    assert!(
        dispatcher
            .execute_and_reconcile("doc", &mut command)
            .await
            .expect("reconcile")
    );

    command.undo(&mut local).expect("local undo");
    assert!(dispatcher.undo_remote("doc", &mut command).await.expect("undo"));
    command.redo(&mut local).expect("local redo");
    assert!(dispatcher.redo_remote("doc", &mut command).await.expect("redo"));

    let authority = transport.0.lock().expect("authority");
    assert_eq!(authority.handled(), 3);
    assert_eq!(authority.graph().sheet(sheet).expect("sheet").text(&r("B2")), "9");
    assert_eq!(local.sheet(sheet).expect("sheet").text(&r("B2")), "9");
}

#[tokio::test]
async fn http_transport_talks_to_the_web_router() {
    let mut graph = Graph::new();
    let sheet = graph.add_sheet();
    let authority = Arc::new(Mutex::new(CellAuthority::new(graph)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = router(authority.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let config = CommandConfig::new()
        .host(&addr.ip().to_string())
        .port(addr.port());
    let transport = HttpTransport::from_config(&config).expect("transport");
    assert_eq!(transport.url(), format!("http://{}/commands", addr));
    let dispatcher = RequestDispatcher::new(Arc::new(transport), &config);

    let mut local = Graph::new();
    local.add_sheet();
    let mut command = SetCellsRequestCommand::new(sheet, vec![CellSnapshot::new(r("A1"), "5")]);
    command.execute(&mut local).expect("execute");
    assert!(
        dispatcher
            .execute_and_reconcile("doc", &mut command)
            .await
            .expect("reconcile")
    );
    assert_eq!(command.cells_replaced().map(Vec::len), Some(1));

    let missing = ServerRequest::new(CommandKind::ServerSetCells, ItemId(77), json!({"cells": []}));
    let err = dispatcher
        .dispatch("doc", missing)
        .await
        .expect_err("unknown sheet");
    assert!(matches!(err, CommandError::Transport(msg) if msg.contains("404")));
}

#[tokio::test]
async fn closing_a_document_drops_its_queue() {
    let transport = Arc::new(SlowEcho::default());
    let dispatcher = RequestDispatcher::new(transport.clone(), &CommandConfig::default());

    let pending = dispatcher.enqueue("doc", numbered(1)).await.expect("queued");
    dispatcher.dispatch("other", numbered(2)).await.expect("other");
    assert!(dispatcher.close("doc").expect("close"));
    assert!(!dispatcher.close("doc").expect("already closed"));
    assert_eq!(dispatcher.documents().expect("documents"), ["other"]);

    // queued before closing, still answered
    let reply = pending.await.expect("worker answered").expect("reply");
    assert_eq!(reply["seq"], json!(1));

    let again = dispatcher.dispatch("doc", numbered(3)).await.expect("new queue");
    assert_eq!(again["seq"], json!(3));
    assert_eq!(dispatcher.documents().expect("documents"), ["doc", "other"]);
}
