use std::time::Duration;

use eyre::WrapErr;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

use session::{Breakpoint, Session, SessionEvent, SessionState, StackListing, StopReason};
use transport::ConnectConfig;

fn init_test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct FakeDebugger {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FakeDebugger {
    async fn accept(listener: &TcpListener) -> eyre::Result<Self> {
        let (stream, _) = listener.accept().await.wrap_err("accepting connection")?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer,
        })
    }

    async fn recv(&mut self) -> eyre::Result<Value> {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .wrap_err("timed out waiting for a frame")??;
        eyre::ensure!(read > 0, "connection closed by session");
        serde_json::from_str(&line).wrap_err("parsing frame")
    }

    async fn send(&mut self, frame: Value) -> eyre::Result<()> {
        let mut text = frame.to_string();
        text.push('\n');
        self.writer
            .write_all(text.as_bytes())
            .await
            .wrap_err("writing frame")
    }

    async fn reply(&mut self, request: &Value, data: Value) -> eyre::Result<()> {
        self.send(json!({
            "id": request["id"],
            "isRequest": false,
            "type": request["type"],
            "content": { "data": data },
        }))
        .await
    }

    async fn send_event(&mut self, event: &str, args: Option<Value>) -> eyre::Result<()> {
        let mut content = json!({ "event": event });
        if let Some(args) = args {
            content["args"] = args;
        }
        self.send(json!({
            "id": "evt",
            "isRequest": true,
            "type": "event",
            "content": content,
        }))
        .await
    }
}

async fn attach() -> eyre::Result<(Session, FakeDebugger)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .wrap_err("binding listener")?;
    let port = listener.local_addr()?.port();

    let config = ConnectConfig {
        retry_delay: Duration::from_millis(50),
        handshake_timeout: Duration::from_secs(1),
    };
    let session = Session::with_config("127.0.0.1", port, config);
    assert_eq!(session.state(), SessionState::Uninitialized);

    let (attached, accepted) = tokio::join!(session.attach(), FakeDebugger::accept(&listener));
    attached?;
    let debugger = accepted?;
    assert_eq!(session.state(), SessionState::Running);
    Ok((session, debugger))
}

#[tokio::test]
async fn set_breakpoint_returns_the_verified_record() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;

    let (breakpoint, served) = tokio::join!(session.set_breakpoint("/a.sol", 10), async {
        let request = debugger.recv().await?;
        assert_eq!(request["type"], "setBreakpoint");
        assert_eq!(request["content"], json!({ "path": "/a.sol", "line": 10 }));
        debugger
            .reply(&request, json!({ "id": 1, "verified": true, "line": 10 }))
            .await
    });
    served?;

    assert_eq!(
        breakpoint?,
        Breakpoint {
            id: 1,
            verified: true,
            line: 10,
            path: None,
        }
    );
    Ok(())
}

#[tokio::test]
async fn stop_event_pauses_the_session_exactly_once() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;
    let mut events = session.subscribe();

    debugger.send_event("stopOnBreakpoint", None).await?;

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .wrap_err("waiting for stop event")??;
    assert_eq!(event, SessionEvent::Stopped(StopReason::Breakpoint));
    assert_eq!(session.state(), SessionState::Stopped);

    // exactly one notification for one event
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
    Ok(())
}

#[tokio::test]
async fn stepping_resumes_the_session() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;
    let mut events = session.subscribe();

    debugger.send_event("stopOnEntry", None).await?;
    timeout(Duration::from_secs(5), events.recv()).await??;
    assert_eq!(session.state(), SessionState::Stopped);

    let (stepped, frame) = tokio::join!(session.step_over(), debugger.recv());
    stepped?;
    let frame = frame?;
    assert_eq!(frame["type"], "uiAction");
    assert_eq!(frame["content"]["action"], "stepOver");
    assert_eq!(session.state(), SessionState::Running);

    let (resumed, frame) = tokio::join!(session.continue_reverse(), debugger.recv());
    resumed?;
    assert_eq!(frame?["content"]["action"], "continueReverse");
    Ok(())
}

#[tokio::test]
async fn end_event_terminates_the_session() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;
    let mut events = session.subscribe();

    debugger.send_event("end", None).await?;

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .wrap_err("waiting for termination")??;
    assert_eq!(event, SessionEvent::Terminated);
    assert_eq!(session.state(), SessionState::Terminated);

    // terminal is final: no further commands go out
    let error = session.step_over().await.unwrap_err();
    assert!(error.to_string().contains("terminated"));
    let error = session.set_breakpoint("/a.sol", 1).await.unwrap_err();
    assert!(error.to_string().contains("terminated"));
    Ok(())
}

#[tokio::test]
async fn breakpoint_validation_is_surfaced_without_a_state_change() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;
    let mut events = session.subscribe();

    debugger
        .send_event(
            "breakpointValidated",
            Some(json!({ "id": 4, "verified": true, "line": 22 })),
        )
        .await?;

    let event = timeout(Duration::from_secs(5), events.recv()).await??;
    assert_eq!(
        event,
        SessionEvent::BreakpointValidated(Breakpoint {
            id: 4,
            verified: true,
            line: 22,
            path: None,
        })
    );
    assert_eq!(session.state(), SessionState::Running);
    Ok(())
}

#[tokio::test]
async fn stack_variables_and_evaluate_round_trip() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;

    let (listing, served) = tokio::join!(session.stack(0, 20), async {
        let request = debugger.recv().await?;
        assert_eq!(request["content"], json!({ "startFrame": 0, "endFrame": 20 }));
        debugger
            .reply(
                &request,
                json!({
                    "frames": [
                        { "index": 0, "name": "Test.test5", "file": "/a.sol", "line": 10 },
                    ],
                    "count": 1,
                }),
            )
            .await
    });
    served?;
    let listing: StackListing = listing?;
    assert_eq!(listing.count, 1);
    assert_eq!(listing.frames[0].name, "Test.test5");

    let (variables, served) = tokio::join!(session.variables(None), async {
        let request = debugger.recv().await?;
        assert_eq!(request["type"], "variables");
        debugger
            .reply(
                &request,
                json!([{ "name": "x", "value": "26", "variablesReference": 0 }]),
            )
            .await
    });
    served?;
    let variables = variables?;
    assert_eq!(variables.len(), 1);
    assert_eq!(variables[0].name, "x");
    assert_eq!(variables[0].value.as_deref(), Some("26"));

    let (result, served) = tokio::join!(session.evaluate("x", Some("hover"), Some(0)), async {
        let request = debugger.recv().await?;
        assert_eq!(
            request["content"],
            json!({ "expression": "x", "context": "hover", "frameId": 0 })
        );
        debugger.reply(&request, json!("26")).await
    });
    served?;
    assert_eq!(result?, json!("26"));
    Ok(())
}

#[tokio::test]
async fn clear_breakpoints_is_fire_and_forget() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;

    session.clear_breakpoints("/a.sol").await?;
    let frame = debugger.recv().await?;
    assert_eq!(frame["type"], "clearBreakpoints");
    assert_eq!(frame["content"]["path"], "/a.sol");
    Ok(())
}

#[tokio::test]
async fn remote_errors_fail_the_one_call() -> eyre::Result<()> {
    init_test_logger();
    let (session, mut debugger) = attach().await?;

    let (result, served) = tokio::join!(session.evaluate("b", None, None), async {
        let request = debugger.recv().await?;
        debugger
            .send(json!({
                "id": request["id"],
                "isRequest": false,
                "type": "evaluate",
                "content": { "error": "name 'b' is not defined" },
            }))
            .await
    });
    served?;
    let error = result.unwrap_err();
    assert!(error.to_string().contains("evaluating expression"));

    // the session is still usable afterwards
    let (breakpoint, served) = tokio::join!(session.set_breakpoint("/a.sol", 2), async {
        let request = debugger.recv().await?;
        debugger
            .reply(&request, json!({ "id": 9, "verified": false, "line": 2 }))
            .await
    });
    served?;
    assert!(!breakpoint?.verified);
    Ok(())
}
