//! End-to-end handshake flows through the public API against the scripted engine.

use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use tlsgate::core::handles::EngineContext;
use tlsgate::ports::TransportHandle;
use tlsgate::test_support::{
    HandshakeScript, RecordingHandler, ScriptedGateway, ScriptedResult, SessionScript,
};
use tlsgate::{
    EngineCatalog, HandshakeError, HandshakeOrchestrator, HandshakeOutcome, HandshakeStatus, Mode,
    ProtocolVersion, SessionError, SessionRecord, TlsSettings,
};

const TRANSPORT: TransportHandle = TransportHandle(42);
const NO_ALPN: [&str; 0] = [];

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn context(gw: &Arc<ScriptedGateway>) -> Arc<EngineContext<ScriptedGateway>> {
    EngineContext::new(gw.clone()).unwrap()
}

#[test]
fn interrupt_unblocks_running_handshake() {
    init_tracing();
    let gw = Arc::new(ScriptedGateway::with_script(HandshakeScript {
        result: ScriptedResult::BlockUntilInterrupted,
        ..HandshakeScript::default()
    }));
    let ctx = context(&gw);
    let mut orch = HandshakeOrchestrator::new(ctx.clone(), EngineCatalog::global()).unwrap();
    let ssl = orch.connection_handle();
    let handle = orch.interrupt_handle();
    let handler = RecordingHandler::trusting();

    let outcome = thread::scope(|s| {
        let worker = s.spawn(|| {
            orch.handshake(TRANSPORT, Mode::Client, Duration::ZERO, &NO_ALPN, handler.clone())
        });
        gw.wait_until_blocked(ssl);
        assert_eq!(handle.status(), HandshakeStatus::InProgress);
        assert!(handle.interrupt());
        assert!(!handle.interrupt());
        worker.join().unwrap()
    })
    .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Interrupted);
    assert_eq!(orch.status(), HandshakeStatus::Interrupted);
    assert_eq!(gw.interrupt_calls(), 1);
    assert_eq!(handler.completions(), 0);
    assert!(!handle.interrupt());
    assert_eq!(gw.interrupt_calls(), 1);

    drop(orch);
    drop(ctx);
    gw.assert_no_leaks();
}

#[test]
fn stored_session_resumes_on_new_connection() {
    init_tracing();
    let gw = Arc::new(ScriptedGateway::new());
    let ctx = context(&gw);

    let stored = {
        let mut first = HandshakeOrchestrator::new(ctx.clone(), EngineCatalog::global()).unwrap();
        let outcome = first
            .handshake(TRANSPORT, Mode::Client, Duration::ZERO, &NO_ALPN, RecordingHandler::trusting())
            .unwrap();
        assert!(!first.was_resumed());
        outcome.session().unwrap().serialize().unwrap()
    };

    // The engine would mint a fresh session if it declined to resume.
    gw.set_script(HandshakeScript {
        session: SessionScript {
            id: vec![0xCD; 32],
            encoded: b"engine-session-v2".to_vec(),
            ..SessionScript::default()
        },
        ..HandshakeScript::default()
    });

    let record = SessionRecord::deserialize(&stored).unwrap();
    let mut second = HandshakeOrchestrator::new(ctx.clone(), EngineCatalog::global()).unwrap();
    record.attach_for_resume(&mut second).unwrap();
    let outcome = second
        .handshake(TRANSPORT, Mode::Client, Duration::ZERO, &NO_ALPN, RecordingHandler::trusting())
        .unwrap();
    assert!(second.was_resumed());
    assert_eq!(outcome.session().unwrap().id(), record.id());
    assert_eq!(gw.live_sessions(), 0);

    // A late attach is refused.
    assert!(matches!(
        record.attach_for_resume(&mut second),
        Err(HandshakeError::InvalidState(_))
    ));

    drop(second);
    drop(ctx);
    gw.assert_no_leaks();
}

#[test]
fn declined_resumption_runs_full_handshake() {
    let gw = Arc::new(ScriptedGateway::with_script(HandshakeScript {
        resume_offered: false,
        ..HandshakeScript::default()
    }));
    let ctx = context(&gw);
    let foreign = SessionRecord::deserialize(
        &session_bytes(vec![0x11; 16], b"from-another-engine".to_vec()),
    )
    .unwrap();
    let mut orch = HandshakeOrchestrator::new(ctx, EngineCatalog::global()).unwrap();
    foreign.attach_for_resume(&mut orch).unwrap();
    let outcome = orch
        .handshake(TRANSPORT, Mode::Client, Duration::ZERO, &NO_ALPN, RecordingHandler::trusting())
        .unwrap();
    assert!(matches!(outcome, HandshakeOutcome::Completed(_)));
    assert!(!orch.was_resumed());
}

fn session_bytes(id: Vec<u8>, encoded: Vec<u8>) -> Vec<u8> {
    let gw = ScriptedGateway::new();
    let h = gw.make_session(&SessionScript {
        id,
        encoded,
        ..SessionScript::default()
    });
    SessionRecord::capture_from_handshake(&gw, EngineCatalog::global(), h)
        .unwrap()
        .serialize()
        .unwrap()
}

#[test]
fn garbage_session_bytes_are_malformed() {
    let inputs: [&[u8]; 3] = [b"", b"\xff\xff", b"not cbor at all"];
    for bad in inputs {
        assert!(matches!(
            SessionRecord::deserialize(bad),
            Err(SessionError::Malformed(_))
        ));
    }
}

#[test]
fn settings_drive_a_server_handshake() {
    init_tracing();
    let settings = TlsSettings::from_yaml_str(
        "protocols: [TLSv1.1, TLSv1.2]\n\
         cipher_suites: [TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA, TLS_EMPTY_RENEGOTIATION_INFO_SCSV]\n\
         verify_mode: none\n\
         session_tickets: false\n\
         session_id_context: web\n",
    )
    .unwrap();
    settings.validate(EngineCatalog::global()).unwrap();

    let gw = Arc::new(ScriptedGateway::with_script(HandshakeScript {
        peer_chain: None,
        negotiated_protocol: Some(b"http/1.1".to_vec()),
        ..HandshakeScript::default()
    }));
    let ctx = context(&gw);
    settings.apply_to_context(&ctx).unwrap();
    assert_eq!(gw.session_id_context(ctx.handle()), Some(b"web".to_vec()));

    let mut orch = HandshakeOrchestrator::new(ctx.clone(), EngineCatalog::global()).unwrap();
    settings.apply_to(&mut orch).unwrap();
    assert_eq!(
        orch.enabled_protocols(),
        &[ProtocolVersion::Tls1_1, ProtocolVersion::Tls1_2]
    );
    assert_eq!(orch.engine_cipher_list(), &["ECDHE-RSA-AES128-SHA".to_string()]);

    let outcome = orch
        .handshake(
            TRANSPORT,
            Mode::Server,
            settings.handshake_timeout(),
            &["h2", "http/1.1"],
            RecordingHandler::trusting(),
        )
        .unwrap();
    assert_eq!(outcome.status(), HandshakeStatus::Completed);
    assert_eq!(orch.negotiated_protocol().as_deref(), Some("http/1.1"));

    let rec = gw.connection(orch.connection_handle()).unwrap();
    assert_eq!(rec.verify_mode.map(|m| m.bits()), Some(0));
    assert_eq!(rec.last_client_mode, Some(false));
}

#[test]
fn settings_with_unknown_suite_fail_before_engine() {
    let settings = TlsSettings {
        cipher_suites: vec!["TLS_FAKE_WITH_NOTHING".into()],
        ..TlsSettings::default()
    };
    assert!(settings.validate(EngineCatalog::global()).is_err());

    let gw = Arc::new(ScriptedGateway::new());
    let ctx = context(&gw);
    let mut orch = HandshakeOrchestrator::new(ctx, EngineCatalog::global()).unwrap();
    let before = orch.engine_cipher_list().to_vec();
    assert!(matches!(
        settings.apply_to(&mut orch),
        Err(HandshakeError::Validation(_))
    ));
    assert_eq!(orch.engine_cipher_list(), before.as_slice());
    assert_eq!(orch.status(), HandshakeStatus::NotStarted);
}

#[test]
fn independent_connections_share_one_context() {
    let gw = Arc::new(ScriptedGateway::new());
    let ctx = context(&gw);
    let catalog = EngineCatalog::global();

    thread::scope(|s| {
        for _ in 0..4 {
            let ctx = ctx.clone();
            s.spawn(move || {
                let mut orch = HandshakeOrchestrator::new(ctx, catalog).unwrap();
                let outcome = orch
                    .handshake(
                        TRANSPORT,
                        Mode::Client,
                        Duration::from_secs(1),
                        &NO_ALPN,
                        RecordingHandler::trusting(),
                    )
                    .unwrap();
                assert!(matches!(outcome, HandshakeOutcome::Completed(_)));
            });
        }
    });

    assert_eq!(gw.live_connections(), 0);
    assert_eq!(gw.live_contexts(), 1);
    drop(ctx);
    gw.assert_no_leaks();
}
