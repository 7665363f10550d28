use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::core::handles::EngineContext;
use crate::domain::protocol::{OP_NO_SSLV3, OP_NO_TLSV1, OP_NO_TLSV1_1, OP_NO_TLSV1_2};
use crate::domain::{
    ClientCertificateType, EngineCatalog, MODE_HANDSHAKE_CUTTHROUGH, OP_NO_TICKET,
    ProtocolVersion, ValidationError, VerifyMode,
};
use crate::ports::{
    CertificateRejection, ConnectionHandle, EngineGateway, HandshakeHandler, TransportHandle,
};
use crate::test_support::{
    Completion, CredentialChoice, HandshakeScript, RecordingHandler, ScriptedGateway,
    ScriptedResult,
};

const TRANSPORT: TransportHandle = TransportHandle(7);
const NO_ALPN: [&str; 0] = [];

// ---------------- Helpers ----------------

struct Rig {
    gw: Arc<ScriptedGateway>,
    ctx: Arc<EngineContext<ScriptedGateway>>,
}

impl Rig {
    fn new(script: HandshakeScript) -> Self {
        let gw = Arc::new(ScriptedGateway::with_script(script));
        let ctx = EngineContext::new(gw.clone()).unwrap();
        Self { gw, ctx }
    }

    fn orchestrator(&self) -> HandshakeOrchestrator<'static, ScriptedGateway> {
        HandshakeOrchestrator::new(self.ctx.clone(), EngineCatalog::global()).unwrap()
    }

    fn finish(self) {
        let Rig { gw, ctx } = self;
        drop(ctx);
        gw.assert_no_leaks();
    }
}

fn client_handshake(
    orch: &mut HandshakeOrchestrator<'_, ScriptedGateway>,
    handler: Arc<RecordingHandler>,
) -> Result<HandshakeOutcome, HandshakeError> {
    orch.handshake(TRANSPORT, Mode::Client, Duration::ZERO, &NO_ALPN, handler)
}

// ---------------- Transition table ----------------

#[test]
fn transitions_only_move_forward() {
    use HandshakeEvent as E;
    use HandshakeStatus as S;
    assert_eq!(next_status(S::NotStarted, E::Start), Some(S::InProgress));
    assert_eq!(next_status(S::InProgress, E::EngineSucceeded), Some(S::Completed));
    assert_eq!(next_status(S::InProgress, E::CertificateRejected), Some(S::Failed));
    assert_eq!(next_status(S::InProgress, E::DeadlineExpired), Some(S::TimedOut));
    assert_eq!(next_status(S::InProgress, E::InterruptObserved), Some(S::Interrupted));
    for terminal in [S::Completed, S::Failed, S::TimedOut, S::Interrupted] {
        assert!(terminal.is_terminal());
        for ev in [E::Start, E::EngineSucceeded, E::EngineFailed, E::InterruptObserved] {
            assert_eq!(next_status(terminal, ev), None);
        }
    }
    assert_eq!(next_status(S::NotStarted, E::EngineSucceeded), None);
}

// ---------------- Configuration ----------------

#[test]
fn defaults_are_applied_at_handshake_start() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    assert!(rig.gw.connection(ssl).unwrap().cipher_list.is_none());

    client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();

    let rec = rig.gw.connection(ssl).unwrap();
    let ciphers = rec.cipher_list.unwrap();
    assert_eq!(ciphers.len(), 34);
    assert_eq!(ciphers[0], "RC4-MD5");
    // SSLv3 + TLSv1 enabled by default, newer ones disabled.
    assert_eq!(rec.options & (OP_NO_SSLV3 | OP_NO_TLSV1), 0);
    assert_eq!(rec.options & OP_NO_TLSV1_1, OP_NO_TLSV1_1);
    assert_eq!(rec.options & OP_NO_TLSV1_2, OP_NO_TLSV1_2);
    assert_eq!(rec.options & OP_NO_TICKET, 0);
    assert_eq!(rec.mode & MODE_HANDSHAKE_CUTTHROUGH, 0);
    assert_eq!(rec.last_timeout, Some(None));
    drop(orch);
    rig.finish();
}

#[test]
fn explicit_settings_reach_the_engine() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    orch.set_enabled_cipher_suites(&[
        "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        "TLS_EMPTY_RENEGOTIATION_INFO_SCSV",
        "AES256-SHA",
    ])
    .unwrap();
    orch.set_enabled_protocols(&["TLSv1.2"]).unwrap();
    orch.set_verify_mode(VerifyMode::PEER | VerifyMode::FAIL_IF_NO_PEER_CERT)
        .unwrap();
    orch.set_host_name(Some("example.org")).unwrap();
    orch.set_cutthrough(true).unwrap();
    orch.set_session_tickets(false).unwrap();

    orch.handshake(
        TRANSPORT,
        Mode::Client,
        Duration::from_secs(3),
        &["h2", "http/1.1"],
        RecordingHandler::trusting(),
    )
    .unwrap();

    let rec = rig.gw.connection(ssl).unwrap();
    assert_eq!(
        rec.cipher_list.unwrap(),
        vec!["ECDHE-RSA-AES128-SHA".to_string(), "AES256-SHA".to_string()]
    );
    assert_eq!(
        EngineCatalog::global().protocols().enabled_from_options(rec.options),
        vec![ProtocolVersion::Tls1_2]
    );
    assert_eq!(rec.options & OP_NO_TICKET, OP_NO_TICKET);
    assert_eq!(rec.verify_mode.unwrap().bits(), 0x03);
    assert_eq!(rec.host_name.as_deref(), Some("example.org"));
    assert_eq!(rec.mode & MODE_HANDSHAKE_CUTTHROUGH, MODE_HANDSHAKE_CUTTHROUGH);
    assert_eq!(rec.last_timeout, Some(Some(Duration::from_secs(3))));
    let mut wire = vec![2];
    wire.extend_from_slice(b"h2");
    wire.push(8);
    wire.extend_from_slice(b"http/1.1");
    assert_eq!(rec.last_protocols, Some(wire));
}

#[test]
fn server_mode_never_sends_host_name() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    orch.set_host_name(Some("example.org")).unwrap();
    orch.handshake(TRANSPORT, Mode::Server, Duration::ZERO, &NO_ALPN, RecordingHandler::trusting())
        .unwrap();
    let rec = rig.gw.connection(ssl).unwrap();
    assert_eq!(rec.host_name, None);
    assert_eq!(rec.last_client_mode, Some(false));
}

#[test]
fn rejected_lists_change_nothing() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let before = orch.engine_cipher_list().to_vec();
    let err = orch
        .set_enabled_cipher_suites(&["TLS_RSA_WITH_AES_128_CBC_SHA", "BOGUS"])
        .unwrap_err();
    assert!(matches!(
        err,
        HandshakeError::Validation(ValidationError::UnsupportedCipherSuite { index: 1, .. })
    ));
    assert_eq!(orch.engine_cipher_list(), before.as_slice());

    let err = orch.set_enabled_protocols(&["TLSv1", ""]).unwrap_err();
    assert!(matches!(
        err,
        HandshakeError::Validation(ValidationError::MissingEntry { index: 1, .. })
    ));
    assert_eq!(
        orch.enabled_protocols(),
        &[ProtocolVersion::Ssl3, ProtocolVersion::Tls1]
    );
    assert!(orch.set_host_name(Some("")).is_err());
    assert_eq!(orch.status(), HandshakeStatus::NotStarted);
}

#[test]
fn empty_protocol_list_disables_every_version() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    let none: [&str; 0] = [];
    orch.set_enabled_protocols(&none).unwrap();
    client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();
    let options = rig.gw.connection(ssl).unwrap().options;
    assert!(EngineCatalog::global()
        .protocols()
        .enabled_from_options(options)
        .is_empty());
}

#[test]
fn bad_application_protocol_rejected_before_start() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    let long = "x".repeat(256);
    let err = orch
        .handshake(
            TRANSPORT,
            Mode::Client,
            Duration::ZERO,
            &["h2", long.as_str()],
            RecordingHandler::trusting(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        HandshakeError::Validation(ValidationError::BadApplicationProtocol { index: 1, len: 256 })
    ));
    assert_eq!(orch.status(), HandshakeStatus::NotStarted);
    assert_eq!(rig.gw.connection(ssl).unwrap().handshake_calls, 0);
}

#[test]
fn engine_rejecting_cipher_list_fails_handshake() {
    let rig = Rig::new(HandshakeScript::default());
    rig.gw.fail_cipher_list(true);
    let mut orch = rig.orchestrator();
    let err = client_handshake(&mut orch, RecordingHandler::trusting()).unwrap_err();
    assert!(matches!(err, HandshakeError::Engine(_)));
    assert_eq!(orch.status(), HandshakeStatus::Failed);
    drop(orch);
    rig.finish();
}

// ---------------- Outcomes ----------------

#[test]
fn successful_handshake_captures_session() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let handler = RecordingHandler::trusting();
    let outcome = client_handshake(&mut orch, handler.clone()).unwrap();
    let session = outcome.session().unwrap();
    assert_eq!(session.protocol(), ProtocolVersion::Tls1_2);
    assert_eq!(session.cipher_suite(), "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA");
    assert_eq!(orch.status(), HandshakeStatus::Completed);
    assert_eq!(orch.session(), Some(session));
    assert_eq!(handler.completions(), 1);
    assert_eq!(handler.verify_calls(), 1);
    assert_eq!(handler.seen_chain.lock().len(), 2);
    assert_eq!(rig.gw.live_sessions(), 0);
    drop(orch);
    rig.finish();
}

#[test]
fn untrusted_chain_fails_and_never_completes() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let handler = RecordingHandler::rejecting("unknown issuer");
    let err = client_handshake(&mut orch, handler.clone()).unwrap_err();
    match err {
        HandshakeError::Certificate(reason) => assert_eq!(reason, "unknown issuer"),
        other => panic!("expected certificate error, got {other:?}"),
    }
    assert_eq!(orch.status(), HandshakeStatus::Failed);
    assert_eq!(handler.completions(), 0);
    assert!(orch.session().is_none());
    drop(orch);
    rig.finish();
}

#[test]
fn rejection_wins_over_engine_success() {
    let rig = Rig::new(HandshakeScript {
        ignore_verify_failure: true,
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let handler = RecordingHandler::rejecting("revoked");
    let err = client_handshake(&mut orch, handler.clone()).unwrap_err();
    assert!(matches!(err, HandshakeError::Certificate(_)));
    assert_eq!(orch.status(), HandshakeStatus::Failed);
    assert!(!orch.completion_signalled());
    assert_eq!(handler.completions(), 0);
    assert_eq!(rig.gw.live_sessions(), 0);
    drop(orch);
    rig.finish();
}

#[test]
fn timeout_is_an_outcome() {
    let rig = Rig::new(HandshakeScript {
        result: ScriptedResult::Timeout,
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let outcome = orch
        .handshake(
            TRANSPORT,
            Mode::Client,
            Duration::from_millis(50),
            &NO_ALPN,
            RecordingHandler::trusting(),
        )
        .unwrap();
    assert_eq!(outcome, HandshakeOutcome::TimedOut);
    assert_eq!(orch.status(), HandshakeStatus::TimedOut);
    assert!(!orch.interrupt_handle().interrupt());
    drop(orch);
    rig.finish();
}

#[test]
fn engine_failure_is_an_engine_error() {
    let rig = Rig::new(HandshakeScript {
        result: ScriptedResult::Fail("handshake failure alert".into()),
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let err = client_handshake(&mut orch, RecordingHandler::trusting()).unwrap_err();
    match err {
        HandshakeError::Engine(msg) => assert!(msg.contains("handshake failure alert")),
        other => panic!("expected engine error, got {other:?}"),
    }
    assert_eq!(orch.status(), HandshakeStatus::Failed);
}

#[test]
fn second_handshake_is_invalid() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();
    let err = client_handshake(&mut orch, RecordingHandler::trusting()).unwrap_err();
    assert!(matches!(err, HandshakeError::InvalidState(_)));
    assert_eq!(rig.gw.connection(ssl).unwrap().handshake_calls, 1);
    assert!(orch.set_enabled_protocols(&["TLSv1"]).is_err());
}

#[test]
fn flag_setters_refused_after_start() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();
    assert!(matches!(
        orch.set_verify_mode(VerifyMode::PEER),
        Err(HandshakeError::InvalidState(_))
    ));
    assert!(matches!(orch.set_cutthrough(true), Err(HandshakeError::InvalidState(_))));
    assert!(matches!(
        orch.set_session_tickets(false),
        Err(HandshakeError::InvalidState(_))
    ));
    let rec = rig.gw.connection(ssl).unwrap();
    assert_eq!(rec.verify_mode, Some(VerifyMode::NONE));
    assert_eq!(rec.mode & MODE_HANDSHAKE_CUTTHROUGH, 0);
}

/// Where [`InterruptingHandler`] pulls the trigger.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Verify,
    Completion,
}

/// Requests an interrupt from inside one of its own callbacks.
struct InterruptingHandler {
    trigger: Trigger,
    handle: Mutex<Option<InterruptHandle>>,
    accepted: Mutex<Option<bool>>,
    completions: AtomicUsize,
}

impl InterruptingHandler {
    fn new(trigger: Trigger) -> Arc<Self> {
        Arc::new(Self {
            trigger,
            handle: Mutex::new(None),
            accepted: Mutex::new(None),
            completions: AtomicUsize::new(0),
        })
    }

    fn arm(&self, handle: InterruptHandle) {
        *self.handle.lock() = Some(handle);
    }

    fn pull(&self, at: Trigger) {
        if at == self.trigger {
            if let Some(h) = self.handle.lock().as_ref() {
                *self.accepted.lock() = Some(h.interrupt());
            }
        }
    }

    fn accepted(&self) -> Option<bool> {
        *self.accepted.lock()
    }
}

impl HandshakeHandler for InterruptingHandler {
    fn verify(&self, _chain: &[Vec<u8>], _auth_method: &str) -> Result<(), CertificateRejection> {
        self.pull(Trigger::Verify);
        Ok(())
    }

    fn handshake_completed(&self) {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.pull(Trigger::Completion);
    }
}

#[test]
fn interrupt_after_completion_is_refused() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let handler = InterruptingHandler::new(Trigger::Completion);
    handler.arm(orch.interrupt_handle());

    let outcome = orch
        .handshake(TRANSPORT, Mode::Client, Duration::ZERO, &NO_ALPN, handler.clone())
        .unwrap();

    assert_eq!(handler.accepted(), Some(false));
    assert!(matches!(outcome, HandshakeOutcome::Completed(_)));
    assert_eq!(orch.status(), HandshakeStatus::Completed);
    assert!(orch.session().is_some());
    assert_eq!(handler.completions.load(Ordering::SeqCst), 1);
    assert_eq!(rig.gw.interrupt_calls(), 0);
    drop(orch);
    rig.finish();
}

#[test]
fn interrupt_during_verify_suppresses_completion() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let handler = InterruptingHandler::new(Trigger::Verify);
    handler.arm(orch.interrupt_handle());

    let outcome = orch
        .handshake(TRANSPORT, Mode::Client, Duration::ZERO, &NO_ALPN, handler.clone())
        .unwrap();

    assert_eq!(handler.accepted(), Some(true));
    assert_eq!(outcome, HandshakeOutcome::Interrupted);
    assert_eq!(handler.completions.load(Ordering::SeqCst), 0);
    assert_eq!(rig.gw.interrupt_calls(), 1);
    drop(orch);
    rig.finish();
}

#[test]
fn engine_timeout_after_interrupt_is_interrupted() {
    let rig = Rig::new(HandshakeScript {
        result: ScriptedResult::Timeout,
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let handler = InterruptingHandler::new(Trigger::Verify);
    handler.arm(orch.interrupt_handle());

    let outcome = orch
        .handshake(
            TRANSPORT,
            Mode::Client,
            Duration::from_millis(50),
            &NO_ALPN,
            handler.clone(),
        )
        .unwrap();

    assert_eq!(handler.accepted(), Some(true));
    assert_eq!(outcome, HandshakeOutcome::Interrupted);
    assert_eq!(orch.status(), HandshakeStatus::Interrupted);
    drop(orch);
    rig.finish();
}

#[test]
fn request_latched_before_engine_call_wakes_it() {
    // A request forwarded after the last checkpoint but before the engine
    // call must still end the blocking call.
    let rig = Rig::new(HandshakeScript {
        result: ScriptedResult::BlockUntilInterrupted,
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    rig.gw.interrupt(ssl);

    let outcome = client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();
    assert_eq!(outcome, HandshakeOutcome::Interrupted);
    assert_eq!(orch.status(), HandshakeStatus::Interrupted);
    assert_eq!(rig.gw.connection(ssl).unwrap().handshake_calls, 1);
    drop(orch);
    rig.finish();
}

#[test]
fn interrupt_before_start_lands_at_first_checkpoint() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    let handle = orch.interrupt_handle();
    assert!(handle.interrupt());
    assert!(!handle.interrupt());
    let outcome = client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();
    assert_eq!(outcome, HandshakeOutcome::Interrupted);
    assert_eq!(orch.status(), HandshakeStatus::Interrupted);
    assert_eq!(rig.gw.connection(ssl).unwrap().handshake_calls, 0);
    // Nothing was running, so the engine was never asked to interrupt.
    assert_eq!(rig.gw.interrupt_calls(), 0);
}

// ---------------- Completion signal ----------------

#[test]
fn cutthrough_completion_arrives_on_first_io() {
    let rig = Rig::new(HandshakeScript {
        completion: Completion::OnFirstIo,
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    orch.set_cutthrough(true).unwrap();
    let handler = RecordingHandler::trusting();
    client_handshake(&mut orch, handler.clone()).unwrap();
    assert_eq!(handler.completions(), 0);
    assert!(!orch.completion_signalled());

    orch.write(b"GET /").unwrap();
    assert_eq!(handler.completions(), 1);
    let mut buf = [0u8; 16];
    let n = orch.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"hello");
    assert_eq!(handler.completions(), 1);
}

#[test]
fn duplicate_engine_completion_is_dropped() {
    let rig = Rig::new(HandshakeScript {
        completion: Completion::Twice,
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let handler = RecordingHandler::trusting();
    client_handshake(&mut orch, handler.clone()).unwrap();
    assert_eq!(handler.completions(), 1);
}

#[test]
fn silent_engine_still_completes_once() {
    let rig = Rig::new(HandshakeScript {
        completion: Completion::Never,
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let handler = RecordingHandler::trusting();
    client_handshake(&mut orch, handler.clone()).unwrap();
    assert_eq!(handler.completions(), 1);
    assert!(orch.completion_signalled());
}

// ---------------- Client certificates ----------------

fn requesting() -> HandshakeScript {
    HandshakeScript {
        certificate_request: Some((vec![1, 99, 64], vec![b"CN=Issuer".to_vec()])),
        ..HandshakeScript::default()
    }
}

#[test]
fn client_credentials_installed_through_side_channel() {
    let rig = Rig::new(requesting());
    let mut orch = rig.orchestrator();
    let ssl: ConnectionHandle = orch.connection_handle();
    let handler = RecordingHandler::offering(CredentialChoice::Pkcs8 {
        chain: vec![b"client-leaf".to_vec()],
        key: vec![0x30, 0x82, 0x01, 0x00],
    });
    client_handshake(&mut orch, handler.clone()).unwrap();
    assert_eq!(
        *handler.requested_types.lock(),
        vec![ClientCertificateType::RsaSign, ClientCertificateType::EcdsaSign]
    );
    let rec = rig.gw.connection(ssl).unwrap();
    assert_eq!(rec.certificate_chain, vec![b"client-leaf".to_vec()]);
    assert_eq!(rec.private_key, Some(vec![0x30, 0x82, 0x01, 0x00]));
    assert_eq!(rec.key_checks, 1);
    assert_eq!(orch.local_certificate_chain(), vec![b"client-leaf".to_vec()]);
}

#[test]
fn engine_key_is_released_after_install() {
    let rig = Rig::new(requesting());
    let key = rig.gw.make_key();
    let mut orch = rig.orchestrator();
    let handler = RecordingHandler::offering(CredentialChoice::EngineKey {
        chain: vec![b"client-leaf".to_vec()],
        key,
    });
    client_handshake(&mut orch, handler).unwrap();
    assert_eq!(rig.gw.live_keys(), 0);
    drop(orch);
    rig.finish();
}

#[test]
fn declining_a_request_is_not_a_failure() {
    let rig = Rig::new(requesting());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    let outcome = client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();
    assert!(matches!(outcome, HandshakeOutcome::Completed(_)));
    assert!(rig.gw.connection(ssl).unwrap().certificate_chain.is_empty());
}

#[test]
fn broken_credentials_fail_the_handshake() {
    let rig = Rig::new(requesting());
    let mut orch = rig.orchestrator();
    let handler = RecordingHandler::offering(CredentialChoice::Pkcs8 {
        chain: vec![b"client-leaf".to_vec()],
        key: Vec::new(),
    });
    let err = client_handshake(&mut orch, handler).unwrap_err();
    assert!(matches!(err, HandshakeError::Engine(_)));
    assert_eq!(orch.status(), HandshakeStatus::Failed);
}

// ---------------- Post-handshake ----------------

#[test]
fn io_requires_completed_handshake() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let mut buf = [0u8; 4];
    assert!(matches!(orch.read(&mut buf), Err(HandshakeError::InvalidState(_))));
    assert!(matches!(orch.write(b"x"), Err(HandshakeError::InvalidState(_))));
    assert!(matches!(orch.renegotiate(), Err(HandshakeError::InvalidState(_))));
    assert!(matches!(orch.shutdown(), Err(HandshakeError::InvalidState(_))));
}

#[test]
fn post_handshake_queries_and_shutdown() {
    let rig = Rig::new(HandshakeScript {
        negotiated_protocol: Some(b"h2".to_vec()),
        ..HandshakeScript::default()
    });
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    client_handshake(&mut orch, RecordingHandler::trusting()).unwrap();
    assert_eq!(orch.negotiated_protocol().as_deref(), Some("h2"));
    assert_eq!(orch.peer_certificate_chain().len(), 2);
    orch.renegotiate().unwrap();
    orch.shutdown().unwrap();
    let rec = rig.gw.connection(ssl).unwrap();
    assert_eq!(rec.renegotiations, 1);
    assert_eq!(rec.shutdowns, 1);
}

#[test]
fn server_identity_goes_straight_to_engine() {
    let rig = Rig::new(HandshakeScript::default());
    let mut orch = rig.orchestrator();
    let ssl = orch.connection_handle();
    orch.use_certificate(&[b"server-leaf".to_vec()]).unwrap();
    orch.use_private_key(&[1, 2, 3]).unwrap();
    orch.set_client_ca_list(&[b"CN=Root".to_vec()]).unwrap();
    orch.set_session_creation_enabled(false);
    let rec = rig.gw.connection(ssl).unwrap();
    assert_eq!(rec.certificate_chain, vec![b"server-leaf".to_vec()]);
    assert_eq!(rec.key_checks, 1);
    assert_eq!(rec.client_cas, vec![b"CN=Root".to_vec()]);
    assert_eq!(rec.session_creation, Some(false));
}
