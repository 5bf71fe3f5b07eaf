use std::{collections::BTreeMap, fmt, future::Future, net::SocketAddr, ops::ControlFlow, sync::Arc};

use tokio::{
    sync::{mpsc, watch},
    task::{JoinError, JoinSet},
};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    error::RunError,
    oracle::{Redemption, TcpOracle},
    session::{Observations, Session, SessionOutcome},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FamilyTally {
    pub extendable: usize,
    pub non_extendable: usize,
}

/// Aggregate of everything the sessions of one run observed
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub sessions: usize,
    /// Sessions whose task died before reporting an outcome
    pub crashed: usize,
    pub issuances: usize,
    pub extendable: usize,
    pub non_extendable: usize,
    pub forgery_attempts: usize,
    /// Issued digests per byte width
    pub digest_lengths: BTreeMap<usize, usize>,
    /// Keyed by family name, `unknown` for digests no family could be pinned on
    pub distribution: BTreeMap<String, FamilyTally>,
}

impl RunReport {
    pub fn absorb(&mut self, observations: &Observations) {
        self.issuances += observations.classifications.len();
        self.forgery_attempts += observations.forgery_attempts;

        for len in &observations.digest_lengths {
            *self.digest_lengths.entry(*len).or_default() += 1;
        }

        for verdict in &observations.classifications {
            let name = verdict
                .family
                .map_or_else(|| "unknown".to_string(), |family| family.to_string());
            let tally = self.distribution.entry(name).or_default();
            if verdict.extendable {
                tally.extendable += 1;
                self.extendable += 1;
            } else {
                tally.non_extendable += 1;
                self.non_extendable += 1;
            }
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "sessions: {} ({} crashed), issuances: {}, forgery attempts: {}",
            self.sessions, self.crashed, self.issuances, self.forgery_attempts
        )?;
        write!(
            f,
            "extendable: {}, non-extendable: {}",
            self.extendable, self.non_extendable
        )?;
        if !self.digest_lengths.is_empty() {
            write!(f, "\ndigest widths:")?;
            for (len, count) in &self.digest_lengths {
                write!(f, " {len}B x{count}")?;
            }
        }
        for (family, tally) in &self.distribution {
            write!(
                f,
                "\n  {family:<10} extendable {:>4}  non-extendable {:>4}",
                tally.extendable, tally.non_extendable
            )?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RunSuccess {
    pub redemption: Redemption,
    pub report: RunReport,
}

/// Runs forging sessions against the oracle at `addr` until one voucher is
/// accepted, a fatal error occurs or `session_limit` sessions have ended.
pub async fn run(addr: SocketAddr, config: Config) -> Result<RunSuccess, RunError> {
    drive(config, move |id, config, stop| session(id, addr, config, stop)).await
}

async fn session(
    id: usize,
    addr: SocketAddr,
    config: Arc<Config>,
    stop: watch::Receiver<bool>,
) -> SessionOutcome {
    match TcpOracle::connect(addr, config.user.clone(), config.round_trip_timeout()).await {
        Ok(oracle) => Session::new(id, oracle, config).with_stop(stop).run().await,
        Err(err) => SessionOutcome {
            id,
            observations: Observations::default(),
            result: Err(err.into()),
        },
    }
}

/// Session tasks of one run. Each task reports its outcome over the mpsc
/// channel; a task that dies first is only seen through the join set.
struct Workers<F> {
    open: F,
    config: Arc<Config>,
    stop: watch::Receiver<bool>,
    outcome_tx: Option<mpsc::Sender<SessionOutcome>>,
    tasks: JoinSet<()>,
    spawned: usize,
    pending: usize,
}

enum Event {
    Finished(SessionOutcome),
    Crashed(JoinError),
}

impl<F, Fut> Workers<F>
where
    F: FnMut(usize, Arc<Config>, watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = SessionOutcome> + Send + 'static,
{
    /// Opens the next session, no-op once `session_limit` sessions were opened
    fn spawn_next(&mut self) {
        let Some(outcome_tx) = self.outcome_tx.clone() else {
            return;
        };
        let session = (self.open)(self.spawned, self.config.clone(), self.stop.clone());
        self.tasks.spawn(async move {
            let outcome = session.await;
            // the receiver is gone once the run has returned
            let _ = outcome_tx.send(outcome).await;
        });
        self.spawned += 1;
        self.pending += 1;

        if self.spawned == self.config.session_limit {
            self.outcome_tx = None;
        }
    }
}

async fn drive<F, Fut>(config: Config, open: F) -> Result<RunSuccess, RunError>
where
    F: FnMut(usize, Arc<Config>, watch::Receiver<bool>) -> Fut,
    Fut: Future<Output = SessionOutcome> + Send + 'static,
{
    config.validate()?;
    let config = Arc::new(config);

    let (outcome_tx, mut outcomes) = mpsc::channel(config.parallel_sessions);
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut workers = Workers {
        open,
        config: config.clone(),
        stop: stop_rx,
        outcome_tx: Some(outcome_tx),
        tasks: JoinSet::new(),
        spawned: 0,
        pending: 0,
    };
    let mut report = RunReport::default();

    for _ in 0..config.parallel_sessions.min(config.session_limit) {
        workers.spawn_next();
    }

    while workers.pending > 0 {
        // a task that reported normally joins with Ok and is skipped here
        let event = tokio::select! {
            Some(outcome) = outcomes.recv() => Event::Finished(outcome),
            Some(Err(err)) = workers.tasks.join_next() => Event::Crashed(err),
            else => break,
        };
        workers.pending -= 1;

        match event {
            Event::Finished(outcome) => {
                if let ControlFlow::Break(end) = settle(&mut report, outcome) {
                    stop_tx.send_replace(true);
                    workers.tasks.abort_all();
                    report.sessions = workers.spawned;
                    return end.map(|redemption| RunSuccess { redemption, report });
                }
            }
            Event::Crashed(err) => {
                report.crashed += 1;
                warn!(%err, "session task died without an outcome");
            }
        }
        workers.spawn_next();
    }

    report.sessions = workers.spawned;
    Err(RunError::Exhausted(Box::new(report)))
}

/// Folds one session outcome into the report; `Break` ends the run
fn settle(
    report: &mut RunReport,
    outcome: SessionOutcome,
) -> ControlFlow<Result<Redemption, RunError>> {
    report.absorb(&outcome.observations);

    match outcome.result {
        Ok(redemption) => {
            info!(session = outcome.id, "run succeeded");
            ControlFlow::Break(Ok(redemption))
        }
        Err(err) if !err.is_recoverable() => {
            error!(session = outcome.id, %err, "stopping run");
            ControlFlow::Break(Err(RunError::Fatal(err)))
        }
        Err(err) => {
            warn!(session = outcome.id, %err, "session failed");
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
fn finished(id: usize, result: Result<Redemption, crate::error::SessionError>) -> SessionOutcome {
    SessionOutcome {
        id,
        observations: Observations::default(),
        result,
    }
}

#[test]
fn test_report_tallies_per_family() {
    use crate::{classify::Classification, family::Family};

    let mut report = RunReport::default();
    report.absorb(&Observations {
        digest_lengths: vec![32, 32, 20],
        classifications: vec![
            Classification { family: None, extendable: false },
            Classification { family: Some(Family::Sha3_256), extendable: false },
            Classification { family: Some(Family::Sha1), extendable: true },
        ],
        forgery_attempts: 4,
        rejections: 3,
    });
    report.absorb(&Observations {
        digest_lengths: vec![20],
        classifications: vec![Classification { family: Some(Family::Sha1), extendable: true }],
        ..Observations::default()
    });

    assert_eq!(report.issuances, 4);
    assert_eq!(report.extendable, 2);
    assert_eq!(report.non_extendable, 2);
    assert_eq!(report.forgery_attempts, 4);
    assert_eq!(report.digest_lengths, BTreeMap::from([(20, 2), (32, 2)]));
    assert_eq!(
        report.distribution["sha1"],
        FamilyTally { extendable: 2, non_extendable: 0 }
    );
    assert_eq!(
        report.distribution["unknown"],
        FamilyTally { extendable: 0, non_extendable: 1 }
    );

    let text = report.to_string();
    assert!(text.contains("sha3-256"));
    assert!(text.contains("20B x2"));
}

#[test]
fn test_settle_splits_fatal_from_recoverable() {
    use crate::error::{ForgeError, OracleError, SessionError};
    use crate::family::Family;

    let mut report = RunReport::default();

    let recoverable = [
        SessionError::NoExploitableVoucher { issued: 3 },
        SessionError::ForgeryExhausted { attempts: 9 },
        SessionError::Oracle(OracleError::Closed),
        SessionError::Forge(ForgeError::InvalidLength(1 << 62)),
    ];
    for err in recoverable {
        assert!(settle(&mut report, finished(0, Err(err))).is_continue());
    }

    let fatal = SessionError::Forge(ForgeError::PaddingMismatch {
        family: Family::Sha1,
        length: 11,
    });
    assert!(matches!(
        settle(&mut report, finished(1, Err(fatal))),
        ControlFlow::Break(Err(RunError::Fatal(SessionError::Forge(
            ForgeError::PaddingMismatch { length: 11, .. }
        ))))
    ));

    let accepted = Redemption {
        accepted: true,
        payload: "credited".into(),
    };
    assert!(matches!(
        settle(&mut report, finished(2, Ok(accepted))),
        ControlFlow::Break(Ok(_))
    ));
}

#[tokio::test]
async fn test_fatal_outcome_stops_other_sessions() {
    use std::time::Duration;

    use crate::{
        error::{ForgeError, SessionError},
        family::Family,
    };

    let alive = Arc::new(());
    let tracker = alive.clone();
    let config = Config {
        parallel_sessions: 3,
        session_limit: 10,
        ..Config::default()
    };

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        drive(config, move |id, _, _| {
            let alive = tracker.clone();
            async move {
                if id != 1 {
                    let _alive = alive;
                    std::future::pending::<()>().await;
                }
                finished(
                    id,
                    Err(SessionError::Forge(ForgeError::PaddingMismatch {
                        family: Family::Md4,
                        length: 0,
                    })),
                )
            }
        }),
    )
    .await
    .expect("a fatal outcome ends the run");
    assert!(matches!(result, Err(RunError::Fatal(_))));

    // the parked sessions were aborted, releasing their handles
    for _ in 0..100 {
        if Arc::strong_count(&alive) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(Arc::strong_count(&alive), 1);
}

#[tokio::test]
async fn test_crashed_session_is_replaced() {
    let config = Config {
        parallel_sessions: 1,
        session_limit: 3,
        ..Config::default()
    };
    let success = drive(config, |id, _, _| async move {
        if id < 2 {
            panic!("session {id} died");
        }
        finished(
            id,
            Ok(Redemption {
                accepted: true,
                payload: "credited".into(),
            }),
        )
    })
    .await
    .unwrap();
    assert_eq!(success.report.sessions, 3);
    assert_eq!(success.report.crashed, 2);
}

#[tokio::test]
async fn test_run_ends_when_every_session_crashes() {
    use std::time::Duration;

    let config = Config {
        parallel_sessions: 2,
        session_limit: 4,
        ..Config::default()
    };
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        drive(config, |id, _, _| async move {
            if id < usize::MAX {
                panic!("session {id} died");
            }
            finished(id, Err(crate::error::SessionError::Cancelled))
        }),
    )
    .await
    .expect("crashed sessions must not stall the run");

    match result {
        Err(RunError::Exhausted(report)) => {
            assert_eq!(report.sessions, 4);
            assert_eq!(report.crashed, 4);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_oracle_exhausts_sessions() {
    // grab a free port, then close it again
    let addr = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();

    let config = Config {
        parallel_sessions: 2,
        session_limit: 3,
        redemption_timeout_ms: 200,
        ..Config::default()
    };
    match run(addr, config).await {
        Err(RunError::Exhausted(report)) => {
            assert_eq!(report.sessions, 3);
            assert_eq!(report.issuances, 0);
            assert_eq!(report.crashed, 0);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_config_is_refused() {
    let config = Config {
        session_limit: 0,
        ..Config::default()
    };
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    assert!(matches!(
        run(addr, config).await,
        Err(RunError::Config(crate::error::ConfigError::Zero("session_limit")))
    ));
}
