//! One connection lifetime against the oracle.
//!
//! ```text
//! CONNECTED -> ISSUING -> (EXTENDABLE_FOUND | REISSUE -> ISSUING)
//!           -> FORGING -> REDEEMING -> (ACCEPTED | REJECTED -> FORGING) -> CLOSED
//! ```
//!
//! Everything a session learns stays inside it; a fresh session starts
//! classification from scratch because the oracle redraws its family per issuance.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    classify::{classify, Catalog, Classification},
    config::Config,
    error::SessionError,
    extend::extend_range,
    oracle::{Oracle, Redemption},
    voucher::VoucherMessage,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Issuing,
    ExtendableFound,
    Reissue,
    Forging,
    Redeeming,
    Accepted,
    Rejected,
    Closed,
}

/// What a session saw, kept for logging and the run report only
#[derive(Clone, Debug, Default)]
pub struct Observations {
    pub digest_lengths: Vec<usize>,
    pub classifications: Vec<Classification>,
    pub forgery_attempts: usize,
    pub rejections: usize,
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub id: usize,
    pub observations: Observations,
    pub result: Result<Redemption, SessionError>,
}

pub struct Session<O: Oracle> {
    id: usize,
    oracle: O,
    config: Arc<Config>,
    catalog: Catalog,
    state: SessionState,
    observations: Observations,
    stop: Option<watch::Receiver<bool>>,
}

impl<O: Oracle> Session<O> {
    pub fn new(id: usize, oracle: O, config: Arc<Config>) -> Self {
        let catalog = config.catalog();
        Self {
            id,
            oracle,
            config,
            catalog,
            state: SessionState::Connected,
            observations: Observations::default(),
            stop: None,
        }
    }

    /// Halt at the next state boundary once `stop` flips to true
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn run(mut self) -> SessionOutcome {
        let result = self.drive().await;
        match &result {
            Ok(_) => info!(session = self.id, "voucher redeemed"),
            Err(err) => debug!(session = self.id, %err, "session ended"),
        }
        self.transition(SessionState::Closed);
        SessionOutcome {
            id: self.id,
            observations: self.observations,
            result,
        }
    }

    async fn drive(&mut self) -> Result<Redemption, SessionError> {
        let voucher = self.find_extendable().await?;
        self.forge_and_redeem(&voucher).await
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = self.id, from = ?self.state, to = ?next, "transition");
        self.state = next;
    }

    fn checkpoint(&self) -> Result<(), SessionError> {
        match &self.stop {
            Some(stop) if *stop.borrow() => Err(SessionError::Cancelled),
            _ => Ok(()),
        }
    }

    async fn find_extendable(&mut self) -> Result<VoucherMessage, SessionError> {
        let limit = self.config.issuance_retry_limit;
        for attempt in 1..=limit {
            self.checkpoint()?;
            self.transition(SessionState::Issuing);

            let voucher = self.oracle.issue().await?.into_message();
            let verdict = classify(&voucher.digest, &self.catalog);
            self.observations.digest_lengths.push(voucher.digest.byte_length());
            self.observations.classifications.push(verdict);
            info!(
                session = self.id,
                attempt,
                bytes = voucher.digest.byte_length(),
                family = ?verdict.family,
                extendable = verdict.extendable,
                "classified voucher"
            );

            match verdict.family {
                Some(family) if verdict.extendable => {
                    self.transition(SessionState::ExtendableFound);
                    return Ok(VoucherMessage {
                        digest: voucher.digest.tagged(family),
                        ..voucher
                    });
                }
                _ => self.transition(SessionState::Reissue),
            }
        }
        Err(SessionError::NoExploitableVoucher { issued: limit })
    }

    async fn forge_and_redeem(&mut self, voucher: &VoucherMessage) -> Result<Redemption, SessionError> {
        self.transition(SessionState::Forging);
        let suffix = self.config.suffix.clone();

        for forged in extend_range(
            &voucher.digest,
            &voucher.original_data,
            self.config.guesses(),
            suffix.as_bytes(),
        ) {
            self.checkpoint()?;
            let forged = forged.inspect_err(|err| {
                warn!(session = self.id, %err, "voucher cannot be extended");
            })?;

            self.transition(SessionState::Redeeming);
            self.observations.forgery_attempts += 1;
            let redemption = self
                .oracle
                .redeem(&forged.forged_data, forged.forged_digest.bytes())
                .await?;

            if redemption.accepted {
                info!(
                    session = self.id,
                    guess = forged.secret_length_guess,
                    digest = %forged.forged_digest,
                    "forged voucher accepted"
                );
                self.transition(SessionState::Accepted);
                return Ok(redemption);
            }

            self.observations.rejections += 1;
            debug!(session = self.id, guess = forged.secret_length_guess, "guess rejected");
            self.transition(SessionState::Rejected);
            self.transition(SessionState::Forging);
        }

        Err(SessionError::ForgeryExhausted {
            attempts: self.observations.forgery_attempts,
        })
    }
}

#[cfg(test)]
fn test_config(range: (usize, usize), targets: &[crate::family::Family]) -> Arc<Config> {
    Arc::new(Config {
        secret_length_range: range,
        issuance_retry_limit: 8,
        target_algorithms: targets.to_vec(),
        ..Config::default()
    })
}

#[tokio::test]
async fn test_session_redeems_with_secret_in_range() {
    use crate::{family::Family, issuer::VoucherIssuer};

    let families = [Family::Md4, Family::Sha1, Family::Sha256, Family::Sha512];
    for (seed, secret) in [&b""[..], &b"XYZ"[..], &b"a-much-longer-secret-value!!"[..]].into_iter().enumerate() {
        let issuer = VoucherIssuer::new(secret, families).seeded(seed as u64);
        let session = Session::new(0, issuer, test_config((0, 32), &families));

        let outcome = session.run().await;
        let redemption = outcome.result.unwrap();
        assert!(redemption.accepted);
        assert_eq!(&redemption.payload[..], b"credited 1000000000 chips to guest");
        // ascending guesses: every smaller length was tried and rejected first
        assert_eq!(outcome.observations.forgery_attempts, secret.len() + 1);
        assert_eq!(outcome.observations.rejections, secret.len());
    }
}

#[tokio::test]
async fn test_session_gives_up_on_sponge_only_oracle() {
    use crate::{family::Family, issuer::VoucherIssuer};

    let issuer = VoucherIssuer::new(&b"XYZ"[..], [Family::Sha3_256, Family::Sha3_512])
        .reveal_family(true)
        .seeded(7);
    let session = Session::new(1, issuer, test_config((0, 8), &Family::ALL));

    let outcome = session.run().await;
    assert!(matches!(
        outcome.result,
        Err(SessionError::NoExploitableVoucher { issued: 8 })
    ));
    assert_eq!(outcome.observations.classifications.len(), 8);
    assert!(outcome.observations.classifications.iter().all(|c| !c.extendable));
    assert_eq!(outcome.observations.forgery_attempts, 0);
}

#[tokio::test]
async fn test_session_exhausts_guesses_below_secret() {
    use crate::{family::Family, issuer::VoucherIssuer};

    let issuer = VoucherIssuer::new(&b"0123456789"[..], [Family::Sha1]).seeded(9);
    let session = Session::new(2, issuer, test_config((0, 9), &[Family::Sha1]));

    let outcome = session.run().await;
    assert!(matches!(
        outcome.result,
        Err(SessionError::ForgeryExhausted { attempts: 10 })
    ));
    assert_eq!(outcome.observations.rejections, 10);
}

#[tokio::test]
async fn test_session_skips_ambiguous_widths() {
    use crate::{family::Family, issuer::VoucherIssuer};

    // sha256 and sha3-256 share 32 bytes, only the sha1 draws are usable
    let menu = [Family::Sha256, Family::Sha3_256, Family::Sha1];
    let issuer = VoucherIssuer::new(&b"key"[..], menu).seeded(11);
    let config = Arc::new(Config {
        secret_length_range: (0, 8),
        issuance_retry_limit: 64,
        target_algorithms: menu.to_vec(),
        ..Config::default()
    });

    let outcome = Session::new(3, issuer, config).run().await;
    assert!(outcome.result.unwrap().accepted);

    let classifications = &outcome.observations.classifications;
    let last = classifications.last().unwrap();
    assert_eq!(last.family, Some(Family::Sha1));
    assert!(classifications[..classifications.len() - 1]
        .iter()
        .all(|c| !c.extendable && c.family.is_none()));
}

#[tokio::test]
async fn test_stop_signal_cancels_session() {
    use crate::{family::Family, issuer::VoucherIssuer};

    let (stop_tx, stop_rx) = watch::channel(false);
    stop_tx.send(true).unwrap();

    let issuer = VoucherIssuer::new(&b"XYZ"[..], [Family::Sha1]);
    let session = Session::new(4, issuer, test_config((0, 8), &[Family::Sha1])).with_stop(stop_rx);
    assert_eq!(session.state(), SessionState::Connected);

    let outcome = session.run().await;
    assert!(matches!(outcome.result, Err(SessionError::Cancelled)));
    assert!(outcome.observations.digest_lengths.is_empty());
}
