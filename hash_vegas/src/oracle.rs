use std::{future::Future, net::SocketAddr, time::Duration};

use bytes::Bytes;
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;

use crate::{
    error::OracleError,
    family::Family,
    protocol::{Connection, Request, Response},
    voucher::{Digest, VoucherMessage},
};

/// What an issuance hands out; `family` is only set when the oracle discloses it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedVoucher {
    pub data: Bytes,
    pub digest: Bytes,
    pub family: Option<Family>,
}

impl IssuedVoucher {
    pub fn into_message(self) -> VoucherMessage {
        VoucherMessage {
            original_data: self.data,
            digest: Digest::new(self.digest, self.family),
        }
    }
}

/// Outcome of one redemption; `payload` is the reward when accepted, the reason otherwise
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redemption {
    pub accepted: bool,
    pub payload: Bytes,
}

/// Issuing side of the voucher scheme as seen by a forging session
#[allow(async_fn_in_trait)]
pub trait Oracle {
    async fn issue(&mut self) -> Result<IssuedVoucher, OracleError>;
    async fn redeem(&mut self, data: &[u8], digest: &[u8]) -> Result<Redemption, OracleError>;
}

/// Oracle reached over the frame protocol, one TCP connection per instance
pub struct TcpOracle {
    connection: Connection<TcpStream>,
    user: String,
    round_trip: Duration,
}

impl TcpOracle {
    pub async fn connect(
        addr: SocketAddr,
        user: impl Into<String>,
        round_trip: Duration,
    ) -> Result<Self, OracleError> {
        let stream = timeout(round_trip, TcpStream::connect(addr))
            .await
            .map_err(|_| OracleError::Timeout(round_trip))?
            .map_err(OracleError::Connect)?;
        debug!(%addr, "connected to oracle");
        Ok(Self {
            connection: Connection::new(stream),
            user: user.into(),
            round_trip,
        })
    }

    async fn round_trip(&mut self, request: &Request) -> Result<Response, OracleError> {
        let limit = self.round_trip;
        let connection = &mut self.connection;
        let exchange = async move {
            connection.write_frame(request).await?;
            connection
                .read_frame::<Response>()
                .await?
                .ok_or(OracleError::Closed)
        };
        bounded(limit, exchange).await
    }
}

async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, OracleError>>,
) -> Result<T, OracleError> {
    timeout(limit, fut)
        .await
        .map_err(|_| OracleError::Timeout(limit))?
}

impl Oracle for TcpOracle {
    async fn issue(&mut self) -> Result<IssuedVoucher, OracleError> {
        let request = Request::Issue {
            user: self.user.clone(),
        };
        match self.round_trip(&request).await? {
            Response::Voucher {
                data,
                digest,
                family,
            } => Ok(IssuedVoucher {
                data,
                digest,
                family,
            }),
            Response::Error { message } => Err(OracleError::Remote(message)),
            other => Err(OracleError::Protocol(format!("expected a voucher, got {other}"))),
        }
    }

    async fn redeem(&mut self, data: &[u8], digest: &[u8]) -> Result<Redemption, OracleError> {
        let request = Request::Redeem {
            data: Bytes::copy_from_slice(data),
            digest: Bytes::copy_from_slice(digest),
        };
        match self.round_trip(&request).await? {
            Response::Accepted { reward } => Ok(Redemption {
                accepted: true,
                payload: reward,
            }),
            Response::Rejected { reason } => Ok(Redemption {
                accepted: false,
                payload: reason.into(),
            }),
            Response::Error { message } => Err(OracleError::Remote(message)),
            other => Err(OracleError::Protocol(format!(
                "expected a redemption verdict, got {other}"
            ))),
        }
    }
}

#[tokio::test]
async fn test_round_trip_times_out() {
    use tokio::net::TcpListener;

    // accepts but never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let mut oracle = TcpOracle::connect(addr, "guest", Duration::from_millis(100))
        .await
        .unwrap();
    assert!(matches!(oracle.issue().await, Err(OracleError::Timeout(_))));
    silent.abort();
}

#[tokio::test]
async fn test_closed_connection_is_reported() {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let mut oracle = TcpOracle::connect(addr, "guest", Duration::from_secs(2))
        .await
        .unwrap();
    let err = oracle.redeem(b"d", b"h").await.unwrap_err();
    assert!(
        matches!(err, OracleError::Closed | OracleError::Frame(_)),
        "{err}"
    );
}
