use std::{io, net::SocketAddr, sync::Arc};

use tokio::{
    net::{TcpListener, TcpStream},
    sync::Mutex,
};
use tracing::{debug, warn};

use crate::{
    error::FrameError,
    issuer::VoucherIssuer,
    protocol::{Connection, Request, Response},
};

/// Voucher desk shared by every connection; issuing draws from its rng
pub type Desk = Arc<Mutex<VoucherIssuer>>;

/// TCP front end of a [`VoucherIssuer`]
pub struct VoucherServer {
    listener: TcpListener,
    desk: Desk,
}

impl VoucherServer {
    pub async fn bind(addr: SocketAddr, issuer: VoucherIssuer) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
            desk: Arc::new(Mutex::new(issuer)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one task per client
    pub async fn serve(self) -> io::Result<()> {
        loop {
            let (socket, peer) = self.listener.accept().await?;
            let desk = self.desk.clone();
            tokio::spawn(async move {
                debug!(%peer, "client connected");
                if let Err(err) = handle(socket, desk).await {
                    warn!(%peer, %err, "connection dropped");
                }
            });
        }
    }
}

async fn handle(socket: TcpStream, desk: Desk) -> Result<(), FrameError> {
    let mut connection = Connection::new(socket);
    while let Some(request) = connection.read_frame::<Request>().await? {
        let response = match request {
            Request::Issue { user } => match desk.lock().await.issue(&user) {
                Some(voucher) => Response::Voucher {
                    data: voucher.data,
                    digest: voucher.digest,
                    family: voucher.family,
                },
                None => Response::Error {
                    message: "no hash families on the menu".into(),
                },
            },
            Request::Redeem { data, digest } => {
                let redemption = desk.lock().await.redeem(&data, &digest);
                if redemption.accepted {
                    Response::Accepted {
                        reward: redemption.payload,
                    }
                } else {
                    Response::Rejected {
                        reason: String::from_utf8_lossy(&redemption.payload).into_owned(),
                    }
                }
            }
        };
        connection.write_frame(&response).await?;
    }
    Ok(())
}
