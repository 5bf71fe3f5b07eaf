//! Length-extension forgery of `H(secret || data)` vouchers.
//!
//! The engine (`padding`, `state`, `extend`, `classify`) is pure; `session`
//! and `runner` drive it against an [`Oracle`], either the TCP client or the
//! in-process [`VoucherIssuer`].

pub mod classify;
pub mod config;
pub mod error;
pub mod extend;
pub mod family;
pub mod issuer;
pub mod oracle;
pub mod padding;
pub mod protocol;
pub mod runner;
pub mod server;
pub mod session;
pub mod state;
pub mod voucher;

pub use config::Config;
pub use error::{ForgeError, RunError, SessionError};
pub use extend::{extend, extend_range};
pub use family::Family;
pub use issuer::VoucherIssuer;
pub use oracle::{Oracle, TcpOracle};
pub use runner::{run, RunReport, RunSuccess};
pub use server::VoucherServer;
pub use voucher::{Digest, ForgedVoucher, VoucherMessage};
