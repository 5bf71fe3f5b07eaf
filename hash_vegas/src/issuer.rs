//! Simulated "hash vegas" voucher desk.
//!
//! Issues `user|balance` vouchers signed as `H(secret || data)` with a hash
//! family drawn at random per issuance, and pays out the amount in the last
//! `|` field of any voucher whose signature checks out.

use bytes::Bytes;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info};

use crate::{
    error::OracleError,
    family::Family,
    oracle::{IssuedVoucher, Oracle, Redemption},
};

pub const STARTING_BALANCE: u64 = 100;

pub struct VoucherIssuer {
    secret: Bytes,
    menu: Vec<Family>,
    reveal_family: bool,
    truncate_to: Option<usize>,
    rng: StdRng,
}

impl VoucherIssuer {
    pub fn new(secret: impl Into<Bytes>, menu: impl IntoIterator<Item = Family>) -> Self {
        Self {
            secret: secret.into(),
            menu: menu.into_iter().collect(),
            reveal_family: false,
            truncate_to: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Disclose the family tag alongside each voucher
    pub fn reveal_family(mut self, reveal: bool) -> Self {
        self.reveal_family = reveal;
        self
    }

    /// Cut every signature down to `width` bytes
    pub fn truncate_to(mut self, width: Option<usize>) -> Self {
        self.truncate_to = width;
        self
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn signature_width(&self, family: Family) -> usize {
        self.truncate_to
            .map_or(family.native_len(), |width| width.min(family.native_len()))
    }

    fn sign(&self, family: Family, data: &[u8]) -> Vec<u8> {
        let mut digest = family.keyed_digest(&self.secret, data);
        digest.truncate(self.signature_width(family));
        digest
    }

    /// `None` when no family is on the menu
    pub fn issue(&mut self, user: &str) -> Option<IssuedVoucher> {
        let family = *self.menu.choose(&mut self.rng)?;
        let data = format!("{user}|{STARTING_BALANCE}");
        let digest = self.sign(family, data.as_bytes());
        debug!(%family, user, "issued voucher");

        Some(IssuedVoucher {
            data: data.into(),
            digest: digest.into(),
            family: self.reveal_family.then_some(family),
        })
    }

    pub fn redeem(&self, data: &[u8], digest: &[u8]) -> Redemption {
        let signed_by = self.menu.iter().copied().find(|family| {
            digest.len() == self.signature_width(*family) && self.sign(*family, data) == digest
        });
        let Some(family) = signed_by else {
            return rejected("invalid voucher signature");
        };

        let mut fields = data.split(|b| *b == b'|');
        let user = fields.next().map(String::from_utf8_lossy).unwrap_or_default();
        let amount = fields
            .last()
            .and_then(|field| std::str::from_utf8(field).ok())
            .and_then(|field| field.parse::<u64>().ok());
        let Some(amount) = amount else {
            return rejected("voucher carries no amount");
        };

        info!(%family, %user, amount, "voucher redeemed");
        Redemption {
            accepted: true,
            payload: format!("credited {amount} chips to {user}").into(),
        }
    }
}

fn rejected(reason: &'static str) -> Redemption {
    Redemption {
        accepted: false,
        payload: Bytes::from_static(reason.as_bytes()),
    }
}

/// In-process oracle, used where no network round trip is wanted
impl Oracle for VoucherIssuer {
    async fn issue(&mut self) -> Result<IssuedVoucher, OracleError> {
        VoucherIssuer::issue(self, "guest")
            .ok_or_else(|| OracleError::Remote("no hash families on the menu".into()))
    }

    async fn redeem(&mut self, data: &[u8], digest: &[u8]) -> Result<Redemption, OracleError> {
        Ok(VoucherIssuer::redeem(self, data, digest))
    }
}

#[test]
fn test_honest_voucher_pays_balance() {
    let mut issuer = VoucherIssuer::new(&b"XYZ"[..], [Family::Sha1]).seeded(1);
    let voucher = issuer.issue("user").unwrap();
    assert_eq!(&voucher.data[..], b"user|100");
    assert_eq!(voucher.family, None);

    let redemption = issuer.redeem(&voucher.data, &voucher.digest);
    assert!(redemption.accepted);
    assert_eq!(&redemption.payload[..], b"credited 100 chips to user");
}

#[test]
fn test_tampered_voucher_is_rejected() {
    let mut issuer = VoucherIssuer::new(&b"XYZ"[..], [Family::Sha256]).seeded(2);
    let voucher = issuer.issue("user").unwrap();

    let redemption = issuer.redeem(b"user|1000000000", &voucher.digest);
    assert!(!redemption.accepted);

    // a prefix of a valid signature is not a valid signature
    let redemption = issuer.redeem(&voucher.data, &voucher.digest[..4]);
    assert!(!redemption.accepted);
}

#[test]
fn test_forged_voucher_pays_suffix_amount() {
    use crate::{extend::extend, voucher::Digest};

    let mut issuer = VoucherIssuer::new(&b"XYZ"[..], [Family::Sha1]).reveal_family(true);
    let voucher = issuer.issue("user").unwrap();
    let known = Digest::new(voucher.digest.clone(), voucher.family);

    let forged = extend(&known, &voucher.data, 3, b"|1000000000").unwrap();
    let redemption = issuer.redeem(&forged.forged_data, forged.forged_digest.bytes());
    assert!(redemption.accepted);
    assert_eq!(&redemption.payload[..], b"credited 1000000000 chips to user");
}

#[test]
fn test_truncation_and_menu() {
    let mut issuer = VoucherIssuer::new(&b"s"[..], [Family::Sha1, Family::Sha3_512])
        .truncate_to(Some(20))
        .reveal_family(true)
        .seeded(3);
    for _ in 0..16 {
        let voucher = issuer.issue("u").unwrap();
        assert_eq!(voucher.digest.len(), 20);
        assert!(issuer.redeem(&voucher.data, &voucher.digest).accepted);
    }

    let mut empty = VoucherIssuer::new(&b"s"[..], []);
    assert!(empty.issue("u").is_none());
}
