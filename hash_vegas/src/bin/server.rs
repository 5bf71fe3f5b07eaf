use std::net::SocketAddr;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use hash_vegas::{Family, VoucherIssuer, VoucherServer};
use rand::{distributions::Alphanumeric, Rng};
use tools::encode::hex::from_hex;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulated voucher desk signing with H(secret || data)", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:6380")]
    addr: SocketAddr,

    /// signing secret, a random one between 1 and 64 characters if not given
    #[arg(short, long)]
    secret: Option<String>,

    /// signing secret given as hex, for secrets that are not valid text
    #[arg(long, value_parser = parse_hex, conflicts_with = "secret")]
    secret_hex: Option<Bytes>,

    /// hash families drawn from per issuance
    #[arg(short, long, value_delimiter = ',', default_value = "sha1,sha256,sha3-256")]
    families: Vec<Family>,

    /// disclose the family of every voucher
    #[arg(long, default_value_t = false)]
    reveal: bool,

    /// truncate every signature to this many bytes
    #[arg(long)]
    truncate: Option<usize>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let secret = match (args.secret_hex, args.secret) {
        (Some(secret), _) => secret,
        (None, Some(secret)) => Bytes::from(secret),
        (None, None) => {
            let mut rng = rand::thread_rng();
            let len = rng.gen_range(1..=64);
            rng.sample_iter(&Alphanumeric).take(len).collect::<Vec<u8>>().into()
        }
    };

    let issuer = VoucherIssuer::new(secret, args.families.iter().copied())
        .reveal_family(args.reveal)
        .truncate_to(args.truncate);
    let server = VoucherServer::bind(args.addr, issuer)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;

    info!(addr = %server.local_addr()?, families = ?args.families, "voucher desk open");
    server.serve().await?;
    Ok(())
}

fn parse_hex(text: &str) -> Result<Bytes, String> {
    from_hex(text)
        .map(Bytes::from)
        .ok_or_else(|| format!("{text:?} is not an even length hex string"))
}

#[test]
fn test_hex_secret_flag() {
    let args = Args::try_parse_from(["server", "--secret-hex", "00ff58595a"]).unwrap();
    assert_eq!(args.secret_hex.as_deref(), Some(&b"\x00\xffXYZ"[..]));

    assert!(Args::try_parse_from(["server", "--secret-hex", "abc"]).is_err());
    assert!(Args::try_parse_from(["server", "--secret-hex", "00", "--secret", "x"]).is_err());
}
