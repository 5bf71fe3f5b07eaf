use std::net::SocketAddr;

use hash_vegas::{Config, Family, RunError, VoucherIssuer, VoucherServer};

async fn start(issuer: VoucherIssuer) -> SocketAddr {
    let server = VoucherServer::bind("127.0.0.1:0".parse().unwrap(), issuer)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());
    addr
}

fn config(menu: &[Family]) -> Config {
    Config {
        secret_length_range: (0, 16),
        issuance_retry_limit: 24,
        parallel_sessions: 3,
        session_limit: 6,
        target_algorithms: menu.to_vec(),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_forges_against_untagged_mixed_menu() {
    let menu = [Family::Sha1, Family::Sha256, Family::Sha3_256];
    let addr = start(VoucherIssuer::new(&b"hunter2"[..], menu).seeded(42)).await;

    let success = hash_vegas::run(addr, config(&menu)).await.unwrap();
    assert!(success.redemption.accepted);
    assert_eq!(
        &success.redemption.payload[..],
        b"credited 1000000000 chips to guest"
    );
    // only sha1 has a width of its own on this menu
    assert!(success.report.distribution["sha1"].extendable >= 1);
    assert!(!success.report.distribution.contains_key("sha256"));
}

#[tokio::test]
async fn test_sponge_only_desk_is_never_attacked() {
    let menu = [Family::Sha3_256, Family::Sha3_512];
    let issuer = VoucherIssuer::new(&b"hunter2"[..], menu).reveal_family(true);
    let addr = start(issuer).await;

    let config = Config {
        issuance_retry_limit: 4,
        ..config(&Family::ALL)
    };
    match hash_vegas::run(addr, config).await {
        Err(RunError::Exhausted(report)) => {
            assert_eq!(report.sessions, 6);
            assert_eq!(report.issuances, 24);
            assert_eq!(report.extendable, 0);
            assert_eq!(report.forgery_attempts, 0);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_common_truncation_hides_the_family() {
    let menu = [Family::Sha1, Family::Sha256];
    let issuer = VoucherIssuer::new(&b"hunter2"[..], menu).truncate_to(Some(20));
    let addr = start(issuer).await;

    let config = Config {
        issuance_retry_limit: 4,
        oracle_truncation: Some(20),
        ..config(&menu)
    };
    match hash_vegas::run(addr, config).await {
        Err(RunError::Exhausted(report)) => {
            assert_eq!(report.extendable, 0);
            assert_eq!(report.distribution["unknown"].non_extendable, 24);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
