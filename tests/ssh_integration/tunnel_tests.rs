//! Jump hop channel handling

use std::sync::Arc;

use russh::client;

use bastion::auth::StaticAuthorizations;

use super::fixtures::{
    MODEL_UUID, TestClient, authenticate_key, authorized_line, connect_jump, connect_terminating,
    destination_host, exec_output, generate_key, open_tunnel, resolver_for, start_bastion,
};

/// Hosts outside the destination grammar are refused before any handshake
#[tokio::test]
async fn test_malformed_destination_rejected() {
    let bastion = start_bastion(resolver_for(StaticAuthorizations::new())).await;
    let jump = connect_jump(bastion.addr).await;

    for host in [
        "localhost".to_string(),
        "10.0.0.1".to_string(),
        format!("postgresql.{}.juju.local", MODEL_UUID),
        "1.postgresql.not-a-uuid.juju.local".to_string(),
        format!("1.postgresql.{}.example.com", MODEL_UUID),
    ] {
        let result = open_tunnel(&jump, &host, 22).await;
        assert!(
            matches!(result, Err(russh::Error::ChannelOpenFailure(_))),
            "'{}' should be rejected",
            host
        );
    }

    // A port beyond u16 is rejected even with a valid host.
    let host = destination_host(1, "postgresql", MODEL_UUID);
    assert!(open_tunnel(&jump, &host, 70000).await.is_err());

    // The connection survives rejected opens.
    assert!(open_tunnel(&jump, &host, 22).await.is_ok());
}

/// The jump hop does not serve shells
#[tokio::test]
async fn test_session_channel_rejected_on_jump_hop() {
    let bastion = start_bastion(resolver_for(StaticAuthorizations::new())).await;
    let jump = connect_jump(bastion.addr).await;

    assert!(jump.channel_open_session().await.is_err());

    let host = destination_host(0, "ubuntu", MODEL_UUID);
    assert!(open_tunnel(&jump, &host, 22).await.is_ok());
}

/// Any outer authentication method is admitted
#[tokio::test]
async fn test_jump_hop_admits_any_method() {
    let bastion = start_bastion(resolver_for(StaticAuthorizations::new())).await;

    let mut handle = client::connect(Arc::new(client::Config::default()), bastion.addr, TestClient)
        .await
        .expect("Failed to connect");
    assert!(authenticate_key(&mut handle, "anyone", &generate_key()).await);

    let mut handle = client::connect(Arc::new(client::Config::default()), bastion.addr, TestClient)
        .await
        .expect("Failed to connect");
    let result = handle
        .authenticate_none("anyone")
        .await
        .expect("none authentication errored");
    assert!(result.success());
}

/// Several tunnels on one jump connection are independent sessions
#[tokio::test]
async fn test_multiple_tunnels_per_connection() {
    let alice = generate_key();
    let store = StaticAuthorizations::new().with_model(
        MODEL_UUID,
        &["alice"],
        authorized_line(&alice, "alice@laptop"),
    );
    let bastion = start_bastion(resolver_for(store)).await;
    let jump = connect_jump(bastion.addr).await;

    for (unit, app) in [(0, "postgresql"), (3, "mysql-router")] {
        let host = destination_host(unit, app, MODEL_UUID);
        let tunnel = open_tunnel(&jump, &host, 22)
            .await
            .expect("Tunnel should open");
        let mut terminating = connect_terminating(tunnel).await;
        assert!(authenticate_key(&mut terminating, "alice", &alice).await);

        let (output, _) = exec_output(&terminating).await;
        assert_eq!(
            output,
            format!("Your final destination is: {} as user: alice\n", host)
        );
    }
}

/// Only one session channel is served per terminating connection
#[tokio::test]
async fn test_second_session_channel_rejected() {
    let alice = generate_key();
    let store = StaticAuthorizations::new().with_model(
        MODEL_UUID,
        &["alice"],
        authorized_line(&alice, "alice@laptop"),
    );
    let bastion = start_bastion(resolver_for(store)).await;
    let jump = connect_jump(bastion.addr).await;

    let tunnel = open_tunnel(&jump, &destination_host(1, "postgresql", MODEL_UUID), 22)
        .await
        .expect("Tunnel should open");
    let mut terminating = connect_terminating(tunnel).await;
    assert!(authenticate_key(&mut terminating, "alice", &alice).await);

    let _first = terminating
        .channel_open_session()
        .await
        .expect("First session should open");
    assert!(terminating.channel_open_session().await.is_err());
}
