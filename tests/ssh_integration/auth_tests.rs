//! Public key authorization through the full jump path

use std::sync::Arc;

use bastion::auth::StaticAuthorizations;

use super::fixtures::{
    MODEL_UUID, OTHER_MODEL_UUID, RecordingClient, UnreachableControlPlane, authenticate_key,
    authorized_line, connect_jump, connect_terminating, destination_host, exec_output,
    generate_key, open_tunnel, resolver_for, start_bastion, terminating_session,
};

/// An authorized key reaches the session and gets the destination line
#[tokio::test]
async fn test_authorized_key_reaches_destination() {
    let alice = generate_key();
    let store = StaticAuthorizations::new().with_model(
        MODEL_UUID,
        &["alice"],
        authorized_line(&alice, "alice@laptop"),
    );
    let bastion = start_bastion(resolver_for(store)).await;

    let host = destination_host(1, "postgresql", MODEL_UUID);
    let (_jump, terminating, authenticated) =
        terminating_session(bastion.addr, &host, "alice", &alice).await;
    assert!(authenticated, "alice's key should be authorized");

    let (output, status) = exec_output(&terminating).await;
    assert_eq!(
        output,
        format!("Your final destination is: {} as user: alice\n", host)
    );
    assert_eq!(status, Some(0));

    bastion.handle.stop();
    bastion.handle.wait().await.expect("Bastion failed");
}

/// A key that is not in any of the user's models is refused
#[tokio::test]
async fn test_unknown_key_is_rejected() {
    let alice = generate_key();
    let stranger = generate_key();
    let store = StaticAuthorizations::new().with_model(
        MODEL_UUID,
        &["alice"],
        authorized_line(&alice, "alice@laptop"),
    );
    let bastion = start_bastion(resolver_for(store)).await;

    let host = destination_host(1, "postgresql", MODEL_UUID);
    let (_jump, _terminating, authenticated) =
        terminating_session(bastion.addr, &host, "alice", &stranger).await;
    assert!(!authenticated, "Unknown key should be rejected");

    let (_jump, _terminating, authenticated) =
        terminating_session(bastion.addr, &host, "notfound", &alice).await;
    assert!(!authenticated, "Unknown user should be rejected");
}

/// A key stored on a model the user cannot access is refused
#[tokio::test]
async fn test_key_on_foreign_model_is_rejected() {
    let bob = generate_key();
    let store = StaticAuthorizations::new()
        .with_model(MODEL_UUID, &["alice"], authorized_line(&bob, "bob"))
        .with_model(OTHER_MODEL_UUID, &["bob"], "");
    let bastion = start_bastion(resolver_for(store)).await;

    let host = destination_host(0, "mysql", MODEL_UUID);
    let (_jump, _terminating, authenticated) =
        terminating_session(bastion.addr, &host, "bob", &bob).await;
    assert!(!authenticated);
}

/// An unreachable control plane denies access without breaking the tunnel
#[tokio::test]
async fn test_remote_failure_denies_access() {
    let alice = generate_key();
    let bastion = start_bastion(Arc::new(UnreachableControlPlane)).await;

    let host = destination_host(1, "postgresql", MODEL_UUID);
    let (_jump, _terminating, authenticated) =
        terminating_session(bastion.addr, &host, "alice", &alice).await;
    assert!(!authenticated, "Backend failure must not grant access");

    // The jump connection itself is unaffected.
    let jump = connect_jump(bastion.addr).await;
    assert!(open_tunnel(&jump, &host, 22).await.is_ok());
}

/// After a rejected key the client may offer another one on the same handshake
#[tokio::test]
async fn test_second_key_after_rejection() {
    let alice = generate_key();
    let old_key = generate_key();
    let store = StaticAuthorizations::new().with_model(
        MODEL_UUID,
        &["alice"],
        authorized_line(&alice, "alice@laptop"),
    );
    let bastion = start_bastion(resolver_for(store)).await;

    let jump = connect_jump(bastion.addr).await;
    let tunnel = open_tunnel(&jump, &destination_host(2, "redis", MODEL_UUID), 6379)
        .await
        .expect("Tunnel should open");
    let mut terminating = connect_terminating(tunnel).await;

    assert!(!authenticate_key(&mut terminating, "alice", &old_key).await);
    assert!(authenticate_key(&mut terminating, "alice", &alice).await);
}

/// Password authentication is never accepted by the terminating hop
#[tokio::test]
async fn test_password_rejected_on_terminating_hop() {
    let store = StaticAuthorizations::new().with_model(MODEL_UUID, &["alice"], "");
    let bastion = start_bastion(resolver_for(store)).await;

    let jump = connect_jump(bastion.addr).await;
    let tunnel = open_tunnel(&jump, &destination_host(1, "postgresql", MODEL_UUID), 22)
        .await
        .expect("Tunnel should open");
    let mut terminating = connect_terminating(tunnel).await;

    let result = terminating
        .authenticate_password("alice", "hunter2")
        .await
        .expect("Password attempt errored");
    assert!(!result.success());
}

/// The SSH login name reaches the control plane as a user tag
#[tokio::test]
async fn test_login_name_sent_as_user_tag() {
    let bob = generate_key();
    let store = StaticAuthorizations::new().with_model(
        MODEL_UUID,
        &["bob@external"],
        authorized_line(&bob, "bob"),
    );
    let recorder = Arc::new(RecordingClient::new(resolver_for(store)));
    let bastion = start_bastion(recorder.clone()).await;

    let host = destination_host(1, "postgresql", MODEL_UUID);
    let (_jump, terminating, authenticated) =
        terminating_session(bastion.addr, &host, "bob@external", &bob).await;
    assert!(authenticated);
    let tags = recorder.user_tags();
    assert!(!tags.is_empty());
    assert!(tags.iter().all(|tag| tag == "user-bob@external"));

    let (output, _) = exec_output(&terminating).await;
    assert!(output.ends_with("as user: bob@external\n"));
}

/// Owner of one model and reader of another reaches both with the owned key
#[tokio::test]
async fn test_key_on_any_accessible_model_grants_access() {
    let bob = generate_key();
    let store = StaticAuthorizations::new()
        .with_model(MODEL_UUID, &["bob"], authorized_line(&bob, "bob@owner"))
        .with_model(OTHER_MODEL_UUID, &["bob", "carol"], "");
    let bastion = start_bastion(resolver_for(store)).await;

    // Destination lives in the model where bob's key is not stored.
    let host = destination_host(0, "grafana", OTHER_MODEL_UUID);
    let (_jump, terminating, authenticated) =
        terminating_session(bastion.addr, &host, "bob", &bob).await;
    assert!(authenticated, "A key on any accessible model is enough");

    let (output, _) = exec_output(&terminating).await;
    assert_eq!(
        output,
        format!("Your final destination is: {} as user: bob\n", host)
    );

    let (_jump, _terminating, authenticated) =
        terminating_session(bastion.addr, &host, "dave", &bob).await;
    assert!(!authenticated, "A user with no models is denied");
}

/// The canonical walk-through: port 20, user ubuntu, empty command
#[tokio::test]
async fn test_ubuntu_on_postgresql_unit() {
    let ubuntu = generate_key();
    let store = StaticAuthorizations::new().with_model(
        MODEL_UUID,
        &["ubuntu"],
        authorized_line(&ubuntu, "ubuntu@workstation"),
    );
    let bastion = start_bastion(resolver_for(store)).await;

    let jump = connect_jump(bastion.addr).await;
    let tunnel = open_tunnel(&jump, &destination_host(1, "postgresql", MODEL_UUID), 20)
        .await
        .expect("Tunnel should open");
    let mut terminating = connect_terminating(tunnel).await;
    assert!(authenticate_key(&mut terminating, "ubuntu", &ubuntu).await);

    let (output, status) = exec_output(&terminating).await;
    assert_eq!(
        output,
        "Your final destination is: 1.postgresql.8419cd78-4993-4c3a-928e-c646226beeee.juju.local as user: ubuntu\n"
    );
    assert_eq!(status, Some(0));
}
