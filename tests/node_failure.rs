//! Member failure and recovery

mod common;

use common::start_cluster;
use relaykv::common::protocol::Reply;
use relaykv::leader::SelectionPolicy;
use relaykv::Error;

#[tokio::test]
async fn test_crashed_member_reports_error_but_leader_copy_survives() {
    let cluster = start_cluster(&["m1", "m2", "m3"], &["m1"], 2, SelectionPolicy::HashBased).await;
    let mut client = cluster.client().await;

    let reply = client.send("SET 5 hello").await.unwrap();
    assert_eq!(
        reply,
        Reply::Error("replication failed: stored on 1 of 2 members".into())
    );
    assert!(cluster.member("m3").holds(5));
    assert!(!cluster.state.directory.is_alive("m1"));

    assert_eq!(client.get(5).await.unwrap().as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_dead_member_is_not_selected_again() {
    let cluster = start_cluster(&["m1", "m2", "m3"], &["m1"], 3, SelectionPolicy::RoundRobin).await;
    let mut client = cluster.client().await;

    assert!(matches!(client.set(0, "first").await, Err(Error::Remote(_))));

    for id in 1..10 {
        client.set(id, "next").await.unwrap();
        assert!(!cluster.state.index.contains(id, "m1"));
        assert_eq!(cluster.state.index.count_for(id), 3);
    }
}

#[tokio::test]
async fn test_get_falls_back_in_recorded_order() {
    let mut cluster = start_cluster(&["m1", "m2", "m3"], &[], 3, SelectionPolicy::HashBased).await;
    let mut client = cluster.client().await;

    // 3 mod 3 = 0: recorded as m1, m2, m3
    client.set(3, "replicated").await.unwrap();
    assert_eq!(cluster.state.index.replicas_for(3), vec!["leader", "m1", "m2", "m3"]);

    // lose the leader's copy and the first two members
    std::fs::remove_file(cluster.leader_dir.join("3.msg")).unwrap();
    cluster.member_mut("m1").stop().await;
    cluster.member_mut("m2").stop().await;

    assert_eq!(client.get(3).await.unwrap().as_deref(), Some("replicated"));
    assert!(!cluster.state.directory.is_alive("m1"));
    assert!(!cluster.state.directory.is_alive("m2"));
    assert!(cluster.state.directory.is_alive("m3"));

    // m1 is now skipped without being contacted; m3 still answers
    assert_eq!(client.get(3).await.unwrap().as_deref(), Some("replicated"));
}

#[tokio::test]
async fn test_every_member_down_on_read() {
    let mut cluster = start_cluster(&["m1", "m2"], &[], 2, SelectionPolicy::HashBased).await;
    let mut client = cluster.client().await;

    client.set(8, "gone").await.unwrap();
    std::fs::remove_file(cluster.leader_dir.join("8.msg")).unwrap();
    cluster.member_mut("m1").stop().await;
    cluster.member_mut("m2").stop().await;

    assert_eq!(client.get(8).await.unwrap(), None);
    assert_eq!(cluster.state.directory.alive_count(), 0);
}
