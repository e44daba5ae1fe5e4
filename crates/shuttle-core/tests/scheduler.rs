//! End-to-end behaviour of the scheduler actor through its client handle.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{WAIT, echo, harness, held, stop, wait_info, wait_status};
use shuttle_core::app::admission::{MSG_FAILED_AT_SHUTDOWN, MSG_QUEUED_AT_SHUTDOWN, MSG_WRONG_USER};
use shuttle_core::app::scheduler::{MSG_DELETED_FROM_QUEUE, MSG_KILLED_WHILE_RUNNING};
use shuttle_core::domain::ClientError;
use shuttle_core::{TaskId, TaskStatus};

#[tokio::test]
async fn result_collection_walkthrough() {
    let h = harness(1);
    h.handle.submit(vec![held("t1", "alice")]).await.unwrap();
    wait_status(&h.handle, "t1", TaskStatus::Running).await;

    let wrong = h.handle.get_result("t1", "bob").await.unwrap();
    assert_eq!(wrong.status, TaskStatus::Error);
    assert_eq!(wrong.outcome.error_message(), Some(MSG_WRONG_USER));
    assert!(!h.handle.is_finished("t1").await.unwrap());

    h.latch.add_permits(1);
    wait_status(&h.handle, "t1", TaskStatus::Finished).await;
    assert!(h.handle.is_finished("t1").await.unwrap());

    let result = h.handle.get_result("t1", "alice").await.unwrap();
    assert_eq!(result.status, TaskStatus::Finished);
    assert_eq!(result.value(), Some(&json!("t1")));

    // Already collected: no answer until shutdown begins.
    let waiter = tokio::spawn({
        let handle = h.handle.clone();
        async move { handle.get_result("t1", "alice").await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiter.is_finished());

    h.handle.shutdown(false).await.unwrap();
    let late = tokio::time::timeout(WAIT, waiter)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(late.status, TaskStatus::Error);
    let message = late.outcome.error_message().unwrap();
    assert!(message.contains("does not exist"));
    assert!(message.contains("already collected"));

    stop(h).await;
}

#[tokio::test]
async fn an_early_caller_giving_up_leaves_the_result_for_the_owner() {
    let h = harness(1);
    h.handle.submit(vec![held("t1", "alice")]).await.unwrap();
    wait_status(&h.handle, "t1", TaskStatus::Running).await;

    let early =
        tokio::time::timeout(Duration::from_millis(50), h.handle.get_result("t1", "alice")).await;
    assert!(early.is_err());

    h.latch.add_permits(1);
    wait_status(&h.handle, "t1", TaskStatus::Finished).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.handle.is_finished("t1").await.unwrap());
    assert_eq!(h.handle.finished_ids().await.unwrap(), vec![TaskId::new("t1")]);

    let result = tokio::time::timeout(WAIT, h.handle.get_result("t1", "alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.status, TaskStatus::Finished);
    assert_eq!(result.value(), Some(&json!("t1")));

    stop(h).await;
}

#[tokio::test]
async fn wrong_user_gets_an_error_in_every_state() {
    let h = harness(1);
    h.handle
        .submit(vec![held("run", "alice"), echo("wait", "alice", json!(1))])
        .await
        .unwrap();
    wait_status(&h.handle, "run", TaskStatus::Running).await;
    assert_eq!(h.handle.info("wait").await.unwrap().status, TaskStatus::Queued);

    for id in ["run", "wait"] {
        let result = h.handle.get_result(id, "mallory").await.unwrap();
        assert_eq!(result.status, TaskStatus::Error, "task {id}");
    }

    h.latch.add_permits(1);
    wait_status(&h.handle, "run", TaskStatus::Finished).await;
    let result = h.handle.get_result("run", "mallory").await.unwrap();
    assert_eq!(result.status, TaskStatus::Error);

    // the real owner still gets the real result
    let result = h.handle.get_result("run", "alice").await.unwrap();
    assert_eq!(result.status, TaskStatus::Finished);

    stop(h).await;
}

#[tokio::test]
async fn lifecycle_timestamps_are_ordered() {
    let h = harness(1);
    h.handle
        .submit(vec![echo("t1", "alice", json!({"n": 7}))])
        .await
        .unwrap();
    let info = wait_status(&h.handle, "t1", TaskStatus::Finished).await;

    assert_eq!(info.owner, "alice");
    assert_eq!(info.failures, 0);
    assert!(info.created_at.is_some());
    assert!(info.created_at <= info.queued_at);
    assert!(info.queued_at <= info.scheduled_at);
    assert!(info.scheduled_at <= info.finished_at);
    assert_eq!(h.handle.finished_ids().await.unwrap(), vec![TaskId::new("t1")]);

    stop(h).await;
}

#[tokio::test]
async fn every_task_has_exactly_one_home() {
    let h = harness(2);
    h.handle
        .submit(vec![
            held("a", "alice"),
            held("b", "alice"),
            held("c", "alice"),
            echo("d", "bob", json!(null)),
        ])
        .await
        .unwrap();
    wait_status(&h.handle, "b", TaskStatus::Running).await;
    // one of a/b finishes and c takes its node; after that nothing moves
    h.latch.add_permits(1);
    wait_status(&h.handle, "c", TaskStatus::Running).await;

    let queued = h.handle.queued_ids().await.unwrap();
    let running = h.handle.running_ids().await.unwrap();
    let finished = h.handle.finished_ids().await.unwrap();
    let mut all: Vec<TaskId> = queued.iter().chain(&running).chain(&finished).cloned().collect();
    let total = all.len();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), total, "a task showed up in two places");
    assert_eq!(h.handle.info_all().await.unwrap().len(), 4);

    for id in &running {
        assert!(h.handle.is_running(id.clone()).await.unwrap());
        assert!(!h.handle.is_in_queue(id.clone()).await.unwrap());
    }
    for id in &queued {
        assert!(h.handle.is_in_queue(id.clone()).await.unwrap());
    }

    stop(h).await;
}

#[tokio::test]
async fn duplicate_ids_are_skipped() {
    let h = harness(1);
    h.handle
        .submit(vec![held("a", "alice"), echo("a", "bob", json!(2))])
        .await
        .unwrap();
    h.handle.submit(vec![echo("a", "carol", json!(3))]).await.unwrap();

    let infos = h.handle.info_all().await.unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].owner, "alice");

    stop(h).await;
}

#[tokio::test]
async fn unknown_task_info() {
    let h = harness(0);
    let info = h.handle.info("ghost").await.unwrap();
    assert_eq!(info.status, TaskStatus::New);
    assert_eq!(info.owner, "unknown");
    assert_eq!(info.executor_url, "unknown");
    assert!(info.created_at.is_none());
    assert!(!h.handle.is_in_queue("ghost").await.unwrap());
    assert!(!h.handle.is_running("ghost").await.unwrap());
    stop(h).await;
}

#[tokio::test]
async fn soft_shutdown_lets_running_finish_and_launches_nothing() {
    let h = harness(1);
    h.handle
        .submit(vec![held("a", "alice"), echo("b", "alice", json!("b"))])
        .await
        .unwrap();
    wait_status(&h.handle, "a", TaskStatus::Running).await;

    h.handle.shutdown(false).await.unwrap();
    h.latch.add_permits(1);
    wait_status(&h.handle, "a", TaskStatus::Finished).await;

    // the node is free again, yet b stays queued
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.pool.available().await, 1);
    assert!(h.handle.is_in_queue("b").await.unwrap());
    assert_eq!(h.handle.info("b").await.unwrap().status, TaskStatus::Queued);

    let b = h.handle.get_result("b", "alice").await.unwrap();
    assert_eq!(b.status, TaskStatus::Error);
    assert_eq!(b.outcome.error_message(), Some(MSG_QUEUED_AT_SHUTDOWN));

    let a = h.handle.get_result("a", "alice").await.unwrap();
    assert_eq!(a.status, TaskStatus::Finished);

    // submissions are still accepted, but never launched
    h.handle.submit(vec![echo("late", "alice", json!(0))]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.handle.is_in_queue("late").await.unwrap());

    stop(h).await;
}

#[tokio::test]
async fn hard_shutdown_kills_running_and_flushes_the_queue() {
    let h = harness(2);
    h.handle
        .submit(vec![held("a", "alice"), held("b", "alice"), held("c", "alice")])
        .await
        .unwrap();
    wait_status(&h.handle, "a", TaskStatus::Running).await;
    wait_status(&h.handle, "b", TaskStatus::Running).await;

    h.handle.shutdown(true).await.unwrap();

    assert!(h.handle.running_ids().await.unwrap().is_empty());
    let mut killed = h.handle.killed_ids().await.unwrap();
    killed.sort();
    assert_eq!(killed, vec![TaskId::new("a"), TaskId::new("b")]);
    assert!(h.handle.queued_ids().await.unwrap().is_empty());
    assert_eq!(h.pool.leased().await, 0);

    let a = h.handle.get_result("a", "alice").await.unwrap();
    assert_eq!(a.status, TaskStatus::Killed);
    assert_eq!(a.outcome.error_message(), Some(MSG_KILLED_WHILE_RUNNING));

    // c was discarded with the policy
    let c = h.handle.get_result("c", "alice").await.unwrap();
    assert_eq!(c.status, TaskStatus::Error);

    // a second request is a no-op
    h.handle.shutdown(true).await.unwrap();
    stop(h).await;
}

#[tokio::test]
async fn terminate_is_held_back_until_shutdown() {
    let h = harness(1);
    h.handle.submit(vec![held("a", "alice")]).await.unwrap();
    wait_status(&h.handle, "a", TaskStatus::Running).await;

    let terminate = tokio::spawn({
        let handle = h.handle.clone();
        async move { handle.terminate_scheduler().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!terminate.is_finished());
    assert!(!h.handle.is_terminated());

    h.handle.shutdown(false).await.unwrap();
    // still running, so still not terminated
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!terminate.is_finished());

    h.latch.add_permits(1);
    let granted = tokio::time::timeout(WAIT, terminate)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(granted);
    tokio::time::timeout(WAIT, h.join).await.unwrap().unwrap();

    assert_eq!(
        h.handle.is_finished("a").await,
        Err(ClientError::SchedulerTerminated)
    );
}

#[tokio::test]
async fn failed_probe_sends_the_task_back_once() {
    let h = harness(2);
    h.handle.submit(vec![held("a", "alice")]).await.unwrap();
    let info = wait_status(&h.handle, "a", TaskStatus::Running).await;
    assert_eq!(info.executor_url, "local://n0");

    h.executors[0].set_healthy(false);

    // n1 is the only healthy node, so the relaunch lands there
    let info = wait_info(&h.handle, "a", |i| {
        i.status == TaskStatus::Running && i.executor_url == "local://n1"
    })
    .await;
    assert_eq!(info.failures, 1);

    // one permit for the orphaned run on n0, one for the relaunch
    h.latch.add_permits(2);
    wait_status(&h.handle, "a", TaskStatus::Finished).await;
    let result = h.handle.get_result("a", "alice").await.unwrap();
    assert_eq!(result.value(), Some(&json!("a")));

    stop(h).await;
}

#[tokio::test]
async fn launch_failures_stop_at_the_policy_limit() {
    let h = harness(1);
    h.executors[0].set_healthy(false);
    h.handle
        .submit(vec![echo("a", "alice", json!(1)), echo("b", "alice", json!(2))])
        .await
        .unwrap();

    let info = wait_info(&h.handle, "a", |i| i.failures == 3).await;
    assert_eq!(info.status, TaskStatus::Failed);
    wait_info(&h.handle, "b", |i| i.failures == 3).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.handle.info("a").await.unwrap().failures, 3);
    let mut failed = h.handle.failed_ids().await.unwrap();
    failed.sort_by(|x, y| x.as_str().cmp(y.as_str()));
    assert_eq!(failed, vec![TaskId::new("a"), TaskId::new("b")]);
    assert_eq!(h.pool.leased().await, 0);

    // failed tasks can still be deleted
    assert!(h.handle.del("b", "alice").await.unwrap());
    let result = h.handle.get_result("b", "alice").await.unwrap();
    assert_eq!(result.status, TaskStatus::Killed);

    // once shutting down, the owner of a failed task gets an error back
    h.handle.shutdown(false).await.unwrap();
    let a = tokio::time::timeout(WAIT, h.handle.get_result("a", "alice"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a.status, TaskStatus::Error);
    assert_eq!(a.outcome.error_message(), Some(MSG_FAILED_AT_SHUTDOWN));

    stop(h).await;
}

#[tokio::test]
async fn del_rules() {
    let h = harness(1);
    h.handle
        .submit(vec![held("a", "alice"), echo("b", "alice", json!(0))])
        .await
        .unwrap();
    wait_status(&h.handle, "a", TaskStatus::Running).await;

    assert!(!h.handle.del("ghost", "alice").await.unwrap());
    assert!(!h.handle.del("a", "bob").await.unwrap());

    // the admin may delete anyone's task
    assert!(h.handle.del("b", "admin").await.unwrap());
    let b = h.handle.get_result("b", "alice").await.unwrap();
    assert_eq!(b.status, TaskStatus::Killed);
    assert_eq!(b.outcome.error_message(), Some(MSG_DELETED_FROM_QUEUE));

    assert!(h.handle.del("a", "alice").await.unwrap());
    assert!(!h.handle.is_running("a").await.unwrap());
    assert_eq!(h.handle.killed_ids().await.unwrap(), vec![TaskId::new("a")]);
    // killed already: nothing left to delete
    assert!(!h.handle.del("a", "alice").await.unwrap());

    let a = h.handle.get_result("a", "alice").await.unwrap();
    assert_eq!(a.status, TaskStatus::Killed);
    assert_eq!(a.outcome.error_message(), Some(MSG_KILLED_WHILE_RUNNING));
    assert!(!h.handle.del("a", "alice").await.unwrap());
    assert_eq!(h.pool.leased().await, 0);

    stop(h).await;
}

#[tokio::test]
async fn dropping_every_handle_drains_and_exits() {
    let h = harness(1);
    h.handle
        .submit(vec![echo("a", "alice", json!(1))])
        .await
        .unwrap();
    let join = h.join;
    drop(h.handle);
    tokio::time::timeout(WAIT, join).await.unwrap().unwrap();
}
