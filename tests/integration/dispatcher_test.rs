// tests/integration/dispatcher_test.rs

//! Integration tests for command dispatch
//! Tests: the command table, the error barrier, !timeout and its gate, !msg

use super::test_helpers::*;
use chatrelay::core::TransportFault;
use chatrelay::core::commands::{Dispatcher, DispatcherConfig};
use chatrelay::core::tasks::Task;
use std::sync::Arc;
use std::time::Duration;

fn dispatcher(leaderboard: MockLeaderboard) -> Dispatcher {
    init_tracing();
    Dispatcher::new(
        DispatcherConfig {
            bot_name: BOT.to_string(),
            home_channel: HOME.to_string(),
            privileged_user: OWNER.to_string(),
            disable_duration: Duration::from_secs(600),
            target_timeout: Duration::from_secs(5),
            speaker_timeout: Duration::from_secs(30),
        },
        Arc::new(leaderboard),
    )
}

fn healthy() -> Dispatcher {
    dispatcher(MockLeaderboard::new(MockMode::Healthy))
}

// ===== Command table =====

#[tokio::test]
async fn test_static_reply_in_home_channel() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!twitter")).await.unwrap();

    assert_eq!(
        out.said,
        vec![(
            HOME.to_string(),
            "Twitter: https://twitter.com/ComplexPlaneRun".to_string()
        )]
    );
}

#[tokio::test]
async fn test_home_only_command_is_silent_elsewhere() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", "friend", "!twitter")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", "friend", "!nosuchcommand")).await.unwrap();

    assert!(out.said.is_empty());
}

#[tokio::test]
async fn test_anywhere_command_answers_in_auxiliary_channel() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", "friend", "!alisters")).await.unwrap();

    assert_eq!(out.said.len(), 1);
    assert_eq!(out.said[0].0, "friend");
}

#[tokio::test]
async fn test_unrecognized_command_in_home_channel() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!frobnicate now")).await.unwrap();

    assert_eq!(out.texts(), vec!["!frobnicate: unrecognized command :("]);
}

#[tokio::test]
async fn test_plain_chat_is_ignored() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "hello there")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "! spaced out")).await.unwrap();

    assert!(out.said.is_empty());
}

#[tokio::test]
async fn test_multi_line_reply_keeps_order() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!pausing")).await.unwrap();

    assert_eq!(out.said.len(), 2);
}

#[tokio::test]
async fn test_template_substitutes_speaker() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!smh")).await.unwrap();

    assert!(out.said[0].1.starts_with("Hi, my name is alice"));
    assert!(out.said[0].1.contains("twitch.tv/alice"));
}

// ===== Leaderboard commands =====

#[tokio::test]
async fn test_place_shorthand_queries_leaderboard() {
    let mut d = dispatcher(MockLeaderboard::new(MockMode::Healthy).with_place(3, "3rd: someone"));
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", "friend", "!3rd")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "!7th")).await.unwrap();

    assert_eq!(out.texts(), vec!["3rd: someone", "Nobody is in 7th place."]);
}

#[tokio::test]
async fn test_malformed_place_is_unrecognized() {
    let leaderboard = Arc::new(MockLeaderboard::new(MockMode::Healthy));
    init_tracing();
    let mut d = Dispatcher::new(
        DispatcherConfig {
            bot_name: BOT.to_string(),
            home_channel: HOME.to_string(),
            privileged_user: OWNER.to_string(),
            disable_duration: Duration::from_secs(600),
            target_timeout: Duration::from_secs(5),
            speaker_timeout: Duration::from_secs(30),
        },
        leaderboard.clone(),
    );
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!2st")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "!0th")).await.unwrap();

    assert_eq!(
        out.texts(),
        vec![
            "!2st: unrecognized command :(",
            "!0th: unrecognized command :("
        ]
    );
    assert_eq!(leaderboard.calls(), 0);
}

#[tokio::test]
async fn test_wr_is_an_alias_for_first_place() {
    let mut d = dispatcher(MockLeaderboard::new(MockMode::Healthy).with_place(1, "WR holder"));
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", "friend", "!wr")).await.unwrap();

    assert_eq!(out.texts(), vec!["WR holder"]);
}

#[tokio::test]
async fn test_rank_validates_username() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!rank")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "!rank bad-name!")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "!rank ghost")).await.unwrap();

    assert_eq!(
        out.texts(),
        vec![
            "Please provide a valid speedrun.com username to lookup.",
            "Invalid username: bad-name!",
            "User ghost does not exist.",
        ]
    );
}

#[tokio::test]
async fn test_issrcdown_reports_both_states() {
    let mut up = healthy();
    let mut down = dispatcher(MockLeaderboard::new(MockMode::Down));
    let mut out = RecordingOutbound::new();

    up.dispatch(&mut out, &chat("alice", HOME, "!issrcdown")).await.unwrap();
    down.dispatch(&mut out, &chat("alice", HOME, "!issrcdown")).await.unwrap();

    assert_eq!(
        out.texts(),
        vec![
            "speedrun.com appears to be UP.",
            "speedrun.com appears to be DOWN."
        ]
    );
}

// ===== Error barrier =====

#[tokio::test]
async fn test_query_failure_is_replied_verbatim() {
    let mut d = dispatcher(MockLeaderboard::new(MockMode::Down));
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!latest")).await.unwrap();

    assert_eq!(
        out.texts(),
        vec!["Failed to communicate with www.speedrun.com, is it down?"]
    );
}

#[tokio::test]
async fn test_unexpected_failure_is_flattened_to_one_line() {
    let mut d = dispatcher(MockLeaderboard::new(MockMode::Broken));
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!latest")).await.unwrap();

    assert_eq!(out.said.len(), 1);
    let reply = &out.said[0].1;
    assert!(reply.starts_with("Oops!! "));
    assert!(!reply.contains(['\r', '\n']));
    assert!(reply.contains("unexpected payload line two"));
}

#[tokio::test]
async fn test_panicking_handler_is_caught() {
    let mut d = dispatcher(MockLeaderboard::new(MockMode::Panicking));
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!latest")).await.unwrap();

    assert_eq!(out.texts(), vec!["Oops!! panic: leaderboard exploded"]);
}

#[tokio::test]
async fn test_transport_fault_escapes_the_barrier() {
    let mut d = healthy();
    let mut out = RecordingOutbound::failing();

    let err = d
        .dispatch(&mut out, &chat("alice", HOME, "!rank 3rd"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportFault::Write(_)));
}

// ===== Phrase scan =====

#[tokio::test]
async fn test_phrase_reply_only_in_home_channel() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "anyone like Porter Robinson?")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", "friend", "porter robinson")).await.unwrap();

    assert_eq!(out.said, vec![(HOME.to_string(), "【=◈︿◈=】".to_string())]);
}

#[tokio::test]
async fn test_phrase_scan_runs_before_commands() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!twitter madeon")).await.unwrap();

    assert_eq!(out.said.len(), 2);
    assert_eq!(out.said[0].1, "【=◈︿◈=】");
}

// ===== !timeout =====

#[tokio::test]
async fn test_timeout_alternates_between_target_and_speaker() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    for _ in 0..4 {
        d.dispatch(&mut out, &chat("alice", HOME, "!timeout bob")).await.unwrap();
    }

    assert_eq!(
        out.texts(),
        vec![
            "/timeout bob 5",
            "User bob timed out for 5 seconds.",
            "/timeout alice 30",
            "User alice timed out for 30 seconds.",
            "/timeout alice 30",
            "User alice timed out for 30 seconds.",
            "/timeout bob 5",
            "User bob timed out for 5 seconds.",
        ]
    );
    assert_eq!(d.timeout_count("alice"), 4);
}

#[tokio::test]
async fn test_timeout_counts_are_per_speaker() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!timeout bob")).await.unwrap();
    d.dispatch(&mut out, &chat("carol", HOME, "!timeout bob")).await.unwrap();

    assert_eq!(out.said[2].1, "/timeout bob 5");
    assert_eq!(d.timeout_count("alice"), 1);
    assert_eq!(d.timeout_count("carol"), 1);
}

#[tokio::test]
async fn test_malformed_timeout_is_not_counted() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!timeout")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "!timeout two words")).await.unwrap();

    assert_eq!(
        out.texts(),
        vec![
            "Please specify a user to timeout.",
            "Invalid username to timeout: two words",
        ]
    );
    assert_eq!(d.timeout_count("alice"), 0);
}

#[tokio::test]
async fn test_timeout_counted_even_when_send_fails() {
    let mut d = healthy();
    let mut out = RecordingOutbound::failing();

    let result = d.dispatch(&mut out, &chat("alice", HOME, "!timeout bob")).await;

    assert!(matches!(result, Err(TransportFault::Write(_))));
    assert_eq!(d.timeout_count("alice"), 1);
}

#[tokio::test]
async fn test_timeout_is_home_only() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", "friend", "!timeout bob")).await.unwrap();

    assert!(out.said.is_empty());
    assert_eq!(d.timeout_count("alice"), 0);
}

// ===== Gate =====

#[tokio::test(start_paused = true)]
async fn test_disable_schedules_reenable() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat(OWNER, HOME, "!disabletimeout")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "!timeout bob")).await.unwrap();

    assert!(!d.timeouts_enabled());
    assert_eq!(
        out.texts(),
        vec![
            "Timeouts disabled for 10 minutes.",
            "Timeouts are currently disabled.",
        ]
    );
    assert_eq!(d.timeout_count("alice"), 0);

    tokio::time::advance(Duration::from_secs(599)).await;
    assert!(out.timers.pop_due(tokio::time::Instant::now()).is_none());
    tokio::time::advance(Duration::from_secs(1)).await;
    let fired = out.timers.pop_due(tokio::time::Instant::now()).unwrap();
    assert_eq!(fired.task, Task::ReenableTimeout);

    d.reenable_timeouts();
    assert!(d.timeouts_enabled());
}

#[tokio::test(start_paused = true)]
async fn test_second_disable_replaces_pending_reenable() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat(OWNER, HOME, "!disabletimeout")).await.unwrap();
    tokio::time::advance(Duration::from_secs(300)).await;
    d.dispatch(&mut out, &chat(OWNER, HOME, "!disabletimeout")).await.unwrap();

    assert_eq!(out.cancelled.len(), 1);
    assert_eq!(out.timers.len(), 1);

    // The first re-enable would have fired here.
    tokio::time::advance(Duration::from_secs(300)).await;
    assert!(out.timers.pop_due(tokio::time::Instant::now()).is_none());
    tokio::time::advance(Duration::from_secs(300)).await;
    assert!(out.timers.pop_due(tokio::time::Instant::now()).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_privileged_enable_cancels_reenable() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat(OWNER, HOME, "!disabletimeout")).await.unwrap();
    d.dispatch(&mut out, &chat("Owner", HOME, "!enabletimeout")).await.unwrap();

    assert!(d.timeouts_enabled());
    assert_eq!(out.said.last().unwrap().1, "Timeouts enabled.");
    assert!(out.timers.is_empty());
}

#[tokio::test]
async fn test_unprivileged_enable_times_out_caller() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat(OWNER, HOME, "!disabletimeout")).await.unwrap();
    d.dispatch(&mut out, &chat("alice", HOME, "!enabletimeout")).await.unwrap();

    assert!(!d.timeouts_enabled());
    assert_eq!(
        &out.texts()[1..],
        &["/timeout alice 30", "User alice timed out for 30 seconds."]
    );
    // Still disabled, and the scheduled re-enable is untouched.
    assert!(out.cancelled.is_empty());
    assert_eq!(out.timers.len(), 1);
}

#[tokio::test]
async fn test_unprivileged_enable_penalised_even_when_enabled() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!enabletimeout")).await.unwrap();

    assert!(d.timeouts_enabled());
    assert_eq!(out.said[0].1, "/timeout alice 30");
}

#[tokio::test]
async fn test_unprivileged_disable_is_refused() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!disabletimeout")).await.unwrap();

    assert!(d.timeouts_enabled());
    assert_eq!(out.texts(), vec!["Only owner can disable timeouts."]);
    assert!(out.timers.is_empty());
}

// ===== !msg =====

#[tokio::test]
async fn test_msg_joins_and_relays() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!msg friend  get over here")).await.unwrap();

    assert_eq!(out.joined, vec!["friend"]);
    assert_eq!(
        out.said,
        vec![
            ("friend".to_string(), "alice says: get over here".to_string()),
            (HOME.to_string(), "Message sent.".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_msg_without_text_shows_usage() {
    let mut d = healthy();
    let mut out = RecordingOutbound::new();

    d.dispatch(&mut out, &chat("alice", HOME, "!msg friend")).await.unwrap();

    assert!(out.joined.is_empty());
    assert!(out.said[0].1.starts_with("Usage example"));
}

#[tokio::test]
async fn test_msg_to_unconfirmed_channel_is_reported_not_fatal() {
    let mut d = healthy();
    let mut out = RecordingOutbound {
        unconfirmed_joins: true,
        ..RecordingOutbound::new()
    };

    d.dispatch(&mut out, &chat("alice", HOME, "!msg nosuchchan hi"))
        .await
        .unwrap();

    assert_eq!(
        out.said,
        vec![(HOME.to_string(), "Oops!! could not join #nosuchchan".to_string())]
    );
}
