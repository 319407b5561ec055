//! Integration tests for the dispatcher: replies, filtering, broadcasts,
//! and the sequential message loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use molliebot::dispatcher::{
    self, go_away_reply, DispatcherSettings, HELP_TEXT, ON_CALL_DISABLED, ON_CALL_UNAVAILABLE,
};
use molliebot::flavor;
use molliebot::models::lunch::LunchEntry;
use molliebot::models::message::InboundMessage;

use super::test_helpers::{
    calendar_at, default_settings, dispatcher, message, oncall_service, posted, shift, utc,
    FakeProvider, FirstPicker, RecordingTransport,
};

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn soup_today() -> Vec<LunchEntry> {
    vec![LunchEntry::new(day(2024, 3, 13), "Soup")]
}

fn restricted(channels: &[&str]) -> DispatcherSettings {
    DispatcherSettings {
        restrict_to_config_channels: true,
        restricted_channels: channels.iter().map(|id| (*id).to_owned()).collect(),
        ..default_settings()
    }
}

// ── Replies ─────────────────────────────────────────────

#[tokio::test]
async fn lunch_reply_carries_footer() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    let sent = dispatcher
        .handle_message(&message("C_GENERAL", "Mollie what's for lunch today"))
        .await;

    assert_eq!(sent, 1);
    assert_eq!(
        transport.sent(),
        vec![("C_GENERAL".to_owned(), posted("Today we eat: Soup"))]
    );
}

#[tokio::test]
async fn week_reply_lists_days_in_order() {
    let transport = Arc::new(RecordingTransport::new());
    let lunches = vec![
        LunchEntry::new(day(2024, 3, 13), "Soup"),
        LunchEntry::new(day(2024, 3, 11), "Pasta"),
        LunchEntry::new(day(2024, 3, 20), "Next week"),
    ];
    let dispatcher = dispatcher(Arc::clone(&transport), lunches, None, default_settings());

    dispatcher
        .handle_message(&message("C_GENERAL", "What are we having for lunch this week mollie"))
        .await;

    assert_eq!(
        transport.sent_to("C_GENERAL"),
        vec![posted(
            "This week the following is on the menu:\nMonday: Pasta\nWednesday: Soup\n"
        )]
    );
}

#[tokio::test]
async fn unaddressed_message_gets_no_reply() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    let sent = dispatcher
        .handle_message(&message("C_GENERAL", "what's for lunch today?"))
        .await;

    assert_eq!(sent, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn bot_messages_are_ignored() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());
    let mut from_bot = message("C_GENERAL", "Mollie what's for lunch today");
    from_bot.from_bot = true;

    assert_eq!(dispatcher.handle_message(&from_bot).await, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn restricted_dispatcher_only_answers_configured_channels() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        soup_today(),
        None,
        restricted(&["C_LUNCH"]),
    );

    let outside = dispatcher
        .handle_message(&message("C_RANDOM", "Mollie what's for lunch today"))
        .await;
    let inside = dispatcher
        .handle_message(&message("C_LUNCH", "Mollie what's for lunch today"))
        .await;

    assert_eq!(outside, 0);
    assert_eq!(inside, 1);
    assert!(transport.sent_to("C_RANDOM").is_empty());
}

#[tokio::test]
async fn help_and_go_away_are_answered_in_order() {
    let transport = Arc::new(RecordingTransport::new().with_user("U_AUTHOR", "dave"));
    let dispatcher = dispatcher(Arc::clone(&transport), Vec::new(), None, default_settings());

    let sent = dispatcher
        .handle_message(&message("C_GENERAL", "Mollie help me or go away"))
        .await;

    assert_eq!(sent, 2);
    let texts: Vec<String> = transport.sent().into_iter().map(|(_, text)| text).collect();
    assert_eq!(texts, vec![posted(HELP_TEXT), posted(&go_away_reply("dave"))]);
}

#[tokio::test]
async fn go_away_falls_back_to_a_mention_when_lookup_fails() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(Arc::clone(&transport), Vec::new(), None, default_settings());

    dispatcher
        .handle_message(&message("C_GENERAL", "Mollie go away"))
        .await;

    assert_eq!(
        transport.sent_to("C_GENERAL"),
        vec![posted("I'm sorry <@U_AUTHOR>, I'm afraid I can't do that")]
    );
}

#[tokio::test]
async fn mentions_are_resolved_once_per_user() {
    let transport = Arc::new(RecordingTransport::new().with_user("U_BOT", "Mollie"));
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    let sent = dispatcher
        .handle_message(&message("C_GENERAL", "<@U_BOT> lunch today? <@U_BOT>"))
        .await;

    assert_eq!(sent, 1);
    assert_eq!(transport.lookups(), 1);
}

#[tokio::test]
async fn unresolvable_mention_keeps_the_token() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    // The bot is only addressed through the mention, which cannot be resolved.
    let sent = dispatcher
        .handle_message(&message("C_GENERAL", "<@U_BOT> lunch today"))
        .await;

    assert_eq!(sent, 0);
    assert_eq!(transport.lookups(), 1);
}

#[tokio::test]
async fn direct_messages_need_no_bot_name() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    let sent = dispatcher
        .handle_message(&message("D0123ABCDE", "what's for lunch today"))
        .await;

    assert_eq!(sent, 1);
    assert_eq!(
        transport.sent_to("D0123ABCDE"),
        vec![posted("Today we eat: Soup")]
    );
}

#[tokio::test]
async fn on_call_question_without_integration() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(Arc::clone(&transport), Vec::new(), None, default_settings());

    dispatcher
        .handle_message(&message("C_OPS", "Mollie who is on call?"))
        .await;

    assert_eq!(transport.sent_to("C_OPS"), vec![posted(ON_CALL_DISABLED)]);
}

#[tokio::test]
async fn on_call_question_lists_the_roster() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_schedule("S1", "Primary")
            .with_on_call("S1", "U1", "Alice", Some("Platform"))
            .with_contact("U1", "phone_contact_method", "+31 612345678"),
    );
    let oncall = oncall_service(Arc::clone(&provider), calendar_at(utc(2024, 3, 13, 11, 0)));
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        Some(oncall),
        default_settings(),
    );

    dispatcher
        .handle_message(&message("C_OPS", "Mollie who is on call?"))
        .await;

    assert_eq!(
        transport.sent_to("C_OPS"),
        vec![posted(
            "Currently on call:\n*Platform*\n• Alice: +31 612345678\n"
        )]
    );
}

#[tokio::test]
async fn on_call_failure_gets_a_generic_reply() {
    let provider = Arc::new(FakeProvider::new().with_schedule("S1", "Primary"));
    provider.set_failing(true);
    let oncall = oncall_service(Arc::clone(&provider), calendar_at(utc(2024, 3, 13, 11, 0)));
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        Some(oncall),
        default_settings(),
    );

    let sent = dispatcher
        .handle_message(&message("C_OPS", "Mollie piket?"))
        .await;

    assert_eq!(sent, 1);
    let texts = transport.sent_to("C_OPS");
    assert_eq!(texts, vec![posted(ON_CALL_UNAVAILABLE)]);
    assert!(!texts[0].contains("service unavailable"));
}

#[tokio::test]
async fn failed_send_is_not_counted() {
    let transport = Arc::new(RecordingTransport::new().failing_on("C_GONE"));
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    let sent = dispatcher
        .handle_message(&message("C_GONE", "Mollie lunch today"))
        .await;

    assert_eq!(sent, 0);
}

// ── Broadcasts ──────────────────────────────────────────

#[tokio::test]
async fn lunch_broadcast_reaches_every_joined_channel() {
    let transport = Arc::new(RecordingTransport::new().with_joined(&["C_ONE", "C_TWO"]));
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    let sent = dispatcher.broadcast_lunch_today().await.expect("broadcast");

    assert_eq!(sent, 2);
    assert_eq!(transport.listings(), 1);
    assert_eq!(transport.sent_to("C_ONE"), vec![posted("Today we eat: Soup")]);
    assert_eq!(transport.sent_to("C_TWO"), vec![posted("Today we eat: Soup")]);
}

#[tokio::test]
async fn restricted_lunch_broadcast_uses_configured_channels() {
    let transport = Arc::new(RecordingTransport::new().with_joined(&["C_ONE", "C_TWO"]));
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        None,
        restricted(&["C_LUNCH"]),
    );

    let sent = dispatcher.broadcast_lunch_today().await.expect("broadcast");

    assert_eq!(sent, 1);
    assert_eq!(transport.listings(), 0);
    assert_eq!(
        transport.sent_to("C_LUNCH"),
        vec![posted(&flavor::lunch_not_found(&FirstPicker, true))]
    );
}

#[tokio::test]
async fn lunch_broadcast_counts_only_successful_posts() {
    let transport = Arc::new(
        RecordingTransport::new()
            .with_joined(&["C_ONE", "C_GONE"])
            .failing_on("C_GONE"),
    );
    let dispatcher = dispatcher(Arc::clone(&transport), soup_today(), None, default_settings());

    let sent = dispatcher.broadcast_lunch_today().await.expect("broadcast");

    assert_eq!(sent, 1);
    assert_eq!(transport.sent().len(), 1);
}

fn report_provider() -> Arc<FakeProvider> {
    Arc::new(
        FakeProvider::new()
            .with_schedule("S1", "Primary")
            .with_interval(shift(
                "S1",
                "Alice",
                utc(2023, 1, 25, 10, 0),
                utc(2023, 2, 1, 10, 0),
            )),
    )
}

fn reporting(channels: &[&str]) -> DispatcherSettings {
    DispatcherSettings {
        report_channels: channels.iter().map(|id| (*id).to_owned()).collect(),
        ..default_settings()
    }
}

#[tokio::test]
async fn compensation_report_is_posted_to_report_channels() {
    let provider = report_provider();
    let oncall = oncall_service(Arc::clone(&provider), calendar_at(utc(2023, 3, 5, 9, 0)));
    let expected = oncall.compile_report().await.expect("report").render();
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        Some(oncall),
        reporting(&["C_FINANCE"]),
    );

    let sent = dispatcher
        .broadcast_compensation_report()
        .await
        .expect("report broadcast");

    assert_eq!(sent, 1);
    assert_eq!(transport.sent_to("C_FINANCE"), vec![posted(&expected)]);
    assert!(expected.contains("| Alice | 168.00 hours | 1.000 weeks | 100.00"));
}

#[tokio::test]
async fn compensation_report_without_channels_skips_the_provider() {
    let provider = report_provider();
    let oncall = oncall_service(Arc::clone(&provider), calendar_at(utc(2023, 3, 5, 9, 0)));
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        Some(oncall),
        default_settings(),
    );

    let sent = dispatcher
        .broadcast_compensation_report()
        .await
        .expect("report broadcast");

    assert_eq!(sent, 0);
    assert_eq!(provider.schedule_listings(), 0);
}

#[tokio::test]
async fn compensation_report_failure_posts_nothing() {
    let provider = report_provider();
    provider.set_failing(true);
    let oncall = oncall_service(Arc::clone(&provider), calendar_at(utc(2023, 3, 5, 9, 0)));
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        Some(oncall),
        reporting(&["C_FINANCE"]),
    );

    let result = dispatcher.broadcast_compensation_report().await;

    assert!(result.is_err());
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn compensation_report_without_integration_is_a_no_op() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        None,
        reporting(&["C_FINANCE"]),
    );

    let sent = dispatcher
        .broadcast_compensation_report()
        .await
        .expect("report broadcast");

    assert_eq!(sent, 0);
    dispatcher.refresh_roster().await.expect("no-op refresh");
}

// ── Message loop ────────────────────────────────────────

#[tokio::test]
async fn message_loop_answers_in_arrival_order() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = Arc::new(dispatcher(
        Arc::clone(&transport),
        soup_today(),
        None,
        default_settings(),
    ));
    let (tx, rx) = mpsc::channel::<InboundMessage>(8);
    let handle = dispatcher::spawn_message_loop(
        dispatcher,
        rx,
        CancellationToken::new(),
        Duration::from_secs(5),
    );

    for channel in ["C_ONE", "C_TWO", "C_THREE"] {
        tx.send(message(channel, "Mollie lunch today"))
            .await
            .expect("queue message");
    }
    drop(tx);
    handle.await.expect("loop exits when the channel closes");

    let channels: Vec<String> = transport
        .sent()
        .into_iter()
        .map(|(channel, _)| channel)
        .collect();
    assert_eq!(channels, vec!["C_ONE", "C_TWO", "C_THREE"]);
}

#[tokio::test]
async fn message_loop_stops_on_cancel() {
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = Arc::new(dispatcher(
        Arc::clone(&transport),
        Vec::new(),
        None,
        default_settings(),
    ));
    let (_tx, rx) = mpsc::channel::<InboundMessage>(8);
    let cancel = CancellationToken::new();
    let handle =
        dispatcher::spawn_message_loop(dispatcher, rx, cancel.clone(), Duration::from_secs(5));

    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("loop stops promptly")
        .expect("loop task");
}

#[tokio::test]
async fn slow_message_is_abandoned_after_the_handler_timeout() {
    let transport =
        Arc::new(RecordingTransport::new().with_send_delay(Duration::from_millis(500)));
    let dispatcher = Arc::new(dispatcher(
        Arc::clone(&transport),
        soup_today(),
        None,
        default_settings(),
    ));
    let (tx, rx) = mpsc::channel::<InboundMessage>(8);
    let handle = dispatcher::spawn_message_loop(
        dispatcher,
        rx,
        CancellationToken::new(),
        Duration::from_millis(20),
    );

    tx.send(message("C_SLOW", "Mollie lunch today"))
        .await
        .expect("queue message");
    drop(tx);
    handle.await.expect("loop task");

    assert!(transport.sent().is_empty());
}
