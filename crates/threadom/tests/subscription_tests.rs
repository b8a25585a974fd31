//! Tests for long-lived channel subscriptions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use threadom::{
    Arguments, Channel, ConsumeOptions, Executor, SubscriptionId, Task, TaskError, create_channel,
};
use threadom_core::MainLoop;

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("threadom=debug")
        .with_test_writer()
        .try_init();
}

fn setup() -> (MainLoop, Executor) {
    init_tracing();
    let main_loop = MainLoop::new();
    let executor = Executor::new(main_loop.clone());
    (main_loop, executor)
}

/// Consumer options that push each first positional argument into a list.
fn collecting<T>() -> (ConsumeOptions, Arc<Mutex<Vec<T>>>)
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let options = ConsumeOptions::new()
        .consumer(move |args: Arguments| {
            sink.lock().push(args.parse::<T>(0)?);
            Ok(())
        })
        .poll_interval(Duration::from_millis(2));
    (options, received)
}

#[test]
fn test_independent_channels_end_to_end() {
    let (main_loop, executor) = setup();

    let mut lists = Vec::new();
    for value in 1..=3 {
        let channel = create_channel();
        let (options, received) = collecting::<i64>();
        executor.consume(&channel, options).unwrap();
        lists.push(received);

        executor
            .run(Task::new(move || {
                channel.send(value);
                Ok::<_, TaskError>(())
            }))
            .unwrap();
    }

    assert!(main_loop.run_until(
        || lists.iter().all(|list| !list.lock().is_empty()),
        TIMEOUT
    ));
    main_loop.run_for(Duration::from_millis(20));

    for (expected, list) in (1..=3).zip(&lists) {
        assert_eq!(*list.lock(), vec![expected]);
    }
    assert_eq!(executor.subscription_count(), 3);
}

#[test]
fn test_messages_delivered_in_order() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    for i in 0..5 {
        channel.send(i);
    }

    let (options, received) = collecting::<i32>();
    executor.consume(&channel, options).unwrap();

    assert!(main_loop.run_until(|| received.lock().len() == 5, TIMEOUT));
    assert_eq!(*received.lock(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_pause_keeps_buffered_messages() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    let (options, received) = collecting::<String>();
    let id = executor.consume(&channel, options).unwrap();

    executor.pause(id);
    channel.send("while paused");
    main_loop.run_for(Duration::from_millis(30));

    assert!(received.lock().is_empty());
    let info = executor.subscription(id).unwrap();
    assert!(!info.active);
    assert_eq!(info.buffered, 1);

    executor.resume(id);
    assert!(main_loop.run_until(|| !received.lock().is_empty(), TIMEOUT));
    assert_eq!(*received.lock(), vec!["while paused".to_string()]);
    assert!(executor.subscription(id).unwrap().active);
}

#[test]
fn test_quick_pause_resume_keeps_single_delivery() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    let (options, received) = collecting::<i32>();
    let id = executor.consume(&channel, options).unwrap();

    for _ in 0..3 {
        executor.pause(id);
        executor.resume(id);
    }
    channel.send(7);

    assert!(main_loop.run_until(|| !received.lock().is_empty(), TIMEOUT));
    main_loop.run_for(Duration::from_millis(20));
    assert_eq!(*received.lock(), vec![7]);
}

#[test]
fn test_stop_discards_future_delivery() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    let (options, received) = collecting::<i32>();
    let id = executor.consume(&channel, options).unwrap();

    executor.stop(id);
    channel.send(1);
    main_loop.run_for(Duration::from_millis(30));

    assert!(received.lock().is_empty());
    assert!(executor.subscription(id).is_none());
    assert!(executor.info(id).is_empty());
    // The message stays with the channel's owner.
    assert_eq!(channel.len(), 1);
}

#[test]
fn test_wildcard_operations() {
    let (main_loop, executor) = setup();
    let channels: Vec<Channel> = (0..3).map(|_| create_channel()).collect();
    let ids: Vec<SubscriptionId> = channels
        .iter()
        .map(|channel| executor.consume(channel, ConsumeOptions::new()).unwrap())
        .collect();
    assert!(ids.iter().all(|id| !id.is_all()));

    executor.pause(SubscriptionId::ALL);
    let infos = executor.info(SubscriptionId::ALL);
    assert_eq!(infos.len(), 3);
    assert!(infos.iter().all(|info| !info.active));

    executor.resume(SubscriptionId::ALL);
    assert!(executor.info(SubscriptionId::ALL).iter().all(|info| info.active));

    executor.stop(SubscriptionId::ALL);
    assert_eq!(executor.subscription_count(), 0);
    assert!(executor.info(SubscriptionId::ALL).is_empty());

    // Pending ticks for the removed records are harmless.
    main_loop.run_for(Duration::from_millis(20));
}

#[test]
fn test_unknown_ids_are_ignored() {
    let (_main_loop, executor) = setup();
    let channel = create_channel();
    executor.consume(&channel, ConsumeOptions::new()).unwrap();

    let unknown = SubscriptionId::from_raw(999);
    executor.pause(unknown);
    executor.resume(unknown);
    executor.stop(unknown);

    assert!(executor.info(unknown).is_empty());
    assert_eq!(executor.subscription_count(), 1);
    assert!(executor.info(SubscriptionId::ALL)[0].active);
}

#[test]
fn test_consume_without_channel_is_ignored() {
    let (_main_loop, executor) = setup();
    assert!(executor.consume(None::<&Channel>, ConsumeOptions::new()).is_none());
    assert_eq!(executor.subscription_count(), 0);
}

#[test]
fn test_unpacked_subscription_results() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    executor
        .consume(
            &channel,
            ConsumeOptions::new().unpack_result(true).consumer(move |args| {
                sink.lock().push(args);
                Ok(())
            }),
        )
        .unwrap();

    channel.send(json!({ "done": 3, "total": 10 }));
    channel.send(json!(["copy", "zip"]));

    assert!(main_loop.run_until(|| received.lock().len() == 2, TIMEOUT));
    let received = received.lock();
    assert_eq!(received[0].parse_kwarg::<u32>("done").unwrap(), 3);
    assert_eq!(received[0].parse_kwarg::<u32>("total").unwrap(), 10);
    assert_eq!(received[1].positional(), &[json!("copy"), json!("zip")]);
}

#[test]
fn test_error_messages_go_to_exception_handler() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    let handled = Arc::new(Mutex::new(Vec::new()));
    let sink = handled.clone();
    let (options, received) = collecting::<i32>();

    executor
        .consume(
            &channel,
            options.exception_handler(move |error| {
                sink.lock().push(error.to_string());
                Ok(())
            }),
        )
        .unwrap();

    channel.send_error(TaskError::msg("upload failed"));
    channel.send(5);

    assert!(main_loop.run_until(|| !received.lock().is_empty(), TIMEOUT));
    assert_eq!(*handled.lock(), vec!["upload failed".to_string()]);
    assert_eq!(*received.lock(), vec![5]);
}

#[test]
fn test_escaped_error_keeps_subscription_alive() {
    let (main_loop, executor) = setup();
    let escaped = Arc::new(Mutex::new(Vec::new()));
    let sink = escaped.clone();
    main_loop.set_error_hook(move |error| sink.lock().push(error.to_string()));

    let channel = create_channel();
    let received = Arc::new(Mutex::new(Vec::new()));
    let values = received.clone();
    let id = executor
        .consume(
            &channel,
            ConsumeOptions::new().consumer(move |args| {
                let value: i32 = args.parse(0)?;
                if value < 0 {
                    return Err(TaskError::msg(format!("negative value {value}")));
                }
                values.lock().push(value);
                Ok(())
            }),
        )
        .unwrap();

    channel.send(-1);
    channel.send(1);

    assert!(main_loop.run_until(|| !received.lock().is_empty(), TIMEOUT));
    assert_eq!(*escaped.lock(), vec!["negative value -1".to_string()]);
    assert_eq!(*received.lock(), vec![1]);
    assert!(executor.subscription(id).unwrap().active);
}

#[test]
fn test_consumer_can_pause_its_own_subscription() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    let own_id = Arc::new(Mutex::new(None::<SubscriptionId>));
    let received = Arc::new(AtomicUsize::new(0));

    let weak = executor.downgrade();
    let id_slot = own_id.clone();
    let counter = received.clone();
    let id = executor
        .consume(
            &channel,
            ConsumeOptions::new().consumer(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let (Some(executor), Some(id)) = (weak.upgrade(), *id_slot.lock()) {
                    executor.pause(id);
                }
                Ok(())
            }),
        )
        .unwrap();
    *own_id.lock() = Some(id);

    for i in 0..3 {
        channel.send(i);
    }

    assert!(main_loop.run_until(|| received.load(Ordering::SeqCst) == 1, TIMEOUT));
    main_loop.run_for(Duration::from_millis(30));
    assert_eq!(received.load(Ordering::SeqCst), 1);
    assert_eq!(channel.len(), 2);

    executor.resume(id);
    assert!(main_loop.run_until(|| received.load(Ordering::SeqCst) == 2, TIMEOUT));
    assert_eq!(channel.len(), 1);
}

#[test]
fn test_panicking_consumer_spares_sibling_subscription() {
    let (main_loop, executor) = setup();
    let escaped = Arc::new(Mutex::new(Vec::new()));
    let sink = escaped.clone();
    main_loop.set_error_hook(move |error| sink.lock().push(error.is_panic()));

    let failing = create_channel();
    let failing_id = executor
        .consume(
            &failing,
            ConsumeOptions::new()
                .consumer(|_| panic!("consumer exploded"))
                .poll_interval(Duration::from_millis(2)),
        )
        .unwrap();

    let healthy = create_channel();
    let (options, received) = collecting::<i32>();
    let healthy_id = executor.consume(&healthy, options).unwrap();

    // Both first ticks land in the same batch.
    failing.send(0);
    failing.send(1);
    healthy.send(10);
    healthy.send(11);

    assert!(main_loop.run_until(|| received.lock().len() == 2, TIMEOUT));
    assert!(main_loop.run_until(|| escaped.lock().len() == 2, TIMEOUT));
    assert_eq!(*received.lock(), vec![10, 11]);
    assert!(escaped.lock().iter().all(|&is_panic| is_panic));

    // Both poll loops survive and still honor pause and resume.
    executor.pause(SubscriptionId::ALL);
    main_loop.run_for(Duration::from_millis(20));
    healthy.send(12);
    executor.resume(healthy_id);
    assert!(main_loop.run_until(|| received.lock().len() == 3, TIMEOUT));
    assert!(executor.subscription(healthy_id).unwrap().active);
    assert!(!executor.subscription(failing_id).unwrap().active);
}

#[test]
fn test_huge_poll_interval_is_accepted() {
    let (main_loop, executor) = setup();
    let channel = create_channel();
    let (options, received) = collecting::<i32>();
    let id = executor
        .consume(&channel, options.poll_interval(Duration::MAX))
        .unwrap();

    channel.send(1);
    channel.send(2);

    // The first tick runs at once; the next one is parked far in the future.
    assert!(main_loop.run_until(|| !received.lock().is_empty(), TIMEOUT));
    main_loop.run_for(Duration::from_millis(20));
    assert_eq!(*received.lock(), vec![1]);
    assert_eq!(executor.subscription(id).unwrap().buffered, 1);
}
