//! Integration tests for the screen stream and input paths through a live supervisor

mod common;

use common::builders::{device_frame, SupervisorFixture};
use common::{test_timeout, wait_for};
use fzlink::input::{map_key, DispatchOutcome, InputDispatcher};
use fzlink::screen::{
    screen_callback, screen_channel, DropPolicy, ScreenDecoder, ScreenshotExporter, FULL_BLOCK,
    LOWER_HALF, UPPER_HALF,
};
use fzlink::types::{InputKey, InputType, ScreenshotResolution};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_pushed_frame_reaches_receiver() {
    let (sink, screens) = screen_channel(2, DropPolicy::DropOldest);
    let (supervisor, _opener, connector) = SupervisorFixture::new()
        .screen_callback(screen_callback(ScreenDecoder::default(), sink))
        .build();
    supervisor.connect().unwrap();

    let device = connector.last_device().unwrap();
    assert!(device.push_frame(device_frame(&[(0, 0), (1, 1), (2, 0), (2, 1)])));

    let screen = screens.recv_timeout(test_timeout()).unwrap();
    assert_eq!(screen.grid.columns(), 128);
    assert_eq!(screen.grid.rows(), 32);
    assert_eq!(&screen.grid.row(0).unwrap()[..4], &[UPPER_HALF, LOWER_HALF, FULL_BLOCK, ' ']);
    assert_eq!(screen.image.dimensions(), (128, 64));

    supervisor.shutdown();
}

#[test]
fn test_stream_resumes_after_reconnect() {
    let (sink, screens) = screen_channel(2, DropPolicy::DropOldest);
    let (supervisor, opener, connector) = SupervisorFixture::new()
        .screen_callback(screen_callback(ScreenDecoder::default(), sink))
        .build();
    let handle = supervisor.start().unwrap();

    opener.last_line().unwrap().unplug();
    assert!(wait_for(test_timeout(), || connector.connect_count() == 2 && supervisor.is_connected()));

    let device = connector.last_device().unwrap();
    assert!(device.push_frame(device_frame(&[(5, 5)])));
    let screen = screens.recv_timeout(test_timeout()).unwrap();
    assert_eq!(screen.grid.cell(5, 2), Some(UPPER_HALF));

    supervisor.shutdown();
    handle.join().unwrap();
}

#[test]
fn test_input_waits_for_connection() {
    let (supervisor, _opener, connector) = SupervisorFixture::new().build();
    let input = InputDispatcher::new(supervisor.clone(), Duration::from_millis(10));

    assert_eq!(input.dispatch(InputKey::Ok, false), DispatchOutcome::Unavailable);

    supervisor.connect().unwrap();
    assert_eq!(input.dispatch(InputKey::Ok, false), DispatchOutcome::Sent);
    assert_eq!(
        connector.last_device().unwrap().events(),
        vec![
            (InputKey::Ok, InputType::Press),
            (InputKey::Ok, InputType::Short),
            (InputKey::Ok, InputType::Release),
        ]
    );

    supervisor.shutdown();
    std::thread::sleep(Duration::from_millis(15));
    assert_eq!(input.dispatch(InputKey::Ok, false), DispatchOutcome::Unavailable);
}

#[test]
fn test_cooldown_across_threads() {
    let (supervisor, _opener, connector) = SupervisorFixture::new().build();
    supervisor.connect().unwrap();
    let input = Arc::new(InputDispatcher::new(supervisor.clone(), Duration::from_secs(60)));

    let callers: Vec<_> = (0..4)
        .map(|_| {
            let input = Arc::clone(&input);
            std::thread::spawn(move || input.dispatch(InputKey::Up, true))
        })
        .collect();
    let outcomes: Vec<_> = callers.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| **o == DispatchOutcome::Sent).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| **o == DispatchOutcome::Dropped).count(), 3);
    let events = connector.last_device().unwrap().events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[1], (InputKey::Up, InputType::Long));

    supervisor.shutdown();
}

#[test]
fn test_mapped_keys_drive_dispatcher() {
    let (supervisor, _opener, connector) = SupervisorFixture::new().build();
    supervisor.connect().unwrap();
    let input = InputDispatcher::new(supervisor.clone(), Duration::ZERO);

    for name in ["w", "D", "esc"] {
        let (key, is_long) = map_key(name).unwrap();
        assert_eq!(input.dispatch(key, is_long), DispatchOutcome::Sent);
    }

    let qualifiers: Vec<_> = connector
        .last_device()
        .unwrap()
        .events()
        .into_iter()
        .filter(|(_, kind)| matches!(kind, InputType::Short | InputType::Long))
        .collect();
    assert_eq!(
        qualifiers,
        vec![
            (InputKey::Up, InputType::Short),
            (InputKey::Right, InputType::Long),
            (InputKey::Back, InputType::Short),
        ]
    );

    supervisor.shutdown();
}

#[test]
fn test_screenshot_of_pushed_frame() {
    let dir = tempfile::tempdir().unwrap();
    let (sink, screens) = screen_channel(1, DropPolicy::DropOldest);
    let (supervisor, _opener, connector) = SupervisorFixture::new()
        .screen_callback(screen_callback(ScreenDecoder::default(), sink))
        .build();
    supervisor.connect().unwrap();

    connector.last_device().unwrap().push_frame(device_frame(&[(0, 0)]));
    let screen = screens.recv_timeout(test_timeout()).unwrap();

    let exporter = ScreenshotExporter::new(dir.path(), ScreenshotResolution { width: 256, height: 128 });
    let path = exporter.save(&screen.image).unwrap();
    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (256, 128));
    assert_eq!(saved.get_pixel(1, 1).0, [0, 0, 0]);
    assert_eq!(saved.get_pixel(2, 0).0, [0xFF, 0x8C, 0x00]);

    supervisor.shutdown();
}
