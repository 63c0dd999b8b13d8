mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use pmoplayer::{ActionDetails, AudioEvent, MediaAction, PlayerSession};
use url::Url;

async fn start(fixture: &Fixture, opener: Arc<FakeOpener>, candidates: Vec<Url>) -> PlayerSession {
    PlayerSession::start(
        fixture.store(),
        opener,
        candidates,
        Duration::from_millis(1500),
    )
    .await
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_starts_on_local_engine() {
    let fixture = Fixture::new();
    let session = start(&fixture, Arc::new(FakeOpener::default()), Vec::new()).await;
    settle().await;

    assert!(session.store().target().is_some_and(|target| target.is_local()));
    assert_eq!(session.selected_target(), None);
    assert_eq!(fixture.engine.subscriber_count(), 1);

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_attaches_to_playing_cast_target() {
    let fixture = Fixture::new();
    let opener = Arc::new(FakeOpener::default());
    let idle = url("http://kitchen.local:8080/");
    let busy = url("http://living-room.local:8080/");
    opener.playing.lock().unwrap().push(busy.clone());
    let session = start(&fixture, opener.clone(), vec![idle.clone(), busy.clone()]).await;
    settle().await;

    let found = session.select_playing_target().await;
    assert_eq!(found.as_ref(), Some(&busy));
    assert_eq!(session.selected_target(), Some(busy.clone()));

    settle().await;
    let target = session.store().target().expect("no target attached");
    assert_eq!(target.url(), Some(&busy));
    assert!(session.store().is_playing());
    assert_eq!(fixture.engine.subscriber_count(), 0);

    // Discovery probes are released, the attached adapter is a fresh one.
    let opened = opener.opened();
    assert_eq!(opened.len(), 3);
    assert!(opened[..2].iter().all(|remote| remote.is_disposed()));
    assert!(!opened[2].is_disposed());

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_keeps_local_playback_when_already_playing() {
    let fixture = Fixture::new();
    let opener = Arc::new(FakeOpener::default());
    let busy = url("http://living-room.local:8080/");
    opener.playing.lock().unwrap().push(busy.clone());
    let session = start(&fixture, opener.clone(), vec![busy]).await;
    settle().await;
    session.store().play_now(tracks(&["a"])).await.unwrap();

    assert_eq!(session.select_playing_target().await, None);
    assert_eq!(session.selected_target(), None);

    settle().await;
    assert!(session.store().target().is_some_and(|target| target.is_local()));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_playing_target_times_out() {
    let fixture = Fixture::new();
    let opener = Arc::new(FakeOpener::default());
    let session = start(
        &fixture,
        opener.clone(),
        vec![url("http://kitchen.local:8080/")],
    )
    .await;
    settle().await;

    assert_eq!(session.select_playing_target().await, None);
    assert!(opener.opened().iter().all(|remote| remote.is_disposed()));

    session.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_media_session_actions_drive_the_store() {
    let fixture = Fixture::new();
    let session = start(&fixture, Arc::new(FakeOpener::default()), Vec::new()).await;
    settle().await;
    session
        .store()
        .play_track_list(tracks(&["a", "b"]), Some(0))
        .await
        .unwrap();
    session
        .store()
        .handle_engine_event(AudioEvent::TimeUpdate(50.0))
        .await
        .unwrap();
    fixture.engine.clear_calls();

    fixture.media.trigger(MediaAction::Pause, ActionDetails::default());
    settle().await;
    assert!(!session.store().is_playing());

    fixture.media.trigger(MediaAction::SeekForward, ActionDetails::default());
    settle().await;
    fixture.media.trigger(
        MediaAction::SeekBackward,
        ActionDetails {
            seek_offset: Some(80.0),
            ..Default::default()
        },
    );
    settle().await;
    fixture.media.trigger(MediaAction::NextTrack, ActionDetails::default());
    settle().await;

    assert_eq!(
        fixture.engine.calls()[..3],
        ["pause".to_string(), "seek 60".to_string(), "seek 0".to_string()]
    );
    assert_eq!(session.store().snapshot().track_id(), Some("b"));

    session.shutdown().await;
}
