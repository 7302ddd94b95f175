//! End-to-end scenarios across the emitter, adapter, policies and proxy.

#[cfg(test)]
mod scenario_tests {
    use crate::commands::{CommandName, CommandValue, PlayerCommand, PlayerCommands};
    use crate::emitter::Handler;
    use crate::events::{proxy_events, EventPayload, PlayerEmitter, PlayerEvent};
    use crate::player::{deferred, DeferredPlayer};
    use crate::policy::{PolicyTable, StatePolicy};
    use crate::proxy::PlayerProxy;
    use crate::state::PlayerState;
    use crate::testing::{drain, MockPlayer};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // ==========================================================================
    // Helpers
    // ==========================================================================

    struct Session {
        player: Arc<MockPlayer>,
        proxy: PlayerProxy<MockPlayer>,
        emitter: PlayerEmitter,
    }

    impl Session {
        fn new(state: PlayerState, policies: PolicyTable) -> Self {
            let player = Arc::new(MockPlayer::new(state));
            let emitter = PlayerEmitter::new();
            let proxy = PlayerProxy::new(
                DeferredPlayer::ready(player.clone()),
                emitter.clone(),
                policies,
                true,
            );
            Self {
                player,
                proxy,
                emitter,
            }
        }

        /// Move the player to `state` and notify through the adapter, the way
        /// a real player would.
        fn transition(&self, state: PlayerState) -> usize {
            self.player.set_state(state);
            let listeners = proxy_events(&self.emitter);
            listeners["onStateChange"].call(&json!(state.code()));
            self.listeners()
        }

        fn listeners(&self) -> usize {
            self.emitter.listener_count(&PlayerEvent::StateChange)
        }
    }

    // ==========================================================================
    // Scenarios
    // ==========================================================================

    /// Pause issued while playing: a PLAYING notification does not confirm,
    /// PAUSED does, and a repeat PAUSED afterwards changes nothing.
    #[tokio::test]
    async fn test_pause_while_playing() {
        let policies = PolicyTable::empty().with(
            CommandName::PauseVideo,
            StatePolicy::new([PlayerState::PAUSED, PlayerState::ENDED]),
        );
        let session = Session::new(PlayerState::PLAYING, policies);
        session
            .player
            .respond_with(CommandName::PauseVideo, CommandValue::Integer(7));

        let call = tokio::spawn({
            let proxy = session.proxy.clone();
            async move { proxy.call(PlayerCommand::PauseVideo {}).await }
        });
        drain().await;
        assert!(!call.is_finished());

        assert_eq!(session.transition(PlayerState::PLAYING), 1);
        drain().await;
        assert!(!call.is_finished());

        session.transition(PlayerState::PAUSED);
        assert_eq!(call.await.unwrap().unwrap(), CommandValue::Integer(7));
        assert_eq!(session.listeners(), 0);

        assert_eq!(session.transition(PlayerState::PAUSED), 0);
    }

    /// Seek with a forced state change and a 3000 ms timeout, with no
    /// notification at all: resolves successfully once the timeout elapses.
    #[tokio::test(start_paused = true)]
    async fn test_seek_without_notification_times_out() {
        let session = Session::new(PlayerState::PLAYING, PolicyTable::standard());
        session
            .player
            .respond_with(CommandName::SeekTo, CommandValue::Text("seeked".into()));

        let started = tokio::time::Instant::now();
        let value = session
            .proxy
            .call(PlayerCommand::SeekTo {
                seconds: 90.0,
                allow_seek_ahead: true,
            })
            .await
            .unwrap();

        assert_eq!(value, CommandValue::Text("seeked".into()));
        assert!(started.elapsed() >= Duration::from_millis(3_000));
        assert_eq!(session.listeners(), 0);

        // Later notifications have nothing to reach.
        assert_eq!(session.transition(PlayerState::PAUSED), 0);
    }

    /// A notification that arrives before the timeout wins, and the timer no
    /// longer matters.
    #[tokio::test(start_paused = true)]
    async fn test_notification_beats_timeout() {
        let session = Session::new(PlayerState::PAUSED, PolicyTable::standard());

        let call = tokio::spawn({
            let proxy = session.proxy.clone();
            async move { proxy.seek_to(1.0, true).await }
        });
        drain().await;

        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(!call.is_finished());

        session.transition(PlayerState::PAUSED);
        call.await.unwrap().unwrap();
        assert_eq!(session.listeners(), 0);
    }

    /// Several governed calls pending at once each keep their own listener,
    /// and one notification settles all of them when their states overlap.
    #[tokio::test]
    async fn test_one_notification_settles_overlapping_calls() {
        let policies = PolicyTable::empty()
            .with(
                CommandName::PauseVideo,
                StatePolicy::new([PlayerState::PAUSED, PlayerState::ENDED]),
            )
            .with(
                CommandName::StopVideo,
                StatePolicy::new([PlayerState::ENDED, PlayerState::CUED]),
            )
            .with(
                CommandName::PlayVideo,
                StatePolicy::new([PlayerState::PLAYING]),
            );
        let session = Session::new(PlayerState::BUFFERING, policies);

        let pause = tokio::spawn({
            let proxy = session.proxy.clone();
            async move { proxy.pause_video().await }
        });
        let stop = tokio::spawn({
            let proxy = session.proxy.clone();
            async move { proxy.stop_video().await }
        });
        let play = tokio::spawn({
            let proxy = session.proxy.clone();
            async move { proxy.play_video().await }
        });
        drain().await;
        assert_eq!(session.listeners(), 3);

        assert_eq!(session.transition(PlayerState::ENDED), 3);
        pause.await.unwrap().unwrap();
        stop.await.unwrap().unwrap();
        drain().await;

        assert!(!play.is_finished());
        assert_eq!(session.listeners(), 1);

        session.transition(PlayerState::PLAYING);
        play.await.unwrap().unwrap();
        assert_eq!(session.listeners(), 0);
    }

    /// Caller listeners registered through `on` keep receiving notifications
    /// alongside the proxy's own confirmation listeners, in order.
    #[tokio::test]
    async fn test_caller_listeners_coexist_with_confirmations() {
        let session = Session::new(PlayerState::PAUSED, PolicyTable::standard());
        let seen = Arc::new(Mutex::new(Vec::new()));

        session.proxy.on(PlayerEvent::StateChange, {
            let seen = seen.clone();
            Handler::new(move |payload: &EventPayload| seen.lock().unwrap().push(payload.clone()))
        });

        let play = tokio::spawn({
            let proxy = session.proxy.clone();
            async move { proxy.play_video().await }
        });
        drain().await;
        assert_eq!(session.listeners(), 2);

        session.transition(PlayerState::BUFFERING);
        session.transition(PlayerState::PLAYING);
        play.await.unwrap().unwrap();

        assert_eq!(session.listeners(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![json!(3), json!(1)]);
    }

    /// Governed calls issued before the player exists run in full once it
    /// resolves.
    #[tokio::test]
    async fn test_governed_call_before_player_ready() {
        let (resolver, handle) = deferred::<MockPlayer>();
        let emitter = PlayerEmitter::new();
        let proxy = PlayerProxy::new(handle, emitter.clone(), PolicyTable::standard(), true);

        let play = tokio::spawn({
            let proxy = proxy.clone();
            async move { proxy.play_video().await }
        });
        drain().await;
        assert_eq!(emitter.listener_count(&PlayerEvent::StateChange), 0);

        let player = Arc::new(MockPlayer::new(PlayerState::CUED));
        resolver.resolve(player.clone());
        drain().await;
        assert_eq!(emitter.listener_count(&PlayerEvent::StateChange), 1);

        player.set_state(PlayerState::PLAYING);
        emitter.trigger(&PlayerEvent::StateChange, &json!(1));
        play.await.unwrap().unwrap();

        assert_eq!(player.calls(), vec![PlayerCommand::PlayVideo {}]);
    }

    /// Each pending confirmation removes exactly its own listener.
    #[tokio::test(start_paused = true)]
    async fn test_listener_removed_exactly_once() {
        let session = Session::new(PlayerState::PLAYING, PolicyTable::standard());
        let hits = Arc::new(AtomicUsize::new(0));

        // A bystander listener that must survive every settlement.
        let bystander = Handler::new({
            let hits = hits.clone();
            move |_: &EventPayload| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });
        session
            .emitter
            .on(PlayerEvent::StateChange, bystander.clone());

        session.proxy.seek_to(3.0, true).await.unwrap();
        session.proxy.seek_to(4.0, true).await.unwrap();
        assert_eq!(session.listeners(), 1);

        session.transition(PlayerState::PAUSED);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(session.emitter.off(&PlayerEvent::StateChange, &bystander));
        assert_eq!(session.listeners(), 0);
    }
}
