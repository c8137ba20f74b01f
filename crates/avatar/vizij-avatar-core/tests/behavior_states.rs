use vizij_avatar_core::{AvatarError, AvatarEvent, AvatarRuntime, BehaviorState, Config};

fn runtime() -> AvatarRuntime {
    let mut cfg = Config::default();
    cfg.blink.enabled = false;
    cfg.lipsync.seed = Some(3);
    AvatarRuntime::new(cfg).with_standard_clips()
}

#[test]
fn idle_cannot_jump_straight_to_emotional() {
    let mut rt = runtime();
    let err = rt.transition_to(BehaviorState::Emotional).unwrap_err();
    assert_eq!(
        err,
        AvatarError::IllegalTransition {
            from: BehaviorState::Idle,
            to: BehaviorState::Emotional
        }
    );
    assert_eq!(rt.current_state(), BehaviorState::Idle);
    assert!(rt.active_animations().is_empty());
}

#[test]
fn idle_to_talking_starts_the_talking_clip() {
    let mut rt = runtime();
    rt.transition_to(BehaviorState::Talking).unwrap();
    assert_eq!(rt.current_state(), BehaviorState::Talking);
    assert_eq!(rt.previous_state(), Some(BehaviorState::Idle));
    assert!(rt.player().is_playing("talking"));
    assert_eq!(
        rt.allowed_transitions(),
        vec![
            BehaviorState::Idle,
            BehaviorState::Emotional,
            BehaviorState::Gesturing
        ]
    );

    let frame = rt.update(0.016);
    assert!(frame.events.contains(&AvatarEvent::StateChanged {
        from: BehaviorState::Idle,
        to: BehaviorState::Talking
    }));
}

#[test]
fn talking_then_emotional_then_revert() {
    let mut rt = runtime();
    rt.transition_to(BehaviorState::Talking).unwrap();
    rt.transition_to(BehaviorState::Emotional).unwrap();
    assert!(rt.player().is_playing("excitement"));

    assert!(rt.revert_state().unwrap());
    assert_eq!(rt.current_state(), BehaviorState::Talking);
    assert_eq!(rt.previous_state(), Some(BehaviorState::Emotional));
    assert!(rt.player().is_playing("talking"));
}

#[test]
fn status_messages_drive_the_state_machine() {
    let mut rt = runtime();
    rt.handle_command_json(r#"{ "type": "status", "status": "Listening" }"#)
        .unwrap();
    assert_eq!(rt.current_state(), BehaviorState::Listening);

    let err = rt
        .handle_command_json(r#"{ "type": "status", "status": "waiting" }"#)
        .unwrap_err();
    assert_eq!(err, AvatarError::UnknownState("waiting".into()));
    assert_eq!(rt.current_state(), BehaviorState::Listening);

    let frame = rt.update(0.016);
    let rejected: Vec<&AvatarEvent> = frame
        .events
        .iter()
        .filter(|e| matches!(e, AvatarEvent::CommandRejected { .. }))
        .collect();
    assert_eq!(rejected.len(), 1);
}

#[test]
fn every_state_is_reachable_from_idle_within_two_steps() {
    for target in BehaviorState::ALL {
        if target == BehaviorState::Idle {
            continue;
        }
        let mut rt = runtime();
        if rt.transition_to(target).is_err() {
            rt.transition_to(BehaviorState::Talking).unwrap();
            rt.transition_to(target).unwrap();
        }
        assert_eq!(rt.current_state(), target);
        assert!(rt.player().is_playing(target.clip()), "{target}");
    }
}
