use vizij_avatar_core::{
    library, ActiveEntry, AnimationLayerPlayer, AvatarError, AvatarEvent, NaturalPose,
    PlayerConfig, PoseChannel, PriorityLayer,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn player() -> AnimationLayerPlayer {
    let mut p = AnimationLayerPlayer::new(PlayerConfig::default());
    for clip in library::standard_clips() {
        let name = clip.name.clone();
        p.register(&name, clip, None).expect("built-in clip registers");
    }
    p
}

fn names(list: &[ActiveEntry]) -> Vec<&str> {
    list.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn play_on_empty_player_lists_exactly_one_entry() {
    let mut p = player();
    let id = p.play("idle", None, None).unwrap();
    let list = p.active_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].playback, id);
    assert_eq!(list[0].layer, PriorityLayer::Base);
    assert!(!list[0].fading);
    approx(list[0].weight, 0.0, 1e-6);
}

#[test]
fn preempted_playback_is_removed_after_grace_window() {
    let mut p = player();
    p.play("idle", None, None).unwrap();
    p.play("talking", None, None).unwrap();

    p.tick(0.1);
    let list = p.active_list();
    assert_eq!(names(&list), vec!["talking", "idle"]);
    assert!(list[1].fading);
    assert!(list[1].weight < 0.5);

    p.tick(0.15);
    assert_eq!(names(&p.active_list()), vec!["talking"]);
    assert_eq!(p.fading_count(), 0);
    let removed = p
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, AvatarEvent::PlaybackRemoved { clip, .. } if clip == "idle"))
        .count();
    assert_eq!(removed, 1);
}

#[test]
fn gesture_lists_first_while_idle_fades_beneath_it() {
    let mut p = player();
    p.play("idle", None, None).unwrap();
    p.tick(0.5);
    p.play("greeting", None, None).unwrap();

    let list = p.active_list();
    assert_eq!(names(&list), vec!["greeting", "idle"]);
    assert_eq!(list[0].layer, PriorityLayer::Gesture);
    assert!(list[1].fading);
    assert_eq!(p.top_clip(), Some("greeting"));
    assert_eq!(p.occupant(PriorityLayer::Base), None);
}

#[test]
fn replay_during_fade_out_gets_a_fresh_playback() {
    let mut p = player();
    let first = p.play("listening", None, None).unwrap();
    p.tick(1.0);
    assert!(p.stop("listening").unwrap());
    p.tick(0.05);
    let second = p.play("listening", None, None).unwrap();
    assert_ne!(first, second);

    // The fading copy is hidden while the clip is live again.
    let list = p.active_list();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].playback, second);
    assert_eq!(p.fading_count(), 1);

    // The old playback still goes away on its own schedule.
    p.tick(0.2);
    assert_eq!(p.fading_count(), 0);
    assert!(p.is_playing("listening"));
    assert_eq!(p.active_list()[0].playback, second);
}

#[test]
fn stop_of_idle_clip_is_ok_false_and_unknown_clip_is_error() {
    let mut p = player();
    assert_eq!(p.stop("idle"), Ok(false));
    assert_eq!(
        p.stop("moonwalk"),
        Err(AvatarError::UnknownAnimation("moonwalk".into()))
    );
    assert!(p.active_list().is_empty());
}

#[test]
fn layer_override_changes_arbitration() {
    let mut p = player();
    p.play("greeting", None, None).unwrap();
    // Forced onto EMERGENCY, a movement clip displaces the gesture.
    p.play("excitement", Some(PriorityLayer::Emergency), Some(0.0))
        .unwrap();
    assert_eq!(p.occupant(PriorityLayer::Emergency), Some("excitement"));
    assert!(!p.is_playing("greeting"));
    let top = &p.active_list()[0];
    assert_eq!(top.name, "excitement");
    approx(top.weight, 1.0, 1e-6);
}

#[test]
fn full_weight_pose_matches_sampled_clip() {
    let mut p = player();
    p.play("greeting", None, Some(0.0)).unwrap();
    p.tick(0.5);
    let pose = p.sample_pose(&NaturalPose::empty());
    let arm = pose
        .get(library::R_UPPER_ARM, PoseChannel::RotationX)
        .expect("greeting animates the right arm");
    approx(arm, -0.5, 1e-5);
}

#[test]
fn every_clip_plays_alone_on_its_resolved_layer() {
    for clip in library::standard_clips() {
        let mut p = player();
        let layer = p.default_layer(&clip.name).unwrap();
        let id = p.play(&clip.name, None, None).unwrap();
        let list = p.active_list();
        assert_eq!(list.len(), 1, "{}", clip.name);
        assert_eq!(list[0].playback, id);
        assert_eq!(list[0].name, clip.name);
        assert_eq!(list[0].layer, layer, "{}", clip.name);
        assert_eq!(p.occupant(layer), Some(clip.name.as_str()));
    }
}

#[test]
fn equal_or_higher_layer_preempts_and_removes_after_grace_window() {
    for low in PriorityLayer::ALL {
        for high in PriorityLayer::ALL.into_iter().filter(|h| *h >= low) {
            let mut p = player();
            p.play("listening", Some(low), Some(0.0)).unwrap();
            p.tick(0.5);
            p.play("stretching", Some(high), Some(0.0)).unwrap();
            assert!(!p.is_playing("listening"), "{low:?} -> {high:?}");

            p.tick(0.1);
            let list = p.active_list();
            assert_eq!(names(&list), vec!["stretching", "listening"], "{low:?} -> {high:?}");
            assert!(list[1].fading);
            approx(list[1].weight, 0.5, 1e-3);

            p.tick(0.15);
            assert_eq!(names(&p.active_list()), vec!["stretching"], "{low:?} -> {high:?}");
            assert_eq!(p.fading_count(), 0);
        }
    }
}

#[test]
fn lower_layer_leaves_higher_occupants_alone() {
    for (i, high) in PriorityLayer::ALL.iter().enumerate() {
        for low in &PriorityLayer::ALL[..i] {
            let mut p = player();
            p.play("stretching", Some(*high), Some(0.0)).unwrap();
            p.play("listening", Some(*low), Some(0.0)).unwrap();
            p.tick(0.3);
            let list = p.active_list();
            assert_eq!(names(&list), vec!["stretching", "listening"], "{high:?} / {low:?}");
            assert!(list.iter().all(|e| !e.fading));
        }
    }
}

#[test]
fn fades_and_loops_keep_running_after_days_of_uptime() {
    let mut p = player();
    p.tick(600_000.0);
    p.play("talking", None, Some(0.0)).unwrap();
    let pose = p.sample_pose(&NaturalPose::empty());
    approx(pose.get(library::HEAD, PoseChannel::RotationZ).unwrap(), 0.0, 1e-6);
    p.tick(0.25);
    let pose = p.sample_pose(&NaturalPose::empty());
    approx(pose.get(library::HEAD, PoseChannel::RotationZ).unwrap(), 0.0025, 1e-5);

    assert!(p.stop("talking").unwrap());
    for _ in 0..600 {
        p.tick(1.0 / 60.0);
    }
    assert_eq!(p.fading_count(), 0);
    assert!(p.active_list().is_empty());
}
