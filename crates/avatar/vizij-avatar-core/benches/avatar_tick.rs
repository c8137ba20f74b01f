//! Per-frame cost of the avatar runtime.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vizij_avatar_core::{
    AvatarRuntime, BehaviorState, Config, HeadlessMesh, HeadlessScene, LipsyncFrame,
};

fn busy_runtime() -> AvatarRuntime {
    let mut cfg = Config::default();
    cfg.lipsync.seed = Some(1);
    cfg.blink.seed = Some(1);
    let mut rt = AvatarRuntime::new(cfg).with_standard_clips();
    rt.play_movement("idle").unwrap();
    rt.transition_to(BehaviorState::Talking).unwrap();
    rt.play_movement("greeting").unwrap();
    rt.apply_emotion("happy").unwrap();
    rt.set_lipsync(&LipsyncFrame::new(0.6, 0.1, 0.0, 0.2, 0.3).with_energy(0.5));
    rt
}

fn bench_update(c: &mut Criterion) {
    let mut rt = busy_runtime();
    c.bench_function("update_60hz", |b| {
        b.iter(|| {
            let frame = rt.update(black_box(1.0 / 60.0));
            black_box(frame.pose.writes.len())
        })
    });
}

fn bench_update_and_apply(c: &mut Criterion) {
    let mut rt = busy_runtime();
    let mut scene = HeadlessScene::vrm_upper_body().with_mesh(HeadlessMesh::new(
        "Face",
        &[
            "Fcl_HAP_HAP",
            "Fcl_MTH_A",
            "Fcl_MTH_I",
            "Fcl_MTH_U",
            "Fcl_MTH_E",
            "Fcl_MTH_O",
            "Fcl_EYE_Close",
        ],
    ));
    c.bench_function("update_and_apply", |b| {
        b.iter(|| {
            rt.update(1.0 / 60.0);
            black_box(rt.apply_to_host(&mut scene))
        })
    });
}

fn bench_command_decode(c: &mut Criterion) {
    let mut rt = busy_runtime();
    let msg = r#"{ "type": "lipsync", "A": 0.4, "I": 0.1, "O": 0.2, "energy": 0.45 }"#;
    c.bench_function("lipsync_message", |b| {
        b.iter(|| rt.handle_command_json(black_box(msg)))
    });
}

criterion_group!(
    benches,
    bench_update,
    bench_update_and_apply,
    bench_command_decode
);
criterion_main!(benches);
