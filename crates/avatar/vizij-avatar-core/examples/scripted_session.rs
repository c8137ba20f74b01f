use vizij_avatar_core::{AnimationClip, AvatarRuntime, Config, HeadlessMesh, HeadlessScene};
use vizij_avatar_fixtures::{clips, scripts};

fn main() -> anyhow::Result<()> {
    let mut cfg = Config::default();
    cfg.lipsync.seed = Some(7);
    let mut rt = AvatarRuntime::new(cfg).with_standard_clips();

    // Extra clip from the shared fixtures
    let nod = AnimationClip::from_json(&clips::json("nod")?)?;
    rt.register_clip(nod, None)?;

    let mut scene = HeadlessScene::vrm_upper_body().with_mesh(HeadlessMesh::new(
        "Face",
        &["Fcl_HAP_HAP", "Fcl_MTH_A", "Fcl_EYE_Close"],
    ));

    // Replay the "conversation" messages, one frame apart
    let script: serde_json::Value = scripts::load("conversation")?;
    let steps = script["steps"].as_array().cloned().unwrap_or_default();
    for step in steps {
        if let Some(msg) = step.get("send") {
            if let Err(e) = rt.handle_command_json(&msg.to_string()) {
                println!("rejected: {e}");
            }
        }
        let frame = rt.update(1.0 / 30.0);
        println!(
            "frame {:>3}: {} bone writes, {} morphs, events {}",
            frame.epoch,
            frame.pose.writes.len(),
            frame.morphs.len(),
            serde_json::to_string(&frame.events)?
        );
        let report = rt.apply_to_host(&mut scene);
        if !report.missing_bones.is_empty() {
            println!("missing bones: {:?}", report.missing_bones);
        }
    }

    rt.play_movement("nod")?;
    for _ in 0..30 {
        rt.update(1.0 / 30.0);
    }
    println!(
        "active: {}",
        serde_json::to_string_pretty(&rt.active_animations())?
    );
    println!(
        "blend shapes: {}",
        serde_json::to_string_pretty(&rt.active_blend_shapes())?
    );
    Ok(())
}
