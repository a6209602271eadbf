//! Per-frame action sampling into the PSA raw key stream.

use glam::Quat;

use crate::error::{bail, Result};
use crate::formats::{AnimInfoRecord, AnimKeyRecord, PsaFile};
use crate::scene::PoseProvider;
use crate::skeleton::{flip_handedness, ExportBone};

/// Sample every exportable action of the provider into `psa`.
///
/// Each frame of each action becomes one raw frame: the provider is advanced
/// to the frame, then one key is emitted per posed bone in PSA bone order.
/// The raw key stream is shared across sequences, so `first_raw_frame` is a
/// running offset.
///
/// The provider's active action and current frame are restored on every exit
/// path, including errors.
pub fn sample_actions(
    provider: &mut dyn PoseProvider,
    bones: &[ExportBone],
    fps: f32,
    psa: &mut PsaFile,
) -> Result<()> {
    let saved_action = provider.active_action();
    let saved_frame = provider.current_frame();

    let result = sample_actions_inner(provider, bones, fps, psa);

    if let Err(error) = provider.set_active_action(saved_action.as_deref()) {
        tracing::warn!(%error, "failed to restore active action");
    }
    if let Err(error) = provider.advance_to_frame(saved_frame) {
        tracing::warn!(%error, "failed to restore scene frame");
    }

    result
}

fn sample_actions_inner(
    provider: &mut dyn PoseProvider,
    bones: &[ExportBone],
    fps: f32,
    psa: &mut PsaFile,
) -> Result<()> {
    // frame spacing reported in every key; consumers use anim_rate instead
    let key_time = 1.0 / fps;
    let mut raw_frame_index = 0i32;

    for action in provider.actions() {
        if !action.has_curves {
            tracing::info!(action = %action.name, "skipping action with no curves");
            continue;
        }

        provider.set_active_action(Some(&action.name))?;

        // probe the first frame to learn which export bones this action
        // actually poses
        let probe = provider.advance_to_frame(action.frame_start)?;
        let mut ordered: Vec<(i32, &ExportBone)> = bones
            .iter()
            .filter(|bone| probe.contains_key(&bone.name))
            .filter_map(|bone| psa.use_bone(&bone.name).map(|index| (index, bone)))
            .collect();
        ordered.sort_by_key(|(index, _)| *index);

        let frame_count = action.frame_end - action.frame_start + 1;
        tracing::info!(
            action = %action.name,
            frames = frame_count,
            bones = ordered.len(),
            "sampling action"
        );

        psa.animations.push(AnimInfoRecord {
            name: action.name.clone(),
            group: String::new(),
            total_bones: ordered.len() as i32,
            root_include: 0,
            key_compression_style: 0,
            key_quotum: 0,
            key_prediction: 0.0,
            track_time: frame_count as f32,
            anim_rate: fps,
            start_bone: 0,
            first_raw_frame: raw_frame_index,
            num_raw_frames: frame_count,
        });

        // frames outer, bones inner: each raw frame is a contiguous run of
        // keys in PSA bone order
        for frame in action.frame_start..=action.frame_end {
            let pose = provider.advance_to_frame(frame)?;
            for (_, bone) in &ordered {
                // the snapshot shape may change between frames; a missing
                // bone would leave a hole in the fixed-stride key stream
                let Some(&matrix) = pose.get(&bone.name) else {
                    bail!(
                        "action '{}': bone '{}' has no pose at frame {}",
                        action.name,
                        bone.name,
                        frame
                    );
                };
                // pose relative to the parent bone's pose; the root stays in
                // armature space
                let (position, orientation) = match bone.parent {
                    Some(parent) => {
                        let parent_name = &bones[parent as usize].name;
                        let Some(parent_pose) = pose.get(parent_name) else {
                            bail!(
                                "action '{}': bone '{}' is posed but its parent '{}' is not",
                                action.name,
                                bone.name,
                                parent_name
                            );
                        };
                        let local = parent_pose.inverse() * matrix;
                        let rotation = Quat::from_mat4(&local).normalize();
                        (local.w_axis.truncate(), flip_handedness(rotation))
                    }
                    None => {
                        let rotation = Quat::from_mat4(&matrix).normalize();
                        (matrix.w_axis.truncate(), rotation)
                    }
                };
                psa.raw_keys.push(AnimKeyRecord {
                    position,
                    orientation,
                    time: key_time,
                });
            }
            raw_frame_index += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{bail, ExportError};
    use crate::formats::BoneRecord;
    use crate::scene::{ActionInfo, PoseSnapshot};
    use glam::{Mat4, Vec3};
    use hashbrown::HashMap;

    /// Scripted provider: fixed action list, per-bone poses derived from the
    /// current frame, optional failure on a chosen frame.
    struct ScriptedProvider {
        actions: Vec<ActionInfo>,
        bone_names: Vec<String>,
        active: Option<String>,
        frame: i32,
        fail_on_frame: Option<i32>,
        /// Drop the first bone from snapshots at this frame and later.
        drop_first_from_frame: Option<i32>,
    }

    impl ScriptedProvider {
        fn new(actions: Vec<ActionInfo>, bone_names: &[&str]) -> Self {
            Self {
                actions,
                bone_names: bone_names.iter().map(|s| s.to_string()).collect(),
                active: None,
                frame: 7,
                fail_on_frame: None,
                drop_first_from_frame: None,
            }
        }
    }

    impl PoseProvider for ScriptedProvider {
        fn actions(&self) -> Vec<ActionInfo> {
            self.actions.clone()
        }

        fn active_action(&self) -> Option<String> {
            self.active.clone()
        }

        fn set_active_action(&mut self, name: Option<&str>) -> Result<()> {
            self.active = name.map(str::to_owned);
            Ok(())
        }

        fn current_frame(&self) -> i32 {
            self.frame
        }

        fn advance_to_frame(&mut self, frame: i32) -> Result<PoseSnapshot> {
            if self.fail_on_frame == Some(frame) {
                bail!("scripted failure at frame {}", frame);
            }
            self.frame = frame;
            let mut snapshot = HashMap::new();
            let skip_first = matches!(self.drop_first_from_frame, Some(at) if frame >= at);
            for name in self.bone_names.iter().skip(usize::from(skip_first)) {
                // distinguishable translation per bone and frame
                let x = frame as f32;
                let y = name.len() as f32;
                snapshot.insert(
                    name.clone(),
                    Mat4::from_translation(Vec3::new(x, y, 0.0)),
                );
            }
            Ok(snapshot)
        }
    }

    fn action(name: &str, start: i32, end: i32, has_curves: bool) -> ActionInfo {
        ActionInfo {
            name: name.into(),
            frame_start: start,
            frame_end: end,
            has_curves,
        }
    }

    fn export_bones(names: &[&str]) -> Vec<ExportBone> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| ExportBone {
                name: name.to_string(),
                index: index as u32,
                parent: (index > 0).then(|| index as u32 - 1),
            })
            .collect()
    }

    fn psa_with_bones(names: &[&str]) -> PsaFile {
        let mut psa = PsaFile::new();
        for name in names {
            psa.store_bone(BoneRecord::new(name, -1, 0, Quat::IDENTITY, Vec3::ZERO));
        }
        psa
    }

    #[test]
    fn keys_are_frame_major_in_psa_bone_order() {
        let names = ["root", "tip"];
        let mut provider =
            ScriptedProvider::new(vec![action("walk", 1, 2, true)], &names);
        let bones = export_bones(&names);
        let mut psa = psa_with_bones(&names);

        sample_actions(&mut provider, &bones, 30.0, &mut psa).unwrap();

        assert_eq!(psa.animations.len(), 1);
        let info = &psa.animations.records[0];
        assert_eq!(info.num_raw_frames, 2);
        assert_eq!(info.total_bones, 2);
        assert_eq!(info.first_raw_frame, 0);
        assert!((info.anim_rate - 30.0).abs() < 1e-6);
        assert!((info.track_time - 2.0).abs() < 1e-6);

        // frame 1 keys for both bones, then frame 2 keys
        assert_eq!(psa.raw_keys.len(), 4);
        let frames: Vec<f32> = psa
            .raw_keys
            .records
            .iter()
            .map(|key| key.position.x)
            .collect();
        // "tip" keys are parent-relative, so their x collapses to 0
        assert_eq!(frames, [1.0, 0.0, 2.0, 0.0]);
        assert!((psa.raw_keys.records[0].time - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn raw_frame_offset_accumulates_across_actions() {
        let names = ["root"];
        let mut provider = ScriptedProvider::new(
            vec![
                action("walk", 1, 3, true),
                action("empty", 1, 10, false),
                action("run", 5, 6, true),
            ],
            &names,
        );
        let bones = export_bones(&names);
        let mut psa = psa_with_bones(&names);

        sample_actions(&mut provider, &bones, 24.0, &mut psa).unwrap();

        // the curveless action is skipped entirely
        assert_eq!(psa.animations.len(), 2);
        assert_eq!(psa.animations.records[0].first_raw_frame, 0);
        assert_eq!(psa.animations.records[0].num_raw_frames, 3);
        assert_eq!(psa.animations.records[1].first_raw_frame, 3);
        assert_eq!(psa.animations.records[1].num_raw_frames, 2);
        assert_eq!(psa.raw_keys.len(), 5);
    }

    #[test]
    fn posed_bone_with_unposed_parent_is_an_error() {
        // the provider only ever poses the child; its parent never appears
        // in any snapshot
        let mut provider =
            ScriptedProvider::new(vec![action("walk", 1, 2, true)], &["tip"]);
        let bones = export_bones(&["root", "tip"]);
        let mut psa = psa_with_bones(&["root", "tip"]);

        let err = sample_actions(&mut provider, &bones, 30.0, &mut psa).unwrap_err();
        assert!(err.message().contains("parent 'root'"));
    }

    #[test]
    fn bone_vanishing_mid_action_is_an_error() {
        let names = ["root"];
        let mut provider =
            ScriptedProvider::new(vec![action("walk", 1, 3, true)], &names);
        provider.drop_first_from_frame = Some(2);
        let bones = export_bones(&names);
        let mut psa = psa_with_bones(&names);

        let err = sample_actions(&mut provider, &bones, 30.0, &mut psa).unwrap_err();
        assert!(err.message().contains("no pose at frame 2"));
    }

    #[test]
    fn provider_state_is_restored_after_sampling() {
        let names = ["root"];
        let mut provider =
            ScriptedProvider::new(vec![action("walk", 1, 2, true)], &names);
        provider.active = Some("idle".into());
        provider.frame = 42;
        let bones = export_bones(&names);
        let mut psa = psa_with_bones(&names);

        sample_actions(&mut provider, &bones, 30.0, &mut psa).unwrap();

        assert_eq!(provider.active_action().as_deref(), Some("idle"));
        assert_eq!(provider.current_frame(), 42);
    }

    #[test]
    fn provider_state_is_restored_even_when_sampling_fails() {
        let names = ["root"];
        let mut provider =
            ScriptedProvider::new(vec![action("walk", 1, 5, true)], &names);
        provider.frame = 42;
        provider.fail_on_frame = Some(3);
        let bones = export_bones(&names);
        let mut psa = psa_with_bones(&names);

        let err: ExportError =
            sample_actions(&mut provider, &bones, 30.0, &mut psa).unwrap_err();
        assert!(err.message().contains("frame 3"));
        assert_eq!(provider.active_action(), None);
        assert_eq!(provider.current_frame(), 42);
    }
}
