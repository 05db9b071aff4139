//! Hardware-free collaborators for the demo binary

use std::f64::consts::TAU;

use audio_cue::SilentSink;
use camera_capture::SyntheticCamera;
use marker_tracking::{RawDetection, ScriptedDetector};
use nalgebra::{Rotation3, Vector3};
use overlay_scene::HeadlessRenderer;
use tracing::info;

use crate::config::PipelineConfig;
use crate::driver::Collaborators;

/// Synthetic camera, scripted detector, headless renderer and silent sink
pub fn demo_collaborators(config: &PipelineConfig) -> Collaborators {
    let script = demo_script(config);
    info!(
        "Demo marker: {} hidden / {} visible frames per loop, {} scripted results",
        config.demo.hidden_frames,
        config.demo.visible_frames,
        script.len()
    );

    Collaborators {
        camera: Box::new(SyntheticCamera::new(config.camera.max_fps)),
        detector: Box::new(ScriptedDetector::new(script).looping()),
        renderer: Box::new(HeadlessRenderer::new()),
        audio: Box::new(SilentSink::new(config.audio.track_length())),
    }
}

/// One loop of detector output: the marker is absent, then held in front
/// of the camera with a little hand shake and the odd dropout
pub fn demo_script(config: &PipelineConfig) -> Vec<Option<RawDetection>> {
    let demo = &config.demo;
    // The basis change is its own inverse
    let to_detector = config.descriptors.convention.to_gl();
    let centre = config.panel.position();

    let mut script = vec![None; demo.hidden_frames];
    for i in 0..demo.visible_frames {
        if demo.dropout_every > 0 && i % demo.dropout_every == demo.dropout_every - 1 {
            script.push(None);
            continue;
        }

        let t = i as f64;
        let shake = Vector3::new(
            3.0 * (TAU * t / 41.0).sin(),
            2.0 * (TAU * t / 67.0).cos(),
            4.0 * (TAU * t / 97.0).sin(),
        );
        let translation = Vector3::new(-centre.x, -centre.y, -demo.marker_distance) + shake;
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), 0.03 * (TAU * t / 53.0).sin());

        script.push(Some(RawDetection::new(
            to_detector * rotation.matrix(),
            to_detector * translation,
        )));
    }
    script
}
