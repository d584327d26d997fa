//! Per-frame orchestration: upload, placement, target description, overlays,
//! dispatch and submit.
//!
//! A frame either renders, is skipped because the backend could not be made
//! current or the swap-chain had no image ready, or fails at one stage. A failed frame is cleared to solid red and
//! still submitted so the swap-chain never stalls.

pub(crate) mod place;

use std::fmt;

use crate::backend::{
    GpuBackend, ImagePlane, LutBinding, Overlay, OverlayView, RenderParams, SourceImage,
    SwapchainFrame, TargetFrame,
};
use crate::coords::{Place, Rect2Df};
use crate::display::{DisplayConfig, VerticalAlign};
use crate::error::VoutError;
use crate::format::{Picture, Rotation, Subpicture, VideoFormat};
use crate::params::{LutPlacement, RenderParameterSet};
use crate::session::SessionState;

/// Clear color of a frame that failed to render.
pub(crate) const ERROR_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
/// Clear color of the area around a picture that does not cover the surface.
pub(crate) const BORDER_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

/// Stage at which a frame failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameStage {
    Upload,
    Dispatch,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upload => "upload",
            Self::Dispatch => "dispatch",
        })
    }
}

#[derive(Debug)]
pub enum FrameOutcome {
    /// The backend could not be made current or no swap-chain image was
    /// ready; nothing was drawn or submitted.
    Skipped,
    Rendered,
    Failed { stage: FrameStage, error: VoutError },
}

/// What happened to one frame.
#[derive(Debug)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    pub planes_uploaded: usize,
    pub overlays: usize,
    /// The border around a partial placement was cleared.
    pub cleared: bool,
    /// `None` when no image was acquired.
    pub submit: Option<Result<(), VoutError>>,
}

impl FrameReport {
    pub(crate) fn new(outcome: FrameOutcome) -> Self {
        Self {
            outcome,
            planes_uploaded: 0,
            overlays: 0,
            cleared: false,
            submit: None,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self.outcome, FrameOutcome::Rendered)
    }

    pub fn failed_stage(&self) -> Option<FrameStage> {
        match &self.outcome {
            FrameOutcome::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn submitted(&self) -> bool {
        matches!(self.submit, Some(Ok(())))
    }
}

/// Inputs of one frame.
pub(crate) struct FrameInput<'a> {
    pub picture: &'a Picture,
    pub subpicture: Option<&'a Subpicture>,
    /// Current source crop, aspect and orientation.
    pub source: &'a VideoFormat,
    pub display: &'a DisplayConfig,
}

/// Renders and submits one frame. The session must be current.
pub(crate) fn render_frame<B: GpuBackend>(
    state: &mut SessionState<B>,
    params: &RenderParameterSet,
    input: &FrameInput<'_>,
) -> FrameReport {
    let Some(frame) = state.backend.start_frame() else {
        log::trace!("swap-chain not ready, skipping frame");
        return FrameReport::new(FrameOutcome::Skipped);
    };

    let mut report = FrameReport::new(FrameOutcome::Rendered);
    if let Err((stage, error)) = compose(state, params, input, &frame, &mut report) {
        log::error!("frame failed at {stage}: {error}");
        state.backend.clear_frame(ERROR_COLOR);
        report.outcome = FrameOutcome::Failed { stage, error };
    }

    let submit = state
        .backend
        .submit_frame()
        .map_err(|e| VoutError::submit(e.message));
    if let Err(e) = &submit {
        log::error!("{e}");
    }
    report.submit = Some(submit);
    report
}

fn compose<B: GpuBackend>(
    state: &mut SessionState<B>,
    params: &RenderParameterSet,
    input: &FrameInput<'_>,
    frame: &SwapchainFrame,
    report: &mut FrameReport,
) -> Result<(), (FrameStage, VoutError)> {
    let picture = input.picture;

    // ── upload ────────────────────────────────────────────────────────────
    let plane_count = picture.plane_count().min(4);
    for i in 0..plane_count {
        let data = picture
            .plane_data(i)
            .ok_or_else(|| {
                let error = VoutError::upload(i, "plane buffer does not match the format");
                (FrameStage::Upload, error)
            })?;
        state
            .backend
            .upload_plane(state.planes.slot_mut(i), &data)
            .map_err(|e| (FrameStage::Upload, VoutError::upload(i, e.message)))?;
        report.planes_uploaded += 1;
    }

    // ── placement ─────────────────────────────────────────────────────────
    let place = target_placement(input.source, input.display, frame);

    // ── overlays ──────────────────────────────────────────────────────────
    let has_overlays = match input.subpicture {
        Some(sub) if !sub.regions.is_empty() => {
            upload_overlays(state, sub, place, frame.flipped);
            report.overlays = state.overlays.len();
            true
        }
        _ => false,
    };

    // ── source ────────────────────────────────────────────────────────────
    let (crop, rotation) = source_crop(input.source);
    let chroma = picture.format.chroma;
    let shift = if chroma.is_subsampled() && picture.format.chroma_location.is_known() {
        picture.format.chroma_location.offset()
    } else {
        (0.0, 0.0)
    };

    let mut planes: [Option<ImagePlane<'_, B::Texture>>; 4] = [None, None, None, None];
    for (i, slot) in planes.iter_mut().enumerate().take(plane_count) {
        let (Some(texture), Some(layout)) = (state.planes.get(i), chroma.plane_layout(i)) else {
            continue;
        };
        // Luma and alpha are never shifted.
        let (shift_x, shift_y) = if i == 0 || i == 3 { (0.0, 0.0) } else { shift };
        *slot = Some(ImagePlane {
            texture,
            components: layout.components,
            component_map: layout.component_map,
            shift_x,
            shift_y,
        });
    }

    let placement = params.lut_mode.placement();
    let lut = state.lut.get();
    let image = SourceImage {
        planes,
        color: picture.format.color_space(),
        repr: picture.format.color_repr(),
        crop,
        rotation,
        lut: lut.filter(|_| placement == LutPlacement::Source),
    };

    // ── target ────────────────────────────────────────────────────────────
    let mut color = frame.color;
    let mut repr = frame.repr;
    params.target.apply(&mut color, &mut repr);

    let overlays = if has_overlays {
        state.overlays.view()
    } else {
        OverlayView::empty()
    };

    let target = TargetFrame {
        crop: place.to_crop(),
        color,
        repr,
        overlays,
        lut: lut.filter(|_| placement == LutPlacement::Target),
    };

    if !place.covers(frame.width, frame.height) {
        state.backend.clear_frame(BORDER_COLOR);
        report.cleared = true;
    }

    // ── dispatch ──────────────────────────────────────────────────────────
    let render_params = RenderParams {
        set: params,
        lut: match (placement, lut) {
            (LutPlacement::Params(kind), Some(lut)) => Some(LutBinding { lut, kind }),
            _ => None,
        },
        hook: state.hook.get(),
    };

    let Some(renderer) = state.renderer.as_mut() else {
        return Err((FrameStage::Dispatch, VoutError::dispatch("renderer is gone")));
    };
    state
        .backend
        .render_image(renderer, &image, &target, &render_params)
        .map_err(|e| (FrameStage::Dispatch, VoutError::dispatch(e.message)))
}

/// Placement of the picture on the acquired image, mirrored for surfaces
/// that deliver flipped frames.
fn target_placement(source: &VideoFormat, display: &DisplayConfig, frame: &SwapchainFrame) -> Place {
    let mut cfg = *display;
    cfg.width = frame.width;
    cfg.height = frame.height;
    if frame.flipped {
        cfg.align.vertical = match cfg.align.vertical {
            VerticalAlign::Top => VerticalAlign::Bottom,
            VerticalAlign::Bottom => VerticalAlign::Top,
            VerticalAlign::Center => VerticalAlign::Center,
        };
    }

    let place = place::place_picture(&source.oriented(), &cfg);
    if frame.flipped {
        place.mirrored_vertically(frame.height)
    } else {
        place
    }
}

/// Source crop and rotation after the frame's orientation tag.
fn source_crop(source: &VideoFormat) -> (Rect2Df, Rotation) {
    let mut crop = source.visible_rect();
    let mut rotation = Rotation::R0;
    source.orientation.apply(&mut crop, &mut rotation);
    (crop, rotation)
}

/// Uploads overlay regions in order, stopping at the first failure.
fn upload_overlays<B: GpuBackend>(
    state: &mut SessionState<B>,
    sub: &Subpicture,
    place: Place,
    flipped: bool,
) {
    let ysign = if flipped { -1 } else { 1 };
    state.overlays.begin_frame(sub.regions.len());

    for (i, region) in sub.regions.iter().enumerate() {
        let Some(data) = region.picture.plane_data(0) else {
            log::error!("overlay region {i} has no usable plane, dropping the rest");
            break;
        };
        let Some(slot) = state.overlays.next_slot() else {
            break;
        };
        if let Err(e) = state.backend.upload_plane(slot, &data) {
            log::error!("failed uploading overlay region {i}: {e}");
            break;
        }

        let (w, h) = region.visible_size();
        let (w, h) = (w as i32, h as i32);
        let rect = Rect2Df::new(
            (place.x + region.x) as f32,
            (place.y + region.y * ysign) as f32,
            (place.x + region.x + w) as f32,
            (place.y + (region.y + h) * ysign) as f32,
        );
        state.overlays.push(Overlay {
            rect,
            color: region.picture.format.color_space(),
            repr: region.picture.format.color_repr(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{Call, MockBackend, MockConfig, MockHandle, MockSurface};
    use crate::config::VoutConfig;
    use crate::coords::Rect2D;
    use crate::format::{ChromaLocation, Orientation, PixelFormat, SubpictureRegion};
    use crate::params::{DitherMode, LutMode};
    use crate::session::Session;
    use proptest::prelude::*;

    fn session(config: MockConfig) -> (Session<MockBackend>, MockHandle) {
        let (surface, handle) = MockSurface::new(config);
        let session = Session::open(Some(surface), &()).unwrap();
        handle.clear_calls();
        (session, handle)
    }

    fn minimal_params() -> RenderParameterSet {
        let mut cfg = VoutConfig::default();
        cfg.scaling.sigmoid = false;
        cfg.peak_detect.period = 0.0;
        cfg.dither.method = DitherMode::Disabled;
        RenderParameterSet::from_config(&cfg)
    }

    fn filled(width: u32, height: u32) -> DisplayConfig {
        DisplayConfig {
            width,
            height,
            is_display_filled: true,
            ..DisplayConfig::default()
        }
    }

    fn run(
        session: &Session<MockBackend>,
        params: &RenderParameterSet,
        picture: &Picture,
        subpicture: Option<&Subpicture>,
    ) -> FrameReport {
        let display = filled(640, 480);
        let mut cur = session.acquire().unwrap();
        render_frame(
            &mut cur,
            params,
            &FrameInput {
                picture,
                subpicture,
                source: &picture.format,
                display: &display,
            },
        )
    }

    fn region(x: i32, y: i32, w: u32, h: u32) -> SubpictureRegion {
        SubpictureRegion {
            x,
            y,
            picture: Picture::new(VideoFormat::new(PixelFormat::Rgba, w, h)),
        }
    }

    #[test]
    fn rgba_full_surface_frame() {
        let (session, handle) = session(MockConfig::default());
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 480));
        let report = run(&session, &minimal_params(), &picture, None);

        assert!(report.is_rendered());
        assert!(report.submitted());
        assert_eq!(report.planes_uploaded, 1);
        assert!(!report.cleared);

        assert_eq!(handle.count(|c| matches!(c, Call::Upload { .. })), 1);
        assert_eq!(handle.count(|c| matches!(c, Call::Clear(_))), 0);
        assert_eq!(handle.count(|c| *c == Call::Submit), 1);
        let renders = handle.renders();
        assert_eq!(renders.len(), 1);
        assert!(renders[0].active_groups.is_empty());
        assert_eq!(renders[0].target_crop, Rect2Df::new(0.0, 0.0, 640.0, 480.0));
    }

    #[test]
    fn upload_failure_clears_red_and_still_submits() {
        let (session, handle) = session(MockConfig {
            fail_upload_at: Some(1),
            fail_submit: true,
            ..Default::default()
        });
        let picture = Picture::new(VideoFormat::new(PixelFormat::I420, 640, 480));
        let report = run(&session, &minimal_params(), &picture, None);

        assert_eq!(report.failed_stage(), Some(FrameStage::Upload));
        assert!(matches!(
            report.outcome,
            FrameOutcome::Failed { error: VoutError::Upload { plane: 1, .. }, .. }
        ));
        assert_eq!(report.planes_uploaded, 1);
        assert!(matches!(report.submit, Some(Err(VoutError::Submit { .. }))));

        let calls = handle.calls();
        assert!(calls.contains(&Call::Clear(ERROR_COLOR)));
        assert_eq!(handle.count(|c| matches!(c, Call::Render(_))), 0);
        assert_eq!(calls.iter().filter(|c| **c == Call::Submit).count(), 1);
    }

    #[test]
    fn dispatch_failure_is_contained_to_the_frame() {
        let (session, handle) = session(MockConfig {
            fail_render: true,
            ..Default::default()
        });
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 480));
        let params = minimal_params();
        let report = run(&session, &params, &picture, None);
        assert_eq!(report.failed_stage(), Some(FrameStage::Dispatch));
        assert!(report.submitted());

        handle.configure(|c| c.fail_render = false);
        assert!(run(&session, &params, &picture, None).is_rendered());
    }

    #[test]
    fn not_ready_skips_without_submit() {
        let (session, handle) = session(MockConfig {
            not_ready: true,
            ..Default::default()
        });
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 480));
        let report = run(&session, &minimal_params(), &picture, None);
        assert!(matches!(report.outcome, FrameOutcome::Skipped));
        assert!(report.submit.is_none());
        assert_eq!(handle.count(|c| matches!(c, Call::Upload { .. })), 0);
    }

    #[test]
    fn partial_placement_clears_border() {
        let (session, handle) = session(MockConfig::default());
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 360));
        let report = run(&session, &minimal_params(), &picture, None);
        assert!(report.cleared);
        assert!(handle.calls().contains(&Call::Clear(BORDER_COLOR)));
    }

    #[test]
    fn textures_are_reused_between_frames() {
        let (session, handle) = session(MockConfig::default());
        let picture = Picture::new(VideoFormat::new(PixelFormat::I420, 640, 480));
        let params = minimal_params();
        run(&session, &params, &picture, None);
        run(&session, &params, &picture, None);
        let created = handle.count(|c| matches!(c, Call::Upload { created: true, .. }));
        let reused = handle.count(|c| matches!(c, Call::Upload { created: false, .. }));
        assert_eq!((created, reused), (3, 3));
    }

    #[test]
    fn chroma_shift_only_on_subsampled_chroma() {
        let (session, handle) = session(MockConfig::default());
        let params = minimal_params();

        let mut fmt = VideoFormat::new(PixelFormat::Yuva420, 640, 480);
        fmt.chroma_location = ChromaLocation::TopLeft;
        run(&session, &params, &Picture::new(fmt.clone()), None);

        fmt.chroma = PixelFormat::I444;
        run(&session, &params, &Picture::new(fmt.clone()), None);

        fmt.chroma = PixelFormat::I420;
        fmt.chroma_location = ChromaLocation::Unknown;
        run(&session, &params, &Picture::new(fmt), None);

        let renders = handle.renders();
        assert_eq!(
            renders[0].shifts,
            vec![(0.0, 0.0), (-0.5, -0.5), (-0.5, -0.5), (0.0, 0.0)]
        );
        assert!(renders[1].shifts.iter().all(|s| *s == (0.0, 0.0)));
        assert!(renders[2].shifts.iter().all(|s| *s == (0.0, 0.0)));
    }

    #[test]
    fn overlays_follow_surface_flip() {
        for flipped in [false, true] {
            let (session, handle) = session(MockConfig {
                flipped,
                ..Default::default()
            });
            let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 360));
            let sub = Subpicture {
                regions: vec![region(10, 20, 100, 30)],
            };
            let report = run(&session, &minimal_params(), &picture, Some(&sub));
            assert_eq!(report.overlays, 1);

            let snap = &handle.renders()[0];
            let place_y = snap.target_crop.y0;
            let r = snap.overlays[0];
            if flipped {
                assert_eq!(place_y, 480.0 - 60.0);
                assert_eq!(r.y0, place_y - 20.0);
                assert_eq!(r.y1, place_y - 50.0);
            } else {
                assert_eq!(place_y, 60.0);
                assert_eq!(r.y0, place_y + 20.0);
                assert_eq!(r.y1, place_y + 50.0);
            }
            assert_eq!((r.x0, r.x1), (10.0, 110.0));
        }
    }

    #[test]
    fn overlay_failure_keeps_uploaded_prefix() {
        let (session, handle) = session(MockConfig {
            // Plane upload is call 0; regions are calls 1, 2, 3.
            fail_upload_at: Some(2),
            ..Default::default()
        });
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 480));
        let sub = Subpicture {
            regions: vec![region(0, 0, 8, 8), region(0, 10, 8, 8), region(0, 20, 8, 8)],
        };
        let report = run(&session, &minimal_params(), &picture, Some(&sub));
        assert!(report.is_rendered());
        assert_eq!(report.overlays, 1);
        assert_eq!(handle.renders()[0].overlays.len(), 1);
    }

    #[test]
    fn overlay_storage_grows_only() {
        let (session, _handle) = session(MockConfig::default());
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 480));
        let params = minimal_params();
        let mut capacities = Vec::new();
        for n in [3, 1, 5] {
            let sub = Subpicture {
                regions: (0..n).map(|i| region(0, i * 10, 8, 8)).collect(),
            };
            let report = run(&session, &params, &picture, Some(&sub));
            assert_eq!(report.overlays, n as usize);
            capacities.push(session.acquire().unwrap().overlays.capacity());
        }
        assert_eq!(capacities, vec![3, 3, 5]);
    }

    #[test]
    fn lut_mode_selects_attachment() {
        let (session, handle) = session(MockConfig::default());
        {
            let mut cur = session.acquire().unwrap();
            let dir = std::env::temp_dir().join(format!("prism-vout-comp-{}", std::process::id()));
            std::fs::create_dir_all(&dir).unwrap();
            let path = dir.join("attach.cube");
            std::fs::write(&path, "table").unwrap();
            let state = &mut *cur;
            let backend = &mut state.backend;
            state
                .lut
                .load(path.to_str().unwrap(), |b| backend.parse_lut(b))
                .unwrap();
        }
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 480));

        for mode in [LutMode::Decoding, LutMode::Encoding, LutMode::Normalized, LutMode::Disabled] {
            let mut params = minimal_params();
            params.lut_mode = mode;
            run(&session, &params, &picture, None);
        }

        let r = handle.renders();
        assert!(r[0].source_lut.is_some() && r[0].target_lut.is_none());
        assert!(r[1].target_lut.is_some() && r[1].source_lut.is_none());
        assert_eq!(r[2].params_lut.as_ref().map(|(_, k)| *k), Some(crate::params::LutType::Normalized));
        assert!(r[3].source_lut.is_none() && r[3].target_lut.is_none() && r[3].params_lut.is_none());
    }

    #[test]
    fn target_overrides_reach_the_renderer() {
        let (session, handle) = session(MockConfig::default());
        let mut params = minimal_params();
        params.target.dither_depth = Some(6);
        let picture = Picture::new(VideoFormat::new(PixelFormat::Rgba, 640, 480));
        run(&session, &params, &picture, None);
        let snap = &handle.renders()[0];
        assert_eq!(snap.target_repr.bits.sample_depth, 6);
        assert_eq!(snap.target_repr.bits.color_depth, 6);
    }

    fn frame(flipped: bool) -> SwapchainFrame {
        SwapchainFrame {
            width: 640,
            height: 480,
            flipped,
            color: crate::format::ColorSpace::SRGB,
            repr: crate::format::ColorRepr::RGB8,
        }
    }

    #[test]
    fn flipped_letterbox_with_odd_remainder_mirrors_rows() {
        // 981x94 fills 640x61 and leaves 419 rows, split 209 above.
        let source = VideoFormat::new(PixelFormat::I420, 981, 94);
        let display = filled(640, 480);
        let upright = target_placement(&source, &display, &frame(false));
        let flipped = target_placement(&source, &display, &frame(true));

        assert_eq!(upright.to_rect().normalized(), Rect2D::new(0, 209, 640, 270));
        assert_eq!(flipped.to_rect().normalized(), Rect2D::new(0, 210, 640, 271));
    }

    proptest! {
        // Surface flip only touches the target placement and orientation
        // only touches the source crop/rotation, for all sixteen pairs.
        #[test]
        fn flip_and_orientation_are_independent(
            idx in 0usize..8,
            flipped in any::<bool>(),
            w in 16u32..2048,
            h in 16u32..2048,
        ) {
            let orientation = Orientation::ALL[idx];
            let source = VideoFormat::new(PixelFormat::I420, w, h).with_orientation(orientation);
            let display = filled(640, 480);

            let (crop, rotation) = source_crop(&source);
            let place = target_placement(&source, &display, &frame(flipped));
            let upright = target_placement(&source, &display, &frame(false));

            let normal = VideoFormat::new(PixelFormat::I420, w, h);
            let (normal_crop, _) = source_crop(&normal);
            let mut expected_crop = normal_crop;
            let mut expected_rot = Rotation::R0;
            orientation.apply(&mut expected_crop, &mut expected_rot);
            prop_assert_eq!(crop, expected_crop);
            prop_assert_eq!(rotation, expected_rot);

            if flipped {
                prop_assert_eq!(place, upright.mirrored_vertically(480));
            } else {
                prop_assert_eq!(place, upright);
            }
            let covered = place.to_rect().normalized();
            let base = upright.to_rect().normalized();
            prop_assert_eq!((covered.x0, covered.x1), (base.x0, base.x1));
            if flipped {
                prop_assert_eq!((covered.y0, covered.y1), (480 - base.y1, 480 - base.y0));
            } else {
                prop_assert_eq!(covered, base);
            }

            prop_assert!(upright.width <= 640 && upright.height <= 480);
            prop_assert!(upright.width == 640 || upright.height == 480);
        }
    }
}
