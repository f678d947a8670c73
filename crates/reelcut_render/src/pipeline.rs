use reelcut_core::allocate::allocate;
use reelcut_core::classify::classify_all;
use reelcut_core::error::CoreError;
use reelcut_core::layout::JobPaths;
use reelcut_core::manifest::read_manifest;
use reelcut_core::settings::ReelSettings;
use reelcut_core::types::{ClipArtifact, FinalReel, MergedTrack, MusicTrack, Timeline};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::concat::{ConcatRequest, Concatenator, FfmpegConcatenator};
use crate::error::Result;
use crate::mux::{FfmpegMuxer, MuxRequest, Muxer};
use crate::probe::{FfprobeProber, Prober};
use crate::segment::{FfmpegTranscoder, SegmentRequest, Transcoder};

/// The external tools a reel is built with.
pub struct Collaborators {
    pub prober: Box<dyn Prober>,
    pub transcoder: Box<dyn Transcoder>,
    pub concatenator: Box<dyn Concatenator>,
    pub muxer: Box<dyn Muxer>,
}

impl Collaborators {
    /// ffprobe and ffmpeg from PATH.
    pub fn ffmpeg(settings: &ReelSettings) -> Self {
        Self {
            prober: Box::new(FfprobeProber),
            transcoder: Box::new(FfmpegTranscoder::new(settings.output.clone())),
            concatenator: Box::new(FfmpegConcatenator::new(settings.output.clone())),
            muxer: Box::new(FfmpegMuxer::new(
                settings.output.clone(),
                settings.mix.clone(),
            )),
        }
    }
}

/// Turns one job directory into a finished reel.
///
/// Stages run strictly in order and the first failure aborts the job.
/// A cancelled build stops before the next probe or stage and kills the
/// running ffmpeg. Rendered segments and the merged track stay on disk.
pub struct ReelPipeline {
    tools: Collaborators,
}

impl ReelPipeline {
    pub fn new(tools: Collaborators) -> Self {
        Self { tools }
    }

    pub fn with_ffmpeg(settings: &ReelSettings) -> Self {
        Self::new(Collaborators::ffmpeg(settings))
    }

    /// Read, probe and allocate without rendering anything.
    pub fn plan(&self, paths: &JobPaths) -> Result<Timeline> {
        self.allocate_timeline(paths, &CancelToken::new())
    }

    fn allocate_timeline(&self, paths: &JobPaths, cancel: &CancelToken) -> Result<Timeline> {
        let names = read_manifest(paths.manifest())?;
        if names.is_empty() {
            return Err(CoreError::EmptyInput.into());
        }

        let target = self.tools.prober.probe_duration(&paths.voice())?;
        if target <= 0.0 {
            return Err(CoreError::ZeroAudioDuration(target).into());
        }
        info!(job = %paths.id, assets = names.len(), target, "planning reel");

        let mut items = classify_all(&names);
        for item in items.iter_mut().filter(|i| i.kind.is_fixed()) {
            cancel.check()?;
            let duration = self.tools.prober.probe_duration(&paths.asset(&item.name))?;
            item.probed_duration = Some(duration);
        }

        let timeline = allocate(items, target)?;
        info!(
            job = %paths.id,
            entries = timeline.len(),
            total = timeline.total_duration(),
            "timeline allocated"
        );
        Ok(timeline)
    }

    /// Run every stage and return the finished reel.
    pub fn build(
        &self,
        paths: &JobPaths,
        music: &MusicTrack,
        cancel: &CancelToken,
    ) -> Result<FinalReel> {
        cancel.check()?;
        let timeline = self.allocate_timeline(paths, cancel)?;

        std::fs::create_dir_all(paths.clips_dir())?;
        timeline.save_to_file(paths.timeline_dump())?;

        let clips = self.render_segments(paths, &timeline, cancel)?;
        cancel.check()?;
        let merged = self.sequence(paths, &clips, cancel)?;
        cancel.check()?;

        match music {
            MusicTrack::Absent => info!(job = %paths.id, "no background music requested"),
            MusicTrack::Failed { reason } => warn!(
                job = %paths.id,
                %reason,
                "background music failed, continuing without it"
            ),
            MusicTrack::Ready(path) => {
                info!(job = %paths.id, music = %path.display(), "mixing background music")
            }
        }

        let request = MuxRequest {
            video: merged.path,
            voice: paths.voice(),
            music: music.path().map(|p| p.to_path_buf()),
            target: timeline.target,
            video_duration: merged.duration,
            output: paths.output.clone(),
        };
        let path = self.tools.muxer.mux(&request, cancel)?;
        info!(job = %paths.id, output = %path.display(), "reel finished");

        Ok(FinalReel {
            path,
            duration: timeline.target,
        })
    }

    /// Render each timeline entry, in order, to `clip_NNN.mp4`.
    pub fn render_segments(
        &self,
        paths: &JobPaths,
        timeline: &Timeline,
        cancel: &CancelToken,
    ) -> Result<Vec<ClipArtifact>> {
        let mut clips = Vec::with_capacity(timeline.len());
        for (index, item) in timeline.iter().enumerate() {
            cancel.check()?;
            let request = SegmentRequest {
                source: paths.asset(&item.name),
                kind: item.kind,
                duration: item.duration(),
                output: paths.segment(index + 1),
            };
            debug!(
                job = %paths.id,
                name = %item.name,
                kind = %item.kind,
                duration = request.duration,
                "rendering segment"
            );
            self.tools.transcoder.render(&request, cancel)?;
            clips.push(ClipArtifact {
                item: item.clone(),
                path: request.output,
                duration: request.duration,
            });
        }
        info!(job = %paths.id, segments = clips.len(), "segments rendered");
        Ok(clips)
    }

    fn sequence(
        &self,
        paths: &JobPaths,
        clips: &[ClipArtifact],
        cancel: &CancelToken,
    ) -> Result<MergedTrack> {
        let request = ConcatRequest {
            segments: clips.iter().map(|c| c.path.clone()).collect(),
            list_path: paths.concat_list(),
            output: paths.merged(),
        };
        let path = self.tools.concatenator.concat(&request, cancel)?;
        let merged = MergedTrack::from_clips(path, clips);
        info!(job = %paths.id, duration = merged.duration, "segments merged");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use reelcut_core::manifest::manifest_line;
    use reelcut_core::types::JobId;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct FakeProber {
        durations: HashMap<String, f64>,
        log: Log,
    }

    impl Prober for FakeProber {
        fn probe_duration(&self, path: &Path) -> Result<f64> {
            let name = file_name(path);
            self.log.lock().unwrap().push(format!("probe {name}"));
            Ok(self.durations.get(&name).copied().unwrap_or(0.0))
        }
    }

    struct FakeTranscoder {
        fail_on: Option<String>,
        cancel_on: Option<String>,
        log: Log,
    }

    impl Transcoder for FakeTranscoder {
        fn render(&self, request: &SegmentRequest, cancel: &CancelToken) -> Result<()> {
            let name = file_name(&request.source);
            self.log.lock().unwrap().push(format!(
                "render {name} {} {} -> {}",
                request.kind,
                request.duration,
                file_name(&request.output)
            ));
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(RenderError::TranscodeFailure {
                    step: "render",
                    stderr: "Invalid data found when processing input".into(),
                });
            }
            if self.cancel_on.as_deref() == Some(name.as_str()) {
                cancel.cancel();
            }
            Ok(())
        }
    }

    struct FakeConcatenator {
        log: Log,
    }

    impl Concatenator for FakeConcatenator {
        fn concat(&self, request: &ConcatRequest, _cancel: &CancelToken) -> Result<PathBuf> {
            let names: Vec<String> = request.segments.iter().map(|p| file_name(p)).collect();
            self.log.lock().unwrap().push(format!("concat {}", names.join(",")));
            Ok(request.output.clone())
        }
    }

    struct FakeMuxer {
        log: Log,
        requests: Arc<Mutex<Vec<MuxRequest>>>,
    }

    impl Muxer for FakeMuxer {
        fn mux(&self, request: &MuxRequest, _cancel: &CancelToken) -> Result<PathBuf> {
            self.log.lock().unwrap().push(format!("mux {}", request.target));
            self.requests.lock().unwrap().push(request.clone());
            Ok(request.output.clone())
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    struct Harness {
        _dir: tempfile::TempDir,
        paths: JobPaths,
        log: Log,
        mux_requests: Arc<Mutex<Vec<MuxRequest>>>,
        pipeline: ReelPipeline,
    }

    fn harness(manifest: &[&str], durations: &[(&str, f64)], fail_on: Option<&str>) -> Harness {
        harness_with(manifest, durations, fail_on, None)
    }

    fn harness_with(
        manifest: &[&str],
        durations: &[(&str, f64)],
        fail_on: Option<&str>,
        cancel_on: Option<&str>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let paths = JobPaths::new(dir.path().join("uploads"), dir.path().join("reels"), JobId::new());
        std::fs::create_dir_all(&paths.job_dir).unwrap();
        let body: String = manifest.iter().map(|name| manifest_line(name)).collect();
        std::fs::write(paths.manifest(), body).unwrap();

        let log: Log = Arc::default();
        let mux_requests = Arc::default();
        let tools = Collaborators {
            prober: Box::new(FakeProber {
                durations: durations.iter().map(|(n, d)| (n.to_string(), *d)).collect(),
                log: log.clone(),
            }),
            transcoder: Box::new(FakeTranscoder {
                fail_on: fail_on.map(str::to_string),
                cancel_on: cancel_on.map(str::to_string),
                log: log.clone(),
            }),
            concatenator: Box::new(FakeConcatenator { log: log.clone() }),
            muxer: Box::new(FakeMuxer {
                log: log.clone(),
                requests: Arc::clone(&mux_requests),
            }),
        };

        Harness {
            _dir: dir,
            paths,
            log,
            mux_requests,
            pipeline: ReelPipeline::new(tools),
        }
    }

    fn build_absent(h: &Harness) -> Result<FinalReel> {
        h.pipeline.build(&h.paths, &MusicTrack::Absent, &CancelToken::new())
    }

    fn calls(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn builds_reel_in_timeline_order() {
        let h = harness(
            &["a.png", "b.mp4"],
            &[("audio.mp3", 8.0), ("b.mp4", 5.0)],
            None,
        );
        let reel = build_absent(&h).unwrap();

        assert_eq!(reel.path, h.paths.output);
        assert_eq!(reel.duration, 8.0);
        assert_eq!(
            calls(&h.log),
            vec![
                "probe audio.mp3",
                "probe b.mp4",
                "render a.png still 3 -> clip_001.mp4",
                "render b.mp4 clip 5 -> clip_002.mp4",
                "concat clip_001.mp4,clip_002.mp4",
                "mux 8",
            ]
        );

        let requests = h.mux_requests.lock().unwrap();
        assert_eq!(requests[0].video, h.paths.merged());
        assert_eq!(requests[0].voice, h.paths.voice());
        assert!(requests[0].music.is_none());
        assert_eq!(requests[0].video_duration, 8.0);
    }

    #[test]
    fn writes_timeline_dump_for_diagnosis() {
        let h = harness(&["x.gif"], &[("audio.mp3", 1.0), ("x.gif", 2.0)], None);
        build_absent(&h).unwrap();

        let dump = std::fs::read_to_string(h.paths.timeline_dump()).unwrap();
        let timeline: Timeline = serde_json::from_str(&dump).unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.items[0].duration(), 1.0);
    }

    #[test]
    fn empty_manifest_fails_before_probing() {
        let h = harness(&[], &[("audio.mp3", 8.0)], None);
        let err = build_absent(&h).unwrap_err();
        assert_eq!(err.kind(), "EmptyInputError");
        assert!(calls(&h.log).is_empty());
    }

    #[test]
    fn silent_voice_track_fails_before_rendering() {
        let h = harness(&["a.png"], &[], None);
        let err = build_absent(&h).unwrap_err();
        assert_eq!(err.kind(), "ZeroAudioDurationError");
        assert_eq!(calls(&h.log), vec!["probe audio.mp3"]);
    }

    #[test]
    fn empty_timeline_never_reaches_transcoder() {
        let h = harness(&["a.gif", "b.gif"], &[("audio.mp3", 5.0)], None);
        let err = build_absent(&h).unwrap_err();
        assert_eq!(err.kind(), "NoClipsProducedError");
        assert!(calls(&h.log).iter().all(|c| c.starts_with("probe")));
    }

    #[test]
    fn stills_are_never_probed() {
        let h = harness(&["a.png", "b.jpg"], &[("audio.mp3", 4.0)], None);
        let timeline = h.pipeline.plan(&h.paths).unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(calls(&h.log), vec!["probe audio.mp3"]);
    }

    #[test]
    fn failed_render_aborts_remaining_stages() {
        let h = harness(
            &["a.png", "b.mp4", "c.png"],
            &[("audio.mp3", 9.0), ("b.mp4", 3.0)],
            Some("b.mp4"),
        );
        let err = build_absent(&h).unwrap_err();
        assert_eq!(err.kind(), "TranscodeFailure");

        let log = calls(&h.log);
        assert_eq!(log.iter().filter(|c| c.starts_with("render")).count(), 2);
        assert!(!log.iter().any(|c| c.starts_with("concat") || c.starts_with("mux")));
    }

    #[test]
    fn ready_music_is_passed_to_muxer() {
        let h = harness(&["a.png"], &[("audio.mp3", 10.0)], None);
        let music = MusicTrack::Ready(h.paths.music());
        h.pipeline.build(&h.paths, &music, &CancelToken::new()).unwrap();
        assert_eq!(
            h.mux_requests.lock().unwrap()[0].music,
            Some(h.paths.music())
        );
    }

    #[test]
    fn failed_music_proceeds_without_it() {
        let h = harness(&["a.png"], &[("audio.mp3", 10.0)], None);
        let music = MusicTrack::Failed {
            reason: "rate limited".into(),
        };
        let reel = h.pipeline.build(&h.paths, &music, &CancelToken::new()).unwrap();
        assert_eq!(reel.duration, 10.0);
        assert!(h.mux_requests.lock().unwrap()[0].music.is_none());
    }

    #[test]
    fn cancelled_build_does_nothing() {
        let h = harness(&["a.png"], &[("audio.mp3", 4.0)], None);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = h.pipeline.build(&h.paths, &MusicTrack::Absent, &cancel).unwrap_err();
        assert_eq!(err.kind(), "Cancelled");
        assert!(calls(&h.log).is_empty());
        assert!(!h.paths.clips_dir().exists());
    }

    #[test]
    fn cancellation_mid_render_stops_later_stages() {
        let h = harness_with(
            &["a.png", "b.png", "c.png"],
            &[("audio.mp3", 9.0)],
            None,
            Some("a.png"),
        );
        let cancel = CancelToken::new();
        let err = h.pipeline.build(&h.paths, &MusicTrack::Absent, &cancel).unwrap_err();
        assert!(matches!(err, RenderError::Cancelled));

        let log = calls(&h.log);
        assert_eq!(log.iter().filter(|c| c.starts_with("render")).count(), 1);
        assert!(!log.iter().any(|c| c.starts_with("concat") || c.starts_with("mux")));
    }
}
