//! FFmpeg filter graph builders.

use std::fmt::Write as _;
use std::path::Path;

use reel_models::encoding::{CANONICAL_CHANNEL_LAYOUT, CANONICAL_SAMPLE_RATE};
use reel_models::Resolution;

/// Zoom reached at the end of a Ken Burns segment.
pub const KEN_BURNS_MAX_ZOOM: f64 = 1.15;

/// Label of the combined audio stream in [`audio_combine_graph`].
pub const AUDIO_OUT_LABEL: &str = "[aout]";

/// Label of the blended video stream in [`crossfade_graph`].
pub const VIDEO_OUT_LABEL: &str = "[vout]";

/// Audio format normalisation applied to every input track.
pub fn canonical_aformat() -> String {
    format!(
        "aformat=sample_fmts=s16:sample_rates={}:channel_layouts={}",
        CANONICAL_SAMPLE_RATE, CANONICAL_CHANNEL_LAYOUT
    )
}

/// Build the graph that joins tracks with fades and silence gaps.
///
/// Track `i` is trimmed to `durations[i]`. All tracks but the first fade
/// in, all but the last fade out, and `gap` seconds of silence sit between
/// neighbours. Output is labelled [`AUDIO_OUT_LABEL`].
pub fn audio_combine_graph(durations: &[f64], fade: f64, gap: f64) -> String {
    let last = durations.len().saturating_sub(1);
    let mut graph = String::new();
    let mut concat_inputs = String::new();
    let mut segments = 0usize;

    for (i, &duration) in durations.iter().enumerate() {
        let fade_len = fade.min(duration).max(0.0);
        let _ = write!(
            graph,
            "[{i}:a]{},atrim=0:{:.3},asetpts=PTS-STARTPTS",
            canonical_aformat(),
            duration
        );
        if i > 0 && fade_len > 0.0 {
            let _ = write!(graph, ",afade=t=in:st=0:d={:.3}", fade_len);
        }
        if i < last && fade_len > 0.0 {
            let start = (duration - fade).max(0.0);
            let _ = write!(graph, ",afade=t=out:st={:.3}:d={:.3}", start, fade_len);
        }
        let _ = write!(graph, "[a{i}];");
        let _ = write!(concat_inputs, "[a{i}]");
        segments += 1;

        if i < last && gap > 0.0 {
            let _ = write!(
                graph,
                "anullsrc=r={}:cl={},atrim=0:{:.3}[g{i}];",
                CANONICAL_SAMPLE_RATE, CANONICAL_CHANNEL_LAYOUT, gap
            );
            let _ = write!(concat_inputs, "[g{i}]");
            segments += 1;
        }
    }

    let _ = write!(
        graph,
        "{concat_inputs}concat=n={segments}:v=0:a=1{AUDIO_OUT_LABEL}"
    );
    graph
}

/// Number of frames needed to cover `seconds` at `fps`.
pub fn frame_count(seconds: f64, fps: u32) -> u64 {
    (seconds * fps as f64).ceil().max(1.0) as u64
}

/// Per-segment video filter for a prepared still image.
///
/// With `ken_burns` the still is upscaled and slowly zoomed toward the
/// centre over `frames` frames; otherwise it is held as-is.
pub fn still_segment_filter(resolution: Resolution, fps: u32, frames: u64, ken_burns: bool) -> String {
    let (w, h) = (resolution.width, resolution.height);
    if ken_burns {
        let step = (KEN_BURNS_MAX_ZOOM - 1.0) / frames.max(1) as f64;
        format!(
            "scale={sw}:{sh},zoompan=z='min(zoom+{step:.6},{max})':d={frames}:\
             x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={w}x{h}:fps={fps},\
             setsar=1,format=yuv420p",
            sw = w * 2,
            sh = h * 2,
            max = KEN_BURNS_MAX_ZOOM,
        )
    } else {
        format!("scale={w}:{h},setsar=1,format=yuv420p")
    }
}

/// Chain `offsets.len() + 1` video inputs with cross-fades of `duration`.
///
/// `offsets[i]` is where the fade into input `i + 1` starts on the
/// accumulated timeline. Output is labelled [`VIDEO_OUT_LABEL`].
pub fn crossfade_graph(offsets: &[f64], duration: f64) -> String {
    let inputs = offsets.len() + 1;
    let mut graph = String::new();

    for i in 0..inputs {
        let _ = write!(graph, "[{i}:v]settb=AVTB,setpts=PTS-STARTPTS[v{i}];");
    }

    let mut previous = "[v0]".to_string();
    for (i, offset) in offsets.iter().enumerate() {
        let next = i + 1;
        let label = if next == offsets.len() {
            VIDEO_OUT_LABEL.to_string()
        } else {
            format!("[x{next}]")
        };
        let _ = write!(
            graph,
            "{previous}[v{next}]xfade=transition=fade:duration={:.3}:offset={:.3}{label};",
            duration, offset
        );
        previous = label;
    }

    if offsets.is_empty() {
        let _ = write!(graph, "[v0]null{VIDEO_OUT_LABEL}");
    } else {
        graph.pop();
    }
    graph
}

/// Body of an FFmpeg concat demuxer list.
pub fn concat_list<P: AsRef<Path>>(paths: &[P]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.as_ref().to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_graph_fades_and_gaps() {
        let graph = audio_combine_graph(&[10.0, 8.0, 12.0], 1.0, 0.5);

        // First track never fades in, last never fades out.
        let first = graph.split(';').next().unwrap();
        assert!(!first.contains("afade=t=in"));
        assert!(first.contains("afade=t=out:st=9.000:d=1.000"));
        let third = graph.split(';').find(|s| s.starts_with("[2:a]")).unwrap();
        assert!(third.contains("afade=t=in"));
        assert!(!third.contains("afade=t=out"));

        assert_eq!(graph.matches("anullsrc").count(), 2);
        assert!(graph.ends_with("[a0][g0][a1][g1][a2]concat=n=5:v=0:a=1[aout]"));
    }

    #[test]
    fn test_audio_graph_short_track_fade_is_clamped() {
        let graph = audio_combine_graph(&[0.4, 5.0], 1.0, 0.0);
        assert!(graph.contains("afade=t=out:st=0.000:d=0.400"));
        assert!(!graph.contains("anullsrc"));
        assert!(graph.ends_with("[a0][a1]concat=n=2:v=0:a=1[aout]"));
    }

    #[test]
    fn test_crossfade_chain() {
        let graph = crossfade_graph(&[19.0, 39.0], 1.0);
        assert!(graph.contains("[v0][v1]xfade=transition=fade:duration=1.000:offset=19.000[x1]"));
        assert!(graph.contains("[x1][v2]xfade=transition=fade:duration=1.000:offset=39.000[vout]"));
        assert!(!graph.ends_with(';'));
    }

    #[test]
    fn test_crossfade_single_input_passthrough() {
        assert!(crossfade_graph(&[], 1.0).ends_with("[v0]null[vout]"));
    }

    #[test]
    fn test_still_segment_filter() {
        let res = Resolution::new(1280, 720).unwrap();
        assert_eq!(
            still_segment_filter(res, 30, 600, false),
            "scale=1280:720,setsar=1,format=yuv420p"
        );
        let kb = still_segment_filter(res, 30, 600, true);
        assert!(kb.contains("zoompan"));
        assert!(kb.contains("d=600"));
        assert!(kb.contains("s=1280x720"));
    }

    #[test]
    fn test_frame_count_rounds_up() {
        assert_eq!(frame_count(20.0, 30), 600);
        assert_eq!(frame_count(20.01, 30), 601);
        assert_eq!(frame_count(0.0, 30), 1);
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let body = concat_list(&["/tmp/job/seg_000.mp4", "/tmp/it's/seg_001.mp4"]);
        assert_eq!(
            body,
            "file '/tmp/job/seg_000.mp4'\nfile '/tmp/it'\\''s/seg_001.mp4'\n"
        );
    }
}
