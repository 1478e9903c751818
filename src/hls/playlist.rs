use std::fmt::Write;

use crate::{
    dash::{
        mpd::{Mpd, Representation},
        segment::AvailableSegment,
        template::Template,
    },
    DashlsError, DashlsResult,
};

const AUDIO_GROUP_ID: &str = "audio";
const SUBTITLE_GROUP_ID: &str = "subtitles";

/// The representations chosen for a channel, bucketed the way the master
/// playlist renders them.
#[derive(Debug, Clone, Default)]
pub struct RenditionSelection {
    pub video: Vec<Representation>,
    pub audio: Vec<Representation>,
    pub text: Vec<Representation>,
}

/// Render the HLS master playlist for a selection of representations.
pub fn master_playlist(selection: &RenditionSelection) -> String {
    let mut out = String::new();
    out.push_str("#EXTM3U\n");
    out.push_str("#EXT-X-VERSION:7\n");

    for rep in &selection.audio {
        let _ = writeln!(
            out,
            "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"{AUDIO_GROUP_ID}\",NAME=\"{id}\",DEFAULT=YES,AUTOSELECT=YES,LANGUAGE=\"{id}\",URI=\"audio/{id}/playlist.m3u8\"",
            id = rep.id
        );
    }
    for rep in &selection.text {
        let _ = writeln!(
            out,
            "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"{SUBTITLE_GROUP_ID}\",NAME=\"{id}\",DEFAULT=NO,AUTOSELECT=YES,LANGUAGE=\"{id}\",URI=\"text/{id}/playlist.m3u8\"",
            id = rep.id
        );
    }

    for rep in &selection.video {
        let _ = write!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={},CODECS=\"{}\"",
            rep.bandwidth, rep.codecs
        );
        if rep.width > 0 && rep.height > 0 {
            let _ = write!(out, ",RESOLUTION={}x{}", rep.width, rep.height);
        }
        if let Some(frame_rate) = rep.frame_rate.as_deref().filter(|fr| !fr.is_empty()) {
            let _ = write!(out, ",FRAME-RATE={:.3}", parse_frame_rate(frame_rate));
        }
        if !selection.audio.is_empty() {
            let _ = write!(out, ",AUDIO=\"{AUDIO_GROUP_ID}\"");
        }
        if !selection.text.is_empty() {
            let _ = write!(out, ",SUBTITLES=\"{SUBTITLE_GROUP_ID}\"");
        }
        let _ = writeln!(out, "\nvideo/{}/playlist.m3u8", rep.id);
    }

    out
}

/// Render the media playlist for one representation over its current
/// sliding window of downloaded segments.
pub fn media_playlist(
    mpd: &Mpd,
    channel_id: &str,
    media_type: &str,
    rep_id: &str,
    media_sequence: u64,
    segments: &[AvailableSegment],
) -> DashlsResult<String> {
    let (set, rep) = mpd
        .periods
        .iter()
        .flat_map(|period| period.sets.iter())
        .filter(|set| set.content_type.as_str() == media_type)
        .find_map(|set| {
            set.representations
                .iter()
                .find(|rep| rep.id == rep_id)
                .map(|rep| (set, rep))
        })
        .ok_or_else(|| DashlsError::RepresentationNotFound {
            media_type: media_type.to_string(),
            rep_id: rep_id.to_string(),
        })?;

    let target_duration = mpd
        .max_segment_duration
        .map(|d| d.as_secs_f64().ceil() as u64)
        .unwrap_or(0);
    let timescale = set.template.timescale.max(1);

    let mut init_template = Template::new();
    init_template.insert(Template::REPRESENTATION_ID, rep.id.clone());
    let init_path = init_template.resolve(&set.template.initialization);
    let init_name = rewrite_init_name(&init_path);

    let mut out = String::new();
    out.push_str("#EXTM3U\n");
    out.push_str("#EXT-X-VERSION:7\n");
    let _ = writeln!(out, "#EXT-X-TARGETDURATION:{target_duration}");
    let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{media_sequence}");
    let _ = writeln!(out, "#EXT-X-KEY:METHOD=SAMPLE-AES,URI=\"/key/{channel_id}\"");
    let _ = writeln!(out, "#EXT-X-MAP:URI=\"{init_name}\"");

    for segment in segments {
        let duration = segment.duration as f64 / timescale as f64;
        let _ = writeln!(out, "#EXTINF:{duration:.3},");
        let _ = writeln!(out, "{}.m4s", segment.time);
    }

    Ok(out)
}

/// Basename of the init segment with its extension rewritten to `.m4s`,
/// matching how segment URIs are addressed back through this service.
fn rewrite_init_name(init_path: &str) -> String {
    let base = init_path.rsplit('/').next().unwrap_or(init_path);
    let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);
    format!("{stem}.m4s")
}

fn parse_frame_rate(frame_rate: &str) -> f64 {
    if let Some((num, den)) = frame_rate.split_once('/') {
        if let (Ok(num), Ok(den)) = (num.parse::<f64>(), den.parse::<f64>()) {
            if den != 0.0 {
                return num / den;
            }
        }
        return 0.0;
    }
    frame_rate.parse().unwrap_or(0.0)
}
