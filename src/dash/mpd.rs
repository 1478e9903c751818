use std::time::Duration;

use chrono::{DateTime, Utc};

/// Manifest model used by the rest of the crate.
///
/// `dash_mpd` hands back the full schema; this trims it down to the pieces a
/// live translation session actually reads and makes the timelines mutable
/// so refreshes can merge into them.
#[derive(Debug, Clone, Default)]
pub struct Mpd {
    pub kind: PresentationKind,
    pub minimum_update_period: Option<Duration>,
    pub max_segment_duration: Option<Duration>,
    pub availability_start_time: Option<DateTime<Utc>>,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresentationKind {
    #[default]
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Default)]
pub struct Period {
    pub id: String,
    /// Offset from the MPD timeline zero point. Defaults to zero.
    pub start: Duration,
    pub base_url: Option<String>,
    pub sets: Vec<AdaptationSet>,
}

#[derive(Debug, Clone, Default)]
pub struct AdaptationSet {
    pub id: String,
    pub content_type: ContentType,
    pub lang: Option<String>,
    pub mime_type: Option<String>,
    pub template: SegmentTemplate,
    pub representations: Vec<Representation>,
}

#[derive(Debug, Clone, Default)]
pub struct Representation {
    pub id: String,
    pub bandwidth: u64,
    pub codecs: String,
    pub width: u64,
    pub height: u64,
    pub frame_rate: Option<String>,
    pub presentation_time_offset: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SegmentTemplate {
    /// Ticks per second for the timeline below. A set without a template
    /// keeps the zero default and is rejected as a session anchor.
    pub timescale: u64,
    pub initialization: String,
    pub media: String,
    pub timeline: SegmentTimeline,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTimeline {
    pub segments: Vec<S>,
}

/// One `<S>` element: a run of `r + 1` contiguous segments of duration `d`,
/// starting at `t` when present and non-zero, otherwise right after the
/// previous run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct S {
    pub t: Option<u64>,
    pub d: u64,
    pub r: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Video,
    Audio,
    Text,
    Other(String),
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Other(String::new())
    }
}

impl ContentType {
    pub fn parse(input: &str) -> Self {
        match input {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "text" => Self::Text,
            _ => Self::Other(input.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Other(other) => other.as_str(),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Mpd {
    pub fn from_parsed(mpd: dash_mpd::MPD) -> Self {
        Self {
            kind: match mpd.mpdtype.as_deref() {
                Some("dynamic") => PresentationKind::Dynamic,
                _ => PresentationKind::Static,
            },
            minimum_update_period: mpd.minimumUpdatePeriod,
            max_segment_duration: mpd.maxSegmentDuration,
            availability_start_time: mpd.availabilityStartTime,
            periods: mpd.periods.iter().map(convert_period).collect(),
        }
    }
}

/// XML ids are optional in the schema; downstream code wants plain strings.
fn xml_id<T: ToString>(id: &Option<T>) -> String {
    id.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn convert_period(period: &dash_mpd::Period) -> Period {
    Period {
        id: xml_id(&period.id),
        start: period.start.unwrap_or_default(),
        base_url: period.BaseURL.first().map(|base| base.base.clone()),
        sets: period
            .adaptations
            .iter()
            .map(|set| convert_set(set, period.SegmentTemplate.as_ref()))
            .collect(),
    }
}

fn convert_set(
    set: &dash_mpd::AdaptationSet,
    period_template: Option<&dash_mpd::SegmentTemplate>,
) -> AdaptationSet {
    let template = set.SegmentTemplate.as_ref().or(period_template);
    let converted_template = convert_template(template);
    let set_offset = template.and_then(|t| t.presentationTimeOffset).unwrap_or(0);

    AdaptationSet {
        id: xml_id(&set.id),
        content_type: set
            .contentType
            .as_deref()
            .map(ContentType::parse)
            .unwrap_or_default(),
        lang: set.lang.clone(),
        mime_type: set.mimeType.clone(),
        template: converted_template,
        representations: set
            .representations
            .iter()
            .map(|rep| convert_representation(rep, set_offset))
            .collect(),
    }
}

fn convert_representation(rep: &dash_mpd::Representation, set_offset: u64) -> Representation {
    Representation {
        id: xml_id(&rep.id),
        bandwidth: rep.bandwidth.unwrap_or(0),
        codecs: rep.codecs.clone().unwrap_or_default(),
        width: rep.width.unwrap_or(0),
        height: rep.height.unwrap_or(0),
        frame_rate: rep.frameRate.clone(),
        presentation_time_offset: rep
            .SegmentTemplate
            .as_ref()
            .and_then(|t| t.presentationTimeOffset)
            .unwrap_or(set_offset),
    }
}

fn convert_template(template: Option<&dash_mpd::SegmentTemplate>) -> SegmentTemplate {
    let Some(template) = template else {
        return SegmentTemplate::default();
    };

    SegmentTemplate {
        timescale: template.timescale.unwrap_or(1),
        initialization: template.initialization.clone().unwrap_or_default(),
        media: template.media.clone().unwrap_or_default(),
        timeline: template
            .SegmentTimeline
            .as_ref()
            .map(convert_timeline)
            .unwrap_or_default(),
    }
}

fn convert_timeline(timeline: &dash_mpd::SegmentTimeline) -> SegmentTimeline {
    SegmentTimeline {
        segments: timeline
            .segments
            .iter()
            .map(|s| S {
                t: s.t,
                d: s.d,
                // @r=-1 means "repeat to the end of the period"; the refresh
                // loop re-advertises the edge explicitly, so open-ended
                // repeats collapse to a single segment here.
                r: s.r.map(|r| r.max(0) as u64).unwrap_or(0),
            })
            .collect(),
    }
}
