use url::Url;

use crate::{
    dash::{
        mpd::{AdaptationSet, Period, Representation},
        template::Template,
    },
    DashlsResult,
};

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

pub(crate) fn merge_baseurls(current: &Url, new: &str) -> DashlsResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        Ok(current.join(new)?)
    }
}

/// Base URL for a period: the post-redirect manifest URL, refined by the
/// period's own `BaseURL` element when present.
fn period_base(base: &Url, period: &Period) -> DashlsResult<Url> {
    match &period.base_url {
        Some(period_base) => merge_baseurls(base, period_base),
        None => Ok(base.clone()),
    }
}

pub fn init_segment_url(
    base: &Url,
    period: &Period,
    set: &AdaptationSet,
    rep: &Representation,
) -> DashlsResult<Url> {
    let mut template = Template::new();
    template.insert(Template::REPRESENTATION_ID, rep.id.clone());
    let path = template.resolve(&set.template.initialization);
    merge_baseurls(&period_base(base, period)?, &path)
}

pub fn media_segment_url(
    base: &Url,
    period: &Period,
    set: &AdaptationSet,
    rep: &Representation,
    time: u64,
) -> DashlsResult<Url> {
    let mut template = Template::new();
    template
        .insert(Template::REPRESENTATION_ID, rep.id.clone())
        .insert(Template::TIME, time.to_string());
    let path = template.resolve(&set.template.media);
    merge_baseurls(&period_base(base, period)?, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dash::mpd::SegmentTemplate;

    fn fixture() -> (Url, Period, AdaptationSet, Representation) {
        let base = Url::parse("https://origin.example.com/live/channel.mpd").unwrap();
        let period = Period {
            base_url: Some("3/".to_string()),
            ..Default::default()
        };
        let set = AdaptationSet {
            template: SegmentTemplate {
                timescale: 90000,
                initialization: "init-$RepresentationID$.mp4".to_string(),
                media: "$RepresentationID$/t$Time$.m4s".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let rep = Representation {
            id: "v5000000".to_string(),
            ..Default::default()
        };
        (base, period, set, rep)
    }

    #[test]
    fn test_init_segment_url() {
        let (base, period, set, rep) = fixture();
        let url = init_segment_url(&base, &period, &set, &rep).unwrap();
        assert_eq!(
            url.as_str(),
            "https://origin.example.com/live/3/init-v5000000.mp4"
        );
    }

    #[test]
    fn test_media_segment_url() {
        let (base, period, set, rep) = fixture();
        let url = media_segment_url(&base, &period, &set, &rep, 778027773360000).unwrap();
        assert_eq!(
            url.as_str(),
            "https://origin.example.com/live/3/v5000000/t778027773360000.m4s"
        );
    }

    #[test]
    fn test_absolute_template_wins() {
        let (base, period, mut set, rep) = fixture();
        set.template.media = "https://edge.example.com/$RepresentationID$/$Time$.m4s".to_string();
        let url = media_segment_url(&base, &period, &set, &rep, 42).unwrap();
        assert_eq!(url.as_str(), "https://edge.example.com/v5000000/42.m4s");
    }
}
