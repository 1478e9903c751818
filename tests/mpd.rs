use std::time::Duration;

use dashls::dash::{
    client::MpdClient,
    mpd::{ContentType, Mpd, PresentationKind, S},
};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const LIVE_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="dynamic"
     profiles="urn:mpeg:dash:profile:isoff-live:2011"
     minimumUpdatePeriod="PT8S" timeShiftBufferDepth="PT12H0S"
     availabilityStartTime="1970-01-01T00:00:00Z"
     publishTime="2025-07-09T15:05:52Z"
     maxSegmentDuration="PT12.00S" minBufferTime="PT8S">
  <Period id="p_3_0" start="PT0S">
    <BaseURL>3/</BaseURL>
    <AdaptationSet id="1" contentType="video" mimeType="video/mp4"
                   segmentAlignment="true" startWithSAP="1" maxWidth="1920" maxHeight="1080">
      <SegmentTemplate timescale="90000" initialization="$RepresentationID$/init.mp4"
                       media="$RepresentationID$/t$Time$.m4s">
        <SegmentTimeline>
          <S t="778027773360000" d="1080000" r="2"/>
          <S d="540000"/>
        </SegmentTimeline>
      </SegmentTemplate>
      <Representation id="v5000000" bandwidth="5000000" codecs="avc1.640028"
                      width="1920" height="1080" frameRate="25"/>
      <Representation id="v1500000" bandwidth="1500000" codecs="avc1.64001F"
                      width="1280" height="720" frameRate="25"/>
    </AdaptationSet>
    <AdaptationSet id="3" contentType="audio" lang="en" mimeType="audio/mp4">
      <SegmentTemplate timescale="48000" initialization="$RepresentationID$/init.mp4"
                       media="$RepresentationID$/t$Time$.m4s">
        <SegmentTimeline>
          <S t="414948145920000" d="576000" r="2"/>
        </SegmentTimeline>
      </SegmentTemplate>
      <Representation id="a128000" bandwidth="128000" codecs="mp4a.40.2"/>
    </AdaptationSet>
    <AdaptationSet id="5" contentType="text" lang="zh" mimeType="application/mp4">
      <SegmentTemplate timescale="1000" initialization="$RepresentationID$/init.mp4"
                       media="$RepresentationID$/t$Time$.m4s">
        <SegmentTimeline>
          <S t="8644753278000" d="12000" r="2"/>
        </SegmentTimeline>
      </SegmentTemplate>
      <Representation id="s10000_chi" bandwidth="10000"/>
    </AdaptationSet>
  </Period>
</MPD>"#;

#[test]
fn test_parse_live_manifest() {
    let parsed = dash_mpd::parse(LIVE_MANIFEST).expect("parse manifest");
    let mpd = Mpd::from_parsed(parsed);

    assert_eq!(mpd.kind, PresentationKind::Dynamic);
    assert_eq!(mpd.minimum_update_period, Some(Duration::from_secs(8)));
    assert_eq!(mpd.max_segment_duration, Some(Duration::from_secs(12)));
    assert!(mpd.availability_start_time.is_some());

    assert_eq!(mpd.periods.len(), 1);
    let period = &mpd.periods[0];
    assert_eq!(period.id, "p_3_0");
    assert_eq!(period.start, Duration::ZERO);
    assert_eq!(period.base_url.as_deref(), Some("3/"));
    assert_eq!(period.sets.len(), 3);

    let video = &period.sets[0];
    assert_eq!(video.id, "1");
    assert_eq!(video.content_type, ContentType::Video);
    assert_eq!(video.mime_type.as_deref(), Some("video/mp4"));
    assert_eq!(video.template.timescale, 90000);
    assert_eq!(video.template.initialization, "$RepresentationID$/init.mp4");
    assert_eq!(video.template.media, "$RepresentationID$/t$Time$.m4s");
    assert_eq!(
        video.template.timeline.segments,
        vec![
            S { t: Some(778027773360000), d: 1080000, r: 2 },
            S { t: None, d: 540000, r: 0 },
        ]
    );
    assert_eq!(video.representations.len(), 2);
    assert_eq!(video.representations[0].id, "v5000000");
    assert_eq!(video.representations[0].bandwidth, 5000000);
    assert_eq!(video.representations[0].codecs, "avc1.640028");
    assert_eq!(video.representations[0].width, 1920);
    assert_eq!(video.representations[0].height, 1080);
    assert_eq!(video.representations[0].frame_rate.as_deref(), Some("25"));
    assert_eq!(video.representations[1].id, "v1500000");
    assert_eq!(video.representations[1].bandwidth, 1500000);

    let audio = &period.sets[1];
    assert_eq!(audio.id, "3");
    assert_eq!(audio.content_type, ContentType::Audio);
    assert_eq!(audio.lang.as_deref(), Some("en"));
    assert_eq!(audio.template.timescale, 48000);
    assert_eq!(audio.representations[0].id, "a128000");

    let text = &period.sets[2];
    assert_eq!(text.id, "5");
    assert_eq!(text.content_type, ContentType::Text);
    assert_eq!(text.lang.as_deref(), Some("zh"));
    assert_eq!(text.representations[0].id, "s10000_chi");
}

#[tokio::test]
async fn test_fetch_follows_one_redirect() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old/manifest.mpd"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/session-42/manifest.mpd"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/session-42/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LIVE_MANIFEST))
        .mount(&server)
        .await;

    let client = MpdClient::new()?;
    let url = Url::parse(&format!("{}/old/manifest.mpd", server.uri()))?;
    let (mpd, effective_url) = client.fetch(&url, Some("test-agent")).await?;

    assert_eq!(mpd.kind, PresentationKind::Dynamic);
    assert!(effective_url.path().ends_with("/session-42/manifest.mpd"));
    Ok(())
}

#[tokio::test]
async fn test_fetch_propagates_origin_errors() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = MpdClient::new()?;
    let url = Url::parse(&format!("{}/manifest.mpd", server.uri()))?;
    assert!(client.fetch(&url, None).await.is_err());
    Ok(())
}
