use std::path::PathBuf;

use proptest::prelude::*;
use timeline::{ComposerSettings, CompositionInput, NarrationClip, compose};

const EPS: f64 = 1e-9;

fn clips(durations: &[f64]) -> Vec<NarrationClip> {
    durations
        .iter()
        .enumerate()
        .map(|(index, &duration)| NarrationClip {
            index,
            text: format!("s{index}"),
            path: PathBuf::from(format!("{index:02}.mp3")),
            duration,
        })
        .collect()
}

fn frames(n: usize) -> Vec<PathBuf> {
    (0..n)
        .map(|i| PathBuf::from(format!("kline_{i:04}_0000_{i:04}.png")))
        .collect()
}

#[test]
fn five_bar_example_single_subtitle() {
    let clips = clips(&[4.0]);
    let charts = frames(6);
    let settings = ComposerSettings {
        subtitle_gap: 0.2,
        ..Default::default()
    };
    let comp = compose(
        &settings,
        CompositionInput {
            title: None,
            report_frames: &[],
            chart_frames: &charts,
            clips: &clips,
        },
    )
    .unwrap();

    let s = &comp.subtitles[0];
    assert_eq!(s.start, 0.0);
    assert!((s.end - 4.2).abs() < EPS);
    assert!((comp.duration - 4.2).abs() < EPS);
    // six charts share 4.2 s
    assert!((comp.visuals[0].end - 0.7).abs() < EPS);
}

proptest! {
    #[test]
    fn tracks_stay_consistent(
        durations in proptest::collection::vec(0.0f64..30.0, 1..20),
        chart_count in 1usize..50,
        report_count in 0usize..4,
        with_title in any::<bool>(),
        title_duration in 0.0f64..5.0,
        report_duration in 0.0f64..5.0,
        gap in 0.0f64..1.0,
    ) {
        let clips = clips(&durations);
        let charts = frames(chart_count);
        let reports: Vec<PathBuf> = (0..report_count).map(|i| PathBuf::from(format!("report_{i}.png"))).collect();
        let settings = ComposerSettings {
            title_duration,
            report_duration,
            subtitle_gap: gap,
            background_audio: Some(PathBuf::from("bgm.mp3")),
            ..Default::default()
        };
        let comp = compose(&settings, CompositionInput {
            title: with_title.then_some("title"),
            report_frames: &reports,
            chart_frames: &charts,
            clips: &clips,
        }).unwrap();

        // the last subtitle closes the video
        let last = comp.subtitles.last().unwrap();
        prop_assert_eq!(last.end, comp.duration);

        // subtitles in order, never overlapping
        for pair in comp.subtitles.windows(2) {
            prop_assert!(pair[0].start <= pair[1].start);
            prop_assert!(pair[0].end <= pair[1].start + EPS);
        }
        for s in &comp.subtitles {
            prop_assert!(s.start <= s.end && s.end <= comp.duration + EPS);
        }

        // visuals tile [0, duration] with no gap or overlap
        prop_assert_eq!(comp.visuals.first().unwrap().start, 0.0);
        prop_assert_eq!(comp.visuals.last().unwrap().end, comp.duration);
        for pair in comp.visuals.windows(2) {
            prop_assert!((pair[0].end - pair[1].start).abs() < EPS);
        }
        for v in &comp.visuals {
            prop_assert!(v.start <= v.end + EPS);
        }

        // background audio spans the whole video
        prop_assert_eq!(comp.audio[0].duration, comp.duration);
        prop_assert_eq!(comp.audio.len(), clips.len() + 1);
    }
}
