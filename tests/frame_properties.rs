use chrono::NaiveDate;
use proptest::prelude::*;
use rusty_stockframes::{
    frame::OverlayState,
    overlay::trailing_mean,
    playback::{Playback, PlaybackState},
    FrameRenderer, OverlaySpec, PricePoint, PriceSeries,
};

fn series_from(closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2023, 10, 2).unwrap();
    PriceSeries::from_points(
        "TEST",
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::new(start + chrono::Duration::days(i as i64), *c)),
    )
}

fn renderer(window: usize) -> FrameRenderer {
    FrameRenderer::new(vec![
        OverlaySpec::moving_average(window),
        OverlaySpec::split_markers(vec![NaiveDate::from_ymd_opt(2023, 10, 5).unwrap()]),
    ])
}

fn closes_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..1000.0, 1..80)
}

proptest! {
    #[test]
    fn frames_past_the_end_clamp_to_the_last(closes in closes_strategy(), window in 1usize..20, extra in 0usize..500) {
        let series = series_from(&closes);
        let renderer = renderer(window);
        let last = renderer.render(&series, series.len() - 1);
        let beyond = renderer.render(&series, series.len() + extra);
        prop_assert_eq!(&last, &beyond);
        prop_assert!(beyond.is_terminal);
        prop_assert_eq!(beyond.visible.len(), series.len());
    }

    #[test]
    fn rendering_is_deterministic(closes in closes_strategy(), window in 1usize..20, frame in 0usize..100) {
        let series = series_from(&closes);
        let renderer = renderer(window);
        prop_assert_eq!(renderer.render(&series, frame), renderer.render(&series, frame));
    }

    #[test]
    fn visible_prefix_matches_the_frame(closes in closes_strategy(), frame in 0usize..100) {
        let series = series_from(&closes);
        let state = renderer(3).render(&series, frame);
        let expected = frame.min(series.len() - 1) + 1;
        prop_assert_eq!(state.visible.len(), expected);
        prop_assert_eq!(&state.visible[..], &series.points()[..expected]);
        prop_assert_eq!(state.is_terminal, expected == series.len());
        prop_assert_eq!(state.annotation.is_some(), state.is_terminal);
    }

    #[test]
    fn trailing_mean_uses_exactly_the_window(closes in closes_strategy(), window in 1usize..30) {
        let values = trailing_mean(&closes, window, closes.len());
        prop_assert_eq!(values.len(), closes.len());
        for (i, value) in values.iter().enumerate() {
            if i + 1 < window {
                prop_assert!(value.is_none());
            } else {
                let expected = closes[i + 1 - window..=i].iter().sum::<f64>() / window as f64;
                prop_assert_eq!(*value, Some(expected));
            }
        }
    }

    #[test]
    fn window_longer_than_series_never_yields(closes in closes_strategy()) {
        let window = closes.len() + 1;
        let state = renderer(window).render(&series_from(&closes), closes.len());
        match &state.overlays[0] {
            OverlayState::TrailingMean { values, .. } => {
                prop_assert_eq!(values.len(), closes.len());
                prop_assert!(values.iter().all(Option::is_none));
            }
            other => prop_assert!(false, "unexpected overlay {:?}", other),
        }
    }

    #[test]
    fn playback_hits_the_terminal_frame_once(closes in closes_strategy()) {
        let series = series_from(&closes);
        let renderer = renderer(5);
        let mut playback = Playback::new(&renderer, &series);
        let mut frames = Vec::new();
        while let Some(frame) = playback.tick() {
            frames.push(frame);
        }
        prop_assert_eq!(playback.state(), PlaybackState::Finished);
        prop_assert_eq!(frames.len(), series.len());
        prop_assert_eq!(frames.iter().filter(|f| f.is_terminal).count(), 1);
        prop_assert!(frames.last().map_or(false, |f| f.is_terminal));
        for (i, frame) in frames.iter().enumerate() {
            prop_assert_eq!(frame.index, Some(i));
        }
        prop_assert!(playback.tick().is_none());
    }

    #[test]
    fn empty_series_renders_nothing(frame in 0usize..1000) {
        let state = renderer(50).render(&PriceSeries::empty("NONE"), frame);
        prop_assert!(state.is_empty());
        prop_assert_eq!(state.index, None);
        prop_assert!(!state.is_terminal);
        prop_assert!(state.annotation.is_none());
    }
}
