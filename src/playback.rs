use std::{ops::ControlFlow, thread, time::Duration};

use tracing::debug;

use crate::{
    frame::{FrameRenderer, FrameState},
    timeseries::PriceSeries,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing { frame: usize },
    Finished,
}

/// One playback session, `Idle -> Playing -> Finished`. No replay.
pub struct Playback<'a> {
    renderer: &'a FrameRenderer,
    series: &'a PriceSeries,
    state: PlaybackState,
}

impl<'a> Playback<'a> {
    pub fn new(renderer: &'a FrameRenderer, series: &'a PriceSeries) -> Self {
        Playback {
            renderer,
            series,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Advances one frame. The terminal frame is returned once, after which
    /// the session is `Finished` and every further tick yields `None`.
    pub fn tick(&mut self) -> Option<FrameState> {
        let next = match self.state {
            PlaybackState::Idle => 0,
            PlaybackState::Playing { frame } => frame + 1,
            PlaybackState::Finished => return None,
        };
        let last = match self.series.last_index() {
            Some(last) => last,
            None => {
                self.state = PlaybackState::Finished;
                return None;
            }
        };

        let state = self.renderer.render(self.series, next);
        self.state = if next >= last {
            PlaybackState::Finished
        } else {
            PlaybackState::Playing { frame: next }
        };
        Some(state)
    }
}

/// Timer-driven playback: one tick every `interval`.
#[derive(Debug, Clone, Copy)]
pub struct LiveAnimation {
    pub interval: Duration,
}

impl LiveAnimation {
    pub fn new(interval: Duration) -> Self {
        LiveAnimation { interval }
    }

    /// Runs the session to the end, or until `on_frame` breaks. Returns the
    /// number of frames handed out.
    pub fn run<F, E>(&self, playback: &mut Playback<'_>, mut on_frame: F) -> Result<usize, E>
    where
        F: FnMut(&FrameState) -> Result<ControlFlow<()>, E>,
    {
        let mut shown = 0;
        while let Some(frame) = playback.tick() {
            shown += 1;
            if on_frame(&frame)?.is_break() {
                debug!(shown, "playback stopped");
                break;
            }
            if playback.state() != PlaybackState::Finished && !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
        Ok(shown)
    }
}

/// Slider-style control: the frame is whatever the control currently says.
pub struct Scrubber<'a> {
    renderer: &'a FrameRenderer,
    series: &'a PriceSeries,
    position: usize,
}

impl<'a> Scrubber<'a> {
    /// Starts at the end, like a slider initialised to its maximum.
    pub fn new(renderer: &'a FrameRenderer, series: &'a PriceSeries) -> Self {
        Scrubber {
            renderer,
            series,
            position: series.len(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Slider range, `0..=len`.
    pub fn max(&self) -> usize {
        self.series.len()
    }

    pub fn set(&mut self, value: usize) -> FrameState {
        self.position = value.min(self.max());
        self.current()
    }

    pub fn current(&self) -> FrameState {
        self.renderer.render(self.series, self.position)
    }
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, ops::ControlFlow, time::Duration};

    use chrono::NaiveDate;

    use super::{LiveAnimation, Playback, PlaybackState, Scrubber};
    use crate::{
        frame::FrameRenderer,
        overlay::OverlaySpec,
        timeseries::{PricePoint, PriceSeries},
    };

    fn series(n: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 10, 2).unwrap();
        PriceSeries::from_points(
            "AAPL",
            (0..n).map(|i| PricePoint::new(start + chrono::Duration::days(i as i64), 100.0 + i as f64)),
        )
    }

    #[test]
    fn plays_every_frame_once() {
        let ts = series(4);
        let renderer = FrameRenderer::new(vec![OverlaySpec::moving_average(2)]);
        let mut playback = Playback::new(&renderer, &ts);
        assert_eq!(playback.state(), PlaybackState::Idle);

        let mut frames = Vec::new();
        while let Some(frame) = playback.tick() {
            frames.push(frame);
        }
        assert_eq!(playback.state(), PlaybackState::Finished);
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.iter().map(|f| f.visible.len()).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(frames.iter().filter(|f| f.is_terminal).count(), 1);
        assert!(frames.last().unwrap().is_terminal);
        assert!(playback.tick().is_none());
    }

    #[test]
    fn state_transitions() {
        let ts = series(2);
        let renderer = FrameRenderer::new(vec![]);
        let mut playback = Playback::new(&renderer, &ts);
        playback.tick();
        assert_eq!(playback.state(), PlaybackState::Playing { frame: 0 });
        playback.tick();
        assert_eq!(playback.state(), PlaybackState::Finished);
    }

    #[test]
    fn single_point_finishes_on_first_tick() {
        let ts = series(1);
        let renderer = FrameRenderer::new(vec![]);
        let mut playback = Playback::new(&renderer, &ts);
        let frame = playback.tick().unwrap();
        assert!(frame.is_terminal);
        assert_eq!(playback.state(), PlaybackState::Finished);
    }

    #[test]
    fn empty_series_finishes_without_frames() {
        let ts = PriceSeries::empty("AAPL");
        let renderer = FrameRenderer::new(vec![]);
        let mut playback = Playback::new(&renderer, &ts);
        assert!(playback.tick().is_none());
        assert_eq!(playback.state(), PlaybackState::Finished);
    }

    #[test]
    fn live_animation_can_be_cancelled() {
        let ts = series(10);
        let renderer = FrameRenderer::new(vec![]);
        let mut playback = Playback::new(&renderer, &ts);
        let live = LiveAnimation::new(Duration::ZERO);
        let shown = live
            .run(&mut playback, |frame| {
                Ok::<_, Infallible>(if frame.index == Some(2) {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        assert_eq!(shown, 3);
        assert_eq!(playback.state(), PlaybackState::Playing { frame: 2 });
    }

    #[test]
    fn live_animation_runs_to_the_end() {
        let ts = series(5);
        let renderer = FrameRenderer::new(vec![]);
        let mut playback = Playback::new(&renderer, &ts);
        let mut terminal = 0;
        let shown = LiveAnimation::new(Duration::from_millis(1))
            .run(&mut playback, |frame| {
                if frame.is_terminal {
                    terminal += 1;
                }
                Ok::<_, Infallible>(ControlFlow::Continue(()))
            })
            .unwrap();
        assert_eq!(shown, 5);
        assert_eq!(terminal, 1);
    }

    #[test]
    fn scrubber_matches_direct_render() {
        let ts = series(6);
        let renderer = FrameRenderer::new(vec![OverlaySpec::moving_average(3)]);
        let mut scrubber = Scrubber::new(&renderer, &ts);
        assert_eq!(scrubber.position(), 6);
        assert!(scrubber.current().is_terminal);

        assert_eq!(scrubber.set(2), renderer.render(&ts, 2));
        assert_eq!(scrubber.position(), 2);
        assert_eq!(scrubber.set(99), renderer.render(&ts, 5));
        assert_eq!(scrubber.position(), 6);
    }
}
