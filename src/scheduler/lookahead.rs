//! Lookahead scheduling — the beat cursor and the horizon fill.
//!
//! Each pass emits every beat whose time falls before `now + horizon`, then
//! advances the cursor by one beat period, reading the tempo afresh for each
//! beat. A late pass therefore catches up with every missed beat at its exact
//! time instead of bunching them at "now".

use crate::tempo::{self, Tempo, TempoError};
use crate::tone::{BeatEvent, ClickTone};

/// Beat cursor plus the fixed horizon it fills up to.
#[derive(Debug, Clone)]
pub struct Lookahead {
    next_beat_time: f64,
    next_index: u64,
    horizon: f64,
    tone: ClickTone,
}

impl Lookahead {
    /// Seed a new cursor at `now + lead`.
    pub fn new(now: f64, lead: f64, horizon: f64, tone: ClickTone) -> Self {
        Self {
            next_beat_time: now + lead,
            next_index: 0,
            horizon,
            tone,
        }
    }

    /// Time of the earliest beat not yet emitted.
    pub fn next_beat_time(&self) -> f64 {
        self.next_beat_time
    }

    /// Number of beats emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_index
    }

    /// Emit every beat earlier than `now + horizon`, in time order.
    ///
    /// Returns how many beats were emitted. If the tempo yields a period that
    /// would not move the cursor forward, the pass stops before emitting that
    /// beat and the cursor stays where it was.
    pub fn fill<F>(&mut self, now: f64, tempo: &Tempo, mut emit: F) -> Result<usize, TempoError>
    where
        F: FnMut(BeatEvent),
    {
        let limit = now + self.horizon;
        let mut count = 0;

        while self.next_beat_time < limit {
            let bpm = tempo.bpm();
            let following = self.next_beat_time + tempo::seconds_per_beat(bpm);
            if !(following.is_finite() && following > self.next_beat_time) {
                return Err(TempoError::Invalid(bpm));
            }

            emit(BeatEvent {
                index: self.next_index,
                time: self.next_beat_time,
                tone: self.tone,
            });
            self.next_index += 1;
            self.next_beat_time = following;
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const LEAD: f64 = 0.05;
    const HORIZON: f64 = 0.1;

    fn lookahead_at(now: f64) -> Lookahead {
        Lookahead::new(now, LEAD, HORIZON, ClickTone::default())
    }

    fn collect(lookahead: &mut Lookahead, now: f64, tempo: &Tempo) -> Vec<BeatEvent> {
        let mut events = Vec::new();
        lookahead.fill(now, tempo, |e| events.push(e)).unwrap();
        events
    }

    /// Run wakes every `step` seconds from 0 up to `until`, collecting all events.
    fn run(tempo: &Tempo, step: f64, until: f64) -> Vec<BeatEvent> {
        let mut lookahead = lookahead_at(0.0);
        let mut events = Vec::new();
        let mut now = 0.0;
        while now <= until {
            events.extend(collect(&mut lookahead, now, tempo));
            now += step;
        }
        events
    }

    #[test]
    fn seeds_cursor_after_lead() {
        let lookahead = lookahead_at(3.0);
        assert_approx_eq!(lookahead.next_beat_time(), 3.05, 1e-12);
        assert_eq!(lookahead.emitted(), 0);
    }

    #[test]
    fn first_pass_emits_only_lead_beat() {
        let tempo = Tempo::new(180.0).unwrap();
        let mut lookahead = lookahead_at(0.0);
        let events = collect(&mut lookahead, 0.0, &tempo);
        assert_eq!(events.len(), 1);
        assert_approx_eq!(events[0].time, 0.05, 1e-12);
        assert_eq!(events[0].index, 0);
    }

    #[test]
    fn concrete_times_at_180() {
        let tempo = Tempo::new(180.0).unwrap();
        let events = run(&tempo, 0.025, 1.0);
        let expected = [0.05, 0.383_333_333, 0.716_666_667, 1.05];
        for (event, want) in events.iter().zip(expected) {
            assert_approx_eq!(event.time, want, 1e-6);
        }
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn spacing_law_across_supported_range() {
        for bpm in [150.0, 165.0, 180.0, 190.0, 200.0] {
            let tempo = Tempo::new(bpm).unwrap();
            let events = run(&tempo, 0.025, 30.0);
            assert!(events.len() > 50);
            for pair in events.windows(2) {
                assert_approx_eq!(pair[1].time - pair[0].time, 60.0 / bpm, 1e-6);
            }
        }
    }

    #[test]
    fn exact_spacing_at_150_and_200() {
        let events = run(&Tempo::new(150.0).unwrap(), 0.025, 2.0);
        assert_approx_eq!(events[1].time - events[0].time, 0.4, 1e-9);
        let events = run(&Tempo::new(200.0).unwrap(), 0.025, 2.0);
        assert_approx_eq!(events[1].time - events[0].time, 0.3, 1e-9);
    }

    #[test]
    fn no_drift_over_long_run() {
        let tempo = Tempo::new(180.0).unwrap();
        // Jittery wakes: alternate short and long gaps.
        let mut lookahead = lookahead_at(0.0);
        let mut events = Vec::new();
        let mut now = 0.0;
        let mut toggle = false;
        while now < 600.0 {
            events.extend(collect(&mut lookahead, now, &tempo));
            now += if toggle { 0.011 } else { 0.043 };
            toggle = !toggle;
        }
        let last = events.last().unwrap();
        assert_approx_eq!(last.time, 0.05 + last.index as f64 / 3.0, 1e-6);
    }

    #[test]
    fn delayed_wake_catches_up_in_order() {
        let tempo = Tempo::new(180.0).unwrap();
        let mut lookahead = lookahead_at(0.0);
        assert_eq!(collect(&mut lookahead, 0.0, &tempo).len(), 1);

        // Wake arrives 2 s late: every beat before 2.1 s comes out at once.
        let events = collect(&mut lookahead, 2.0, &tempo);
        let times: Vec<f64> = events.iter().map(|e| e.time).collect();
        assert_eq!(times.len(), 6);
        for (i, t) in times.iter().enumerate() {
            assert_approx_eq!(*t, 0.05 + (i + 1) as f64 / 3.0, 1e-9);
        }
        assert!(times.iter().all(|t| *t < 2.1));
        assert!(lookahead.next_beat_time() >= 2.1);
    }

    #[test]
    fn repeated_pass_without_time_passing_emits_nothing() {
        let tempo = Tempo::new(180.0).unwrap();
        let mut lookahead = lookahead_at(0.0);
        collect(&mut lookahead, 0.5, &tempo);
        assert!(collect(&mut lookahead, 0.5, &tempo).is_empty());
    }

    #[test]
    fn indices_are_contiguous() {
        let events = run(&Tempo::new(170.0).unwrap(), 0.1, 10.0);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.index, i as u64);
        }
    }

    #[test]
    fn times_strictly_increase() {
        let events = run(&Tempo::new(200.0).unwrap(), 0.37, 20.0);
        assert!(events.windows(2).all(|p| p[1].time > p[0].time));
    }

    #[test]
    fn tempo_change_is_forward_only() {
        let tempo = Tempo::new(180.0).unwrap();
        let mut lookahead = lookahead_at(0.0);
        let mut events = Vec::new();
        let mut now = 0.0;
        while events.len() < 4 {
            events.extend(collect(&mut lookahead, now, &tempo));
            now += 0.025;
        }
        assert_eq!(events.len(), 4);
        let before: Vec<f64> = events.iter().map(|e| e.time).collect();

        tempo.set_bpm(150.0).unwrap();
        while events.len() < 8 {
            events.extend(collect(&mut lookahead, now, &tempo));
            now += 0.025;
        }

        // Beats 1-4 are untouched.
        for (event, t) in events.iter().zip(&before) {
            assert_eq!(event.time, *t);
        }
        for pair in events[..4].windows(2) {
            assert_approx_eq!(pair[1].time - pair[0].time, 1.0 / 3.0, 1e-9);
        }
        // The cursor advance after beat 4 was already taken at 180 BPM;
        // every gap computed after the change is 0.4 s.
        for pair in events[4..].windows(2) {
            assert_approx_eq!(pair[1].time - pair[0].time, 0.4, 1e-9);
        }
    }

    #[test]
    fn zero_horizon_emits_only_past_beats() {
        let tempo = Tempo::new(180.0).unwrap();
        let mut lookahead = Lookahead::new(0.0, LEAD, 0.0, ClickTone::default());
        assert!(collect(&mut lookahead, 0.0, &tempo).is_empty());
        assert_eq!(collect(&mut lookahead, 0.06, &tempo).len(), 1);
    }

    #[test]
    fn degenerate_period_stops_without_looping() {
        // A tempo so fast the period vanishes next to the cursor value.
        let tempo = Tempo::new(1e300).unwrap();
        let mut lookahead = lookahead_at(1.0e6);
        let before = lookahead.next_beat_time();
        let mut emitted = 0;
        let result = lookahead.fill(1.0e6, &tempo, |_| emitted += 1);
        assert_eq!(result, Err(TempoError::Invalid(1e300)));
        assert_eq!(emitted, 0);
        assert_eq!(lookahead.next_beat_time(), before);
    }
}
