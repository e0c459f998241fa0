//! Match timing: start time, paused time, remaining time and the result.
//!
//! All stored timestamps are in the host's clock. On the host the local
//! clock *is* the host clock; non-hosts keep a skew estimate derived from the
//! last authoritative `elapsedMs` they received, so elapsed time stays exact
//! even when the peers' wall clocks disagree.

#[derive(Debug, Clone, PartialEq)]
pub struct MatchClock {
    duration_ms: u64,
    started: bool,
    match_start_ms: u64,
    accumulated_paused_ms: u64,
    pause_start_ms: Option<u64>,
    /// Local clock minus host clock.
    skew_ms: i64,
    winner: Option<usize>,
    pausing_peer: Option<String>,
    last_remaining: u64,
}

impl MatchClock {
    pub fn new(match_duration_seconds: u64) -> Self {
        Self {
            duration_ms: match_duration_seconds * 1000,
            started: false,
            match_start_ms: 0,
            accumulated_paused_ms: 0,
            pause_start_ms: None,
            skew_ms: 0,
            winner: None,
            pausing_peer: None,
            last_remaining: match_duration_seconds,
        }
    }

    /// Starts a new match at `now`, as the authoritative side.
    pub fn start(&mut self, now: u64) {
        self.started = true;
        self.match_start_ms = now;
        self.accumulated_paused_ms = 0;
        self.pause_start_ms = None;
        self.pausing_peer = None;
        self.skew_ms = 0;
        self.last_remaining = self.duration_ms / 1000;
    }

    /// Clears timing, pause and result. The only place the winner is cleared.
    pub fn reset(&mut self) {
        *self = MatchClock::new(self.duration_ms / 1000);
    }

    pub fn host_time(&self, now: u64) -> u64 {
        as_i64(now).saturating_sub(self.skew_ms).max(0) as u64
    }

    pub fn elapsed_ms(&self, now: u64) -> u64 {
        if !self.started {
            return 0;
        }
        let reference = self.pause_start_ms.unwrap_or_else(|| self.host_time(now));
        reference
            .saturating_sub(self.match_start_ms)
            .saturating_sub(self.accumulated_paused_ms)
    }

    pub fn remaining_seconds(&self, now: u64) -> u64 {
        let duration_s = self.duration_ms / 1000;
        duration_s.saturating_sub(self.elapsed_ms(now) / 1000)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.started && self.remaining_seconds(now) == 0
    }

    /// Refreshes the cached remaining time; frozen while paused.
    pub fn tick(&mut self, now: u64) -> u64 {
        self.last_remaining = self.remaining_seconds(now);
        self.last_remaining
    }

    pub fn last_remaining(&self) -> u64 {
        self.last_remaining
    }

    pub fn enter_pause(&mut self, now: u64, pausing_peer: Option<&str>) {
        if self.pause_start_ms.is_some() {
            return;
        }
        self.pause_start_ms = Some(self.host_time(now));
        self.pausing_peer = pausing_peer.map(str::to_string);
    }

    pub fn exit_pause(&mut self, now: u64) {
        if let Some(start) = self.pause_start_ms.take() {
            self.accumulated_paused_ms = self
                .accumulated_paused_ms
                .saturating_add(self.host_time(now).saturating_sub(start));
        }
        self.pausing_peer = None;
    }

    /// Copies pause timing announced by another peer.
    pub fn set_pause(&mut self, pause_start_ms: u64, pausing_peer: Option<String>) {
        self.pause_start_ms = Some(pause_start_ms);
        self.pausing_peer = pausing_peer;
    }

    /// Overwrites the shadow copy with the host's values, last writer wins.
    pub fn apply_authoritative(
        &mut self,
        match_start_ms: u64,
        elapsed_ms: u64,
        total_paused_ms: u64,
        now: u64,
    ) {
        self.started = true;
        self.match_start_ms = match_start_ms;
        self.accumulated_paused_ms = total_paused_ms;
        if self.pause_start_ms.is_none() {
            let host_now = match_start_ms
                .saturating_add(total_paused_ms)
                .saturating_add(elapsed_ms);
            self.skew_ms = as_i64(now).saturating_sub(as_i64(host_now));
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause_start_ms.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn pause_start_ms(&self) -> Option<u64> {
        self.pause_start_ms
    }

    pub fn pausing_peer(&self) -> Option<&str> {
        self.pausing_peer.as_deref()
    }

    pub fn match_start_ms(&self) -> u64 {
        self.match_start_ms
    }

    pub fn total_paused_ms(&self) -> u64 {
        self.accumulated_paused_ms
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    /// Records the winner once; later calls are ignored until `reset`.
    pub fn set_winner(&mut self, winner: Option<usize>) -> bool {
        if self.winner.is_some() {
            return false;
        }
        self.winner = winner;
        winner.is_some()
    }
}

fn as_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_and_remaining() {
        let mut clock = MatchClock::new(120);
        assert_eq!(clock.elapsed_ms(5_000), 0);
        assert!(!clock.is_expired(5_000));

        clock.start(1_000);
        assert_eq!(clock.elapsed_ms(11_000), 10_000);
        assert_eq!(clock.remaining_seconds(11_000), 110);
        assert!(!clock.is_expired(120_999));
        assert!(clock.is_expired(121_000));
        assert_eq!(clock.remaining_seconds(500_000), 0);
    }

    #[test]
    fn test_pause_freezes_elapsed() {
        let mut clock = MatchClock::new(120);
        clock.start(0);
        clock.enter_pause(10_000, Some("peer-a"));
        assert!(clock.is_paused());
        assert_eq!(clock.pausing_peer(), Some("peer-a"));
        assert_eq!(clock.elapsed_ms(10_000), 10_000);
        assert_eq!(clock.elapsed_ms(60_000), 10_000);
        assert_eq!(clock.tick(60_000), 110);

        clock.exit_pause(15_000);
        assert!(!clock.is_paused());
        assert_eq!(clock.pausing_peer(), None);
        assert_eq!(clock.total_paused_ms(), 5_000);
        assert_eq!(clock.elapsed_ms(20_000), 15_000);
    }

    #[test]
    fn test_double_pause_keeps_first_start() {
        let mut clock = MatchClock::new(120);
        clock.start(0);
        clock.enter_pause(1_000, Some("a"));
        clock.enter_pause(2_000, Some("b"));
        assert_eq!(clock.pause_start_ms(), Some(1_000));
        assert_eq!(clock.pausing_peer(), Some("a"));
    }

    #[test]
    fn test_authoritative_values_overwrite_shadow() {
        let mut host = MatchClock::new(120);
        host.start(1_000);
        host.enter_pause(5_000, Some("host"));
        host.exit_pause(6_000);
        let elapsed = host.elapsed_ms(10_000);
        assert_eq!(elapsed, 8_000);

        // The shadow's wall clock is 40 s ahead of the host's.
        let mut shadow = MatchClock::new(120);
        shadow.apply_authoritative(host.match_start_ms(), elapsed, host.total_paused_ms(), 50_000);
        assert_eq!(shadow.elapsed_ms(50_000), 8_000);
        assert_eq!(shadow.total_paused_ms(), 1_000);
        assert_eq!(shadow.match_start_ms(), 1_000);
        assert_eq!(shadow.elapsed_ms(51_000), 9_000);

        // A later update wins unconditionally, even if it moves time backwards.
        shadow.apply_authoritative(1_000, 2_000, 0, 52_000);
        assert_eq!(shadow.elapsed_ms(52_000), 2_000);
    }

    #[test]
    fn test_winner_is_not_reassigned() {
        let mut clock = MatchClock::new(120);
        assert!(clock.set_winner(Some(2)));
        assert!(!clock.set_winner(Some(1)));
        assert_eq!(clock.winner(), Some(2));

        clock.reset();
        assert_eq!(clock.winner(), None);
        assert!(!clock.is_started());
    }

    #[test]
    fn test_extreme_values_saturate() {
        let mut clock = MatchClock::new(120);
        clock.apply_authoritative(u64::MAX, 5, u64::MAX, 0);
        assert_eq!(clock.host_time(0), u64::MAX >> 1);
        assert_eq!(clock.elapsed_ms(0), 0);

        clock.set_pause(0, None);
        clock.exit_pause(u64::MAX);
        assert_eq!(clock.total_paused_ms(), u64::MAX);
        assert!(!clock.is_paused());
    }
}
