// Transport - Playback control and state management
// Controls play/stop state, clock source, loop range and playhead position

use serde::{Deserialize, Serialize};

use crate::error::{Result, SequencerError};
use crate::sequencer::timeline::Tempo;

/// Transport state (play/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }
}

impl From<u8> for TransportState {
    fn from(value: u8) -> Self {
        match value {
            1 => TransportState::Playing,
            _ => TransportState::Stopped,
        }
    }
}

impl From<TransportState> for u8 {
    fn from(state: TransportState) -> Self {
        match state {
            TransportState::Stopped => 0,
            TransportState::Playing => 1,
        }
    }
}

/// Where the transport clock comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportSource {
    /// Ticks derived from elapsed samples and the tempo
    #[default]
    Internal,
    /// Ticks supplied by an external clock, one per pulse
    External,
}

/// What the playhead does after the last pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndOfSongPolicy {
    /// Stop the transport
    #[default]
    Stop,
    /// Continue at the first tick of the first pattern
    Wrap,
}

/// Playhead position: pattern index and tick within that pattern
///
/// Ordering is lexicographic, pattern first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TransportPosition {
    pub pattern: u32,
    pub tick: u32,
}

impl TransportPosition {
    pub fn new(pattern: u32, tick: u32) -> Self {
        Self { pattern, tick }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Map an absolute tick count onto (pattern, tick) given the pattern lengths
    ///
    /// Ticks past the last pattern keep their overflow: they land on
    /// `(pattern_count, ticks_past_end)`, beyond the end of song.
    pub fn from_absolute_tick(mut ticks: u64, pattern_lengths: &[u32]) -> Self {
        for (index, &length) in pattern_lengths.iter().enumerate() {
            if ticks < length as u64 {
                return Self::new(index as u32, ticks as u32);
            }
            ticks -= length as u64;
        }
        Self::new(pattern_lengths.len() as u32, ticks.min(u32::MAX as u64) as u32)
    }
}

/// Loop region in tick addressing. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopRange {
    pub enabled: bool,
    pub start: TransportPosition,
    pub end: TransportPosition,
}

impl LoopRange {
    pub fn new(start: TransportPosition, end: TransportPosition, enabled: bool) -> Self {
        Self {
            enabled,
            start,
            end,
        }
    }

    /// Loop wraps only when enabled and non-empty
    pub fn is_active(&self) -> bool {
        self.enabled && self.end > self.start
    }
}

/// Loop range as supplied by a client, in either addressing mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopRangeSpec {
    Ticks(LoopRange),
    /// Absolute sample offsets from the start of the song
    Samples { start: u64, end: u64, enabled: bool },
}

/// Loop region in absolute ticks from the start of the song
///
/// Sample-addressed loops are kept in this form and mapped onto patterns
/// again whenever pattern lengths change, so a loop set on a short or empty
/// song keeps its length once patterns are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteLoop {
    pub start: u64,
    pub end: u64,
    pub enabled: bool,
}

impl AbsoluteLoop {
    /// Convert sample offsets with `tempo`. Partial ticks round down.
    pub fn from_samples(start: u64, end: u64, enabled: bool, tempo: &Tempo, sample_rate: f64) -> Self {
        Self {
            start: tempo.ticks_for_samples(start, sample_rate).floor() as u64,
            end: tempo.ticks_for_samples(end, sample_rate).floor() as u64,
            enabled,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.end <= self.start {
            return Err(SequencerError::InvalidLoopRange);
        }
        Ok(())
    }

    /// Tick-addressed range for the given pattern layout
    pub fn to_range(&self, pattern_lengths: &[u32]) -> LoopRange {
        LoopRange::new(
            TransportPosition::from_absolute_tick(self.start, pattern_lengths),
            TransportPosition::from_absolute_tick(self.end, pattern_lengths),
            self.enabled,
        )
    }
}

impl From<LoopRange> for LoopRangeSpec {
    fn from(range: LoopRange) -> Self {
        LoopRangeSpec::Ticks(range)
    }
}

/// Result of moving the playhead by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStep {
    /// Next tick in the same or the following pattern
    Moved,
    /// Reached the loop end and jumped to the loop start
    Looped,
    /// Ran past the last pattern and wrapped to the beginning
    Wrapped,
    /// Ran past the last pattern and must stop
    Ended,
}

/// Advance `position` by one tick
///
/// Carries into the next pattern when the tick reaches the pattern length,
/// then applies the loop range and finally the end-of-song policy.
pub fn step_position<F>(
    position: &mut TransportPosition,
    pattern_length: F,
    pattern_count: u32,
    loop_range: &LoopRange,
    end_of_song: EndOfSongPolicy,
) -> TickStep
where
    F: Fn(u32) -> Option<u32>,
{
    position.tick = position.tick.saturating_add(1);
    match pattern_length(position.pattern) {
        Some(length) if position.tick < length => {}
        _ => {
            position.pattern = position.pattern.saturating_add(1);
            position.tick = 0;
        }
    }

    if loop_range.is_active() && *position >= loop_range.end {
        *position = loop_range.start;
        return TickStep::Looped;
    }

    if position.pattern >= pattern_count {
        return match end_of_song {
            EndOfSongPolicy::Stop => {
                *position = TransportPosition::new(pattern_count, 0);
                TickStep::Ended
            }
            EndOfSongPolicy::Wrap => {
                *position = TransportPosition::zero();
                TickStep::Wrapped
            }
        };
    }

    TickStep::Moved
}

/// Transport controller (control-thread working copy)
///
/// Requests for a new position or state carry a sequence number. The audio
/// thread applies a request once when it sees a new number, and otherwise owns
/// the running playhead.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    state: TransportState,
    source: TransportSource,
    position: TransportPosition,
    tempo: Tempo,
    loop_range: LoopRange,
    loop_anchor: Option<AbsoluteLoop>,
    position_seq: u64,
    state_seq: u64,
    tempo_seq: u64,
}

impl TransportSettings {
    pub fn new(tempo: Tempo) -> Self {
        Self {
            state: TransportState::Stopped,
            source: TransportSource::Internal,
            position: TransportPosition::zero(),
            tempo,
            loop_range: LoopRange::default(),
            loop_anchor: None,
            position_seq: 0,
            state_seq: 0,
            tempo_seq: 0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Request a state change. Every call issues a new request; callers
    /// compare against the audio thread's state to skip redundant ones.
    pub fn request_state(&mut self, state: TransportState) {
        self.state = state;
        self.state_seq += 1;
    }

    pub fn source(&self) -> TransportSource {
        self.source
    }

    pub fn set_source(&mut self, source: TransportSource) -> bool {
        let changed = self.source != source;
        self.source = source;
        changed
    }

    pub fn position(&self) -> TransportPosition {
        self.position
    }

    /// Request a relocation. Always issues a new request, so seeking to the
    /// current position restarts it.
    pub fn set_position(&mut self, position: TransportPosition) {
        self.position = position;
        self.position_seq += 1;
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Replace the global tempo. Also overrides any tempo set by control events.
    pub fn set_tempo(&mut self, ticks_per_second: f64) -> Result<()> {
        self.tempo = Tempo::new(ticks_per_second)?;
        self.tempo_seq += 1;
        Ok(())
    }

    pub fn loop_range(&self) -> LoopRange {
        self.loop_range
    }

    /// Sample-addressed loop, if the current loop was set in samples
    pub fn loop_anchor(&self) -> Option<AbsoluteLoop> {
        self.loop_anchor
    }

    pub fn set_loop_range(&mut self, range: LoopRange) -> Result<()> {
        if range.enabled && range.end <= range.start {
            return Err(SequencerError::InvalidLoopRange);
        }
        self.loop_range = range;
        self.loop_anchor = None;
        Ok(())
    }

    /// Set a loop in absolute ticks, mapped onto the given pattern layout
    pub fn set_absolute_loop(&mut self, anchor: AbsoluteLoop, pattern_lengths: &[u32]) -> Result<()> {
        anchor.validate()?;
        self.loop_range = anchor.to_range(pattern_lengths);
        self.loop_anchor = Some(anchor);
        Ok(())
    }

    /// Map an absolute loop onto a changed pattern layout. Returns true if
    /// the tick-addressed range moved.
    pub fn relayout_loop(&mut self, pattern_lengths: &[u32]) -> bool {
        let Some(anchor) = self.loop_anchor else {
            return false;
        };
        let range = anchor.to_range(pattern_lengths);
        let moved = range != self.loop_range;
        self.loop_range = range;
        moved
    }

    pub fn position_seq(&self) -> u64 {
        self.position_seq
    }

    pub fn state_seq(&self) -> u64 {
        self.state_seq
    }

    pub fn tempo_seq(&self) -> u64 {
        self.tempo_seq
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::new(Tempo::default())
    }
}
