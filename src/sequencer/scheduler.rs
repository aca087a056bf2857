// Scheduler - Advances the transport and emits due events
// Runs once per audio block against the current snapshot

use crate::messaging::output::{EventSink, TimedControlEvent, TimedCvEvent, TimedMidiEvent};
use crate::sequencer::event::{ControlEvent, ControlEventType, Event, MidiEvent};
use crate::sequencer::timeline::Tempo;
use crate::sequencer::track::TrackKind;
use crate::sequencer::transport::{
    EndOfSongPolicy, TickStep, TransportPosition, TransportSource, TransportState, step_position,
};
use crate::snapshot::state::SequencerState;

/// Fixed settings of the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    pub sample_rate: f64,
    pub end_of_song: EndOfSongPolicy,
    /// Send CC 123 on every MIDI track when the transport stops
    pub all_notes_off_on_stop: bool,
    /// Send CC 123 on every MIDI track when the playhead loops or wraps
    pub all_notes_off_on_loop: bool,
    /// Upper bound on ticks traversed in one block
    pub max_ticks_per_block: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            end_of_song: EndOfSongPolicy::Stop,
            all_notes_off_on_stop: true,
            all_notes_off_on_loop: true,
            max_ticks_per_block: 4096,
        }
    }
}

/// Per-block input from the audio callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockContext {
    /// Number of frames in the block
    pub frames: u32,
    /// Pulses received from the external clock during the block
    pub external_ticks: u32,
}

impl BlockContext {
    pub fn new(frames: u32) -> Self {
        Self {
            frames,
            external_ticks: 0,
        }
    }

    pub fn with_external_ticks(frames: u32, external_ticks: u32) -> Self {
        Self {
            frames,
            external_ticks,
        }
    }
}

/// What happened during one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockReport {
    /// Ticks the playhead moved
    pub ticks: u32,
    /// Events accepted by the sink
    pub emitted: u32,
    /// Events the sink refused
    pub dropped: u32,
}

/// Real-time transport and event scheduler
///
/// Owns the running playhead. The snapshot only carries requests (identified
/// by sequence numbers), which are applied once at the start of a block.
/// The tick under the playhead is emitted when the playhead arrives on it.
/// `process` never allocates, locks or fails.
pub struct Scheduler {
    config: SchedulerConfig,
    state: TransportState,
    position: TransportPosition,
    /// The tick under the playhead has not been emitted yet
    pending_arrival: bool,
    /// Fraction of the current tick already elapsed, in [0, 1)
    phase: f64,
    tempo: Tempo,
    tempo_override: Option<Tempo>,
    applied_position_seq: u64,
    applied_state_seq: u64,
    applied_tempo_seq: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, tempo: Tempo) -> Self {
        Self {
            config,
            state: TransportState::Stopped,
            position: TransportPosition::zero(),
            pending_arrival: true,
            phase: 0.0,
            tempo,
            tempo_override: None,
            applied_position_seq: 0,
            applied_state_seq: 0,
            applied_tempo_seq: 0,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn position(&self) -> TransportPosition {
        self.position
    }

    /// Tempo the next tick runs at, one-shot override included
    pub fn tempo(&self) -> Tempo {
        self.tempo_override.unwrap_or(self.tempo)
    }

    pub fn applied_position_seq(&self) -> u64 {
        self.applied_position_seq
    }

    pub fn applied_state_seq(&self) -> u64 {
        self.applied_state_seq
    }

    /// Process one block
    pub fn process<S: EventSink>(
        &mut self,
        snapshot: &SequencerState,
        block: BlockContext,
        sink: &mut S,
    ) -> BlockReport {
        let mut report = BlockReport::default();

        self.apply_requests(snapshot, sink, &mut report);

        if !self.state.is_playing() || block.frames == 0 || snapshot.pattern_count() == 0 {
            return report;
        }

        if self.pending_arrival {
            self.pending_arrival = false;
            self.emit_tick(snapshot, 0, sink, &mut report);
        }

        match snapshot.transport().source() {
            TransportSource::Internal => self.run_internal_clock(snapshot, block.frames, sink, &mut report),
            TransportSource::External => self.run_external_clock(snapshot, block, sink, &mut report),
        }

        report
    }

    fn apply_requests<S: EventSink>(&mut self, snapshot: &SequencerState, sink: &mut S, report: &mut BlockReport) {
        let transport = snapshot.transport();

        if transport.tempo_seq() != self.applied_tempo_seq {
            self.applied_tempo_seq = transport.tempo_seq();
            self.tempo = transport.tempo();
        }

        if transport.position_seq() != self.applied_position_seq {
            self.applied_position_seq = transport.position_seq();
            self.position = transport.position();
            self.pending_arrival = true;
            self.phase = 0.0;
            self.tempo_override = None;
        }

        if transport.state_seq() != self.applied_state_seq {
            self.applied_state_seq = transport.state_seq();
            let requested = transport.state();
            if self.state.is_playing() && !requested.is_playing() && self.config.all_notes_off_on_stop {
                self.all_notes_off(snapshot, 0, sink, report);
            }
            self.state = requested;
        }
    }

    fn run_internal_clock<S: EventSink>(
        &mut self,
        snapshot: &SequencerState,
        frames: u32,
        sink: &mut S,
        report: &mut BlockReport,
    ) {
        let frames_f = frames as f64;
        let mut elapsed = 0.0;

        loop {
            let samples_per_tick = self.tempo().samples_per_tick(self.config.sample_rate);
            let to_next = (1.0 - self.phase) * samples_per_tick;

            if elapsed + to_next >= frames_f {
                self.phase += (frames_f - elapsed) / samples_per_tick;
                break;
            }
            if report.ticks >= self.config.max_ticks_per_block {
                self.phase = 0.0;
                break;
            }

            elapsed += to_next;
            self.phase = 0.0;
            let offset = (elapsed.ceil() as u32).min(frames - 1);

            if !self.advance(snapshot, offset, sink, report) {
                break;
            }
        }
    }

    fn run_external_clock<S: EventSink>(
        &mut self,
        snapshot: &SequencerState,
        block: BlockContext,
        sink: &mut S,
        report: &mut BlockReport,
    ) {
        let ticks = block.external_ticks.min(self.config.max_ticks_per_block);

        for i in 0..ticks {
            let offset = (i as u64 * block.frames as u64 / ticks as u64) as u32;
            if !self.advance(snapshot, offset, sink, report) {
                break;
            }
        }
    }

    /// Move one tick and emit the tick arrived on. Returns false once stopped.
    fn advance<S: EventSink>(
        &mut self,
        snapshot: &SequencerState,
        offset: u32,
        sink: &mut S,
        report: &mut BlockReport,
    ) -> bool {
        // A one-shot tempo covers exactly the tick it was emitted on
        self.tempo_override = None;

        let step = step_position(
            &mut self.position,
            |pattern| snapshot.pattern_length(pattern),
            snapshot.pattern_count(),
            &snapshot.transport().loop_range(),
            self.config.end_of_song,
        );
        report.ticks += 1;

        match step {
            TickStep::Moved => {}
            TickStep::Looped | TickStep::Wrapped => {
                if self.config.all_notes_off_on_loop {
                    self.all_notes_off(snapshot, offset, sink, report);
                }
            }
            TickStep::Ended => {
                self.state = TransportState::Stopped;
                self.pending_arrival = true;
                self.phase = 0.0;
                if self.config.all_notes_off_on_stop {
                    self.all_notes_off(snapshot, offset, sink, report);
                }
                return false;
            }
        }

        self.emit_tick(snapshot, offset, sink, report);
        true
    }

    /// Emit every event at the playhead, in track order
    fn emit_tick<S: EventSink>(
        &mut self,
        snapshot: &SequencerState,
        offset: u32,
        sink: &mut S,
        report: &mut BlockReport,
    ) {
        let Some(pattern) = snapshot.pattern(self.position.pattern) else {
            return;
        };
        let tick = self.position.tick;

        for (track, sequence) in pattern.sequences().iter().enumerate() {
            let accepted = match sequence.get(tick) {
                None => continue,
                Some(Event::Midi(event)) => sink.midi(TimedMidiEvent { track, offset, event }),
                Some(Event::Cv(event)) => sink.cv(TimedCvEvent { track, offset, event }),
                Some(Event::Control(event)) => {
                    self.apply_control(&event, snapshot);
                    sink.control(TimedControlEvent { track, offset, event })
                }
            };
            count(report, accepted);
        }
    }

    fn apply_control(&mut self, event: &ControlEvent, snapshot: &SequencerState) {
        // Invalid values are ignored: there is no error path on this thread
        match event.kind {
            ControlEventType::GlobalTempo => {
                if let Ok(tempo) = Tempo::new(event.value) {
                    self.tempo = tempo;
                }
            }
            ControlEventType::GlobalTempoOneShot => {
                if let Ok(tempo) = Tempo::new(event.value) {
                    self.tempo_override = Some(tempo);
                }
            }
            ControlEventType::RelativeTempo => {
                self.tempo = snapshot.transport().tempo().scaled(event.value);
            }
        }
    }

    fn all_notes_off<S: EventSink>(
        &self,
        snapshot: &SequencerState,
        offset: u32,
        sink: &mut S,
        report: &mut BlockReport,
    ) {
        for (track, t) in snapshot.tracks().iter().enumerate() {
            if t.kind() == TrackKind::Midi {
                let accepted = sink.midi(TimedMidiEvent {
                    track,
                    offset,
                    event: MidiEvent::all_notes_off(),
                });
                count(report, accepted);
            }
        }
    }
}

fn count(report: &mut BlockReport, accepted: bool) {
    if accepted {
        report.emitted += 1;
    } else {
        report.dropped += 1;
    }
}
