// Communication channels lock-free
// Scheduled events leave the audio thread through SPSC ring buffers

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;

use crate::messaging::output::{EventSink, TimedControlEvent, TimedCvEvent, TimedMidiEvent};

pub type MidiProducer = ringbuf::HeapProd<TimedMidiEvent>;
pub type MidiConsumer = ringbuf::HeapCons<TimedMidiEvent>;
pub type CvProducer = ringbuf::HeapProd<TimedCvEvent>;
pub type CvConsumer = ringbuf::HeapCons<TimedCvEvent>;
pub type ControlProducer = ringbuf::HeapProd<TimedControlEvent>;
pub type ControlConsumer = ringbuf::HeapCons<TimedControlEvent>;

/// Audio-thread side: one producer per event kind
pub struct RingBufferSink {
    midi: MidiProducer,
    cv: CvProducer,
    control: ControlProducer,
}

impl EventSink for RingBufferSink {
    fn midi(&mut self, event: TimedMidiEvent) -> bool {
        self.midi.try_push(event).is_ok()
    }

    fn cv(&mut self, event: TimedCvEvent) -> bool {
        self.cv.try_push(event).is_ok()
    }

    fn control(&mut self, event: TimedControlEvent) -> bool {
        self.control.try_push(event).is_ok()
    }
}

/// Consumer side, drained by whatever renders the events
pub struct OutputReceiver {
    pub midi: MidiConsumer,
    pub cv: CvConsumer,
    pub control: ControlConsumer,
}

impl OutputReceiver {
    pub fn try_recv_midi(&mut self) -> Option<TimedMidiEvent> {
        self.midi.try_pop()
    }

    pub fn try_recv_cv(&mut self) -> Option<TimedCvEvent> {
        self.cv.try_pop()
    }

    pub fn try_recv_control(&mut self) -> Option<TimedControlEvent> {
        self.control.try_pop()
    }

    pub fn drain_midi(&mut self) -> Vec<TimedMidiEvent> {
        self.midi.pop_iter().collect()
    }

    pub fn drain_cv(&mut self) -> Vec<TimedCvEvent> {
        self.cv.pop_iter().collect()
    }

    pub fn drain_control(&mut self) -> Vec<TimedControlEvent> {
        self.control.pop_iter().collect()
    }
}

/// Create the three output queues, each holding `capacity` events
pub fn create_output_channel(capacity: usize) -> (RingBufferSink, OutputReceiver) {
    let (midi_tx, midi_rx) = HeapRb::<TimedMidiEvent>::new(capacity).split();
    let (cv_tx, cv_rx) = HeapRb::<TimedCvEvent>::new(capacity).split();
    let (control_tx, control_rx) = HeapRb::<TimedControlEvent>::new(capacity).split();

    (
        RingBufferSink {
            midi: midi_tx,
            cv: cv_tx,
            control: control_tx,
        },
        OutputReceiver {
            midi: midi_rx,
            cv: cv_rx,
            control: control_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::event::MidiEvent;

    fn note(offset: u32) -> TimedMidiEvent {
        TimedMidiEvent {
            track: 0,
            offset,
            event: MidiEvent::note_on(60, 100),
        }
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (mut sink, mut receiver) = create_output_channel(8);

        assert!(sink.midi(note(1)));
        assert!(sink.midi(note(2)));

        let received: Vec<u32> = receiver.drain_midi().iter().map(|e| e.offset).collect();
        assert_eq!(received, vec![1, 2]);
        assert!(receiver.try_recv_midi().is_none());
    }

    #[test]
    fn test_full_queue_drops() {
        let (mut sink, mut receiver) = create_output_channel(2);

        assert!(sink.midi(note(0)));
        assert!(sink.midi(note(1)));
        assert!(!sink.midi(note(2)));

        assert_eq!(receiver.drain_midi().len(), 2);
        assert!(sink.midi(note(3)));
    }
}
