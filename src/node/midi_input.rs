use crate::buffer::BlockBuffer;
use crate::midi::{note_to_frequency, MidiMessage};
use crate::param::ParamSet;

use super::{AudioGraphNode, NodeInputs, ProcInfo};

/// Converts the block's MIDI events into audio-rate control signals.
///
/// Channel 0 carries a gate (1.0 while a note is held), channel 1 the
/// frequency in Hz of the most recent note. Monophonic with last-note
/// priority; state persists across blocks so a held note keeps its gate up
/// through silent blocks.
pub struct MidiInputNode {
    gate_on: bool,
    current_note: Option<u8>,
    current_frequency: f32,
}

impl MidiInputNode {
    pub fn new() -> Self {
        Self {
            gate_on: false,
            current_note: None,
            current_frequency: 0.0,
        }
    }

    pub fn params() -> ParamSet {
        // Output is derived entirely from MIDI data.
        ParamSet::new(&[])
    }
}

impl AudioGraphNode for MidiInputNode {
    fn type_tag(&self) -> &'static str {
        "midi_input"
    }

    fn prepare(&mut self, _sample_rate: f64, _max_block_size: usize, _params: &ParamSet) {
        self.gate_on = false;
        self.current_note = None;
        self.current_frequency = 0.0;
    }

    fn process(
        &mut self,
        info: &ProcInfo,
        _params: &ParamSet,
        _inputs: &NodeInputs,
        output: &mut BlockBuffer,
    ) {
        let frames = info.frames();
        let channels = output.channels();
        let mut events = info.midi.iter().peekable();

        for s in 0..frames {
            // Apply every event at or before this sample offset.
            while let Some(event) = events.peek() {
                if event.frame as usize > s {
                    break;
                }
                match event.message {
                    MidiMessage::NoteOn { note, .. } => {
                        self.gate_on = true;
                        self.current_note = Some(note);
                        self.current_frequency = note_to_frequency(note);
                    }
                    MidiMessage::NoteOff { note } => {
                        // Only release the gate for the note we're playing.
                        if self.current_note == Some(note) {
                            self.gate_on = false;
                        }
                    }
                }
                events.next();
            }

            if channels > 0 {
                output.set_sample(0, s, if self.gate_on { 1.0 } else { 0.0 });
            }
            if channels > 1 {
                output.set_sample(1, s, self.current_frequency);
            }
        }
    }
}
