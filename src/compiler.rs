//! # Event Compiler
//!
//! Walks a validated [`crate::ast::Score`] and produces a time-aligned [`EventGraph`],
//! using rational arithmetic throughout so timing is always exact (§4.3). This module
//! does not validate the score — call [`crate::semantic::analyze`] first if you need
//! well-formedness guarantees; the compiler will happily walk a score with an
//! unbalanced measure, it will simply produce events with whatever timing results.

use std::collections::HashMap;

use crate::ast::*;
use crate::events::{
    DynamicEvent, Event, EventGraph, NoteEvent, PedalEvent, ProgramChangeEvent, RestEvent,
    TempoEvent, TimeSignatureEvent,
};
use crate::rational::{one, r, zero, Rational};

/// Caller-supplied overrides, applied before falling back to the built-in General MIDI
/// name table. Keys are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub instrument_overrides: HashMap<String, u8>,
}

/// Looks up a General MIDI program number by instrument name (case-insensitive),
/// including the common aliases the original scores used (`"guitar"` for
/// `acoustic_guitar_steel`, `"organ"` for `church_organ`, and so on).
pub(crate) fn gm_program(name: &str) -> Option<u8> {
    Some(match name.to_ascii_lowercase().as_str() {
        "piano" | "acoustic_grand_piano" => 0,
        "bright_acoustic_piano" => 1,
        "electric_grand_piano" => 2,
        "honky_tonk_piano" => 3,
        "electric_piano_1" => 4,
        "electric_piano_2" => 5,
        "harpsichord" => 6,
        "clavinet" => 7,
        "celesta" => 8,
        "glockenspiel" => 9,
        "music_box" => 10,
        "vibraphone" => 11,
        "marimba" => 12,
        "xylophone" => 13,
        "tubular_bells" => 14,
        "dulcimer" => 15,
        "drawbar_organ" => 16,
        "percussive_organ" => 17,
        "rock_organ" => 18,
        "church_organ" | "organ" => 19,
        "reed_organ" => 20,
        "accordion" => 21,
        "harmonica" => 22,
        "tango_accordion" => 23,
        "acoustic_guitar_nylon" => 24,
        "acoustic_guitar_steel" | "guitar" => 25,
        "electric_guitar_jazz" => 26,
        "electric_guitar_clean" => 27,
        "electric_guitar_muted" => 28,
        "overdriven_guitar" => 29,
        "distortion_guitar" => 30,
        "guitar_harmonics" => 31,
        "acoustic_bass" => 32,
        "electric_bass_finger" | "bass" => 33,
        "electric_bass_pick" => 34,
        "fretless_bass" => 35,
        "slap_bass_1" => 36,
        "slap_bass_2" => 37,
        "synth_bass_1" => 38,
        "synth_bass_2" => 39,
        "violin" => 40,
        "viola" => 41,
        "cello" => 42,
        "contrabass" => 43,
        "tremolo_strings" => 44,
        "pizzicato_strings" => 45,
        "orchestral_harp" => 46,
        "timpani" => 47,
        "string_ensemble_1" | "strings" => 48,
        "string_ensemble_2" => 49,
        "synth_strings_1" => 50,
        "synth_strings_2" => 51,
        "choir_aahs" | "choir" => 52,
        "voice_oohs" => 53,
        "synth_choir" => 54,
        "orchestra_hit" => 55,
        "trumpet" => 56,
        "trombone" => 57,
        "tuba" => 58,
        "muted_trumpet" => 59,
        "french_horn" => 60,
        "brass_section" | "brass" => 61,
        "synth_brass_1" => 62,
        "synth_brass_2" => 63,
        "soprano_sax" => 64,
        "alto_sax" => 65,
        "tenor_sax" => 66,
        "baritone_sax" => 67,
        "oboe" => 68,
        "english_horn" => 69,
        "bassoon" => 70,
        "clarinet" => 71,
        "piccolo" => 72,
        "flute" => 73,
        "recorder" => 74,
        "pan_flute" => 75,
        "blown_bottle" => 76,
        "shakuhachi" => 77,
        "whistle" => 78,
        "ocarina" => 79,
        "woodwinds" => 73,
        "lead_square" => 80,
        "lead_sawtooth" | "synth" => 81,
        "lead_calliope" => 82,
        "lead_chiff" => 83,
        "lead_charang" => 84,
        "lead_voice" => 85,
        "lead_fifths" => 86,
        "lead_bass" => 87,
        "pad_new_age" => 88,
        "pad_warm" => 89,
        "pad_polysynth" => 90,
        "pad_choir" => 91,
        "pad_bowed" => 92,
        "pad_metallic" => 93,
        "pad_halo" => 94,
        "pad_sweep" => 95,
        "fx_rain" => 96,
        "fx_soundtrack" => 97,
        "fx_crystal" => 98,
        "fx_atmosphere" => 99,
        "fx_brightness" => 100,
        "fx_goblins" => 101,
        "fx_echoes" => 102,
        "fx_sci_fi" => 103,
        "sitar" => 104,
        "banjo" => 105,
        "shamisen" => 106,
        "koto" => 107,
        "kalimba" => 108,
        "bagpipe" => 109,
        "fiddle" => 110,
        "shanai" => 111,
        "tinkle_bell" => 112,
        "agogo" => 113,
        "steel_drums" => 114,
        "woodblock" => 115,
        "taiko_drum" => 116,
        "melodic_tom" => 117,
        "synth_drum" | "drums" => 118,
        "reverse_cymbal" => 119,
        "percussion" => 47,
        "guitar_fret_noise" => 120,
        "breath_noise" => 121,
        "seashore" => 122,
        "bird_tweet" => 123,
        "telephone_ring" => 124,
        "helicopter" => 125,
        "applause" => 126,
        "gunshot" => 127,
        _ => return None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TieKey {
    staff_id: String,
    voice_id: u32,
    midi_note: i32,
}

struct CompilerContext {
    current_time: Rational,
    staff_id: String,
    voice_id: u32,
    channel: u8,
    tempo: u32,
    time_signature: (u32, u32),
    current_velocity: u8,
    pending_ties: HashMap<TieKey, usize>,
    next_channel: u8,
    staff_channels: HashMap<String, u8>,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self {
            current_time: zero(),
            staff_id: String::new(),
            voice_id: 1,
            channel: 0,
            tempo: 120,
            time_signature: (4, 4),
            current_velocity: 80,
            pending_ties: HashMap::new(),
            next_channel: 0,
            staff_channels: HashMap::new(),
        }
    }
}

/// Compiles a score into an [`EventGraph`]. See module docs for what's *not* validated.
pub struct EventCompiler {
    ctx: CompilerContext,
    graph: EventGraph,
    options: CompileOptions,
}

impl EventCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            ctx: CompilerContext::default(),
            graph: EventGraph::new(),
            options,
        }
    }

    pub fn compile(mut self, score: &Score) -> EventGraph {
        if let Some(tempo) = &score.tempo {
            self.ctx.tempo = tempo.bpm;
            self.graph.initial_tempo = Some(tempo.bpm);
            self.graph.add(Event::Tempo(TempoEvent {
                start_time: zero(),
                staff_id: "__global__".to_string(),
                voice_id: 0,
                bpm: tempo.bpm,
            }));
        }

        if let Some(ts) = &score.time_signature {
            self.ctx.time_signature = (ts.numerator, ts.denominator);
            self.graph.initial_time_signature = Some((ts.numerator, ts.denominator));
            self.graph.add(Event::TimeSignature(TimeSignatureEvent {
                start_time: zero(),
                staff_id: "__global__".to_string(),
                voice_id: 0,
                numerator: ts.numerator,
                denominator: ts.denominator,
            }));
        }

        for staff in &score.staves {
            self.compile_staff(staff);
        }

        self.graph.sort();
        log::debug!("compiled {} events across {} staves", self.graph.len(), score.staves.len());
        self.graph
    }

    fn resolve_program(&self, instrument: &str) -> u8 {
        if let Some(&program) = self.options.instrument_overrides.get(&instrument.to_ascii_lowercase()) {
            return program;
        }
        match gm_program(instrument) {
            Some(program) => program,
            None => {
                log::warn!("unknown instrument '{instrument}', falling back to program 0");
                0
            }
        }
    }

    fn allocate_channel(&mut self, staff_id: &str) -> u8 {
        if let Some(&channel) = self.ctx.staff_channels.get(staff_id) {
            return channel;
        }
        let mut channel = self.ctx.next_channel;
        if channel == 9 {
            channel = 10;
            self.ctx.next_channel = 10;
        }
        self.ctx.staff_channels.insert(staff_id.to_string(), channel);
        self.ctx.next_channel = channel + 1;
        log::debug!("allocated channel {channel} to staff '{staff_id}'");
        channel
    }

    fn compile_staff(&mut self, staff: &Staff) {
        self.ctx.staff_id = staff.identifier.clone();
        self.ctx.channel = self.allocate_channel(&staff.identifier);
        self.ctx.current_time = zero();

        if let Some(instrument) = &staff.instrument {
            let program = self.resolve_program(instrument);
            self.graph.add(Event::ProgramChange(ProgramChangeEvent {
                start_time: zero(),
                staff_id: staff.identifier.clone(),
                voice_id: 0,
                channel: self.ctx.channel,
                program,
            }));
        }

        let mut voices = Vec::new();
        let mut direct_content = Vec::new();
        for item in &staff.contents {
            match item {
                StaffContent::Voice(voice) => voices.push(voice),
                other => direct_content.push(other),
            }
        }

        for voice in voices {
            self.compile_voice(voice);
        }

        if !direct_content.is_empty() {
            self.ctx.voice_id = 1;
            self.ctx.current_time = zero();
            for item in direct_content {
                match item {
                    StaffContent::Measure(measure) => {
                        self.compile_measure(measure);
                    }
                    StaffContent::Directive(StaffDirective::Tempo(tempo)) => {
                        self.ctx.tempo = tempo.bpm;
                        self.graph.add(Event::Tempo(TempoEvent {
                            start_time: self.ctx.current_time.clone(),
                            staff_id: self.ctx.staff_id.clone(),
                            voice_id: self.ctx.voice_id,
                            bpm: tempo.bpm,
                        }));
                    }
                    StaffContent::Directive(StaffDirective::Time(ts)) => {
                        self.ctx.time_signature = (ts.numerator, ts.denominator);
                        self.graph.add(Event::TimeSignature(TimeSignatureEvent {
                            start_time: self.ctx.current_time.clone(),
                            staff_id: self.ctx.staff_id.clone(),
                            voice_id: self.ctx.voice_id,
                            numerator: ts.numerator,
                            denominator: ts.denominator,
                        }));
                    }
                    StaffContent::Directive(StaffDirective::Key(_)) => {
                        // Key signatures affect notation, not playback timing or pitch:
                        // every Pitch already carries its own accidental.
                    }
                    StaffContent::Voice(_) => unreachable!("voices filtered out above"),
                }
            }
        }
    }

    fn compile_voice(&mut self, voice: &Voice) {
        self.ctx.voice_id = voice.number;
        self.ctx.current_time = zero();
        for measure in &voice.measures {
            self.compile_measure(measure);
        }
    }

    fn compile_measure(&mut self, measure: &Measure) -> Rational {
        let start = self.ctx.current_time.clone();

        let mut voice_blocks: Vec<(u32, &Vec<MeasureItem>)> = Vec::new();
        let mut other_items: Vec<&MeasureItem> = Vec::new();
        for content in &measure.contents {
            match content {
                MeasureContent::VoiceBlock(number, items) => voice_blocks.push((*number, items)),
                MeasureContent::Item(item) => other_items.push(item),
            }
        }

        if !voice_blocks.is_empty() {
            let measure_start = self.ctx.current_time.clone();
            let saved_voice_id = self.ctx.voice_id;

            voice_blocks.sort_by_key(|(number, _)| *number);
            let mut max_end = measure_start.clone();
            for (voice_num, items) in &voice_blocks {
                self.ctx.voice_id = *voice_num;
                self.ctx.current_time = measure_start.clone();
                for item in *items {
                    self.compile_measure_item(item, &one());
                }
                if self.ctx.current_time > max_end {
                    max_end = self.ctx.current_time.clone();
                }
            }

            self.ctx.voice_id = saved_voice_id;
            self.ctx.current_time = measure_start.clone();
            for item in other_items {
                self.compile_measure_item(item, &one());
            }

            self.ctx.current_time = max_end.clone();
            max_end - measure_start
        } else {
            for item in other_items {
                self.compile_measure_item(item, &one());
            }
            self.ctx.current_time.clone() - start
        }
    }

    fn compile_measure_item(&mut self, item: &MeasureItem, tuplet_ratio: &Rational) -> Rational {
        match item {
            MeasureItem::Note(note) => self.compile_note(note, tuplet_ratio),
            MeasureItem::Chord(chord) => self.compile_chord(chord, tuplet_ratio),
            MeasureItem::Rest(rest) => self.compile_rest(rest, tuplet_ratio),
            MeasureItem::Tuplet(tuplet) => self.compile_tuplet(tuplet, tuplet_ratio),
            MeasureItem::Slur(slur) => self.compile_slur(slur, tuplet_ratio),
            MeasureItem::Dynamic(dynamic) => self.compile_dynamic(dynamic),
            MeasureItem::Hairpin(hairpin) => self.compile_hairpin(hairpin),
            MeasureItem::Pedal(pedal) => self.compile_pedal(pedal),
            MeasureItem::TempoMark(tempo) => self.compile_tempo(tempo),
            MeasureItem::TimeSignature(ts) => self.compile_time_signature(ts),
            MeasureItem::InstrumentChange(change) => self.compile_instrument_change(change),
        }
    }

    /// Shortens the sounding length for staccato/staccatissimo; other articulations don't
    /// change timing (accent/marcato/tenuto only affect velocity/legato, out of scope for
    /// the event graph itself).
    fn effective_duration(duration: &Rational, articulations: &[Articulation]) -> Rational {
        if articulations.contains(&Articulation::Staccatissimo) {
            duration * r(1, 4)
        } else if articulations.contains(&Articulation::Staccato) {
            duration * r(1, 2)
        } else if articulations.contains(&Articulation::Tenuto)
            || articulations.contains(&Articulation::Legato)
        {
            duration.clone()
        } else {
            duration * r(9, 10)
        }
    }

    fn compile_note(&mut self, note: &Note, tuplet_ratio: &Rational) -> Rational {
        let duration = note.duration.total_value() * tuplet_ratio;
        let midi_note = note.pitch.midi();

        let mut grace_duration = zero();
        if !note.grace_notes.is_empty() {
            let grace_unit = &duration * r(1, 8);
            for grace in &note.grace_notes {
                self.graph.add(Event::Note(NoteEvent {
                    start_time: &self.ctx.current_time + &grace_duration,
                    staff_id: self.ctx.staff_id.clone(),
                    voice_id: self.ctx.voice_id,
                    midi_note: grace.pitch.midi(),
                    nominal_duration: grace_unit.clone(),
                    effective_duration: grace_unit.clone(),
                    velocity: self.ctx.current_velocity,
                    articulations: Vec::new(),
                    is_tied_from: false,
                    is_tied_to: false,
                    channel: self.ctx.channel,
                }));
                grace_duration = grace_duration + &grace_unit;
            }
        }

        let sounding_duration = &duration - &grace_duration;
        let effective = Self::effective_duration(&sounding_duration, &note.articulations);
        let tie_key = TieKey {
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            midi_note,
        };

        if let Some(index) = self.ctx.pending_ties.remove(&tie_key) {
            if let Some(prev) = self.graph.note_event_mut(index) {
                prev.nominal_duration = &prev.nominal_duration + &sounding_duration;
                prev.effective_duration = &prev.effective_duration + &effective;
                prev.is_tied_to = note.tied;
            }
            if note.tied {
                self.ctx.pending_ties.insert(tie_key, index);
            }
        } else {
            let event = NoteEvent {
                start_time: &self.ctx.current_time + &grace_duration,
                staff_id: self.ctx.staff_id.clone(),
                voice_id: self.ctx.voice_id,
                midi_note,
                nominal_duration: sounding_duration.clone(),
                effective_duration: effective,
                velocity: self.ctx.current_velocity,
                articulations: note.articulations.clone(),
                is_tied_from: false,
                is_tied_to: note.tied,
                channel: self.ctx.channel,
            };
            self.graph.add(Event::Note(event));
            let index = self.graph.len() - 1;
            if note.tied {
                self.ctx.pending_ties.insert(tie_key, index);
            } else if !note.ornaments.is_empty() {
                let fragments = self.expand_ornaments(note, &sounding_duration);
                self.graph.replace_last(fragments);
            }
        }

        self.ctx.current_time = &self.ctx.current_time + &duration;
        duration
    }

    fn compile_chord(&mut self, chord: &Chord, tuplet_ratio: &Rational) -> Rational {
        let duration = chord.duration.total_value() * tuplet_ratio;
        let effective = Self::effective_duration(&duration, &chord.articulations);

        for pitch in &chord.pitches {
            let midi_note = pitch.midi();
            let tie_key = TieKey {
                staff_id: self.ctx.staff_id.clone(),
                voice_id: self.ctx.voice_id,
                midi_note,
            };

            if let Some(index) = self.ctx.pending_ties.remove(&tie_key) {
                if let Some(prev) = self.graph.note_event_mut(index) {
                    prev.nominal_duration = &prev.nominal_duration + &duration;
                    prev.effective_duration = &prev.effective_duration + &effective;
                    prev.is_tied_to = chord.tied;
                }
                if chord.tied {
                    self.ctx.pending_ties.insert(tie_key, index);
                }
            } else {
                let event = NoteEvent {
                    start_time: self.ctx.current_time.clone(),
                    staff_id: self.ctx.staff_id.clone(),
                    voice_id: self.ctx.voice_id,
                    midi_note,
                    nominal_duration: duration.clone(),
                    effective_duration: effective.clone(),
                    velocity: self.ctx.current_velocity,
                    articulations: chord.articulations.clone(),
                    is_tied_from: false,
                    is_tied_to: chord.tied,
                    channel: self.ctx.channel,
                };
                self.graph.add(Event::Note(event));
                if chord.tied {
                    let index = self.graph.len() - 1;
                    self.ctx.pending_ties.insert(tie_key, index);
                }
            }
        }

        self.ctx.current_time = &self.ctx.current_time + &duration;
        duration
    }

    fn compile_rest(&mut self, rest: &Rest, tuplet_ratio: &Rational) -> Rational {
        let duration = rest.duration.total_value() * tuplet_ratio;
        self.graph.add(Event::Rest(RestEvent {
            start_time: self.ctx.current_time.clone(),
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            duration: duration.clone(),
        }));
        self.ctx.current_time = &self.ctx.current_time + &duration;
        duration
    }

    fn compile_tuplet(&mut self, tuplet: &Tuplet, outer_ratio: &Rational) -> Rational {
        let inner_ratio = tuplet.ratio() * outer_ratio;
        let mut total = zero();
        for item in &tuplet.contents {
            total = total + self.compile_measure_item(item, &inner_ratio);
        }
        total
    }

    fn compile_slur(&mut self, slur: &Slur, tuplet_ratio: &Rational) -> Rational {
        let mut total = zero();
        for item in &slur.contents {
            total = total + self.compile_measure_item(item, tuplet_ratio);
        }
        total
    }

    fn compile_dynamic(&mut self, dynamic: &Dynamic) -> Rational {
        self.ctx.current_velocity = dynamic.marking.velocity();
        self.graph.add(Event::Dynamic(DynamicEvent {
            start_time: self.ctx.current_time.clone(),
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            velocity: self.ctx.current_velocity,
            is_hairpin: false,
            target_velocity: None,
            hairpin_duration: None,
        }));
        zero()
    }

    /// Crescendos raise velocity by 30 (capped at 127); decrescendos/diminuendos lower it
    /// by 30 (floored at 20). Emits a single event at the hairpin's start time carrying
    /// both the starting velocity and the target, plus the span's duration, so a backend
    /// can interpolate the ramp itself. `current_velocity` is left untouched: notes
    /// written inside the span still sound at the velocity in effect when they were
    /// written, the same as the reference engine.
    fn compile_hairpin(&mut self, hairpin: &Hairpin) -> Rational {
        let start_velocity = self.ctx.current_velocity;
        let target = match hairpin.kind {
            HairpinKind::Crescendo => (start_velocity as i32 + 30).min(127) as u8,
            HairpinKind::Decrescendo | HairpinKind::Diminuendo => {
                (start_velocity as i32 - 30).max(20) as u8
            }
        };
        self.graph.add(Event::Dynamic(DynamicEvent {
            start_time: self.ctx.current_time.clone(),
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            velocity: start_velocity,
            is_hairpin: true,
            target_velocity: Some(target),
            hairpin_duration: Some(hairpin.duration.clone()),
        }));
        zero()
    }

    fn compile_pedal(&mut self, pedal: &Pedal) -> Rational {
        let start_time = self.ctx.current_time.clone();
        let staff_id = self.ctx.staff_id.clone();
        let voice_id = self.ctx.voice_id;
        let channel = self.ctx.channel;
        match pedal.kind {
            PedalKind::Down => self.graph.add(Event::Pedal(PedalEvent {
                start_time,
                staff_id,
                voice_id,
                kind: PedalKind::Down,
                channel,
            })),
            PedalKind::Up => self.graph.add(Event::Pedal(PedalEvent {
                start_time,
                staff_id,
                voice_id,
                kind: PedalKind::Up,
                channel,
            })),
            PedalKind::Change => {
                self.graph.add(Event::Pedal(PedalEvent {
                    start_time: start_time.clone(),
                    staff_id: staff_id.clone(),
                    voice_id,
                    kind: PedalKind::Up,
                    channel,
                }));
                self.graph.add(Event::Pedal(PedalEvent {
                    start_time,
                    staff_id,
                    voice_id,
                    kind: PedalKind::Down,
                    channel,
                }));
            }
        }
        zero()
    }

    fn compile_tempo(&mut self, tempo: &TempoMark) -> Rational {
        self.ctx.tempo = tempo.bpm;
        self.graph.add(Event::Tempo(TempoEvent {
            start_time: self.ctx.current_time.clone(),
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            bpm: tempo.bpm,
        }));
        zero()
    }

    fn compile_time_signature(&mut self, ts: &TimeSignature) -> Rational {
        self.ctx.time_signature = (ts.numerator, ts.denominator);
        self.graph.add(Event::TimeSignature(TimeSignatureEvent {
            start_time: self.ctx.current_time.clone(),
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            numerator: ts.numerator,
            denominator: ts.denominator,
        }));
        zero()
    }

    fn compile_instrument_change(&mut self, change: &InstrumentChange) -> Rational {
        let program = self.resolve_program(&change.instrument);
        self.graph.add(Event::ProgramChange(ProgramChangeEvent {
            start_time: self.ctx.current_time.clone(),
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            channel: self.ctx.channel,
            program,
        }));
        zero()
    }

    /// Expands an ornamented note into the fragments that replace its single plain
    /// `NoteEvent`. Unlike the reference engine this computes fragment start times by
    /// walking forward from the note's own start time rather than stepping backward
    /// from a later `current_time`, and it replaces the main event outright instead of
    /// appending fragments alongside it — so the fragments never overlap the note they
    /// ornament (§9).
    fn expand_ornaments(&self, note: &Note, duration: &Rational) -> Vec<Event> {
        let start = &self.ctx.current_time;
        let main_note = note.pitch.midi();
        let mut fragments = Vec::new();

        for ornament in &note.ornaments {
            match ornament {
                Ornament::Trill { auxiliary } => {
                    let aux = auxiliary
                        .as_ref()
                        .map(|p| p.midi())
                        .unwrap_or(main_note + 2);
                    let unit = duration * r(1, 8);
                    for i in 0..8u32 {
                        let pitch = if i % 2 == 0 { main_note } else { aux };
                        fragments.push(self.note_fragment(
                            start + &(&unit * r(i as i64, 1)),
                            pitch,
                            unit.clone(),
                        ));
                    }
                    return fragments;
                }
                Ornament::Mordent => {
                    let upper = main_note + 2;
                    let unit = duration * r(1, 8);
                    fragments.push(self.note_fragment(start.clone(), main_note, unit.clone()));
                    fragments.push(self.note_fragment(start + &unit, upper, unit.clone()));
                    let remaining = duration - &(&unit * r(2, 1));
                    fragments.push(self.note_fragment(
                        start + &(&unit * r(2, 1)),
                        main_note,
                        remaining,
                    ));
                    return fragments;
                }
                Ornament::Turn => {
                    let upper = main_note + 2;
                    let lower = main_note - 2;
                    let unit = duration * r(1, 4);
                    for (i, pitch) in [upper, main_note, lower, main_note].into_iter().enumerate() {
                        fragments.push(self.note_fragment(
                            start + &(&unit * r(i as i64, 1)),
                            pitch,
                            unit.clone(),
                        ));
                    }
                    return fragments;
                }
            }
        }

        fragments
    }

    fn note_fragment(&self, start_time: Rational, midi_note: i32, duration: Rational) -> Event {
        Event::Note(NoteEvent {
            start_time,
            staff_id: self.ctx.staff_id.clone(),
            voice_id: self.ctx.voice_id,
            midi_note,
            nominal_duration: duration.clone(),
            effective_duration: duration,
            velocity: self.ctx.current_velocity,
            articulations: Vec::new(),
            is_tied_from: false,
            is_tied_to: false,
            channel: self.ctx.channel,
        })
    }
}

/// Convenience wrapper over [`EventCompiler::new`]/[`EventCompiler::compile`].
pub fn compile_score(score: &Score, options: CompileOptions) -> EventGraph {
    EventCompiler::new(options).compile(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn compile(source: &str) -> EventGraph {
        let score = parse(source).unwrap();
        compile_score(&score, CompileOptions::default())
    }

    #[test]
    fn basic_timing_is_exact() {
        let graph = compile(
            "score { tempo 120 time 4/4 staff p { measure { C4 q D4 q E4 q F4 q } } }",
        );
        let notes: Vec<_> = graph.note_events().collect();
        assert_eq!(notes.len(), 4);
        assert_eq!(notes[1].start_time, r(1, 4));
        assert_eq!(notes[3].start_time, r(3, 4));
    }

    #[test]
    fn triplet_eighth_notes_divide_a_quarter_exactly() {
        let graph = compile("score { staff p { measure { tuplet 3 in 2 { C4 e D4 e E4 e } } } }");
        let notes: Vec<_> = graph.note_events().collect();
        assert_eq!(notes[0].nominal_duration, r(1, 12));
        assert_eq!(notes[0].effective_duration, r(1, 12) * r(9, 10));
        assert_eq!(notes[2].start_time, r(1, 6));
    }

    #[test]
    fn tie_fuses_into_a_single_extended_note() {
        let graph = compile("score { staff p { measure { C4 h tie } measure { C4 h } } }");
        let notes: Vec<_> = graph.note_events().collect();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].nominal_duration, r(1, 1));
        assert_eq!(notes[0].effective_duration, r(1, 1) * r(9, 10));
        assert!(notes[0].is_tied_to);
    }

    #[test]
    fn chord_emits_one_note_event_per_pitch_at_same_time() {
        let graph = compile("score { staff p { measure { <C4, E4, G4> q } } }");
        let notes: Vec<_> = graph.note_events().collect();
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().all(|n| n.start_time == zero()));
    }

    #[test]
    fn polyphonic_voice_blocks_start_together_in_a_measure() {
        let graph = compile(
            "score { staff p { measure { voice 1 { C5 h } voice 2 { C4 q D4 q } } } }",
        );
        let notes: Vec<_> = graph.note_events().collect();
        assert!(notes.iter().all(|n| n.start_time == zero() || n.start_time == r(1, 4)));
    }

    #[test]
    fn staccato_halves_effective_duration_but_not_nominal() {
        let graph = compile("score { staff p { measure { C4 q staccato } } }");
        let note = graph.note_events().next().unwrap();
        assert_eq!(note.nominal_duration, r(1, 4));
        assert_eq!(note.effective_duration, r(1, 8));
    }

    #[test]
    fn ornament_fragments_stay_inside_the_notes_own_window_without_overlap() {
        let graph = compile("score { staff p { measure { C4 q trill rest q } } }");
        let notes: Vec<_> = graph.note_events().collect();
        assert_eq!(notes.len(), 8);
        assert_eq!(notes[0].start_time, zero());
        let last_end = &notes[7].start_time + &notes[7].effective_duration;
        assert_eq!(last_end, r(1, 4));
    }

    #[test]
    fn trill_without_explicit_auxiliary_alternates_main_and_a_tone_above() {
        let graph = compile("score { staff p { measure { C4 q trill rest q } } }");
        let notes: Vec<_> = graph.note_events().collect();
        let midis: Vec<i32> = notes.iter().map(|n| n.midi_note).collect();
        assert_eq!(midis, vec![60, 62, 60, 62, 60, 62, 60, 62]);
    }

    #[test]
    fn mordent_inserts_main_upper_neighbor_then_main() {
        let graph = compile("score { staff p { measure { C4 q mordent rest q } } }");
        let notes: Vec<_> = graph.note_events().collect();
        let midis: Vec<i32> = notes.iter().map(|n| n.midi_note).collect();
        assert_eq!(midis, vec![60, 62, 60]);
    }

    #[test]
    fn turn_inserts_upper_main_lower_main() {
        let graph = compile("score { staff p { measure { C4 q turn rest q } } }");
        let notes: Vec<_> = graph.note_events().collect();
        let midis: Vec<i32> = notes.iter().map(|n| n.midi_note).collect();
        assert_eq!(midis, vec![62, 60, 58, 60]);
    }

    #[test]
    fn hairpin_carries_start_and_target_velocity_without_bumping_running_velocity() {
        let graph =
            compile("score { staff p { measure { C4 q hairpin cresc 1/4 D4 q } } }");
        let dynamics: Vec<_> = graph
            .iter()
            .filter_map(|e| match e {
                Event::Dynamic(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(dynamics.len(), 1);
        let hairpin = dynamics[0];
        assert!(hairpin.is_hairpin);
        assert_eq!(hairpin.velocity, 80);
        assert_eq!(hairpin.target_velocity, Some(110));
        assert_eq!(hairpin.hairpin_duration, Some(r(1, 4)));
        assert_eq!(hairpin.start_time, r(1, 4));

        // The note written after the hairpin still sounds at the pre-hairpin velocity;
        // only a backend interpolating the hairpin event decides what actually sounds.
        let notes: Vec<_> = graph.note_events().collect();
        assert_eq!(notes[1].velocity, 80);
    }

    #[test]
    fn channel_allocation_skips_nine() {
        let mut source = String::from("score { ");
        for letter in 'a'..='j' {
            source.push_str(&format!("staff {letter}: flute {{ measure {{ rest w }} }} "));
        }
        source.push('}');
        let graph = compile(&source);
        let channels: Vec<u8> = graph
            .iter()
            .filter_map(|e| match e {
                Event::ProgramChange(p) => Some(p.channel),
                _ => None,
            })
            .collect();
        assert_eq!(channels.len(), 10);
        assert!(!channels.contains(&9));
        // The 10th staff (index 9, which would have landed on channel 9) is bumped to 10.
        assert_eq!(channels[9], 10);
    }
}
