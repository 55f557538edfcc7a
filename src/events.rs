//! # Event Graph
//!
//! The output of [`crate::compiler`]: a flat, time-ordered sequence of [`Event`]s ready
//! for a downstream sequencer to walk. This crate does not serialize to MIDI or any other
//! wire format itself — see spec §1 — it only produces this typed, timestamped contract.

use crate::ast::{Articulation, HairpinKind, PedalKind};
use crate::rational::Rational;
use serde::{Deserialize, Serialize};

/// A single timestamped occurrence in the compiled score. Every variant carries its own
/// `start_time`/`staff_id`/`voice_id` rather than factoring them into a shared base
/// struct, so each event stays a plain, independently constructible value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Note(NoteEvent),
    Rest(RestEvent),
    Tempo(TempoEvent),
    TimeSignature(TimeSignatureEvent),
    Dynamic(DynamicEvent),
    Pedal(PedalEvent),
    ProgramChange(ProgramChangeEvent),
    ControlChange(ControlChangeEvent),
}

impl Event {
    pub fn start_time(&self) -> &Rational {
        match self {
            Event::Note(e) => &e.start_time,
            Event::Rest(e) => &e.start_time,
            Event::Tempo(e) => &e.start_time,
            Event::TimeSignature(e) => &e.start_time,
            Event::Dynamic(e) => &e.start_time,
            Event::Pedal(e) => &e.start_time,
            Event::ProgramChange(e) => &e.start_time,
            Event::ControlChange(e) => &e.start_time,
        }
    }

    pub fn staff_id(&self) -> &str {
        match self {
            Event::Note(e) => &e.staff_id,
            Event::Rest(e) => &e.staff_id,
            Event::Tempo(e) => &e.staff_id,
            Event::TimeSignature(e) => &e.staff_id,
            Event::Dynamic(e) => &e.staff_id,
            Event::Pedal(e) => &e.staff_id,
            Event::ProgramChange(e) => &e.staff_id,
            Event::ControlChange(e) => &e.staff_id,
        }
    }

    /// Ordering key used by [`EventGraph::sort`]: events at an identical timestamp are
    /// broken by kind, so that (for example) a tempo change always lands before the
    /// notes it affects rather than depending on insertion order.
    fn kind_priority(&self) -> u8 {
        match self {
            Event::Tempo(_) => 0,
            Event::TimeSignature(_) => 1,
            Event::ProgramChange(_) => 2,
            Event::Dynamic(_) => 3,
            Event::Pedal(_) => 4,
            Event::Note(_) => 10,
            Event::Rest(_) => 20,
            Event::ControlChange(_) => 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    pub midi_note: i32,
    /// The duration as written, before articulation/tie/tuplet adjustment.
    pub nominal_duration: Rational,
    /// The duration actually sounded, after tuplet scaling, staccato shortening, tie
    /// fusion and ornament time-stealing have all been applied.
    pub effective_duration: Rational,
    pub velocity: u8,
    pub articulations: Vec<Articulation>,
    pub is_tied_from: bool,
    pub is_tied_to: bool,
    pub channel: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    pub duration: Rational,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    pub bpm: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignatureEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    /// The velocity in effect at `start_time` (for a hairpin, the level it ramps *from*).
    pub velocity: u8,
    pub is_hairpin: bool,
    /// `Some` only when `is_hairpin`: the level the ramp reaches by the end of
    /// `hairpin_duration`, for a backend to interpolate toward.
    pub target_velocity: Option<u8>,
    /// `Some` only when `is_hairpin`: how long the ramp from `velocity` to
    /// `target_velocity` takes, in whole notes.
    pub hairpin_duration: Option<Rational>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedalEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    pub kind: PedalKind,
    pub channel: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramChangeEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    pub channel: u8,
    pub program: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlChangeEvent {
    pub start_time: Rational,
    pub staff_id: String,
    pub voice_id: u32,
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

/// A sorted, queryable collection of compiled events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventGraph {
    events: Vec<Event>,
    pub initial_tempo: Option<u32>,
    pub initial_time_signature: Option<(u32, u32)>,
}

impl EventGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Stable sort by `(start_time, kind_priority)`. Stability matters: two notes that
    /// start at the same instant keep their compilation order (e.g. chord pitches stay
    /// grouped together).
    pub fn sort(&mut self) {
        self.events
            .sort_by(|a, b| {
                a.start_time()
                    .cmp(b.start_time())
                    .then(a.kind_priority().cmp(&b.kind_priority()))
            });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The latest `start_time + duration` across every event, or zero for an empty graph.
    ///
    /// Uses each note's `nominal_duration`, not `effective_duration`: the piece's total
    /// span is a metric quantity (where the next downbeat would fall), unaffected by
    /// articulation-driven shortening of how long a note actually rings.
    pub fn duration(&self) -> Rational {
        self.events
            .iter()
            .map(|e| match e {
                Event::Note(n) => n.start_time.clone() + n.nominal_duration.clone(),
                Event::Rest(r) => r.start_time.clone() + r.duration.clone(),
                other => other.start_time().clone(),
            })
            .max()
            .unwrap_or_else(crate::rational::zero)
    }

    pub fn events_in_range(&self, start: &Rational, end: &Rational) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.start_time() >= start && e.start_time() < end)
            .collect()
    }

    pub fn events_for_staff(&self, staff_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.staff_id() == staff_id)
            .collect()
    }

    pub fn note_events(&self) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter().filter_map(|e| match e {
            Event::Note(n) => Some(n),
            _ => None,
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Mutable access to a previously-added note, used by the compiler to extend a
    /// sounding note across a tie without re-locating it by value.
    pub(crate) fn note_event_mut(&mut self, index: usize) -> Option<&mut NoteEvent> {
        match self.events.get_mut(index) {
            Some(Event::Note(n)) => Some(n),
            _ => None,
        }
    }

    /// Drops the most recently added event and appends `replacements` in its place.
    /// Used to swap a plain note for its ornament-expanded fragments without ever
    /// leaving both the original and the fragments present at once.
    pub(crate) fn replace_last(&mut self, replacements: impl IntoIterator<Item = Event>) {
        self.events.pop();
        self.events.extend(replacements);
    }
}

impl<'a> IntoIterator for &'a EventGraph {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::r;

    fn note(start: i64, midi: i32) -> Event {
        Event::Note(NoteEvent {
            start_time: r(start, 1),
            staff_id: "p".into(),
            voice_id: 1,
            midi_note: midi,
            nominal_duration: r(1, 4),
            effective_duration: r(1, 4),
            velocity: 80,
            articulations: Vec::new(),
            is_tied_from: false,
            is_tied_to: false,
            channel: 0,
        })
    }

    #[test]
    fn sort_orders_by_time_then_kind_priority() {
        let mut graph = EventGraph::new();
        graph.add(note(1, 60));
        graph.add(Event::Tempo(TempoEvent {
            start_time: r(1, 1),
            staff_id: "p".into(),
            voice_id: 1,
            bpm: 100,
        }));
        graph.sort();
        let kinds: Vec<_> = graph.iter().collect();
        assert!(matches!(kinds[0], Event::Tempo(_)));
        assert!(matches!(kinds[1], Event::Note(_)));
    }

    #[test]
    fn duration_is_max_end_time() {
        let mut graph = EventGraph::new();
        graph.add(note(0, 60));
        graph.add(note(1, 64));
        assert_eq!(graph.duration(), r(5, 4));
    }

    #[test]
    fn events_for_staff_filters_by_id() {
        let mut graph = EventGraph::new();
        graph.add(note(0, 60));
        let mut other = note(0, 62);
        if let Event::Note(n) = &mut other {
            n.staff_id = "other".into();
        }
        graph.add(other);
        assert_eq!(graph.events_for_staff("p").len(), 1);
    }

    #[test]
    fn events_in_range_is_half_open() {
        let mut graph = EventGraph::new();
        graph.add(note(0, 60));
        graph.add(note(1, 62));
        graph.add(note(2, 64));
        let in_range = graph.events_in_range(&r(0, 1), &r(2, 1));
        assert_eq!(in_range.len(), 2);
    }
}
