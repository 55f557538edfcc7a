//! # Abstract Syntax Tree
//!
//! Immutable, value-typed tree produced by [`crate::parser`] and consumed by
//! [`crate::semantic`] and [`crate::compiler`]. Every node is a plain owned value with
//! structural equality — no dynamic dispatch, no shared mutable state. Durations are
//! always [`crate::rational::Rational`], never floating point.
//!
//! Voice-synchronized measure content uses a proper tagged variant
//! ([`MeasureContent`]) rather than an untyped sentinel tuple, so both the analyzer and
//! the compiler can exhaustively match on it.

use crate::rational::{dotted_total, named_duration, r, Rational};
use serde::{Deserialize, Serialize};

/// Where a node appeared in the source, for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteLetter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteLetter {
    /// Semitone offset from C within an octave.
    pub fn base_semitone(self) -> i32 {
        match self {
            NoteLetter::C => 0,
            NoteLetter::D => 2,
            NoteLetter::E => 4,
            NoteLetter::F => 5,
            NoteLetter::G => 7,
            NoteLetter::A => 9,
            NoteLetter::B => 11,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        Some(match c.to_ascii_uppercase() {
            'C' => NoteLetter::C,
            'D' => NoteLetter::D,
            'E' => NoteLetter::E,
            'F' => NoteLetter::F,
            'G' => NoteLetter::G,
            'A' => NoteLetter::A,
            'B' => NoteLetter::B,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    Natural,
    Sharp,
    DoubleSharp,
    Flat,
    DoubleFlat,
    None,
}

impl Accidental {
    pub fn semitone_offset(self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::None => 0,
            Accidental::Sharp => 1,
            Accidental::DoubleSharp => 2,
            Accidental::Flat => -1,
            Accidental::DoubleFlat => -2,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "##" => Accidental::DoubleSharp,
            "#" => Accidental::Sharp,
            "bb" => Accidental::DoubleFlat,
            "b" => Accidental::Flat,
            "n" => Accidental::Natural,
            _ => return None,
        })
    }
}

/// A pitch: letter name, absolute octave, and an optional accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pitch {
    pub letter: NoteLetter,
    pub octave: i32,
    pub accidental: Accidental,
}

impl Pitch {
    pub fn new(letter: NoteLetter, octave: i32, accidental: Accidental) -> Self {
        Self {
            letter,
            octave,
            accidental,
        }
    }

    /// `(octave+1)*12 + base[letter] + semitone_offset(accidental)`.
    pub fn midi(&self) -> i32 {
        (self.octave + 1) * 12 + self.letter.base_semitone() + self.accidental.semitone_offset()
    }

    /// Shift by a number of semitones, re-spelling letter/accidental/octave from the
    /// target MIDI number rather than keeping this pitch's own letter. Always spells
    /// black keys sharp; does not attempt key-aware enharmonic respelling (out of
    /// scope), but `.midi()` on the result always equals `self.midi() + semitones`.
    pub fn with_midi_offset(&self, semitones: i32) -> Pitch {
        const CHROMATIC_SPELLING: [(NoteLetter, Accidental); 12] = [
            (NoteLetter::C, Accidental::None),
            (NoteLetter::C, Accidental::Sharp),
            (NoteLetter::D, Accidental::None),
            (NoteLetter::D, Accidental::Sharp),
            (NoteLetter::E, Accidental::None),
            (NoteLetter::F, Accidental::None),
            (NoteLetter::F, Accidental::Sharp),
            (NoteLetter::G, Accidental::None),
            (NoteLetter::G, Accidental::Sharp),
            (NoteLetter::A, Accidental::None),
            (NoteLetter::A, Accidental::Sharp),
            (NoteLetter::B, Accidental::None),
        ];
        let target = self.midi() + semitones;
        let octave = target.div_euclid(12) - 1;
        let (letter, accidental) = CHROMATIC_SPELLING[target.rem_euclid(12) as usize];
        Pitch {
            letter,
            octave,
            accidental,
        }
    }

    /// Despite the name, this checks full *notational* equality (letter + octave +
    /// accidental, with `None` and `Natural` treated as the same "no accidental" state),
    /// not mere MIDI equality: a C-sharp tied to a D-flat shares a MIDI number but is
    /// rejected, by design.
    pub fn enharmonic_equal(&self, other: &Pitch) -> bool {
        let normalize = |a: Accidental| if a == Accidental::None { Accidental::Natural } else { a };
        self.letter == other.letter
            && self.octave == other.octave
            && normalize(self.accidental) == normalize(other.accidental)
    }
}

/// `(base, dots)`. Total value is `base * (2 - 2^-dots)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub base: Rational,
    pub dots: u8,
}

impl Duration {
    pub fn new(base: Rational, dots: u8) -> Self {
        Self { base, dots }
    }

    pub fn named(name: &str, dots: u8) -> Option<Self> {
        named_duration(name).map(|base| Self::new(base, dots))
    }

    pub fn total_value(&self) -> Rational {
        dotted_total(&self.base, self.dots)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Articulation {
    Staccato,
    Staccatissimo,
    Tenuto,
    Legato,
    Accent,
    Marcato,
    Other(String),
}

impl Articulation {
    pub fn from_name(name: &str) -> Self {
        match name {
            "staccato" => Articulation::Staccato,
            "staccatissimo" => Articulation::Staccatissimo,
            "tenuto" => Articulation::Tenuto,
            "legato" => Articulation::Legato,
            "accent" => Articulation::Accent,
            "marcato" => Articulation::Marcato,
            other => Articulation::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ornament {
    Trill { auxiliary: Option<Pitch> },
    Mordent,
    Turn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceNote {
    pub pitch: Pitch,
}

/// A single sounded pitch with a duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: Pitch,
    pub duration: Duration,
    pub articulations: Vec<Articulation>,
    pub ornaments: Vec<Ornament>,
    pub tied: bool,
    pub grace_notes: Vec<GraceNote>,
    pub location: Location,
}

/// A non-empty set of simultaneous pitches sharing one duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    pub pitches: Vec<Pitch>,
    pub duration: Duration,
    pub articulations: Vec<Articulation>,
    pub ornaments: Vec<Ornament>,
    pub tied: bool,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rest {
    pub duration: Duration,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuplet {
    pub actual: u32,
    pub normal: u32,
    pub contents: Vec<MeasureItem>,
    pub location: Location,
}

impl Tuplet {
    /// `normal / actual`: the factor applied to each enclosed item's nominal duration.
    pub fn ratio(&self) -> Rational {
        r(self.normal as i64, self.actual as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slur {
    pub contents: Vec<MeasureItem>,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicMark {
    Ppp,
    Pp,
    P,
    Mp,
    Mf,
    F,
    Ff,
    Fff,
    Fp,
    Sfz,
    Sf,
}

impl DynamicMark {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ppp" => DynamicMark::Ppp,
            "pp" => DynamicMark::Pp,
            "p" => DynamicMark::P,
            "mp" => DynamicMark::Mp,
            "mf" => DynamicMark::Mf,
            "f" => DynamicMark::F,
            "ff" => DynamicMark::Ff,
            "fff" => DynamicMark::Fff,
            "fp" => DynamicMark::Fp,
            "sfz" => DynamicMark::Sfz,
            "sf" => DynamicMark::Sf,
            _ => return None,
        })
    }

    /// Fixed velocity mapping: ppp=16, pp=33, p=49, mp=64, mf=80, f=96, ff=112, fff=127,
    /// fp=96, sfz=127, sf=112.
    pub fn velocity(self) -> u8 {
        match self {
            DynamicMark::Ppp => 16,
            DynamicMark::Pp => 33,
            DynamicMark::P => 49,
            DynamicMark::Mp => 64,
            DynamicMark::Mf => 80,
            DynamicMark::F => 96,
            DynamicMark::Ff => 112,
            DynamicMark::Fff => 127,
            DynamicMark::Fp => 96,
            DynamicMark::Sfz => 127,
            DynamicMark::Sf => 112,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dynamic {
    pub marking: DynamicMark,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HairpinKind {
    Crescendo,
    Decrescendo,
    Diminuendo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hairpin {
    pub kind: HairpinKind,
    pub duration: Rational,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PedalKind {
    Down,
    Up,
    Change,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pedal {
    pub kind: PedalKind,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentChange {
    pub instrument: String,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn beats_per_measure(&self) -> Rational {
        r(self.numerator as i64, self.denominator as i64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoMark {
    pub bpm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

/// Tracked and reported by the analyzer but never consulted by the compiler for pitch
/// arithmetic — MIDI numbers come entirely from each [`Pitch`]'s own accidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    pub root: NoteLetter,
    pub accidental: Option<Accidental>,
    pub mode: Mode,
}

/// One item inside a measure (or inside a tuplet/slur, which themselves nest items).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureItem {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
    Tuplet(Tuplet),
    Slur(Slur),
    Dynamic(Dynamic),
    Hairpin(Hairpin),
    Pedal(Pedal),
    InstrumentChange(InstrumentChange),
    TimeSignature(TimeSignature),
    TempoMark(TempoMark),
}

/// A measure either holds a flat sequence of items, or a set of voice blocks that must
/// all share one total duration. Replaces the sentinel-tuple representation the Python
/// original used (`("voice", voice_num, item)` mixed into a plain list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureContent {
    Item(MeasureItem),
    VoiceBlock(u32, Vec<MeasureItem>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub number: Option<u32>,
    pub contents: Vec<MeasureContent>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub number: u32,
    pub measures: Vec<Measure>,
}

/// A score-level directive re-stated inside a staff body (mid-score changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffDirective {
    Tempo(TempoMark),
    Time(TimeSignature),
    Key(KeySignature),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffContent {
    Voice(Voice),
    Measure(Measure),
    Directive(StaffDirective),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub identifier: String,
    pub instrument: Option<String>,
    pub contents: Vec<StaffContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub staves: Vec<Staff>,
    pub tempo: Option<TempoMark>,
    pub time_signature: Option<TimeSignature>,
    pub key_signature: Option<KeySignature>,
}

impl Score {
    pub fn empty() -> Self {
        Self {
            staves: Vec::new(),
            tempo: None,
            time_signature: None,
            key_signature: None,
        }
    }
}
