//! # Parser Module
//!
//! Recursive-descent parser for Clef source text. Builds the AST directly as it
//! parses; there is no intermediate concrete syntax tree. Each grammar production
//! in spec.md §4.1 has a matching `parse_*` function below.
//!
//! ## Entry Point
//! `parse(source: &str) -> Result<Score, GenError>`
//!
//! A single unrecoverable error aborts parsing; the parser never returns a partial
//! AST (matching §4.1's error policy).

use crate::ast::*;
use crate::error::{GenError, ParseError};
use crate::lexer::{Lexer, LocatedToken, Token};
use crate::rational::r;

const ARTICULATION_NAMES: &[&str] = &[
    "staccato",
    "staccatissimo",
    "tenuto",
    "legato",
    "accent",
    "marcato",
];

const PEDAL_NAMES: &[&str] = &["ped", "ped_up", "ped_change"];

fn pedal_kind(name: &str) -> Option<PedalKind> {
    Some(match name {
        "ped" => PedalKind::Down,
        "ped_up" => PedalKind::Up,
        "ped_change" => PedalKind::Change,
        _ => return None,
    })
}

fn hairpin_kind(name: &str) -> Option<HairpinKind> {
    Some(match name {
        "cresc" => HairpinKind::Crescendo,
        "decresc" => HairpinKind::Decrescendo,
        "dim" => HairpinKind::Diminuendo,
        _ => return None,
    })
}

/// Parse Clef source text into a fully-typed AST.
///
/// ```
/// use clef::parser::parse;
///
/// let score = parse("score { tempo 120 time 4/4 staff piano { voice 1 { measure { C4 q } } } }").unwrap();
/// assert_eq!(score.staves.len(), 1);
/// ```
pub fn parse(source: &str) -> Result<Score, GenError> {
    log::debug!("parsing {} bytes of Clef source", source.len());
    let tokens = Lexer::new(source).tokenize().map_err(GenError::Parse)?;
    let mut parser = Parser::new(source, tokens);
    let score = parser.parse_score()?;
    parser.expect_eof()?;
    Ok(score)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<LocatedToken>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: Vec<LocatedToken>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
        }
    }

    fn current(&self) -> &LocatedToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> LocatedToken {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn location(&self) -> Location {
        let tok = self.current();
        Location {
            line: tok.line,
            column: tok.column,
        }
    }

    fn source_line(&self, line: usize) -> String {
        self.source
            .lines()
            .nth(line.saturating_sub(1))
            .unwrap_or("")
            .to_string()
    }

    fn token_description(tok: &Token) -> String {
        match tok {
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LAngle => "'<'".to_string(),
            Token::RAngle => "'>'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Dot => "'.'".to_string(),
            Token::Sharp => "'#'".to_string(),
            Token::Integer(n) => format!("integer '{n}'"),
            Token::Pitch { .. } => "a pitch".to_string(),
            Token::Identifier(s) => format!("'{s}'"),
            Token::Eof => "end of input".to_string(),
        }
    }

    /// Constructs a [`GenError::Parse`] naming the current token and up to five
    /// sorted expected alternatives, plus the offending source line (§4.1, §6).
    fn error_unexpected(&self, expected: &[&str]) -> GenError {
        let tok = self.current();
        let mut names: Vec<&str> = expected.to_vec();
        names.sort_unstable();
        names.dedup();
        let mut list = names
            .iter()
            .take(5)
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        if names.len() > 5 {
            list.push_str(", ...");
        }
        GenError::Parse(ParseError {
            message: format!(
                "Unexpected token {}, expected one of: {list}",
                Self::token_description(&tok.token)
            ),
            line: tok.line,
            column: tok.column,
            source_line: self.source_line(tok.line),
        })
    }

    fn error_message(&self, message: impl Into<String>) -> GenError {
        let tok = self.current();
        GenError::Parse(ParseError {
            message: message.into(),
            line: tok.line,
            column: tok.column,
            source_line: self.source_line(tok.line),
        })
    }

    fn expect_eof(&mut self) -> Result<(), GenError> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(self.error_unexpected(&["<eof>"]))
        }
    }

    fn expect_token(&mut self, expected: &Token, name: &str) -> Result<(), GenError> {
        if &self.current().token == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error_unexpected(&[name]))
        }
    }

    fn peek_is_identifier(&self, text: &str) -> bool {
        matches!(&self.current().token, Token::Identifier(s) if s == text)
    }

    /// Consumes an identifier equal to `text`, or fails naming it as the sole
    /// expected alternative.
    fn expect_identifier(&mut self, text: &str) -> Result<(), GenError> {
        if self.peek_is_identifier(text) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_unexpected(&[text]))
        }
    }

    /// Consumes and returns any bare identifier's text.
    fn expect_any_identifier(&mut self, expected_desc: &[&str]) -> Result<String, GenError> {
        match self.current().token.clone() {
            Token::Identifier(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.error_unexpected(expected_desc)),
        }
    }

    fn expect_integer(&mut self) -> Result<u64, GenError> {
        match self.current().token {
            Token::Integer(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.error_unexpected(&["an integer"])),
        }
    }

    fn expect_pitch(&mut self) -> Result<Pitch, GenError> {
        match self.current().token {
            Token::Pitch {
                letter,
                accidental,
                octave,
            } => {
                self.advance();
                Ok(Pitch::new(letter, octave, accidental))
            }
            _ => Err(self.error_unexpected(&["a pitch"])),
        }
    }

    // ====================== Score ======================

    fn parse_score(&mut self) -> Result<Score, GenError> {
        self.expect_identifier("score")?;
        self.expect_token(&Token::LBrace, "'{'")?;

        let mut score = Score::empty();
        while !matches!(self.current().token, Token::RBrace) {
            match self.current().token.clone() {
                Token::Identifier(ref kw) if kw == "tempo" => {
                    score.tempo = Some(self.parse_tempo_mark()?);
                }
                Token::Identifier(ref kw) if kw == "time" => {
                    score.time_signature = Some(self.parse_time_signature()?);
                }
                Token::Identifier(ref kw) if kw == "key" => {
                    score.key_signature = Some(self.parse_key_signature()?);
                }
                Token::Identifier(ref kw) if kw == "staff" => {
                    score.staves.push(self.parse_staff()?);
                }
                _ => {
                    return Err(self.error_unexpected(&["tempo", "time", "key", "staff"]));
                }
            }
        }
        self.expect_token(&Token::RBrace, "'}'")?;
        log::debug!(
            "parsed score: {} staves, tempo={:?}, time={:?}",
            score.staves.len(),
            score.tempo,
            score.time_signature
        );
        Ok(score)
    }

    fn parse_tempo_mark(&mut self) -> Result<TempoMark, GenError> {
        self.expect_identifier("tempo")?;
        let bpm = self.expect_integer()? as u32;
        Ok(TempoMark { bpm })
    }

    fn parse_time_signature(&mut self) -> Result<TimeSignature, GenError> {
        self.expect_identifier("time")?;
        let numerator = self.expect_integer()? as u32;
        self.expect_token(&Token::Slash, "'/'")?;
        let denominator = self.expect_integer()? as u32;
        Ok(TimeSignature {
            numerator,
            denominator,
        })
    }

    /// `key <pitch-letter><accidental?> (major|minor)`. The root's accidental may
    /// arrive two ways: embedded in the identifier text for flats/naturals (the
    /// lexer greedily consumes `Db`/`Cbb`/`Cn` as one identifier since every
    /// character is alphabetic), or as trailing `Sharp` tokens for sharps/double
    /// sharps (`#` is punctuation, lexed separately from the letter).
    fn parse_key_signature(&mut self) -> Result<KeySignature, GenError> {
        self.expect_identifier("key")?;
        let root_text = self.expect_any_identifier(&["a key root, e.g. 'C' or 'Bb'"])?;
        let mut chars = root_text.chars();
        let letter_ch = chars
            .next()
            .ok_or_else(|| self.error_message("Empty key signature root"))?;
        let letter = NoteLetter::from_char(letter_ch)
            .ok_or_else(|| self.error_message(format!("Invalid key root letter '{letter_ch}'")))?;
        let suffix: String = chars.collect();

        let accidental = if suffix.is_empty() {
            let mut sharps = 0u8;
            while matches!(self.current().token, Token::Sharp) {
                self.advance();
                sharps += 1;
            }
            match sharps {
                0 => None,
                1 => Some(Accidental::Sharp),
                _ => Some(Accidental::DoubleSharp),
            }
        } else {
            Some(Accidental::from_str(&suffix).ok_or_else(|| {
                self.error_message(format!("Invalid key signature accidental '{suffix}'"))
            })?)
        };

        let mode_name = self.expect_any_identifier(&["major", "minor"])?;
        let mode = match mode_name.as_str() {
            "major" => Mode::Major,
            "minor" => Mode::Minor,
            _ => return Err(self.error_unexpected(&["major", "minor"])),
        };

        Ok(KeySignature {
            root: letter,
            accidental,
            mode,
        })
    }

    // ====================== Staff ======================

    fn parse_staff(&mut self) -> Result<Staff, GenError> {
        self.expect_identifier("staff")?;
        let identifier = self.expect_any_identifier(&["a staff identifier"])?;

        let instrument = if matches!(self.current().token, Token::Colon) {
            self.advance();
            Some(self.expect_any_identifier(&["an instrument name"])?)
        } else {
            None
        };

        self.expect_token(&Token::LBrace, "'{'")?;
        let mut contents = Vec::new();
        while !matches!(self.current().token, Token::RBrace) {
            contents.push(self.parse_staff_item()?);
        }
        self.expect_token(&Token::RBrace, "'}'")?;

        Ok(Staff {
            identifier,
            instrument,
            contents,
        })
    }

    fn parse_staff_item(&mut self) -> Result<StaffContent, GenError> {
        match self.current().token.clone() {
            Token::Identifier(ref kw) if kw == "voice" => {
                Ok(StaffContent::Voice(self.parse_voice()?))
            }
            Token::Identifier(ref kw) if kw == "measure" => {
                Ok(StaffContent::Measure(self.parse_measure()?))
            }
            Token::Identifier(ref kw) if kw == "tempo" => Ok(StaffContent::Directive(
                StaffDirective::Tempo(self.parse_tempo_mark()?),
            )),
            Token::Identifier(ref kw) if kw == "time" => Ok(StaffContent::Directive(
                StaffDirective::Time(self.parse_time_signature()?),
            )),
            Token::Identifier(ref kw) if kw == "key" => Ok(StaffContent::Directive(
                StaffDirective::Key(self.parse_key_signature()?),
            )),
            _ => Err(self.error_unexpected(&["voice", "measure", "tempo", "time", "key"])),
        }
    }

    // ====================== Voice ======================

    fn parse_voice(&mut self) -> Result<Voice, GenError> {
        self.expect_identifier("voice")?;
        let number = self.expect_integer()? as u32;
        self.expect_token(&Token::LBrace, "'{'")?;
        let mut measures = Vec::new();
        while !matches!(self.current().token, Token::RBrace) {
            measures.push(self.parse_measure()?);
        }
        self.expect_token(&Token::RBrace, "'}'")?;
        Ok(Voice { number, measures })
    }

    // ====================== Measure ======================

    fn parse_measure(&mut self) -> Result<Measure, GenError> {
        let location = self.location();
        self.expect_identifier("measure")?;
        let number = if let Token::Integer(n) = self.current().token {
            self.advance();
            Some(n as u32)
        } else {
            None
        };
        self.expect_token(&Token::LBrace, "'{'")?;
        let mut contents = Vec::new();
        while !matches!(self.current().token, Token::RBrace) {
            contents.push(self.parse_measure_content()?);
        }
        self.expect_token(&Token::RBrace, "'}'")?;
        Ok(Measure {
            number,
            contents,
            location,
        })
    }

    fn parse_measure_content(&mut self) -> Result<MeasureContent, GenError> {
        if self.peek_is_identifier("voice") {
            self.advance();
            let number = self.expect_integer()? as u32;
            self.expect_token(&Token::LBrace, "'{'")?;
            let mut items = Vec::new();
            while !matches!(self.current().token, Token::RBrace) {
                items.push(self.parse_measure_item()?);
            }
            self.expect_token(&Token::RBrace, "'}'")?;
            return Ok(MeasureContent::VoiceBlock(number, items));
        }
        Ok(MeasureContent::Item(self.parse_measure_item()?))
    }

    fn parse_measure_item(&mut self) -> Result<MeasureItem, GenError> {
        match self.current().token.clone() {
            Token::Pitch { .. } => Ok(MeasureItem::Note(self.parse_note(Vec::new())?)),
            Token::LAngle => Ok(MeasureItem::Chord(self.parse_chord()?)),
            Token::Identifier(ref kw) if kw == "rest" => Ok(MeasureItem::Rest(self.parse_rest()?)),
            Token::Identifier(ref kw) if kw == "tuplet" => {
                Ok(MeasureItem::Tuplet(self.parse_tuplet()?))
            }
            Token::Identifier(ref kw) if kw == "slur" => Ok(MeasureItem::Slur(self.parse_slur()?)),
            Token::Identifier(ref kw) if kw == "grace" => {
                let graces = self.parse_grace_notes()?;
                Ok(MeasureItem::Note(self.parse_note(graces)?))
            }
            Token::Identifier(ref kw) if PEDAL_NAMES.contains(&kw.as_str()) => {
                Ok(MeasureItem::Pedal(self.parse_pedal()?))
            }
            Token::Identifier(ref kw) if kw == "instrument" => {
                Ok(MeasureItem::InstrumentChange(self.parse_instrument_change()?))
            }
            Token::Identifier(ref kw) if kw == "tempo" => {
                Ok(MeasureItem::TempoMark(self.parse_tempo_mark()?))
            }
            Token::Identifier(ref kw) if kw == "time" => {
                Ok(MeasureItem::TimeSignature(self.parse_time_signature()?))
            }
            Token::Identifier(ref kw) if kw == "hairpin" => {
                Ok(MeasureItem::Hairpin(self.parse_hairpin()?))
            }
            Token::Identifier(ref kw) if DynamicMark::from_name(kw).is_some() => {
                Ok(MeasureItem::Dynamic(self.parse_dynamic()?))
            }
            _ => Err(self.error_unexpected(&[
                "a pitch", "'<'", "rest", "tuplet", "slur", "grace", "ped", "instrument", "tempo",
                "time", "hairpin", "a dynamic marking",
            ])),
        }
    }

    // ====================== Notes, chords, rests ======================

    fn parse_grace_notes(&mut self) -> Result<Vec<GraceNote>, GenError> {
        let mut graces = Vec::new();
        while self.peek_is_identifier("grace") {
            self.advance();
            graces.push(GraceNote {
                pitch: self.expect_pitch()?,
            });
        }
        Ok(graces)
    }

    fn parse_duration(&mut self) -> Result<Duration, GenError> {
        let name = self.expect_any_identifier(&["a duration name (w, h, q, e, s, t, x)"])?;
        let base = Duration::named(&name, 0)
            .ok_or_else(|| self.error_message(format!("Unknown duration name '{name}'")))?
            .base;
        let mut dots = 0u8;
        while matches!(self.current().token, Token::Dot) {
            self.advance();
            dots += 1;
        }
        Ok(Duration::new(base, dots))
    }

    /// Consumes zero or more articulations/ornaments, in any order, followed by
    /// an optional trailing `tie` keyword — matching the Note/Chord grammar's
    /// `<articulation>* (tie)?` tail.
    fn parse_note_suffix(
        &mut self,
    ) -> Result<(Vec<Articulation>, Vec<Ornament>, bool), GenError> {
        let mut articulations = Vec::new();
        let mut ornaments = Vec::new();
        let mut tied = false;
        loop {
            let name = match &self.current().token {
                Token::Identifier(s) => s.clone(),
                _ => break,
            };
            if ARTICULATION_NAMES.contains(&name.as_str()) {
                self.advance();
                articulations.push(Articulation::from_name(&name));
            } else if name == "trill" {
                self.advance();
                let auxiliary = if matches!(self.current().token, Token::Pitch { .. }) {
                    Some(self.expect_pitch()?)
                } else {
                    None
                };
                ornaments.push(Ornament::Trill { auxiliary });
            } else if name == "mordent" {
                self.advance();
                ornaments.push(Ornament::Mordent);
            } else if name == "turn" {
                self.advance();
                ornaments.push(Ornament::Turn);
            } else if name == "tie" {
                self.advance();
                tied = true;
            } else {
                break;
            }
        }
        Ok((articulations, ornaments, tied))
    }

    fn parse_note(&mut self, grace_notes: Vec<GraceNote>) -> Result<Note, GenError> {
        let location = self.location();
        let pitch = self.expect_pitch()?;
        let duration = self.parse_duration()?;
        let (articulations, ornaments, tied) = self.parse_note_suffix()?;
        Ok(Note {
            pitch,
            duration,
            articulations,
            ornaments,
            tied,
            grace_notes,
            location,
        })
    }

    fn parse_chord(&mut self) -> Result<Chord, GenError> {
        let location = self.location();
        self.expect_token(&Token::LAngle, "'<'")?;
        let mut pitches = vec![self.expect_pitch()?];
        while matches!(self.current().token, Token::Comma) {
            self.advance();
            pitches.push(self.expect_pitch()?);
        }
        self.expect_token(&Token::RAngle, "'>'")?;
        let duration = self.parse_duration()?;
        let (articulations, ornaments, tied) = self.parse_note_suffix()?;
        Ok(Chord {
            pitches,
            duration,
            articulations,
            ornaments,
            tied,
            location,
        })
    }

    fn parse_rest(&mut self) -> Result<Rest, GenError> {
        let location = self.location();
        self.expect_identifier("rest")?;
        let duration = self.parse_duration()?;
        Ok(Rest { duration, location })
    }

    fn parse_tuplet(&mut self) -> Result<Tuplet, GenError> {
        let location = self.location();
        self.expect_identifier("tuplet")?;
        let actual = self.expect_integer()? as u32;
        self.expect_identifier("in")?;
        let normal = self.expect_integer()? as u32;
        self.expect_token(&Token::LBrace, "'{'")?;
        let mut contents = Vec::new();
        while !matches!(self.current().token, Token::RBrace) {
            contents.push(self.parse_measure_item()?);
        }
        self.expect_token(&Token::RBrace, "'}'")?;
        Ok(Tuplet {
            actual,
            normal,
            contents,
            location,
        })
    }

    fn parse_slur(&mut self) -> Result<Slur, GenError> {
        let location = self.location();
        self.expect_identifier("slur")?;
        self.expect_token(&Token::LBrace, "'{'")?;
        let mut contents = Vec::new();
        while !matches!(self.current().token, Token::RBrace) {
            contents.push(self.parse_measure_item()?);
        }
        self.expect_token(&Token::RBrace, "'}'")?;
        Ok(Slur { contents, location })
    }

    fn parse_dynamic(&mut self) -> Result<Dynamic, GenError> {
        let location = self.location();
        let name = self.expect_any_identifier(&["a dynamic marking"])?;
        let marking = DynamicMark::from_name(&name)
            .ok_or_else(|| self.error_message(format!("Unknown dynamic marking '{name}'")))?;
        Ok(Dynamic { marking, location })
    }

    fn parse_hairpin(&mut self) -> Result<Hairpin, GenError> {
        let location = self.location();
        self.expect_identifier("hairpin")?;
        let kind_name = self.expect_any_identifier(&["cresc", "decresc", "dim"])?;
        let kind = hairpin_kind(&kind_name)
            .ok_or_else(|| self.error_message(format!("Unknown hairpin kind '{kind_name}'")))?;
        let numerator = self.expect_integer()? as i64;
        let duration = if matches!(self.current().token, Token::Slash) {
            self.advance();
            let denominator = self.expect_integer()? as i64;
            r(numerator, denominator)
        } else {
            r(numerator, 1)
        };
        Ok(Hairpin {
            kind,
            duration,
            location,
        })
    }

    fn parse_pedal(&mut self) -> Result<Pedal, GenError> {
        let location = self.location();
        let name = self.expect_any_identifier(PEDAL_NAMES)?;
        let kind = pedal_kind(&name)
            .ok_or_else(|| self.error_message(format!("Unknown pedal marker '{name}'")))?;
        Ok(Pedal { kind, location })
    }

    fn parse_instrument_change(&mut self) -> Result<InstrumentChange, GenError> {
        let location = self.location();
        self.expect_identifier("instrument")?;
        let instrument = self.expect_any_identifier(&["an instrument name"])?;
        Ok(InstrumentChange {
            instrument,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_scaffold() {
        let score = parse(
            "score { tempo 120 time 4/4 staff piano { voice 1 { measure { C4 q D4 q E4 q F4 q } } } }",
        )
        .unwrap();
        assert_eq!(score.tempo, Some(TempoMark { bpm: 120 }));
        assert_eq!(
            score.time_signature,
            Some(TimeSignature {
                numerator: 4,
                denominator: 4
            })
        );
        assert_eq!(score.staves.len(), 1);
        let staff = &score.staves[0];
        assert_eq!(staff.identifier, "piano");
        assert_eq!(staff.contents.len(), 1);
    }

    #[test]
    fn parses_staff_with_instrument_after_colon() {
        let score = parse("score { staff rh: flute { measure { rest w } } }").unwrap();
        assert_eq!(score.staves[0].identifier, "rh");
        assert_eq!(score.staves[0].instrument.as_deref(), Some("flute"));
    }

    #[test]
    fn parses_chord() {
        let score = parse("score { staff p { measure { <C4, E4, G4> w } } }").unwrap();
        let StaffContent::Measure(measure) = &score.staves[0].contents[0] else {
            panic!("expected bare measure");
        };
        let MeasureContent::Item(MeasureItem::Chord(chord)) = &measure.contents[0] else {
            panic!("expected chord");
        };
        assert_eq!(chord.pitches.len(), 3);
    }

    #[test]
    fn parses_tuplet_with_nested_contents() {
        let score = parse(
            "score { staff p { measure { tuplet 3 in 2 { C4 e D4 e E4 e } F4 q G4 h } } }",
        )
        .unwrap();
        let StaffContent::Measure(measure) = &score.staves[0].contents[0] else {
            panic!("expected bare measure");
        };
        let MeasureContent::Item(MeasureItem::Tuplet(tuplet)) = &measure.contents[0] else {
            panic!("expected tuplet");
        };
        assert_eq!(tuplet.actual, 3);
        assert_eq!(tuplet.normal, 2);
        assert_eq!(tuplet.contents.len(), 3);
    }

    #[test]
    fn parses_tie_and_dotted_duration() {
        let score = parse("score { staff p { measure { C4 q.. tie } } }").unwrap();
        let StaffContent::Measure(measure) = &score.staves[0].contents[0] else {
            panic!("expected bare measure");
        };
        let MeasureContent::Item(MeasureItem::Note(note)) = &measure.contents[0] else {
            panic!("expected note");
        };
        assert_eq!(note.duration.dots, 2);
        assert!(note.tied);
    }

    #[test]
    fn parses_voice_block_inside_measure() {
        let score = parse(
            "score { staff p { measure { voice 1 { C5 w } voice 2 { C4 w } } } }",
        )
        .unwrap();
        let StaffContent::Measure(measure) = &score.staves[0].contents[0] else {
            panic!("expected bare measure");
        };
        assert_eq!(measure.contents.len(), 2);
        assert!(matches!(measure.contents[0], MeasureContent::VoiceBlock(1, _)));
        assert!(matches!(measure.contents[1], MeasureContent::VoiceBlock(2, _)));
    }

    #[test]
    fn parses_key_signature_with_sharp_and_flat_roots() {
        let score = parse("score { key C# major staff p { measure { rest w } } }").unwrap();
        assert_eq!(
            score.key_signature,
            Some(KeySignature {
                root: NoteLetter::C,
                accidental: Some(Accidental::Sharp),
                mode: Mode::Major,
            })
        );

        let score = parse("score { key Bb minor staff p { measure { rest w } } }").unwrap();
        assert_eq!(
            score.key_signature,
            Some(KeySignature {
                root: NoteLetter::B,
                accidental: Some(Accidental::Flat),
                mode: Mode::Minor,
            })
        );
    }

    #[test]
    fn reports_line_and_column_on_parse_error() {
        let err = parse("score {\n  staff p { measure { C4 , } }\n}").unwrap_err();
        match err {
            GenError::Parse(e) => {
                assert_eq!(e.line, 2);
                assert!(e.message.contains("Unexpected token"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn parses_grace_notes_before_main_note() {
        let score = parse("score { staff p { measure { grace D4 grace E4 C4 q } } }").unwrap();
        let StaffContent::Measure(measure) = &score.staves[0].contents[0] else {
            panic!("expected bare measure");
        };
        let MeasureContent::Item(MeasureItem::Note(note)) = &measure.contents[0] else {
            panic!("expected note");
        };
        assert_eq!(note.grace_notes.len(), 2);
    }

    #[test]
    fn parses_pedal_and_hairpin_and_instrument_change() {
        let score = parse(
            "score { staff p { measure { ped mf hairpin cresc 1/2 instrument flute ped_up } } }",
        )
        .unwrap();
        let StaffContent::Measure(measure) = &score.staves[0].contents[0] else {
            panic!("expected bare measure");
        };
        assert_eq!(measure.contents.len(), 5);
    }
}
