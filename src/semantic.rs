//! # Semantic Analyzer
//!
//! Walks a parsed [`crate::ast::Score`] and checks the musical invariants spec'd in
//! §3/§4.2: measure-duration exactness, voice-block synchronization, tie pairing,
//! tuplet validity, the pedal state machine, dynamic/instrument validity, and
//! cross-measure voice-duration drift. The analyzer never mutates the AST; the
//! compiler never looks back at it.
//!
//! In strict mode the first error found aborts analysis immediately
//! ([`GenError::Semantic`]). In non-strict mode every error is collected into a
//! [`ValidationReport`] and only raised as [`GenError::Validation`] once the whole
//! score has been walked.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::{GenError, SemanticError, ValidationReport};
use crate::rational::{zero, Rational};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TieKey {
    staff: String,
    voice: u32,
    midi: i32,
}

struct ValidationContext {
    strict: bool,
    time_signature: TimeSignature,
    tempo: Option<TempoMark>,
    key_signature: Option<KeySignature>,
    staff_id: String,
    voice_id: u32,
    measure_label: String,
    pending_ties: HashMap<TieKey, Pitch>,
    pedal_down: bool,
    voice_totals: HashMap<(String, u32), Rational>,
    staff_voice_count: HashMap<String, usize>,
    errors: Vec<SemanticError>,
    warnings: Vec<String>,
}

impl ValidationContext {
    fn new(strict: bool) -> Self {
        Self {
            strict,
            time_signature: TimeSignature {
                numerator: 4,
                denominator: 4,
            },
            tempo: None,
            key_signature: None,
            staff_id: String::new(),
            voice_id: 1,
            measure_label: String::new(),
            pending_ties: HashMap::new(),
            pedal_down: false,
            voice_totals: HashMap::new(),
            staff_voice_count: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn location(&self) -> String {
        format!(
            "staff '{}', voice {}, measure {}",
            self.staff_id, self.voice_id, self.measure_label
        )
    }

    /// Records an error. In strict mode this aborts analysis on the spot; in
    /// non-strict mode it accumulates into `self.errors` and analysis continues.
    fn record_error(&mut self, error: SemanticError) -> Result<(), GenError> {
        if self.strict {
            return Err(GenError::Semantic(error));
        }
        self.errors.push(error);
        Ok(())
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Analyzes a score for semantic correctness (§4.2).
///
/// ```
/// use clef::{parser::parse, semantic::analyze};
///
/// let score = parse("score { time 4/4 staff p { measure { C4 q D4 q E4 q F4 q } } }").unwrap();
/// let report = analyze(&score, false).unwrap();
/// assert!(report.errors.is_empty());
/// ```
pub fn analyze(score: &Score, strict: bool) -> Result<ValidationReport, GenError> {
    let mut ctx = ValidationContext::new(strict);

    if let Some(ts) = score.time_signature {
        ctx.time_signature = ts;
    }
    ctx.tempo = score.tempo;
    ctx.key_signature = score.key_signature;

    for staff in &score.staves {
        analyze_staff(&mut ctx, staff)?;
    }

    let mut residual: Vec<_> = ctx.pending_ties.drain().collect();
    residual.sort_by(|a, b| (&a.0.staff, a.0.voice, a.0.midi).cmp(&(&b.0.staff, b.0.voice, b.0.midi)));
    for (key, pitch) in residual {
        let error = SemanticError::new(format!("Unresolved tie on {pitch:?}"))
            .at(format!("staff '{}', voice {}", key.staff, key.voice));
        if ctx.strict {
            return Err(GenError::Semantic(error));
        }
        ctx.errors.push(error);
    }

    check_voice_alignment(&mut ctx);

    let report = ValidationReport {
        errors: ctx.errors,
        warnings: ctx.warnings,
        final_tempo: ctx.tempo.map(|t| t.bpm),
        final_time_signature: Some((ctx.time_signature.numerator, ctx.time_signature.denominator)),
        final_key_signature: ctx.key_signature,
    };

    if !report.errors.is_empty() {
        return Err(GenError::Validation(report));
    }
    Ok(report)
}

fn analyze_staff(ctx: &mut ValidationContext, staff: &Staff) -> Result<(), GenError> {
    ctx.staff_id = staff.identifier.clone();

    if let Some(instrument) = &staff.instrument {
        check_instrument(ctx, instrument);
    }

    let mut voice_count = 0usize;
    let mut direct_measures = Vec::new();
    for content in &staff.contents {
        match content {
            StaffContent::Voice(voice) => {
                voice_count += 1;
                analyze_voice(ctx, voice)?;
            }
            StaffContent::Measure(measure) => direct_measures.push(measure),
            StaffContent::Directive(StaffDirective::Tempo(t)) => ctx.tempo = Some(*t),
            StaffContent::Directive(StaffDirective::Time(t)) => ctx.time_signature = *t,
            StaffContent::Directive(StaffDirective::Key(k)) => ctx.key_signature = Some(*k),
        }
    }
    ctx.staff_voice_count.insert(staff.identifier.clone(), voice_count);

    if !direct_measures.is_empty() {
        ctx.voice_id = 1;
        let mut total = zero();
        for (i, measure) in direct_measures.into_iter().enumerate() {
            ctx.measure_label = measure
                .number
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("#{}", i + 1));
            total = total + analyze_measure(ctx, measure)?;
        }
        ctx.voice_totals
            .insert((ctx.staff_id.clone(), ctx.voice_id), total);
    }

    Ok(())
}

fn analyze_voice(ctx: &mut ValidationContext, voice: &Voice) -> Result<(), GenError> {
    ctx.voice_id = voice.number;
    let mut total = zero();
    for (i, measure) in voice.measures.iter().enumerate() {
        ctx.measure_label = measure
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("#{}", i + 1));
        total = total + analyze_measure(ctx, measure)?;
    }
    ctx.voice_totals
        .insert((ctx.staff_id.clone(), ctx.voice_id), total);
    Ok(())
}

/// Validates one measure and returns its total duration (the synchronized voice
/// total, if the measure holds voice blocks; otherwise the flat sum).
fn analyze_measure(ctx: &mut ValidationContext, measure: &Measure) -> Result<Rational, GenError> {
    let mut voice_blocks: Vec<(u32, &[MeasureItem])> = Vec::new();
    let mut other_items: Vec<&MeasureItem> = Vec::new();
    for content in &measure.contents {
        match content {
            MeasureContent::VoiceBlock(number, items) => {
                voice_blocks.push((*number, items.as_slice()))
            }
            MeasureContent::Item(item) => other_items.push(item),
        }
    }

    if voice_blocks.is_empty() {
        return analyze_item_sequence(ctx, &other_items);
    }

    if !other_items.is_empty() {
        ctx.record_error(
            SemanticError::new("measure mixes voice blocks with free items; a voice-block measure must contain only voice blocks")
                .at(ctx.location()),
        )?;
    }

    voice_blocks.sort_by_key(|(number, _)| *number);
    let expected = ctx.time_signature.beats_per_measure();
    let saved_voice = ctx.voice_id;

    let mut totals: Vec<(u32, Rational)> = Vec::new();
    for (voice_num, items) in &voice_blocks {
        ctx.voice_id = *voice_num;
        let refs: Vec<&MeasureItem> = items.iter().collect();
        let total = analyze_item_sequence(ctx, &refs)?;
        totals.push((*voice_num, total));
    }
    ctx.voice_id = saved_voice;

    if let Some((first_voice, first_total)) = totals.first().cloned() {
        for (voice_num, total) in &totals[1..] {
            if *total != first_total {
                ctx.record_error(
                    SemanticError::new(format!(
                        "voice {voice_num} has duration {total} but voice {first_voice} has duration {first_total}; synchronized voices must share one total"
                    ))
                    .at(ctx.location()),
                )?;
            }
        }
        if first_total != expected {
            ctx.record_error(
                SemanticError::new(format!(
                    "measure has synchronized voice duration {first_total} but time signature requires {expected}"
                ))
                .at(ctx.location()),
            )?;
        }
    }

    for item in other_items {
        match item {
            MeasureItem::Pedal(p) => check_pedal(ctx, p)?,
            MeasureItem::Dynamic(d) => check_dynamic(d),
            MeasureItem::InstrumentChange(ic) => check_instrument(ctx, &ic.instrument),
            MeasureItem::TimeSignature(ts) => ctx.time_signature = *ts,
            MeasureItem::TempoMark(t) => ctx.tempo = Some(*t),
            _ => {}
        }
    }

    Ok(totals.into_iter().map(|(_, t)| t).next().unwrap_or_else(zero))
}

/// Walks a flat (non-voice-block) sequence of measure items, checking each
/// segment's accumulated duration against the time signature active for that
/// segment. A mid-sequence [`MeasureItem::TimeSignature`] closes the current
/// segment and opens a new one under the new signature — "resets the expected
/// remainder for the measure tail" (spec.md §4.2).
fn analyze_item_sequence(
    ctx: &mut ValidationContext,
    items: &[&MeasureItem],
) -> Result<Rational, GenError> {
    let mut segment_total = zero();
    let mut expected = ctx.time_signature.beats_per_measure();
    let mut grand_total = zero();

    for item in items {
        match item {
            MeasureItem::TimeSignature(ts) => {
                // A time signature seen mid-sequence resets the tail: only the segment
                // that closes the sequence (whichever signature is active then) is
                // checked against its expected duration, not the partial span before
                // the change.
                grand_total = grand_total + &segment_total;
                ctx.time_signature = *ts;
                expected = ctx.time_signature.beats_per_measure();
                segment_total = zero();
            }
            MeasureItem::TempoMark(t) => ctx.tempo = Some(*t),
            MeasureItem::Dynamic(d) => check_dynamic(d),
            MeasureItem::Pedal(p) => check_pedal(ctx, p)?,
            MeasureItem::InstrumentChange(ic) => check_instrument(ctx, &ic.instrument),
            MeasureItem::Note(note) => {
                segment_total = segment_total + note_duration(ctx, note, &crate::rational::one())?;
            }
            MeasureItem::Chord(chord) => {
                segment_total = segment_total + chord_duration(ctx, chord, &crate::rational::one())?;
            }
            MeasureItem::Rest(rest) => {
                segment_total = segment_total + rest.duration.total_value();
            }
            MeasureItem::Tuplet(tuplet) => {
                segment_total = segment_total + analyze_tuplet(ctx, tuplet)?;
            }
            MeasureItem::Slur(slur) => {
                segment_total = segment_total + analyze_slur(ctx, slur)?;
            }
        }
    }

    if segment_total != expected {
        ctx.record_error(
            SemanticError::new(format!(
                "measure has duration {segment_total} but time signature requires {expected}"
            ))
            .at(ctx.location()),
        )?;
    }
    grand_total = grand_total + segment_total;
    Ok(grand_total)
}

/// `Tuplet::ratio` divides `normal` by `actual`, which panics on a zero denominator.
/// In non-strict mode a nonpositive `actual` is only recorded as an error (analysis
/// keeps walking), so callers must use this instead of `tuplet.ratio()` directly —
/// it substitutes a no-op 1/1 ratio once `actual == 0` has already been reported,
/// rather than crashing the analyzer on malformed input.
fn safe_tuplet_ratio(tuplet: &Tuplet) -> Rational {
    if tuplet.actual == 0 {
        crate::rational::one()
    } else {
        tuplet.ratio()
    }
}

fn analyze_tuplet(ctx: &mut ValidationContext, tuplet: &Tuplet) -> Result<Rational, GenError> {
    if tuplet.actual == 0 {
        ctx.record_error(
            SemanticError::new(format!("tuplet 'actual' count must be positive, got {}", tuplet.actual))
                .at(ctx.location()),
        )?;
    }
    if tuplet.normal == 0 {
        ctx.record_error(
            SemanticError::new(format!("tuplet 'normal' count must be positive, got {}", tuplet.normal))
                .at(ctx.location()),
        )?;
    }
    if tuplet.contents.is_empty() {
        ctx.record_error(SemanticError::new("tuplet cannot be empty").at(ctx.location()))?;
    }
    analyze_scaled_items(ctx, &tuplet.contents, &safe_tuplet_ratio(tuplet))
}

fn analyze_slur(ctx: &mut ValidationContext, slur: &Slur) -> Result<Rational, GenError> {
    if slur.contents.is_empty() {
        ctx.warn(format!("empty slur has no effect at {}", ctx.location()));
    }
    analyze_scaled_items(ctx, &slur.contents, &crate::rational::one())
}

/// Accumulates duration for items nested inside a tuplet or slur, recursing
/// through further nesting and multiplying tuplet ratios down (§4.3 "tuplets
/// nest multiplicatively"). Non-durational items are still checked but
/// contribute no time, matching the top-level sequence walk.
fn analyze_scaled_items(
    ctx: &mut ValidationContext,
    items: &[MeasureItem],
    ratio: &Rational,
) -> Result<Rational, GenError> {
    let mut total = zero();
    for item in items {
        total = total
            + match item {
                MeasureItem::Note(note) => note_duration(ctx, note, ratio)?,
                MeasureItem::Chord(chord) => chord_duration(ctx, chord, ratio)?,
                MeasureItem::Rest(rest) => rest.duration.total_value() * ratio,
                MeasureItem::Tuplet(inner) => {
                    if inner.actual == 0 {
                        ctx.record_error(
                            SemanticError::new(format!(
                                "tuplet 'actual' count must be positive, got {}",
                                inner.actual
                            ))
                            .at(ctx.location()),
                        )?;
                    }
                    if inner.normal == 0 {
                        ctx.record_error(
                            SemanticError::new(format!(
                                "tuplet 'normal' count must be positive, got {}",
                                inner.normal
                            ))
                            .at(ctx.location()),
                        )?;
                    }
                    if inner.contents.is_empty() {
                        ctx.record_error(
                            SemanticError::new("tuplet cannot be empty").at(ctx.location()),
                        )?;
                    }
                    analyze_scaled_items(ctx, &inner.contents, &(safe_tuplet_ratio(inner) * ratio))?
                }
                MeasureItem::Slur(inner) => analyze_scaled_items(ctx, &inner.contents, ratio)?,
                MeasureItem::Dynamic(d) => {
                    check_dynamic(d);
                    zero()
                }
                MeasureItem::Pedal(p) => {
                    check_pedal(ctx, p)?;
                    zero()
                }
                MeasureItem::InstrumentChange(ic) => {
                    check_instrument(ctx, &ic.instrument);
                    zero()
                }
                MeasureItem::TempoMark(t) => {
                    ctx.tempo = Some(*t);
                    zero()
                }
                MeasureItem::TimeSignature(_) => zero(),
            };
    }
    Ok(total)
}

fn note_duration(ctx: &mut ValidationContext, note: &Note, ratio: &Rational) -> Result<Rational, GenError> {
    let duration = note.duration.total_value() * ratio;
    handle_tie(ctx, note.pitch, note.tied)?;
    Ok(duration)
}

fn chord_duration(ctx: &mut ValidationContext, chord: &Chord, ratio: &Rational) -> Result<Rational, GenError> {
    let duration = chord.duration.total_value() * ratio;
    for pitch in &chord.pitches {
        handle_tie(ctx, *pitch, chord.tied)?;
    }
    Ok(duration)
}

/// Resolves a pending tie if `pitch`'s MIDI number is already pending in this
/// `(staff, voice)`, rejecting an enharmonic mismatch; otherwise, if this
/// event is itself tied-forward, opens a new pending entry (§4.2, §9).
fn handle_tie(ctx: &mut ValidationContext, pitch: Pitch, tied: bool) -> Result<(), GenError> {
    let key = TieKey {
        staff: ctx.staff_id.clone(),
        voice: ctx.voice_id,
        midi: pitch.midi(),
    };
    if let Some(expected) = ctx.pending_ties.remove(&key) {
        if !pitch.enharmonic_equal(&expected) {
            let error = SemanticError::new(format!(
                "tie resolution failed: expected {expected:?} but got {pitch:?}"
            ))
            .at(ctx.location());
            ctx.record_error(error)?;
        }
        if tied {
            ctx.pending_ties.insert(key, pitch);
        }
    } else if tied {
        ctx.pending_ties.insert(key, pitch);
    }
    Ok(())
}

/// Always true by construction: [`DynamicMark`] is a closed enum populated only
/// by [`DynamicMark::from_name`], so an AST built by this crate's own parser can
/// never carry an unrecognized marking. Kept as an explicit check per spec.md
/// §3/§4.2 in case a future producer constructs the AST some other way.
fn check_dynamic(_dynamic: &Dynamic) {}

fn check_pedal(ctx: &mut ValidationContext, pedal: &Pedal) -> Result<(), GenError> {
    match pedal.kind {
        PedalKind::Down => {
            if ctx.pedal_down {
                ctx.warn(format!("pedal pressed while already down at {}", ctx.location()));
            }
            ctx.pedal_down = true;
        }
        PedalKind::Up => {
            if !ctx.pedal_down {
                ctx.record_error(
                    SemanticError::new("pedal released but was not down").at(ctx.location()),
                )?;
            } else {
                ctx.pedal_down = false;
            }
        }
        PedalKind::Change => ctx.pedal_down = true,
    }
    Ok(())
}

fn check_instrument(ctx: &mut ValidationContext, instrument: &str) {
    if crate::compiler::gm_program(instrument).is_none() {
        ctx.warn(format!(
            "unknown instrument '{instrument}' on staff '{}' — will use default piano sound",
            ctx.staff_id
        ));
    }
}

/// Warns (never errors — composers may deliberately stagger voices) when sibling
/// voices in the same staff accumulate different total durations across all their
/// measures.
fn check_voice_alignment(ctx: &mut ValidationContext) {
    let mut by_staff: HashMap<&str, Vec<(&u32, &Rational)>> = HashMap::new();
    for ((staff, voice), total) in &ctx.voice_totals {
        if ctx.staff_voice_count.get(staff).copied().unwrap_or(0) > 1 {
            by_staff.entry(staff.as_str()).or_default().push((voice, total));
        }
    }
    for (staff, mut totals) in by_staff {
        totals.sort_by_key(|(v, _)| **v);
        if let Some((_, first)) = totals.first() {
            if totals.iter().any(|(_, t)| t != first) {
                ctx.warnings.push(format!(
                    "voices in staff '{staff}' have different total durations across the score"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn valid_measure_passes() {
        let score = parse(
            "score { time 4/4 staff p { measure { C4 q D4 q E4 q F4 q } } }",
        )
        .unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
    }

    #[test]
    fn short_measure_is_an_error() {
        let score = parse("score { time 4/4 staff p { measure { C4 q D4 q } } }").unwrap();
        let err = analyze(&score, true).unwrap_err();
        assert!(matches!(err, GenError::Semantic(_)));
    }

    #[test]
    fn non_strict_mode_collects_all_errors() {
        let score = parse(
            "score { time 4/4 staff p { measure { C4 q } measure { D4 q } } }",
        )
        .unwrap();
        let err = analyze(&score, false).unwrap_err();
        match err {
            GenError::Validation(report) => assert_eq!(report.errors.len(), 2),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn triplet_measure_is_exact() {
        let score = parse(
            "score { time 4/4 staff p { measure { tuplet 3 in 2 { C4 e D4 e E4 e } F4 q G4 h } } }",
        )
        .unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
    }

    #[test]
    fn synchronized_voice_blocks_pass() {
        let score = parse(
            "score { time 4/4 staff p { measure { voice 1 { C5 w } voice 2 { C4 h D4 h } } } }",
        )
        .unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
    }

    #[test]
    fn unsynchronized_voice_blocks_are_an_error() {
        let score = parse(
            "score { time 4/4 staff p { measure { voice 1 { C5 h } voice 2 { C4 w } } } }",
        )
        .unwrap();
        let err = analyze(&score, true).unwrap_err();
        assert!(matches!(err, GenError::Semantic(_)));
    }

    #[test]
    fn tie_across_measures_resolves() {
        let score = parse(
            "score { time 4/4 staff p { measure { C4 h tie rest h } measure { C4 h rest h } } }",
        )
        .unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
    }

    #[test]
    fn unresolved_tie_is_an_error() {
        let score = parse(
            "score { time 4/4 staff p { measure { C4 w tie } } }",
        )
        .unwrap();
        let err = analyze(&score, false).unwrap_err();
        match err {
            GenError::Validation(report) => {
                assert!(report.errors.iter().any(|e| e.message.contains("Unresolved tie")));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn enharmonic_mismatch_tie_is_rejected() {
        let score = parse(
            "score { time 4/4 staff p { measure { C#4 w tie } measure { Db4 w } } }",
        )
        .unwrap();
        let err = analyze(&score, false).unwrap_err();
        match err {
            GenError::Validation(report) => {
                assert!(report.errors.iter().any(|e| e.message.contains("tie resolution failed")));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn empty_tuplet_is_an_error() {
        let score = parse("score { time 4/4 staff p { measure { tuplet 3 in 2 { } C4 w } } }").unwrap();
        let err = analyze(&score, false).unwrap_err();
        match err {
            GenError::Validation(report) => {
                assert!(report.errors.iter().any(|e| e.message.contains("tuplet cannot be empty")));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn pedal_up_without_down_is_an_error() {
        let score = parse("score { time 4/4 staff p { measure { ped_up C4 w } } }").unwrap();
        let err = analyze(&score, true).unwrap_err();
        assert!(matches!(err, GenError::Semantic(_)));
    }

    #[test]
    fn redundant_pedal_down_is_a_warning_not_an_error() {
        let score = parse("score { time 4/4 staff p { measure { ped ped C4 w } } }").unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("already down")));
    }

    #[test]
    fn pedal_change_is_always_valid() {
        let score = parse("score { time 4/4 staff p { measure { ped_change C4 w } } }").unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
    }

    #[test]
    fn unknown_instrument_is_a_warning_not_an_error() {
        let score = parse("score { time 4/4 staff p: kazoo { measure { C4 w } } }").unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("kazoo")));
    }

    #[test]
    fn mid_measure_time_signature_change_resets_expected_remainder() {
        let score = parse(
            "score { time 4/4 staff p { measure { C4 h time 3/4 D4 h. } } }",
        )
        .unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
    }

    #[test]
    fn staggered_sibling_voices_warn_but_do_not_error() {
        let score = parse(
            "score { time 4/4 staff p { voice 1 { measure { C5 w } } voice 2 { measure { C4 h rest h } measure { D4 w } } } }",
        )
        .unwrap();
        let report = analyze(&score, false).unwrap();
        assert!(report.errors.is_empty());
        assert!(report.warnings.iter().any(|w| w.contains("different total durations")));
    }
}
