//! Integration tests for the Clef compiler.
//!
//! Exercises the public `parse`/`analyze`/`compile` surface end-to-end against literal
//! scores, mirroring scenarios S1-S6 from the language specification.

use clef::rational::r;
use clef::{analyze, compile, compile_source, compile_source_strict, parse, Event, GenError};

/// S1 — Basic timing: four quarter notes in 4/4 land on 0, 1/4, 2/4, 3/4 with the
/// right MIDI numbers.
#[test]
fn s1_basic_timing() {
    let graph = compile_source(
        "score { tempo 120 time 4/4 staff piano { measure { C4 q D4 q E4 q F4 q } } }",
    )
    .unwrap();

    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes.len(), 4);

    let expected_starts = [r(0, 1), r(1, 4), r(2, 4), r(3, 4)];
    let expected_midis = [60, 62, 64, 65];
    for (i, note) in notes.iter().enumerate() {
        assert_eq!(note.start_time, expected_starts[i], "note {i} start time");
        assert_eq!(note.midi_note, expected_midis[i], "note {i} midi");
        assert_eq!(note.nominal_duration, r(1, 4), "note {i} duration");
    }
}

/// S2 — Triplet exactness: a `3 in 2` eighth-note triplet divides a quarter note into
/// three exact twelfths, followed by an untouched quarter and half note.
#[test]
fn s2_triplet_exactness() {
    let graph = compile_source(
        "score { tempo 120 time 4/4 staff piano { measure { tuplet 3 in 2 { C4 e D4 e E4 e } F4 q G4 h } } }",
    )
    .unwrap();

    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes.len(), 5);

    for (i, expected_start) in [r(0, 12), r(1, 12), r(2, 12)].into_iter().enumerate() {
        assert_eq!(notes[i].start_time, expected_start, "triplet note {i}");
        assert_eq!(notes[i].nominal_duration, r(1, 12));
    }

    assert_eq!(notes[3].start_time, r(1, 4));
    assert_eq!(notes[3].nominal_duration, r(1, 4));
    assert_eq!(notes[4].start_time, r(1, 2));
    assert_eq!(notes[4].nominal_duration, r(1, 2));
}

/// S3 — Tie fusion: a half note tied across a barline to another half note fuses
/// into a single whole-note NoteEvent.
#[test]
fn s3_tie_fusion() {
    let graph =
        compile_source("score { time 4/4 staff piano { measure { C4 h tie } measure { C4 h } } }")
            .unwrap();

    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].midi_note, 60);
    assert_eq!(notes[0].start_time, r(0, 1));
    assert_eq!(notes[0].nominal_duration, r(1, 1));
}

/// S4 — Chord: three simultaneous pitches share one start time and duration.
#[test]
fn s4_chord() {
    let graph =
        compile_source("score { time 4/4 staff piano { measure { <C4, E4, G4> w } } }").unwrap();

    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes.len(), 3);
    for note in &notes {
        assert_eq!(note.start_time, r(0, 1));
        assert_eq!(note.nominal_duration, r(1, 1));
    }
    let mut midis: Vec<i32> = notes.iter().map(|n| n.midi_note).collect();
    midis.sort_unstable();
    assert_eq!(midis, vec![60, 64, 67]);
}

/// S5 — Polyphonic voices synchronize: two whole notes in separate voices of one
/// staff both start at time zero but keep distinct voice ids.
#[test]
fn s5_polyphonic_voices_synchronize() {
    let graph = compile_source(
        "score { time 4/4 staff piano { voice 1 { measure { C5 w } } voice 2 { measure { C4 w } } } }",
    )
    .unwrap();

    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|n| n.start_time == r(0, 1)));
    assert!(notes.iter().all(|n| n.nominal_duration == r(1, 1)));
    let mut voice_ids: Vec<u32> = notes.iter().map(|n| n.voice_id).collect();
    voice_ids.sort_unstable();
    assert_eq!(voice_ids, vec![1, 2]);
}

/// S6 — Invalid measure: a 4/4 measure with only two quarter notes is a semantic
/// error, and compilation never runs.
#[test]
fn s6_invalid_measure_is_rejected_before_compilation() {
    let score =
        parse("score { time 4/4 staff piano { measure { C4 q D4 q } } }").unwrap();

    let err = analyze(&score, true).unwrap_err();
    match err {
        GenError::Semantic(e) => assert!(e.message.contains("duration")),
        other => panic!("expected a semantic error, got {other:?}"),
    }

    let err = compile_source("score { time 4/4 staff piano { measure { C4 q D4 q } } }")
        .unwrap_err();
    assert!(matches!(err, GenError::Validation(_)));
}

/// Boundary: an empty score compiles to an empty graph of zero duration.
#[test]
fn empty_score_has_zero_duration() {
    let graph = compile_source("score { }").unwrap();
    assert_eq!(graph.len(), 0);
    assert_eq!(graph.duration(), r(0, 1));
}

/// Boundary: a single whole note has a graph duration of exactly one whole note.
#[test]
fn single_whole_note_has_duration_one() {
    let graph = compile_source("score { time 4/4 staff piano { measure { C4 w } } }").unwrap();
    assert_eq!(graph.duration(), r(1, 1));
}

/// Boundary: 64 consecutive sixteenth notes end at exactly 4 whole notes with no
/// rational drift, regardless of how many additions accumulated the total.
#[test]
fn sixty_four_sixteenths_end_without_drift() {
    let notes_src = "C4 s ".repeat(64);
    let source = format!(
        "score {{ time 4/4 staff piano {{ measure {{ {notes_src} }} }} }}"
    );
    // Sixteen sixteenth notes per bar in 4/4, so this is 4 full bars' worth of notes,
    // but stated as one flat sequence: the analyzer only checks whole-measure totals,
    // so we validate the raw compiled timeline directly instead of going through
    // `analyze`, which would reject a 16-beat sequence as a single 4/4 "measure".
    let score = parse(&source).unwrap();
    let graph = compile(&score);
    assert_eq!(graph.duration(), r(4, 1));
    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes.len(), 64);
    assert_eq!(notes[63].start_time, r(63, 16));
}

/// Boundary: a triple-dotted quarter note totals 15/32 of a whole note.
#[test]
fn triple_dotted_quarter_is_fifteen_thirty_seconds() {
    let graph = compile_source("score { time 15/32 staff piano { measure { C4 q... } } }")
        .unwrap();
    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes[0].nominal_duration, r(15, 32));
}

/// Nested tuplets multiply ratios: an outer `3 in 2` containing an inner `5 in 4`
/// yields a per-note factor of `(2/3)*(4/5) = 8/15` relative to the written value.
#[test]
fn nested_tuplets_multiply_ratios() {
    let graph = compile_source(
        "score { time 4/4 staff piano { measure { tuplet 3 in 2 { tuplet 5 in 4 { C4 q D4 q E4 q F4 q G4 q } D4 q E4 q } } } }",
    )
    .unwrap();
    let notes: Vec<_> = graph.note_events().collect();
    // Each inner-tuplet quarter note: (1/4) * (2/3) * (4/5) = 8/60 = 2/15.
    assert_eq!(notes[0].nominal_duration, r(2, 15));
}

/// Velocity propagates from the most recent dynamic marking to subsequent notes,
/// leaving already-emitted notes untouched.
#[test]
fn dynamic_marking_changes_velocity_for_subsequent_notes_only() {
    let graph = compile_source(
        "score { time 4/4 staff piano { measure { C4 q f D4 q pp E4 q F4 q } } }",
    )
    .unwrap();
    let notes: Vec<_> = graph.note_events().collect();
    assert_eq!(notes[0].velocity, 80); // default mf before any marking
    assert_eq!(notes[1].velocity, 96); // f
    assert_eq!(notes[2].velocity, 33); // pp
    assert_eq!(notes[3].velocity, 33); // still pp
}

/// Events sort by `(start_time, kind_priority)`: a tempo change at a given instant
/// always precedes notes starting at that same instant.
#[test]
fn events_sort_by_time_then_kind_priority() {
    // Uses `parse` + `compile` directly rather than `compile_source`: this measure's
    // duration isn't the point of the test, so it's left intentionally short of 4/4
    // (which `analyze` would otherwise reject).
    let score = parse(
        "score { tempo 120 time 4/4 staff piano { measure { C4 q tempo 90 D4 q } } }",
    )
    .unwrap();
    let graph = compile(&score);
    let at_quarter: Vec<&Event> = graph
        .iter()
        .filter(|e| *e.start_time() == r(1, 4))
        .collect();
    assert!(matches!(at_quarter[0], Event::Tempo(_)));
    assert!(matches!(at_quarter[1], Event::Note(_)));
}

/// Channel allocation is stable and skips channel 9 (reserved for percussion).
#[test]
fn channel_allocation_is_stable_and_skips_percussion_channel() {
    let source = "score { staff a: flute { measure { rest w } } staff b: violin { measure { rest w } } }";
    let graph1 = compile_source(source).unwrap();
    let graph2 = compile_source(source).unwrap();

    let channels = |g: &clef::EventGraph| -> Vec<u8> {
        g.iter()
            .filter_map(|e| match e {
                Event::ProgramChange(p) => Some(p.channel),
                _ => None,
            })
            .collect()
    };
    assert_eq!(channels(&graph1), channels(&graph2));
}

/// A parse error carries line, column and the offending source line.
#[test]
fn parse_error_reports_position() {
    let err = parse("score {\n  staff p { measure { C4 , } }\n}").unwrap_err();
    match err {
        GenError::Parse(e) => {
            assert_eq!(e.line, 2);
            assert!(e.source_line.contains("measure"));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

/// Strict-mode compilation aborts on the first semantic error instead of collecting
/// a full report.
#[test]
fn strict_compile_source_aborts_on_first_error() {
    let err = compile_source_strict("score { time 4/4 staff p { measure { ped_up C4 w } } }")
        .unwrap_err();
    assert!(matches!(err, GenError::Semantic(_)));
}
