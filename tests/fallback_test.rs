use attune_lib::schedule::{fallback_blocks, BlockDifficulty, BlockKind, FallbackInputs};
use attune_lib::schedule::fallback::{rest_length, session_length, work_difficulty};

fn inputs(daily_hours: f64, fatigue: f64, stress_score: f64, confidence: f64) -> FallbackInputs {
    FallbackInputs {
        daily_hours,
        fatigue,
        stress_score,
        confidence,
    }
}

#[test]
fn test_four_hour_reference_case() {
    let blocks = fallback_blocks(&inputs(4.0, 0.3, 0.1, 0.6), 8);

    assert!(blocks.len() <= 8);
    let work: Vec<_> = blocks.iter().filter(|b| b.kind == BlockKind::Work).collect();
    let rest: Vec<_> = blocks.iter().filter(|b| b.kind == BlockKind::Rest).collect();

    assert!(work.iter().all(|b| b.minutes == 60));
    assert!(rest.iter().all(|b| b.minutes == 10));
    assert!(work.iter().all(|b| b.difficulty == Some(BlockDifficulty::Hard)));
    assert!(rest.iter().all(|b| b.difficulty.is_none()));
    assert_eq!(work.iter().map(|b| b.minutes).sum::<u32>(), 240);

    let minutes: Vec<u32> = blocks.iter().map(|b| b.minutes).collect();
    assert_eq!(minutes, vec![60, 10, 60, 10, 60, 10, 60]);
}

#[test]
fn test_rest_does_not_draw_on_work_budget() {
    // 100 minutes at high fatigue: 30-minute sessions, 15-minute rests
    let blocks = fallback_blocks(&inputs(100.0 / 60.0, 0.7, 0.1, 0.9), 8);
    let work: u32 = blocks.iter().filter(|b| b.kind == BlockKind::Work).map(|b| b.minutes).sum();
    assert_eq!(work, 100);
    let minutes: Vec<u32> = blocks.iter().map(|b| b.minutes).collect();
    assert_eq!(minutes, vec![30, 15, 30, 15, 30, 10]);
}

#[test]
fn test_blocks_alternate() {
    let blocks = fallback_blocks(&inputs(3.0, 0.2, 0.5, 0.7), 8);
    for pair in blocks.windows(2) {
        assert_ne!(pair[0].kind, pair[1].kind);
    }
    assert_eq!(blocks[0].kind, BlockKind::Work);
}

#[test]
fn test_hard_cap_of_eight_blocks() {
    let blocks = fallback_blocks(&inputs(12.0, 0.8, 0.9, 0.2), 8);
    assert_eq!(blocks.len(), 8);
}

#[test]
fn test_no_rest_when_less_than_fifteen_minutes_remain() {
    // 70 minutes: 60 work leaves 10, below the rest threshold
    let blocks = fallback_blocks(&inputs(70.0 / 60.0, 0.1, 0.1, 0.9), 8);
    let minutes: Vec<u32> = blocks.iter().map(|b| b.minutes).collect();
    assert_eq!(minutes, vec![60, 10]);
    assert_eq!(blocks[1].kind, BlockKind::Work);
}

#[test]
fn test_length_rules() {
    assert_eq!(session_length(0.6, 0.0), 30);
    assert_eq!(session_length(0.5, 0.3), 45);
    assert_eq!(session_length(0.5, 0.29), 60);
    assert_eq!(rest_length(0.6), 15);
    assert_eq!(rest_length(0.59), 10);
}

#[test]
fn test_difficulty_rules() {
    assert_eq!(work_difficulty(0.49, 0.0), BlockDifficulty::Easy);
    assert_eq!(work_difficulty(0.5, 0.3), BlockDifficulty::Medium);
    assert_eq!(work_difficulty(0.9, 0.1), BlockDifficulty::Hard);
}

#[test]
fn test_fallback_is_deterministic() {
    let a = fallback_blocks(&inputs(5.5, 0.65, 0.4, 0.45), 8);
    let b = fallback_blocks(&inputs(5.5, 0.65, 0.4, 0.45), 8);
    assert_eq!(a, b);
}

#[test]
fn test_zero_or_invalid_hours_yield_nothing() {
    assert!(fallback_blocks(&inputs(0.0, 0.3, 0.1, 0.6), 8).is_empty());
    assert!(fallback_blocks(&inputs(f64::NAN, 0.3, 0.1, 0.6), 8).is_empty());
}
