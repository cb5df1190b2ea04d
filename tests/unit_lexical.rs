// Unit tests for the lexical judge and text normalization.
//
// Runs against the built-in taxonomy, so these double as a check that the
// shipped keyword data still produces the documented scores.

use std::sync::Arc;

use tonecheck::judges::lexical::{category_score, LexicalJudge};
use tonecheck::normalize::normalize_text;
use tonecheck::taxonomy::{Category, Taxonomy};

fn judge() -> LexicalJudge {
    LexicalJudge::new(Arc::new(Taxonomy::builtin().unwrap()), 0.2)
}

// ============================================================
// Documented reference cases
// ============================================================

#[test]
fn clean_text_scores_zero_with_high_confidence() {
    let verdict = judge().evaluate("こんにちは");
    assert_eq!(verdict.score, 0.0);
    assert_eq!(verdict.confidence, 0.9);
    assert!(verdict.categories.is_empty());
    assert!(verdict.evidence.is_none());
}

#[test]
fn single_severe_keyword_scores_exactly_point_eight() {
    let verdict = judge().evaluate("死ね");
    assert_eq!(verdict.category_score(Category::SevereToxicity), 0.8);
    assert_eq!(verdict.score, 0.8);
    assert_eq!(verdict.confidence, 1.0);
}

#[test]
fn single_mild_keyword_overall_is_exact() {
    // 0.4 category score x 0.5 severity weight, with no rounding drift
    let verdict = judge().evaluate("バカ");
    assert_eq!(verdict.category_score(Category::MildToxicity), 0.4);
    assert_eq!(verdict.score, 0.2);
}

// ============================================================
// Monotonicity
// ============================================================

#[test]
fn more_distinct_matches_never_lower_the_score() {
    let one = judge().evaluate("バカ");
    let two = judge().evaluate("バカ アホ");
    let three = judge().evaluate("バカ アホ うざい");

    let mild = |v: &tonecheck::judges::traits::JudgeVerdict| v.category_score(Category::MildToxicity);
    assert_eq!(mild(&one), 0.4);
    assert_eq!(mild(&two), 0.6);
    assert_eq!(mild(&three), 0.8);
    assert!(two.score >= one.score);
    assert!(three.score >= two.score);
}

#[test]
fn curve_is_monotonic_for_every_weight() {
    for weight in [0.3, 0.5, 0.7, 0.8, 0.9, 1.0] {
        let mut previous = 0.0;
        for matches in 0..6 {
            let score = category_score(weight, matches);
            assert!(
                score >= previous,
                "weight {weight}: {matches} matches scored {score} < {previous}"
            );
            previous = score;
        }
    }
}

#[test]
fn repeated_keyword_counts_once() {
    let once = judge().evaluate("バカ");
    let thrice = judge().evaluate("バカ、バカ、バカ");
    assert_eq!(
        once.category_score(Category::MildToxicity),
        thrice.category_score(Category::MildToxicity)
    );
}

// ============================================================
// Intensifiers
// ============================================================

#[test]
fn intensifier_adds_a_distinct_match() {
    let plain = judge().evaluate("バカ");
    let intensified = judge().evaluate("マジでバカ");
    assert_eq!(intensified.category_score(Category::MildToxicity), 0.6);
    assert!(intensified.score > plain.score);

    let evidence = intensified.evidence.unwrap();
    assert!(evidence.matched.contains(&"マジでバカ".to_string()));
}

#[test]
fn intensifier_elsewhere_in_text_does_not_count() {
    let verdict = judge().evaluate("マジで疲れた。バカみたい");
    assert_eq!(verdict.category_score(Category::MildToxicity), 0.4);
}

// ============================================================
// Category interplay
// ============================================================

#[test]
fn multiple_categories_blend_max_and_mean() {
    // severe: 0.8 x 1.0 = 0.8, mild: 0.4 x 0.5 = 0.2 -> 0.8*0.8 + 0.2*0.5
    let verdict = judge().evaluate("死ね バカ");
    assert!((verdict.score - 0.74).abs() < 1e-9, "got {}", verdict.score);
    assert_eq!(verdict.categories.len(), 2);
    assert_eq!(verdict.categories[0].category, Category::SevereToxicity);
}

#[test]
fn confidence_falls_with_sparse_matches_in_long_text() {
    let text = "今日はとても良い天気でしたが、帰り道で会った人がバカなことを言っていました";
    let verdict = judge().evaluate(text);
    assert!(verdict.confidence > 0.7 && verdict.confidence < 1.0);
}

// ============================================================
// Normalization
// ============================================================

#[test]
fn normalization_maps_full_width_and_folds_case() {
    assert_eq!(normalize_text("ＳＴＵＰＩＤ"), "stupid");
    assert_eq!(normalize_text("Ａｂｃ１２３"), "abc123");
}

#[test]
fn normalization_collapses_ideographic_spaces() {
    assert_eq!(normalize_text("  バカ\u{3000}\u{3000}アホ\t"), "バカ アホ");
}

#[test]
fn full_width_english_keyword_matches() {
    let verdict = judge().evaluate("ＩＤＩＯＴ");
    assert_eq!(verdict.category_score(Category::MildToxicity), 0.4);
}
