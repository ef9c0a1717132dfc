//! Elo rating arithmetic.

/// Probability that a player rated `rating` beats one rated `opponent`
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - rating) / 400.0))
}

/// New `(winner, loser)` ratings after one decided match.
///
/// Each adjustment is truncated toward zero, so the pair is not always zero-sum.
pub fn compute_ratings(winner: i32, loser: i32, k_factor: f64) -> (i32, i32) {
    let winner_gain = k_factor * (1.0 - expected_score(winner, loser));
    let loser_loss = k_factor * (0.0 - expected_score(loser, winner));

    (winner + winner_gain as i32, loser + loser_loss as i32)
}
