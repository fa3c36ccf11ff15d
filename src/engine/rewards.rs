/// Points every completed delivery earns.
pub const POINTS_PER_DELIVERY: u64 = 10;
/// Order total at or above which the bonus applies.
pub const BONUS_POINTS_THRESHOLD: f64 = 100.0;
pub const BONUS_POINTS: u64 = 5;
/// Monetary value of one point, in EGP.
pub const EGP_PER_POINT: f64 = 0.5;

pub fn compute_reward_points(total_price: f64) -> u64 {
    if total_price >= BONUS_POINTS_THRESHOLD {
        POINTS_PER_DELIVERY + BONUS_POINTS
    } else {
        POINTS_PER_DELIVERY
    }
}

pub fn points_value(points: u64) -> f64 {
    points as f64 * EGP_PER_POINT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonus_starts_exactly_at_threshold() {
        assert_eq!(compute_reward_points(99.99), 10);
        assert_eq!(compute_reward_points(100.0), 15);
        assert_eq!(compute_reward_points(2_500.0), 15);
    }

    #[test]
    fn non_positive_totals_still_earn_base_points() {
        assert_eq!(compute_reward_points(0.0), 10);
        assert_eq!(compute_reward_points(-40.0), 10);
    }

    #[test]
    fn points_convert_at_half_a_pound() {
        assert_eq!(points_value(15), 7.5);
        assert_eq!(points_value(0), 0.0);
    }
}
