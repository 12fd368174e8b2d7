use anyhow::{Result, bail};

/// Fraction of the peak value below which a transient response is over.
pub const DECAY_FRACTION: f64 = 0.1;

/// Compute the duration of a transient response.
///
/// Points still above [`DECAY_FRACTION`] of the peak are masked out. The
/// duration is the index, at or after the peak, of the largest remaining
/// value, i.e. the post-peak point closest to the threshold from below.
/// Ties resolve to the earliest index and the peak is the first occurrence
/// of the maximum. For a monotone decay this is the first crossing.
///
/// Returns `None` if the series never decays below the threshold after the peak.
///
/// # Errors
/// Returns an error if the series is empty or contains NaN.
pub fn duration(series: &[f64]) -> Result<Option<usize>> {
    if series.is_empty() {
        bail!("series must not be empty");
    }
    if let Some(idx) = series.iter().position(|val| val.is_nan()) {
        bail!("series must not contain NaN, but has NaN at index {idx}");
    }

    let (t_max, max_val) = first_argmax(series);
    let threshold = DECAY_FRACTION * max_val;

    let t_end = series[t_max..]
        .iter()
        .map(|&val| val - threshold)
        .enumerate()
        .filter(|&(_, shifted)| shifted <= 0.0)
        .fold(None, |best: Option<(usize, f64)>, (offset, shifted)| match best {
            Some((_, best_shifted)) if shifted <= best_shifted => best,
            _ => Some((offset, shifted)),
        })
        .map(|(offset, _)| offset + t_max);

    Ok(t_end)
}

/// Index and value of the first occurrence of the maximum.
pub(crate) fn first_argmax(series: &[f64]) -> (usize, f64) {
    series
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(i_max, max_val), (idx, val)| {
            if val > max_val { (idx, val) } else { (i_max, max_val) }
        })
}

/// Index and value of the first occurrence of the minimum.
pub(crate) fn first_argmin(series: &[f64]) -> (usize, f64) {
    series
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::INFINITY), |(i_min, min_val), (idx, val)| {
            if val < min_val { (idx, val) } else { (i_min, min_val) }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_below_threshold_after_peak() {
        let series = [0.0, 5.0, 10.0, 8.0, 0.5, 0.2];
        assert_eq!(duration(&series).unwrap(), Some(4));
    }

    #[test]
    fn oscillating_tail_picks_value_closest_to_threshold() {
        assert_eq!(duration(&[0.0, 10.0, 0.5, 0.9]).unwrap(), Some(3));
        assert_eq!(duration(&[0.0, 10.0, 0.9, 3.0, 0.2, 0.9]).unwrap(), Some(2));
        assert_eq!(duration(&[0.0, 10.0, 0.2, 5.0, 1.0, 0.0]).unwrap(), Some(4));
    }

    #[test]
    fn crossing_before_peak_is_ignored() {
        let series = [0.0, 10.0, 4.0, 2.0, 1.0];
        assert_eq!(duration(&series).unwrap(), Some(4));
    }

    #[test]
    fn never_decays() {
        let series = [1.0, 10.0, 9.0, 5.0, 2.0];
        assert_eq!(duration(&series).unwrap(), None);
    }

    #[test]
    fn at_least_argmax() {
        let series = [3.0, 0.0, 7.0, 7.0, 0.1, 9.0, 0.5];
        let (t_max, _) = first_argmax(&series);
        assert_eq!(t_max, 5);
        let t_end = duration(&series).unwrap().unwrap();
        assert!(t_end >= t_max);
        assert!(series[t_end] <= DECAY_FRACTION * 9.0);
    }

    #[test]
    fn ties_resolve_to_first_peak() {
        let series = [2.0, 10.0, 0.0, 10.0, 0.0];
        assert_eq!(duration(&series).unwrap(), Some(2));
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(duration(&[0.0, 0.0, 0.0]).unwrap(), Some(0));
        assert_eq!(duration(&[5.0]).unwrap(), None);
        assert_eq!(duration(&[-1.0, -2.0]).unwrap(), Some(0));
    }

    #[test]
    fn rejects_malformed_series() {
        assert!(duration(&[]).is_err());
        assert!(duration(&[1.0, f64::NAN, 0.0]).is_err());
    }
}
