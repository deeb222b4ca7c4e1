use simple_moving_average::{SMA, SumTreeSMA};

/// Centred rolling median. The window shrinks at both ends of the signal.
pub(crate) fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    let mut buffer = Vec::with_capacity(window);
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(values.len());
            buffer.clear();
            buffer.extend_from_slice(&values[start..end]);
            buffer.sort_by(f64::total_cmp);
            let mid = buffer.len() / 2;
            if buffer.len() % 2 == 0 {
                (buffer[mid - 1] + buffer[mid]) / 2.0
            } else {
                buffer[mid]
            }
        })
        .collect()
}

/// Centred moving average over `WINDOW` samples. Both ends are padded with
/// the nearest value so the output keeps the input length. Signals shorter
/// than the window are returned unchanged.
pub(crate) fn centered_moving_average<const WINDOW: usize>(values: &[f64]) -> Vec<f64> {
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return Vec::new();
    };
    if values.len() < WINDOW {
        return values.to_vec();
    }

    let half = WINDOW / 2;
    let padded = std::iter::repeat_n(*first, half)
        .chain(values.iter().copied())
        .chain(std::iter::repeat_n(*last, half));

    let mut window: SumTreeSMA<f64, f64, WINDOW> = SumTreeSMA::new();
    let mut output = Vec::with_capacity(values.len());
    for (i, value) in padded.enumerate() {
        window.add_sample(value);
        if i + 1 >= WINDOW && output.len() < values.len() {
            output.push(window.get_average());
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_median_removes_spike() {
        let values = [1.0, 1.0, 10.0, 1.0, 1.0];
        assert_eq!(rolling_median(&values, 5), vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_rolling_median_shrinks_at_edges() {
        let values = [0.0, 2.0, 4.0, 6.0];
        // First window is [0, 2, 4], last is [2, 4, 6]
        let smoothed = rolling_median(&values, 5);
        assert_eq!(smoothed[0], 2.0);
        assert_eq!(smoothed[3], 4.0);
    }

    #[test]
    fn test_moving_average_keeps_length_and_constants() {
        let values = vec![3.0; 20];
        let smoothed = centered_moving_average::<11>(&values);
        assert_eq!(smoothed.len(), 20);
        assert!(smoothed.iter().all(|v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_moving_average_is_centred() {
        let mut values = vec![0.0; 21];
        values[10] = 11.0;
        let smoothed = centered_moving_average::<11>(&values);
        assert!((smoothed[10] - 1.0).abs() < 1e-12);
        assert!((smoothed[5] - 1.0).abs() < 1e-12);
        assert!((smoothed[15] - 1.0).abs() < 1e-12);
        assert_eq!(smoothed[4], 0.0);
        assert_eq!(smoothed[16], 0.0);
    }

    #[test]
    fn test_short_signal_is_unchanged() {
        let values = [1.0, 5.0, 2.0];
        assert_eq!(centered_moving_average::<11>(&values), values.to_vec());
    }
}
