use std::time::Duration;

/// Wall time spent on each stage of one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameTimes {
    pub decode: Duration,
    pub inference: Duration,
    pub aggregation: Duration,
}

impl FrameTimes {
    pub fn total(&self) -> Duration {
        self.decode + self.inference + self.aggregation
    }

    fn zip_with(&self, other: &FrameTimes, f: impl Fn(Duration, Duration) -> Duration) -> Self {
        Self {
            decode: f(self.decode, other.decode),
            inference: f(self.inference, other.inference),
            aggregation: f(self.aggregation, other.aggregation),
        }
    }
}

/// Per-frame timings of a whole run.
#[derive(Debug, Default, Clone)]
pub struct AggregatedTimes {
    frames: Vec<FrameTimes>,
}

impl AggregatedTimes {
    pub fn push(&mut self, times: FrameTimes) {
        self.frames.push(times);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The first frame pays for lazy init inside ort, so it's usually an outlier.
    fn sample(&self, skip_first: bool) -> &[FrameTimes] {
        if skip_first && self.frames.len() > 1 {
            &self.frames[1..]
        } else {
            &self.frames
        }
    }

    pub fn avg(&self, skip_first: bool) -> FrameTimes {
        let sample = self.sample(skip_first);
        if sample.is_empty() {
            return FrameTimes::default();
        }
        let sum = sample
            .iter()
            .fold(FrameTimes::default(), |acc, t| acc.zip_with(t, |a, b| a + b));
        let n = sample.len() as u32;
        FrameTimes {
            decode: sum.decode / n,
            inference: sum.inference / n,
            aggregation: sum.aggregation / n,
        }
    }

    pub fn min(&self, skip_first: bool) -> FrameTimes {
        let sample = self.sample(skip_first);
        match sample.split_first() {
            Some((first, rest)) => rest
                .iter()
                .fold(*first, |acc, t| acc.zip_with(t, std::cmp::min)),
            None => FrameTimes::default(),
        }
    }

    pub fn max(&self, skip_first: bool) -> FrameTimes {
        self.sample(skip_first)
            .iter()
            .fold(FrameTimes::default(), |acc, t| acc.zip_with(t, std::cmp::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(decode: u64, inference: u64, aggregation: u64) -> FrameTimes {
        FrameTimes {
            decode: Duration::from_millis(decode),
            inference: Duration::from_millis(inference),
            aggregation: Duration::from_millis(aggregation),
        }
    }

    #[test]
    fn stats_skip_warmup_frame() {
        let mut agg = AggregatedTimes::default();
        agg.push(ms(100, 900, 10));
        agg.push(ms(2, 20, 1));
        agg.push(ms(4, 40, 3));

        assert_eq!(agg.avg(true), ms(3, 30, 2));
        assert_eq!(agg.min(true), ms(2, 20, 1));
        assert_eq!(agg.max(true), ms(4, 40, 3));
        assert_eq!(agg.max(false), ms(100, 900, 10));
    }

    #[test]
    fn single_frame_is_not_skipped() {
        let mut agg = AggregatedTimes::default();
        agg.push(ms(1, 2, 3));
        assert_eq!(agg.avg(true), ms(1, 2, 3));
        assert_eq!(agg.avg(true).total(), Duration::from_millis(6));
    }

    #[test]
    fn empty_is_zero() {
        let agg = AggregatedTimes::default();
        assert_eq!(agg.avg(false), FrameTimes::default());
        assert_eq!(agg.min(false), FrameTimes::default());
    }
}
