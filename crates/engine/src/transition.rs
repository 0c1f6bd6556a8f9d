/// Eased interpolation of a small state vector over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition<const N: usize> {
    from: [f64; N],
    to: [f64; N],
    duration_s: f64,
    elapsed_s: f64,
}

impl<const N: usize> Transition<N> {
    pub fn new(from: [f64; N], to: [f64; N], duration_s: f64) -> Self {
        Self {
            from,
            to,
            duration_s: duration_s.max(0.0),
            elapsed_s: 0.0,
        }
    }

    pub fn target(&self) -> [f64; N] {
        self.to
    }

    pub fn is_done(&self) -> bool {
        self.elapsed_s >= self.duration_s
    }

    /// Advance by `dt_s` and return the current state.
    pub fn advance(&mut self, dt_s: f64) -> [f64; N] {
        if dt_s.is_finite() && dt_s > 0.0 {
            self.elapsed_s = (self.elapsed_s + dt_s).min(self.duration_s);
        }
        self.sample()
    }

    pub fn sample(&self) -> [f64; N] {
        if self.duration_s <= 0.0 {
            return self.to;
        }
        let t = ease_in_out(self.elapsed_s / self.duration_s);
        let mut out = self.from;
        for (i, v) in out.iter_mut().enumerate() {
            *v += (self.to[i] - self.from[i]) * t;
        }
        out
    }
}

fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::Transition;

    #[test]
    fn reaches_target_after_duration() {
        let mut t = Transition::new([0.0, 10.0], [10.0, 0.0], 1.0);
        let mid = t.advance(0.5);
        assert!((mid[0] - 5.0).abs() < 1e-9);
        assert!(!t.is_done());
        assert_eq!(t.advance(0.75), [10.0, 0.0]);
        assert!(t.is_done());
    }

    #[test]
    fn zero_duration_is_immediate() {
        let t = Transition::new([1.0], [2.0], 0.0);
        assert!(t.is_done());
        assert_eq!(t.sample(), [2.0]);
    }
}
