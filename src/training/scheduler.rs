use tracing::warn;

/// Learning rate schedulers
#[derive(Debug, Clone)]
pub enum LearningRateScheduler {
    /// Constant learning rate
    Constant { lr: f64 },
    /// Exponential decay: lr * gamma^epoch
    Exponential { lr: f64, gamma: f64 },
    /// Cosine annealing from lr to eta_min over t_max epochs
    Cosine { lr: f64, t_max: usize, eta_min: f64 },
}

impl LearningRateScheduler {
    pub fn constant(lr: f64) -> Self {
        Self::Constant { lr }
    }

    pub fn exponential(lr: f64, gamma: f64) -> Self {
        Self::Exponential { lr, gamma }
    }

    pub fn cosine(lr: f64, t_max: usize, eta_min: f64) -> Self {
        Self::Cosine { lr, t_max, eta_min }
    }

    /// Build from a configuration name; unknown names fall back to constant.
    pub fn from_name(name: &str, lr: f64, epochs: usize) -> Self {
        match name {
            "constant" => Self::constant(lr),
            "exponential" => Self::exponential(lr, 0.98),
            "cosine" => Self::cosine(lr, epochs.max(1), lr * 0.01),
            other => {
                warn!("Unknown lr scheduler {:?}, using constant", other);
                Self::constant(lr)
            }
        }
    }

    /// Get learning rate for an epoch
    pub fn get_lr(&self, epoch: usize) -> f64 {
        match *self {
            Self::Constant { lr } => lr,
            Self::Exponential { lr, gamma } => lr * gamma.powi(epoch as i32),
            Self::Cosine { lr, t_max, eta_min } => {
                if epoch >= t_max {
                    eta_min
                } else {
                    let progress = epoch as f64 / t_max as f64;
                    eta_min + (lr - eta_min) * (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0
                }
            }
        }
    }
}

impl Default for LearningRateScheduler {
    fn default() -> Self {
        Self::constant(0.001)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_scheduler() {
        let scheduler = LearningRateScheduler::constant(0.001);
        assert_eq!(scheduler.get_lr(0), 0.001);
        assert_eq!(scheduler.get_lr(100), 0.001);
    }

    #[test]
    fn test_exponential_scheduler() {
        let scheduler = LearningRateScheduler::exponential(0.001, 0.9);
        assert_eq!(scheduler.get_lr(0), 0.001);
        assert!((scheduler.get_lr(1) - 0.0009).abs() < 1e-10);
        assert!((scheduler.get_lr(10) - 0.001 * 0.9f64.powi(10)).abs() < 1e-15);
    }

    #[test]
    fn test_cosine_scheduler() {
        let scheduler = LearningRateScheduler::cosine(0.001, 100, 0.0001);
        assert!((scheduler.get_lr(0) - 0.001).abs() < 1e-12);
        assert_eq!(scheduler.get_lr(100), 0.0001);
        let mid = scheduler.get_lr(50);
        assert!(mid > 0.0001 && mid < 0.001);
    }

    #[test]
    fn test_from_name_falls_back_to_constant() {
        let scheduler = LearningRateScheduler::from_name("mystery", 0.01, 10);
        assert!(matches!(scheduler, LearningRateScheduler::Constant { .. }));
    }
}
