use std::sync::Mutex;
use std::time::Instant;

/// Global bot energy in [0,1]. Replying costs energy; idle time recovers
/// it. Recovery is applied lazily on read, so there is no background task.
/// Reads and spends are atomic against each other.
pub struct EnergyMeter {
    inner: Mutex<EnergyInner>,
    recovery_per_minute: f32,
    cost_per_reply: f32,
}

#[derive(Debug)]
struct EnergyInner {
    value: f32,
    last_update: Instant,
}

impl EnergyMeter {
    pub fn new(recovery_per_minute: f32, cost_per_reply: f32) -> Self {
        Self {
            inner: Mutex::new(EnergyInner {
                value: 1.0,
                last_update: Instant::now(),
            }),
            recovery_per_minute,
            cost_per_reply,
        }
    }

    /// Current energy after applying recovery for the elapsed interval.
    pub fn read(&self) -> f32 {
        self.read_at(Instant::now())
    }

    /// Spend one reply's worth of energy.
    pub fn on_reply_sent(&self) {
        self.spend_at(Instant::now())
    }

    fn read_at(&self, now: Instant) -> f32 {
        let mut inner = self.inner.lock().unwrap();
        Self::recover(&mut inner, now, self.recovery_per_minute);
        inner.value
    }

    fn spend_at(&self, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        // Recover first so a long-idle bot pays from a full tank.
        Self::recover(&mut inner, now, self.recovery_per_minute);
        inner.value = (inner.value - self.cost_per_reply).max(0.0);
    }

    fn recover(inner: &mut EnergyInner, now: Instant, per_minute: f32) {
        let elapsed_minutes = now.duration_since(inner.last_update).as_secs_f32() / 60.0;
        inner.value = (inner.value + elapsed_minutes * per_minute).min(1.0);
        inner.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_full() {
        let meter = EnergyMeter::new(0.05, 0.10);
        assert!((meter.read() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn replies_drain_energy() {
        let meter = EnergyMeter::new(0.05, 0.10);
        let t0 = Instant::now();
        meter.spend_at(t0);
        meter.spend_at(t0);
        assert!((meter.read_at(t0) - 0.80).abs() < 0.001);
    }

    #[test]
    fn energy_never_goes_negative() {
        let meter = EnergyMeter::new(0.05, 0.10);
        let t0 = Instant::now();
        for _ in 0..20 {
            meter.spend_at(t0);
        }
        assert_eq!(meter.read_at(t0), 0.0);
    }

    #[test]
    fn idle_time_recovers_at_rate() {
        let meter = EnergyMeter::new(0.05, 0.10);
        let t0 = Instant::now();
        for _ in 0..5 {
            meter.spend_at(t0); // down to 0.50
        }
        // 4 minutes later: 0.50 + 4 * 0.05 = 0.70
        let later = t0 + Duration::from_secs(240);
        assert!((meter.read_at(later) - 0.70).abs() < 0.001);
    }

    #[test]
    fn recovery_caps_at_one() {
        let meter = EnergyMeter::new(0.05, 0.10);
        let t0 = Instant::now();
        meter.spend_at(t0);
        let much_later = t0 + Duration::from_secs(3600);
        assert!((meter.read_at(much_later) - 1.0).abs() < f32::EPSILON);
    }
}
