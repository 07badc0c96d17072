use market::{Direction, Interval};

/// Per-instrument accumulator of firing intervals.
///
/// Lives for one symbol pass only. Labels keep configured order; the
/// direction and indicator snapshot come from the last interval that fired.
#[derive(Debug, Default)]
pub struct SignalSet {
    labels: Vec<String>,
    direction: Option<Direction>,
    percent_k: f64,
    percent_d: f64,
    macd: f64,
}

impl SignalSet {
    pub fn record(&mut self, interval: Interval, direction: Direction, k: f64, d: f64, macd: f64) {
        self.labels.push(interval.label());
        self.direction = Some(direction);
        self.percent_k = k;
        self.percent_d = d;
        self.macd = macd;
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Alert text, or `None` when nothing fired.
    pub fn compose(&self, symbol: &str) -> Option<String> {
        let marker = match self.direction? {
            Direction::Long => "🟢 LONG",
            Direction::Short => "🔴 SHORT",
            Direction::Neutral => return None,
        };

        Some(format!(
            "🔥 #{symbol}\n🕒 {}\n{marker}\n%K: {:.5}\n%D: {:.5}\nMACD: {:.7}\n",
            self.labels.join(", "),
            self.percent_k,
            self.percent_d,
            self.macd,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(m: u32) -> Interval {
        Interval::from_minutes(m).unwrap()
    }

    #[test]
    fn empty_set_composes_nothing() {
        let s = SignalSet::default();
        assert!(s.is_empty());
        assert_eq!(s.compose("BTCUSDT"), None);
    }

    #[test]
    fn single_interval_message_layout() {
        let mut s = SignalSet::default();
        s.record(iv(5), Direction::Long, 3.0, 4.5, -0.01234567);

        assert_eq!(
            s.compose("BTCUSDT").unwrap(),
            "🔥 #BTCUSDT\n🕒 5m\n🟢 LONG\n%K: 3.00000\n%D: 4.50000\nMACD: -0.0123457\n"
        );
    }

    #[test]
    fn last_firing_interval_supplies_snapshot() {
        let mut s = SignalSet::default();
        s.record(iv(5), Direction::Long, 1.0, 2.0, 0.5);
        s.record(iv(15), Direction::Short, 90.0, 85.0, 0.25);

        let text = s.compose("ETHUSDT").unwrap();
        assert!(text.contains("🕒 5m, 15m\n"));
        assert!(text.contains("🔴 SHORT"));
        assert!(text.contains("%K: 90.00000"));
        assert!(text.contains("MACD: 0.2500000"));
        assert_eq!(s.labels(), ["5m", "15m"]);
    }
}
