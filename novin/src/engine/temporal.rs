// novin/src/engine/temporal.rs
//
// Time-of-day / home-mode score modifiers. Multiplicative, clamped to
// [0.7, 1.2] so temporal context can temper or sharpen a score but never
// flip a band on its own.

use crate::events::HomeMode;

const DELIVERY_WINDOW: std::ops::Range<u32> = 9..17;

pub fn modifier(hour: u32, mode: HomeMode) -> f64 {
    let day = (6..20).contains(&hour);
    let factor: f64 = match (mode, day) {
        (HomeMode::Home, true) if DELIVERY_WINDOW.contains(&hour) => 0.85,
        (HomeMode::Home, true)     => 0.90,
        (HomeMode::Home, false)    => 1.00,
        (HomeMode::Away, false)    => 1.15,
        (HomeMode::Away, true)     => 1.05,
        (HomeMode::Vacation, _)    => 1.10,
        (HomeMode::Unknown, _)     => 1.00,
    };
    factor.clamp(0.7, 1.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_window_dampens_most() {
        assert_eq!(modifier(11, HomeMode::Home), 0.85);
        assert_eq!(modifier(18, HomeMode::Home), 0.90);
        assert_eq!(modifier(23, HomeMode::Home), 1.00);
    }

    #[test]
    fn away_night_sharpens() {
        assert_eq!(modifier(2, HomeMode::Away), 1.15);
        assert_eq!(modifier(14, HomeMode::Away), 1.05);
        assert_eq!(modifier(3, HomeMode::Vacation), 1.10);
    }

    #[test]
    fn always_within_clamp() {
        for hour in 0..24 {
            for mode in [HomeMode::Home, HomeMode::Away, HomeMode::Vacation, HomeMode::Unknown] {
                let m = modifier(hour, mode);
                assert!((0.7..=1.2).contains(&m));
            }
        }
    }
}
