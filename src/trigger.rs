use log::debug;

/// Byte sent downstream for a window that fired.
pub const FIRE_BYTE: u8 = b'1';
/// Byte sent for every other classified window, keeping the line a steady heartbeat.
pub const IDLE_BYTE: u8 = b'0';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Fire,
    Idle,
}

impl Trigger {
    pub fn byte(self) -> u8 {
        match self {
            Trigger::Fire => FIRE_BYTE,
            Trigger::Idle => IDLE_BYTE,
        }
    }

    pub fn fired(self) -> bool {
        self == Trigger::Fire
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Cooling,
}

/// Turns per-window labels into fires separated by more than `cooldown` seconds.
#[derive(Debug, Clone)]
pub struct Debouncer {
    cooldown: f64,
    last_fire: Option<f64>,
}

impl Debouncer {
    pub fn new(cooldown_secs: f64) -> Self {
        Debouncer {
            cooldown: cooldown_secs,
            last_fire: None,
        }
    }

    pub fn last_fire(&self) -> Option<f64> {
        self.last_fire
    }

    pub fn state(&self, now: f64) -> DebounceState {
        match self.last_fire {
            Some(last) if now - last <= self.cooldown => DebounceState::Cooling,
            _ => DebounceState::Idle,
        }
    }

    /// `now` is seconds since the stream started.
    pub fn update(&mut self, label: u8, now: f64) -> Trigger {
        if label != 1 {
            return Trigger::Idle;
        }
        match self.last_fire {
            Some(last) if now - last <= self.cooldown => {
                debug!("Clap at {:.3}s suppressed, {:.3}s into cooldown", now, now - last);
                Trigger::Idle
            }
            _ => {
                debug!("Fired at {:.3}s", now);
                self.last_fire = Some(now);
                Trigger::Fire
            }
        }
    }
}
