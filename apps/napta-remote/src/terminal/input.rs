use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use control_proto::Direction;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, is_raw_mode_enabled, supports_keyboard_enhancement,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Longest gap between two presses of the same key that still counts as one
/// hold when the terminal cannot report repeats itself.
const AUTOREPEAT_GAP: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlInput {
    Key(Direction),
    Player(u32),
    Rescope,
    Quit,
}

/// Maps one key press onto a remote action. Unbound keys, repeats and
/// releases yield `None`.
pub fn translate(key: &KeyEvent) -> Option<ControlInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c')).then_some(ControlInput::Quit);
    }
    match key.code {
        KeyCode::Up => Some(ControlInput::Key(Direction::Up)),
        KeyCode::Down => Some(ControlInput::Key(Direction::Down)),
        KeyCode::Left => Some(ControlInput::Key(Direction::Left)),
        KeyCode::Right => Some(ControlInput::Key(Direction::Right)),
        KeyCode::Esc | KeyCode::Char('q') => Some(ControlInput::Quit),
        KeyCode::Char('r') => Some(ControlInput::Rescope),
        KeyCode::Char(c @ '1'..='9') => c.to_digit(10).map(ControlInput::Player),
        _ => None,
    }
}

/// Drops autorepeat that arrives as plain presses.
///
/// The gap is measured from the previous press of the same key, so a held key
/// stays suppressed for as long as the terminal keeps repeating it. The first
/// repeat after the terminal's initial delay cannot be told apart from a
/// second tap and is let through.
#[derive(Debug, Default)]
pub struct RepeatFilter {
    last: Option<(KeyCode, Instant)>,
}

impl RepeatFilter {
    pub fn admit(&mut self, code: KeyCode, at: Instant) -> bool {
        let held = matches!(
            self.last,
            Some((previous, seen))
                if previous == code && at.saturating_duration_since(seen) < AUTOREPEAT_GAP
        );
        self.last = Some((code, at));
        !held
    }
}

/// Raw mode plus key event-type reporting where the terminal supports it.
/// Both are restored on drop.
pub struct RawModeGuard {
    restore: bool,
    enhanced: bool,
}

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        let already = is_raw_mode_enabled().unwrap_or(false);
        if !already {
            enable_raw_mode()?;
        }
        let mut guard = Self {
            restore: !already,
            enhanced: false,
        };
        if supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            guard.enhanced = true;
        }
        Ok(guard)
    }

    /// Whether held keys arrive as `KeyEventKind::Repeat` instead of presses.
    pub fn reports_event_types(&self) -> bool {
        self.enhanced
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
        }
        if self.restore {
            let _ = disable_raw_mode();
        }
    }
}

/// Reads key events on a blocking thread until the receiver is dropped or
/// the operator quits. With `filter_repeats`, presses that continue a held
/// key are dropped so each physical press yields one input.
pub fn spawn_reader(
    tx: mpsc::UnboundedSender<ControlInput>,
    filter_repeats: bool,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while event::poll(Duration::from_millis(0)).unwrap_or(false) {
            let _ = event::read();
        }
        let mut repeats = RepeatFilter::default();
        loop {
            if tx.is_closed() {
                break;
            }
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    warn!(target: "napta::terminal", error = %err, "key poll failed");
                    let _ = tx.send(ControlInput::Quit);
                    break;
                }
            }
            let key = match event::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(err) => {
                    warn!(target: "napta::terminal", error = %err, "key read failed");
                    let _ = tx.send(ControlInput::Quit);
                    break;
                }
            };
            let Some(input) = translate(&key) else {
                debug!(
                    target: "napta::terminal",
                    code = ?key.code,
                    kind = ?key.kind,
                    "key ignored"
                );
                continue;
            };
            if filter_repeats && !repeats.admit(key.code, Instant::now()) {
                continue;
            }
            if tx.send(input).is_err() || input == ControlInput::Quit {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_map_to_directions() {
        assert_eq!(
            translate(&press(KeyCode::Up)),
            Some(ControlInput::Key(Direction::Up))
        );
        assert_eq!(
            translate(&press(KeyCode::Left)),
            Some(ControlInput::Key(Direction::Left))
        );
    }

    #[test]
    fn digits_pick_player_slots() {
        assert_eq!(
            translate(&press(KeyCode::Char('3'))),
            Some(ControlInput::Player(3))
        );
        assert_eq!(translate(&press(KeyCode::Char('0'))), None);
    }

    #[test]
    fn quit_and_rescope_bindings() {
        assert_eq!(translate(&press(KeyCode::Esc)), Some(ControlInput::Quit));
        assert_eq!(
            translate(&press(KeyCode::Char('q'))),
            Some(ControlInput::Quit)
        );
        assert_eq!(
            translate(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(ControlInput::Quit)
        );
        assert_eq!(
            translate(&press(KeyCode::Char('r'))),
            Some(ControlInput::Rescope)
        );
    }

    #[test]
    fn held_arrow_reported_as_repeat_is_ignored() {
        let repeat = KeyEvent {
            code: KeyCode::Up,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Repeat,
            state: KeyEventState::NONE,
        };
        assert_eq!(translate(&repeat), None);
    }

    #[test]
    fn autorepeat_presses_collapse_into_one() {
        let mut filter = RepeatFilter::default();
        let start = Instant::now();
        assert!(filter.admit(KeyCode::Up, start));
        // Steady autorepeat every 30ms stays suppressed for the whole hold.
        for step in 1..20 {
            assert!(!filter.admit(KeyCode::Up, start + Duration::from_millis(30 * step)));
        }
        // Released, then pressed again.
        assert!(filter.admit(KeyCode::Up, start + Duration::from_millis(900)));
    }

    #[test]
    fn different_keys_are_never_suppressed() {
        let mut filter = RepeatFilter::default();
        let start = Instant::now();
        assert!(filter.admit(KeyCode::Up, start));
        assert!(filter.admit(KeyCode::Left, start + Duration::from_millis(10)));
        assert!(filter.admit(KeyCode::Up, start + Duration::from_millis(20)));
    }

    #[test]
    fn releases_are_ignored() {
        let release = KeyEvent {
            code: KeyCode::Up,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(translate(&release), None);
    }
}
