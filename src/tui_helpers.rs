use chrono::{DateTime, Local, NaiveDateTime};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// `0.734` renders as `73%`.
pub(crate) fn format_confidence(confidence: f64) -> String {
    if !confidence.is_finite() {
        return "--".to_owned();
    }
    format!("{}%", (confidence * 100.0).round() as i64)
}

/// Local `YYYY-MM-DD HH:MM:SS`; anything unparseable is shown as given.
pub(crate) fn format_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.with_timezone(&Local).format(DISPLAY_FORMAT).to_string();
    }
    // Timestamps without an offset are already local wall-clock time.
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return parsed.format(DISPLAY_FORMAT).to_string();
        }
    }
    raw.to_owned()
}

pub(crate) fn masked(value: &str) -> String {
    "*".repeat(value.chars().count())
}

/// Single-line text editing. Returns `true` when `target` changed.
pub(crate) fn edit_text_field(target: &mut String, key: KeyEvent, allow_spaces: bool) -> bool {
    match key.code {
        KeyCode::Backspace => target.pop().is_some(),
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL)
                || key.modifiers.contains(KeyModifiers::ALT)
            {
                return false;
            }
            if !allow_spaces && c == ' ' {
                return false;
            }
            target.push(c);
            true
        }
        _ => false,
    }
}

/// Pasted text for a single-line field: first line only, trimmed.
pub(crate) fn single_line(pasted: &str) -> &str {
    pasted
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

pub(crate) fn centered_rect(area: Rect, width_percent: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height.min(area.height)),
            Constraint::Fill(1),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent.min(100)) / 2),
            Constraint::Percentage(width_percent.min(100)),
            Constraint::Fill(1),
        ])
        .split(vertical[1])[1]
}

/// Top-right strip for toast notifications, one row per line of content.
pub(crate) fn toast_area(area: Rect, rows: u16) -> Rect {
    let width = (area.width / 2).max(30).min(area.width);
    let height = rows.min(area.height.saturating_sub(1));
    Rect {
        x: area.x + area.width.saturating_sub(width),
        y: area.y + 1,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn confidence_rounds_to_whole_percent() {
        assert_eq!(format_confidence(0.734), "73%");
        assert_eq!(format_confidence(0.736), "74%");
        assert_eq!(format_confidence(1.0), "100%");
        assert_eq!(format_confidence(0.0), "0%");
        assert_eq!(format_confidence(f64::NAN), "--");
    }

    #[test]
    fn naive_timestamps_are_shown_as_wall_clock() {
        assert_eq!(format_date("2024-05-01T10:00:00"), "2024-05-01 10:00:00");
        assert_eq!(
            format_date("2024-05-01T10:00:00.123456"),
            "2024-05-01 10:00:00"
        );
        assert_eq!(format_date("2024-05-01 08:30:15"), "2024-05-01 08:30:15");
    }

    #[test]
    fn offset_timestamps_convert_to_local_time() {
        let expected = chrono::Utc
            .with_ymd_and_hms(2024, 5, 1, 10, 0, 0)
            .single()
            .map(|utc| utc.with_timezone(&Local).format(DISPLAY_FORMAT).to_string());
        assert_eq!(Some(format_date("2024-05-01T10:00:00Z")), expected);
    }

    #[test]
    fn unparseable_dates_pass_through() {
        assert_eq!(format_date("yesterday"), "yesterday");
        assert_eq!(format_date(""), "");
    }

    #[test]
    fn text_editing_respects_modifiers_and_spaces() {
        let mut value = String::from("rtsp");
        assert!(edit_text_field(
            &mut value,
            KeyEvent::new(KeyCode::Char(':'), KeyModifiers::NONE),
            false
        ));
        assert!(!edit_text_field(
            &mut value,
            KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE),
            false
        ));
        assert!(!edit_text_field(
            &mut value,
            KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL),
            true
        ));
        assert_eq!(value, "rtsp:");
        assert!(edit_text_field(
            &mut value,
            KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE),
            true
        ));
        assert_eq!(value, "rtsp");
    }

    #[test]
    fn pasted_text_keeps_first_line() {
        assert_eq!(single_line("\n  rtsp://door/stream \nextra"), "rtsp://door/stream");
        assert_eq!(single_line("   "), "");
    }

    #[test]
    fn toast_area_stays_inside_frame() {
        let frame = Rect::new(0, 0, 40, 10);
        let area = toast_area(frame, 30);
        assert!(area.right() <= frame.right());
        assert!(area.bottom() <= frame.bottom());
    }
}
