use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::task::Task;

const CALENDAR_RENDER_URL: &str = "https://www.google.com/calendar/render";
const EVENT_DETAILS: &str = "Task+managed+by+ZenTask+AI";
const COMPACT_DATE_FORMAT: &str = "%Y%m%d";

/// Everything but `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, the component-safe set.
const TITLE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Public US holiday calendar shown when no embed URL is configured.
pub const DEFAULT_EMBED_URL: &str = "https://calendar.google.com/calendar/embed?src=en.usa%23holiday%40group.v.calendar.google.com&ctz=America%2FLos_Angeles";

/// Deep link that opens a "create event" form for `task` as an all-day
/// event on its due date. The end date is exclusive, so it is the day after.
pub fn build_calendar_url(task: &Task) -> String {
    let start = task.due_date;
    // Only NaiveDate::MAX has no successor.
    let end = start.succ_opt().unwrap_or(start);
    let title = utf8_percent_encode(&task.text, TITLE_ENCODE_SET);

    format!(
        "{CALENDAR_RENDER_URL}?action=TEMPLATE&text={title}&dates={}/{}&details={EVENT_DETAILS}&sf=true&output=xml",
        start.format(COMPACT_DATE_FORMAT),
        end.format(COMPACT_DATE_FORMAT),
    )
}

/// The configured embed URL when it has content, else the default feed.
pub fn embed_url(configured: Option<&str>) -> &str {
    match configured.map(str::trim) {
        Some(url) if !url.is_empty() => url,
        _ => DEFAULT_EMBED_URL,
    }
}
