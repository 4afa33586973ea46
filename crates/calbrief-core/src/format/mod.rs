//! Digest rendering.
//!
//! This module turns an aggregated event sequence into the text that is sent
//! to the chat channel. Rendering depends on two choices made at startup:
//! - the [`ProviderKind`] decides grouping and the per-event line
//! - the [`MessengerKind`] decides escaping
//!
//! Calendar data never turns into markup for either messenger. Telegram text
//! is escaped for `MarkdownV2`. Matrix text is escaped for `CommonMark`, and
//! raw HTML is dropped to plain text when the digest is converted.
//!
//! # Example
//!
//! ```rust
//! use calbrief_core::format::DigestRenderer;
//! use calbrief_core::{MessengerKind, ProviderKind};
//! use chrono::Utc;
//!
//! let renderer = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Telegram, 7);
//! let digest = renderer.render_at(&[], &Utc::now());
//! assert_eq!(digest, "Keine Termine in den nächsten 7 Tagen gefunden\\.");
//! ```

use std::borrow::Cow;

use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc};
use pulldown_cmark::{Event as MdEvent, Options, Parser, html};

use crate::event::{Event, MessengerKind, ProviderKind};
use crate::time::{days_until, normalized_annual_day, whole_years_between};

/// Characters with a meaning in Telegram `MarkdownV2`.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];

/// Characters that open inline `CommonMark` constructs.
const COMMONMARK_INLINE_SPECIAL: &[char] = &['\\', '`', '*', '_', '[', ']', '<'];

const CALENDAR_ICON: &str = "📅";
const PARTY_ICON: &str = "🥳";
const BIRTHDAY_LINK_LABEL: &str = "Monica";
const LOCATION_LINK_LABEL: &str = "Ort";
const ALL_DAY_LABEL: &str = "ganztägig";

/// Renders event sequences into a chat digest.
#[derive(Debug, Clone, Copy)]
pub struct DigestRenderer {
    provider: ProviderKind,
    messenger: MessengerKind,
    duration_days: u32,
}

impl DigestRenderer {
    /// Creates a renderer for the given provider, messenger and window length.
    pub fn new(provider: ProviderKind, messenger: MessengerKind, duration_days: u32) -> Self {
        Self {
            provider,
            messenger,
            duration_days,
        }
    }

    /// Renders the digest relative to the current local time.
    pub fn render(&self, events: &[Event]) -> String {
        self.render_at(events, &Local::now())
    }

    /// Renders the digest relative to `now`.
    ///
    /// `now` decides the year birthdays are projected onto and the countdown
    /// shown per birthday. This variant is useful for testing with a fixed
    /// time.
    pub fn render_at<Tz: TimeZone>(&self, events: &[Event], now: &DateTime<Tz>) -> String {
        let mut markup = Markup::new(self.messenger);

        if events.is_empty() {
            markup.text(&fallback_message(self.provider, self.duration_days));
            return markup.finish();
        }

        markup
            .text(&format!(
                "{PARTY_ICON} Die nächsten {} Tage {PARTY_ICON}",
                self.duration_days
            ))
            .newline()
            .newline();

        let year = now.year();
        let now_utc = now.with_timezone(&Utc);
        let groups = match self.provider {
            ProviderKind::Birthday => {
                group_by_date(events, |e| normalized_annual_day(e.local_date(), year))
            }
            ProviderKind::Appointment => group_by_date(events, Event::local_date),
        };

        for (index, (date, group)) in groups.iter().enumerate() {
            if index > 0 {
                markup.newline();
            }
            markup.bold(&date.format("%Y-%m-%d").to_string());
            for event in group {
                markup.newline();
                match self.provider {
                    ProviderKind::Birthday => birthday_line(&mut markup, event, year, now_utc),
                    ProviderKind::Appointment => appointment_line(&mut markup, event),
                }
            }
        }

        tracing::debug!(
            provider = %self.provider,
            messenger = %self.messenger,
            events = events.len(),
            groups = groups.len(),
            "Rendered digest"
        );

        markup.finish()
    }
}

/// Returns the unescaped message used when there is nothing to report.
pub fn fallback_message(provider: ProviderKind, duration_days: u32) -> String {
    match provider {
        ProviderKind::Birthday => {
            format!("Keine Geburtstage in den nächsten {duration_days} Tagen!")
        }
        ProviderKind::Appointment => {
            format!("Keine Termine in den nächsten {duration_days} Tagen gefunden.")
        }
    }
}

fn group_by_date<F>(events: &[Event], key: F) -> Vec<(NaiveDate, Vec<&Event>)>
where
    F: Fn(&Event) -> NaiveDate,
{
    let mut groups: Vec<(NaiveDate, Vec<&Event>)> = Vec::new();
    for event in events {
        let date = key(event);
        match groups.iter_mut().find(|(d, _)| *d == date) {
            Some((_, group)) => group.push(event),
            None => groups.push((date, vec![event])),
        }
    }
    groups
}

fn birthday_line(markup: &mut Markup, event: &Event, year: i32, now: DateTime<Utc>) {
    let annual = event.annual_date(year);
    let age = whole_years_between(event.local_date(), annual.date_naive());
    let days = days_until(annual, now);

    markup.text(&format!(
        "{CALENDAR_ICON} {} wird {age} in {days} Tagen",
        event.summary
    ));
    link_part(markup, event, BIRTHDAY_LINK_LABEL);
}

fn appointment_line(markup: &mut Markup, event: &Event) {
    let time = if event.all_day {
        ALL_DAY_LABEL.to_string()
    } else {
        event.date.format("%H:%M").to_string()
    };

    markup.text(&format!("{CALENDAR_ICON} {time} {}", event.summary));
    link_part(markup, event, LOCATION_LINK_LABEL);
    if !event.calendar_name.is_empty() {
        markup.text(&format!(" ({})", event.calendar_name));
    }
}

fn link_part(markup: &mut Markup, event: &Event, label: &str) {
    if event.link.is_empty() {
        return;
    }
    markup.text(" (");
    if event.has_url() {
        markup.link(label, &event.link);
    } else {
        markup.text(&event.link);
    }
    markup.text(")");
}

/// Accumulates digest text, escaping literal fragments for the target
/// messenger while passing structural markup through untouched.
struct Markup {
    messenger: MessengerKind,
    out: String,
}

impl Markup {
    fn new(messenger: MessengerKind) -> Self {
        Self {
            messenger,
            out: String::new(),
        }
    }

    fn text(&mut self, s: &str) -> &mut Self {
        match self.messenger {
            MessengerKind::Telegram => self.out.push_str(&escape_markdown_v2(s)),
            MessengerKind::Matrix => self.out.push_str(&escape_commonmark(s)),
        }
        self
    }

    fn raw(&mut self, s: &str) -> &mut Self {
        self.out.push_str(s);
        self
    }

    fn newline(&mut self) -> &mut Self {
        self.raw("\n")
    }

    fn bold(&mut self, s: &str) -> &mut Self {
        self.raw("*").text(s).raw("*")
    }

    fn link(&mut self, label: &str, target: &str) -> &mut Self {
        self.raw("[").text(label).raw("](");
        match self.messenger {
            MessengerKind::Telegram => self.out.push_str(&escape_link_target(target)),
            MessengerKind::Matrix => self.out.push_str(&escape_commonmark_destination(target)),
        }
        self.raw(")")
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Escapes text for Telegram `MarkdownV2`.
///
/// Every character with a markup meaning is prefixed with a backslash.
pub fn escape_markdown_v2(s: &str) -> Cow<'_, str> {
    if !s.contains(MARKDOWN_V2_SPECIAL) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Escapes inline text for the `CommonMark` body sent to Matrix.
///
/// Line breaks become spaces so the text cannot start a block of its own.
pub fn escape_commonmark(s: &str) -> Cow<'_, str> {
    if !s.contains(COMMONMARK_INLINE_SPECIAL) && !s.contains(['\r', '\n']) {
        return Cow::Borrowed(s);
    }
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\r' | '\n' => escaped.push(' '),
            c if COMMONMARK_INLINE_SPECIAL.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Escapes a URL for use as a `MarkdownV2` inline link target.
///
/// Inside `(...)` only `)` and `\` need escaping.
pub fn escape_link_target(url: &str) -> Cow<'_, str> {
    if !url.contains([')', '\\']) {
        return Cow::Borrowed(url);
    }
    Cow::Owned(url.replace('\\', "\\\\").replace(')', "\\)"))
}

/// Escapes a URL for use as a `CommonMark` inline link destination.
fn escape_commonmark_destination(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len() + 4);
    for c in url.chars() {
        match c {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            ' ' => escaped.push_str("%20"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Converts a markdown digest into HTML for messengers with rich-text bodies.
///
/// Line breaks inside a paragraph are kept as `<br />`. Raw HTML in the input
/// is emitted as escaped text.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::empty()).map(|event| match event {
        MdEvent::SoftBreak => MdEvent::HardBreak,
        MdEvent::Html(raw) | MdEvent::InlineHtml(raw) => MdEvent::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn plus1(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        plus1(2025, 2, 5, 8, 0)
    }

    mod escaping {
        use super::*;

        #[test]
        fn plain_text_is_borrowed() {
            assert!(matches!(escape_markdown_v2("Alice"), Cow::Borrowed("Alice")));
        }

        #[test]
        fn escapes_every_special_character() {
            assert_eq!(
                escape_markdown_v2("a_b*c[d]e(f)g~h`i>j#k+l-m=n|o{p}q.r!s\\t"),
                "a\\_b\\*c\\[d\\]e\\(f\\)g\\~h\\`i\\>j\\#k\\+l\\-m\\=n\\|o\\{p\\}q\\.r\\!s\\\\t"
            );
        }

        #[test]
        fn commonmark_escapes_inline_syntax_only() {
            assert_eq!(
                escape_commonmark("<b>*x*</b> [a](b) `c` d_e \\"),
                "\\<b>\\*x\\*\\</b> \\[a\\](b) \\`c\\` d\\_e \\\\"
            );
            assert!(matches!(
                escape_commonmark("Hauptstraße 5, Berlin (Team-Kalender)"),
                Cow::Borrowed(_)
            ));
            assert_eq!(escape_commonmark("a\n- b"), "a - b");
        }

        #[test]
        fn commonmark_destination_escapes_parens() {
            assert_eq!(
                escape_commonmark_destination("https://example.org/a_(b) c"),
                "https://example.org/a_\\(b\\)%20c"
            );
        }

        #[test]
        fn link_target_escapes_only_paren_and_backslash() {
            assert_eq!(
                escape_link_target("https://example.org/a_(b)"),
                "https://example.org/a_(b\\)"
            );
            assert!(matches!(
                escape_link_target("https://example.org/x-y"),
                Cow::Borrowed(_)
            ));
        }
    }

    mod fallback {
        use super::*;

        #[test]
        fn birthday_wording() {
            let r = DigestRenderer::new(ProviderKind::Birthday, MessengerKind::Matrix, 7);
            assert_eq!(
                r.render_at(&[], &now()),
                "Keine Geburtstage in den nächsten 7 Tagen!"
            );
        }

        #[test]
        fn appointment_wording_is_parameterized() {
            let r = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Matrix, 14);
            assert_eq!(
                r.render_at(&[], &now()),
                "Keine Termine in den nächsten 14 Tagen gefunden."
            );
        }

        #[test]
        fn telegram_fallback_is_escaped() {
            let r = DigestRenderer::new(ProviderKind::Birthday, MessengerKind::Telegram, 7);
            assert_eq!(
                r.render_at(&[], &now()),
                "Keine Geburtstage in den nächsten 7 Tagen\\!"
            );
        }
    }

    mod birthday {
        use super::*;

        #[test]
        fn age_and_countdown() {
            let r = DigestRenderer::new(ProviderKind::Birthday, MessengerKind::Matrix, 7);
            let events = [Event::new("Alice", plus1(1990, 2, 7, 0, 0))
                .with_link("https://monica.example/people/1")];

            let digest = r.render_at(&events, &now());
            assert!(
                digest.contains("📅 Alice wird 35 in 2 Tagen ([Monica](https://monica.example/people/1))"),
                "{digest}"
            );
        }

        #[test]
        fn plain_link_and_missing_link() {
            let r = DigestRenderer::new(ProviderKind::Birthday, MessengerKind::Matrix, 7);
            let events = [
                Event::new("Bob", plus1(2000, 2, 6, 0, 0)).with_link("see address book"),
                Event::new("Carol", plus1(2000, 2, 6, 0, 0)),
            ];

            let digest = r.render_at(&events, &now());
            assert!(digest.contains("📅 Bob wird 25 in 1 Tagen (see address book)"));
            assert!(digest.ends_with("📅 Carol wird 25 in 1 Tagen"), "{digest}");
        }

        #[test]
        fn groups_by_normalized_date() {
            let r = DigestRenderer::new(ProviderKind::Birthday, MessengerKind::Matrix, 7);
            let events = [
                Event::new("Alice", plus1(1990, 2, 6, 0, 0)),
                Event::new("Bob", plus1(1985, 2, 6, 0, 0)),
            ];

            let digest = r.render_at(&events, &now());
            assert_eq!(digest.matches("*2025-02-06*").count(), 1);
        }
    }

    mod appointment {
        use super::*;

        #[test]
        fn line_with_url_and_calendar() {
            let r = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Matrix, 7);
            let events = [Event::new("Standup", plus1(2025, 2, 6, 9, 30))
                .with_link("https://meet.example/standup")
                .with_calendar_name("Work")];

            let digest = r.render_at(&events, &now());
            assert!(digest.contains("📅 09:30 Standup ([Ort](https://meet.example/standup)) (Work)"));
        }

        #[test]
        fn omits_empty_link_and_calendar() {
            let r = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Matrix, 7);
            let events = [Event::new("Gym", plus1(2025, 2, 6, 18, 0))];

            let digest = r.render_at(&events, &now());
            assert!(digest.ends_with("📅 18:00 Gym"), "{digest}");
        }

        #[test]
        fn all_day_label() {
            let r = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Matrix, 7);
            let events = [Event::new("Holiday", plus1(2025, 2, 6, 0, 0)).with_all_day(true)];

            let digest = r.render_at(&events, &now());
            assert!(digest.ends_with("📅 ganztägig Holiday"), "{digest}");
        }

        #[test]
        fn groups_by_actual_date_in_first_appearance_order() {
            let r = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Matrix, 7);
            let events = [
                Event::new("A", plus1(2025, 2, 7, 9, 0)),
                Event::new("B", plus1(2025, 2, 6, 9, 0)),
                Event::new("C", plus1(2025, 2, 7, 11, 0)),
            ];

            let digest = r.render_at(&events, &now());
            let first = digest.find("*2025-02-07*").unwrap();
            let second = digest.find("*2025-02-06*").unwrap();
            assert!(first < second);
            assert_eq!(digest.matches("*2025-02-07*").count(), 1);
        }

        #[test]
        fn telegram_escapes_user_data_but_not_structure() {
            let r = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Telegram, 7);
            let events = [Event::new("Q&A (v1.2)", plus1(2025, 2, 6, 9, 0))
                .with_link("https://example.org/a_b")
                .with_calendar_name("Team-Kalender")];

            let digest = r.render_at(&events, &now());
            assert!(digest.contains("*2025\\-02\\-06*"));
            assert!(digest.contains(
                "📅 09:00 Q&A \\(v1\\.2\\) \\([Ort](https://example.org/a_b)\\) \\(Team\\-Kalender\\)"
            ));
        }
    }

    mod html {
        use super::*;

        #[test]
        fn converts_bold_links_and_line_breaks() {
            let out = markdown_to_html("*2025-02-06*\n📅 Standup ([Ort](https://x.example))");
            assert!(out.contains("<em>2025-02-06</em><br />"), "{out}");
            assert!(out.contains("<a href=\"https://x.example\">Ort</a>"), "{out}");
        }

        #[test]
        fn raw_html_is_not_passed_through() {
            let out = markdown_to_html("<script>alert(1)</script>\n\nx <img src=y onerror=z> y");
            assert!(!out.contains("<script"), "{out}");
            assert!(!out.contains("<img"), "{out}");
            assert!(out.contains("&lt;img src=y onerror=z&gt;"), "{out}");
        }

        #[test]
        fn matrix_digest_keeps_calendar_data_literal() {
            let r = DigestRenderer::new(ProviderKind::Appointment, MessengerKind::Matrix, 7);
            let events = [Event::new("<img src=x onerror=alert(1)> *wichtig*", plus1(2025, 2, 6, 9, 0))
                .with_link("https://meet.example/a_(b)")
                .with_calendar_name("<b>Team</b>")];

            let digest = r.render_at(&events, &now());
            let out = markdown_to_html(&digest);
            assert!(!out.contains("<img"), "{out}");
            assert!(!out.contains("<b>"), "{out}");
            assert!(!out.contains("<em>wichtig</em>"), "{out}");
            assert!(out.contains("*wichtig*"), "{out}");
            assert!(out.contains("<a href=\"https://meet.example/a_(b)\">Ort</a>"), "{out}");
            assert!(out.contains("<em>2025-02-06</em>"), "{out}");
        }
    }

    #[test]
    fn never_panics_on_odd_input() {
        let events = [
            Event::new("", plus1(2000, 2, 29, 0, 0)),
            Event::new("\\*_[", plus1(1, 1, 1, 0, 0)).with_link("http"),
            Event::new("x", plus1(9999, 12, 31, 23, 59)).with_link(")(\\"),
        ];
        for provider in [ProviderKind::Birthday, ProviderKind::Appointment] {
            for messenger in [MessengerKind::Telegram, MessengerKind::Matrix] {
                let digest = DigestRenderer::new(provider, messenger, 7).render_at(&events, &now());
                assert!(!digest.is_empty());
            }
        }
    }
}
