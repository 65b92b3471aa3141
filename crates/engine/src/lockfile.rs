//! Line-oriented lockfile codec
//!
//! One LF-delimited line per resolution entry; the first
//! whitespace-separated token names the source, the rest is
//! driver-specific. Malformed lines for a known source are dropped
//! with a warning; an unknown source tag fails the whole load.

use pakt_errors::Error;
use pakt_events::{Event, EventSender, EventSenderExt};
use pakt_sources::{
    GitDriver, GitResolution, LocalDriver, LocalResolution, PkgDriver, PkgResolution, SourceDriver,
    UrlDriver, UrlResolution,
};

/// Parse result: one entry table per source, in load order
#[derive(Debug, Default)]
pub(crate) struct Resolutions {
    pub pkg: Vec<PkgResolution>,
    pub local: Vec<LocalResolution>,
    pub url: Vec<UrlResolution>,
    pub git: Vec<GitResolution>,
}

/// Parse lockfile text.
///
/// Entries all start out stale; reconciliation binds the ones this run
/// actually uses.
pub(crate) fn parse(text: &str, tx: &EventSender) -> Result<Resolutions, Error> {
    let mut out = Resolutions::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(tag) = fields.next() else {
            continue;
        };

        let outcome = match tag {
            "pkg" => PkgDriver::parse_lock_line(&mut fields).map(|entry| out.pkg.push(entry)),
            "local" => LocalDriver::parse_lock_line(&mut fields).map(|entry| out.local.push(entry)),
            "url" => UrlDriver::parse_lock_line(&mut fields).map(|entry| out.url.push(entry)),
            "git" => GitDriver::parse_lock_line(&mut fields).map(|entry| out.git.push(entry)),
            other => {
                tx.emit(Event::Error {
                    message: format!("unknown source tag '{other}' in lockfile line {}", idx + 1),
                    details: Some(raw.to_string()),
                });
                return Err(Error::Explained);
            }
        };

        if let Err(err) = outcome {
            tx.emit(Event::warning_with_context(
                format!("dropping malformed lockfile line {}: {}", idx + 1, err.kind()),
                raw.to_string(),
            ));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pakt_hash::Hash;

    fn collect_events(mut rx: pakt_events::EventReceiver) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn empty_text_yields_empty_tables() {
        let (tx, _rx) = pakt_events::channel();
        let parsed = parse("", &tx).unwrap();
        assert!(parsed.pkg.is_empty());
        assert!(parsed.local.is_empty());
        assert!(parsed.url.is_empty());
        assert!(parsed.git.is_empty());
    }

    #[test]
    fn malformed_line_is_dropped_with_warning_and_rest_loads() {
        let digest_a = Hash::from_data(b"a");
        let digest_b = Hash::from_data(b"b");
        let text = format!(
            "pkg u a 1.0.0 {digest_a}\npkg garbage\npkg u b 2.0.0 {digest_b}\n"
        );

        let (tx, rx) = pakt_events::channel();
        let parsed = parse(&text, &tx).unwrap();

        assert_eq!(parsed.pkg.len(), 2);
        assert_eq!(parsed.pkg[0].name, "a");
        assert_eq!(parsed.pkg[1].name, "b");
        assert!(parsed.pkg.iter().all(|entry| entry.dep_idx.is_none()));

        let events = collect_events(rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Warning { message, context } => {
                assert!(message.contains("line 2"), "message: {message}");
                assert!(message.contains("MissingField"), "message: {message}");
                assert_eq!(context.as_deref(), Some("pkg garbage"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_fails_the_load_as_explained() {
        let (tx, rx) = pakt_events::channel();
        let err = parse("hg https://example.com/repo abc\n", &tx).unwrap_err();
        assert!(err.is_explained());

        let events = collect_events(rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::Error { message, .. } => {
                assert!(message.contains("'hg'"), "message: {message}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_skipped() {
        let (tx, _rx) = pakt_events::channel();
        let text = "\n\nlocal libs/a\n\ngit https://e.com/r main abc\n\n";
        let parsed = parse(text, &tx).unwrap();
        assert_eq!(parsed.local.len(), 1);
        assert_eq!(parsed.git.len(), 1);
    }
}
