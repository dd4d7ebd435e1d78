//! Quick-XML based XMLTV parser
//!
//! Streams through the document with the event reader and keeps only what the guide
//! needs: programme times, channel, title, description, category and language.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::models::EpgEntry;

/// XMLTV timestamp layout, `20240101120000 +0000`
pub const XMLTV_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Programmes found in a feed.
#[derive(Debug, Default)]
pub struct ParsedGuide {
    pub entries: Vec<EpgEntry>,
    /// Programmes dropped for a missing channel, title or unparseable time
    pub skipped: usize,
}

#[derive(Default)]
struct PendingProgramme {
    channel: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    lang: Option<String>,
}

impl PendingProgramme {
    fn from_start(element: &BytesStart) -> Self {
        let mut programme = Self::default();
        for attr in element.attributes().flatten() {
            let Ok(value) = attr.unescape_value() else {
                continue;
            };
            match attr.key.as_ref() {
                b"channel" => programme.channel = Some(value.trim().to_string()),
                b"start" => programme.start = parse_xmltv_time(&value),
                b"stop" => programme.end = parse_xmltv_time(&value),
                _ => {}
            }
        }
        programme
    }

    fn into_entry(self) -> Option<EpgEntry> {
        let channel_remote_id = self.channel.filter(|c| !c.is_empty())?;
        let start = self.start?;
        let end = self.end.filter(|end| *end > start)?;
        Some(EpgEntry {
            channel_remote_id,
            start,
            end,
            title: self.title?,
            description: self.description,
            category: self.category,
            lang: self.lang,
        })
    }
}

/// Parse an XMLTV timestamp. A missing offset is read as UTC.
pub fn parse_xmltv_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_str(value, XMLTV_TIME_FORMAT) {
        return Some(dt.with_timezone(&Utc));
    }
    let digits = value.get(..14)?;
    NaiveDateTime::parse_from_str(digits, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse the programmes of an XMLTV document.
pub fn parse_xmltv_programmes(content: &str) -> Result<ParsedGuide, quick_xml::Error> {
    let mut reader = Reader::from_str(content);

    let mut guide = ParsedGuide::default();
    let mut current: Option<PendingProgramme> = None;
    let mut text_lang: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                match e.local_name().as_ref() {
                    b"programme" => current = Some(PendingProgramme::from_start(&e)),
                    b"title" | b"desc" | b"category" => {
                        text_lang = e
                            .try_get_attribute("lang")
                            .ok()
                            .flatten()
                            .and_then(|a| a.unescape_value().ok())
                            .map(|v| v.into_owned());
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == b"programme" {
                    if let Some(programme) = current.take() {
                        match programme.into_entry() {
                            Some(entry) => guide.entries.push(entry),
                            None => guide.skipped += 1,
                        }
                    }
                } else if let Some(programme) = current.as_mut() {
                    let value = text.trim();
                    if !value.is_empty() {
                        match name.as_ref() {
                            // first title wins; feeds often repeat it per language
                            b"title" if programme.title.is_none() => {
                                programme.title = Some(value.to_string());
                                programme.lang = text_lang.take();
                            }
                            b"desc" if programme.description.is_none() => {
                                programme.description = Some(value.to_string());
                            }
                            b"category" if programme.category.is_none() => {
                                programme.category = Some(value.to_string());
                            }
                            _ => {}
                        }
                    }
                }
                text.clear();
            }
            Event::Text(e) => {
                if let Ok(decoded) = e.decode() {
                    text.push_str(&decoded);
                }
            }
            Event::CData(e) => {
                if let Ok(decoded) = e.decode() {
                    text.push_str(&decoded);
                }
            }
            Event::GeneralRef(e) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else if let Ok(name) = e.decode()
                    && let Some(resolved) = quick_xml::escape::resolve_xml_entity(&name)
                {
                    text.push_str(resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(guide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="panel">
  <channel id="news.uk"><display-name>News</display-name></channel>
  <programme start="20251017180000 +0100" stop="20251017190000 +0100" channel="news.uk">
    <title lang="en">Evening News</title>
    <title lang="fr">Journal</title>
    <desc lang="en">Headlines &amp; weather</desc>
    <category lang="en">News</category>
  </programme>
  <programme start="20251017190000" stop="20251017193000" channel="news.uk">
    <title><![CDATA[Sport]]></title>
  </programme>
  <programme start="garbage" stop="20251017193000 +0000" channel="news.uk">
    <title>Broken</title>
  </programme>
  <programme start="20251017200000 +0000" stop="20251017210000 +0000" channel="news.uk">
  </programme>
</tv>"#;

    #[test]
    fn test_parse_programmes() {
        let guide = parse_xmltv_programmes(FEED).unwrap();
        assert_eq!(guide.entries.len(), 2);
        assert_eq!(guide.skipped, 2);

        let news = &guide.entries[0];
        assert_eq!(news.channel_remote_id, "news.uk");
        assert_eq!(news.title, "Evening News");
        assert_eq!(news.lang.as_deref(), Some("en"));
        assert_eq!(news.description.as_deref(), Some("Headlines & weather"));
        assert_eq!(news.category.as_deref(), Some("News"));
        assert_eq!(news.start, Utc.with_ymd_and_hms(2025, 10, 17, 17, 0, 0).unwrap());

        let sport = &guide.entries[1];
        assert_eq!(sport.title, "Sport");
        assert_eq!(sport.start, Utc.with_ymd_and_hms(2025, 10, 17, 19, 0, 0).unwrap());
        assert!(sport.lang.is_none());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(parse_xmltv_programmes("<tv><programme></tv>").is_err());
    }
}
