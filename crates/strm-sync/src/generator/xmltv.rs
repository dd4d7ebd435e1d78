//! XMLTV guide for live channels.

use std::collections::HashSet;

use quick_xml::escape::escape;

use crate::models::{EpgEntry, VisibleChannel};
use crate::utils::xmltv_parser::XMLTV_TIME_FORMAT;

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="strm-sync">
"#;

/// Render the guide: one `<channel>` per visible channel with a guide id, followed by the
/// programmes of those channels. Programmes of any other channel are left out.
pub fn render_guide(channels: &[VisibleChannel], entries: &[EpgEntry]) -> String {
    let mut out = String::with_capacity(HEADER.len() + entries.len() * 256);
    out.push_str(HEADER);

    let mut guide_ids = HashSet::new();
    for VisibleChannel { channel, .. } in channels {
        let Some(id) = channel.epg_channel_id.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };
        if !guide_ids.insert(id) {
            continue;
        }
        out.push_str(&format!("  <channel id=\"{}\">\n", escape(id)));
        out.push_str(&format!(
            "    <display-name>{}</display-name>\n",
            escape(channel.name.as_str())
        ));
        if let Some(logo) = channel.logo_url.as_deref().filter(|l| !l.is_empty()) {
            out.push_str(&format!("    <icon src=\"{}\"/>\n", escape(logo)));
        }
        out.push_str("  </channel>\n");
    }

    let mut filtered = 0usize;
    for entry in entries {
        if !guide_ids.contains(entry.channel_remote_id.as_str()) {
            filtered += 1;
            continue;
        }
        let lang = entry
            .lang
            .as_deref()
            .map(|lang| format!(" lang=\"{}\"", escape(lang)))
            .unwrap_or_default();

        out.push_str(&format!(
            "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n",
            entry.start.format(XMLTV_TIME_FORMAT),
            entry.end.format(XMLTV_TIME_FORMAT),
            escape(entry.channel_remote_id.as_str())
        ));
        out.push_str(&format!(
            "    <title{lang}>{}</title>\n",
            escape(entry.title.as_str())
        ));
        if let Some(description) = entry.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("    <desc{lang}>{}</desc>\n", escape(description)));
        }
        if let Some(category) = entry.category.as_deref().filter(|c| !c.is_empty()) {
            out.push_str(&format!(
                "    <category{lang}>{}</category>\n",
                escape(category)
            ));
        }
        out.push_str("  </programme>\n");
    }

    if filtered > 0 {
        tracing::debug!("Left {} programmes of hidden channels out of the guide", filtered);
    }

    out.push_str("</tv>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LiveChannel;
    use crate::utils::xmltv_parser::parse_xmltv_programmes;
    use chrono::{TimeZone, Utc};

    fn channel(epg: Option<&str>) -> VisibleChannel {
        VisibleChannel {
            channel: LiveChannel {
                id: 1,
                category_id: 1,
                remote_id: "1".to_string(),
                name: "News & Weather".to_string(),
                stream_url: "http://p/live/u/p/1.ts".to_string(),
                epg_channel_id: epg.map(str::to_string),
                logo_url: None,
                tv_archive: false,
                content_hash: "h".to_string(),
                visible: true,
                missing_runs: 0,
                last_seen_at: Utc::now(),
            },
            category_name: "News".to_string(),
        }
    }

    fn entry(channel: &str, hour: u32, title: &str) -> EpgEntry {
        EpgEntry {
            channel_remote_id: channel.to_string(),
            start: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 1, hour + 1, 0, 0).unwrap(),
            title: title.to_string(),
            description: Some("<live>".to_string()),
            category: None,
            lang: Some("en".to_string()),
        }
    }

    #[test]
    fn test_render_guide() {
        let guide = render_guide(
            &[channel(Some("news.uk")), channel(None)],
            &[entry("news.uk", 6, "Breakfast"), entry("other.uk", 6, "Hidden")],
        );

        assert!(guide.starts_with("<?xml"));
        assert!(guide.contains("<tv generator-info-name=\"strm-sync\">"));
        assert!(guide.contains("<display-name>News &amp; Weather</display-name>"));
        assert!(guide.contains(
            "<programme start=\"20240101060000 +0000\" stop=\"20240101070000 +0000\" channel=\"news.uk\">"
        ));
        assert!(guide.contains("<desc lang=\"en\">&lt;live&gt;</desc>"));
        assert!(!guide.contains("Hidden"));
        assert_eq!(guide.matches("<channel ").count(), 1);
        assert!(guide.ends_with("</tv>\n"));
    }

    #[test]
    fn test_rendered_guide_parses_back() {
        let entries = vec![entry("news.uk", 6, "Breakfast"), entry("news.uk", 7, "Midday")];
        let guide = render_guide(&[channel(Some("news.uk"))], &entries);

        let parsed = parse_xmltv_programmes(&guide).unwrap();
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.entries, entries);
    }
}
