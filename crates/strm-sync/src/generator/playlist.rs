//! Extended M3U playlist for live channels.

use crate::models::VisibleChannel;

pub const M3U_HEADER: &str = "#EXTM3U";

/// Attribute values cannot carry double quotes or line breaks.
fn attribute(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' => '\'',
            '\r' | '\n' => ' ',
            c => c,
        })
        .collect()
}

/// Render the playlist, one entry per channel in the given order.
pub fn render_playlist(channels: &[VisibleChannel]) -> String {
    let mut out = String::with_capacity(64 + channels.len() * 192);
    out.push_str(M3U_HEADER);
    out.push('\n');

    for VisibleChannel {
        channel,
        category_name,
    } in channels
    {
        let mut extinf = String::from("#EXTINF:-1");
        if let Some(tvg_id) = channel.epg_channel_id.as_deref().filter(|id| !id.is_empty()) {
            extinf.push_str(&format!(" tvg-id=\"{}\"", attribute(tvg_id)));
        }
        extinf.push_str(&format!(" tvg-name=\"{}\"", attribute(&channel.name)));
        if let Some(logo) = channel.logo_url.as_deref().filter(|l| !l.is_empty()) {
            extinf.push_str(&format!(" tvg-logo=\"{}\"", attribute(logo)));
        }
        extinf.push_str(&format!(" group-title=\"{}\"", attribute(category_name)));
        extinf.push_str(&format!(
            " tvg-archive=\"{}\"",
            if channel.tv_archive { 1 } else { 0 }
        ));

        let name = channel.name.replace(['\r', '\n'], " ");
        out.push_str(&format!("{extinf},{name}\n"));
        out.push_str(channel.stream_url.trim());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LiveChannel;
    use chrono::Utc;

    fn channel(remote_id: &str, name: &str, epg: Option<&str>, archive: bool) -> VisibleChannel {
        VisibleChannel {
            channel: LiveChannel {
                id: 1,
                category_id: 1,
                remote_id: remote_id.to_string(),
                name: name.to_string(),
                stream_url: format!("http://p/live/u/p/{remote_id}.ts"),
                epg_channel_id: epg.map(str::to_string),
                logo_url: Some("http://img/logo.png".to_string()),
                tv_archive: archive,
                content_hash: "h".to_string(),
                visible: true,
                missing_runs: 0,
                last_seen_at: Utc::now(),
            },
            category_name: "News".to_string(),
        }
    }

    #[test]
    fn test_render_playlist() {
        let playlist = render_playlist(&[
            channel("1", "BBC One", Some("bbc1.uk"), true),
            channel("2", "Local \"TV\"", None, false),
        ]);
        let expected = "#EXTM3U\n\
#EXTINF:-1 tvg-id=\"bbc1.uk\" tvg-name=\"BBC One\" tvg-logo=\"http://img/logo.png\" group-title=\"News\" tvg-archive=\"1\",BBC One\n\
http://p/live/u/p/1.ts\n\
#EXTINF:-1 tvg-name=\"Local 'TV'\" tvg-logo=\"http://img/logo.png\" group-title=\"News\" tvg-archive=\"0\",Local \"TV\"\n\
http://p/live/u/p/2.ts\n";
        assert_eq!(playlist, expected);
    }

    #[test]
    fn test_empty_playlist_is_header_only() {
        assert_eq!(render_playlist(&[]), "#EXTM3U\n");
    }
}
