//! Server-rendered HTML.

use crate::{
    types::{Playlist, Track},
    utils::{escape_html, format_duration, join_artist_names},
};

/// Flash text for a `?notice=` value. Unknown values render nothing.
pub fn notice_text(notice: &str) -> Option<&'static str> {
    match notice {
        "signed_in" => Some("Successfully signed in with Spotify!"),
        "auth_failed" => Some("Authentication failed. Please try again."),
        "logged_out" => Some("Logged out of Spotify."),
        "login_required" => Some("You need to log in with Spotify to access this feature."),
        _ => None,
    }
}

fn layout(title: &str, notice: Option<&str>, body: &str) -> String {
    let flash = notice
        .and_then(notice_text)
        .map(|text| format!("<p class=\"notice\">{}</p>", text))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n{flash}\n{body}\n</body>\n</html>\n",
        title = escape_html(title),
        flash = flash,
        body = body,
    )
}

fn search_form(query: &str) -> String {
    format!(
        "<form action=\"/search\" method=\"get\">\n<input type=\"search\" name=\"query\" value=\"{}\" placeholder=\"Search tracks\">\n<button type=\"submit\">Search</button>\n</form>",
        escape_html(query)
    )
}

pub fn login_page(notice: Option<&str>) -> String {
    layout(
        "syftplayer",
        notice,
        "<h1>syftplayer</h1>\n<a href=\"/login\">Log in with Spotify</a>",
    )
}

/// Player page: search form and the user's playlists. URIs are printed so
/// they can be handed to `syftplayer play`.
pub fn player_page(
    display_name: &str,
    playlists: &[Playlist],
    notice: Option<&str>,
) -> String {
    let items = if playlists.is_empty() {
        "<p>No playlists found.</p>".to_string()
    } else {
        let rows: Vec<String> = playlists
            .iter()
            .map(|p| {
                let total = p.tracks.as_ref().map(|t| t.total).unwrap_or(0);
                format!(
                    "<li>{name} <span>{total} tracks</span> <code>{uri}</code></li>",
                    uri = escape_html(&p.uri),
                    name = escape_html(&p.name),
                    total = total,
                )
            })
            .collect();
        format!("<ul class=\"playlists\">\n{}\n</ul>", rows.join("\n"))
    };

    let body = format!(
        "<div id=\"player\">\n<h1>Hello, {name}</h1>\n<p id=\"status\">No track playing</p>\n{form}\n<h2>Playlists</h2>\n{items}\n<a href=\"/logout\">Log out</a>\n</div>",
        name = escape_html(display_name),
        form = search_form(""),
        items = items,
    );
    layout("syftplayer", notice, &body)
}

pub fn search_page(query: &str, tracks: &[Track]) -> String {
    let results = if tracks.is_empty() {
        format!("<p>No tracks found for \"{}\".</p>", escape_html(query))
    } else {
        let rows: Vec<String> = tracks
            .iter()
            .map(|t| {
                format!(
                    "<tr><td>{name}</td><td>{artists}</td><td>{album}</td><td>{duration}</td><td><code>{uri}</code></td></tr>",
                    name = escape_html(&t.name),
                    artists = escape_html(&join_artist_names(&t.artists)),
                    album = escape_html(t.album.as_ref().map(|a| a.name.as_str()).unwrap_or("")),
                    duration = format_duration(t.duration_ms),
                    uri = escape_html(&t.uri),
                )
            })
            .collect();
        format!(
            "<table class=\"tracks\">\n<tr><th>Title</th><th>Artists</th><th>Album</th><th>Duration</th><th>URI</th></tr>\n{}\n</table>",
            rows.join("\n")
        )
    };

    let body = format!(
        "<h1>Search</h1>\n{form}\n{results}\n<a href=\"/player\">Back to player</a>",
        form = search_form(query),
        results = results,
    );
    layout("Search - syftplayer", None, &body)
}
