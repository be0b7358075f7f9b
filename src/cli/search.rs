use tabled::Table;

use super::common::{access_token, resolve_user, spinner};
use crate::{
    config::Settings, error, management::TokenStore, spotify::SpotifyClient, success,
    types::TrackTableRow, utils, warning,
};

pub async fn search(settings: Settings, query: &str, user: Option<String>) {
    let query = query.trim();
    if query.is_empty() {
        error!("No search query provided");
    }

    let tokens = TokenStore::new(settings.data_dir.clone());
    let spotify = SpotifyClient::new(settings.spotify.clone());
    let uid = resolve_user(&tokens, user).await;
    let token = access_token(&tokens, &spotify, &uid).await;

    let pb = spinner(&format!("Searching tracks for '{}'...", query));
    let tracks = match spotify
        .search_tracks(
            &token,
            query,
            settings.search_limit,
            &settings.search_market,
        )
        .await
    {
        Ok(tracks) => tracks,
        Err(e) => {
            pb.finish_and_clear();
            error!("Search failed: {}", e);
        }
    };
    pb.finish_and_clear();

    if tracks.is_empty() {
        warning!("No tracks found for '{}'", query);
        return;
    }

    let rows: Vec<TrackTableRow> = tracks.iter().map(utils::track_table_row).collect();
    success!("Found {} tracks", rows.len());
    println!("{}", Table::new(rows));
}
