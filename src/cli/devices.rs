use tabled::Table;

use super::common::{access_token, resolve_user, spinner};
use crate::{
    config::Settings, error, management::TokenStore, spotify::SpotifyClient, success,
    types::DeviceTableRow, warning,
};

pub async fn devices(settings: Settings, user: Option<String>) {
    let tokens = TokenStore::new(settings.data_dir.clone());
    let spotify = SpotifyClient::new(settings.spotify.clone());
    let uid = resolve_user(&tokens, user).await;
    let token = access_token(&tokens, &spotify, &uid).await;

    let pb = spinner("Fetching Spotify devices...");
    let devices = match spotify.devices(&token).await {
        Ok(devices) => devices,
        Err(e) => {
            pb.finish_and_clear();
            error!("Failed to fetch devices: {}", e);
        }
    };
    pb.finish_and_clear();

    if devices.is_empty() {
        warning!("No Spotify devices available. Open Spotify on a device first.");
        return;
    }

    let rows: Vec<DeviceTableRow> = devices
        .into_iter()
        .map(|d| DeviceTableRow {
            name: d.name,
            kind: d.device_type,
            active: if d.is_active { "yes" } else { "" }.to_string(),
            id: d.id.unwrap_or_default(),
        })
        .collect();

    success!("Found {} devices", rows.len());
    println!("{}", Table::new(rows));
}
