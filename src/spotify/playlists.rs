use super::{ApiError, SpotifyClient};
use crate::types::{GetUserPlaylistsResponse, Playlist};

impl SpotifyClient {
    /// First page of the current user's playlists.
    pub async fn current_user_playlists(
        &self,
        token: &str,
        limit: u32,
    ) -> Result<Vec<Playlist>, ApiError> {
        let limit = limit.clamp(1, 50).to_string();
        let request = self
            .http()
            .get(self.api("/me/playlists"))
            .query(&[("limit", limit.as_str())])
            .bearer_auth(token);

        let response = self.execute(request).await?;
        Ok(response.json::<GetUserPlaylistsResponse>().await?.items)
    }
}
