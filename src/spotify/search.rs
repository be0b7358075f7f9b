use super::{ApiError, SpotifyClient};
use crate::types::{SearchResponse, Track};

impl SpotifyClient {
    /// Searches tracks matching `query`.
    pub async fn search_tracks(
        &self,
        token: &str,
        query: &str,
        limit: u32,
        market: &str,
    ) -> Result<Vec<Track>, ApiError> {
        let limit = limit.clamp(1, 50).to_string();
        let request = self
            .http()
            .get(self.api("/search"))
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", limit.as_str()),
                ("market", market),
            ])
            .bearer_auth(token);

        let response = self.execute(request).await?;
        Ok(response.json::<SearchResponse>().await?.tracks.items)
    }
}
