use crate::{config::Settings, error, info, server, warning};

pub async fn serve(settings: Settings, open: bool) {
    let url = format!("{}/player", settings.public_url);
    if open {
        info!("Opening {}", url);
        if webbrowser::open(&url).is_err() {
            warning!(
                "Failed to open browser. Please navigate to the following URL manually:\n{}",
                url
            );
        }
    }

    if let Err(e) = server::start_api_server(settings).await {
        error!("Web server stopped. Err: {}", e);
    }
}
