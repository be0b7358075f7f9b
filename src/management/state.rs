use std::{path::PathBuf, sync::Arc};

use tokio::sync::Mutex;

use crate::warning;

/// Storage key of the last known device id.
pub const DEVICE_ID_KEY: &str = "spotify_device_id";

/// Where the playback session keeps the last known device id across reloads.
///
/// Failures are logged by the implementation. A lost write only costs a
/// device-list check on the next start.
#[allow(async_fn_in_trait)]
pub trait DeviceStore {
    async fn load(&self) -> Option<String>;
    async fn store(&self, device_id: &str);
    async fn clear(&self);
}

/// Device id kept in `<root>/state/spotify_device_id.json`.
#[derive(Debug, Clone)]
pub struct FileDeviceStore {
    root: PathBuf,
}

impl FileDeviceStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn get_path(&self) -> PathBuf {
        self.root.join(format!("state/{key}.json", key = DEVICE_ID_KEY))
    }
}

impl DeviceStore for FileDeviceStore {
    async fn load(&self) -> Option<String> {
        let json = async_fs::read_to_string(self.get_path()).await.ok()?;
        match serde_json::from_str::<String>(&json) {
            Ok(device_id) if !device_id.is_empty() => Some(device_id),
            Ok(_) => None,
            Err(e) => {
                warning!("Ignoring unreadable device cache: {}", e);
                None
            }
        }
    }

    async fn store(&self, device_id: &str) {
        let path = self.get_path();
        if let Some(parent) = path.parent() {
            if let Err(e) = async_fs::create_dir_all(parent).await {
                warning!("Cannot create device cache directory: {}", e);
                return;
            }
        }

        let json = match serde_json::to_string(device_id) {
            Ok(json) => json,
            Err(e) => {
                warning!("Cannot encode device id: {}", e);
                return;
            }
        };
        if let Err(e) = async_fs::write(path, json).await {
            warning!("Cannot write device cache: {}", e);
        }
    }

    async fn clear(&self) {
        match async_fs::remove_file(self.get_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warning!("Cannot clear device cache: {}", e),
        }
    }
}

/// In-memory device store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryDeviceStore {
    pub fn with_device(device_id: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(device_id.to_string()))),
        }
    }

    pub async fn get(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }
}

impl DeviceStore for MemoryDeviceStore {
    async fn load(&self) -> Option<String> {
        self.get().await
    }

    async fn store(&self, device_id: &str) {
        *self.slot.lock().await = Some(device_id.to_string());
    }

    async fn clear(&self) {
        *self.slot.lock().await = None;
    }
}
