mod auth;
pub mod proxy;
mod session;
mod state;

pub use auth::StoreError;
pub use auth::TokenStore;
pub use proxy::ProxyError;
pub use session::SESSION_COOKIE;
pub use session::SessionStore;
pub use state::DEVICE_ID_KEY;
pub use state::DeviceStore;
pub use state::FileDeviceStore;
pub use state::MemoryDeviceStore;
