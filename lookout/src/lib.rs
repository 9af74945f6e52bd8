pub use lookout_core::PeerId;

pub mod model {
    pub use lookout_core::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use lookout_client::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use lookout_relay::*;
}
