pub mod realtime;

// Re-export commonly used types for convenience
pub use realtime::{
    BaseRealtime, BoxedRealtime, ConnectionState, GeminiLiveClient, GeminiLiveConfig, LiveEvent,
    RealtimeError, RealtimeProvider, RealtimeResult, ReconnectionConfig,
    create_realtime_provider, create_realtime_provider_from_enum,
    get_supported_realtime_providers,
};
