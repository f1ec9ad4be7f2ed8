//! Application-wide constants
//!
//! File names, buffer capacities and timing defaults shared by the
//! persistence, scheduling and command layers.

/// Flash file names (primary = last confirmed-good, shadow = working copy)
pub mod files {
    pub const SETTINGS: &str = "/settings.json";
    pub const SETTINGS_SHADOW: &str = "/settings.json.save";
    pub const EFFECTS: &str = "/effects.json";
    pub const EFFECTS_SHADOW: &str = "/effects.json.save";

    /// Suffix of the staging file a copy is written to before it replaces its target
    pub const STAGING_SUFFIX: &str = ".tmp";

    /// Copy block size in bytes
    pub const COPY_BLOCK_SIZE: usize = 64;
}

/// Serialized document capacities in bytes
pub mod capacity {
    pub const SETTINGS: usize = 512 * 2;
    pub const EFFECTS: usize = 512 * 22;
}

/// Scheduling defaults (milliseconds)
pub mod timing {
    /// Quiescence window before a dirty store is flushed
    pub const SAVE_INTERVAL_MS: u64 = 5000;

    /// Deduplicating delay for outbound state notifications
    pub const NOTIFY_DELAY_MS: u64 = 1000;

    /// Host loop tick period
    pub const TICK_MS: u64 = 20;
}

/// Device defaults written on first boot
pub mod defaults {
    pub const MATRIX_ORDER: &str = "grb";
    pub const MDNS_NAME: &str = "firelamp";
    pub const AP_NAME: &str = "Fire Lamp";
    pub const NTP_SERVER: &str = "europe.pool.ntp.org";
    pub const HOSTNAME: &str = "firelamp";
    pub const MQTT_PORT: u16 = 1883;
    pub const MQTT_NAME: &str = "Fire Lamp";
    pub const MQTT_MODEL: &str = "Fire Lamp";
    pub const MANUFACTURER: &str = "coderus";

    /// Button pin value meaning "no button fitted"
    pub const BUTTON_PIN_ABSENT: u8 = 255;
}

/// Pub/sub topic layout
pub mod topics {
    pub const DISCOVERY_PREFIX: &str = "homeassistant/light/";
    pub const SET_SUFFIX: &str = "/set";
    pub const STATE_SUFFIX: &str = "/state";
    pub const CONFIG_SUFFIX: &str = "/config";
    pub const AVAILABLE_SUFFIX: &str = "/available";
    pub const CLIENT_ID_PREFIX: &str = "FireLampClient-";
}

/// Effect ids with special meaning to the command layer
pub mod effects {
    /// Effect forced active when a state command carries a color
    pub const COLOR_ID: &str = "Color";
}

/// Host binary paths
pub mod paths {
    pub const APP_DIR: &str = "firelamp";
    pub const MACHINE_ID: &str = "/etc/machine-id";
}

/// Process exit status used when the core asks for a device restart
pub const RESTART_EXIT_CODE: i32 = 3;
