//! Shell-readable profile environment for first-boot code.
//!
//! The profile is a flat key/value mapping derived from the build
//! description. Its dump is a file of `key='value'` lines that shell
//! scripts can source.

use std::collections::BTreeMap;

use crate::config::BuildConfig;

/// A profile value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValue {
    Text(String),
    Flag(bool),
}

impl ProfileValue {
    /// Empty text and `false` are not written to the dump.
    fn is_set(&self) -> bool {
        match self {
            Self::Text(text) => !text.is_empty(),
            Self::Flag(flag) => *flag,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Flag(_) => "true".to_string(),
        }
    }
}

impl From<&str> for ProfileValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ProfileValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ProfileValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Key/value profile, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    entries: BTreeMap<String, ProfileValue>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the profile from a build description.
    pub fn from_config(config: &BuildConfig) -> Self {
        let mut profile = Self::new();
        let image = &config.image;

        profile.add("image_iname", image.name.as_str());
        let displayname = image.displayname.clone().unwrap_or_else(|| image.name.clone());
        profile.add("image_displayname", displayname);
        profile.add_optional("image_iversion", image.version.as_deref());
        profile.add_optional("image_type", image.image_type.as_deref());
        if image.image_type.as_deref() == Some("cpio") {
            profile.add("image_cpio_name", image.name.as_str());
        }
        profile.add("image_profiles", image.profiles.join(","));
        profile.add("image_initrdname", config.initrd_base_name());

        profile.add("image_delete", config.packages_to_delete.join(" "));
        profile.add("image_drivers", config.drivers.join(","));
        profile.add("image_strip_delete", config.strip.delete.join(" "));
        profile.add("image_strip_tools", config.strip.tools.join(" "));
        profile.add("image_strip_libs", config.strip.libs.join(" "));

        let preferences = &config.preferences;
        profile.add_optional("image_keytable", preferences.keytable.as_deref());
        profile.add_optional("image_timezone", preferences.timezone.as_deref());
        profile.add_optional("image_language", preferences.locale.as_deref());
        profile.add_optional("image_splash_theme", preferences.bootsplash_theme.as_deref());
        profile.add_optional("image_loader_theme", preferences.bootloader_theme.as_deref());

        let settings = &config.type_settings;
        profile.add_optional("image_cmdline", settings.kernelcmdline.as_deref());
        profile.add_optional("image_bootloader", settings.bootloader.as_deref());
        profile.add_optional("image_firmware", settings.firmware.as_deref());
        profile.add("image_compressed", settings.compressed);

        profile
    }

    /// Adds or replaces a key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<ProfileValue>) {
        self.entries.insert(key.into(), value.into());
    }

    fn add_optional(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.add(key, value);
        }
    }

    /// Removes a key if present.
    pub fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&ProfileValue> {
        self.entries.get(key)
    }

    /// Renders the shell-sourceable dump.
    ///
    /// Keys are sorted and unset values are skipped.
    pub fn create(&self) -> String {
        let mut dump = String::new();
        for (key, value) in &self.entries {
            if value.is_set() {
                dump.push_str(key);
                dump.push('=');
                dump.push_str(&shell_quote(&value.render()));
                dump.push('\n');
            }
        }
        dump
    }
}

/// Quotes a value for POSIX shells using single quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
