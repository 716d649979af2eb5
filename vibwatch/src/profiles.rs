//! Connection profiles: JSON mapping of profile name -> { url, http }
//! Stored under $XDG_CONFIG_HOME/vibwatch/profiles.json (fallback ~/.config/vibwatch/profiles.json)

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, io, path::PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProfileEntry {
    pub url: String,
    /// Polling base when it cannot be derived from `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub version: u32,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("vibwatch")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vibwatch")
    }
}

/// Where the history store and log file live.
pub fn data_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        PathBuf::from(xdg).join("vibwatch")
    } else {
        dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vibwatch")
    }
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("profiles.json")
}

pub fn load_profiles() -> ProfilesFile {
    match fs::read_to_string(profiles_path()) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
        Err(_) => ProfilesFile::default(),
    }
}

pub fn save_profiles(p: &ProfilesFile) -> io::Result<()> {
    let path = profiles_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(p).map_err(io::Error::other)?;
    fs::write(path, data)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResolveProfile {
    /// Use the provided runtime inputs (may be saved by the caller)
    Direct(ProfileEntry),
    /// Loaded from an existing profile entry
    Loaded(ProfileEntry),
    /// Should prompt user to select among profile names
    PromptSelect(Vec<String>),
    /// Named profile does not exist and no URL was given
    PromptCreate(String),
    /// Nothing to connect to
    None,
}

pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub url: Option<String>,
    pub http: Option<String>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile) -> ResolveProfile {
        match (self.profile_name, self.url) {
            (_, Some(url)) => ResolveProfile::Direct(ProfileEntry {
                url,
                http: self.http,
            }),
            (Some(name), None) => match pf.profiles.get(&name) {
                Some(entry) => ResolveProfile::Loaded(entry.clone()),
                None => ResolveProfile::PromptCreate(name),
            },
            (None, None) if pf.profiles.is_empty() => ResolveProfile::None,
            (None, None) => ResolveProfile::PromptSelect(pf.profiles.keys().cloned().collect()),
        }
    }
}

/// Whether a direct entry should be written under `name`: always for a new
/// profile, for a changed one only when overwriting was allowed.
pub fn should_save(pf: &ProfilesFile, name: &str, entry: &ProfileEntry, overwrite: bool) -> bool {
    match pf.profiles.get(name) {
        None => true,
        Some(existing) => existing != entry && overwrite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_with(name: &str, url: &str) -> ProfilesFile {
        let mut pf = ProfilesFile::default();
        pf.profiles.insert(
            name.into(),
            ProfileEntry {
                url: url.into(),
                http: None,
            },
        );
        pf
    }

    #[test]
    fn url_wins_over_profile() {
        let pf = file_with("plant", "ws://a/ws");
        let r = ProfileRequest {
            profile_name: Some("plant".into()),
            url: Some("ws://b/ws".into()),
            http: None,
        }
        .resolve(&pf);
        assert_eq!(
            r,
            ResolveProfile::Direct(ProfileEntry {
                url: "ws://b/ws".into(),
                http: None
            })
        );
    }

    #[test]
    fn name_only_loads_or_prompts() {
        let pf = file_with("plant", "ws://a/ws");
        let req = |n: &str| ProfileRequest {
            profile_name: Some(n.into()),
            url: None,
            http: None,
        };
        assert!(matches!(req("plant").resolve(&pf), ResolveProfile::Loaded(e) if e.url == "ws://a/ws"));
        assert_eq!(req("lab").resolve(&pf), ResolveProfile::PromptCreate("lab".into()));
    }

    #[test]
    fn nothing_given() {
        let empty = ProfileRequest {
            profile_name: None,
            url: None,
            http: None,
        };
        assert_eq!(empty.resolve(&ProfilesFile::default()), ResolveProfile::None);
        let pf = file_with("plant", "ws://a/ws");
        let r = ProfileRequest {
            profile_name: None,
            url: None,
            http: None,
        }
        .resolve(&pf);
        assert_eq!(r, ResolveProfile::PromptSelect(vec!["plant".into()]));
    }

    #[test]
    fn save_policy() {
        let pf = file_with("plant", "ws://a/ws");
        let same = ProfileEntry {
            url: "ws://a/ws".into(),
            http: None,
        };
        let changed = ProfileEntry {
            url: "ws://b/ws".into(),
            http: None,
        };
        assert!(should_save(&pf, "new", &changed, false));
        assert!(!should_save(&pf, "plant", &same, true));
        assert!(!should_save(&pf, "plant", &changed, false));
        assert!(should_save(&pf, "plant", &changed, true));
    }
}
