//! Drive and user-profile discovery.
//!
//! A drive is either a Windows drive letter (`C:`) or a directory acting as a
//! volume root, e.g. a forensic image mounted into a folder.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Drive selected when none is given on the command line.
pub const DEFAULT_DRIVE_LETTER: char = 'C';

/// Profile folders under `Users` that are not real accounts.
pub const EXCLUDED_PROFILES: [&str; 5] = [
    "Public",
    "Default",
    "Default User",
    "All Users",
    "defaultuser0",
];

/// Localized names of the profiles directory, in lookup order.
const USERS_DIR_NAMES: [&str; 2] = ["Users", "Utilisateurs"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drive {
    label: String,
    root: PathBuf,
}

impl Drive {
    pub fn letter(letter: char) -> Self {
        let letter = letter.to_ascii_uppercase();
        Self {
            label: format!("{letter}:"),
            root: PathBuf::from(format!("{letter}:\\")),
        }
    }

    pub fn mounted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            label: root.display().to_string(),
            root,
        }
    }

    /// Accepts `C`, `C:`, `C:\` or `C:/` as a drive letter; anything else is a directory root.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        if let Some(c) = chars.next() {
            let rest = chars.as_str();
            if c.is_ascii_alphabetic() && matches!(rest, "" | ":" | ":\\" | ":/") {
                return Self::letter(c);
            }
        }
        Self::mounted_at(trimmed)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join slash-free path components onto the drive root.
    pub fn join<I, S>(&self, parts: I) -> PathBuf
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let mut p = self.root.clone();
        for part in parts {
            p.push(part);
        }
        p
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Check `A:\` .. `Z:\` and return the drives whose root exists.
pub fn list_available_drives() -> Vec<Drive> {
    list_available_drives_with(|root| root.exists())
}

/// Same as [`list_available_drives`] with an injectable existence check.
pub fn list_available_drives_with(exists: impl Fn(&Path) -> bool) -> Vec<Drive> {
    ('A'..='Z')
        .map(Drive::letter)
        .filter(|d| exists(d.root()))
        .collect()
}

/// Result of enumerating user profiles on a drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserListing {
    Found { dir: PathBuf, users: Vec<String> },
    /// Neither `Users` nor a localized equivalent exists on the drive.
    NoProfilesDir { tried: PathBuf },
}

impl UserListing {
    pub fn users(&self) -> &[String] {
        match self {
            UserListing::Found { users, .. } => users,
            UserListing::NoProfilesDir { .. } => &[],
        }
    }
}

pub fn is_account_profile(name: &str) -> bool {
    !name.starts_with('.') && !EXCLUDED_PROFILES.contains(&name)
}

/// List account profile folders directly under `<drive>/Users`, sorted by name.
pub fn list_users(drive: &Drive) -> io::Result<UserListing> {
    let Some(dir) = USERS_DIR_NAMES
        .iter()
        .map(|name| drive.join([name]))
        .find(|p| p.is_dir())
    else {
        return Ok(UserListing::NoProfilesDir {
            tried: drive.join([USERS_DIR_NAMES[0]]),
        });
    };

    let mut users = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_account_profile(&name) {
            users.push(name);
        }
    }
    users.sort();
    tracing::debug!(dir = %dir.display(), count = users.len(), "listed user profiles");
    Ok(UserListing::Found { dir, users })
}
