//! Operating-system family detection.
//!
//! The probe and parser used for each metric depend only on the coarse OS
//! family, never on the exact distribution or release.

use serde::Serialize;

/// Substring identifying Windows in a lower-cased OS name.
const WINDOWS_MARKER: &str = "windows";
/// Substring identifying Linux in a lower-cased OS name.
const LINUX_MARKER: &str = "linux";

/// Coarse platform classification driving probe and parser selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
    Unsupported,
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "Windows"),
            OsFamily::Linux => write!(f, "Linux"),
            OsFamily::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Returns the OS name reported by the running environment.
pub fn os_name() -> &'static str {
    std::env::consts::OS
}

/// Classifies the running environment.
pub fn resolve_os_family() -> OsFamily {
    resolve_os_family_from(os_name())
}

/// Classifies an OS name by case-insensitive substring match.
///
/// "windows" is tested before "linux". Names matching neither map to
/// [`OsFamily::Unsupported`]; deciding whether that is fatal is left to the
/// caller.
pub fn resolve_os_family_from(name: &str) -> OsFamily {
    let lower = name.to_lowercase();
    if lower.contains(WINDOWS_MARKER) {
        OsFamily::Windows
    } else if lower.contains(LINUX_MARKER) {
        OsFamily::Linux
    } else {
        OsFamily::Unsupported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_names() {
        assert_eq!(resolve_os_family_from("Windows 10"), OsFamily::Windows);
        assert_eq!(resolve_os_family_from("windows"), OsFamily::Windows);
        assert_eq!(
            resolve_os_family_from("Windows Server 2019"),
            OsFamily::Windows
        );
    }

    #[test]
    fn test_linux_names() {
        assert_eq!(resolve_os_family_from("Linux"), OsFamily::Linux);
        assert_eq!(resolve_os_family_from("linux"), OsFamily::Linux);
        assert_eq!(resolve_os_family_from("GNU/LINUX"), OsFamily::Linux);
    }

    #[test]
    fn test_unsupported_names() {
        assert_eq!(resolve_os_family_from("Mac OS X"), OsFamily::Unsupported);
        assert_eq!(resolve_os_family_from("macos"), OsFamily::Unsupported);
        assert_eq!(resolve_os_family_from("SunOS"), OsFamily::Unsupported);
        assert_eq!(resolve_os_family_from(""), OsFamily::Unsupported);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        for name in ["Linux", "Windows 11", "FreeBSD"] {
            assert_eq!(resolve_os_family_from(name), resolve_os_family_from(name));
        }
    }

    #[test]
    fn test_current_platform_matches_os_name() {
        assert_eq!(resolve_os_family(), resolve_os_family_from(os_name()));
    }
}
