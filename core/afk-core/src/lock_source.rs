//! Platform lock-state sources for the event bridge.

use crate::bridge::LockStateSource;

/// Returns the lock-state source for this platform, if there is one.
pub fn platform_source() -> Option<Box<dyn LockStateSource>> {
    #[cfg(target_os = "macos")]
    {
        Some(Box::new(macos::SessionDictionarySource))
    }
    #[cfg(target_os = "linux")]
    {
        Some(Box::new(linux::LoginctlSource::from_env()))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

impl LockStateSource for Box<dyn LockStateSource> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn is_locked(&mut self) -> Result<bool, String> {
        (**self).is_locked()
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use crate::bridge::LockStateSource;
    use core_foundation::base::TCFType;
    use core_foundation::string::CFString;
    use core_foundation_sys::base::{CFRelease, CFTypeRef};
    use core_foundation_sys::dictionary::{CFDictionaryGetValue, CFDictionaryRef};
    use core_foundation_sys::number::{CFBooleanGetValue, CFBooleanRef};
    use std::ffi::c_void;

    const SCREEN_LOCKED_KEY: &str = "CGSSessionScreenIsLocked";

    /// Reads `CGSSessionScreenIsLocked` from the current session dictionary.
    pub struct SessionDictionarySource;

    impl LockStateSource for SessionDictionarySource {
        fn name(&self) -> &'static str {
            "cg-session"
        }

        fn is_locked(&mut self) -> Result<bool, String> {
            unsafe {
                let dict_ref = CGSessionCopyCurrentDictionary();
                if dict_ref.is_null() {
                    return Err("CGSessionCopyCurrentDictionary returned null".to_string());
                }

                let key = CFString::new(SCREEN_LOCKED_KEY);
                let value =
                    CFDictionaryGetValue(dict_ref, key.as_concrete_TypeRef().cast::<c_void>());
                let locked = if value.is_null() {
                    false
                } else {
                    CFBooleanGetValue(value as CFBooleanRef)
                };

                CFRelease(dict_ref as CFTypeRef);
                Ok(locked)
            }
        }
    }

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn CGSessionCopyCurrentDictionary() -> CFDictionaryRef;
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use crate::bridge::LockStateSource;
    use std::env;
    use std::process::Command;

    /// Reads the logind `LockedHint` of the user's session.
    pub struct LoginctlSource {
        session: String,
    }

    impl LoginctlSource {
        pub fn from_env() -> Self {
            let session = env::var("XDG_SESSION_ID")
                .ok()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| "auto".to_string());
            Self { session }
        }
    }

    impl LockStateSource for LoginctlSource {
        fn name(&self) -> &'static str {
            "loginctl"
        }

        fn is_locked(&mut self) -> Result<bool, String> {
            let output = Command::new("loginctl")
                .args(["show-session", &self.session, "-p", "LockedHint", "--value"])
                .output()
                .map_err(|err| format!("failed to run loginctl: {}", err))?;
            if !output.status.success() {
                return Err(format!(
                    "loginctl exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }
            parse_locked_hint(&String::from_utf8_lossy(&output.stdout))
        }
    }

    pub(super) fn parse_locked_hint(value: &str) -> Result<bool, String> {
        match value.trim() {
            "yes" => Ok(true),
            "no" => Ok(false),
            other => Err(format!("unexpected LockedHint value: {:?}", other)),
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::linux::parse_locked_hint;

    #[test]
    fn parses_locked_hint_values() {
        assert_eq!(parse_locked_hint("yes\n"), Ok(true));
        assert_eq!(parse_locked_hint("no"), Ok(false));
        assert!(parse_locked_hint("").is_err());
    }
}
