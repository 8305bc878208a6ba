//! ICC Color Profile handling
//!
//! Thin wrapper around `moxcms::ColorProfile` that adds a stable identity
//! (name plus content fingerprint) so color spaces built on the same profile
//! compare equal even when they are distinct instances.

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::{Error, Result};

/// ICC Color Profile
#[derive(Debug, Clone)]
pub struct ColorProfile {
    name: String,
    fingerprint: u64,
    inner: moxcms::ColorProfile,
}

impl ColorProfile {
    fn builtin(name: &str, inner: moxcms::ColorProfile) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self {
            name: name.to_owned(),
            fingerprint: hasher.finish(),
            inner,
        }
    }

    /// Create a profile from raw ICC data
    ///
    /// The profile is named after its description tag, and identified by a
    /// hash of the raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let inner = moxcms::ColorProfile::new_from_slice(data)
            .map_err(|e| Error::ProfileParse(format!("{:?}", e)))?;

        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);

        let mut profile = Self {
            name: String::new(),
            fingerprint: hasher.finish(),
            inner,
        };
        profile.name = profile
            .description()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "Unnamed ICC profile".to_owned());
        Ok(profile)
    }

    /// Create a built-in sRGB profile
    pub fn new_srgb() -> Self {
        Self::builtin("sRGB built-in", moxcms::ColorProfile::new_srgb())
    }

    /// Create a built-in Display P3 profile
    pub fn new_display_p3() -> Self {
        Self::builtin("Display P3 built-in", moxcms::ColorProfile::new_display_p3())
    }

    /// Create a built-in Adobe RGB (1998) profile
    pub fn new_adobe_rgb() -> Self {
        Self::builtin("Adobe RGB (1998) built-in", moxcms::ColorProfile::new_adobe_rgb())
    }

    /// Create a built-in BT.2020 profile
    pub fn new_bt2020() -> Self {
        Self::builtin("BT.2020 built-in", moxcms::ColorProfile::new_bt2020())
    }

    /// Create a ProPhoto RGB profile (wide gamut)
    pub fn new_pro_photo_rgb() -> Self {
        Self::builtin("ProPhoto RGB built-in", moxcms::ColorProfile::new_pro_photo_rgb())
    }

    /// Create a grayscale profile with specific gamma
    pub fn new_gray_with_gamma(gamma: f32) -> Self {
        Self::builtin(
            &format!("Gray gamma {gamma} built-in"),
            moxcms::ColorProfile::new_gray_with_gamma(gamma),
        )
    }

    /// Profile name used for identity and logging
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content fingerprint used for identity
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Check if this is a matrix-shaper profile
    pub fn is_matrix_shaper(&self) -> bool {
        self.inner.is_matrix_shaper()
    }

    /// Get description text if available
    pub fn description(&self) -> Option<String> {
        self.inner.description.as_ref().map(|text| match text {
            moxcms::ProfileText::PlainString(s) => s.clone(),
            moxcms::ProfileText::Localizable(locs) => {
                locs.first().map(|l| l.value.clone()).unwrap_or_default()
            }
            moxcms::ProfileText::Description(desc) => desc.ascii_string.clone(),
        })
    }

    /// Access the inner moxcms profile
    pub fn inner(&self) -> &moxcms::ColorProfile {
        &self.inner
    }
}

impl PartialEq for ColorProfile {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint && self.name == other.name
    }
}

impl Eq for ColorProfile {}

impl Hash for ColorProfile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.fingerprint.hash(state);
    }
}

impl AsRef<moxcms::ColorProfile> for ColorProfile {
    fn as_ref(&self) -> &moxcms::ColorProfile {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_profile() {
        let profile = ColorProfile::new_srgb();
        assert!(profile.is_matrix_shaper());
        assert_eq!(profile.name(), "sRGB built-in");
    }

    #[test]
    fn test_builtins_compare_by_value() {
        assert_eq!(ColorProfile::new_srgb(), ColorProfile::new_srgb());
        assert_ne!(ColorProfile::new_srgb(), ColorProfile::new_display_p3());
        assert_ne!(
            ColorProfile::new_gray_with_gamma(1.0),
            ColorProfile::new_gray_with_gamma(2.2)
        );
    }

    #[test]
    fn test_reject_small_profile() {
        let small_data = [0u8; 64];
        assert!(ColorProfile::from_bytes(&small_data).is_err());
    }
}
