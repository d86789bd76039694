//! Runtime capability probe.
//!
//! Code is encoded for a build-selected profile; [`probe`] checks that the
//! running CPU can actually execute it before the caller maps the bytes.

use crate::error::EncodeError;
use crate::profile::{Target, TargetId, TargetProfile};

/// Check that the running CPU can execute code for `T`.
///
/// # Errors
///
/// `CapabilityMismatch` naming the first missing capability: the
/// architecture itself, or a CPU feature the profile relies on.
///
/// # Examples
///
/// ```rust
/// # #[cfg(feature = "a64")] {
/// use vecasm::{capability, A64Neon};
///
/// if capability::probe::<A64Neon>().is_ok() {
///     // safe to run A64 code here
/// }
/// # }
/// ```
pub fn probe<T: Target>() -> Result<(), EncodeError> {
    probe_profile(T::PROFILE)
}

/// [`probe`] for a profile chosen at run time.
///
/// # Errors
///
/// `CapabilityMismatch` as for [`probe`].
pub fn probe_profile(profile: &TargetProfile) -> Result<(), EncodeError> {
    match required(profile.id).iter().copied().find(|f| !detected(f)) {
        Some(missing) => {
            log::debug!("{}: capability probe failed on {}", profile.id, missing);
            Err(EncodeError::CapabilityMismatch {
                target: profile.id,
                missing,
            })
        }
        None => Ok(()),
    }
}

/// Architecture first, then CPU features in the order they are checked.
fn required(id: TargetId) -> &'static [&'static str] {
    match id {
        TargetId::A64Neon => &["aarch64", "neon"],
        // POWER10 vector facilities have no stable runtime query.
        TargetId::Power8 | TargetId::Power10 => &["powerpc64le"],
        TargetId::X64Avx128 => &["x86_64", "avx"],
        TargetId::X64Avx256 => &["x86_64", "avx", "avx2", "fma"],
        TargetId::X64Avx512 => &[
            "x86_64", "avx", "avx2", "fma", "avx512f", "avx512dq", "avx512vl",
        ],
    }
}

#[cfg(target_arch = "x86_64")]
fn detected(feature: &str) -> bool {
    match feature {
        "x86_64" => true,
        "avx" => std::is_x86_feature_detected!("avx"),
        "avx2" => std::is_x86_feature_detected!("avx2"),
        "fma" => std::is_x86_feature_detected!("fma"),
        "avx512f" => std::is_x86_feature_detected!("avx512f"),
        "avx512dq" => std::is_x86_feature_detected!("avx512dq"),
        "avx512vl" => std::is_x86_feature_detected!("avx512vl"),
        _ => false,
    }
}

#[cfg(target_arch = "aarch64")]
fn detected(feature: &str) -> bool {
    match feature {
        "aarch64" => true,
        "neon" => std::arch::is_aarch64_feature_detected!("neon"),
        _ => false,
    }
}

#[cfg(all(target_arch = "powerpc64", target_endian = "little"))]
fn detected(feature: &str) -> bool {
    feature == "powerpc64le"
}

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    all(target_arch = "powerpc64", target_endian = "little")
)))]
fn detected(_feature: &str) -> bool {
    false
}
