use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::error::Error;

/// This function returns the environment value.
/// If the value doesn't exist or is invalid, this returns [`Error::Config`].
pub(crate) fn get_env<T>(name: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::error::Error + 'static,
{
    std::env::var(name)
        .map_err(|e| Error::Config(format!("{name}: {e}")))
        .and_then(|v| {
            v.parse()
                .map_err(|e: T::Err| Error::Config(format!("{name}: {e}")))
        })
}

static SUFFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Produces a 16-hex-char suffix unique enough for namespace names: a digest
/// over pid, a process-local counter and the current time.
pub(crate) fn random_suffix() -> String {
    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(
        SUFFIX_COUNTER
            .fetch_add(1, Ordering::Relaxed)
            .to_le_bytes(),
    );
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    hasher.update(now.as_nanos().to_le_bytes());

    hasher
        .finalize()
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_suffix_is_unique_per_call() {
        let a = random_suffix();
        let b = random_suffix();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn get_env_reports_missing_variables() {
        let err = get_env::<String>("CNI_HARNESS_DOES_NOT_EXIST").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
