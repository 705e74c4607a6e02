//! Key mining and key-pair storage.
//!
//! A usable key must end in `83e` plus a month that is still inside its
//! validity window, so fresh keys are brute-forced: every worker thread
//! generates random Ed25519 key pairs until one public key carries the
//! target suffix.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use anyhow::{bail, Context};
use chrono::Utc;
use ed25519_dalek::SigningKey;
use spring83_protocol::key::mining_suffix;

/// Default key directory: `$XDG_CONFIG_HOME/spring83` or
/// `~/.config/spring83`.
pub fn default_key_dir() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !config_home.is_empty() {
            return PathBuf::from(config_home).join("spring83");
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config").join("spring83")
}

fn key_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join("key.pub"), dir.join("key.priv"))
}

/// Brute-force a key pair whose public key hex ends in `suffix`.
pub fn mine_key(suffix: &str, workers: usize) -> SigningKey {
    let found = AtomicBool::new(false);
    let (sender, receiver) = mpsc::channel();

    std::thread::scope(|scope| {
        for _ in 0..workers.max(1) {
            let sender = sender.clone();
            let found = &found;
            scope.spawn(move || {
                let mut rng = rand::rngs::OsRng;
                while !found.load(Ordering::Relaxed) {
                    let candidate = SigningKey::generate(&mut rng);
                    let public_hex = hex::encode(candidate.verifying_key().to_bytes());
                    if public_hex.ends_with(suffix) {
                        found.store(true, Ordering::Relaxed);
                        let _ = sender.send(candidate);
                        return;
                    }
                }
            });
        }
        drop(sender);
        receiver
            .recv()
            .unwrap_or_else(|_| SigningKey::generate(&mut rand::rngs::OsRng))
    })
}

/// Mine a valid key pair and write it hex-encoded to `dir`.
pub fn generate_and_store(dir: Option<PathBuf>) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(default_key_dir);
    let (public_path, private_path) = key_paths(&dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("could not create key directory {}", dir.display()))?;

    let suffix = mining_suffix(Utc::now());
    let workers = std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1);
    println!("Fishing in the sea of all possible keys for one ending in {suffix}.");
    println!(" - using {workers} worker threads");
    println!(" - writing keys to {}", dir.display());

    let signing_key = mine_key(&suffix, workers);
    let public_hex = hex::encode(signing_key.verifying_key().to_bytes());
    println!("{public_hex}");

    std::fs::write(&public_path, &public_hex)
        .with_context(|| format!("could not write {}", public_path.display()))?;
    std::fs::write(&private_path, hex::encode(signing_key.to_bytes()))
        .with_context(|| format!("could not write {}", private_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&private_path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

/// Load a key pair previously written by `generate_and_store`.
pub fn load_keys(dir: Option<PathBuf>) -> anyhow::Result<(SigningKey, String)> {
    let dir = dir.unwrap_or_else(default_key_dir);
    let (public_path, private_path) = key_paths(&dir);
    if !public_path.exists() || !private_path.exists() {
        bail!(
            "could not load key pair from {}; run \"springboard generate-key\" first",
            dir.display()
        );
    }

    let private_hex = std::fs::read_to_string(&private_path)
        .with_context(|| format!("could not read {}", private_path.display()))?;
    let decoded = hex::decode(private_hex.trim()).context("private key is not valid hex")?;
    let seed: [u8; 32] = decoded
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("private key must be 32 bytes"))?;
    let signing_key = SigningKey::from_bytes(&seed);
    let public_hex = hex::encode(signing_key.verifying_key().to_bytes());
    Ok((signing_key, public_hex))
}
