//! `glyphsmith doctor`: Diagnose configuration and storage.

use std::path::Path;

use glyphsmith_config::StorageConfig;

pub async fn run(explicit: Option<&Path>) -> anyhow::Result<()> {
    println!("🩺 Glyphsmith Doctor — System Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    let config_path = super::config_path(explicit);
    if !config_path.exists() {
        println!("  ⚠️  No config file at {} — run `glyphsmith onboard`", config_path.display());
        issues += 1;
    }

    let config = match super::load_config(explicit) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e:#}");
            println!("\n  ⚠️  Fix the config file and run doctor again.");
            return Ok(());
        }
    };

    if config.has_bot_token() {
        println!("  ✅ Bot token configured");
    } else {
        println!("  ⚠️  No bot token — set [telegram] bot_token or GLYPHSMITH_BOT_TOKEN");
        issues += 1;
    }

    if config.telegram.allowed_users.is_empty() {
        println!("  ⚠️  telegram.allowed_users is empty — nobody can use the bot");
        issues += 1;
    } else {
        println!("  ✅ {} allowed user(s)", config.telegram.allowed_users.len());
    }

    match &config.operator.chat_id {
        Some(chat) => println!("  ✅ Operator chat: {chat}"),
        None => println!("  ℹ️  No operator chat — thank-you notes will not be forwarded"),
    }

    let font = &config.font;
    println!(
        "  ✅ Font: {} / {} ({} upm, ascent {}, descent {})",
        font.family, font.postscript_name, font.units_per_em, font.ascent, font.descent
    );

    match check_storage(&config.storage).await {
        Ok(Some(dir)) => println!("  ✅ Storage directory writable: {dir}"),
        Ok(None) => println!("  ✅ Storage: in memory"),
        Err(e) => {
            println!("  ❌ Storage directory unusable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Make sure the file backend can create and remove files in its directory.
async fn check_storage(storage: &StorageConfig) -> anyhow::Result<Option<String>> {
    if storage.backend == "memory" {
        return Ok(None);
    }
    let dir = storage.resolved_directory();
    tokio::fs::create_dir_all(&dir).await?;
    let marker = dir.join(".doctor-check");
    tokio::fs::write(&marker, b"ok").await?;
    tokio::fs::remove_file(&marker).await?;
    Ok(Some(dir.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn storage_check_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            backend: "file".into(),
            directory: Some(dir.path().join("nested/store")),
            ..StorageConfig::default()
        };
        let checked = check_storage(&storage).await.unwrap();
        assert!(checked.is_some());
        assert!(dir.path().join("nested/store").is_dir());
        assert!(!dir.path().join("nested/store/.doctor-check").exists());
    }

    #[tokio::test]
    async fn memory_storage_needs_no_directory() {
        let storage = StorageConfig {
            backend: "memory".into(),
            ..StorageConfig::default()
        };
        assert_eq!(check_storage(&storage).await.unwrap(), None);
    }

    #[tokio::test]
    async fn unwritable_storage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let storage = StorageConfig {
            backend: "file".into(),
            directory: Some(blocker.join("store")),
            ..StorageConfig::default()
        };
        assert!(check_storage(&storage).await.is_err());
    }
}
