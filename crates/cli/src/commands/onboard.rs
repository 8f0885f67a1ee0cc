//! `glyphsmith onboard`: First-time setup.

use std::path::Path;

use glyphsmith_config::AppConfig;

pub async fn run(explicit: Option<&Path>) -> anyhow::Result<()> {
    let config_path = super::config_path(explicit);

    println!("🔤 Glyphsmith — First-Time Setup");
    println!("================================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if dir.exists() {
            println!("  Config directory exists: {}", dir.display());
        } else {
            tokio::fs::create_dir_all(dir).await?;
            println!("✅ Created config directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        tokio::fs::write(&config_path, AppConfig::default_toml()).await?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let config = super::load_config(Some(config_path.as_path()))?;
    if config.storage.backend == "file" {
        let storage = config.storage.resolved_directory();
        tokio::fs::create_dir_all(&storage).await?;
        println!("✅ Storage directory: {}", storage.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Put your bot token in [telegram] bot_token (or GLYPHSMITH_BOT_TOKEN)");
    println!("   2. List who may use the bot in [telegram] allowed_users");
    println!("   3. Optionally set [operator] chat_id to receive thank-you notes");
    println!("   4. Run: glyphsmith doctor");
    println!("   5. Run: glyphsmith run --channel cli   (to try it locally)\n");

    Ok(())
}
