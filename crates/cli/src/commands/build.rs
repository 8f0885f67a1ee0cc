//! `glyphsmith build`: Offline assembly from a glyph manifest.
//!
//! ```toml
//! [[glyph]]
//! outline = "glyphs/a.svg"
//! mapping = "a"
//!
//! [[glyph]]
//! outline = "glyphs/ff.svg"
//! mapping = "ff"
//! ```
//!
//! Outline paths are relative to the manifest. Entries are applied in order,
//! so a later entry for the same character replaces an earlier one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use glyphsmith_assembler::{AssembledFont, FontAssembler};
use glyphsmith_core::glyph::GlyphCollection;
use glyphsmith_core::outline::{OutlineAsset, OutlineRef};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "glyph")]
    glyphs: Vec<ManifestGlyph>,
}

#[derive(Debug, Deserialize)]
struct ManifestGlyph {
    outline: PathBuf,
    mapping: String,
}

/// A manifest's glyphs, validated and held in memory.
struct LoadedGlyphs {
    collection: GlyphCollection,
    assets: HashMap<OutlineRef, Arc<OutlineAsset>>,
}

pub async fn run(explicit: Option<&Path>, manifest: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = super::load_config(explicit)?;

    println!("🔤 Glyphsmith — Building {}", config.font.family);
    let loaded = load_manifest(manifest, config.session.max_glyphs, config.storage.max_outline_bytes).await?;
    println!("   Glyphs: {}", loaded.collection.count());

    let font = assemble(FontAssembler::new(config.font.profile()), loaded).await?;
    for warning in &font.warnings {
        println!("⚠️  {warning}");
    }

    let output = output.unwrap_or_else(|| PathBuf::from(&font.file_name));
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&output, &font.bytes)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "✅ Wrote {} ({} bytes, {} glyphs, {} ligatures)",
        output.display(),
        font.bytes.len(),
        font.glyph_order.len(),
        font.ligatures.len()
    );
    if font.warnings.is_empty() {
        println!("🎉 All {} entries placed", font.placed);
    } else {
        println!("⚠️  {} of {} entries skipped", font.warnings.len(), font.placed + font.warnings.len());
    }
    Ok(())
}

async fn load_manifest(path: &Path, max_glyphs: usize, max_outline_bytes: usize) -> anyhow::Result<LoadedGlyphs> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let manifest: Manifest =
        toml::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))?;
    if manifest.glyphs.is_empty() {
        bail!("manifest {} has no [[glyph]] entries", path.display());
    }

    let base = path.parent().unwrap_or(Path::new("."));
    let mut collection = GlyphCollection::with_capacity(max_glyphs);
    let mut assets = HashMap::with_capacity(manifest.glyphs.len());

    for (index, glyph) in manifest.glyphs.into_iter().enumerate() {
        let outline_path = base.join(&glyph.outline);
        let context = || format!("glyph #{} ({})", index + 1, outline_path.display());

        let bytes = tokio::fs::read(&outline_path).await.with_context(context)?;
        let filename = outline_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let asset = OutlineAsset::inspect(&filename, bytes, max_outline_bytes).with_context(context)?;

        let outline = OutlineRef::new();
        collection.add(outline, &glyph.mapping).with_context(context)?;
        assets.insert(outline, Arc::new(asset));
        debug!(index, mapping = %glyph.mapping, "Loaded glyph");
    }

    Ok(LoadedGlyphs { collection, assets })
}

async fn assemble(assembler: FontAssembler, loaded: LoadedGlyphs) -> anyhow::Result<AssembledFont> {
    let font = tokio::task::spawn_blocking(move || {
        let LoadedGlyphs { collection, assets } = loaded;
        assembler.assemble(collection.entries(), |outline| assets.get(outline).cloned())
    })
    .await
    .context("assembly task failed")??;
    Ok(font)
}
