//! Entry resolution, glyph ordering and font emission.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use glyphsmith_core::font::FontProfile;
use glyphsmith_core::glyph::GlyphEntry;
use glyphsmith_core::outline::{OutlineAsset, OutlineRef};
use kurbo::BezPath;
use tracing::{debug, info, warn};

use crate::sfnt::{self, CompiledGlyph};
use crate::svg::SvgOutline;
use crate::{AssemblyError, AssemblyWarning};

/// A finished font plus what went into it.
#[derive(Debug, Clone)]
pub struct AssembledFont {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Glyph names in glyph-id order, `.notdef` first.
    pub glyph_order: Vec<String>,
    /// Codepoint to the index of the entry that won the slot.
    pub codepoints: BTreeMap<char, usize>,
    /// Ligature string to the entry that won it and its glyph name.
    pub ligatures: BTreeMap<String, LigatureGlyph>,
    /// Entries whose outline was read successfully.
    pub placed: usize,
    pub warnings: Vec<AssemblyWarning>,
}

/// Where a ligature string landed in the glyph set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigatureGlyph {
    /// Index of the entry that won the string.
    pub index: usize,
    /// Name in `post`. Equal to the string unless it clashes with a
    /// codepoint glyph or `.notdef`, in which case a `.liga` suffix is added.
    pub glyph_name: String,
}

/// Builds fonts from glyph entries under a fixed profile.
#[derive(Debug, Clone)]
pub struct FontAssembler {
    profile: FontProfile,
    timestamp: Option<DateTime<Utc>>,
}

impl FontAssembler {
    pub fn new(profile: FontProfile) -> Self {
        Self {
            profile,
            timestamp: None,
        }
    }

    /// Pin the `head` created/modified stamps. Defaults to the build time.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn profile(&self) -> &FontProfile {
        &self.profile
    }

    /// Assemble a font.
    ///
    /// Entries are applied in order: a later entry with the same primary
    /// codepoint (or the same ligature string) replaces an earlier one.
    /// `resolve` returns `None` for outlines that are no longer available.
    pub fn assemble<F>(&self, entries: &[GlyphEntry], mut resolve: F) -> Result<AssembledFont, AssemblyError>
    where
        F: FnMut(&OutlineRef) -> Option<Arc<OutlineAsset>>,
    {
        let mut warnings = Vec::new();
        let mut slots: BTreeMap<char, (usize, Arc<BezPath>)> = BTreeMap::new();
        let mut ligatures: BTreeMap<String, (usize, Arc<BezPath>)> = BTreeMap::new();
        let mut placed = 0usize;

        for (index, entry) in entries.iter().enumerate() {
            let outline = match resolve(&entry.outline) {
                None => Err("outline is no longer available".to_string()),
                Some(asset) => SvgOutline::parse(&asset.bytes)
                    .map(|svg| svg.to_font_units(&self.profile))
                    .map_err(|e| e.to_string()),
            };
            let outline = match outline {
                Ok(outline) => Arc::new(outline),
                Err(reason) => {
                    warn!(index, mapping = %entry.mapping, %reason, "Skipping unreadable outline");
                    warnings.push(AssemblyWarning::OutlineUnreadable {
                        index,
                        mapping: entry.mapping.to_string(),
                        reason,
                    });
                    continue;
                }
            };

            placed += 1;
            slots.insert(entry.mapping.primary_codepoint(), (index, Arc::clone(&outline)));
            if entry.mapping.is_ligature() {
                ligatures.insert(entry.mapping.to_string(), (index, outline));
            }
        }

        if placed == 0 {
            return Err(AssemblyError::NoValidGlyphs {
                skipped: warnings.len(),
            });
        }

        let mut glyphs = Vec::with_capacity(1 + slots.len() + ligatures.len());
        glyphs.push(CompiledGlyph::new(
            ".notdef".to_string(),
            &sfnt::notdef_outline(&self.profile),
        )?);

        let mut cmap = Vec::with_capacity(slots.len());
        let mut codepoints = BTreeMap::new();
        for (ch, (index, outline)) in &slots {
            let gid = glyphs.len() as u32;
            glyphs.push(CompiledGlyph::new(codepoint_glyph_name(*ch), outline)?);
            cmap.push((*ch, gid));
            codepoints.insert(*ch, *index);
        }

        let reserved: HashSet<String> = glyphs.iter().map(|g| g.name.clone()).collect();
        let mut taken = reserved.clone();
        taken.extend(ligatures.keys().filter(|text| !reserved.contains(*text)).cloned());

        let mut ligature_glyphs = BTreeMap::new();
        for (text, (index, outline)) in &ligatures {
            let glyph_name = if reserved.contains(text) {
                let renamed = disambiguated_name(text, &taken);
                debug!(ligature = %text, glyph = %renamed, "Renamed clashing ligature glyph");
                taken.insert(renamed.clone());
                renamed
            } else {
                text.clone()
            };
            glyphs.push(CompiledGlyph::new(glyph_name.clone(), outline)?);
            ligature_glyphs.insert(
                text.clone(),
                LigatureGlyph {
                    index: *index,
                    glyph_name,
                },
            );
        }

        let glyph_order: Vec<String> = glyphs.iter().map(|g| g.name.clone()).collect();
        debug!(glyphs = glyph_order.len(), "Compiled glyph set");

        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let bytes = sfnt::build_font(&self.profile, &glyphs, cmap, timestamp)?;

        info!(
            placed,
            skipped = warnings.len(),
            size = bytes.len(),
            "Font assembled"
        );

        Ok(AssembledFont {
            bytes,
            file_name: self.profile.file_name.clone(),
            glyph_order,
            codepoints,
            ligatures: ligature_glyphs,
            placed,
            warnings,
        })
    }
}

/// Production glyph name for a single codepoint.
fn codepoint_glyph_name(ch: char) -> String {
    let cp = u32::from(ch);
    if cp <= 0xFFFF {
        format!("uni{cp:04X}")
    } else {
        format!("u{cp:05X}")
    }
}

/// First of `<text>.liga`, `<text>.liga2`, ... that no other glyph uses.
fn disambiguated_name(text: &str, taken: &HashSet<String>) -> String {
    let mut n = 1u32;
    loop {
        let candidate = if n == 1 {
            format!("{text}.liga")
        } else {
            format!("{text}.liga{n}")
        };
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use glyphsmith_core::glyph::GlyphCollection;
    use std::collections::{HashMap, HashSet};
    use write_fonts::read::{FontRef, TableProvider};
    use write_fonts::types::Tag;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><path d="M10 10 H90 V90 H10 Z"/></svg>"#;
    const TRIANGLE: &str = r#"<svg viewBox="0 0 100 100"><polygon points="50,0 100,100 0,100"/></svg>"#;
    const CURVED: &str = r#"<svg viewBox="0 0 100 100"><circle cx="50" cy="50" r="40"/></svg>"#;

    struct Fixture {
        glyphs: GlyphCollection,
        assets: HashMap<OutlineRef, Arc<OutlineAsset>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                glyphs: GlyphCollection::new(),
                assets: HashMap::new(),
            }
        }

        fn add(&mut self, svg: &str, mapping: &str) -> OutlineRef {
            let asset = OutlineAsset::inspect("g.svg", svg.as_bytes().to_vec(), 1 << 20).unwrap();
            let outline = OutlineRef::new();
            self.assets.insert(outline, Arc::new(asset));
            self.glyphs.add(outline, mapping).unwrap();
            outline
        }

        fn add_missing(&mut self, mapping: &str) {
            self.glyphs.add(OutlineRef::new(), mapping).unwrap();
        }

        fn assemble(&self, assembler: &FontAssembler) -> Result<AssembledFont, AssemblyError> {
            assembler.assemble(self.glyphs.entries(), |r| self.assets.get(r).cloned())
        }
    }

    fn assembler() -> FontAssembler {
        FontAssembler::new(FontProfile::default())
            .with_timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    fn gid_for(bytes: &[u8], ch: char) -> Option<u32> {
        let font = FontRef::new(bytes).unwrap();
        font.cmap().unwrap().map_codepoint(ch).map(|g| g.to_u32())
    }

    #[test]
    fn single_glyph_font_is_readable() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        let font = fx.assemble(&assembler()).unwrap();

        assert_eq!(font.file_name, "TM_FONT.ttf");
        assert_eq!(font.glyph_order, vec![".notdef", "uni0061"]);
        assert_eq!(font.placed, 1);
        assert!(font.warnings.is_empty());

        let parsed = FontRef::new(&font.bytes).unwrap();
        assert_eq!(parsed.maxp().unwrap().num_glyphs(), 2);
        assert_eq!(parsed.head().unwrap().units_per_em(), 1000);
        assert_eq!(gid_for(&font.bytes, 'a'), Some(1));
        assert_eq!(gid_for(&font.bytes, 'b'), None);
    }

    #[test]
    fn later_entry_wins_codepoint() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        fx.add(TRIANGLE, "b");
        fx.add(CURVED, "a");
        let font = fx.assemble(&assembler()).unwrap();

        assert_eq!(font.codepoints.get(&'a'), Some(&2));
        assert_eq!(font.codepoints.get(&'b'), Some(&1));
        assert_eq!(font.glyph_order, vec![".notdef", "uni0061", "uni0062"]);
        assert_eq!(font.placed, 3);
    }

    #[test]
    fn ligature_claims_first_codepoint_and_a_name() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        fx.add(TRIANGLE, "ab");
        let font = fx.assemble(&assembler()).unwrap();

        assert_eq!(font.codepoints.get(&'a'), Some(&1));
        assert_eq!(font.ligatures["ab"].index, 1);
        assert_eq!(font.ligatures["ab"].glyph_name, "ab");
        assert_eq!(font.glyph_order, vec![".notdef", "uni0061", "ab"]);
        assert_eq!(gid_for(&font.bytes, 'a'), Some(1));
        assert_eq!(gid_for(&font.bytes, 'b'), None);
    }

    #[test]
    fn later_single_codepoint_beats_earlier_ligature_slot() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        fx.add(TRIANGLE, "ab");
        fx.add(CURVED, "a");
        let font = fx.assemble(&assembler()).unwrap();

        assert_eq!(font.codepoints.get(&'a'), Some(&2));
        assert_eq!(font.ligatures.len(), 1);
        assert_eq!(font.ligatures["ab"].index, 1);
        assert_eq!(font.placed, 3);
        assert_eq!(font.glyph_order, vec![".notdef", "uni0061", "ab"]);
    }

    #[test]
    fn ligatures_never_reuse_an_existing_glyph_name() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        fx.add(TRIANGLE, "uni0061");
        fx.add(CURVED, ".notdef");
        fx.add(SQUARE, "uni0061.liga");
        let font = fx.assemble(&assembler()).unwrap();

        let unique: HashSet<&String> = font.glyph_order.iter().collect();
        assert_eq!(unique.len(), font.glyph_order.len(), "{:?}", font.glyph_order);
        assert_eq!(font.glyph_order[0], ".notdef");

        assert_eq!(font.ligatures[".notdef"].glyph_name, ".notdef.liga");
        assert_eq!(font.ligatures["uni0061"].glyph_name, "uni0061.liga2");
        assert_eq!(font.ligatures["uni0061.liga"].glyph_name, "uni0061.liga");
        assert_eq!(font.ligatures["uni0061"].index, 1);
        for ligature in font.ligatures.values() {
            assert!(font.glyph_order.contains(&ligature.glyph_name));
        }
        assert!(FontRef::new(&font.bytes).unwrap().post().is_ok());
    }

    #[test]
    fn one_unresolvable_of_three_still_builds() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        fx.add_missing("b");
        fx.add(TRIANGLE, "c");
        let font = fx.assemble(&assembler()).unwrap();

        assert_eq!(font.placed, 2);
        assert_eq!(font.warnings.len(), 1);
        assert!(matches!(
            &font.warnings[0],
            AssemblyWarning::OutlineUnreadable { index: 1, mapping, .. } if mapping == "b"
        ));
        assert_eq!(font.glyph_order, vec![".notdef", "uni0061", "uni0063"]);
    }

    #[test]
    fn outline_without_drawable_contour_is_skipped() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "b");
        fx.add(r#"<svg viewBox="0 0 100 100"><path d="M10 10"/></svg>"#, "a");
        let font = fx.assemble(&assembler()).unwrap();

        assert_eq!(font.placed, 1);
        assert!(matches!(
            &font.warnings[..],
            [AssemblyWarning::OutlineUnreadable { index: 1, mapping, .. }] if mapping == "a"
        ));
        assert_eq!(font.glyph_order, vec![".notdef", "uni0062"]);
        assert_eq!(gid_for(&font.bytes, 'a'), None);

        let mut lone = Fixture::new();
        lone.add(r#"<svg viewBox="0 0 100 100"><path d="M10 10"/></svg>"#, "a");
        assert_eq!(
            lone.assemble(&assembler()).unwrap_err(),
            AssemblyError::NoValidGlyphs { skipped: 1 }
        );
    }

    #[test]
    fn unreadable_outline_is_skipped_with_warning() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "x");
        fx.add_missing("y");
        fx.add(r#"<svg viewBox="0 0 10 10"><path d="M0 0 Q"/></svg>"#, "z");
        let font = fx.assemble(&assembler()).unwrap();

        assert_eq!(font.placed, 1);
        assert_eq!(font.warnings.len(), 2);
        assert!(matches!(
            &font.warnings[0],
            AssemblyWarning::OutlineUnreadable { index: 1, mapping, .. } if mapping == "y"
        ));
        assert_eq!(gid_for(&font.bytes, 'x'), Some(1));
        assert_eq!(gid_for(&font.bytes, 'y'), None);
    }

    #[test]
    fn nothing_placed_is_an_error() {
        let mut fx = Fixture::new();
        fx.add_missing("a");
        fx.add(r#"<svg viewBox="0 0 10 10"></svg>"#, "b");
        assert_eq!(
            fx.assemble(&assembler()).unwrap_err(),
            AssemblyError::NoValidGlyphs { skipped: 2 }
        );

        assert_eq!(
            Fixture::new().assemble(&assembler()).unwrap_err(),
            AssemblyError::NoValidGlyphs { skipped: 0 }
        );
    }

    #[test]
    fn astral_codepoints_get_long_names() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "😀");
        fx.add(SQUARE, "ب");
        let font = fx.assemble(&assembler()).unwrap();
        assert_eq!(font.glyph_order, vec![".notdef", "uni0628", "u1F600"]);
        assert_eq!(gid_for(&font.bytes, '😀'), Some(2));
    }

    #[test]
    fn output_is_deterministic_for_fixed_timestamp() {
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        fx.add(CURVED, "bc");
        let first = fx.assemble(&assembler()).unwrap();
        let second = fx.assemble(&assembler()).unwrap();
        assert_eq!(first.bytes, second.bytes);

        let later = FontAssembler::new(FontProfile::default())
            .with_timestamp(Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap());
        let third = fx.assemble(&later).unwrap();
        let glyf = |bytes: &[u8]| {
            FontRef::new(bytes)
                .unwrap()
                .table_data(Tag::new(b"glyf"))
                .map(|d| d.as_bytes().to_vec())
        };
        assert_eq!(glyf(&first.bytes), glyf(&third.bytes));
    }

    #[test]
    fn oversized_geometry_fails_serialization() {
        let mut fx = Fixture::new();
        fx.add(
            r#"<svg viewBox="0 0 1 1"><path d="M0 0 L100 0 L100 100 Z"/></svg>"#,
            "a",
        );
        assert!(matches!(
            fx.assemble(&assembler()),
            Err(AssemblyError::Serialization(_))
        ));
    }

    #[test]
    fn custom_profile_names_the_file() {
        let profile = FontProfile {
            family: "Demo".into(),
            postscript_name: "Demo".into(),
            file_name: "demo.ttf".into(),
            ..FontProfile::default()
        };
        let mut fx = Fixture::new();
        fx.add(SQUARE, "a");
        let font = fx.assemble(&FontAssembler::new(profile)).unwrap();
        assert_eq!(font.file_name, "demo.ttf");
    }
}
