//! User-facing texts and keyboards.

use glyphsmith_assembler::{AssemblyError, AssemblyWarning};
use glyphsmith_core::channel::{Button, MenuChoice, Outbound};
use glyphsmith_core::error::OutlineError;

pub const WELCOME: &str = "✨ Welcome to the font builder!\n\n\
    Upload SVG outlines, tell me which character each one draws, \
    and I will turn them into a TrueType font.";

pub const BUILDER: &str = "🛠 Font builder\n\n\
    Add your glyphs one at a time. When you are done, press finish to build the font.";

pub const SEND_OUTLINE: &str = "📎 Send the glyph outline as an .svg file.";

pub const SEND_MAPPING: &str = "⌨️ Now send the character this glyph draws.\n\n\
    Several characters (for example \"ff\") also register a named ligature.";

pub const SEND_MAPPING_AS_TEXT: &str = "❌ Please send the mapping as a text message.";

pub const NOT_A_FILE: &str = "❌ Error\n\nPlease send an SVG file.";

pub const UPLOAD_FAILED: &str = "❌ Upload failed\n\nPlease try again.";

pub const EMPTY_MAPPING: &str = "❌ Error\n\nPlease enter the mapping.";

pub const NEED_ONE_GLYPH: &str = "❌ Add at least one glyph first.";

pub const BUILDING: &str = "⏳ Building your font, please wait...";

pub const STILL_BUILDING: &str = "⏳ Your font is still being built.";

pub const FONT_READY: &str = "🎉 Done! Here is your font.";

pub const FONT_CAPTION: &str = "✨ Your font is ready!";

pub const ASK_THANKS: &str = "💚 If you liked the result, send a short thank-you message \
    and I will pass it on to the developer.";

pub const THANKS_RECEIVED: &str = "💚 Thank you! Your message has been delivered.";

pub const CANCELLED: &str = "❌ Cancelled\n\nSend /start to return to the main menu.";

pub const SEND_START: &str = "Send /start to begin.";

pub fn capacity_reached(capacity: usize) -> String {
    format!("❌ You reached the limit ({capacity} glyphs).")
}

pub fn mapping_too_long(limit: usize) -> String {
    format!("❌ That mapping is too long (at most {limit} bytes).")
}

pub fn outline_rejected(error: &OutlineError) -> String {
    match error {
        OutlineError::UnsupportedFormat { .. } | OutlineError::MissingSignature { .. } => {
            "❌ Error\n\nThe file must be an SVG.".to_string()
        }
        OutlineError::TooLarge { limit, .. } => {
            format!("❌ Error\n\nThe file is too large (limit {} KiB).", limit / 1024)
        }
        OutlineError::NotUtf8 { .. } => "❌ Error\n\nThe SVG is not valid UTF-8 text.".to_string(),
    }
}

pub fn glyph_added(count: usize, mapping: &str) -> String {
    format!("✅ Glyph added!\n\nGlyphs: {count}\nMapping: {mapping}")
}

pub fn assembly_failed(error: &AssemblyError) -> String {
    match error {
        AssemblyError::NoValidGlyphs { .. } => {
            "❌ Could not build the font\n\nNone of the outlines could be read. \
             Please check your SVG files and try again."
                .to_string()
        }
        AssemblyError::Serialization(_) => {
            "❌ Something went wrong while building the font\n\nPlease try again.".to_string()
        }
    }
}

pub fn skipped_glyphs(warnings: &[AssemblyWarning]) -> String {
    let mut text = format!("⚠️ {} glyph(s) were skipped:", warnings.len());
    for warning in warnings {
        let AssemblyWarning::OutlineUnreadable { index, mapping, .. } = warning;
        text.push_str(&format!("\n• #{} ({mapping})", index + 1));
    }
    text
}

/// The note forwarded to the operator.
pub fn operator_thanks(sender_name: Option<&str>, sender_id: &str, text: &str) -> String {
    let from = sender_name.unwrap_or("unknown");
    format!("💚 New thank-you message!\n\nFrom: {from}\nID: {sender_id}\n\n{text}")
}

pub fn main_menu() -> Vec<Vec<Button>> {
    vec![vec![Button::new("✨ Build a font", MenuChoice::BuildFont)]]
}

/// The finish button only appears once something was collected.
pub fn builder_menu(glyph_count: usize) -> Vec<Vec<Button>> {
    let mut rows = vec![vec![Button::new("➕ Add glyph", MenuChoice::AddGlyph)]];
    if glyph_count > 0 {
        rows.push(vec![Button::new(
            format!("🍂 Finish ({glyph_count} glyphs)"),
            MenuChoice::Finish,
        )]);
    }
    rows.push(vec![Button::new("🔙 Back", MenuChoice::BackToMain)]);
    rows
}

pub fn cancel_keyboard() -> Vec<Vec<Button>> {
    vec![vec![Button::new("❌ Cancel", MenuChoice::CancelAdd)]]
}

pub fn welcome() -> Outbound {
    Outbound::with_buttons(WELCOME, main_menu())
}

pub fn builder(glyph_count: usize) -> Outbound {
    Outbound::with_buttons(BUILDER, builder_menu(glyph_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices(rows: &[Vec<Button>]) -> Vec<MenuChoice> {
        rows.iter().flatten().map(|b| b.choice).collect()
    }

    #[test]
    fn finish_hidden_until_first_glyph() {
        assert_eq!(
            choices(&builder_menu(0)),
            vec![MenuChoice::AddGlyph, MenuChoice::BackToMain]
        );
        let rows = builder_menu(3);
        assert_eq!(
            choices(&rows),
            vec![MenuChoice::AddGlyph, MenuChoice::Finish, MenuChoice::BackToMain]
        );
        assert!(rows[1][0].label.contains('3'));
    }

    #[test]
    fn skipped_glyphs_are_numbered_from_one() {
        let text = skipped_glyphs(&[AssemblyWarning::OutlineUnreadable {
            index: 0,
            mapping: "a".into(),
            reason: "gone".into(),
        }]);
        assert!(text.contains("#1 (a)"));
    }

    #[test]
    fn operator_note_names_sender() {
        let note = operator_thanks(Some("Ada"), "42", "thanks!");
        assert!(note.contains("Ada"));
        assert!(note.contains("42"));
        assert!(note.ends_with("thanks!"));
        assert!(operator_thanks(None, "42", "x").contains("unknown"));
    }
}
