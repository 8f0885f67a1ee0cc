//! Font metric profile.

use serde::{Deserialize, Serialize};

/// Names and metrics every assembled font is built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontProfile {
    pub family: String,
    pub postscript_name: String,
    pub units_per_em: u16,
    pub ascent: i16,
    pub descent: i16,
    pub advance_width: u16,
    /// Name of the delivered artifact
    pub file_name: String,
}

impl FontProfile {
    /// Height of the design frame an outline is scaled into.
    pub fn frame_height(&self) -> f64 {
        f64::from(self.ascent) + f64::from(self.descent)
    }
}

impl Default for FontProfile {
    fn default() -> Self {
        Self {
            family: "TM FONT".into(),
            postscript_name: "TMFont".into(),
            units_per_em: 1000,
            ascent: 800,
            descent: 200,
            advance_width: 600,
            file_name: "TM_FONT.ttf".into(),
        }
    }
}
