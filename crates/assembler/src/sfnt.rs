//! Glyph compilation and TrueType table assembly.

use chrono::{DateTime, Utc};
use glyphsmith_core::font::FontProfile;
use kurbo::{BezPath, CubicBez, PathEl, Point, Shape};
use write_fonts::FontBuilder;
use write_fonts::tables::cmap::Cmap;
use write_fonts::tables::glyf::{GlyfLocaBuilder, SimpleGlyph};
use write_fonts::tables::head::Head;
use write_fonts::tables::hhea::Hhea;
use write_fonts::tables::hmtx::{Hmtx, LongMetric};
use write_fonts::tables::loca::LocaFormat;
use write_fonts::tables::maxp::Maxp;
use write_fonts::tables::name::{Name, NameRecord};
use write_fonts::tables::os2::Os2;
use write_fonts::tables::post::Post;
use write_fonts::types::{FWord, Fixed, GlyphId, LongDateTime, NameId, UfWord};

use crate::AssemblyError;

/// Max distance between a cubic and its quadratic approximation, in font units.
const CUBIC_ACCURACY: f64 = 1.0;

/// Seconds between 1904-01-01 and the Unix epoch.
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

const PLATFORM_WINDOWS: u16 = 3;
const ENCODING_UNICODE_BMP: u16 = 1;
const LANGUAGE_EN_US: u16 = 0x409;

/// A glyph ready to be written into `glyf`.
pub(crate) struct CompiledGlyph {
    pub name: String,
    pub glyph: SimpleGlyph,
    pub points: u16,
    pub contours: u16,
}

impl CompiledGlyph {
    /// Compile a font-unit outline. The path may contain cubics.
    pub fn new(name: String, outline: &BezPath) -> Result<Self, AssemblyError> {
        let quadratic = to_closed_quadratic(outline);
        check_range(&name, &quadratic)?;

        let (points, contours) = count_points(&quadratic);
        let glyph = SimpleGlyph::from_bezpath(&quadratic)
            .map_err(|e| AssemblyError::Serialization(format!("glyph {name}: {e:?}")))?;

        Ok(Self {
            name,
            glyph,
            points: clamp_u16(points),
            contours: clamp_u16(contours),
        })
    }
}

/// The `.notdef` box: a hollow rectangle the width of the advance.
pub(crate) fn notdef_outline(profile: &FontProfile) -> BezPath {
    let width = f64::from(profile.advance_width).max(100.0);
    let top = (f64::from(profile.ascent) * 0.75).max(100.0).round();
    let margin = (width * 0.1).round();
    let inner = margin;

    let mut path = BezPath::new();
    path.move_to((margin, 0.0));
    path.line_to((margin, top));
    path.line_to((width - margin, top));
    path.line_to((width - margin, 0.0));
    path.close_path();

    path.move_to((margin + inner, inner));
    path.line_to((width - margin - inner, inner));
    path.line_to((width - margin - inner, top - inner));
    path.line_to((margin + inner, top - inner));
    path.close_path();
    path
}

/// Build every table and serialize the font.
///
/// `glyphs[0]` must be `.notdef`; `cmap` maps codepoints to indices into
/// `glyphs`.
pub(crate) fn build_font(
    profile: &FontProfile,
    glyphs: &[CompiledGlyph],
    cmap: Vec<(char, u32)>,
    timestamp: DateTime<Utc>,
) -> Result<Vec<u8>, AssemblyError> {
    let num_glyphs = u16::try_from(glyphs.len())
        .map_err(|_| AssemblyError::Serialization(format!("too many glyphs: {}", glyphs.len())))?;
    let advance = profile.advance_width;

    let mut glyf_builder = GlyfLocaBuilder::new();
    for g in glyphs {
        glyf_builder
            .add_glyph(&g.glyph)
            .map_err(|e| AssemblyError::Serialization(format!("glyph {}: {e}", g.name)))?;
    }
    let (glyf, loca, loca_format) = glyf_builder.build();

    let mut metrics = Vec::with_capacity(glyphs.len());
    let (mut x_min, mut y_min, mut x_max, mut y_max) = (i16::MAX, i16::MAX, i16::MIN, i16::MIN);
    let (mut min_lsb, mut min_rsb, mut max_extent) = (i16::MAX, i16::MAX, i16::MIN);
    for g in glyphs {
        let bbox = g.glyph.bbox;
        metrics.push(LongMetric::new(advance, bbox.x_min));
        x_min = x_min.min(bbox.x_min);
        y_min = y_min.min(bbox.y_min);
        x_max = x_max.max(bbox.x_max);
        y_max = y_max.max(bbox.y_max);
        min_lsb = min_lsb.min(bbox.x_min);
        min_rsb = min_rsb.min(clamp_i16(i32::from(advance) - i32::from(bbox.x_max)));
        max_extent = max_extent.max(bbox.x_max);
    }

    let head = Head {
        font_revision: Fixed::from_f64(1.0),
        units_per_em: profile.units_per_em,
        created: long_date_time(timestamp),
        modified: long_date_time(timestamp),
        x_min,
        y_min,
        x_max,
        y_max,
        lowest_rec_ppem: 8,
        index_to_loc_format: match loca_format {
            LocaFormat::Short => 0,
            LocaFormat::Long => 1,
        },
        ..Default::default()
    };

    let hhea = Hhea {
        ascender: FWord::new(profile.ascent),
        descender: FWord::new(-profile.descent),
        line_gap: FWord::new(0),
        advance_width_max: UfWord::new(advance),
        min_left_side_bearing: FWord::new(min_lsb),
        min_right_side_bearing: FWord::new(min_rsb),
        x_max_extent: FWord::new(max_extent),
        caret_slope_rise: 1,
        caret_slope_run: 0,
        caret_offset: 0,
        number_of_h_metrics: num_glyphs,
        ..Default::default()
    };

    let hmtx = Hmtx::new(metrics, Vec::new());

    let maxp = Maxp {
        num_glyphs,
        max_points: Some(glyphs.iter().map(|g| g.points).max().unwrap_or(0)),
        max_contours: Some(glyphs.iter().map(|g| g.contours).max().unwrap_or(0)),
        max_composite_points: Some(0),
        max_composite_contours: Some(0),
        max_zones: Some(2),
        max_twilight_points: Some(0),
        max_storage: Some(0),
        max_function_defs: Some(0),
        max_instruction_defs: Some(0),
        max_stack_elements: Some(0),
        max_size_of_instructions: Some(0),
        max_component_elements: Some(0),
        max_component_depth: Some(0),
        ..Default::default()
    };

    let first_char = cmap.iter().map(|(c, _)| u32::from(*c)).min().unwrap_or(0);
    let last_char = cmap.iter().map(|(c, _)| u32::from(*c)).max().unwrap_or(0);
    let os2 = Os2 {
        x_avg_char_width: clamp_i16(i32::from(advance)),
        us_weight_class: 400,
        us_width_class: 5,
        us_first_char_index: first_char.min(0xFFFF) as u16,
        us_last_char_index: last_char.min(0xFFFF) as u16,
        s_typo_ascender: profile.ascent,
        s_typo_descender: -profile.descent,
        s_typo_line_gap: 0,
        us_win_ascent: clamp_u16(i32::from(profile.ascent.max(y_max)).max(0) as usize),
        us_win_descent: clamp_u16((-i32::from(y_min)).max(i32::from(profile.descent)).max(0) as usize),
        ul_code_page_range_1: Some(1),
        ul_code_page_range_2: Some(0),
        ..Default::default()
    };

    let cmap = Cmap::from_mappings(cmap.into_iter().map(|(c, gid)| (c, GlyphId::new(gid))))
        .map_err(|e| AssemblyError::Serialization(format!("cmap: {e:?}")))?;

    let post = Post::new_v2(glyphs.iter().map(|g| g.name.as_str()));

    let name = Name::new(
        name_records(profile)
            .into_iter()
            .map(|(id, text)| {
                NameRecord::new(
                    PLATFORM_WINDOWS,
                    ENCODING_UNICODE_BMP,
                    LANGUAGE_EN_US,
                    id,
                    text.into(),
                )
            })
            .collect(),
    );

    let mut builder = FontBuilder::new();
    builder.add_table(&head).map_err(table_error)?;
    builder.add_table(&hhea).map_err(table_error)?;
    builder.add_table(&maxp).map_err(table_error)?;
    builder.add_table(&os2).map_err(table_error)?;
    builder.add_table(&hmtx).map_err(table_error)?;
    builder.add_table(&cmap).map_err(table_error)?;
    builder.add_table(&loca).map_err(table_error)?;
    builder.add_table(&glyf).map_err(table_error)?;
    builder.add_table(&name).map_err(table_error)?;
    builder.add_table(&post).map_err(table_error)?;
    Ok(builder.build())
}

fn name_records(profile: &FontProfile) -> Vec<(NameId, String)> {
    vec![
        (NameId::FAMILY_NAME, profile.family.clone()),
        (NameId::SUBFAMILY_NAME, "Regular".to_string()),
        (NameId::UNIQUE_ID, format!("{};Regular", profile.postscript_name)),
        (NameId::FULL_NAME, profile.family.clone()),
        (NameId::VERSION_STRING, "Version 1.000".to_string()),
        (NameId::POSTSCRIPT_NAME, profile.postscript_name.clone()),
    ]
}

fn table_error(e: impl std::fmt::Display) -> AssemblyError {
    AssemblyError::Serialization(format!("table: {e}"))
}

fn long_date_time(timestamp: DateTime<Utc>) -> LongDateTime {
    LongDateTime::new(timestamp.timestamp() + MAC_EPOCH_OFFSET)
}

fn clamp_i16(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

fn clamp_u16(v: usize) -> u16 {
    v.min(usize::from(u16::MAX)) as u16
}

/// Replace cubics with quadratic approximations, close every contour and
/// drop contours that draw nothing.
fn to_closed_quadratic(path: &BezPath) -> BezPath {
    let mut out = BezPath::new();
    let mut contour: Vec<PathEl> = Vec::new();
    let mut current = Point::ZERO;
    let mut start = Point::ZERO;

    fn flush(contour: &mut Vec<PathEl>, out: &mut BezPath) {
        let draws = contour
            .iter()
            .any(|el| matches!(el, PathEl::LineTo(_) | PathEl::QuadTo(..)));
        if draws {
            for el in contour.iter() {
                out.push(*el);
            }
            out.close_path();
        }
        contour.clear();
    }

    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                flush(&mut contour, &mut out);
                contour.push(PathEl::MoveTo(p));
                current = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                if contour.is_empty() {
                    contour.push(PathEl::MoveTo(current));
                }
                contour.push(PathEl::LineTo(p));
                current = p;
            }
            PathEl::QuadTo(p1, p2) => {
                if contour.is_empty() {
                    contour.push(PathEl::MoveTo(current));
                }
                contour.push(PathEl::QuadTo(p1, p2));
                current = p2;
            }
            PathEl::CurveTo(p1, p2, p3) => {
                if contour.is_empty() {
                    contour.push(PathEl::MoveTo(current));
                }
                for (_, _, quad) in CubicBez::new(current, p1, p2, p3).to_quads(CUBIC_ACCURACY) {
                    contour.push(PathEl::QuadTo(quad.p1, quad.p2));
                }
                current = p3;
            }
            PathEl::ClosePath => {
                flush(&mut contour, &mut out);
                current = start;
            }
        }
    }
    flush(&mut contour, &mut out);
    out
}

fn check_range(name: &str, path: &BezPath) -> Result<(), AssemblyError> {
    if path.elements().is_empty() {
        return Ok(());
    }
    let bounds = path.bounding_box();
    let limit = f64::from(i16::MAX);
    let fits = [bounds.x0, bounds.y0, bounds.x1, bounds.y1]
        .iter()
        .all(|v| v.is_finite() && v.round().abs() <= limit);
    if fits {
        Ok(())
    } else {
        Err(AssemblyError::Serialization(format!(
            "glyph {name}: coordinates exceed the 16-bit range ({bounds:?})"
        )))
    }
}

fn count_points(path: &BezPath) -> (usize, usize) {
    path.elements()
        .iter()
        .fold((0, 0), |(points, contours), el| match el {
            PathEl::MoveTo(_) => (points + 1, contours + 1),
            PathEl::LineTo(_) => (points + 1, contours),
            PathEl::QuadTo(..) => (points + 2, contours),
            PathEl::CurveTo(..) => (points + 3, contours),
            PathEl::ClosePath => (points, contours),
        })
}
