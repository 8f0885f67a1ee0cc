//! SVG outline extraction.
//!
//! Pulls the filled shapes out of an SVG document and maps them into font
//! units. This is deliberately shallow: no styling cascade, no group
//! transforms, no strokes.

use glyphsmith_core::font::FontProfile;
use kurbo::{Affine, BezPath, Circle, Ellipse, PathEl, Rect, Shape};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Flattening tolerance for primitive shapes, in SVG user units.
const SHAPE_TOLERANCE: f64 = 0.1;

/// Containers whose children are never painted directly.
const NON_RENDERED: [&[u8]; 6] = [b"defs", b"clipPath", b"mask", b"symbol", b"marker", b"pattern"];

/// Why an SVG could not be turned into an outline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutlineParseError {
    #[error("outline is not valid UTF-8")]
    NotUtf8,

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("bad {attribute} on <{element}>: {value:?}")]
    BadAttribute {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("bad path data: {0}")]
    BadPathData(String),

    #[error("no filled shapes with drawable contours found")]
    NoContours,
}

/// The SVG coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Shapes collected from one SVG, still in SVG user units.
#[derive(Debug, Clone)]
pub struct SvgOutline {
    pub view_box: ViewBox,
    pub path: BezPath,
}

impl SvgOutline {
    /// Parse an SVG document.
    pub fn parse(bytes: &[u8]) -> Result<Self, OutlineParseError> {
        let text = std::str::from_utf8(bytes).map_err(|_| OutlineParseError::NotUtf8)?;
        let mut reader = Reader::from_str(text);

        let mut root: Option<ViewBox> = None;
        let mut seen_root = false;
        let mut path = BezPath::new();
        let mut hidden_depth = 0usize;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if hidden_depth > 0 || is_non_rendered(&e) {
                        hidden_depth += 1;
                    } else {
                        visit(&e, &mut seen_root, &mut root, &mut path)?;
                    }
                }
                Ok(Event::Empty(e)) => {
                    if hidden_depth == 0 && !is_non_rendered(&e) {
                        visit(&e, &mut seen_root, &mut root, &mut path)?;
                    }
                }
                Ok(Event::End(_)) => {
                    hidden_depth = hidden_depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(OutlineParseError::Xml(e.to_string())),
            }
        }

        if !seen_root {
            return Err(OutlineParseError::Xml("no <svg> root element".into()));
        }
        if !has_drawable_contour(&path) {
            return Err(OutlineParseError::NoContours);
        }

        Ok(Self {
            view_box: root.unwrap_or(ViewBox {
                min_x: 0.0,
                min_y: 0.0,
                width: 1000.0,
                height: 1000.0,
            }),
            path,
        })
    }

    /// Map into font units: the frame's height spans `ascent + descent`, its
    /// top edge lands on the ascender and y grows upwards.
    pub fn to_font_units(&self, profile: &FontProfile) -> BezPath {
        let vb = self.view_box;
        let scale = profile.frame_height() / vb.height;
        let affine = Affine::new([
            scale,
            0.0,
            0.0,
            -scale,
            -vb.min_x * scale,
            f64::from(profile.ascent) + vb.min_y * scale,
        ]);
        let mut path = self.path.clone();
        path.apply_affine(affine);
        path
    }
}

/// A bare move-to paints nothing.
fn has_drawable_contour(path: &BezPath) -> bool {
    path.elements()
        .iter()
        .any(|el| matches!(el, PathEl::LineTo(_) | PathEl::QuadTo(..) | PathEl::CurveTo(..)))
}

fn is_non_rendered(e: &BytesStart<'_>) -> bool {
    let name = e.local_name();
    NON_RENDERED.iter().any(|n| *n == name.as_ref())
}

fn visit(
    e: &BytesStart<'_>,
    seen_root: &mut bool,
    root: &mut Option<ViewBox>,
    path: &mut BezPath,
) -> Result<(), OutlineParseError> {
    let local = e.local_name();
    let element = String::from_utf8_lossy(local.as_ref()).into_owned();

    if element == "svg" {
        if !*seen_root {
            *seen_root = true;
            *root = root_frame(e)?;
        }
        return Ok(());
    }

    if !is_filled(e)? {
        return Ok(());
    }

    let shape = match element.as_str() {
        "path" => match attr(e, b"d")? {
            Some(d) => BezPath::from_svg(&d)
                .map_err(|err| OutlineParseError::BadPathData(format!("{err:?}")))?,
            None => return Ok(()),
        },
        "rect" => {
            let x = number(e, &element, b"x")?.unwrap_or(0.0);
            let y = number(e, &element, b"y")?.unwrap_or(0.0);
            let w = number(e, &element, b"width")?.unwrap_or(0.0);
            let h = number(e, &element, b"height")?.unwrap_or(0.0);
            if w <= 0.0 || h <= 0.0 {
                return Ok(());
            }
            Rect::new(x, y, x + w, y + h).to_path(SHAPE_TOLERANCE)
        }
        "circle" => {
            let cx = number(e, &element, b"cx")?.unwrap_or(0.0);
            let cy = number(e, &element, b"cy")?.unwrap_or(0.0);
            let r = number(e, &element, b"r")?.unwrap_or(0.0);
            if r <= 0.0 {
                return Ok(());
            }
            Circle::new((cx, cy), r).to_path(SHAPE_TOLERANCE)
        }
        "ellipse" => {
            let cx = number(e, &element, b"cx")?.unwrap_or(0.0);
            let cy = number(e, &element, b"cy")?.unwrap_or(0.0);
            let rx = number(e, &element, b"rx")?.unwrap_or(0.0);
            let ry = number(e, &element, b"ry")?.unwrap_or(0.0);
            if rx <= 0.0 || ry <= 0.0 {
                return Ok(());
            }
            Ellipse::new((cx, cy), (rx, ry), 0.0).to_path(SHAPE_TOLERANCE)
        }
        "polygon" => match attr(e, b"points")? {
            Some(points) => polygon(&element, &points)?,
            None => return Ok(()),
        },
        _ => return Ok(()),
    };

    path.extend(shape.elements().iter().copied());
    Ok(())
}

fn root_frame(e: &BytesStart<'_>) -> Result<Option<ViewBox>, OutlineParseError> {
    if let Some(raw) = attr(e, b"viewBox")? {
        let bad = || OutlineParseError::BadAttribute {
            element: "svg".into(),
            attribute: "viewBox".into(),
            value: raw.clone(),
        };
        let values = numbers(&raw).ok_or_else(bad)?;
        let [min_x, min_y, width, height] = values[..] else {
            return Err(bad());
        };
        if width <= 0.0 || height <= 0.0 {
            return Err(bad());
        }
        return Ok(Some(ViewBox {
            min_x,
            min_y,
            width,
            height,
        }));
    }

    let width = attr(e, b"width")?.as_deref().and_then(length);
    let height = attr(e, b"height")?.as_deref().and_then(length);
    Ok(match (width, height) {
        (Some(width), Some(height)) if width > 0.0 && height > 0.0 => Some(ViewBox {
            min_x: 0.0,
            min_y: 0.0,
            width,
            height,
        }),
        _ => None,
    })
}

fn is_filled(e: &BytesStart<'_>) -> Result<bool, OutlineParseError> {
    if attr(e, b"fill")?.is_some_and(|f| f.trim() == "none") {
        return Ok(false);
    }
    if let Some(style) = attr(e, b"style")? {
        let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.split(';').any(|decl| decl == "fill:none") {
            return Ok(false);
        }
    }
    Ok(true)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, OutlineParseError> {
    for a in e.attributes() {
        let a = a.map_err(|err| OutlineParseError::Xml(err.to_string()))?;
        if a.key.local_name().as_ref() == name {
            return Ok(Some(String::from_utf8_lossy(&a.value).into_owned()));
        }
    }
    Ok(None)
}

fn number(e: &BytesStart<'_>, element: &str, name: &[u8]) -> Result<Option<f64>, OutlineParseError> {
    let Some(raw) = attr(e, name)? else {
        return Ok(None);
    };
    length(&raw).map(Some).ok_or_else(|| OutlineParseError::BadAttribute {
        element: element.to_string(),
        attribute: String::from_utf8_lossy(name).into_owned(),
        value: raw,
    })
}

/// A plain or `px` length.
fn length(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let raw = raw.strip_suffix("px").unwrap_or(raw);
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn numbers(raw: &str) -> Option<Vec<f64>> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect()
}

fn polygon(element: &str, raw: &str) -> Result<BezPath, OutlineParseError> {
    let bad = || OutlineParseError::BadAttribute {
        element: element.to_string(),
        attribute: "points".into(),
        value: raw.to_string(),
    };
    let values = numbers(raw).ok_or_else(bad)?;
    if values.len() % 2 != 0 {
        return Err(bad());
    }

    let mut path = BezPath::new();
    if values.len() < 6 {
        return Ok(path);
    }
    for (i, pair) in values.chunks_exact(2).enumerate() {
        if i == 0 {
            path.move_to((pair[0], pair[1]));
        } else {
            path.line_to((pair[0], pair[1]));
        }
    }
    path.close_path();
    Ok(path)
}
