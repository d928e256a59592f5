use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::debug;

use crate::cancel::RenderCancel;
use crate::error::WatermarkError;
use crate::metrics::{encode_win_ansi, text_width};
use crate::style::{Placement, Position, WatermarkStyle};

/// Resource name of the overlay font. Chosen to avoid clashing with names
/// already used by the page.
const FONT_NAME: &str = "VlmWmF";
const GS_PREFIX: &str = "VlmWmGS";
/// Upper bound on `/Parent` hops when resolving inherited page attributes.
const MAX_INHERIT_DEPTH: usize = 32;
/// Offset from the baseline to the visual middle of a line, in em.
const BASELINE_TO_MIDDLE: f32 = 0.35;

/// Stamp `identity` onto every page of `source` using the default style.
pub fn stamp(source: &[u8], identity: &str) -> Result<Vec<u8>, WatermarkError> {
    Watermarker::default().stamp(source, identity)
}

/// Renders identity overlays with a fixed [`WatermarkStyle`].
#[derive(Debug, Clone, Default)]
pub struct Watermarker {
    style: WatermarkStyle,
}

impl Watermarker {
    pub fn new(style: WatermarkStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &WatermarkStyle {
        &self.style
    }

    /// Stamp `identity` onto every page and return the new document.
    ///
    /// Page count, page boxes and original content are preserved. Any page
    /// that cannot be stamped fails the whole document.
    pub fn stamp(&self, source: &[u8], identity: &str) -> Result<Vec<u8>, WatermarkError> {
        self.stamp_cancellable(source, identity, &RenderCancel::new())
    }

    /// Like [`Watermarker::stamp`], giving up once `cancel` is set.
    pub fn stamp_cancellable(
        &self,
        source: &[u8],
        identity: &str,
        cancel: &RenderCancel,
    ) -> Result<Vec<u8>, WatermarkError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(WatermarkError::EmptyIdentity);
        }

        let mut doc =
            Document::load_mem(source).map_err(|e| WatermarkError::Parse(e.to_string()))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(WatermarkError::Encrypted);
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(WatermarkError::NoPages);
        }

        let text = encode_win_ansi(identity);
        let width = text_width(&text, self.style.font_size);

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let gs_ids: Vec<ObjectId> = self
            .style
            .placements
            .iter()
            .map(|p| {
                doc.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "ca" => p.opacity,
                    "CA" => p.opacity,
                })
            })
            .collect();
        // Saves the graphics state before the page's own content runs; the
        // overlay stream restores it so page transforms don't leak into it.
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));

        for (&page_no, &page_id) in &pages {
            if cancel.is_cancelled() {
                return Err(WatermarkError::Cancelled);
            }
            let bbox = visible_box(&doc, page_id).ok_or(WatermarkError::MissingMediaBox(page_no))?;
            let resources = overlay_resources(&doc, page_id, page_no, font_id, &gs_ids)?;
            let mut contents = existing_contents(&doc, page_id, page_no)?;

            let overlay = self.overlay(bbox, &text, width)?;
            let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay));

            contents.insert(0, Object::Reference(save_id));
            contents.push(Object::Reference(overlay_id));

            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| malformed(page_no, &e))?;
            page.set("Contents", Object::Array(contents));
            page.set("Resources", Object::Dictionary(resources));
        }

        if cancel.is_cancelled() {
            return Err(WatermarkError::Cancelled);
        }
        let mut out = Vec::with_capacity(source.len() + 4096);
        doc.save_to(&mut out)
            .map_err(|e| WatermarkError::Write(e.to_string()))?;
        debug!(pages = pages.len(), bytes = out.len(), "document stamped");
        Ok(out)
    }

    /// Stamp the file at `source` into `dest`. Returns the bytes written.
    ///
    /// `dest` is only created once stamping has succeeded and `cancel` is
    /// still clear.
    pub fn stamp_file(
        &self,
        source: &Path,
        dest: &Path,
        identity: &str,
        cancel: &RenderCancel,
    ) -> Result<u64, WatermarkError> {
        let input = std::fs::read(source)?;
        let output = self.stamp_cancellable(&input, identity, cancel)?;
        if cancel.is_cancelled() {
            return Err(WatermarkError::Cancelled);
        }
        std::fs::write(dest, &output)?;
        Ok(output.len() as u64)
    }

    fn overlay(&self, bbox: [f32; 4], text: &[u8], width: f32) -> Result<Vec<u8>, WatermarkError> {
        let size = self.style.font_size;
        let mut operations = vec![Operation::new("Q", vec![])];

        for (i, placement) in self.style.placements.iter().enumerate() {
            let (sin, cos) = placement.rotation_deg.to_radians().sin_cos();
            let (x, y) = self.origin(placement, bbox, width, sin, cos);
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new("gs", vec![Object::Name(gs_name(i).into_bytes())]),
                Operation::new(
                    "rg",
                    vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
                ),
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(FONT_NAME.as_bytes().to_vec()), size.into()],
                ),
                Operation::new(
                    "Tm",
                    vec![cos.into(), sin.into(), (-sin).into(), cos.into(), x.into(), y.into()],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(text.to_vec(), StringFormat::Literal)],
                ),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ]);
        }

        let encoded = Content { operations }
            .encode()
            .map_err(|e| WatermarkError::Write(e.to_string()))?;
        // Leading newline keeps the Q from fusing with the last token of the
        // preceding content stream.
        let mut stream = Vec::with_capacity(encoded.len() + 1);
        stream.push(b'\n');
        stream.extend(encoded);
        Ok(stream)
    }

    /// Text-space origin that puts the middle of the line on the anchor.
    fn origin(
        &self,
        placement: &Placement,
        [llx, lly, urx, ury]: [f32; 4],
        width: f32,
        sin: f32,
        cos: f32,
    ) -> (f32, f32) {
        let margin = self.style.margin;
        let cx = (llx + urx) / 2.0;
        let cy = (lly + ury) / 2.0;
        let (ax, ay) = match placement.position {
            Position::Center => (cx, cy),
            Position::TopCenter => (cx, ury - margin),
            Position::BottomCenter => (cx, lly + margin),
            Position::Left => (llx + margin, cy),
            Position::Right => (urx - margin, cy),
        };
        let half = width / 2.0;
        let rise = self.style.font_size * BASELINE_TO_MIDDLE;
        (ax - half * cos + rise * sin, ay - half * sin - rise * cos)
    }
}

fn gs_name(index: usize) -> String {
    format!("{GS_PREFIX}{index}")
}

fn malformed(page: u32, err: &lopdf::Error) -> WatermarkError {
    WatermarkError::MalformedPage {
        page,
        reason: err.to_string(),
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up a page attribute, following `/Parent` for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = page_id;
    for _ in 0..MAX_INHERIT_DEPTH {
        let dict = doc.get_dictionary(node).ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        node = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

fn rect(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let items = obj.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let mut n = [0.0f32; 4];
    for (slot, item) in n.iter_mut().zip(items) {
        *slot = resolve(doc, item)?.as_float().ok()?;
    }
    let r = [n[0].min(n[2]), n[1].min(n[3]), n[0].max(n[2]), n[1].max(n[3])];
    (r[2] > r[0] && r[3] > r[1]).then_some(r)
}

/// The crop box when valid, otherwise the media box. `None` when the page
/// has no usable media box.
fn visible_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let media = inherited(doc, page_id, b"MediaBox").and_then(|o| rect(doc, o))?;
    let crop = inherited(doc, page_id, b"CropBox").and_then(|o| rect(doc, o));
    Some(crop.unwrap_or(media))
}

/// Page resources with the overlay font and graphics states added, as an
/// inline dictionary.
fn overlay_resources(
    doc: &Document,
    page_id: ObjectId,
    page_no: u32,
    font_id: ObjectId,
    gs_ids: &[ObjectId],
) -> Result<Dictionary, WatermarkError> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        None => Dictionary::new(),
        Some(obj) => obj.as_dict().cloned().map_err(|e| malformed(page_no, &e))?,
    };

    let mut fonts = sub_dictionary(doc, &resources, b"Font", page_no)?;
    fonts.set(FONT_NAME, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let mut states = sub_dictionary(doc, &resources, b"ExtGState", page_no)?;
    for (i, id) in gs_ids.iter().enumerate() {
        states.set(gs_name(i), Object::Reference(*id));
    }
    resources.set("ExtGState", Object::Dictionary(states));

    Ok(resources)
}

fn sub_dictionary(
    doc: &Document,
    resources: &Dictionary,
    key: &[u8],
    page_no: u32,
) -> Result<Dictionary, WatermarkError> {
    match resources.get(key).ok().and_then(|o| resolve(doc, o)) {
        None => Ok(Dictionary::new()),
        Some(obj) => obj.as_dict().cloned().map_err(|e| malformed(page_no, &e)),
    }
}

/// The page's content stream references, in order.
fn existing_contents(
    doc: &Document,
    page_id: ObjectId,
    page_no: u32,
) -> Result<Vec<Object>, WatermarkError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| malformed(page_no, &e))?;
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };

    match contents {
        Object::Array(items) => Ok(items.clone()),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => Ok(items.clone()),
            Ok(Object::Stream(_)) => Ok(vec![Object::Reference(*id)]),
            Ok(_) => Err(WatermarkError::MalformedPage {
                page: page_no,
                reason: "contents is neither a stream nor an array".into(),
            }),
            Err(e) => Err(malformed(page_no, &e)),
        },
        _ => Err(WatermarkError::MalformedPage {
            page: page_no,
            reason: "contents must be an indirect stream or an array".into(),
        }),
    }
}
