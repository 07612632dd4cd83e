//! Overlays the weather block onto every page of a PDF.
//!
//! The original page content is bracketed by `q`/`Q` so whatever graphics
//! state it leaves behind cannot move or recolour the stamp. Page size and
//! existing content are left as they are.

use log::{debug, info};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::{ResponderError, Result};
use crate::weather_client::WeatherRecord;

const FONT_RESOURCE: &str = "WxHelv";
const FONT_SIZE: i64 = 8;
const ORIGIN_X: i64 = 50;
const ORIGIN_Y: i64 = 50;
const LEADING: i64 = 12;
const MAX_PARENT_DEPTH: usize = 64;

pub struct PdfStamper;

impl PdfStamper {
    /// Returns a new document with the weather block on every page.
    pub fn stamp(pdf: &[u8], weather: &WeatherRecord) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(pdf)?;

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(ResponderError::Data("PDF has no pages".to_string()));
        }
        debug!("Stamping {} page(s)", pages.len());

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let stamp_id = doc.add_object(Stream::new(
            Dictionary::new(),
            stamp_content(&weather.stamp_lines())?,
        ));

        for page_id in pages {
            materialize_resources(&mut doc, page_id)?;
            register_font(&mut doc, page_id, font_id)?;
            wrap_contents(&mut doc, page_id, save_id, stamp_id)?;
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)?;

        info!("Weather data added to PDF ({} bytes)", output.len());
        Ok(output)
    }
}

fn stamp_content(lines: &[String]) -> Result<Vec<u8>> {
    let mut operations = vec![
        // Close the q opened before the original content.
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.as_bytes().to_vec()), FONT_SIZE.into()],
        ),
        Operation::new("g", vec![0.into()]),
        Operation::new("Td", vec![ORIGIN_X.into(), ORIGIN_Y.into()]),
    ];

    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            operations.push(Operation::new("Td", vec![0.into(), (-LEADING).into()]));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
        ));
    }

    operations.push(Operation::new("ET", vec![]));
    operations.push(Operation::new("Q", vec![]));

    let mut content = b"\n".to_vec();
    content.extend(Content { operations }.encode()?);
    Ok(content)
}

/// WinAnsi agrees with Latin-1 for the printable range we emit; anything
/// outside it becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

/// Copies inherited `/Resources` onto the page so adding a font does not
/// hide the resources it used to inherit.
fn materialize_resources(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    if doc.get_object(page_id)?.as_dict()?.has(b"Resources") {
        return Ok(());
    }

    let inherited = inherited_resources(doc, page_id).unwrap_or_default();
    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", inherited);
    Ok(())
}

fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut parent = parent_of(doc, page_id);

    for _ in 0..MAX_PARENT_DEPTH {
        let node_id = parent?;
        let node = doc.get_object(node_id).ok()?.as_dict().ok()?;
        match node.get(b"Resources") {
            Ok(Object::Dictionary(dict)) => return Some(dict.clone()),
            Ok(Object::Reference(id)) => return doc.get_dictionary(*id).ok().cloned(),
            _ => parent = parent_of(doc, node_id),
        }
    }
    None
}

fn parent_of(doc: &Document, node_id: ObjectId) -> Option<ObjectId> {
    doc.get_object(node_id)
        .ok()?
        .as_dict()
        .ok()?
        .get(b"Parent")
        .ok()?
        .as_reference()
        .ok()
}

fn resources_mut(doc: &mut Document, page_id: ObjectId) -> lopdf::Result<&mut Dictionary> {
    let reference = doc
        .get_object(page_id)?
        .as_dict()?
        .get(b"Resources")?
        .as_reference()
        .ok();

    match reference {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut(),
        None => doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .get_mut(b"Resources")?
            .as_dict_mut(),
    }
}

fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<()> {
    let font_dict_ref = resources_mut(doc, page_id)?
        .get(b"Font")
        .and_then(Object::as_reference)
        .ok();

    match font_dict_ref {
        Some(id) => {
            doc.get_object_mut(id)?
                .as_dict_mut()?
                .set(FONT_RESOURCE, font_id);
        }
        None => {
            let resources = resources_mut(doc, page_id)?;
            if !resources.has(b"Font") {
                resources.set("Font", Dictionary::new());
            }
            resources
                .get_mut(b"Font")?
                .as_dict_mut()?
                .set(FONT_RESOURCE, font_id);
        }
    }
    Ok(())
}

fn wrap_contents(
    doc: &mut Document,
    page_id: ObjectId,
    save_id: ObjectId,
    stamp_id: ObjectId,
) -> Result<()> {
    let existing: Vec<Object> = match doc.get_object(page_id)?.as_dict()?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(stamp_id));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Contents", Object::Array(contents));
    Ok(())
}
