mod common;

use common::*;
use lopdf::{dictionary, Document, Object};
use weather_pdf_responder::error::ResponderError;
use weather_pdf_responder::pdf_stamper::PdfStamper;

fn stamp_lines(lines: &[String]) -> &[String] {
    &lines[lines.len() - 6..]
}

#[test]
fn test_page_count_is_preserved() {
    for pages in [1, 2, 5] {
        let stamped = PdfStamper::stamp(&sample_pdf(pages), &weather("Lyon")).unwrap();
        assert_eq!(Document::load_mem(&stamped).unwrap().get_pages().len(), pages);
    }
}

#[test]
fn test_every_page_carries_the_weather_block() {
    let record = weather("Lyon");
    let stamped = PdfStamper::stamp(&sample_pdf(3), &record).unwrap();

    for (index, lines) in page_texts(&stamped).iter().enumerate() {
        assert_eq!(lines[0], format!("Original page {}", index + 1));
        assert_eq!(stamp_lines(lines), record.stamp_lines().as_slice());
    }
}

#[test]
fn test_stamped_pages_keep_inherited_fonts() {
    let stamped = PdfStamper::stamp(&sample_pdf(1), &weather("Lyon")).unwrap();
    let doc = Document::load_mem(&stamped).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();

    let fonts = doc.get_page_fonts(page_id).unwrap();
    assert!(fonts.contains_key(b"F1".as_slice()));
    assert!(fonts.contains_key(b"WxHelv".as_slice()));
}

#[test]
fn test_stamping_same_input_twice_gives_same_text() {
    let record = weather("Lyon");
    let input = sample_pdf(3);

    let first = PdfStamper::stamp(&input, &record).unwrap();
    let second = PdfStamper::stamp(&input, &record).unwrap();

    let page_count = |pdf: &[u8]| Document::load_mem(pdf).unwrap().get_pages().len();
    assert_eq!(page_count(&first), 3);
    assert_eq!(page_count(&first), page_count(&second));
    assert_eq!(page_texts(&first), page_texts(&second));
}

#[test]
fn test_restamping_adds_a_second_block() {
    let record = weather("Lyon");
    let once = PdfStamper::stamp(&sample_pdf(1), &record).unwrap();
    let twice = PdfStamper::stamp(&once, &record).unwrap();

    let lines = &page_texts(&twice)[0];
    assert_eq!(lines.len(), 1 + 12);
    assert_eq!(lines[1..7], lines[7..]);
}

#[test]
fn test_document_without_pages_is_rejected() {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut empty = Vec::new();
    doc.save_to(&mut empty).unwrap();

    let err = PdfStamper::stamp(&empty, &weather("Lyon")).unwrap_err();
    assert!(matches!(err, ResponderError::Data(_)));
}
