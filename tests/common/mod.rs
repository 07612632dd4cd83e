#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;
use lettre::message::header::{ContentTransferEncoding, ContentType};
use lettre::message::{Attachment, Body, Mailbox as Address, MultiPart, SinglePart};
use lettre::Message;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use weather_pdf_responder::email::{Mailbox, ReplySender, WeatherProvider};
use weather_pdf_responder::error::{ResponderError, Result};
use weather_pdf_responder::smtp_sender::Reply;
use weather_pdf_responder::weather_client::WeatherRecord;

pub const SUBJECT: &str = "Local-weather-update";

/// A PDF whose pages inherit fonts and media box from the page tree root.
pub fn sample_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for index in 0..page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Original page {}", index + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Text drawn with `Tj` on each page, decoded as Latin-1.
pub fn page_texts(pdf: &[u8]) -> Vec<Vec<String>> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .map(|op| op.operands[0].as_str().unwrap().iter().map(|&b| b as char).collect())
                .collect()
        })
        .collect()
}

/// A raw RFC 822 message with the given `(filename, mime type, content)` attachments.
pub fn raw_email(from: &str, attachments: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    raw_email_from(from.parse().unwrap(), attachments)
}

/// Like [`raw_email`] with an arbitrary display name, quoted as needed.
pub fn raw_email_named(name: &str, address: &str, attachments: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    raw_email_from(Address::new(Some(name.to_string()), address.parse().unwrap()), attachments)
}

fn raw_email_from(from: Address, attachments: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    let mut multipart =
        MultiPart::mixed().singlepart(SinglePart::plain("Please stamp these.".to_string()));
    for (filename, mime, content) in attachments {
        let body = Body::new_with_encoding(content.clone(), ContentTransferEncoding::Base64).unwrap();
        multipart = multipart.singlepart(
            Attachment::new(filename.to_string()).body(body, ContentType::parse(mime).unwrap()),
        );
    }

    Message::builder()
        .from(from)
        .to("bot@example.com".parse().unwrap())
        .subject(SUBJECT)
        .multipart(multipart)
        .unwrap()
        .formatted()
}

pub fn pdf_email(from: &str, pdfs: Vec<Vec<u8>>) -> Vec<u8> {
    let attachments: Vec<(String, Vec<u8>)> = pdfs
        .into_iter()
        .enumerate()
        .map(|(i, pdf)| (format!("document_{}.pdf", i + 1), pdf))
        .collect();
    let refs: Vec<(&str, &str, Vec<u8>)> = attachments
        .iter()
        .map(|(name, pdf)| (name.as_str(), "application/pdf", pdf.clone()))
        .collect();
    raw_email(from, &refs)
}

pub fn weather(city: &str) -> WeatherRecord {
    WeatherRecord {
        city: city.to_string(),
        description: "Clear Sky".to_string(),
        temperature: 15.0,
        humidity: 60.0,
        wind_speed: 4.1,
        captured_at: chrono::Local::now(),
    }
}

#[derive(Default)]
pub struct FakeMailbox {
    pub messages: BTreeMap<u32, Vec<u8>>,
    /// Ids in the order SEARCH returns them
    pub search_order: Vec<u32>,
    pub unfetchable: HashSet<u32>,
    pub fail_search: bool,
    pub fail_mark_seen: bool,
    pub fail_label: bool,

    pub search_calls: usize,
    pub fetched: Vec<u32>,
    pub seen: Vec<u32>,
    pub labels: Vec<(u32, String)>,
    pub logouts: usize,
}

impl FakeMailbox {
    pub fn with_messages(messages: Vec<(u32, Vec<u8>)>) -> Self {
        let mut mailbox = FakeMailbox::default();
        for (id, raw) in messages {
            mailbox.search_order.push(id);
            mailbox.messages.insert(id, raw);
        }
        mailbox
    }
}

impl Mailbox for FakeMailbox {
    fn search_unseen<'a>(&'a mut self, _subject: &'a str) -> BoxFuture<'a, Result<Vec<u32>>> {
        self.search_calls += 1;
        let result = if self.fail_search {
            Err(ResponderError::Connection("search refused".to_string()))
        } else {
            Ok(self.search_order.clone())
        };
        Box::pin(futures::future::ready(result))
    }

    fn fetch_message(&mut self, id: u32) -> BoxFuture<'_, Result<Vec<u8>>> {
        self.fetched.push(id);
        let result = if self.unfetchable.contains(&id) {
            Err(ResponderError::Connection("fetch timed out".to_string()))
        } else {
            self.messages
                .get(&id)
                .cloned()
                .ok_or_else(|| ResponderError::NotFound(format!("email {}", id)))
        };
        Box::pin(futures::future::ready(result))
    }

    fn mark_seen(&mut self, id: u32) -> BoxFuture<'_, Result<()>> {
        let result = if self.fail_mark_seen {
            Err(ResponderError::Connection("store refused".to_string()))
        } else {
            self.seen.push(id);
            Ok(())
        };
        Box::pin(futures::future::ready(result))
    }

    fn apply_label<'a>(&'a mut self, id: u32, label: &'a str) -> BoxFuture<'a, Result<()>> {
        let result = if self.fail_label {
            Err(ResponderError::Connection("X-GM-LABELS unsupported".to_string()))
        } else {
            self.labels.push((id, label.to_string()));
            Ok(())
        };
        Box::pin(futures::future::ready(result))
    }

    fn logout(&mut self) -> BoxFuture<'_, Result<()>> {
        self.logouts += 1;
        Box::pin(futures::future::ready(Ok::<(), ResponderError>(())))
    }
}

/// Answers with queued results, then with a fixed Paris record.
#[derive(Default)]
pub struct FakeWeather {
    pub queued: Mutex<VecDeque<Result<WeatherRecord>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeWeather {
    pub fn failing_first() -> Self {
        let weather = FakeWeather::default();
        weather
            .queued
            .lock()
            .unwrap()
            .push_back(Err(ResponderError::Data("weather API returned 401".to_string())));
        weather
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl WeatherProvider for FakeWeather {
    fn current_weather<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<WeatherRecord>> {
        self.calls.lock().unwrap().push(city.to_string());
        let result = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(weather("Paris")));
        Box::pin(futures::future::ready(result))
    }
}

#[derive(Default)]
pub struct FakeReplySender {
    pub fail: bool,
    pub sent: Mutex<Vec<Reply>>,
}

impl FakeReplySender {
    pub fn failing() -> Self {
        FakeReplySender {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Reply> {
        self.sent.lock().unwrap().clone()
    }
}

impl ReplySender for FakeReplySender {
    fn send_reply<'a>(&'a self, reply: &'a Reply) -> BoxFuture<'a, Result<()>> {
        let result = if self.fail {
            Err(ResponderError::Send("535 authentication failed".to_string()))
        } else {
            self.sent.lock().unwrap().push(reply.clone());
            Ok(())
        };
        Box::pin(futures::future::ready(result))
    }
}
